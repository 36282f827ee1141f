use super::{is_blank, Batch, Parsed};
use crate::error::ParseError;
use crate::models::CoordinateRecord;
use serde_json::Value;

/// Accepts either a plain array of points or a scan detail document whose
/// points live under `gps_points`. A broken document is fatal; a broken
/// element only rejects that element.
pub fn parse_json(batch: &Batch) -> Result<Parsed, ParseError> {
    if is_blank(batch.bytes) {
        return Ok(Parsed::default());
    }

    let document: Value = serde_json::from_slice(batch.bytes).map_err(|source| ParseError::Json {
        line: batch.first_line + source.line().saturating_sub(1),
        source,
    })?;

    let elements = match document {
        Value::Array(elements) => elements,
        Value::Object(mut scan) => match scan.remove("gps_points") {
            Some(Value::Array(elements)) => elements,
            _ => return Err(ParseError::NotAnArray),
        },
        _ => return Err(ParseError::NotAnArray),
    };

    let mut out = Parsed {
        records: Vec::with_capacity(elements.len()),
        rejected: Vec::new(),
    };
    for (index, element) in elements.into_iter().enumerate() {
        match serde_json::from_value::<CoordinateRecord>(element) {
            Ok(record) => out.records.push(record),
            Err(source) => out.rejected.push(ParseError::Element { index, source }),
        }
    }
    Ok(out)
}
