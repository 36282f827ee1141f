use super::{is_blank, Batch, Parsed};
use crate::error::ParseError;
use crate::models::CoordinateRecord;

pub fn parse_jsonl(batch: &Batch) -> Parsed {
    let mut out = Parsed::default();
    for (number, line) in batch.lines() {
        if is_blank(line) {
            continue;
        }
        match serde_json::from_slice::<CoordinateRecord>(line) {
            Ok(record) => out.records.push(record),
            Err(source) => out.rejected.push(ParseError::Json { line: number, source }),
        }
    }
    out
}
