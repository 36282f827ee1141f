use super::{Batch, Parsed};
use crate::error::ParseError;
use crate::models::{CoordinateRecord, CoordinateValue, RecordId};
use csv::{Reader, ReaderBuilder, StringRecord};

/// Column positions taken from the header row.
#[derive(Debug, Clone)]
pub struct Layout {
    delimiter: u8,
    columns: Vec<String>,
    id: usize,
    latitude: usize,
    longitude: usize,
}

impl Layout {
    /// Reads the header row. Key columns match case-insensitively; the other
    /// names are kept as written.
    pub fn read(input: &[u8], delimiter: u8) -> Result<Self, ParseError> {
        // empty lines before the header are skipped by the reader
        let header_line = 1 + input
            .split(|b| *b == b'\n')
            .take_while(|line| line.is_empty() || *line == b"\r")
            .count();

        let mut reader = reader(input, delimiter);
        let header = reader
            .byte_headers()
            .map_err(|source| ParseError::Csv { line: header_line, source })?;

        let columns = header
            .iter()
            .map(|c| {
                std::str::from_utf8(c)
                    .map(|c| c.trim().trim_start_matches('\u{feff}').to_string())
                    .map_err(|_| ParseError::Utf8 { line: header_line })
            })
            .collect::<Result<Vec<String>, ParseError>>()?;
        if columns.iter().all(String::is_empty) {
            return Err(ParseError::EmptyInput);
        }

        let find = |name: &'static str| {
            columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(name))
                .ok_or(ParseError::MissingColumn(name))
        };
        let id = find("id")?;
        let latitude = find("latitude")?;
        let longitude = find("longitude")?;

        Ok(Layout {
            delimiter,
            columns,
            id,
            latitude,
            longitude,
        })
    }

    fn record(&self, line: usize, fields: &StringRecord) -> Result<CoordinateRecord, ParseError> {
        if fields.len() != self.columns.len() {
            return Err(ParseError::ColumnCount {
                line,
                expected: self.columns.len(),
                found: fields.len(),
            });
        }

        let mut record = CoordinateRecord {
            id: RecordId(fields[self.id].trim().to_string()),
            latitude: CoordinateValue::Text(fields[self.latitude].to_string()),
            longitude: CoordinateValue::Text(fields[self.longitude].to_string()),
            extra: serde_json::Map::new(),
        };
        if record.id.0.is_empty() {
            return Err(ParseError::MissingId { line });
        }

        for (i, (column, value)) in self.columns.iter().zip(fields.iter()).enumerate() {
            if i != self.id && i != self.latitude && i != self.longitude {
                record.extra.insert(column.clone(), serde_json::Value::String(value.to_string()));
            }
        }
        Ok(record)
    }
}

/// Commas honour RFC 4180 quoting, so a quoted field may span lines; tabs are
/// plain separators.
fn reader(input: &[u8], delimiter: u8) -> Reader<&[u8]> {
    ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .quoting(delimiter == b',')
        .from_reader(input)
}

/// Every CSV cell is text, so coordinates always go through the decimal
/// parser. The batch holds the whole table, header included.
pub fn parse_delimited(layout: &Layout, batch: &Batch) -> Result<Parsed, ParseError> {
    let mut out = Parsed::default();
    let mut reader = reader(batch.bytes, layout.delimiter);
    let offset = batch.first_line - 1;

    for result in reader.records() {
        match result {
            Ok(fields) => {
                let line = offset + fields.position().map_or(0, |p| p.line() as usize);
                match layout.record(line, &fields) {
                    Ok(record) => out.records.push(record),
                    Err(err) => out.rejected.push(err),
                }
            }
            Err(source) if source.is_io_error() => {
                return Err(ParseError::Csv { line: 0, source });
            }
            Err(source) => out.rejected.push(ParseError::Csv {
                line: offset + source.position().map_or(0, |p| p.line() as usize),
                source,
            }),
        }
    }
    Ok(out)
}
