use crate::models::{CoordinateRecord, Failure};
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::warn;

/// A row that can also be laid out as CSV/TSV cells.
pub trait Row: Serialize {
    fn columns(&self) -> Vec<String>;
    fn cell(&self, column: &str) -> String;
}

impl Row for CoordinateRecord {
    fn columns(&self) -> Vec<String> {
        let mut columns = vec!["id".to_string(), "latitude".to_string(), "longitude".to_string()];
        columns.extend(self.extra.keys().cloned());
        columns
    }

    fn cell(&self, column: &str) -> String {
        match column {
            "id" => self.id.to_string(),
            "latitude" => self.latitude.to_string(),
            "longitude" => self.longitude.to_string(),
            other => match self.extra.get(other) {
                Some(serde_json::Value::String(text)) => text.clone(),
                Some(serde_json::Value::Null) | None => String::new(),
                Some(value) => value.to_string(),
            },
        }
    }
}

impl Row for Failure {
    fn columns(&self) -> Vec<String> {
        ["id", "reason", "axis", "detail", "latitude", "longitude"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn cell(&self, column: &str) -> String {
        match column {
            "id" => self.id.to_string(),
            "reason" => self.reason.to_string(),
            "axis" => self.axis.to_string(),
            "detail" => self.detail.clone(),
            "latitude" => self.record.latitude.to_string(),
            "longitude" => self.record.longitude.to_string(),
            _ => String::new(),
        }
    }
}

pub enum Writer {
    Stdout(Box<dyn Write + Send>), // JSON lines
    JsonFile(BufWriter<File>, bool), // bool tracks if the next element is the first
    JsonlFile(BufWriter<File>),
    CsvFile(BufWriter<File>, Option<Header>), // header, once written
    TsvFile(BufWriter<File>, Option<Header>),
}

/// Columns of a CSV/TSV sink, fixed by the first batch that has rows.
pub struct Header {
    columns: Vec<String>,
    dropped: HashSet<String>,
}

impl Header {
    /// Every column seen in `rows`, in first-seen order.
    fn from_rows<T: Row>(rows: &[T]) -> Self {
        let mut columns = Vec::new();
        let mut seen = HashSet::new();
        for row in rows {
            for column in row.columns() {
                if seen.insert(column.clone()) {
                    columns.push(column);
                }
            }
        }
        Header { columns, dropped: HashSet::new() }
    }

    /// Warns once for each column a later row carries that the header lacks.
    fn check<T: Row>(&mut self, row: &T) {
        for column in row.columns() {
            if !self.columns.contains(&column) && self.dropped.insert(column.clone()) {
                warn!("⚠️ Column '{}' first appeared after the header was written; its values are dropped", column);
            }
        }
    }
}

impl Writer {
    pub fn write_batch<T: Row>(&mut self, rows: &[T]) -> Result<()> {
        match self {
            Writer::Stdout(writer) => {
                for row in rows {
                    let serialized = serde_json::to_string(row)?;
                    writeln!(writer, "{}", serialized)?;
                }
            }
            Writer::JsonFile(writer, is_first) => {
                for row in rows {
                    if !*is_first {
                        write!(writer, ",")?;
                    }
                    *is_first = false;
                    let serialized = serde_json::to_string_pretty(row)?;
                    write!(writer, "\n{}", serialized)?;
                }
            }
            Writer::JsonlFile(writer) => {
                for row in rows {
                    let serialized = serde_json::to_string(row)?;
                    writeln!(writer, "{}", serialized)?;
                }
            }
            Writer::CsvFile(writer, header) => {
                write_delimited(writer, header, rows, ",", escape_csv_field)?;
            }
            Writer::TsvFile(writer, header) => {
                write_delimited(writer, header, rows, "\t", escape_tsv_field)?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        match self {
            Writer::JsonFile(ref mut writer, is_first) => {
                if is_first {
                    writeln!(writer, "]")?;
                } else {
                    writeln!(writer, "\n]")?;
                }
                writer.flush()?;
            }
            Writer::JsonlFile(ref mut writer)
            | Writer::CsvFile(ref mut writer, _)
            | Writer::TsvFile(ref mut writer, _) => {
                writer.flush()?;
            }
            Writer::Stdout(ref mut writer) => {
                writer.flush()?;
            }
        }
        Ok(())
    }
}

/// The header is the union of the columns of the first non-empty batch;
/// later rows are laid out against it.
fn write_delimited<T: Row>(
    writer: &mut BufWriter<File>,
    header: &mut Option<Header>,
    rows: &[T],
    separator: &str,
    escape: fn(&str) -> String,
) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    if header.is_none() {
        let fixed = Header::from_rows(rows);
        let line: Vec<String> = fixed.columns.iter().map(|c| escape(c)).collect();
        writeln!(writer, "{}", line.join(separator))?;
        *header = Some(fixed);
    }
    let Some(header) = header.as_mut() else {
        return Ok(());
    };
    for row in rows {
        header.check(row);
        let cells: Vec<String> = header.columns.iter().map(|c| escape(&row.cell(c))).collect();
        writeln!(writer, "{}", cells.join(separator))?;
    }
    Ok(())
}

pub fn create_writer(output_arg: &str) -> Result<Writer> {
    match output_arg {
        "stdout" | "-" => Ok(Writer::Stdout(Box::new(io::stdout()))),
        path if path.ends_with(".json") => {
            let mut writer = open(path)?;
            write!(writer, "[")?;
            Ok(Writer::JsonFile(writer, true))
        }
        path if path.ends_with(".jsonl") || path.ends_with(".ndjson") => Ok(Writer::JsonlFile(open(path)?)),
        path if path.ends_with(".csv") => Ok(Writer::CsvFile(open(path)?, None)),
        path if path.ends_with(".tsv") => Ok(Writer::TsvFile(open(path)?, None)),
        path => {
            // Default to JSON file if it looks like a path
            if path.contains('/') || path.contains('\\') || path.contains('.') {
                let mut writer = open(path)?;
                write!(writer, "[")?;
                Ok(Writer::JsonFile(writer, true))
            } else {
                Err(anyhow!(
                    "Unknown output target: {}. Use 'stdout' or a .json/.jsonl/.csv/.tsv file path",
                    output_arg
                ))
            }
        }
    }
}

fn open(path: &str) -> Result<BufWriter<File>> {
    create_parent_dirs(path)?;
    let file = File::create(path)?;
    Ok(BufWriter::new(file))
}

fn create_parent_dirs(file_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(file_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn escape_tsv_field(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample() -> Vec<CoordinateRecord> {
        let mut first = CoordinateRecord::new("1", 45.123, -122.5);
        first.extra.insert("accuracy".to_string(), json!(100));
        let mut second = CoordinateRecord::new("2", 1.0, 2.0);
        second.extra.insert("accuracy".to_string(), json!("5, roughly"));
        vec![first, second]
    }

    #[test]
    fn json_file_across_batches() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/points.json");
        let path = path.to_str().unwrap();
        let records = sample();

        let mut writer = create_writer(path).unwrap();
        writer.write_batch(&records[..1]).unwrap();
        writer.write_batch::<CoordinateRecord>(&[]).unwrap();
        writer.write_batch(&records[1..]).unwrap();
        writer.finish().unwrap();

        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written, serde_json::to_value(&records).unwrap());
    }

    #[test]
    fn empty_json_file_is_an_empty_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.json");
        let path = path.to_str().unwrap();

        create_writer(path).unwrap().finish().unwrap();

        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written, json!([]));
    }

    #[test]
    fn csv_file_escapes_and_writes_header_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("points.csv");
        let path = path.to_str().unwrap();
        let records = sample();

        let mut writer = create_writer(path).unwrap();
        writer.write_batch(&records[..1]).unwrap();
        writer.write_batch(&records[1..]).unwrap();
        writer.finish().unwrap();

        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "id,latitude,longitude,accuracy\n1,45.123,-122.5,100\n2,1,2,\"5, roughly\"\n"
        );
    }

    #[test]
    fn csv_header_covers_every_row_of_the_first_batch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("points.csv");
        let path = path.to_str().unwrap();
        let mut second = CoordinateRecord::new("2", 3.0, 4.0);
        second.extra.insert("accuracy".to_string(), json!(7));
        let records = vec![CoordinateRecord::new("1", 1.0, 2.0), second];

        let mut writer = create_writer(path).unwrap();
        writer.write_batch(&records).unwrap();
        writer.finish().unwrap();

        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "id,latitude,longitude,accuracy\n1,1,2,\n2,3,4,7\n"
        );
    }

    #[test]
    fn csv_columns_after_the_header_keep_known_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("points.csv");
        let path = path.to_str().unwrap();
        let mut late = CoordinateRecord::new("2", 3.0, 4.0);
        late.extra.insert("accuracy".to_string(), json!(7));

        let mut writer = create_writer(path).unwrap();
        writer.write_batch::<CoordinateRecord>(&[]).unwrap();
        writer.write_batch(&[CoordinateRecord::new("1", 1.0, 2.0)]).unwrap();
        writer.write_batch(&[late]).unwrap();
        writer.finish().unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "id,latitude,longitude\n1,1,2\n2,3,4\n");
    }

    #[test]
    fn tsv_failures() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("failed.tsv");
        let path = path.to_str().unwrap();
        let result = normalize(&[CoordinateRecord::new("7", "91.0", "1")]);

        let mut writer = create_writer(path).unwrap();
        writer.write_batch(&result.failed).unwrap();
        writer.finish().unwrap();

        let written = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "id\treason\taxis\tdetail\tlatitude\tlongitude");
        assert!(lines[1].starts_with("7\tOUT_OF_RANGE\tlatitude\t"));
        assert!(lines[1].ends_with("\t91.0\t1"));
    }

    #[test]
    fn jsonl_failures_carry_original_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("failed.jsonl");
        let path = path.to_str().unwrap();
        let result = normalize(&[CoordinateRecord::new("8", "10", "abc")]);

        let mut writer = create_writer(path).unwrap();
        writer.write_batch(&result.failed).unwrap();
        writer.finish().unwrap();

        let line: serde_json::Value = serde_json::from_str(std::fs::read_to_string(path).unwrap().trim()).unwrap();
        assert_eq!(line["reason"], json!("UNPARSEABLE"));
        assert_eq!(line["axis"], json!("longitude"));
        assert_eq!(line["record"], json!({ "id": "8", "latitude": "10", "longitude": "abc" }));
    }

    #[test]
    fn unknown_target_is_an_error() {
        assert!(create_writer("parquet").is_err());
    }
}
