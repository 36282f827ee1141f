pub mod delimited;
pub mod json;
pub mod jsonl;

use crate::error::ParseError;
use crate::models::CoordinateRecord;
use memchr::{memchr, memchr_iter};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Jsonl,
    Csv,
    Tsv,
}

impl FromStr for Format {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "jsonl" | "ndjson" => Ok(Format::Jsonl),
            "csv" => Ok(Format::Csv),
            "tsv" => Ok(Format::Tsv),
            other => Err(ParseError::UnknownFormat(other.to_string())),
        }
    }
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Format> {
        path.extension()?.to_str()?.parse().ok()
    }

    /// An explicit name wins over the file extension.
    pub fn resolve(name: Option<&str>, path: &Path) -> Result<Format, ParseError> {
        match name {
            Some(name) => name.parse(),
            None => Format::from_path(path).ok_or_else(|| ParseError::UnknownFormat(path.display().to_string())),
        }
    }
}

/// A run of whole lines from the input.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    pub seq: usize,
    /// 1-based line number of the first line in `bytes`
    pub first_line: usize,
    pub bytes: &'a [u8],
}

impl<'a> Batch<'a> {
    pub fn lines(&self) -> Lines<'a> {
        Lines {
            bytes: self.bytes,
            pos: 0,
            line: self.first_line,
        }
    }
}

/// Yields `(line number, line)` with the newline and any `\r` stripped.
pub struct Lines<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Iterator for Lines<'a> {
    type Item = (usize, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.bytes.len() {
            return None;
        }
        let rest = &self.bytes[self.pos..];
        let end = memchr(b'\n', rest).unwrap_or(rest.len());
        let line = rest[..end].strip_suffix(b"\r").unwrap_or(&rest[..end]);
        let number = self.line;
        self.pos += end + 1;
        self.line += 1;
        Some((number, line))
    }
}

/// Records decoded from one batch, plus the lines that could not be decoded.
#[derive(Debug, Default)]
pub struct Parsed {
    pub records: Vec<CoordinateRecord>,
    pub rejected: Vec<ParseError>,
}

pub enum Decoder {
    Json,
    Jsonl,
    Delimited(delimited::Layout),
}

impl Decoder {
    /// Checks whatever header the format has. Returns the decoder, the body
    /// to batch and the line number the body starts at.
    pub fn prepare(format: Format, input: &[u8]) -> Result<(Decoder, &[u8], usize), ParseError> {
        match format {
            Format::Json => Ok((Decoder::Json, input, 1)),
            Format::Jsonl => Ok((Decoder::Jsonl, input, 1)),
            Format::Csv | Format::Tsv => {
                let delimiter = if format == Format::Csv { b',' } else { b'\t' };
                let layout = delimited::Layout::read(input, delimiter)?;
                Ok((Decoder::Delimited(layout), input, 1))
            }
        }
    }

    /// JSON documents and quoted CSV fields may span lines, so those formats
    /// are decoded as one batch.
    pub fn batches<'a>(&self, body: &'a [u8], first_line: usize, batch_lines: usize) -> Vec<Batch<'a>> {
        match self {
            Decoder::Json | Decoder::Delimited(_) => vec![Batch { seq: 0, first_line, bytes: body }],
            Decoder::Jsonl => split_batches(body, first_line, batch_lines),
        }
    }

    pub fn decode(&self, batch: &Batch) -> Result<Parsed, ParseError> {
        match self {
            Decoder::Json => json::parse_json(batch),
            Decoder::Jsonl => Ok(jsonl::parse_jsonl(batch)),
            Decoder::Delimited(layout) => delimited::parse_delimited(layout, batch),
        }
    }
}

pub fn split_batches(bytes: &[u8], first_line: usize, batch_lines: usize) -> Vec<Batch<'_>> {
    let batch_lines = batch_lines.max(1);
    let mut batches = Vec::new();
    let mut start = 0usize;
    let mut lines_in_batch = 0usize;
    let mut batch_first = first_line;

    for nl in memchr_iter(b'\n', bytes) {
        lines_in_batch += 1;
        if lines_in_batch == batch_lines {
            batches.push(Batch {
                seq: batches.len(),
                first_line: batch_first,
                bytes: &bytes[start..=nl],
            });
            start = nl + 1;
            lines_in_batch = 0;
            batch_first += batch_lines;
        }
    }
    if start < bytes.len() {
        batches.push(Batch {
            seq: batches.len(),
            first_line: batch_first,
            bytes: &bytes[start..],
        });
    }
    batches
}

pub(crate) fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}
