use crate::error::ParseError;
use crate::models::FailureReason;
use crate::normalizer::{self, Normalized};
use crate::output::{self, Writer};
use crate::parsers::{Batch, Decoder, Format};
use crate::settings::Settings;
use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use crossbeam::channel::{bounded, Receiver, Sender};
use memmap2::Mmap;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Batches allowed in flight between the workers and the writer thread.
const WRITER_QUEUE: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub bytes: u64,
    pub total: usize,
    pub normalized: usize,
    pub failed: usize,
    pub unparseable: usize,
    pub out_of_range: usize,
    pub rejected_lines: usize,
}

impl RunSummary {
    fn new(started_at: DateTime<Utc>, bytes: u64) -> Self {
        RunSummary {
            started_at,
            elapsed: Duration::ZERO,
            bytes,
            total: 0,
            normalized: 0,
            failed: 0,
            unparseable: 0,
            out_of_range: 0,
            rejected_lines: 0,
        }
    }

    fn add(&mut self, batch: &BatchResult) {
        let result = &batch.result;
        self.total += result.len();
        self.normalized += result.normalized.len();
        self.failed += result.failed.len();
        for failure in &result.failed {
            match failure.reason {
                FailureReason::Unparseable => self.unparseable += 1,
                FailureReason::OutOfRange => self.out_of_range += 1,
            }
        }
        self.rejected_lines += batch.rejected;
    }
}

struct BatchResult {
    seq: usize,
    rejected: usize,
    result: Normalized,
}

/// Normalizes the records in `input` and streams both output sets to the
/// sinks named in `settings`, in input order.
pub fn run(input: &Path, format: Option<&str>, settings: &Settings) -> Result<RunSummary> {
    let started_at = Utc::now();
    let start_time = Instant::now();
    let format = Format::resolve(format, input)?;

    let file = File::open(input)?;
    ensure_distinct_sinks(input, settings)?;
    let bytes = file.metadata()?.len();
    // mmap the file; a zero-length mapping is rejected on some platforms
    let mmap = if bytes == 0 { None } else { Some(unsafe { Mmap::map(&file)? }) };
    let data: &[u8] = mmap.as_deref().unwrap_or(&[]);

    let normalized_out = output::create_writer(settings.output())?;
    let failed_out = settings.failed_output().map(output::create_writer).transpose()?;

    let (tx, rx) = bounded::<BatchResult>(WRITER_QUEUE);
    let summary = RunSummary::new(started_at, bytes);
    let writer_handle = thread::spawn(move || write_in_order(rx, normalized_out, failed_out, summary));

    let processed = process(format, data, settings.batch_size(), &tx);
    // close channel so writer thread can finish
    drop(tx);
    let written = writer_handle
        .join()
        .map_err(|_| anyhow!("writer thread panicked"))?;

    let mut summary = written?;
    processed?;
    summary.elapsed = start_time.elapsed();

    info!(
        total = summary.total,
        normalized = summary.normalized,
        failed = summary.failed,
        rejected_lines = summary.rejected_lines,
        "✅ Normalized GPS coordinates from {}",
        input.display()
    );
    Ok(summary)
}

/// Sinks are truncated on creation, which would clobber the mapped input.
fn ensure_distinct_sinks(input: &Path, settings: &Settings) -> Result<()> {
    let input = fs::canonicalize(input)?;
    let sinks = std::iter::once(settings.output()).chain(settings.failed_output());
    for sink in sinks.filter(|sink| !matches!(*sink, "stdout" | "-")) {
        if fs::canonicalize(sink).is_ok_and(|target| target == input) {
            bail!("output {} is the input file", sink);
        }
    }
    Ok(())
}

/// Writes batches in `seq` order no matter the order they arrive in.
fn write_in_order(
    rx: Receiver<BatchResult>,
    mut normalized_out: Writer,
    mut failed_out: Option<Writer>,
    mut summary: RunSummary,
) -> Result<RunSummary> {
    let mut pending = BTreeMap::new();
    let mut next = 0usize;

    for batch in rx {
        pending.insert(batch.seq, batch);
        while let Some(batch) = pending.remove(&next) {
            normalized_out.write_batch(&batch.result.normalized)?;
            if let Some(failed_out) = failed_out.as_mut() {
                failed_out.write_batch(&batch.result.failed)?;
            }
            summary.add(&batch);
            next += 1;
        }
    }

    normalized_out.finish()?;
    if let Some(failed_out) = failed_out {
        failed_out.finish()?;
    }
    Ok(summary)
}

fn process(format: Format, data: &[u8], batch_size: usize, tx: &Sender<BatchResult>) -> Result<()> {
    if data.iter().all(u8::is_ascii_whitespace) {
        warn!("⚠️ Input is empty, nothing to normalize");
        return Ok(());
    }

    let (decoder, body, first_line) = Decoder::prepare(format, data)?;
    let batches = decoder.batches(body, first_line, batch_size);

    let handle = |batch: &Batch| -> Result<()> {
        let result = process_batch(&decoder, batch)?;
        tx.send(result).map_err(|_| anyhow!("writer thread stopped"))?;
        Ok(())
    };

    #[cfg(feature = "parallel")]
    batches.par_iter().try_for_each(handle)?;
    #[cfg(not(feature = "parallel"))]
    batches.iter().try_for_each(handle)?;

    Ok(())
}

fn process_batch(decoder: &Decoder, batch: &Batch) -> Result<BatchResult, ParseError> {
    let parsed = decoder.decode(batch)?;
    for err in &parsed.rejected {
        warn!("⚠️ Skipping unreadable row: {}", err);
    }
    Ok(BatchResult {
        seq: batch.seq,
        rejected: parsed.rejected.len(),
        result: normalizer::normalize(&parsed.records),
    })
}
