//! JSON lines citation streams.
//!
//! One [`CitationRecord`] per line, in and out. [`enrich_lines`] resolves a whole
//! stream in chunks, writing records that were already resolved back exactly as read.
//!
//! # Example
//!
//! ```
//! use issnl_match::{JsonLinesParser, RecordParser};
//!
//! let input = r#"{"cited_journal": "Rev Saude Publica", "cited_year": 2005}
//! not json
//! {"cited_journal": "Cad Saude Publica", "cited_vol": "21"}"#;
//!
//! let batch = JsonLinesParser::new().parse(input).unwrap();
//! assert_eq!(batch.records.len(), 2);
//! assert_eq!(batch.skipped, 1);
//! ```

use crate::engine::{BatchSummary, MatchEngine};
use crate::{CitationRecord, RecordBatch, RecordParser, Result, ResultCode};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Number of lines resolved together by [`enrich_lines`].
pub const CHUNK_SIZE: usize = 4096;

/// Shard name of records that were already resolved before the run.
pub const PRE_RESOLVED_SHARD: &str = "pre_resolved";

/// Parser for JSON lines streams. Blank lines are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesParser;

impl JsonLinesParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parses one line, or `None` when it is blank or malformed.
    pub fn parse_line(&self, line: &str, line_number: usize) -> Option<CitationRecord> {
        if line.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(line = line_number, error = %err, "skipping malformed citation record");
                None
            }
        }
    }
}

impl RecordParser for JsonLinesParser {
    fn parse(&self, input: &str) -> Result<RecordBatch> {
        let mut batch = RecordBatch::default();
        for (i, line) in input.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match self.parse_line(line, i + 1) {
                Some(record) => batch.records.push(record),
                None => batch.skipped += 1,
            }
        }
        Ok(batch)
    }
}

/// Destination of enriched lines.
pub trait RecordSink {
    /// Writes one serialized record; `code` is `None` for pre-resolved records.
    fn write_line(&mut self, code: Option<ResultCode>, line: &str) -> Result<()>;

    fn flush(&mut self) -> Result<()>;
}

/// Writes every line to a single stream.
#[derive(Debug)]
pub struct JsonLinesWriter<W: Write> {
    inner: W,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> RecordSink for JsonLinesWriter<W> {
    fn write_line(&mut self, _code: Option<ResultCode>, line: &str) -> Result<()> {
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Writes lines to one `<result_code>.jsonl` file per result code.
///
/// Files are created on first use inside the output directory.
#[derive(Debug)]
pub struct ShardedWriter {
    dir: PathBuf,
    shards: HashMap<String, BufWriter<File>>,
}

impl ShardedWriter {
    /// Creates the output directory if needed.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            shards: HashMap::new(),
        })
    }

    /// Shard file stem of a result code.
    pub fn shard_name(code: Option<ResultCode>) -> String {
        code.map_or_else(|| PRE_RESOLVED_SHARD.to_string(), ResultCode::file_stem)
    }

    pub fn shard_path(&self, code: Option<ResultCode>) -> PathBuf {
        self.dir.join(format!("{}.jsonl", Self::shard_name(code)))
    }

    /// Flushes every shard and returns the written paths, sorted.
    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        RecordSink::flush(&mut self)?;
        let mut paths: Vec<PathBuf> = self
            .shards
            .keys()
            .map(|name| self.dir.join(format!("{name}.jsonl")))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

impl RecordSink for ShardedWriter {
    fn write_line(&mut self, code: Option<ResultCode>, line: &str) -> Result<()> {
        let writer = match self.shards.entry(Self::shard_name(code)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let path = self.dir.join(format!("{}.jsonl", entry.key()));
                tracing::debug!(path = %path.display(), "opening output shard");
                entry.insert(BufWriter::new(File::create(&path)?))
            }
        };
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for writer in self.shards.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

/// Decodes one raw line as UTF-8, falling back to Latin-1.
fn decode_line(mut bytes: Vec<u8>, line_number: usize) -> String {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(err) => {
            tracing::debug!(line = line_number, "line is not valid UTF-8, decoding as Latin-1");
            err.into_bytes().iter().map(|&b| char::from(b)).collect()
        }
    }
}

/// Position of a line of the current chunk in the output.
enum Slot {
    PassThrough(String),
    Resolved(usize),
}

/// Resolves a JSON lines stream into `sink`.
///
/// Lines that are not valid UTF-8 are read as Latin-1. Malformed lines are skipped and counted. Records that already carry an ISSN-L are
/// passed through unchanged unless the engine ignores existing results.
pub fn enrich_lines<R, S>(engine: &MatchEngine<'_>, reader: R, sink: &mut S) -> Result<BatchSummary>
where
    R: BufRead,
    S: RecordSink,
{
    let parser = JsonLinesParser::new();
    let mut summary = BatchSummary::default();
    let mut lines = reader.split(b'\n').enumerate();

    loop {
        let chunk: Vec<(usize, String)> = lines
            .by_ref()
            .take(CHUNK_SIZE)
            .map(|(i, line)| line.map(|bytes| (i + 1, decode_line(bytes, i + 1))))
            .collect::<std::io::Result<_>>()?;
        if chunk.is_empty() {
            break;
        }

        let mut slots = Vec::with_capacity(chunk.len());
        let mut pending = Vec::new();
        for (line_number, line) in chunk {
            if line.trim().is_empty() {
                continue;
            }
            let Some(record) = parser.parse_line(&line, line_number) else {
                summary.add_skipped();
                continue;
            };
            if engine.passes_through(&record) {
                slots.push(Slot::PassThrough(line));
            } else {
                slots.push(Slot::Resolved(pending.len()));
                pending.push(record);
            }
        }

        let resolved = engine.resolve_all(pending);
        for slot in slots {
            match slot {
                Slot::PassThrough(line) => {
                    summary.add_passed_through();
                    sink.write_line(None, &line)?;
                }
                Slot::Resolved(i) => {
                    let record = &resolved[i];
                    if let Some(code) = record.result_code {
                        summary.add(code);
                    }
                    sink.write_line(record.result_code, &serde_json::to_string(record)?)?;
                }
            }
        }
    }

    sink.flush()?;
    tracing::info!(
        processed = summary.processed,
        resolved = summary.resolved(),
        passed_through = summary.passed_through,
        skipped = summary.skipped,
        "citation stream enriched"
    );

    Ok(summary)
}
