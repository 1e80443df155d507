// sink.rs — Durable storage behind the ledger.
//
// The ledger is stored as JSONL: one entry per line, appended and never
// rewritten. A sink hands back raw JSON records on load so verification can
// hash exactly what was stored.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::entry::LedgerEntry;
use crate::error::LedgerError;

/// Where ledger entries live.
///
/// `append` must be all-or-nothing for the batch it is given: either every
/// entry is durable when it returns `Ok`, or none of them is visible.
pub trait LedgerSink: Send {
    /// Every stored record, oldest first.
    fn load(&mut self) -> Result<Vec<serde_json::Value>, LedgerError>;

    /// Persist a batch of already-chained entries.
    fn append(&mut self, entries: &[LedgerEntry]) -> Result<(), LedgerError>;
}

/// JSONL file sink.
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    /// Open (or create) the ledger file, creating parent directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| LedgerError::OpenFailed {
                    path: path.clone(),
                    source,
                })?;
            }
        }

        // Append mode: existing lines are never overwritten.
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LedgerError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse every record in a JSONL ledger file.
    ///
    /// Blank lines are skipped. A final line without a terminator is a torn
    /// write and is reported rather than trusted.
    pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<serde_json::Value>, LedgerError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path).map_err(|source| LedgerError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut line = String::new();
        let mut line_num = 0usize;

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            line_num += 1;
            if line.trim().is_empty() {
                continue;
            }
            if !line.ends_with('\n') {
                return Err(LedgerError::TornWrite { line: line_num });
            }
            let record = serde_json::from_str(line.trim_end())
                .map_err(|source| LedgerError::CorruptRecord {
                    line: line_num,
                    source,
                })?;
            records.push(record);
        }

        Ok(records)
    }
}

impl LedgerSink for FileSink {
    fn load(&mut self) -> Result<Vec<serde_json::Value>, LedgerError> {
        Self::read_records(&self.path)
    }

    fn append(&mut self, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        // The whole batch goes out in a single write so a reader never sees
        // half of a decision's records.
        let buf = encode_lines(entries)?;
        self.write_or_rollback(&buf, File::sync_data)
    }
}

impl FileSink {
    /// Append `buf`, then run `commit` on the file. If either step fails the
    /// file is truncated back to its previous length.
    fn write_or_rollback(
        &mut self,
        buf: &[u8],
        commit: impl FnOnce(&File) -> std::io::Result<()>,
    ) -> Result<(), LedgerError> {
        let prev_len = self.file.metadata()?.len();
        let written = self
            .file
            .write_all(buf)
            .and_then(|_| self.file.flush())
            .and_then(|_| commit(&self.file));
        if let Err(err) = written {
            if let Err(truncate) = self.file.set_len(prev_len) {
                tracing::error!(
                    path = %self.path.display(),
                    error = %truncate,
                    "failed ledger write could not be rolled back"
                );
            }
            return Err(err.into());
        }
        Ok(())
    }
}

fn encode_lines(entries: &[LedgerEntry]) -> Result<Vec<u8>, LedgerError> {
    let mut buf = Vec::new();
    for entry in entries {
        serde_json::to_writer(&mut buf, entry)?;
        buf.push(b'\n');
    }
    Ok(buf)
}

/// In-memory sink for tests and replay tooling.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<serde_json::Value>,
    fail_next: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the sink with already-stored records.
    pub fn with_records(records: Vec<serde_json::Value>) -> Self {
        Self {
            records,
            fail_next: false,
        }
    }

    /// Make the next `append` fail with an I/O error.
    pub fn fail_next_append(&mut self) {
        self.fail_next = true;
    }

    pub fn records(&self) -> &[serde_json::Value] {
        &self.records
    }

    /// Direct access to stored records, for tamper tests.
    pub fn records_mut(&mut self) -> &mut Vec<serde_json::Value> {
        &mut self.records
    }
}

impl LedgerSink for MemorySink {
    fn load(&mut self) -> Result<Vec<serde_json::Value>, LedgerError> {
        Ok(self.records.clone())
    }

    fn append(&mut self, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        if std::mem::take(&mut self.fail_next) {
            return Err(LedgerError::WriteFailed(std::io::Error::other(
                "injected sink failure",
            )));
        }
        let mut staged = Vec::with_capacity(entries.len());
        for entry in entries {
            staged.push(serde_json::to_value(entry)?);
        }
        self.records.extend(staged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::GENESIS_HASH;
    use crate::payload::LedgerPayload;
    use cg_types::CanonImportRecord;
    use chrono::Utc;
    use tempfile::tempdir;

    fn entry(seq: u64, previous: &str) -> LedgerEntry {
        let payload = LedgerPayload::CanonImport(CanonImportRecord {
            timestamp: Utc::now(),
            item_ids: vec![format!("DEF_{seq}")],
        });
        LedgerEntry::chained(seq, previous, payload, Utc::now()).unwrap()
    }

    #[test]
    fn file_sink_round_trips_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.jsonl");
        let mut sink = FileSink::open(&path).unwrap();

        let first = entry(0, GENESIS_HASH);
        let second = entry(1, &first.current_hash);
        sink.append(&[first.clone(), second.clone()]).unwrap();

        let records = sink.load().unwrap();
        assert_eq!(records.len(), 2);
        let parsed: LedgerEntry = serde_json::from_value(records[1].clone()).unwrap();
        assert_eq!(parsed, second);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let records = FileSink::read_records(dir.path().join("absent.jsonl")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn torn_final_line_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let first = entry(0, GENESIS_HASH);
        let mut text = serde_json::to_string(&first).unwrap();
        text.push('\n');
        text.push_str(r#"{"sequence_index":1,"payl"#);
        std::fs::write(&path, text).unwrap();

        let err = FileSink::read_records(&path).unwrap_err();
        assert!(matches!(err, LedgerError::TornWrite { line: 2 }));
    }

    #[test]
    fn garbage_line_reports_line_number() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        std::fs::write(&path, "\nnot json\n").unwrap();

        let err = FileSink::read_records(&path).unwrap_err();
        assert!(matches!(err, LedgerError::CorruptRecord { line: 2, .. }));
    }

    #[test]
    fn memory_sink_failure_stores_nothing() {
        let mut sink = MemorySink::new();
        sink.fail_next_append();
        assert!(sink.append(&[entry(0, GENESIS_HASH)]).is_err());
        assert!(sink.records().is_empty());

        sink.append(&[entry(0, GENESIS_HASH)]).unwrap();
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn failed_sync_truncates_the_partial_batch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let mut sink = FileSink::open(&path).unwrap();
        let first = entry(0, GENESIS_HASH);
        sink.append(&[first.clone()]).unwrap();
        let len = std::fs::metadata(&path).unwrap().len();

        let second = entry(1, &first.current_hash);
        let buf = encode_lines(&[second.clone()]).unwrap();
        let err = sink
            .write_or_rollback(&buf, |_| Err(std::io::Error::other("disk full")))
            .unwrap_err();
        assert!(matches!(err, LedgerError::WriteFailed(_)));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len);

        // A retry of the same entry lands exactly once.
        sink.append(&[second]).unwrap();
        let records = sink.load().unwrap();
        assert_eq!(records.len(), 2);
        assert!(crate::entry::verify_records(&records).valid);
    }
}
