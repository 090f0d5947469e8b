//! Persisted execution journal.
//!
//! JSON-lines file: a header line identifying the deployment, then one record
//! per action state transition. The file is append-only; on reload the last
//! record per action id wins. Every write is flushed and synced before the
//! engine moves to the next action, making each record a recovery point.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use alloy_core::primitives::{Address, Bytes, B256};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Execution state of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    Pending,
    Success,
    Failed,
}

/// The persisted outcome of a successful action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ActionResult {
    /// A deployed or attached contract address.
    Address(Address),
    /// Raw return data of a read.
    Data(Bytes),
}

impl ActionResult {
    pub fn as_address(&self) -> Option<Address> {
        match self {
            ActionResult::Address(addr) => Some(*addr),
            ActionResult::Data(_) => None,
        }
    }
}

/// One journal record. The latest record per `action_id` is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub action_id: String,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ActionResult>,
    /// The submitted payload: creation bytecode plus encoded constructor
    /// arguments for deploys, calldata for calls and reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// First line of every journal file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalHeader {
    pub module: String,
    pub chain_id: u64,
    pub fingerprint: String,
}

/// Exclusive, append-only handle on a journal file.
///
/// Opening takes an advisory lock on a sidecar `.lock` file; a second run
/// against the same journal fails with [`Error::JournalLocked`] instead of
/// interleaving writes.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    file: File,
    _lock: File,
    header: JournalHeader,
    entries: BTreeMap<String, JournalEntry>,
}

impl Journal {
    /// Open (or create) the journal for a deployment.
    ///
    /// A pre-existing journal must carry the same fingerprint as the current
    /// run; resuming under a different parameterization is refused.
    pub fn open(path: impl Into<PathBuf>, header: JournalHeader) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::JournalIo {
                path: path.clone(),
                source,
            })?;
        }

        let lock = Self::acquire_lock(&path)?;

        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| Error::JournalIo {
                path: path.clone(),
                source,
            })?;

        let (existing_header, entries) = Self::read_records(&path, &mut file)?;

        let header = match existing_header {
            Some(existing) => {
                if existing.fingerprint != header.fingerprint {
                    return Err(Error::JournalMismatch {
                        expected: header.fingerprint,
                        found: existing.fingerprint,
                    });
                }
                tracing::info!(
                    path = %path.display(),
                    entries = entries.len(),
                    "Resuming existing journal"
                );
                existing
            }
            None => {
                let line = serde_json::to_string(&header)
                    .expect("JournalHeader serialization should never fail");
                writeln!(file, "{line}").map_err(|source| Error::JournalIo {
                    path: path.clone(),
                    source,
                })?;
                file.sync_data().map_err(|source| Error::JournalIo {
                    path: path.clone(),
                    source,
                })?;
                tracing::info!(path = %path.display(), "Created new journal");
                header
            }
        };

        Ok(Self {
            path,
            file,
            _lock: lock,
            header,
            entries,
        })
    }

    /// Read a journal without taking the exclusive lock (status reporting).
    pub fn read(path: &Path) -> Result<(JournalHeader, BTreeMap<String, JournalEntry>)> {
        let mut file = File::open(path).map_err(|source| Error::JournalIo {
            path: path.to_path_buf(),
            source,
        })?;
        let (header, entries) = Self::read_records(path, &mut file)?;
        let header = header.ok_or_else(|| Error::JournalCorrupt {
            path: path.to_path_buf(),
            line: 1,
            reason: "missing header line".to_string(),
        })?;
        Ok((header, entries))
    }

    pub fn header(&self) -> &JournalHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry(&self, action_id: &str) -> Option<&JournalEntry> {
        self.entries.get(action_id)
    }

    pub fn entries(&self) -> &BTreeMap<String, JournalEntry> {
        &self.entries
    }

    pub fn is_success(&self, action_id: &str) -> bool {
        matches!(
            self.entries.get(action_id),
            Some(JournalEntry {
                status: ActionStatus::Success,
                ..
            })
        )
    }

    /// Record that an action has been picked up for submission.
    pub fn record_pending(&mut self, action_id: &str, data: Option<Bytes>) -> Result<()> {
        self.append(JournalEntry {
            action_id: action_id.to_string(),
            status: ActionStatus::Pending,
            result: None,
            data,
            tx_hash: None,
            error: None,
            timestamp: Utc::now(),
        })
    }

    /// Record a confirmed result. This is the recovery point: once written,
    /// re-runs will never re-submit the action.
    pub fn record_success(
        &mut self,
        action_id: &str,
        result: Option<ActionResult>,
        tx_hash: Option<B256>,
        data: Option<Bytes>,
    ) -> Result<()> {
        self.append(JournalEntry {
            action_id: action_id.to_string(),
            status: ActionStatus::Success,
            result,
            data,
            tx_hash,
            error: None,
            timestamp: Utc::now(),
        })
    }

    /// Record a per-action failure. The run halts, but the journal stays
    /// consistent and the action will be retried on the next run.
    pub fn record_failure(&mut self, action_id: &str, error: &str) -> Result<()> {
        self.append(JournalEntry {
            action_id: action_id.to_string(),
            status: ActionStatus::Failed,
            result: None,
            data: None,
            tx_hash: None,
            error: Some(error.to_string()),
            timestamp: Utc::now(),
        })
    }

    fn append(&mut self, entry: JournalEntry) -> Result<()> {
        let line =
            serde_json::to_string(&entry).expect("JournalEntry serialization should never fail");
        writeln!(self.file, "{line}").map_err(|source| Error::JournalIo {
            path: self.path.clone(),
            source,
        })?;
        self.file.sync_data().map_err(|source| Error::JournalIo {
            path: self.path.clone(),
            source,
        })?;
        self.entries.insert(entry.action_id.clone(), entry);
        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_path = path.with_extension("lock");
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .map_err(|source| Error::JournalIo {
                path: lock_path.clone(),
                source,
            })?;
        lock.try_lock_exclusive().map_err(|_| Error::JournalLocked {
            path: path.to_path_buf(),
        })?;
        Ok(lock)
    }

    fn read_records(
        path: &Path,
        file: &mut File,
    ) -> Result<(Option<JournalHeader>, BTreeMap<String, JournalEntry>)> {
        file.seek(SeekFrom::Start(0)).map_err(|source| Error::JournalIo {
            path: path.to_path_buf(),
            source,
        })?;

        let reader = BufReader::new(&mut *file);
        let mut header = None;
        let mut entries = BTreeMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| Error::JournalIo {
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }

            if idx == 0 {
                header = Some(serde_json::from_str::<JournalHeader>(&line).map_err(|e| {
                    Error::JournalCorrupt {
                        path: path.to_path_buf(),
                        line: 1,
                        reason: e.to_string(),
                    }
                })?);
                continue;
            }

            let entry: JournalEntry =
                serde_json::from_str(&line).map_err(|e| Error::JournalCorrupt {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    reason: e.to_string(),
                })?;
            entries.insert(entry.action_id.clone(), entry);
        }

        Ok((header, entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn test_header() -> JournalHeader {
        JournalHeader {
            module: "EscrowModule".to_string(),
            chain_id: 534351,
            fingerprint: "deadbeef".repeat(8),
        }
    }

    #[test]
    fn records_survive_reopen() {
        let tmp = TempDir::new("ingot-journal").unwrap();
        let path = tmp.path().join("escrow.journal.jsonl");

        {
            let mut journal = Journal::open(&path, test_header()).unwrap();
            journal
                .record_success(
                    "EscrowModule#0:deploy:USDT_Escrow",
                    Some(ActionResult::Address(Address::ZERO)),
                    Some(B256::ZERO),
                    Some(Bytes::from(vec![0x60, 0x80])),
                )
                .unwrap();
        }

        let journal = Journal::open(&path, test_header()).unwrap();
        assert!(journal.is_success("EscrowModule#0:deploy:USDT_Escrow"));
        let entry = journal.entry("EscrowModule#0:deploy:USDT_Escrow").unwrap();
        assert_eq!(entry.result, Some(ActionResult::Address(Address::ZERO)));
        assert_eq!(entry.data, Some(Bytes::from(vec![0x60, 0x80])));
    }

    #[test]
    fn last_record_per_action_wins() {
        let tmp = TempDir::new("ingot-journal").unwrap();
        let path = tmp.path().join("escrow.journal.jsonl");

        {
            let mut journal = Journal::open(&path, test_header()).unwrap();
            journal.record_pending("m#0:deploy:X", None).unwrap();
            journal.record_failure("m#0:deploy:X", "reverted").unwrap();
            journal
                .record_success(
                    "m#0:deploy:X",
                    Some(ActionResult::Address(Address::ZERO)),
                    None,
                    None,
                )
                .unwrap();
        }

        let journal = Journal::open(&path, test_header()).unwrap();
        assert_eq!(journal.entries().len(), 1);
        assert_eq!(
            journal.entry("m#0:deploy:X").unwrap().status,
            ActionStatus::Success
        );
    }

    #[test]
    fn concurrent_open_is_refused() {
        let tmp = TempDir::new("ingot-journal").unwrap();
        let path = tmp.path().join("escrow.journal.jsonl");

        let _first = Journal::open(&path, test_header()).unwrap();
        let err = Journal::open(&path, test_header()).unwrap_err();
        assert!(matches!(err, Error::JournalLocked { .. }));
    }

    #[test]
    fn fingerprint_mismatch_is_refused() {
        let tmp = TempDir::new("ingot-journal").unwrap();
        let path = tmp.path().join("escrow.journal.jsonl");

        drop(Journal::open(&path, test_header()).unwrap());

        let mut other = test_header();
        other.fingerprint = "cafebabe".repeat(8);
        let err = Journal::open(&path, other).unwrap_err();
        assert!(matches!(err, Error::JournalMismatch { .. }));
    }

    #[test]
    fn corrupt_line_is_reported_with_location() {
        let tmp = TempDir::new("ingot-journal").unwrap();
        let path = tmp.path().join("escrow.journal.jsonl");

        drop(Journal::open(&path, test_header()).unwrap());
        let mut raw = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(raw, "{{ not json").unwrap();

        let err = Journal::open(&path, test_header()).unwrap_err();
        assert!(matches!(err, Error::JournalCorrupt { line: 2, .. }));
    }

    #[test]
    fn journal_file_is_human_diffable_jsonl() {
        let tmp = TempDir::new("ingot-journal").unwrap();
        let path = tmp.path().join("escrow.journal.jsonl");

        let mut journal = Journal::open(&path, test_header()).unwrap();
        journal.record_pending("m#0:deploy:X", None).unwrap();
        drop(journal);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"module\":\"EscrowModule\""));
        assert!(lines[1].contains("\"status\":\"Pending\""));
    }
}
