// exec-gate-core/src/runtime/audit_log.rs
// ============================================================================
// Module: Exec Gate Audit Log
// Description: Append-only file and in-memory audit log implementations.
// Purpose: Persist sequenced, hash-chained records with single-writer discipline.
// Dependencies: crate::core, crate::interfaces, serde_json
// ============================================================================

//! ## Overview
//! The file log stores one canonical-JSON record per line, LF-terminated, in
//! a file opened in append mode. A single exclusive lock covers the whole
//! append: read tail, stamp `logged_at`, compute `record_hash`, write, and
//! flush. The lock is not released until the bytes are durable, so a
//! concurrent appender can never observe a stale `prev_hash`. On open, the
//! existing file is scanned to recover the chain tail.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::AuditDraft;
use crate::core::AuditRecord;
use crate::core::HashDigest;
use crate::core::audit::compute_record_hash;
use crate::core::canonical_json_bytes;
use crate::interfaces::AuditError;
use crate::interfaces::AuditLog;
use crate::interfaces::Clock;

// ============================================================================
// SECTION: File Audit Log
// ============================================================================

/// Mutable tail state guarded by the writer lock.
struct LogTail {
    /// Append-mode file handle.
    file: File,
    /// Next sequence number to assign.
    next_seq: u64,
    /// `record_hash` of the last record, or the zero sentinel.
    prev_hash: HashDigest,
}

/// Append-only audit log backed by a line-per-record file.
pub struct FileAuditLog {
    /// Writer state; the mutex is the single-writer discipline.
    tail: Mutex<LogTail>,
    /// Timestamp source for `logged_at`.
    clock: Arc<dyn Clock>,
}

impl FileAuditLog {
    /// Opens or creates the audit log file and recovers the chain tail.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] when the file cannot be opened or existing
    /// content cannot be parsed back.
    pub fn open(path: &Path, clock: Arc<dyn Clock>) -> Result<Self, AuditError> {
        let (next_seq, prev_hash) = recover_tail(path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| AuditError::Write(format!("audit log open failed: {err}")))?;
        Ok(Self {
            tail: Mutex::new(LogTail {
                file,
                next_seq,
                prev_hash,
            }),
            clock,
        })
    }
}

impl AuditLog for FileAuditLog {
    fn append(&self, draft: AuditDraft) -> Result<AuditRecord, AuditError> {
        let mut tail = self
            .tail
            .lock()
            .map_err(|_| AuditError::Write("audit log mutex poisoned".to_string()))?;
        let seq = tail.next_seq;
        let prev_hash = tail.prev_hash.clone();
        let logged_at = self.clock.now_utc();
        let record = seal_record(draft, seq, prev_hash, logged_at)?;
        let line = canonical_json_bytes(&record)
            .map_err(|err| AuditError::Write(format!("audit record serialization: {err}")))?;
        write_durable_line(&mut tail.file, &line)
            .map_err(|err| AuditError::Write(format!("audit append failed: {err}")))?;
        tail.next_seq = seq.saturating_add(1);
        tail.prev_hash = record.integrity.record_hash.clone();
        Ok(record)
    }
}

/// Writes one LF-terminated line and makes it durable before returning.
fn write_durable_line(file: &mut File, line: &[u8]) -> std::io::Result<()> {
    file.write_all(line)?;
    file.write_all(b"\n")?;
    file.flush()?;
    file.sync_data()
}

/// Scans an existing log file and returns the next sequence and tail hash.
fn recover_tail(path: &Path) -> Result<(u64, HashDigest), AuditError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok((0, HashDigest::zero()));
        }
        Err(err) => return Err(AuditError::Write(format!("audit log open failed: {err}"))),
    };
    let reader = BufReader::new(file);
    let mut tail: Option<AuditRecord> = None;
    for line in reader.lines() {
        let line = line.map_err(|err| AuditError::Corrupt(format!("audit log read: {err}")))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: AuditRecord = serde_json::from_str(&line)
            .map_err(|err| AuditError::Corrupt(format!("audit record invalid: {err}")))?;
        tail = Some(record);
    }
    Ok(tail.map_or_else(
        || (0, HashDigest::zero()),
        |record| (record.seq.saturating_add(1), record.integrity.record_hash),
    ))
}

/// Materializes a draft into a sealed record for a chain slot.
fn seal_record(
    draft: AuditDraft,
    seq: u64,
    prev_hash: HashDigest,
    logged_at: String,
) -> Result<AuditRecord, AuditError> {
    // Hash the record with integrity reduced to {prev_hash}, then install
    // the resulting digest.
    let mut record = draft.into_record(seq, prev_hash.clone(), HashDigest::zero(), logged_at);
    let fields = serde_json::to_value(&record)
        .map_err(|err| AuditError::Write(format!("audit record serialization: {err}")))?;
    let record_hash = compute_record_hash(&fields, &prev_hash)
        .map_err(|err| AuditError::Write(format!("audit record hash: {err}")))?;
    record.integrity.record_hash = record_hash;
    Ok(record)
}

// ============================================================================
// SECTION: In-Memory Audit Log
// ============================================================================

/// In-memory audit log for tests and examples.
pub struct MemoryAuditLog {
    /// Appended records in order.
    records: Mutex<Vec<AuditRecord>>,
    /// Timestamp source for `logged_at`.
    clock: Arc<dyn Clock>,
}

impl MemoryAuditLog {
    /// Creates an empty in-memory log.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            clock,
        }
    }

    /// Returns a snapshot of the appended records.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|records| records.clone()).unwrap_or_default()
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, draft: AuditDraft) -> Result<AuditRecord, AuditError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| AuditError::Write("audit log mutex poisoned".to_string()))?;
        let seq = u64::try_from(records.len())
            .map_err(|_| AuditError::Write("audit sequence overflow".to_string()))?;
        let prev_hash = records
            .last()
            .map_or_else(HashDigest::zero, |record| record.integrity.record_hash.clone());
        let logged_at = self.clock.now_utc();
        let record = seal_record(draft, seq, prev_hash, logged_at)?;
        records.push(record.clone());
        Ok(record)
    }
}

// ============================================================================
// SECTION: Log Reading
// ============================================================================

/// Reads all records from a log file in order.
///
/// # Errors
///
/// Returns [`AuditError`] when the file cannot be read or a line cannot be
/// parsed as a record.
pub fn read_records(path: &Path) -> Result<Vec<AuditRecord>, AuditError> {
    let file = File::open(path)
        .map_err(|err| AuditError::Write(format!("audit log open failed: {err}")))?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|err| AuditError::Corrupt(format!("audit log read: {err}")))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: AuditRecord = serde_json::from_str(&line)
            .map_err(|err| AuditError::Corrupt(format!("audit record invalid: {err}")))?;
        records.push(record);
    }
    Ok(records)
}
