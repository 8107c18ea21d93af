//! Append-only download audit trail.
//!
//! Every access decision and every file-stream outcome lands here: one
//! `initiated` entry per attempt, then either a `completed` entry
//! referencing the same attempt or a `denied` entry when the gate refused
//! or the stream broke off. Entries are never mutated, only appended, so
//! the trail stays usable for dispute resolution even when a client aborts
//! mid-transfer.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::gate::Platform;
use crate::TrialgateError;

/// Outcome recorded for an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Gate allowed the request; streaming began.
    Initiated,
    /// Stream reached the end of the artifact.
    Completed,
    /// Gate refused, or the stream ended early.
    Denied,
}

/// Opaque identifier tying a `completed`/`denied` entry to its attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(uuid::Uuid);

impl AttemptId {
    fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

/// One appended audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique id of this entry.
    pub id: uuid::Uuid,
    /// Logical attempt this entry belongs to.
    pub attempt_id: AttemptId,
    /// Subject that made the request.
    pub subject_id: String,
    /// Requested platform.
    pub platform: Platform,
    /// Subject's tier at decision time.
    pub tier: String,
    /// Outcome.
    pub status: AuditStatus,
    /// Requester's User-Agent header.
    pub user_agent: String,
    /// Requester's source address.
    pub source_addr: String,
    /// Artifact filename involved.
    pub filename: String,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
}

/// Aggregate download statistics over a trailing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadStats {
    /// Entries inside the window.
    pub total: usize,
    /// Counts keyed by platform name.
    pub by_platform: HashMap<String, usize>,
    /// Counts keyed by tier.
    pub by_tier: HashMap<String, usize>,
    /// Counts keyed by status.
    pub by_status: HashMap<String, usize>,
    /// Completed share of initiated attempts, 0–100. Zero when nothing
    /// was initiated in the window.
    pub completion_rate: f64,
}

/// Request context attached to each appended entry.
#[derive(Debug, Clone)]
pub struct AuditContext<'a> {
    /// Subject making the request.
    pub subject_id: &'a str,
    /// Requested platform.
    pub platform: Platform,
    /// Subject's tier at decision time.
    pub tier: &'a str,
    /// Requester's User-Agent header.
    pub user_agent: &'a str,
    /// Requester's source address.
    pub source_addr: &'a str,
}

/// Append-only audit log: an in-memory trail, optionally mirrored to a
/// JSONL file for durability.
pub struct AuditLog {
    entries: Mutex<Vec<AuditEntry>>,
    sink: Option<Mutex<File>>,
}

impl AuditLog {
    /// Log kept only in memory. Suitable for tests and single-run tools.
    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            sink: None,
        }
    }

    /// Log mirrored to a JSONL file, one entry per line, append-only.
    pub fn with_file(path: &Path) -> Result<Self, TrialgateError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TrialgateError::AuditIO(format!("create audit dir: {e}")))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| TrialgateError::AuditIO(format!("open audit file: {e}")))?;
        Ok(Self {
            entries: Mutex::new(Vec::new()),
            sink: Some(Mutex::new(file)),
        })
    }

    fn append(&self, entry: AuditEntry) {
        if let Some(sink) = &self.sink {
            // Audit durability failure must not turn into a request failure.
            let mut file = sink.lock().expect("audit sink lock");
            match serde_json::to_string(&entry) {
                Ok(line) => {
                    if let Err(e) = writeln!(file, "{line}") {
                        tracing::warn!(error = %e, "audit entry not persisted");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "audit entry not serializable"),
            }
        }
        self.entries.lock().expect("audit entries lock").push(entry);
    }

    /// Record the start of an allowed attempt.
    pub fn record_initiated(&self, ctx: &AuditContext<'_>, now: DateTime<Utc>) -> AttemptId {
        let attempt_id = AttemptId::new();
        self.append(self.entry(ctx, attempt_id, AuditStatus::Initiated, now));
        attempt_id
    }

    /// Record that the stream for an attempt reached the end of the file.
    pub fn record_completed(
        &self,
        ctx: &AuditContext<'_>,
        attempt_id: AttemptId,
        now: DateTime<Utc>,
    ) {
        self.append(self.entry(ctx, attempt_id, AuditStatus::Completed, now));
    }

    /// Record a refusal, or an attempt whose stream ended early.
    pub fn record_denied(
        &self,
        ctx: &AuditContext<'_>,
        attempt_id: Option<AttemptId>,
        now: DateTime<Utc>,
    ) {
        let attempt_id = attempt_id.unwrap_or_else(AttemptId::new);
        self.append(self.entry(ctx, attempt_id, AuditStatus::Denied, now));
    }

    fn entry(
        &self,
        ctx: &AuditContext<'_>,
        attempt_id: AttemptId,
        status: AuditStatus,
        now: DateTime<Utc>,
    ) -> AuditEntry {
        AuditEntry {
            id: uuid::Uuid::new_v4(),
            attempt_id,
            subject_id: ctx.subject_id.to_string(),
            platform: ctx.platform,
            tier: ctx.tier.to_string(),
            status,
            user_agent: ctx.user_agent.to_string(),
            source_addr: ctx.source_addr.to_string(),
            filename: ctx.platform.artifact_name().to_string(),
            timestamp: now,
        }
    }

    /// Aggregate counts over the trailing window ending `now`.
    pub fn stats(&self, now: DateTime<Utc>, window_days: i64) -> DownloadStats {
        let cutoff = now - Duration::days(window_days);
        let entries = self.entries.lock().expect("audit entries lock");

        let mut by_platform: HashMap<String, usize> = HashMap::new();
        let mut by_tier: HashMap<String, usize> = HashMap::new();
        let mut by_status: HashMap<String, usize> = HashMap::new();
        let mut total = 0usize;
        let mut initiated = 0usize;
        let mut completed = 0usize;

        for entry in entries.iter().filter(|e| e.timestamp > cutoff) {
            total += 1;
            *by_platform.entry(entry.platform.to_string()).or_default() += 1;
            *by_tier.entry(entry.tier.clone()).or_default() += 1;
            let status_key = match entry.status {
                AuditStatus::Initiated => {
                    initiated += 1;
                    "initiated"
                }
                AuditStatus::Completed => {
                    completed += 1;
                    "completed"
                }
                AuditStatus::Denied => "denied",
            };
            *by_status.entry(status_key.to_string()).or_default() += 1;
        }

        let completion_rate = if initiated == 0 {
            0.0
        } else {
            completed as f64 / initiated as f64 * 100.0
        };

        DownloadStats {
            total,
            by_platform,
            by_tier,
            by_status,
            completion_rate,
        }
    }

    /// Snapshot of all retained entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit entries lock").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn ctx() -> AuditContext<'static> {
        AuditContext {
            subject_id: "acct-1",
            platform: Platform::Linux,
            tier: "trial",
            user_agent: "Mozilla/5.0 (X11; Linux x86_64)",
            source_addr: "203.0.113.9",
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn initiated_then_completed_share_an_attempt_id() {
        let log = AuditLog::in_memory();
        let attempt = log.record_initiated(&ctx(), t0());
        log.record_completed(&ctx(), attempt, t0() + Duration::minutes(2));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].attempt_id, entries[1].attempt_id);
        assert_eq!(entries[0].status, AuditStatus::Initiated);
        assert_eq!(entries[1].status, AuditStatus::Completed);
    }

    #[test]
    fn denied_attempt_appends_exactly_one_entry() {
        let log = AuditLog::in_memory();
        log.record_denied(&ctx(), None, t0());

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, AuditStatus::Denied);
        assert_eq!(entries[0].filename, "trialgate-setup-linux.AppImage");
    }

    #[test]
    fn stats_aggregate_by_platform_tier_and_status() {
        let log = AuditLog::in_memory();
        let attempt = log.record_initiated(&ctx(), t0());
        log.record_completed(&ctx(), attempt, t0());
        log.record_denied(&ctx(), None, t0());

        let stats = log.stats(t0(), 30);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_platform.get("linux"), Some(&3));
        assert_eq!(stats.by_tier.get("trial"), Some(&3));
        assert_eq!(stats.by_status.get("initiated"), Some(&1));
        assert_eq!(stats.by_status.get("completed"), Some(&1));
        assert_eq!(stats.by_status.get("denied"), Some(&1));
        assert!((stats.completion_rate - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stats_window_excludes_old_entries() {
        let log = AuditLog::in_memory();
        log.record_denied(&ctx(), None, t0() - Duration::days(45));
        log.record_denied(&ctx(), None, t0());

        let stats = log.stats(t0(), 30);
        assert_eq!(stats.total, 1);
    }

    #[test]
    fn completion_rate_zero_without_initiations() {
        let log = AuditLog::in_memory();
        log.record_denied(&ctx(), None, t0());
        assert_eq!(log.stats(t0(), 30).completion_rate, 0.0);
    }

    #[test]
    fn file_sink_appends_one_json_line_per_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");
        let log = AuditLog::with_file(&path).unwrap();

        let attempt = log.record_initiated(&ctx(), t0());
        log.record_completed(&ctx(), attempt, t0());

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let entry: AuditEntry = serde_json::from_str(line).unwrap();
            assert_eq!(entry.subject_id, "acct-1");
        }
    }
}
