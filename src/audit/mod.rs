//! Audit logging of orchestration runs
//!
//! Each run keeps its rendered reasoning trace and a SHA-256 digest of it,
//! so a record can be checked later for tampering. The log holds a bounded
//! number of records and drops the oldest first.

use crate::models::{AgentRun, AgentState};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub session_id: Uuid,
    pub question: String,
    pub answer: String,
    pub state: AgentState,
    pub iterations: u32,
    pub reasoning_trace: Arc<Vec<String>>,
    pub trace_hash: String,
    pub created_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

impl RunRecord {
    pub fn from_run(session_id: Uuid, question: &str, run: &AgentRun, execution_time_ms: u64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            session_id,
            question: question.to_string(),
            answer: run.answer.clone(),
            state: run.state,
            iterations: run.iterations,
            reasoning_trace: Arc::new(run.reasoning_trace.clone()),
            trace_hash: compute_trace_hash(&run.reasoning_trace),
            created_at: Utc::now(),
            execution_time_ms,
        }
    }
}

#[derive(Default)]
struct AuditState {
    records: HashMap<Uuid, RunRecord>,
    /// Insertion order, front is evicted first
    order: VecDeque<Uuid>,
}

/// Audit trail storage
pub struct AuditLog {
    state: Arc<RwLock<AuditState>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(AuditState::default())),
            capacity: capacity.max(1),
        }
    }

    /// Store a run record, dropping the oldest ones beyond capacity
    pub async fn record(&self, record: RunRecord) -> Result<Uuid> {
        let run_id = record.run_id;
        let mut state = self.state.write().await;

        if state.records.insert(run_id, record).is_none() {
            state.order.push_back(run_id);
        }
        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.records.remove(&oldest);
                debug!(run_id = %oldest, "Audit record evicted");
            }
        }

        Ok(run_id)
    }

    pub async fn get(&self, run_id: Uuid) -> Result<Option<RunRecord>> {
        let state = self.state.read().await;
        Ok(state.records.get(&run_id).cloned())
    }

    /// List run IDs for a session, oldest first
    pub async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<Uuid>> {
        let state = self.state.read().await;

        let mut items: Vec<_> = state
            .records
            .iter()
            .filter(|(_, record)| record.session_id == session_id)
            .map(|(id, record)| (*id, record.created_at))
            .collect();

        items.sort_by_key(|(_, created_at)| *created_at);

        Ok(items.into_iter().map(|(id, _)| id).collect())
    }

    /// Recompute the trace digest and compare it with the stored one
    pub async fn verify_integrity(&self, run_id: Uuid) -> Result<bool> {
        let state = self.state.read().await;

        Ok(state
            .records
            .get(&run_id)
            .map(|record| compute_trace_hash(&record.reasoning_trace) == record.trace_hash)
            .unwrap_or(false))
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 of the JSON-serialized trace, streamed into the hasher
pub fn compute_trace_hash(trace: &[String]) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), trace).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(answer: &str) -> AgentRun {
        AgentRun {
            answer: answer.to_string(),
            state: AgentState::Done,
            iterations: 1,
            failure: None,
            reasoning_trace: vec!["INPUT: Halo".to_string(), "DONE".to_string()],
        }
    }

    #[test]
    fn test_trace_hash_is_stable() {
        let trace = vec!["INPUT: Halo".to_string(), "DONE".to_string()];
        let hash = compute_trace_hash(&trace);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, compute_trace_hash(&trace));
        assert_ne!(hash, compute_trace_hash(&trace[..1]));
    }

    #[test]
    fn test_record_and_verify() {
        tokio_test::block_on(async {
            let log = AuditLog::new();
            let session = Uuid::new_v4();
            let record = RunRecord::from_run(session, "Halo", &run("Halo juga"), 12);
            let run_id = log.record(record).await.unwrap();

            assert!(log.verify_integrity(run_id).await.unwrap());
            assert!(!log.verify_integrity(Uuid::new_v4()).await.unwrap());
            assert_eq!(log.get(run_id).await.unwrap().unwrap().answer, "Halo juga");
        });
    }

    #[tokio::test]
    async fn test_tampered_trace_fails_verification() {
        let log = AuditLog::new();
        let mut record = RunRecord::from_run(Uuid::new_v4(), "Halo", &run("Halo juga"), 3);
        record.reasoning_trace = Arc::new(vec!["INPUT: lain".to_string()]);
        let run_id = log.record(record).await.unwrap();

        assert!(!log.verify_integrity(run_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_oldest_records_evicted_beyond_capacity() {
        let log = AuditLog::with_capacity(3);
        let session = Uuid::new_v4();

        let mut ids = Vec::new();
        for i in 0..5 {
            let record = RunRecord::from_run(session, &format!("q{}", i), &run("a"), 1);
            ids.push(log.record(record).await.unwrap());
        }

        assert!(log.get(ids[0]).await.unwrap().is_none());
        assert!(log.get(ids[1]).await.unwrap().is_none());
        assert!(log.get(ids[2]).await.unwrap().is_some());
        assert!(log.verify_integrity(ids[4]).await.unwrap());
        assert_eq!(log.list_for_session(session).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_list_for_session_is_chronological() {
        let log = AuditLog::new();
        let session = Uuid::new_v4();

        let mut first = RunRecord::from_run(session, "q1", &run("a1"), 1);
        first.created_at = Utc::now() - chrono::Duration::seconds(10);
        let second = RunRecord::from_run(session, "q2", &run("a2"), 1);
        let other = RunRecord::from_run(Uuid::new_v4(), "q3", &run("a3"), 1);

        let second_id = log.record(second).await.unwrap();
        let first_id = log.record(first).await.unwrap();
        log.record(other).await.unwrap();

        assert_eq!(
            log.list_for_session(session).await.unwrap(),
            vec![first_id, second_id]
        );
    }
}
