// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress events emitted while a batch runs.
//!
//! Events flow through a `tokio::sync::broadcast` channel to any subscriber
//! (the CLI progress bar, a server's status endpoint). When nobody listens,
//! events are dropped.

use crate::types::{LoadStop, PageMode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub batch_id: Uuid,
    /// Monotonically increasing within a batch.
    pub seq: u64,
    pub event: ProgressEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    JobStarted {
        job: usize,
        total: usize,
        target: String,
        requested: usize,
    },
    /// The rate limiter is holding the next navigation.
    Waiting { job: usize, delay_ms: u64 },
    Navigated {
        job: usize,
        mode: PageMode,
        place_name: Option<String>,
    },
    Loading {
        job: usize,
        attempt: u32,
        present: usize,
        requested: usize,
    },
    Loaded {
        job: usize,
        present: usize,
        stop: LoadStop,
    },
    Parsing { job: usize, nodes: usize },
    JobFinished {
        job: usize,
        obtained: usize,
        requested: usize,
        failure: Option<String>,
    },
    BatchFinished { succeeded: usize, failed: usize },
    Warning { message: String },
}

pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Bounded so a stalled subscriber lags instead of growing memory.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Stamps events with the batch id and sequence number.
#[derive(Debug, Clone)]
pub struct ProgressEmitter {
    tx: Option<ProgressSender>,
    batch_id: Uuid,
    seq: u64,
}

impl ProgressEmitter {
    pub fn new(tx: Option<ProgressSender>, batch_id: Uuid) -> Self {
        Self { tx, batch_id, seq: 0 }
    }

    pub fn disabled() -> Self {
        Self::new(None, Uuid::nil())
    }

    pub fn emit(&mut self, event: ProgressEventKind) {
        if let Some(ref sender) = self.tx {
            self.seq += 1;
            let _ = sender.send(ProgressEvent {
                batch_id: self.batch_id,
                seq: self.seq,
                event,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = ProgressEvent {
            batch_id: Uuid::nil(),
            seq: 3,
            event: ProgressEventKind::Loading {
                job: 0,
                attempt: 2,
                present: 20,
                requested: 50,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Loading\""));
        let parsed: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.seq, 3);
    }

    #[test]
    fn test_sequence_increments() {
        let (tx, mut rx) = channel();
        let mut emitter = ProgressEmitter::new(Some(tx), Uuid::nil());
        emitter.emit(ProgressEventKind::Warning {
            message: "a".into(),
        });
        emitter.emit(ProgressEventKind::BatchFinished {
            succeeded: 1,
            failed: 0,
        });
        assert_eq!(rx.try_recv().unwrap().seq, 1);
        assert_eq!(rx.try_recv().unwrap().seq, 2);
    }

    #[test]
    fn test_no_receivers_is_silent() {
        let (tx, rx) = channel();
        drop(rx);
        let mut emitter = ProgressEmitter::new(Some(tx), Uuid::nil());
        emitter.emit(ProgressEventKind::Warning {
            message: "nobody listening".into(),
        });
        ProgressEmitter::disabled().emit(ProgressEventKind::Warning {
            message: "no sender".into(),
        });
    }
}
