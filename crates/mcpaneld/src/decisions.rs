//! Pending operator decisions
//!
//! A supervisor never blocks waiting for a human. When it needs one (a
//! server ignoring its shutdown keyword, an untracked process running the
//! server jar) it records a decision here and carries on. The decision is
//! resolved by an operator through the mailbox, or by the configured
//! auto-policy once its deadline passes.

use chrono::{DateTime, Utc};
use mcpanel_core::{DecisionKind, Error, PendingDecision, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

static NEXT_DECISION_ID: AtomicU64 = AtomicU64::new(1);

/// At most one pending decision for one server
pub struct DecisionBoard {
    server_id: u32,
    timeout: Duration,
    pending: Mutex<Option<PendingDecision>>,
}

impl DecisionBoard {
    pub fn new(server_id: u32, timeout: Duration) -> Self {
        Self {
            server_id,
            timeout,
            pending: Mutex::new(None),
        }
    }

    pub fn raise(&self, kind: DecisionKind) -> Result<PendingDecision> {
        self.raise_at(kind, Utc::now())
    }

    pub fn raise_at(&self, kind: DecisionKind, now: DateTime<Utc>) -> Result<PendingDecision> {
        let mut pending = self.pending.lock();
        if pending.is_some() {
            return Err(Error::DecisionPending(self.server_id));
        }

        let timeout = chrono::Duration::from_std(self.timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(0));
        let decision = PendingDecision {
            id: NEXT_DECISION_ID.fetch_add(1, Ordering::Relaxed),
            server_id: self.server_id,
            kind,
            raised_at: now,
            deadline: now + timeout,
        };

        warn!(
            "Server {} needs a decision ({:?}), deadline {}",
            self.server_id, decision.kind, decision.deadline
        );
        *pending = Some(decision.clone());
        Ok(decision)
    }

    pub fn pending(&self) -> Option<PendingDecision> {
        self.pending.lock().clone()
    }

    pub fn take(&self) -> Option<PendingDecision> {
        self.pending.lock().take()
    }

    pub fn has_force_kill(&self) -> bool {
        matches!(
            self.pending.lock().as_ref().map(|d| &d.kind),
            Some(DecisionKind::ForceKill { .. })
        )
    }

    pub fn has_orphan(&self) -> bool {
        matches!(
            self.pending.lock().as_ref().map(|d| &d.kind),
            Some(DecisionKind::KillOrphan { .. })
        )
    }
}
