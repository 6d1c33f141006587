//! Single-writer completion latch.
//!
//! Every path that can end a conversion (supervisory timer, process exit,
//! spawn failure, caller cancellation) goes through [`OutcomeSlot::settle`].
//! The first caller wins the [`CompletionGuard`] and its outcome is sent to
//! the waiting request; every later caller is told it lost, and its outcome
//! is only logged.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

use crate::outcome::TerminalOutcome;

/// Per-request atomic test-and-set latch. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct CompletionGuard {
    settled: Arc<AtomicBool>,
}

impl CompletionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the latch false → true. Returns `true` for exactly one caller.
    pub fn try_claim(&self) -> bool {
        self.settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Advisory read; only useful for deciding on side effects like logging.
    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }
}

/// Which code path produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeSource {
    Spawn,
    Timer,
    Exit,
    Cancel,
}

impl fmt::Display for OutcomeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Spawn => "spawn",
            Self::Timer => "timer",
            Self::Exit => "exit",
            Self::Cancel => "cancel",
        };
        f.write_str(name)
    }
}

/// What happened to an outcome handed to [`OutcomeSlot::settle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Won the guard and reached the waiting request.
    Accepted,
    /// Won the guard, but nobody is waiting any more (caller dropped).
    Orphaned,
    /// Lost the guard; another outcome already settled the request.
    Discarded,
}

impl Settlement {
    pub fn won_guard(self) -> bool {
        !matches!(self, Self::Discarded)
    }
}

/// The guard plus the one-shot channel back to the waiting request.
#[derive(Debug)]
pub struct OutcomeSlot {
    job_id: i64,
    guard: CompletionGuard,
    sender: Mutex<Option<oneshot::Sender<TerminalOutcome>>>,
}

impl OutcomeSlot {
    /// Create a slot and the receiver the request awaits.
    pub fn new(job_id: i64) -> (Arc<Self>, oneshot::Receiver<TerminalOutcome>) {
        let (tx, rx) = oneshot::channel();
        let slot = Self {
            job_id,
            guard: CompletionGuard::new(),
            sender: Mutex::new(Some(tx)),
        };
        (Arc::new(slot), rx)
    }

    pub fn is_settled(&self) -> bool {
        self.guard.is_settled()
    }

    /// Offer a terminal outcome. Only the first offer is delivered.
    pub fn settle(&self, source: OutcomeSource, outcome: TerminalOutcome) -> Settlement {
        if !self.guard.try_claim() {
            tracing::info!(
                job_id = self.job_id,
                %source,
                category = outcome.category(),
                "Discarded outcome, response already settled"
            );
            return Settlement::Discarded;
        }

        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(sender) = sender else {
            // Unreachable while the guard holds: only the winner takes the sender.
            return Settlement::Orphaned;
        };

        let category = outcome.category();
        match sender.send(outcome) {
            Ok(()) => {
                tracing::debug!(job_id = self.job_id, %source, category, "Outcome settled");
                Settlement::Accepted
            }
            Err(_) => {
                tracing::info!(
                    job_id = self.job_id,
                    %source,
                    category,
                    "Outcome settled but the caller is gone"
                );
                Settlement::Orphaned
            }
        }
    }
}
