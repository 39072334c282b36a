//! Registry of calls awaiting a response from the modem.
//!
//! `TransactionRegistry` maps each [`CorrelationKey`] to the completion
//! channel of the one call currently waiting on it. Registration, resolution,
//! cancellation and expiry all take the entry out of the map before touching
//! its channel, so whichever path removes the entry first owns the outcome
//! and no response is ever delivered twice. Per-shard `DashMap` locks are
//! held only for the map mutation itself, never across I/O.

use std::{
    io,
    sync::{
        Arc,
        OnceLock,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::{
    sync::oneshot,
    time::{Duration, Instant},
};
use tracing::{debug, trace};

use crate::{
    codec::ResponseFrame,
    correlation::{CorrelationKey, SessionHandle},
    error::CallError,
    metrics,
};

type Outcome = Result<ResponseFrame, CallError>;

/// Horizon used when a timeout is too large to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `start + timeout`, saturating at a deadline decades away.
pub(crate) fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

struct PendingEntry {
    ticket: u64,
    issued: Instant,
    deadline: Instant,
    tx: oneshot::Sender<Outcome>,
}

/// Concurrent map of pending calls keyed by [`CorrelationKey`].
#[derive(Default)]
pub struct TransactionRegistry {
    pending: DashMap<CorrelationKey, PendingEntry>,
    next_ticket: AtomicU64,
    closed: OnceLock<CallError>,
}

impl std::fmt::Debug for TransactionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionRegistry")
            .field("pending", &self.pending.len())
            .field("closed", &self.closed.get().is_some())
            .finish()
    }
}

impl TransactionRegistry {
    /// Create an empty registry ready to be shared between tasks.
    #[must_use]
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// Register a call for `key` that expires after `timeout`.
    ///
    /// A timeout too large to represent behaves as no deadline at all.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::DuplicateKey`] when a call for `key` is already
    /// pending, or the closing error once [`fail_all`](Self::fail_all) has
    /// run.
    pub fn register(
        self: &Arc<Self>,
        key: CorrelationKey,
        timeout: Duration,
    ) -> Result<PendingCall, CallError> {
        if let Some(error) = self.closed.get() {
            return Err(error.clone());
        }
        let issued = Instant::now();
        let deadline = deadline_after(issued, timeout);
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        match self.pending.entry(key) {
            Entry::Occupied(_) => {
                debug!(%key, "rejecting call: key already pending");
                return Err(CallError::DuplicateKey(key));
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingEntry {
                    ticket,
                    issued,
                    deadline,
                    tx,
                });
            }
        }
        metrics::inc_pending();

        // `fail_all` may have drained the map between the check above and the
        // insert; never leave an entry behind in a closed registry.
        if let Some(error) = self.closed.get() {
            self.remove_ticket(&key, ticket);
            return Err(error.clone());
        }

        trace!(%key, ticket, ?timeout, "call registered");
        Ok(PendingCall {
            registry: Arc::clone(self),
            key,
            ticket,
            deadline,
            rx,
        })
    }

    /// Deliver `response` to the call pending on `key`.
    ///
    /// Returns whether a waiter existed. Without one the response is left to
    /// the caller to route or drop.
    pub fn resolve(&self, key: &CorrelationKey, response: ResponseFrame) -> bool {
        let Some((_, entry)) = self.pending.remove(key) else {
            return false;
        };
        metrics::dec_pending();
        trace!(
            %key,
            ticket = entry.ticket,
            elapsed = ?entry.issued.elapsed(),
            "call resolved"
        );
        if entry.tx.send(Ok(response)).is_err() {
            debug!(%key, "waiter went away before its response arrived");
        }
        true
    }

    /// Remove the entry owned by `call` without completing it.
    ///
    /// Returns `false` when the call was already resolved, expired or
    /// cancelled.
    pub fn cancel(&self, call: &PendingCall) -> bool { self.remove_ticket(&call.key, call.ticket) }

    /// Complete every call whose deadline is at or before `now` with
    /// [`CallError::Timeout`].
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let expired: Vec<CorrelationKey> = self
            .pending
            .iter()
            .filter(|entry| entry.deadline <= now)
            .map(|entry| *entry.key())
            .collect();

        let mut swept = 0;
        for key in expired {
            if let Some((_, entry)) = self.pending.remove_if(&key, |_, e| e.deadline <= now) {
                metrics::dec_pending();
                debug!(%key, "call expired");
                let _ = entry.tx.send(Err(CallError::Timeout(key)));
                swept += 1;
            }
        }
        swept
    }

    /// Fail every call scoped to `session` with [`CallError::SessionClosed`].
    pub fn cancel_session(&self, session: SessionHandle) -> usize {
        let keys: Vec<CorrelationKey> = self
            .pending
            .iter()
            .filter(|entry| entry.key().session == session)
            .map(|entry| *entry.key())
            .collect();
        self.complete_all(keys, &CallError::SessionClosed(session))
    }

    /// Fail every pending call and refuse new registrations.
    ///
    /// The first error recorded wins; later calls reuse it.
    pub fn fail_all(&self, error: CallError) -> usize {
        let error = self.closed.get_or_init(|| error).clone();
        let keys: Vec<CorrelationKey> = self.pending.iter().map(|entry| *entry.key()).collect();
        self.complete_all(keys, &error)
    }

    /// Whether [`fail_all`](Self::fail_all) has closed the registry.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.closed.get().is_some() }

    /// Whether a call is pending on `key`.
    #[must_use]
    pub fn contains(&self, key: &CorrelationKey) -> bool { self.pending.contains_key(key) }

    /// Number of pending calls.
    #[must_use]
    pub fn len(&self) -> usize { self.pending.len() }

    /// Whether no calls are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.pending.is_empty() }

    fn complete_all(&self, keys: Vec<CorrelationKey>, error: &CallError) -> usize {
        let mut completed = 0;
        for key in keys {
            if let Some((_, entry)) = self.pending.remove(&key) {
                metrics::dec_pending();
                let _ = entry.tx.send(Err(error.clone()));
                completed += 1;
            }
        }
        if completed > 0 {
            debug!(completed, %error, "pending calls terminated");
        }
        completed
    }

    fn remove_ticket(&self, key: &CorrelationKey, ticket: u64) -> bool {
        let removed = self
            .pending
            .remove_if(key, |_, entry| entry.ticket == ticket)
            .is_some();
        if removed {
            metrics::dec_pending();
        }
        removed
    }
}

/// Handle to one registered call.
///
/// Dropping the handle cancels the call if it is still pending, so an
/// abandoned caller never leaves a stale entry that could capture a later
/// response.
#[must_use = "a pending call is cancelled when dropped"]
pub struct PendingCall {
    registry: Arc<TransactionRegistry>,
    key: CorrelationKey,
    ticket: u64,
    deadline: Instant,
    rx: oneshot::Receiver<Outcome>,
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("key", &self.key)
            .field("ticket", &self.ticket)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl PendingCall {
    /// Correlation key the call is registered under.
    #[must_use]
    pub fn key(&self) -> CorrelationKey { self.key }

    /// Instant after which the call resolves as a timeout.
    #[must_use]
    pub fn deadline(&self) -> Instant { self.deadline }

    /// Wait for the response, or for the deadline.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Timeout`] when the deadline passes first, or the
    /// error the registry completed the call with.
    pub async fn wait(mut self) -> Result<ResponseFrame, CallError> {
        match tokio::time::timeout_at(self.deadline, &mut self.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(orphaned()),
            Err(_) => {
                if self.registry.remove_ticket(&self.key, self.ticket) {
                    debug!(key = %self.key, "call timed out");
                    return Err(CallError::Timeout(self.key));
                }
                // Another path removed the entry first; its outcome stands.
                match self.rx.try_recv() {
                    Ok(outcome) => outcome,
                    Err(_) => Err(CallError::Timeout(self.key)),
                }
            }
        }
    }

    /// Withdraw the call. Returns `false` if it already completed.
    pub fn cancel(self) -> bool { self.registry.cancel(&self) }
}

impl Drop for PendingCall {
    fn drop(&mut self) { self.registry.remove_ticket(&self.key, self.ticket); }
}

fn orphaned() -> CallError {
    CallError::transport(io::Error::new(
        io::ErrorKind::BrokenPipe,
        "call registry dropped the pending call",
    ))
}
