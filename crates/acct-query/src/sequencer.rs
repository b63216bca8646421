#![forbid(unsafe_code)]

//! Request sequencing with token-based staleness prevention.
//!
//! Every submitted lookup receives a [`RequestToken`] from a
//! [`RequestSequencer`]. Tokens strictly increase; starting a request
//! supersedes every request still in flight, and a completion is applied only
//! if its token is the newest one issued. Responses that arrive out of order
//! therefore never overwrite results of a later submission.
//!
//! Lifecycle transitions are recorded in a [`QueryTrace`] that can be
//! checksummed for golden comparisons and checked for invariant violations.
//! The trace keeps only the most recent events (see
//! [`DEFAULT_TRACE_CAPACITY`]), so a long-lived sequencer uses bounded memory.

use std::collections::VecDeque;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use web_time::Instant;

// ---------------------------------------------------------------------------
// RequestToken
// ---------------------------------------------------------------------------

/// A monotonically increasing request sequence number.
///
/// # Invariants
///
/// - Tokens are strictly monotonic per sequencer.
/// - Token 0 is reserved for "no request".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RequestToken(u64);

impl RequestToken {
    /// The null token representing no request.
    pub const NONE: Self = Self(0);

    /// Create a token from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw token value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Check if this is the null token.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Request({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// QueryEvent
// ---------------------------------------------------------------------------

/// An event in the request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryEvent {
    /// A request was issued.
    Started {
        token: RequestToken,
        elapsed_ns: u64,
    },

    /// An in-flight request was superseded by a newer one.
    Superseded {
        token: RequestToken,
        superseded_by: RequestToken,
        elapsed_ns: u64,
    },

    /// A response (or failure) arrived.
    Completed {
        token: RequestToken,
        succeeded: bool,
        duration_ns: u64,
        elapsed_ns: u64,
    },

    /// The completion was applied to the result state.
    Applied {
        token: RequestToken,
        succeeded: bool,
        elapsed_ns: u64,
    },

    /// The completion was discarded because a newer request exists.
    StaleDiscarded {
        token: RequestToken,
        current_token: RequestToken,
        elapsed_ns: u64,
    },

    /// The caller abandoned the request before it completed.
    Cancelled {
        token: RequestToken,
        elapsed_ns: u64,
    },
}

impl QueryEvent {
    /// The token this event belongs to.
    #[must_use]
    pub fn token(&self) -> RequestToken {
        match self {
            Self::Started { token, .. }
            | Self::Superseded { token, .. }
            | Self::Completed { token, .. }
            | Self::Applied { token, .. }
            | Self::StaleDiscarded { token, .. }
            | Self::Cancelled { token, .. } => *token,
        }
    }

    /// Event type name for logging.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Superseded { .. } => "superseded",
            Self::Completed { .. } => "completed",
            Self::Applied { .. } => "applied",
            Self::StaleDiscarded { .. } => "stale_discarded",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

// ---------------------------------------------------------------------------
// QueryTrace
// ---------------------------------------------------------------------------

/// Number of events a [`QueryTrace`] keeps unless told otherwise.
pub const DEFAULT_TRACE_CAPACITY: usize = 1024;

/// Ordered log of the most recent request lifecycle events.
///
/// Once `capacity` events are held, each push evicts the oldest one.
#[derive(Debug, Clone)]
pub struct QueryTrace {
    events: VecDeque<QueryEvent>,
    capacity: usize,
    evicted: u64,
}

impl Default for QueryTrace {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TRACE_CAPACITY)
    }
}

impl QueryTrace {
    /// Create an empty trace with [`DEFAULT_TRACE_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty trace holding at most `capacity` events (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_TRACE_CAPACITY)),
            capacity,
            evicted: 0,
        }
    }

    /// Append an event, evicting the oldest one when full.
    pub fn push(&mut self, event: QueryEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.evicted += 1;
        }
        self.events.push_back(event);
    }

    /// Retained events, oldest first.
    pub fn events(&self) -> impl ExactSizeIterator<Item = &QueryEvent> {
        self.events.iter()
    }

    /// Maximum number of retained events.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events dropped to stay within capacity.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Whether an event of `event_type` was recorded for `token`.
    #[must_use]
    pub fn contains_event_type(&self, token: RequestToken, event_type: &str) -> bool {
        self.events
            .iter()
            .any(|e| e.token() == token && e.event_type() == event_type)
    }

    /// Events recorded for `token`.
    #[must_use]
    pub fn events_for_token(&self, token: RequestToken) -> Vec<&QueryEvent> {
        self.events.iter().filter(|e| e.token() == token).collect()
    }

    /// Checksum over every retained event and its position.
    #[must_use]
    pub fn checksum(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for event in &self.events {
            event.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the trace is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Check trace invariants over the retained window, returning one
    /// description per violation.
    ///
    /// 1. `Started` tokens strictly increase.
    /// 2. `StaleDiscarded` tokens are older than the token current at the time.
    /// 3. At most one `Applied` per token, never after a `StaleDiscarded` or
    ///    `Cancelled` for it.
    #[must_use]
    pub fn verify_invariants(&self) -> Vec<String> {
        let mut violations = Vec::new();

        let mut last_started = RequestToken::NONE;
        for event in &self.events {
            if let QueryEvent::Started { token, .. } = event {
                if *token <= last_started {
                    violations.push(format!(
                        "Non-monotonic start token: {token} after {last_started}"
                    ));
                }
                last_started = *token;
            }
        }

        for event in &self.events {
            if let QueryEvent::StaleDiscarded {
                token,
                current_token,
                ..
            } = event
                && token >= current_token
            {
                violations.push(format!(
                    "StaleDiscarded with non-stale token: {token} >= {current_token}"
                ));
            }
        }

        let mut applied: Vec<RequestToken> = Vec::new();
        let mut discarded: Vec<RequestToken> = Vec::new();
        for event in &self.events {
            match event {
                QueryEvent::Applied { token, .. } => {
                    if applied.contains(token) {
                        violations.push(format!("{token} applied twice"));
                    }
                    if discarded.contains(token) {
                        violations.push(format!("{token} applied after being discarded"));
                    }
                    applied.push(*token);
                }
                QueryEvent::StaleDiscarded { token, .. } | QueryEvent::Cancelled { token, .. } => {
                    discarded.push(*token);
                }
                _ => {}
            }
        }

        violations
    }
}

// ---------------------------------------------------------------------------
// RequestSequencer
// ---------------------------------------------------------------------------

/// Outcome of reporting a completion to the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The token is current; apply the result.
    Apply,
    /// A newer request exists; discard the result.
    Stale {
        /// The newest token at the time of completion.
        current: RequestToken,
    },
}

impl Completion {
    /// Whether the result should be applied.
    #[must_use]
    pub fn should_apply(self) -> bool {
        matches!(self, Self::Apply)
    }
}

/// Issues request tokens and decides which completions may be applied.
///
/// Single-threaded: the controller owns it and never holds it across an
/// `await`.
pub struct RequestSequencer {
    next_token: u64,
    current_token: RequestToken,
    in_flight: Option<RequestToken>,
    trace: QueryTrace,
    created_at: Instant,
    fixed_clock: Option<Arc<AtomicU64>>,
}

impl fmt::Debug for RequestSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSequencer")
            .field("current_token", &self.current_token)
            .field("in_flight", &self.in_flight)
            .field("trace_events", &self.trace.len())
            .finish()
    }
}

impl Default for RequestSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestSequencer {
    /// Create a sequencer timing events with the monotonic clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_token: 1,
            current_token: RequestToken::NONE,
            in_flight: None,
            trace: QueryTrace::new(),
            created_at: Instant::now(),
            fixed_clock: None,
        }
    }

    /// Create a sequencer whose event timestamps come from `clock`
    /// (nanoseconds since creation), for deterministic traces.
    #[must_use]
    pub fn with_fixed_clock(clock: Arc<AtomicU64>) -> Self {
        Self {
            fixed_clock: Some(clock),
            ..Self::new()
        }
    }

    /// Keep at most `capacity` trace events instead of
    /// [`DEFAULT_TRACE_CAPACITY`].
    #[must_use]
    pub fn with_trace_capacity(mut self, capacity: usize) -> Self {
        self.trace = QueryTrace::with_capacity(capacity);
        self
    }

    fn elapsed_ns(&self) -> u64 {
        self.fixed_clock.as_ref().map_or_else(
            || self.created_at.elapsed().as_nanos() as u64,
            |clock| clock.load(Ordering::SeqCst),
        )
    }

    /// Issue the next token, superseding the request still in flight.
    pub fn start(&mut self) -> RequestToken {
        let token = RequestToken(self.next_token);
        self.next_token += 1;
        let elapsed = self.elapsed_ns();

        if let Some(previous) = self.in_flight.replace(token) {
            tracing::debug!(
                token = previous.raw(),
                superseded_by = token.raw(),
                "request superseded"
            );
            self.trace.push(QueryEvent::Superseded {
                token: previous,
                superseded_by: token,
                elapsed_ns: elapsed,
            });
        }
        self.current_token = token;
        self.trace.push(QueryEvent::Started {
            token,
            elapsed_ns: elapsed,
        });
        token
    }

    /// Record the completion of `token` and decide whether to apply it.
    pub fn complete(&mut self, token: RequestToken, succeeded: bool, duration: Duration) -> Completion {
        let elapsed = self.elapsed_ns();
        self.trace.push(QueryEvent::Completed {
            token,
            succeeded,
            duration_ns: duration.as_nanos() as u64,
            elapsed_ns: elapsed,
        });
        if self.in_flight == Some(token) {
            self.in_flight = None;
        }

        if token < self.current_token {
            self.trace.push(QueryEvent::StaleDiscarded {
                token,
                current_token: self.current_token,
                elapsed_ns: elapsed,
            });
            return Completion::Stale {
                current: self.current_token,
            };
        }

        self.trace.push(QueryEvent::Applied {
            token,
            succeeded,
            elapsed_ns: elapsed,
        });
        Completion::Apply
    }

    /// The newest token issued.
    #[must_use]
    pub fn current_token(&self) -> RequestToken {
        self.current_token
    }

    /// Abandon `token` without a result.
    ///
    /// Returns `true` if it was the request in flight, which then stops being
    /// pending. Superseded or completed tokens are left alone.
    pub fn cancel(&mut self, token: RequestToken) -> bool {
        if self.in_flight != Some(token) {
            return false;
        }
        self.in_flight = None;
        tracing::debug!(token = token.raw(), "request cancelled");
        self.trace.push(QueryEvent::Cancelled {
            token,
            elapsed_ns: self.elapsed_ns(),
        });
        true
    }

    /// The request issued and neither completed, superseded nor cancelled.
    #[must_use]
    pub fn in_flight(&self) -> Option<RequestToken> {
        self.in_flight
    }

    /// Whether the newest request is still outstanding.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The event trace.
    #[must_use]
    pub fn trace(&self) -> &QueryTrace {
        &self.trace
    }

    /// Verify trace invariants.
    pub fn verify_trace(&self) -> Result<(), Vec<String>> {
        let violations = self.trace.verify_invariants();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}
