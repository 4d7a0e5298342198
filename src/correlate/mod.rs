pub mod duration;
pub mod window;

pub use duration::DurationSource;
pub use window::*;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::models::{base_time, ConversationTurn, ToolCall};

use duration::DurationEstimator;

/// Configuration for turn/call correlation
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    /// Window tail after an assistant turn that no user turn follows
    pub grace_ms: u64,
    /// Estimated durations at or above this are treated as unreliable
    pub max_estimate_ms: u64,
    /// Set aside framework-internal observations before assignment
    pub exclude_internal: bool,
    /// Tool name fragments that identify framework-internal observations
    pub internal_name_patterns: Vec<String>,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            grace_ms: 500,
            max_estimate_ms: 30_000,
            exclude_internal: false,
            internal_name_patterns: vec![
                "RunnableMap".to_string(),
                "RunnableLambda".to_string(),
                "RunnableSequence".to_string(),
                "RunnableParallel".to_string(),
                "RunnableBranch".to_string(),
                "RunnablePassthrough".to_string(),
            ],
        }
    }
}

impl CorrelatorConfig {
    fn is_internal(&self, call: &ToolCall) -> bool {
        self.exclude_internal
            && self
                .internal_name_patterns
                .iter()
                .any(|p| call.tool_name.contains(p.as_str()))
    }
}

/// A call placed by the correlator, with its resolved timing
#[derive(Debug, Clone, Serialize)]
pub struct AssignedCall {
    pub call: ToolCall,
    /// Timestamp resolved against the run base time
    pub timestamp_ms: i64,
    pub duration_ms: u64,
    pub duration_source: DurationSource,
}

/// Aggregate figures for the calls of one turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallSummary {
    pub call_count: usize,
    pub failed_count: usize,
    pub total_duration_ms: u64,
}

/// The calls attributed to one assistant turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnCalls {
    pub window: TurnWindow,
    /// Claimed calls in timestamp order
    pub calls: Vec<AssignedCall>,
}

impl TurnCalls {
    pub fn summary(&self) -> CallSummary {
        summarize(&self.calls)
    }
}

/// Result of correlating a transcript with its calls
#[derive(Debug, Clone, Serialize)]
pub struct Correlation {
    /// Instant that unparsable timestamps were resolved to
    pub base_time_ms: i64,
    /// One entry per assistant turn, keyed by turn index
    pub turns: BTreeMap<usize, TurnCalls>,
    /// Calls no window claimed, in timestamp order
    pub unassociated: Vec<AssignedCall>,
    /// Framework-internal calls set aside before assignment
    pub excluded: Vec<AssignedCall>,
}

impl Correlation {
    /// Calls attributed to a turn (empty for user turns and unknown indices)
    pub fn calls_for_turn(&self, turn_index: usize) -> &[AssignedCall] {
        self.turns
            .get(&turn_index)
            .map(|t| t.calls.as_slice())
            .unwrap_or(&[])
    }

    /// Number of calls attributed to some turn
    pub fn assigned_count(&self) -> usize {
        self.turns.values().map(|t| t.calls.len()).sum()
    }

    /// Number of calls accounted for, across all buckets
    pub fn total_calls(&self) -> usize {
        self.assigned_count() + self.unassociated.len() + self.excluded.len()
    }

    pub fn unassociated_summary(&self) -> CallSummary {
        summarize(&self.unassociated)
    }
}

fn summarize(calls: &[AssignedCall]) -> CallSummary {
    CallSummary {
        call_count: calls.len(),
        failed_count: calls.iter().filter(|c| c.call.error_signal().is_error()).count(),
        total_duration_ms: calls
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(c.duration_ms)),
    }
}

/// Calls claimed so far, threaded through the fold over assistant windows
struct Claims {
    /// Indexed by position in the sorted call list
    claimed: Vec<bool>,
    /// Sorted positions claimed by each window, in window order
    by_window: Vec<Vec<usize>>,
}

impl Claims {
    fn new(call_count: usize) -> Self {
        Self {
            claimed: vec![false; call_count],
            by_window: Vec::new(),
        }
    }

    /// Claim every unclaimed call inside the window
    fn claim_window(mut self, window: &TurnWindow, sorted_ts: &[i64]) -> Self {
        let mut positions = Vec::new();
        for (pos, &ts) in sorted_ts.iter().enumerate() {
            if !self.claimed[pos] && window.contains(ts) {
                self.claimed[pos] = true;
                positions.push(pos);
            }
        }
        self.by_window.push(positions);
        self
    }
}

/// Assign each call to the assistant turn whose processing window contains it
///
/// Windows are claimed first-come in turn order, so a call lands in at most
/// one turn even when windows overlap. Calls no window claims are returned as
/// unassociated. Malformed timestamps resolve to the run base time; this never
/// fails.
pub fn correlate(
    turns: &[ConversationTurn],
    calls: &[ToolCall],
    config: &CorrelatorConfig,
) -> Correlation {
    let base_time_ms = base_time(
        turns
            .iter()
            .map(|t| &t.timestamp)
            .chain(calls.iter().map(|c| &c.timestamp)),
    );

    let turn_ts: Vec<i64> = turns.iter().map(|t| t.timestamp.resolve(base_time_ms)).collect();
    let windows = compute_windows(turns, &turn_ts, config.grace_ms);

    let (candidates, internal): (Vec<&ToolCall>, Vec<&ToolCall>) =
        calls.iter().partition(|c| !config.is_internal(c));

    // Stable sort keeps input order for equal timestamps
    let mut sorted: Vec<(i64, &ToolCall)> = candidates
        .into_iter()
        .map(|c| (c.timestamp.resolve(base_time_ms), c))
        .collect();
    sorted.sort_by_key(|(ts, _)| *ts);
    let sorted_ts: Vec<i64> = sorted.iter().map(|(ts, _)| *ts).collect();

    let claims = windows
        .iter()
        .fold(Claims::new(sorted.len()), |claims, window| {
            claims.claim_window(window, &sorted_ts)
        });

    let estimator = DurationEstimator {
        turn_ts: &turn_ts,
        max_estimate_ms: config.max_estimate_ms,
    };

    let place = |pos: usize, next_in_window: Option<i64>| {
        let (timestamp_ms, call) = sorted[pos];
        let next_call = sorted_ts.get(pos + 1).copied();
        let (duration_ms, duration_source) =
            estimator.estimate(call, timestamp_ms, next_in_window, next_call);
        AssignedCall {
            call: call.clone(),
            timestamp_ms,
            duration_ms,
            duration_source,
        }
    };

    let turn_calls: BTreeMap<usize, TurnCalls> = windows
        .into_iter()
        .zip(&claims.by_window)
        .map(|(window, positions)| {
            let calls = positions
                .iter()
                .enumerate()
                .map(|(k, &pos)| place(pos, positions.get(k + 1).map(|&next| sorted_ts[next])))
                .collect();
            debug!(
                "Turn {}: window [{:?}, {}) claimed {} calls",
                window.turn_index,
                window.start_ms,
                window.end_ms,
                positions.len()
            );
            (window.turn_index, TurnCalls { window, calls })
        })
        .collect();

    let unassociated: Vec<AssignedCall> = (0..sorted.len())
        .filter(|&pos| !claims.claimed[pos])
        .map(|pos| place(pos, None))
        .collect();

    let excluded: Vec<AssignedCall> = internal
        .into_iter()
        .map(|call| {
            let timestamp_ms = call.timestamp.resolve(base_time_ms);
            let (duration_ms, duration_source) = estimator.estimate(call, timestamp_ms, None, None);
            AssignedCall {
                call: call.clone(),
                timestamp_ms,
                duration_ms,
                duration_source,
            }
        })
        .collect();

    let correlation = Correlation {
        base_time_ms,
        turns: turn_calls,
        unassociated,
        excluded,
    };

    info!(
        "Correlated {} calls with {} assistant turns ({} unassociated, {} excluded)",
        calls.len(),
        correlation.turns.len(),
        correlation.unassociated.len(),
        correlation.excluded.len()
    );

    correlation
}
