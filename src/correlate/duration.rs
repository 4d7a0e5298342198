use serde::{Deserialize, Serialize};

use crate::models::ToolCall;

/// Where a call's duration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationSource {
    /// The runner reported a non-zero duration
    Reported,
    /// Gap to the next call claimed by the same window
    NextInWindow,
    /// Gap to the next call in global timestamp order
    NextCall,
    /// Gap to the next transcript turn after the call
    NextTurn,
    /// No usable estimate; duration is 0
    Unknown,
}

/// Inputs shared by every duration estimate of one correlation pass
pub(crate) struct DurationEstimator<'a> {
    /// Resolved turn timestamps in transcript order
    pub turn_ts: &'a [i64],
    /// Estimates at or above this are discarded
    pub max_estimate_ms: u64,
}

impl DurationEstimator<'_> {
    /// Duration of a call, estimated from its neighbours when not reported
    ///
    /// Sources are tried in order: next call in the same window, next call
    /// overall, next turn. A gap that is not strictly inside
    /// `(0, max_estimate_ms)` is discarded.
    pub fn estimate(
        &self,
        call: &ToolCall,
        timestamp_ms: i64,
        next_in_window: Option<i64>,
        next_call: Option<i64>,
    ) -> (u64, DurationSource) {
        if let Some(duration) = call.reported_duration_ms() {
            return (duration, DurationSource::Reported);
        }

        let next_turn = self.turn_ts.iter().copied().find(|&ts| ts > timestamp_ms);

        [
            (next_in_window, DurationSource::NextInWindow),
            (next_call, DurationSource::NextCall),
            (next_turn, DurationSource::NextTurn),
        ]
        .into_iter()
        .find_map(|(next, source)| {
            let gap = next?.checked_sub(timestamp_ms)?;
            let gap = u64::try_from(gap).ok().filter(|&g| g > 0)?;
            (gap < self.max_estimate_ms).then_some((gap, source))
        })
        .unwrap_or((0, DurationSource::Unknown))
    }
}
