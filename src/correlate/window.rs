use serde::{Deserialize, Serialize};

use crate::models::ConversationTurn;

/// How the end of an assistant turn's window was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowEnd {
    /// Bounded by the next user turn
    NextUser,
    /// No user turn follows; assistant timestamp plus the grace buffer
    Grace,
}

/// Half-open processing window `[start_ms, end_ms)` of one assistant turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnWindow {
    /// Index of the assistant turn in the transcript
    pub turn_index: usize,
    /// Inclusive start; `None` when no user turn precedes the assistant turn
    pub start_ms: Option<i64>,
    /// Exclusive end
    pub end_ms: i64,
    pub end_kind: WindowEnd,
}

impl TurnWindow {
    /// Check whether a timestamp falls inside the window
    pub fn contains(&self, timestamp_ms: i64) -> bool {
        self.start_ms.is_none_or(|start| timestamp_ms >= start) && timestamp_ms < self.end_ms
    }

    /// Start of the window, using the earliest instant when it is open
    pub fn start_or_min(&self) -> i64 {
        self.start_ms.unwrap_or(i64::MIN)
    }
}

/// Build one window per assistant turn, in turn order
///
/// `turn_ts` holds the resolved timestamp of every turn; missing entries read as 0.
pub fn compute_windows(turns: &[ConversationTurn], turn_ts: &[i64], grace_ms: u64) -> Vec<TurnWindow> {
    let ts = |i: usize| turn_ts.get(i).copied().unwrap_or_default();

    // Nearest user turn timestamps on either side of each position
    let mut prev_user = vec![None; turns.len()];
    let mut last_user = None;
    for (i, turn) in turns.iter().enumerate() {
        prev_user[i] = last_user;
        if turn.is_user() {
            last_user = Some(ts(i));
        }
    }

    let mut next_user = vec![None; turns.len()];
    let mut upcoming_user = None;
    for (i, turn) in turns.iter().enumerate().rev() {
        next_user[i] = upcoming_user;
        if turn.is_user() {
            upcoming_user = Some(ts(i));
        }
    }

    let grace = i64::try_from(grace_ms).unwrap_or(i64::MAX);

    turns
        .iter()
        .enumerate()
        .filter(|(_, turn)| turn.is_assistant())
        .map(|(i, _)| {
            let (end_ms, end_kind) = match next_user[i] {
                Some(end) => (end, WindowEnd::NextUser),
                None => (ts(i).saturating_add(grace), WindowEnd::Grace),
            };
            TurnWindow {
                turn_index: i,
                start_ms: prev_user[i],
                end_ms,
                end_kind,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(turns: &[ConversationTurn]) -> Vec<i64> {
        turns.iter().map(|t| t.timestamp.resolve(0)).collect()
    }

    #[test]
    fn test_windows_bounded_by_user_turns() {
        let turns = vec![
            ConversationTurn::user("Hi", 0),
            ConversationTurn::assistant("Hello, how can I help?", 1_000),
            ConversationTurn::user("Book 3pm", 4_000),
            ConversationTurn::assistant("Booked", 6_000),
        ];

        let windows = compute_windows(&turns, &resolved(&turns), 500);

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].turn_index, 1);
        assert_eq!(windows[0].start_ms, Some(0));
        assert_eq!(windows[0].end_ms, 4_000);
        assert_eq!(windows[0].end_kind, WindowEnd::NextUser);

        assert_eq!(windows[1].turn_index, 3);
        assert_eq!(windows[1].start_ms, Some(4_000));
        assert_eq!(windows[1].end_ms, 6_500);
        assert_eq!(windows[1].end_kind, WindowEnd::Grace);

        // Consecutive user-delimited windows never overlap
        assert!(windows[0].end_ms <= windows[1].start_or_min());
    }

    #[test]
    fn test_open_start_without_preceding_user() {
        let turns = vec![
            ConversationTurn::assistant("Thanks for calling", 2_000),
            ConversationTurn::user("Hi", 3_000),
        ];

        let windows = compute_windows(&turns, &resolved(&turns), 500);

        assert_eq!(windows[0].start_ms, None);
        assert!(windows[0].contains(-5_000));
        assert!(windows[0].contains(2_999));
        assert!(!windows[0].contains(3_000));
    }

    #[test]
    fn test_half_open_bounds() {
        let window = TurnWindow {
            turn_index: 1,
            start_ms: Some(100),
            end_ms: 200,
            end_kind: WindowEnd::NextUser,
        };

        assert!(!window.contains(99));
        assert!(window.contains(100));
        assert!(window.contains(199));
        assert!(!window.contains(200));
    }
}
