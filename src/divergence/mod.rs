pub mod similarity;

pub use similarity::*;

use serde::Serialize;
use tracing::info;

use crate::models::ConversationTurn;

/// Configuration for transcript comparison
#[derive(Debug, Clone)]
pub struct DivergenceConfig {
    /// Turns with the same role below this word similarity count as modified
    pub similarity_threshold: f64,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
        }
    }
}

/// Classification of one transcript position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Same,
    Modified,
    /// Only the compare transcript has a turn here
    Added,
    /// Only the base transcript has a turn here
    Removed,
}

/// One position of a transcript comparison
#[derive(Debug, Clone, Serialize)]
pub struct DiffEntry {
    pub index: usize,
    pub base_turn: Option<ConversationTurn>,
    pub compare_turn: Option<ConversationTurn>,
    pub change_type: ChangeType,
    /// Word similarity, present when both sides have a turn
    pub similarity: Option<f64>,
    pub is_first_divergence: bool,
    pub base_validation_passed: Option<bool>,
    pub compare_validation_passed: Option<bool>,
}

/// Compare two runs of the same scripted test position by position
///
/// Only the first position that is not `Same` is flagged as the divergence
/// point. The result always has `max(base.len(), compare.len())` entries.
pub fn diff(
    base: &[ConversationTurn],
    compare: &[ConversationTurn],
    config: &DivergenceConfig,
) -> Vec<DiffEntry> {
    let n = base.len().max(compare.len());
    let mut diverged = false;

    let entries: Vec<DiffEntry> = (0..n)
        .map(|index| {
            let base_turn = base.get(index);
            let compare_turn = compare.get(index);

            let (change_type, similarity) = classify(base_turn, compare_turn, config);

            let is_first_divergence = !diverged && change_type != ChangeType::Same;
            diverged |= is_first_divergence;

            DiffEntry {
                index,
                base_turn: base_turn.cloned(),
                compare_turn: compare_turn.cloned(),
                change_type,
                similarity,
                is_first_divergence,
                base_validation_passed: base_turn.and_then(|t| t.validation_passed),
                compare_validation_passed: compare_turn.and_then(|t| t.validation_passed),
            }
        })
        .collect();

    match first_divergence(&entries) {
        Some(index) => info!("Transcripts diverge at turn {} of {}", index, n),
        None => info!("Transcripts match across {} turns", n),
    }

    entries
}

fn classify(
    base: Option<&ConversationTurn>,
    compare: Option<&ConversationTurn>,
    config: &DivergenceConfig,
) -> (ChangeType, Option<f64>) {
    match (base, compare) {
        (Some(b), Some(c)) => {
            let similarity = word_similarity(&b.content, &c.content);
            let change = if b.role != c.role || similarity < config.similarity_threshold {
                ChangeType::Modified
            } else {
                ChangeType::Same
            };
            (change, Some(similarity))
        }
        (Some(_), None) => (ChangeType::Removed, None),
        (None, Some(_)) => (ChangeType::Added, None),
        // Unreachable for index < max(len)
        (None, None) => (ChangeType::Same, None),
    }
}

/// Index of the flagged divergence point, if any
pub fn first_divergence(entries: &[DiffEntry]) -> Option<usize> {
    entries.iter().find(|e| e.is_first_divergence).map(|e| e.index)
}

/// Counts per change type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub same: usize,
    pub modified: usize,
    pub added: usize,
    pub removed: usize,
    pub first_divergence: Option<usize>,
}

impl DiffSummary {
    pub fn from_entries(entries: &[DiffEntry]) -> Self {
        let mut summary = entries.iter().fold(Self::default(), |mut s, e| {
            match e.change_type {
                ChangeType::Same => s.same += 1,
                ChangeType::Modified => s.modified += 1,
                ChangeType::Added => s.added += 1,
                ChangeType::Removed => s.removed += 1,
            }
            s
        });
        summary.first_divergence = first_divergence(entries);
        summary
    }

    pub fn is_identical(&self) -> bool {
        self.first_divergence.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn script(lines: &[(Role, &str)]) -> Vec<ConversationTurn> {
        lines
            .iter()
            .enumerate()
            .map(|(i, (role, text))| ConversationTurn::new(*role, *text, (i as i64 * 1_000).into()))
            .collect()
    }

    fn flagged(entries: &[DiffEntry]) -> Vec<usize> {
        entries
            .iter()
            .filter(|e| e.is_first_divergence)
            .map(|e| e.index)
            .collect()
    }

    #[test]
    fn test_added_tail() {
        let base = script(&[(Role::User, "Hi"), (Role::Assistant, "Book 3pm")]);
        let compare = script(&[
            (Role::User, "Hi"),
            (Role::Assistant, "Book 3pm"),
            (Role::User, "Confirmed"),
        ]);

        let entries = diff(&base, &compare, &DivergenceConfig::default());

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].change_type, ChangeType::Same);
        assert_eq!(entries[1].change_type, ChangeType::Same);
        assert_eq!(entries[2].change_type, ChangeType::Added);
        assert!(entries[2].base_turn.is_none());
        assert_eq!(flagged(&entries), vec![2]);
    }

    #[test]
    fn test_removed_tail() {
        let base = script(&[(Role::User, "Hi"), (Role::Assistant, "Hello")]);
        let compare = script(&[(Role::User, "Hi")]);

        let entries = diff(&base, &compare, &DivergenceConfig::default());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].change_type, ChangeType::Removed);
        assert!(entries[1].similarity.is_none());
    }

    #[test]
    fn test_only_first_divergence_flagged() {
        let base = script(&[
            (Role::User, "I need to reschedule"),
            (Role::Assistant, "Sure, what day works?"),
            (Role::User, "Tuesday"),
            (Role::Assistant, "Tuesday at 3pm is open"),
        ]);
        let compare = script(&[
            (Role::User, "I need to reschedule"),
            (Role::Assistant, "Let me transfer you"),
            (Role::User, "Wait what"),
        ]);

        let entries = diff(&base, &compare, &DivergenceConfig::default());

        assert_eq!(entries[0].change_type, ChangeType::Same);
        assert_eq!(entries[1].change_type, ChangeType::Modified);
        assert_eq!(entries[2].change_type, ChangeType::Modified);
        assert_eq!(entries[3].change_type, ChangeType::Removed);
        assert_eq!(flagged(&entries), vec![1]);
        assert_eq!(first_divergence(&entries), Some(1));
    }

    #[test]
    fn test_role_mismatch_is_modified() {
        let base = script(&[(Role::User, "Hello")]);
        let compare = script(&[(Role::Assistant, "Hello")]);

        let entries = diff(&base, &compare, &DivergenceConfig::default());

        assert_eq!(entries[0].similarity, Some(1.0));
        assert_eq!(entries[0].change_type, ChangeType::Modified);
        assert!(entries[0].is_first_divergence);
    }

    #[test]
    fn test_identical_transcripts() {
        let turns = script(&[(Role::User, "Hi"), (Role::Assistant, "Hello there")]);

        let entries = diff(&turns, &turns, &DivergenceConfig::default());
        let summary = DiffSummary::from_entries(&entries);

        assert!(flagged(&entries).is_empty());
        assert!(summary.is_identical());
        assert_eq!(summary.same, 2);
    }

    #[test]
    fn test_length_is_max_of_inputs() {
        let long = script(&[(Role::User, "a"), (Role::Assistant, "b"), (Role::User, "c")]);
        let short = script(&[(Role::User, "a")]);

        for (a, b) in [(&long, &short), (&short, &long), (&long, &long)] {
            assert_eq!(diff(a, b, &DivergenceConfig::default()).len(), a.len().max(b.len()));
        }
        assert!(diff(&[], &[], &DivergenceConfig::default()).is_empty());
    }

    #[test]
    fn test_validation_flags_copied() {
        let mut base = script(&[(Role::Assistant, "Booked")]);
        let mut compare = base.clone();
        base[0].validation_passed = Some(true);
        compare[0].validation_passed = Some(false);

        let entries = diff(&base, &compare, &DivergenceConfig::default());

        assert_eq!(entries[0].base_validation_passed, Some(true));
        assert_eq!(entries[0].compare_validation_passed, Some(false));
        assert_eq!(entries[0].change_type, ChangeType::Same);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let base = script(&[(Role::Assistant, "book at 3pm")]);
        let compare = script(&[(Role::Assistant, "book at 4pm")]);
        let lenient = DivergenceConfig {
            similarity_threshold: 0.5,
        };

        assert_eq!(diff(&base, &compare, &lenient)[0].change_type, ChangeType::Same);
        assert_eq!(
            diff(&base, &compare, &DivergenceConfig::default())[0].change_type,
            ChangeType::Modified
        );
    }

    #[test]
    fn test_summary_counts() {
        let base = script(&[(Role::User, "Hi"), (Role::Assistant, "x y z")]);
        let compare = script(&[(Role::User, "Hi"), (Role::Assistant, "a b c"), (Role::User, "more")]);

        let summary = DiffSummary::from_entries(&diff(&base, &compare, &DivergenceConfig::default()));

        assert_eq!(
            summary,
            DiffSummary {
                same: 1,
                modified: 1,
                added: 1,
                removed: 0,
                first_divergence: Some(1),
            }
        );
    }
}
