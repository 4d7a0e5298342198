use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::models::{Fix, FixStatus};

use super::{compare_confidence, group_pending, ConflictGroup};

/// Errors from resolving conflict groups or applying their transitions
#[derive(Debug, Error, PartialEq)]
pub enum ArbiterError {
    #[error("strategy `second` needs at least two fixes, group {group_key} has {count}")]
    NotEnoughFixes { group_key: String, count: usize },
    #[error("fix {0} is not part of this resolution")]
    UnknownFix(String),
    #[error("fix {fix_id} is {status:?}, not pending")]
    NotPending { fix_id: String, status: FixStatus },
    #[error("fix {0} appears more than once in the transitions")]
    DuplicateTransition(String),
    #[error("no pending fix group {0}")]
    UnknownGroup(String),
    #[error("unknown strategy `{0}` (expected first, second, skip or merge)")]
    UnknownStrategy(String),
}

/// How an operator chose to settle a conflict group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Apply the highest-confidence fix, reject the rest
    First,
    /// Apply the runner-up, reject the rest
    Second,
    /// Reject every fix in the group
    Skip,
    /// Hand the ranked fixes back for the caller to combine
    Merge,
}

impl FromStr for ResolutionStrategy {
    type Err = ArbiterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" => Ok(Self::First),
            "second" => Ok(Self::Second),
            "skip" => Ok(Self::Skip),
            "merge" => Ok(Self::Merge),
            other => Err(ArbiterError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::First => "first",
            Self::Second => "second",
            Self::Skip => "skip",
            Self::Merge => "merge",
        };
        f.write_str(name)
    }
}

/// A status change the caller should apply to one fix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransition {
    pub fix_id: String,
    pub new_status: FixStatus,
}

impl StatusTransition {
    fn new(fix: &Fix, new_status: FixStatus) -> Self {
        Self {
            fix_id: fix.fix_id.clone(),
            new_status,
        }
    }
}

/// Outcome of resolving one conflict group
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub group_key: String,
    pub strategy: ResolutionStrategy,
    /// Status changes in rank order; empty for `Merge`
    pub transitions: Vec<StatusTransition>,
    /// Ranked competing fixes, only for `Merge`
    pub merge_candidates: Vec<Fix>,
}

/// Turn an operator's strategy into status transitions for a group
///
/// `ordered_fix_ids` is the caller's listing order of the group and breaks
/// confidence ties; group members it omits follow in group order, and an
/// empty slice means group order. Nothing is mutated.
pub fn resolve(
    group: &ConflictGroup,
    strategy: ResolutionStrategy,
    ordered_fix_ids: &[String],
) -> Result<Resolution, ArbiterError> {
    let mut ordered: Vec<&Fix> = Vec::with_capacity(group.fixes.len());
    let mut seen: HashSet<&str> = HashSet::new();

    for fix_id in ordered_fix_ids {
        let fix = group
            .get(fix_id)
            .ok_or_else(|| ArbiterError::UnknownFix(fix_id.clone()))?;
        if seen.insert(fix.fix_id.as_str()) {
            ordered.push(fix);
        }
    }
    for fix in &group.fixes {
        if seen.insert(fix.fix_id.as_str()) {
            ordered.push(fix);
        }
    }

    // Stable: listing order survives among equal confidences
    ordered.sort_by(|a, b| compare_confidence(b, a));

    let winner = match strategy {
        ResolutionStrategy::First => ordered.first().map(|f| f.fix_id.as_str()),
        ResolutionStrategy::Second => {
            if ordered.len() < 2 {
                return Err(ArbiterError::NotEnoughFixes {
                    group_key: group.key.clone(),
                    count: ordered.len(),
                });
            }
            Some(ordered[1].fix_id.as_str())
        }
        ResolutionStrategy::Skip => None,
        ResolutionStrategy::Merge => {
            info!(
                "Group {}: returning {} fixes for merge",
                group.key,
                ordered.len()
            );
            return Ok(Resolution {
                group_key: group.key.clone(),
                strategy,
                transitions: Vec::new(),
                merge_candidates: ordered.into_iter().cloned().collect(),
            });
        }
    };

    let transitions: Vec<StatusTransition> = ordered
        .iter()
        .map(|fix| {
            let status = if Some(fix.fix_id.as_str()) == winner {
                FixStatus::Applied
            } else {
                FixStatus::Rejected
            };
            StatusTransition::new(fix, status)
        })
        .collect();

    info!(
        "Group {}: strategy {} applies {:?}",
        group.key,
        strategy,
        winner.unwrap_or("nothing")
    );

    Ok(Resolution {
        group_key: group.key.clone(),
        strategy,
        transitions,
        merge_candidates: Vec::new(),
    })
}

/// Resolve the pending group with the given key
pub fn resolve_group(
    fixes: &[Fix],
    group_key: &str,
    strategy: ResolutionStrategy,
    ordered_fix_ids: &[String],
) -> Result<Resolution, ArbiterError> {
    let groups = group_pending(fixes);
    let group = groups
        .get(group_key)
        .ok_or_else(|| ArbiterError::UnknownGroup(group_key.to_string()))?;
    resolve(group, strategy, ordered_fix_ids)
}

/// Apply transitions to a copy of the fix snapshot, all or nothing
///
/// Every transition must name a distinct fix that is currently pending;
/// otherwise no transition is applied and the first problem is returned.
pub fn apply_transitions(
    fixes: &[Fix],
    transitions: &[StatusTransition],
) -> Result<Vec<Fix>, ArbiterError> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, fix) in fixes.iter().enumerate() {
        index.entry(fix.fix_id.as_str()).or_insert(i);
    }

    let mut targets: Vec<(usize, FixStatus)> = Vec::with_capacity(transitions.len());
    let mut seen: HashSet<&str> = HashSet::new();

    for transition in transitions {
        let &i = index
            .get(transition.fix_id.as_str())
            .ok_or_else(|| ArbiterError::UnknownFix(transition.fix_id.clone()))?;
        if !seen.insert(transition.fix_id.as_str()) {
            return Err(ArbiterError::DuplicateTransition(transition.fix_id.clone()));
        }
        if !fixes[i].is_pending() {
            return Err(ArbiterError::NotPending {
                fix_id: transition.fix_id.clone(),
                status: fixes[i].status,
            });
        }
        targets.push((i, transition.new_status));
    }

    let mut updated = fixes.to_vec();
    for (i, status) in targets {
        updated[i].status = status;
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::detect_conflicts;

    fn intro_conflict() -> (Vec<Fix>, ConflictGroup) {
        let fixes = vec![
            Fix::pending("fixA", "file.md", 0.9).in_section("introSection"),
            Fix::pending("fixB", "file.md", 0.6).in_section("introSection"),
        ];
        let group = detect_conflicts(&fixes).remove("file.md::introSection").unwrap();
        (fixes, group)
    }

    fn pairs(resolution: &Resolution) -> Vec<(&str, FixStatus)> {
        resolution
            .transitions
            .iter()
            .map(|t| (t.fix_id.as_str(), t.new_status))
            .collect()
    }

    #[test]
    fn test_first_applies_highest_confidence() {
        let (_, group) = intro_conflict();

        let resolution = resolve(&group, ResolutionStrategy::First, &[]).unwrap();

        assert_eq!(
            pairs(&resolution),
            vec![("fixA", FixStatus::Applied), ("fixB", FixStatus::Rejected)]
        );
        assert!(resolution.merge_candidates.is_empty());
    }

    #[test]
    fn test_second_applies_runner_up() {
        let (_, group) = intro_conflict();

        let resolution = resolve(&group, ResolutionStrategy::Second, &[]).unwrap();

        assert_eq!(
            pairs(&resolution),
            vec![("fixA", FixStatus::Rejected), ("fixB", FixStatus::Applied)]
        );
    }

    #[test]
    fn test_second_needs_two_fixes() {
        let fixes = vec![Fix::pending("only", "f.md", 0.5)];
        let group = group_pending(&fixes).remove("f.md::default").unwrap();

        let err = resolve(&group, ResolutionStrategy::Second, &[]).unwrap_err();

        assert_eq!(
            err,
            ArbiterError::NotEnoughFixes {
                group_key: "f.md::default".to_string(),
                count: 1
            }
        );
    }

    #[test]
    fn test_skip_rejects_all() {
        let (_, group) = intro_conflict();

        let resolution = resolve(&group, ResolutionStrategy::Skip, &[]).unwrap();

        assert!(resolution
            .transitions
            .iter()
            .all(|t| t.new_status == FixStatus::Rejected));
        assert_eq!(resolution.transitions.len(), 2);
    }

    #[test]
    fn test_merge_returns_candidates_only() {
        let (_, group) = intro_conflict();

        let resolution = resolve(&group, ResolutionStrategy::Merge, &[]).unwrap();

        assert!(resolution.transitions.is_empty());
        let ids: Vec<&str> = resolution
            .merge_candidates
            .iter()
            .map(|f| f.fix_id.as_str())
            .collect();
        assert_eq!(ids, vec!["fixA", "fixB"]);
    }

    #[test]
    fn test_caller_order_breaks_ties() {
        let fixes = vec![
            Fix::pending("x", "f.md", 0.7),
            Fix::pending("y", "f.md", 0.7),
        ];
        let group = group_pending(&fixes).remove("f.md::default").unwrap();

        let default_order = resolve(&group, ResolutionStrategy::First, &[]).unwrap();
        assert_eq!(default_order.transitions[0].fix_id, "x");

        let reordered =
            resolve(&group, ResolutionStrategy::First, &["y".to_string()]).unwrap();
        assert_eq!(
            pairs(&reordered),
            vec![("y", FixStatus::Applied), ("x", FixStatus::Rejected)]
        );

        let unknown = resolve(&group, ResolutionStrategy::First, &["z".to_string()]);
        assert_eq!(unknown.unwrap_err(), ArbiterError::UnknownFix("z".to_string()));
    }

    #[test]
    fn test_resolve_group_by_key() {
        let (fixes, _) = intro_conflict();

        let resolution =
            resolve_group(&fixes, "file.md::introSection", ResolutionStrategy::First, &[]).unwrap();
        assert_eq!(resolution.group_key, "file.md::introSection");

        let missing = resolve_group(&fixes, "file.md::nope", ResolutionStrategy::First, &[]);
        assert!(matches!(missing, Err(ArbiterError::UnknownGroup(_))));
    }

    #[test]
    fn test_apply_transitions_is_atomic() {
        let (fixes, group) = intro_conflict();
        let resolution = resolve(&group, ResolutionStrategy::First, &[]).unwrap();

        let updated = apply_transitions(&fixes, &resolution.transitions).unwrap();
        assert_eq!(updated[0].status, FixStatus::Applied);
        assert_eq!(updated[1].status, FixStatus::Rejected);
        // Input snapshot untouched
        assert!(fixes.iter().all(Fix::is_pending));

        // Re-applying fails on the first non-pending fix and changes nothing
        let err = apply_transitions(&updated, &resolution.transitions).unwrap_err();
        assert_eq!(
            err,
            ArbiterError::NotPending {
                fix_id: "fixA".to_string(),
                status: FixStatus::Applied
            }
        );

        let mut bad = resolution.transitions.clone();
        bad.push(StatusTransition {
            fix_id: "ghost".to_string(),
            new_status: FixStatus::Applied,
        });
        assert!(matches!(
            apply_transitions(&fixes, &bad),
            Err(ArbiterError::UnknownFix(_))
        ));

        let duplicated = vec![resolution.transitions[0].clone(), resolution.transitions[0].clone()];
        assert!(matches!(
            apply_transitions(&fixes, &duplicated),
            Err(ArbiterError::DuplicateTransition(_))
        ));
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("First".parse::<ResolutionStrategy>(), Ok(ResolutionStrategy::First));
        assert_eq!("merge".parse::<ResolutionStrategy>(), Ok(ResolutionStrategy::Merge));
        assert!("both".parse::<ResolutionStrategy>().is_err());
        assert_eq!(ResolutionStrategy::Second.to_string(), "second");
    }
}
