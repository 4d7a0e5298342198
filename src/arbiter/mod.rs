pub mod resolve;

pub use resolve::*;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::models::Fix;

/// Location key used when a fix names neither a section nor a function
pub const DEFAULT_LOCATION_KEY: &str = "default";

/// Pending fixes that target the same file and location
#[derive(Debug, Clone, Serialize)]
pub struct ConflictGroup {
    /// `target_file::location_key`
    pub key: String,
    pub target_file: String,
    pub location_key: String,
    /// Members in input order
    pub fixes: Vec<Fix>,
}

impl ConflictGroup {
    /// More than one fix competes for the location
    pub fn is_conflict(&self) -> bool {
        self.fixes.len() > 1
    }

    /// Members by confidence, highest first; equal confidences keep input order
    pub fn ranked(&self) -> Vec<&Fix> {
        let mut ranked: Vec<&Fix> = self.fixes.iter().collect();
        ranked.sort_by(|a, b| compare_confidence(b, a));
        ranked
    }

    pub fn get(&self, fix_id: &str) -> Option<&Fix> {
        self.fixes.iter().find(|f| f.fix_id == fix_id)
    }
}

/// Confidence usable for ranking: NaN as 0, clamped to [0, 1]
fn rank_confidence(fix: &Fix) -> f64 {
    if fix.confidence.is_nan() {
        0.0
    } else {
        fix.confidence.clamp(0.0, 1.0)
    }
}

fn compare_confidence(a: &Fix, b: &Fix) -> Ordering {
    rank_confidence(a).total_cmp(&rank_confidence(b))
}

/// Section, else function, else the default key
pub fn location_key(fix: &Fix) -> &str {
    fix.location
        .as_ref()
        .and_then(|loc| loc.section.as_deref().or(loc.function.as_deref()))
        .unwrap_or(DEFAULT_LOCATION_KEY)
}

/// Grouping key of a fix: `target_file::location_key`
pub fn group_key(fix: &Fix) -> String {
    format!("{}::{}", fix.target_file, location_key(fix))
}

/// Group every pending fix by target location
pub fn group_pending(fixes: &[Fix]) -> BTreeMap<String, ConflictGroup> {
    let mut groups: BTreeMap<String, ConflictGroup> = BTreeMap::new();

    for fix in fixes.iter().filter(|f| f.is_pending()) {
        groups
            .entry(group_key(fix))
            .or_insert_with_key(|key| ConflictGroup {
                key: key.clone(),
                target_file: fix.target_file.clone(),
                location_key: location_key(fix).to_string(),
                fixes: Vec::new(),
            })
            .fixes
            .push(fix.clone());
    }

    groups
}

/// Pending groups in which more than one fix competes
///
/// Fixes in these groups cannot be applied independently; each group must be
/// resolved explicitly before its fixes are actionable.
pub fn detect_conflicts(fixes: &[Fix]) -> BTreeMap<String, ConflictGroup> {
    let conflicts: BTreeMap<String, ConflictGroup> = group_pending(fixes)
        .into_iter()
        .filter(|(_, group)| group.is_conflict())
        .collect();

    info!(
        "Found {} conflict groups among {} fixes",
        conflicts.len(),
        fixes.len()
    );

    conflicts
}
