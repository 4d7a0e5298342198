use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::arbiter::{ConflictGroup, Resolution};
use crate::correlate::{AssignedCall, CallSummary, Correlation, DurationSource, TurnWindow};
use crate::divergence::{ChangeType, DiffEntry, DiffSummary};
use crate::models::{ConversationTurn, ErrorSignal, Role};

/// Write any report as pretty JSON
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    serde_json::to_writer_pretty(file, value).context("Failed to write JSON")?;
    Ok(())
}

/// A call as it appears in reports, timed relative to the run base time
#[derive(Debug, Clone, Serialize)]
pub struct CallReport {
    pub id: i64,
    pub tool_name: String,
    pub offset_ms: i64,
    pub duration_ms: u64,
    pub duration_source: DurationSource,
    pub error: ErrorSignal,
}

impl CallReport {
    fn new(call: &AssignedCall, base_time_ms: i64) -> Self {
        Self {
            id: call.call.id,
            tool_name: call.call.tool_name.clone(),
            offset_ms: call.timestamp_ms.saturating_sub(base_time_ms),
            duration_ms: call.duration_ms,
            duration_source: call.duration_source,
            error: call.call.error_signal(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub turn_index: usize,
    pub content: String,
    pub window: TurnWindow,
    pub summary: CallSummary,
    pub calls: Vec<CallReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMetadata {
    pub total_calls: usize,
    pub assigned_calls: usize,
    pub unassociated_calls: usize,
    pub excluded_calls: usize,
    pub unassociated_summary: CallSummary,
    pub base_time_ms: i64,
}

/// Machine-readable turn/call correlation
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub turns: Vec<TurnReport>,
    pub unassociated: Vec<CallReport>,
    pub excluded: Vec<CallReport>,
    pub metadata: CorrelationMetadata,
}

impl CorrelationReport {
    pub fn new(run_id: Option<String>, turns: &[ConversationTurn], correlation: &Correlation) -> Self {
        let base = correlation.base_time_ms;
        let calls = |list: &[AssignedCall]| -> Vec<CallReport> {
            list.iter().map(|c| CallReport::new(c, base)).collect()
        };

        let turn_reports = correlation
            .turns
            .iter()
            .map(|(&turn_index, turn_calls)| TurnReport {
                turn_index,
                content: turns
                    .get(turn_index)
                    .map(|t| t.content.clone())
                    .unwrap_or_default(),
                window: turn_calls.window.clone(),
                summary: turn_calls.summary(),
                calls: calls(&turn_calls.calls),
            })
            .collect();

        Self {
            run_id,
            turns: turn_reports,
            unassociated: calls(&correlation.unassociated),
            excluded: calls(&correlation.excluded),
            metadata: CorrelationMetadata {
                total_calls: correlation.total_calls(),
                assigned_calls: correlation.assigned_count(),
                unassociated_calls: correlation.unassociated.len(),
                excluded_calls: correlation.excluded.len(),
                unassociated_summary: correlation.unassociated_summary(),
                base_time_ms: base,
            },
        }
    }
}

/// Machine-readable transcript comparison
#[derive(Debug, Clone, Serialize)]
pub struct DiffReport {
    pub summary: DiffSummary,
    pub entries: Vec<DiffEntry>,
}

impl DiffReport {
    pub fn new(entries: Vec<DiffEntry>) -> Self {
        Self {
            summary: DiffSummary::from_entries(&entries),
            entries,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedFix {
    pub fix_id: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictGroupReport {
    pub key: String,
    pub target_file: String,
    pub location_key: String,
    /// Highest confidence first
    pub fixes: Vec<RankedFix>,
}

/// Machine-readable list of unresolved conflict groups
#[derive(Debug, Clone, Serialize)]
pub struct ConflictReport {
    pub groups: Vec<ConflictGroupReport>,
}

impl ConflictReport {
    pub fn new<'a>(groups: impl IntoIterator<Item = &'a ConflictGroup>) -> Self {
        let groups = groups
            .into_iter()
            .map(|g| ConflictGroupReport {
                key: g.key.clone(),
                target_file: g.target_file.clone(),
                location_key: g.location_key.clone(),
                fixes: g
                    .ranked()
                    .into_iter()
                    .map(|f| RankedFix {
                        fix_id: f.fix_id.clone(),
                        confidence: f.confidence,
                    })
                    .collect(),
            })
            .collect();
        Self { groups }
    }
}

/// Human-readable correlation: each assistant turn with its calls
pub fn format_correlation(turns: &[ConversationTurn], correlation: &Correlation) -> String {
    let base = correlation.base_time_ms;
    let mut output = String::new();

    for (i, turn) in turns.iter().enumerate() {
        let offset = turn.timestamp.resolve(base).saturating_sub(base);
        output.push_str(&format!(
            "[{}] {}: {}\n",
            format_offset(offset),
            role_label(turn.role),
            truncate(&turn.content, 72)
        ));

        if let Some(turn_calls) = correlation.turns.get(&i) {
            let start = turn_calls
                .window
                .start_ms
                .map(|s| format_offset(s.saturating_sub(base)))
                .unwrap_or_else(|| "start".to_string());
            let summary = turn_calls.summary();
            output.push_str(&format!(
                "    window {} .. {}, {} calls, {} failed\n",
                start,
                format_offset(turn_calls.window.end_ms.saturating_sub(base)),
                summary.call_count,
                summary.failed_count
            ));
            for call in &turn_calls.calls {
                output.push_str(&format_call(call, base));
            }
        }
    }

    if !correlation.unassociated.is_empty() {
        let summary = correlation.unassociated_summary();
        output.push_str(&format!(
            "\nUnassociated calls: {} calls, {} failed\n",
            summary.call_count, summary.failed_count
        ));
        for call in &correlation.unassociated {
            output.push_str(&format_call(call, base));
        }
    }

    if !correlation.excluded.is_empty() {
        output.push_str(&format!(
            "\n{} internal calls excluded\n",
            correlation.excluded.len()
        ));
    }

    output
}

fn format_call(call: &AssignedCall, base: i64) -> String {
    let duration = match call.duration_source {
        DurationSource::Unknown => "?".to_string(),
        DurationSource::Reported => format!("{}ms", call.duration_ms),
        _ => format!("~{}ms", call.duration_ms),
    };
    let marker = if call.call.error_signal().is_error() { " FAILED" } else { "" };
    format!(
        "    #{} {} @ {} {}{}\n",
        call.call.id,
        call.call.tool_name,
        format_offset(call.timestamp_ms.saturating_sub(base)),
        duration,
        marker
    )
}

/// Human-readable side-by-side transcript comparison
pub fn format_diff(entries: &[DiffEntry]) -> String {
    let mut output = String::new();

    for entry in entries {
        let marker = if entry.is_first_divergence { ">" } else { " " };
        output.push_str(&format!(
            "{}{:>3} {:<8} {}\n",
            marker,
            entry.index,
            change_label(entry.change_type),
            side(entry.base_turn.as_ref())
        ));
        if entry.change_type != ChangeType::Same {
            output.push_str(&format!("{:13}{}\n", "", side(entry.compare_turn.as_ref())));
        }
    }

    let summary = DiffSummary::from_entries(entries);
    output.push_str(&format!(
        "\n{} same, {} modified, {} added, {} removed",
        summary.same, summary.modified, summary.added, summary.removed
    ));
    match summary.first_divergence {
        Some(index) => output.push_str(&format!("; first divergence at turn {}\n", index)),
        None => output.push_str("; no divergence\n"),
    }

    output
}

fn side(turn: Option<&ConversationTurn>) -> String {
    match turn {
        Some(t) => format!("{}: {}", role_label(t.role), truncate(&t.content, 60)),
        None => "(none)".to_string(),
    }
}

/// Human-readable conflict groups, ranked
pub fn format_conflicts<'a>(groups: impl IntoIterator<Item = &'a ConflictGroup>) -> String {
    let mut output = String::new();

    for group in groups {
        output.push_str(&format!("{} ({} fixes)\n", group.key, group.fixes.len()));
        for (rank, fix) in group.ranked().iter().enumerate() {
            output.push_str(&format!(
                "    {}. {} confidence {:.2}\n",
                rank + 1,
                fix.fix_id,
                fix.confidence
            ));
        }
    }

    if output.is_empty() {
        output.push_str("No conflicts\n");
    }

    output
}

/// Human-readable resolution outcome
pub fn format_resolution(resolution: &Resolution) -> String {
    let mut output = format!("{} resolved with {}\n", resolution.group_key, resolution.strategy);
    for transition in &resolution.transitions {
        output.push_str(&format!(
            "    {} -> {:?}\n",
            transition.fix_id, transition.new_status
        ));
    }
    for fix in &resolution.merge_candidates {
        output.push_str(&format!(
            "    merge candidate {} confidence {:.2}\n",
            fix.fix_id, fix.confidence
        ));
    }
    output
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Assistant => "Assistant",
        Role::Other => "Other",
    }
}

fn change_label(change: ChangeType) -> &'static str {
    match change {
        ChangeType::Same => "same",
        ChangeType::Modified => "modified",
        ChangeType::Added => "added",
        ChangeType::Removed => "removed",
    }
}

/// Format a millisecond offset as MM:SS.mmm
fn format_offset(ms: i64) -> String {
    let sign = if ms < 0 { "-" } else { "" };
    let ms = ms.unsigned_abs();
    let seconds = ms / 1000;
    let millis = ms % 1000;
    let minutes = seconds / 60;
    let secs = seconds % 60;
    format!("{}{:02}:{:02}.{:03}", sign, minutes, secs, millis)
}

/// Shorten text to at most `width` characters, marking the cut
fn truncate(text: &str, width: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= width {
        return flat;
    }
    let cut: String = flat.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", cut)
}
