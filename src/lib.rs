pub mod arbiter;
pub mod correlate;
pub mod divergence;
pub mod io;
pub mod models;

pub use arbiter::{
    apply_transitions, detect_conflicts, group_key, group_pending, location_key, resolve,
    resolve_group, ArbiterError, ConflictGroup, Resolution, ResolutionStrategy, StatusTransition,
};
pub use correlate::{correlate, AssignedCall, Correlation, CorrelatorConfig, TurnCalls, TurnWindow};
pub use divergence::{diff, word_similarity, ChangeType, DiffEntry, DiffSummary, DivergenceConfig};
pub use io::{load_snapshot, parse_snapshot_json, ConflictReport, CorrelationReport, DiffReport};
pub use models::{
    CallStatus, ConversationTurn, ErrorSignal, Fix, FixLocation, FixStatus, Role, RunSnapshot,
    Timestamp, ToolCall,
};
