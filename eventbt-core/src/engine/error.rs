use thiserror::Error;

/// Errors from execution-engine primitives.
///
/// Capital shortfalls are not errors: they are routine trading conditions and
/// surface as a rejected [`EntryOutcome`](super::EntryOutcome) instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no open position to close at bar {bar}")]
    NoOpenPosition { bar: usize },

    #[error("decision at bar {bar} has no next bar to execute on (series has {len} bars)")]
    NoNextBar { bar: usize, len: usize },
}
