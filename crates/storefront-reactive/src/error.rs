use thiserror::Error;

use crate::runtime::RuntimeId;

pub type Result<T> = std::result::Result<T, ReactiveError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// Sources of one derived value must share a runtime, otherwise a write
    /// in one runtime could never schedule the dependent in the other.
    #[error("derived sources span runtimes: expected {expected}, found {found}")]
    ForeignSource {
        expected: RuntimeId,
        found: RuntimeId,
    },
}
