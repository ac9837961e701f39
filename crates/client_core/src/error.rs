use shared::domain::ScopeId;
use thiserror::Error;

use crate::materializer::RenderError;

/// Why a single command, or a single `output_ctl` field, was abandoned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessError {
    #[error("scope `{0}` not found")]
    ScopeNotFound(ScopeId),
    #[error("failed to render widget: {0}")]
    Render(#[from] RenderError),
    #[error("`{end}` does not follow `{start}` among its siblings")]
    RangeNotValid { start: ScopeId, end: ScopeId },
    #[error("position {position} addresses no child of `{parent}` ({len} children)")]
    PositionOutOfRange {
        parent: ScopeId,
        position: i64,
        len: usize,
    },
    #[error("scope `{0}` already exists")]
    DuplicateScope(ScopeId),
    #[error("root scope `{0}` cannot be removed")]
    RootScope(ScopeId),
}

impl ProcessError {
    /// Failures that leave the tree exactly as the server last saw it are
    /// reported as warnings rather than errors.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::RangeNotValid { .. })
    }
}
