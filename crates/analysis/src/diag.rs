//! Non-fatal findings collected during analysis.

use std::fmt;

/// Kinds of recoverable conditions.
///
/// `InvalidBranchTarget`, `StackUnderflow` and `FrameIndexOutOfRange`
/// demote the affected subroutine to a raw block; the other two are
/// informational and never change the output shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagKind {
    InvalidBranchTarget,
    StackUnderflow,
    FrameIndexOutOfRange,
    UnbalancedBranch,
    StackTypeMismatch,
}

impl DiagKind {
    pub fn label(&self) -> &'static str {
        match self {
            DiagKind::InvalidBranchTarget => "invalid-branch-target",
            DiagKind::StackUnderflow => "stack-underflow",
            DiagKind::FrameIndexOutOfRange => "frame-index-out-of-range",
            DiagKind::UnbalancedBranch => "unbalanced-branch",
            DiagKind::StackTypeMismatch => "stack-type-mismatch",
        }
    }
}

/// One finding, tied to the exact byte offset it was observed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub offset: u32,
    pub kind: DiagKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(offset: u32, kind: DiagKind, message: impl Into<String>) -> Self {
        Self {
            offset,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#010x}: {}: {}",
            self.offset,
            self.kind.label(),
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_offset_and_label() {
        let d = Diagnostic::new(0x20, DiagKind::UnbalancedBranch, "depth 2 vs 3");
        assert_eq!(d.to_string(), "0x00000020: unbalanced-branch: depth 2 vs 3");
    }
}
