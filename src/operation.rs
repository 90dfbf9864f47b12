use std::fmt;

use tracing::debug;

/// The public entry points, as they appear in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    ResolvePath,
    Allocate,
    Save,
    Move,
    Delete,
    DeleteCategory,
    Read,
    List,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::ResolvePath => "resolve_path",
            OperationKind::Allocate => "allocate",
            OperationKind::Save => "save",
            OperationKind::Move => "move",
            OperationKind::Delete => "delete",
            OperationKind::DeleteCategory => "delete_category",
            OperationKind::Read => "read",
            OperationKind::List => "list",
        };
        f.write_str(name)
    }
}

/// Where an operation is in its pipeline. There is no retry stage: a
/// failed operation is finished and the caller decides whether to issue it
/// again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Resolving,
    Allocating,
    Performing,
    Completed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Pending => "pending",
            Stage::Resolving => "resolving",
            Stage::Allocating => "allocating",
            Stage::Performing => "performing",
            Stage::Completed => "completed",
        };
        f.write_str(name)
    }
}

pub(crate) fn enter(stage: Stage) {
    debug!(%stage, "entering stage");
}
