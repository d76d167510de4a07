//! The per-translation-unit classification engine. The walker visits every
//! call expression, and the two classifiers decide, by a strictly ordered
//! sequence of syntactic rules, how the call's error signal was handled.

pub mod context;
pub mod errno;
pub mod retval;
pub mod track;

use crate::shared::notable::{Registry, Role};
use cfront::{Ast, Loc, NodeId, NodeKind};
use log::trace;

/// How a watched call's error signal was handled. Every watched call gets
/// exactly one of these; [`Category::UsedOther`] is the fallback.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Category {
    Ignored,
    CastToVoid,
    AssignedNotRead,
    BranchedNoCatchall,
    BranchedWithCatchall,
    Propagated,
    PassedToHandlerFn,
    LoggedNotHandled,
    UsedOther,
}

impl Category {
    pub const ALL: [Self; 9] = [
        Self::Ignored,
        Self::CastToVoid,
        Self::AssignedNotRead,
        Self::BranchedNoCatchall,
        Self::BranchedWithCatchall,
        Self::Propagated,
        Self::PassedToHandlerFn,
        Self::LoggedNotHandled,
        Self::UsedOther,
    ];

    /// The string stored in the sink's `handling_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::CastToVoid => "cast_to_void",
            Self::AssignedNotRead => "assigned_not_read",
            Self::BranchedNoCatchall => "branched_no_catchall",
            Self::BranchedWithCatchall => "branched_with_catchall",
            Self::Propagated => "propagated",
            Self::PassedToHandlerFn => "passed_to_handler_fn",
            Self::LoggedNotHandled => "logged_not_handled",
            Self::UsedOther => "used_other",
        }
    }

    /// Pick the branch category for a construct with or without a catch-all.
    fn branched(catchall: bool) -> Self {
        if catchall {
            Self::BranchedWithCatchall
        } else {
            Self::BranchedNoCatchall
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classifier verdict: the category, plus the unread-value site when the
/// category is [`Category::AssignedNotRead`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Classification {
    pub category: Category,
    pub assigned: Option<Loc>,
}

impl Classification {
    fn of(category: Category) -> Self {
        Self {
            category,
            assigned: None,
        }
    }
}

/// The source position of an assigned-but-unread value.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Site {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Site {
    pub fn new(file: &str, loc: Loc) -> Self {
        Self {
            file: file.to_string(),
            line: loc.line,
            column: loc.column,
        }
    }
}

/// One classified watched call, ready for the sink.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Record {
    pub name: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub category: Category,
    pub assigned: Option<Site>,
}

/// Classify every watched call in one translation unit.
pub fn analyze_unit(ast: &Ast, registry: &Registry) -> Vec<Record> {
    let mut records = Vec::new();
    for root in ast.roots() {
        visit(ast, registry, *root, &mut records);
    }
    records
}

/// Pre-order walk: a watched call is classified before its argument
/// subtrees are visited, so nested watched calls still get their own rows.
fn visit(ast: &Ast, registry: &Registry, id: NodeId, records: &mut Vec<Record>) {
    if let NodeKind::Call { .. } = ast.kind(id) {
        if let Some(name) = context::callee_name(ast, id) {
            let classification = match registry.role(name) {
                Some(Role::WatchedReturnValue) => Some(retval::classify(ast, registry, id)),
                Some(Role::WatchedErrno) => Some(errno::classify(ast, registry, id)),
                _ => None,
            };
            if let Some(classification) = classification {
                let loc = ast.loc(id);
                trace!(
                    "{}:{}:{}: {} -> {}",
                    ast.file(),
                    loc.line,
                    loc.column,
                    name,
                    classification.category
                );
                records.push(Record {
                    name: name.to_string(),
                    file: ast.file().to_string(),
                    line: loc.line,
                    column: loc.column,
                    category: classification.category,
                    assigned: classification
                        .assigned
                        .map(|site| Site::new(ast.file(), site)),
                });
            }
        }
    }
    for child in ast.children(id) {
        visit(ast, registry, child, records);
    }
}
