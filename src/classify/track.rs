//! The local-propagation tracker: once an error value lands in a local,
//! walk forward through the enclosing compound block and classify the first
//! non-trivial use. The walk is linear and never leaves the block.

use crate::{
    classify::{Category, Classification, context},
    shared::notable::Registry,
};
use cfront::{Ast, Loc, NodeId, NodeKind};

/// What one sibling statement does with the tracked variable.
#[derive(Debug)]
enum StatementUse {
    /// No reference at all.
    None,

    /// Passed to a handler call.
    Handler,

    /// Referenced in a `return` value.
    Returned,

    /// Referenced in the condition of this `if`/`switch` statement.
    Branched,

    /// The statement is an explicit `(void)` cast over the variable.
    CastToVoid,

    /// Copied verbatim into another local; tracking retargets.
    Retarget { var: String, site: Loc },

    /// Overwritten without reading the old value.
    Killed,

    /// Passed to a logger call; the walk continues.
    Logged,

    /// Any other read.
    Other,
}

/// Follow `var` from the statement at `start_index` of `block` to the end of
/// the block. `site` is the location charged with `assigned_not_read` if the
/// value is never read; `allow_void` admits `(void)var` as a cast-to-void
/// outcome (return-value contracts only).
pub fn run(
    ast: &Ast,
    registry: &Registry,
    block: NodeId,
    start_index: usize,
    var: &str,
    site: Loc,
    allow_void: bool,
) -> Classification {
    let stmts = ast.children(block);
    let mut var = var.to_string();
    let mut site = site;
    let mut logged = false;

    for stmt in stmts.into_iter().skip(start_index + 1) {
        match statement_use(ast, registry, stmt, &var, allow_void) {
            StatementUse::None => {}
            StatementUse::Handler => {
                return Classification::of(Category::PassedToHandlerFn);
            }
            StatementUse::Returned => return Classification::of(Category::Propagated),
            StatementUse::Branched => {
                return Classification::of(Category::branched(context::branch_has_catchall(
                    ast, stmt,
                )));
            }
            StatementUse::CastToVoid => return Classification::of(Category::CastToVoid),
            StatementUse::Retarget {
                var: new_var,
                site: new_site,
            } => {
                var = new_var;
                site = new_site;
            }
            // TODO: a copy read only inside an earlier branch body still
            // lands here; deciding those cases needs a control-flow-aware
            // walk instead of this linear one.
            StatementUse::Killed => break,
            StatementUse::Logged => logged = true,
            StatementUse::Other => return Classification::of(Category::UsedOther),
        }
    }

    if logged {
        Classification::of(Category::LoggedNotHandled)
    } else {
        Classification {
            category: Category::AssignedNotRead,
            assigned: Some(site),
        }
    }
}

/// Judge one statement. Precedence: handler > returned > branched >
/// cast-to-void > retarget > killed > logged > other.
fn statement_use(
    ast: &Ast,
    registry: &Registry,
    stmt: NodeId,
    var: &str,
    allow_void: bool,
) -> StatementUse {
    let is_ref =
        |ast: &Ast, id: NodeId| matches!(ast.kind(id), NodeKind::Ident(name) if name == var);
    let scan = context::scan_refs(ast, registry, stmt, &is_ref);

    if scan.handler_arg {
        return StatementUse::Handler;
    }
    if scan.returned {
        return StatementUse::Returned;
    }
    if let NodeKind::If { cond, .. } | NodeKind::Switch { cond, .. } = ast.kind(stmt) {
        if context::scan_refs(ast, registry, *cond, &is_ref).any {
            return StatementUse::Branched;
        }
    }
    if let NodeKind::Cast { ty, operand } = ast.kind(context::strip_parens(ast, stmt)) {
        if ty.is_void() && context::scan_refs(ast, registry, *operand, &is_ref).any {
            if allow_void {
                return StatementUse::CastToVoid;
            }
            // An errno copy thrown away with `(void)` stays a plain use.
            return StatementUse::Other;
        }
    }
    if let Some(retarget) = retargets(ast, stmt, var) {
        return retarget;
    }
    if let Some(killed) = kills(ast, stmt, var) {
        return killed;
    }
    if scan.logger_arg {
        return StatementUse::Logged;
    }
    if scan.any {
        return StatementUse::Other;
    }
    StatementUse::None
}

/// A declaration or assignment whose right-hand side is exactly the tracked
/// variable (after trivial unwrapping) and whose target is another local.
fn retargets(ast: &Ast, stmt: NodeId, var: &str) -> Option<StatementUse> {
    let (target, value) = match ast.kind(stmt) {
        NodeKind::VarDecl {
            name,
            init: Some(init),
            is_local: true,
            ..
        } => (name.clone(), *init),
        NodeKind::Binary { op, lhs, rhs } if op.is_plain_assignment() => {
            match ast.kind(context::strip_parens(ast, *lhs)) {
                NodeKind::Ident(name) if context::is_local_variable(ast, stmt, name) => {
                    (name.clone(), *rhs)
                }
                _ => return None,
            }
        }
        _ => return None,
    };
    if target == var {
        return None;
    }
    match ast.kind(context::strip_wrappers(ast, value)) {
        NodeKind::Ident(name) if name == var => Some(StatementUse::Retarget {
            var: target,
            site: ast.loc(value),
        }),
        _ => None,
    }
}

/// An assignment that overwrites the tracked variable without reading it.
fn kills(ast: &Ast, stmt: NodeId, var: &str) -> Option<StatementUse> {
    if let NodeKind::Binary { op, lhs, rhs } = ast.kind(stmt) {
        if op.is_plain_assignment() {
            if let NodeKind::Ident(name) = ast.kind(context::strip_parens(ast, *lhs)) {
                if name == var && !references(ast, *rhs, var) {
                    return Some(StatementUse::Killed);
                }
            }
        }
    }
    None
}

fn references(ast: &Ast, root: NodeId, var: &str) -> bool {
    let mut found = false;
    ast.walk(root, &mut |id| {
        if matches!(ast.kind(id), NodeKind::Ident(name) if name == var) {
            found = true;
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classify::{Record, analyze_unit},
        shared::notable::Registry,
    };

    fn registry() -> Registry {
        Registry::from_json(
            r#"[
                {"name": "malloc", "reporting": "return_value"},
                {"name": "handle", "type": "handler"},
                {"name": "log_error", "type": "logger"}
            ]"#,
        )
        .expect("bad test registry")
    }

    fn classify_one(source: &str) -> Record {
        let ast = cfront::parse("main.c", source).expect("parse failed");
        let mut records = analyze_unit(&ast, &registry());
        assert_eq!(records.len(), 1, "expected exactly one watched call");
        records.remove(0)
    }

    #[test]
    fn handler_in_a_later_statement() {
        let record = classify_one("int main() { void *p = malloc(10); handle(p); return 0; }");
        assert_eq!(record.category, Category::PassedToHandlerFn);
    }

    #[test]
    fn returned_later_propagates() {
        let record = classify_one("void *get(void) { void *p = malloc(10); return p; }");
        assert_eq!(record.category, Category::Propagated);
    }

    #[test]
    fn return_inside_branch_body_propagates() {
        let record =
            classify_one("void *get(void) { void *p = malloc(10); if (p) return p; return 0; }");
        assert_eq!(record.category, Category::Propagated);
    }

    #[test]
    fn handler_overrides_branch_in_the_same_statement() {
        let record = classify_one(
            "int main() { void *p = malloc(10); if (p) handle(p); return 0; }",
        );
        assert_eq!(record.category, Category::PassedToHandlerFn);
    }

    #[test]
    fn branch_on_the_copy() {
        let record =
            classify_one("int main() { void *p = malloc(10); if (!p) return 1; return 0; }");
        assert_eq!(record.category, Category::BranchedNoCatchall);
    }

    #[test]
    fn logging_does_not_stop_the_walk() {
        let record = classify_one(
            "int main() { void *p = malloc(10); log_error(p); if (!p) return 1; return 0; }",
        );
        assert_eq!(record.category, Category::BranchedNoCatchall);
    }

    #[test]
    fn logged_and_never_used_again() {
        let record =
            classify_one("int main() { void *p = malloc(10); log_error(p); return 0; }");
        assert_eq!(record.category, Category::LoggedNotHandled);
    }

    #[test]
    fn cast_to_void_of_the_copy() {
        let record =
            classify_one("int main() { void *p = malloc(10); (void)p; return 0; }");
        assert_eq!(record.category, Category::CastToVoid);
    }

    #[test]
    fn retargeting_follows_the_copy() {
        let record = classify_one(
            "int main() { void *p = malloc(10); void *q = p; handle(q); return 0; }",
        );
        assert_eq!(record.category, Category::PassedToHandlerFn);
    }

    #[test]
    fn retargeting_updates_the_unread_site() {
        let record =
            classify_one("int main() { void *p = malloc(10); void *q = p; return 0; }");
        assert_eq!(record.category, Category::AssignedNotRead);
        let site = record.assigned.expect("missing site");
        // The site is the final copied-from expression: `p` in `void *q = p`.
        assert_eq!((site.line, site.column), (1, 46));
    }

    #[test]
    fn kill_without_read_is_assigned_not_read() {
        let record =
            classify_one("int main() { void *p = malloc(10); p = 0; handle(p); return 0; }");
        assert_eq!(record.category, Category::AssignedNotRead);
        let site = record.assigned.expect("missing site");
        assert_eq!((site.line, site.column), (1, 24));
    }

    #[test]
    fn kill_after_logging_is_logged_not_handled() {
        let record = classify_one(
            "int main() { void *p = malloc(10); log_error(p); p = 0; handle(p); return 0; }",
        );
        assert_eq!(record.category, Category::LoggedNotHandled);
    }

    #[test]
    fn self_referencing_overwrite_is_a_use() {
        let record = classify_one(
            "int main() { long v = (long)malloc(10); v = v + 1; return 0; }",
        );
        assert_eq!(record.category, Category::UsedOther);
    }

    #[test]
    fn unrelated_statements_are_transparent() {
        let record = classify_one(
            "int main() { void *p = malloc(10); int n = 3; n = n + 1; handle(p); return n; }",
        );
        assert_eq!(record.category, Category::PassedToHandlerFn);
    }

    #[test]
    fn walk_stays_inside_the_block() {
        // The copy dies with the inner block; the outer use is out of reach.
        let record = classify_one(
            "int main() { int used = 0; { void *p = malloc(10); } used = 1; return used; }",
        );
        assert_eq!(record.category, Category::AssignedNotRead);
    }

    #[test]
    fn end_of_block_without_use() {
        let record = classify_one("int main() { void *p = malloc(10); }");
        assert_eq!(record.category, Category::AssignedNotRead);
    }
}
