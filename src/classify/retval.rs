//! Classification for watched functions whose error signal is their return
//! value. An ordered sequence of predicates; the first match wins.

use crate::{
    classify::{Category, Classification, context, track},
    shared::notable::{Registry, Role},
};
use cfront::{Ast, NodeId, NodeKind};

pub fn classify(ast: &Ast, registry: &Registry, call: NodeId) -> Classification {
    let top = context::top_of_wrappers(ast, call);

    // 1. The topmost wrapper above the call is an explicit `(void)` cast.
    if top != call {
        if let NodeKind::Cast { ty, .. } = ast.kind(top) {
            if ty.is_void() {
                return Classification::of(Category::CastToVoid);
            }
        }
    }

    // 2. The nearest enclosing call taking this one as an argument is a
    //    registered handler or logger.
    if let Some(enclosing) = context::enclosing_call_argument(ast, call) {
        match context::callee_name(ast, enclosing).and_then(|n| registry.role(n)) {
            Some(Role::Handler) => return Classification::of(Category::PassedToHandlerFn),
            Some(Role::Logger) => return Classification::of(Category::LoggedNotHandled),
            _ => {}
        }
    }

    // 3. The value is discarded in statement position.
    if context::in_statement_position(ast, call) {
        return Classification::of(Category::Ignored);
    }

    // 4. Some ancestor returns an expression containing the call. Checked
    //    before branching: a call returned from inside a branch propagates.
    let mut cursor = ast.parent(call);
    while let Some(id) = cursor {
        if matches!(ast.kind(id), NodeKind::Return(_)) {
            return Classification::of(Category::Propagated);
        }
        cursor = ast.parent(id);
    }

    // 5. The call sits in the condition of an `if`/`switch`.
    if let Some(branch) = context::enclosing_branch_condition(ast, call) {
        return Classification::of(Category::branched(context::branch_has_catchall(
            ast, branch,
        )));
    }

    // 6. The value lands in a local; follow it through the block.
    if let Some(parent) = ast.parent(top) {
        match ast.kind(parent) {
            NodeKind::Binary { op, lhs, rhs }
                if op.is_plain_assignment() && *rhs == top =>
            {
                if let NodeKind::Ident(name) = ast.kind(context::strip_parens(ast, *lhs)) {
                    if context::is_local_variable(ast, parent, name) {
                        if let Some((block, index, _)) = context::enclosing_statement(ast, parent)
                        {
                            return track::run(
                                ast,
                                registry,
                                block,
                                index,
                                name,
                                ast.loc(top),
                                true,
                            );
                        }
                    }
                }
            }
            NodeKind::VarDecl {
                name,
                init: Some(init),
                is_local: true,
                ..
            } if *init == top => {
                if let Some((block, index, _)) = context::enclosing_statement(ast, parent) {
                    return track::run(ast, registry, block, index, name, ast.loc(top), true);
                }
            }
            _ => {}
        }
    }

    // 7. Anything else.
    Classification::of(Category::UsedOther)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Record, analyze_unit};

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
    fn bare_statement_is_ignored() {
        let record = classify_one("int main() { malloc(10); return 0; }");
        assert_eq!(record.category, Category::Ignored);
    }

    #[test]
    fn statement_in_loop_body_is_ignored() {
        let record = classify_one("int main() { while (1) malloc(10); return 0; }");
        assert_eq!(record.category, Category::Ignored);
    }

    #[test]
    fn void_cast_wins_over_statement_position() {
        let record = classify_one("int main() { (void)malloc(10); return 0; }");
        assert_eq!(record.category, Category::CastToVoid);
    }

    #[test]
    fn void_cast_through_parens() {
        let record = classify_one("int main() { (void)(malloc(10)); return 0; }");
        assert_eq!(record.category, Category::CastToVoid);
    }

    #[test]
    fn non_void_cast_in_statement_position_is_ignored() {
        let record = classify_one("int main() { (long)malloc(10); return 0; }");
        assert_eq!(record.category, Category::Ignored);
    }

    #[test]
    fn passed_directly_to_handler() {
        let record = classify_one("int main() { handle(malloc(10)); return 0; }");
        assert_eq!(record.category, Category::PassedToHandlerFn);
    }

    #[test]
    fn passed_directly_to_logger() {
        let record = classify_one("int main() { log_error(malloc(10)); return 0; }");
        assert_eq!(record.category, Category::LoggedNotHandled);
    }

    #[test]
    fn nearest_call_context_decides() {
        // The watched call is an argument of `wrap`, not of `handle`.
        let record = classify_one("int main() { handle(wrap(malloc(10))); return 0; }");
        assert_eq!(record.category, Category::UsedOther);
    }

    #[test]
    fn returned_value_propagates() {
        let record = classify_one("void *get(void) { return malloc(10); }");
        assert_eq!(record.category, Category::Propagated);
    }

    #[test]
    fn return_beats_branch_condition() {
        let record =
            classify_one("int main() { if (1) return malloc(10) == 0; return 0; }");
        assert_eq!(record.category, Category::Propagated);
    }

    #[test]
    fn branch_without_catchall() {
        let record = classify_one("int main() { if (!malloc(10)) return 1; return 0; }");
        assert_eq!(record.category, Category::BranchedNoCatchall);
    }

    #[test]
    fn branch_with_catchall() {
        let record = classify_one(
            "int main() { int r = 0; if (!malloc(10)) r = 1; else r = 2; return r; }",
        );
        assert_eq!(record.category, Category::BranchedWithCatchall);
    }

    #[test]
    fn else_if_without_terminal_else() {
        let record = classify_one(
            "int main() { int c = 0; if (!malloc(10)) c = 1; else if (c) c = 2; return c; }",
        );
        assert_eq!(record.category, Category::BranchedNoCatchall);
    }

    #[test]
    fn else_if_condition_with_terminal_else() {
        let record = classify_one(
            "int main() { int c = 0; if (c) c = 1; else if (!malloc(10)) c = 2; else c = 3; return c; }",
        );
        assert_eq!(record.category, Category::BranchedWithCatchall);
    }

    #[test]
    fn switch_with_default_is_a_catchall() {
        let record = classify_one(
            "int main() { switch ((long)malloc(10)) { case 0: return 1; default: return 2; } }",
        );
        assert_eq!(record.category, Category::BranchedWithCatchall);
    }

    #[test]
    fn assigned_and_never_read() {
        let record = classify_one("int main() { void *p = malloc(10); return 0; }");
        assert_eq!(record.category, Category::AssignedNotRead);
        let site = record.assigned.expect("missing site");
        assert_eq!((site.line, site.column), (1, 24));
    }

    #[test]
    fn assigned_to_existing_local() {
        let record = classify_one("int main() { void *p; p = malloc(10); return 0; }");
        assert_eq!(record.category, Category::AssignedNotRead);
    }

    #[test]
    fn assignment_to_global_is_not_tracked() {
        let record =
            classify_one("void *keep; int main() { keep = malloc(10); return 0; }");
        assert_eq!(record.category, Category::UsedOther);
    }

    #[test]
    fn arithmetic_use_is_other() {
        let record = classify_one("int main() { long v = (long)malloc(10) + 1; return (int)v; }");
        assert_eq!(record.category, Category::UsedOther);
    }
}
