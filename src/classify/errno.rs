//! Classification for watched functions that report errors through the
//! thread-local `errno`. Analysis is confined to the call statement and the
//! immediately following statement of the same compound block; nothing ever
//! looks at a third sibling.

use crate::{
    classify::{Category, Classification, context, track},
    shared::notable::Registry,
};
use cfront::{Ast, Loc, NodeId, NodeKind, UnaryOp};

/// An errno read: the identifier `errno`, a call to the builtin accessors
/// `__errno_location`/`__error`, or a dereference of either. These are the
/// spellings the `errno` macro leaves behind on common platforms.
pub fn is_errno_ref(ast: &Ast, id: NodeId) -> bool {
    match ast.kind(id) {
        NodeKind::Ident(name) => name == "errno",
        NodeKind::Call { callee, .. } => matches!(
            ast.kind(context::strip_parens(ast, *callee)),
            NodeKind::Ident(name) if name == "__errno_location" || name == "__error"
        ),
        NodeKind::Unary {
            op: UnaryOp::Deref,
            operand,
        } => is_errno_ref(ast, context::strip_parens(ast, *operand)),
        _ => false,
    }
}

pub fn classify(ast: &Ast, registry: &Registry, call: NodeId) -> Classification {
    let Some((block, index, first)) = context::enclosing_statement(ast, call) else {
        return Classification::of(Category::Ignored);
    };
    let second = ast.children(block).into_iter().nth(index + 1);

    let mut statements = vec![(index, first)];
    if let Some(second) = second {
        statements.push((index + 1, second));
    }

    let scans: Vec<_> = statements
        .iter()
        .map(|(_, stmt)| context::scan_refs(ast, registry, *stmt, &is_errno_ref))
        .collect();

    // 1. errno is never consulted.
    if !scans.iter().any(|scan| scan.any) {
        return Classification::of(Category::Ignored);
    }

    // 2. errno flows into a handler call.
    if scans.iter().any(|scan| scan.handler_arg) {
        return Classification::of(Category::PassedToHandlerFn);
    }

    // 3. errno is returned.
    if scans.iter().any(|scan| scan.returned) {
        return Classification::of(Category::Propagated);
    }

    // 4. One of the two statements branches on errno.
    for (_, stmt) in &statements {
        if let NodeKind::If { cond, .. } | NodeKind::Switch { cond, .. } = ast.kind(*stmt) {
            if context::scan_refs(ast, registry, *cond, &is_errno_ref).any {
                return Classification::of(Category::branched(context::branch_has_catchall(
                    ast, *stmt,
                )));
            }
        }
    }

    // 5. errno is copied into a local; follow the copy. Casting that copy
    //    to void later does not count as cast_to_void.
    for (stmt_index, stmt) in &statements {
        if let Some((var, site)) = errno_copy(ast, *stmt) {
            return track::run(ast, registry, block, *stmt_index, var, site, false);
        }
    }

    // 6. errno only reached a logger.
    if scans.iter().any(|scan| scan.logger_arg) {
        return Classification::of(Category::LoggedNotHandled);
    }

    // 7. Referenced, but only in arithmetic, casts, or ordinary calls.
    Classification::of(Category::UsedOther)
}

/// A statement that copies errno into a local: a declaration initializer or
/// a plain assignment whose right-hand side, after trivial unwrapping, is
/// the errno expression itself.
fn errno_copy(ast: &Ast, stmt: NodeId) -> Option<(&str, Loc)> {
    match ast.kind(stmt) {
        NodeKind::VarDecl {
            name,
            init: Some(init),
            is_local: true,
            ..
        } if is_errno_ref(ast, context::strip_wrappers(ast, *init)) => {
            Some((name, ast.loc(*init)))
        }
        NodeKind::Binary { op, lhs, rhs }
            if op.is_plain_assignment()
                && is_errno_ref(ast, context::strip_wrappers(ast, *rhs)) =>
        {
            match ast.kind(context::strip_parens(ast, *lhs)) {
                NodeKind::Ident(name) if context::is_local_variable(ast, stmt, name) => {
                    Some((name, ast.loc(*rhs)))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Record, analyze_unit};

    fn registry() -> Registry {
        Registry::from_json(
            r#"[
                {"name": "strtoull", "reporting": "errno"},
                {"name": "handle", "type": "handler"},
                {"name": "log_errno", "type": "logger"}
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

    const CALL: &str = "unsigned long x = strtoull(\"\", 0, 10);";

    #[test]
    fn no_errno_reference_is_ignored() {
        let record = classify_one(&format!("int main() {{ {CALL} return (int)x; }}"));
        assert_eq!(record.category, Category::Ignored);
    }

    #[test]
    fn errno_reference_beyond_the_next_statement_is_ignored() {
        let record = classify_one(&format!(
            "int main() {{ {CALL} int y = 0; if (errno) return 1; return (int)(x + y); }}"
        ));
        assert_eq!(record.category, Category::Ignored);
    }

    #[test]
    fn clearing_errno_is_not_a_read() {
        let record = classify_one(&format!("int main() {{ {CALL} errno = 0; return (int)x; }}"));
        assert_eq!(record.category, Category::Ignored);
    }

    #[test]
    fn branch_on_errno() {
        let record = classify_one(&format!(
            "int main() {{ errno = 0; {CALL} if (errno == 34) return 1; return (int)x; }}"
        ));
        assert_eq!(record.category, Category::BranchedNoCatchall);
    }

    #[test]
    fn branch_on_errno_with_catchall() {
        let record = classify_one(&format!(
            "int main() {{ {CALL} if (errno) return 1; else return 0; }}"
        ));
        assert_eq!(record.category, Category::BranchedWithCatchall);
    }

    #[test]
    fn branch_wins_over_logging_inside_the_branch() {
        let record = classify_one(&format!(
            "void log_errno(int v); int main() {{ {CALL} \
             if (errno) {{ log_errno(errno); return 1; }} return 0; }}"
        ));
        assert_eq!(record.category, Category::BranchedNoCatchall);
    }

    #[test]
    fn returned_errno_propagates() {
        let record = classify_one(&format!("int main() {{ {CALL} return errno; }}"));
        assert_eq!(record.category, Category::Propagated);
    }

    #[test]
    fn copy_then_return_propagates() {
        let record = classify_one(&format!(
            "int main() {{ {CALL} int err = errno; if (err) return err; return (int)x; }}"
        ));
        assert_eq!(record.category, Category::Propagated);
    }

    #[test]
    fn errno_into_handler() {
        let record = classify_one(&format!("int main() {{ {CALL} handle(errno); return 0; }}"));
        assert_eq!(record.category, Category::PassedToHandlerFn);
    }

    #[test]
    fn errno_into_logger_only() {
        let record = classify_one(&format!(
            "void log_errno(int v); int main() {{ {CALL} log_errno(errno); }}"
        ));
        assert_eq!(record.category, Category::LoggedNotHandled);
    }

    #[test]
    fn errno_location_spelling_counts() {
        let record = classify_one(&format!(
            "int main() {{ {CALL} if (*__errno_location()) return 1; return 0; }}"
        ));
        assert_eq!(record.category, Category::BranchedNoCatchall);
    }

    #[test]
    fn copied_errno_cast_to_void_is_used_other() {
        let record = classify_one(&format!(
            "int main() {{ {CALL} int err = errno; int f = 0; if (f) f = 1; else f = 2; \
             (void)err; return (int)x; }}"
        ));
        assert_eq!(record.category, Category::UsedOther);
    }

    #[test]
    fn copied_errno_never_read_reports_the_copy_site() {
        let record = classify_one(&format!("int main() {{ {CALL} int err = errno; return 0; }}"));
        assert_eq!(record.category, Category::AssignedNotRead);
        let site = record.assigned.expect("missing site");
        // `errno` on the right-hand side of the copy.
        assert_eq!((site.line, site.column), (1, 63));
    }

    #[test]
    fn errno_in_arithmetic_is_used_other() {
        let record = classify_one(&format!("int main() {{ {CALL} int e = errno + 1; return e; }}"));
        assert_eq!(record.category, Category::UsedOther);
    }

    #[test]
    fn call_without_enclosing_block_is_ignored() {
        let record = classify_one("unsigned long x = strtoull(\"\", 0, 10);");
        assert_eq!(record.category, Category::Ignored);
    }
}
