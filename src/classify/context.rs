//! Parent-chain and expression-context queries over the frontend AST: the
//! plumbing every classification rule stands on.

use crate::shared::notable::{Registry, Role};
use cfront::{Ast, NodeId, NodeKind};

/// Wrapper expressions are transparent for upward walks: parentheses and
/// explicit casts.
pub fn is_wrapper(ast: &Ast, id: NodeId) -> bool {
    matches!(ast.kind(id), NodeKind::Paren(_) | NodeKind::Cast { .. })
}

/// Climb from `id` through wrapper parents. Returns the topmost wrapper, or
/// `id` itself when nothing wraps it.
pub fn top_of_wrappers(ast: &Ast, id: NodeId) -> NodeId {
    let mut top = id;
    while let Some(parent) = ast.parent(top) {
        if is_wrapper(ast, parent) {
            top = parent;
        } else {
            break;
        }
    }
    top
}

/// Strip parentheses downward.
pub fn strip_parens(ast: &Ast, mut id: NodeId) -> NodeId {
    while let NodeKind::Paren(inner) = ast.kind(id) {
        id = *inner;
    }
    id
}

/// Strip parentheses and casts downward: the bare value-bearing expression.
pub fn strip_wrappers(ast: &Ast, mut id: NodeId) -> NodeId {
    loop {
        match ast.kind(id) {
            NodeKind::Paren(inner) => id = *inner,
            NodeKind::Cast { operand, .. } => id = *operand,
            _ => return id,
        }
    }
}

/// The statement of the nearest enclosing compound block that contains `id`:
/// (block, index within the block, statement).
pub fn enclosing_statement(ast: &Ast, id: NodeId) -> Option<(NodeId, usize, NodeId)> {
    let mut child = id;
    while let Some(parent) = ast.parent(child) {
        if let NodeKind::Compound(stmts) = ast.kind(parent) {
            let index = stmts.iter().position(|s| *s == child)?;
            return Some((parent, index, child));
        }
        child = parent;
    }
    None
}

/// Whether the expression's value is syntactically discarded: after walking
/// through wrappers, the first non-expression parent is a compound-block
/// child slot, a branch/loop substatement, a `for` init or increment slot,
/// or the substatement of `case`/`default`/a label.
pub fn in_statement_position(ast: &Ast, id: NodeId) -> bool {
    let top = top_of_wrappers(ast, id);
    let Some(parent) = ast.parent(top) else {
        return false;
    };
    match ast.kind(parent) {
        NodeKind::Compound(_) => true,
        NodeKind::If {
            then_branch,
            else_branch,
            ..
        } => top == *then_branch || Some(top) == *else_branch,
        NodeKind::While { body, .. } | NodeKind::DoWhile { body, .. } => top == *body,
        NodeKind::For {
            init, step, body, ..
        } => init.contains(&top) || Some(top) == *step || top == *body,
        NodeKind::Switch { body, .. } => top == *body,
        NodeKind::Case { body, .. }
        | NodeKind::Default { body }
        | NodeKind::Label { body, .. } => top == *body,
        _ => false,
    }
}

/// The written name of a call's direct callee, through parentheses. `None`
/// for calls through anything but a plain identifier.
pub fn callee_name(ast: &Ast, call: NodeId) -> Option<&str> {
    if let NodeKind::Call { callee, .. } = ast.kind(call) {
        if let NodeKind::Ident(name) = ast.kind(strip_parens(ast, *callee)) {
            return Some(name);
        }
    }
    None
}

/// The nearest enclosing call that takes `id` somewhere within an argument
/// subtree (not the callee slot).
pub fn enclosing_call_argument(ast: &Ast, id: NodeId) -> Option<NodeId> {
    let mut child = id;
    while let Some(parent) = ast.parent(child) {
        if let NodeKind::Call { callee, .. } = ast.kind(parent) {
            if *callee != child {
                return Some(parent);
            }
        }
        child = parent;
    }
    None
}

/// The nearest enclosing `if`/`switch` whose condition subtree contains
/// `id`.
pub fn enclosing_branch_condition(ast: &Ast, id: NodeId) -> Option<NodeId> {
    let mut child = id;
    while let Some(parent) = ast.parent(child) {
        match ast.kind(parent) {
            NodeKind::If { cond, .. } | NodeKind::Switch { cond, .. } if *cond == child => {
                return Some(parent);
            }
            _ => {}
        }
        child = parent;
    }
    None
}

/// Catch-all detection: a terminal `else` that is not another `if`, or a
/// `default` label directly in the `switch` body.
pub fn branch_has_catchall(ast: &Ast, branch: NodeId) -> bool {
    match ast.kind(branch) {
        NodeKind::If { .. } => {
            let mut cursor = branch;
            loop {
                let NodeKind::If { else_branch, .. } = ast.kind(cursor) else {
                    return true;
                };
                match else_branch {
                    None => return false,
                    Some(next) => cursor = *next,
                }
            }
        }
        NodeKind::Switch { body, .. } => has_default(ast, *body),
        _ => false,
    }
}

/// Search for a `default` label, without descending into nested switches.
fn has_default(ast: &Ast, id: NodeId) -> bool {
    match ast.kind(id) {
        NodeKind::Default { .. } => true,
        NodeKind::Switch { .. } => false,
        _ => ast.children(id).into_iter().any(|c| has_default(ast, c)),
    }
}

/// Whether `name`, looked up from `from` outward, resolves to a local
/// variable (block-scope declaration without static/extern storage, or a
/// parameter).
pub fn is_local_variable(ast: &Ast, from: NodeId, name: &str) -> bool {
    let mut cursor = Some(from);
    while let Some(id) = cursor {
        match ast.kind(id) {
            NodeKind::Compound(stmts) => {
                for stmt in stmts {
                    if let NodeKind::VarDecl {
                        name: declared,
                        is_local,
                        ..
                    } = ast.kind(*stmt)
                    {
                        if declared == name {
                            return *is_local;
                        }
                    }
                }
            }
            NodeKind::For { init, .. } => {
                for decl in init {
                    if let NodeKind::VarDecl {
                        name: declared,
                        is_local,
                        ..
                    } = ast.kind(*decl)
                    {
                        if declared == name {
                            return *is_local;
                        }
                    }
                }
            }
            NodeKind::Function { params, .. } => {
                for param in params {
                    if let NodeKind::VarDecl { name: declared, .. } = ast.kind(*param) {
                        if declared == name {
                            return true;
                        }
                    }
                }
            }
            _ => {}
        }
        cursor = ast.parent(id);
    }
    false
}

/// What a reference found by [`scan_refs`] was doing, judged from its
/// surroundings.
#[derive(Default, Clone, Copy, Debug)]
pub struct RefScan {
    /// Some read reference exists at all.
    pub any: bool,

    /// A reference sits inside the argument list of a handler call.
    pub handler_arg: bool,

    /// A reference sits inside the argument list of a logger call.
    pub logger_arg: bool,

    /// A reference sits inside a `return` value.
    pub returned: bool,
}

/// The innermost call whose argument list the scan is currently inside.
#[derive(Clone, Copy)]
enum ArgContext {
    Handler,
    Logger,
    Other,
}

/// Scan a subtree for references matched by `is_ref`, tracking the argument
/// context of the innermost enclosing call and whether the reference sits in
/// a `return` value. The left-hand side of a plain assignment whose target
/// is itself a reference is a write, not a read, and is skipped.
pub fn scan_refs<F>(ast: &Ast, registry: &Registry, root: NodeId, is_ref: &F) -> RefScan
where
    F: Fn(&Ast, NodeId) -> bool,
{
    let mut scan = RefScan::default();
    scan_inner(ast, registry, root, is_ref, None, false, &mut scan);
    scan
}

fn scan_inner<F>(
    ast: &Ast,
    registry: &Registry,
    id: NodeId,
    is_ref: &F,
    context: Option<ArgContext>,
    in_return: bool,
    out: &mut RefScan,
) where
    F: Fn(&Ast, NodeId) -> bool,
{
    if is_ref(ast, id) {
        out.any = true;
        match context {
            Some(ArgContext::Handler) => out.handler_arg = true,
            Some(ArgContext::Logger) => out.logger_arg = true,
            _ => {}
        }
        if in_return {
            out.returned = true;
        }
        return;
    }
    match ast.kind(id) {
        NodeKind::Call { callee, args } => {
            scan_inner(ast, registry, *callee, is_ref, context, in_return, out);
            let arg_context = match callee_name(ast, id).and_then(|n| registry.role(n)) {
                Some(Role::Handler) => ArgContext::Handler,
                Some(Role::Logger) => ArgContext::Logger,
                _ => ArgContext::Other,
            };
            for arg in args {
                scan_inner(ast, registry, *arg, is_ref, Some(arg_context), in_return, out);
            }
        }
        NodeKind::Return(value) => {
            if let Some(value) = value {
                scan_inner(ast, registry, *value, is_ref, context, true, out);
            }
        }
        NodeKind::Binary { op, lhs, rhs }
            if op.is_plain_assignment() && is_ref(ast, strip_parens(ast, *lhs)) =>
        {
            scan_inner(ast, registry, *rhs, is_ref, context, in_return, out);
        }
        _ => {
            for child in ast.children(id) {
                scan_inner(ast, registry, child, is_ref, context, in_return, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::notable::Registry;
    use cfront::Ast;

    fn registry() -> Registry {
        Registry::from_json(
            r#"[
                {"name": "handle", "type": "handler"},
                {"name": "log_errno", "type": "logger"}
            ]"#,
        )
        .expect("bad test registry")
    }

    fn parse(source: &str) -> Ast {
        cfront::parse("test.c", source).expect("parse failed")
    }

    fn body(ast: &Ast) -> Vec<NodeId> {
        for root in ast.roots() {
            if let NodeKind::Function {
                body: Some(body), ..
            } = ast.kind(*root)
            {
                if let NodeKind::Compound(stmts) = ast.kind(*body) {
                    return stmts.clone();
                }
            }
        }
        panic!("no function body");
    }

    fn is_err_ref(ast: &Ast, id: NodeId) -> bool {
        matches!(ast.kind(id), NodeKind::Ident(name) if name == "err")
    }

    #[test]
    fn statement_position_through_wrappers() {
        let ast = parse("int main() { int err = 0; ((err)); if (err) (err); }");
        let stmts = body(&ast);
        // `((err))` is a compound child through two parens.
        let inner = strip_parens(&ast, stmts[1]);
        assert!(in_statement_position(&ast, inner));
        // `(err)` in the if substatement slot.
        let NodeKind::If { then_branch, cond, .. } = ast.kind(stmts[2]) else {
            panic!("expected if");
        };
        assert!(in_statement_position(&ast, strip_parens(&ast, *then_branch)));
        assert!(!in_statement_position(&ast, *cond));
    }

    #[test]
    fn enclosing_statement_finds_the_compound_child() {
        let ast = parse("int main() { int err = 0; if (err) { handle(err); } }");
        let stmts = body(&ast);
        let mut handle_call = None;
        ast.walk(stmts[1], &mut |id| {
            if matches!(ast.kind(id), NodeKind::Call { .. }) {
                handle_call = Some(id);
            }
        });
        let (_, index, stmt) = enclosing_statement(&ast, handle_call.expect("no call"))
            .expect("no enclosing statement");
        assert_eq!(index, 0);
        assert!(matches!(ast.kind(stmt), NodeKind::Call { .. }));
    }

    #[test]
    fn catchall_on_if_chains() {
        let ast = parse(
            "int main() { int e = 0; if (e) e = 1; if (e) e = 1; else e = 2; \
             if (e) e = 1; else if (e) e = 2; }",
        );
        let stmts = body(&ast);
        assert!(!branch_has_catchall(&ast, stmts[1]));
        assert!(branch_has_catchall(&ast, stmts[2]));
        assert!(!branch_has_catchall(&ast, stmts[3]));
    }

    #[test]
    fn nested_switch_default_is_not_a_catchall() {
        let ast = parse(
            "int main() { int e = 0; switch (e) { case 1: switch (e) { default: break; } break; } \
             switch (e) { default: break; } }",
        );
        let stmts = body(&ast);
        assert!(!branch_has_catchall(&ast, stmts[1]));
        assert!(branch_has_catchall(&ast, stmts[2]));
    }

    #[test]
    fn scan_sees_handler_and_logger_contexts() {
        let ast = parse("int main() { int err = 0; handle(err); log_errno(1 + err); free(err); }");
        let stmts = body(&ast);
        let registry = registry();

        let scan = scan_refs(&ast, &registry, stmts[1], &is_err_ref);
        assert!(scan.handler_arg && scan.any);
        let scan = scan_refs(&ast, &registry, stmts[2], &is_err_ref);
        assert!(scan.logger_arg && !scan.handler_arg);
        let scan = scan_refs(&ast, &registry, stmts[3], &is_err_ref);
        assert!(scan.any && !scan.handler_arg && !scan.logger_arg);
    }

    #[test]
    fn innermost_call_context_wins() {
        let ast = parse("int main() { int err = 0; handle(free(err)); }");
        let scan = scan_refs(&ast, &registry(), body(&ast)[1], &is_err_ref);
        assert!(scan.any && !scan.handler_arg);
    }

    #[test]
    fn plain_assignment_target_is_not_a_read() {
        let ast = parse("int main() { int err = 0; err = 5; err += 5; }");
        let stmts = body(&ast);
        let registry = registry();
        assert!(!scan_refs(&ast, &registry, stmts[1], &is_err_ref).any);
        assert!(scan_refs(&ast, &registry, stmts[2], &is_err_ref).any);
    }

    #[test]
    fn return_value_references_are_flagged() {
        let ast = parse("int main() { int err = 0; if (err) return err; return 0; }");
        let stmts = body(&ast);
        let scan = scan_refs(&ast, &registry(), stmts[1], &is_err_ref);
        assert!(scan.returned);
    }

    #[test]
    fn locals_and_params_resolve_as_local() {
        let ast = parse(
            "int global; int helper(int err) { return err; } \
             int main() { static int fixed = 0; int err = 0; return err + fixed + global; }",
        );
        let mut ret = None;
        for root in ast.roots() {
            if let NodeKind::Function { name, body, .. } = ast.kind(*root) {
                if name == "main" {
                    ret = *body;
                }
            }
        }
        let from = ret.expect("no main body");
        assert!(is_local_variable(&ast, from, "err"));
        assert!(!is_local_variable(&ast, from, "fixed"));
        assert!(!is_local_variable(&ast, from, "global"));
        assert!(!is_local_variable(&ast, from, "missing"));
    }
}
