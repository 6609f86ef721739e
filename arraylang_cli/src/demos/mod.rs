//! Built-in demonstration scripts, run when no `--program` file is given.
//!
//! There is no parser wired into this workspace (it is an external
//! collaborator per the core's scope), so a demo script is built directly
//! as IR rather than typed as source text.

use arraylang_core::ir::{BinOpTag, Expr, LValue, Stmt, StmtKind};

/// Builds the sum-of-1-to-10 accumulator used as the default demo.
pub fn sum_loop() -> Vec<Stmt> {
    vec![
        Stmt::new(StmtKind::Assign { lvalues: vec![LValue::Symbol("total".into())], rvalue: Expr::IntConst(0) }),
        Stmt::new(StmtKind::For {
            var: "i".into(),
            iterable: Expr::Range { start: Box::new(Expr::IntConst(1)), step: None, end: Box::new(Expr::IntConst(10)) },
            body: vec![Stmt::new(StmtKind::Assign {
                lvalues: vec![LValue::Symbol("total".into())],
                rvalue: Expr::BinaryOp {
                    op: BinOpTag::Add,
                    lhs: Box::new(Expr::Symbol("total".into())),
                    rhs: Box::new(Expr::Symbol("i".into())),
                },
            })],
        }),
        Stmt::with_suppress(
            StmtKind::Expr(Expr::Param {
                callee: Box::new(Expr::Symbol("disp".into())),
                args: vec![Expr::Symbol("total".into())],
            }),
            true,
        ),
    ]
}
