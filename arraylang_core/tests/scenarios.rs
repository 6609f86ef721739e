//! End-to-end coverage for the six literal scenarios in the interpreter
//! core's testable-properties contract, driven entirely through the public
//! crate surface (`Interpreter`, `run_script`, `load_definition`) rather
//! than internal evaluator functions — a different vantage point from the
//! unit tests colocated with each module.

use arraylang_core::host::{BufferHost, NullResolver};
use arraylang_core::ir::{BinOpTag, Definition, Expr, LValue, Stmt, StmtKind};
use arraylang_core::{load_definition, run_script, Interpreter};

fn interpreter() -> Interpreter {
    Interpreter::new(Box::new(BufferHost::default()), NullResolver)
}

// ── scenario 1: writing past an array's current bounds grows it,
//    zero-filling the gap ──
#[test]
fn auto_expand_on_write() {
    let mut interp = interpreter();
    let body = vec![
        Stmt::new(StmtKind::Assign { lvalues: vec![LValue::Symbol("a".into())], rvalue: Expr::Matrix(vec![]) }),
        Stmt::new(StmtKind::Assign {
            lvalues: vec![LValue::Index { name: "a".into(), args: vec![Expr::IntConst(3)] }],
            rvalue: Expr::IntConst(7),
        }),
    ];
    run_script(&mut interp, body).unwrap();
    assert_eq!(interp.root_env.get("a").unwrap().display_text(), "[0 0 7]");
}

// ── scenario 2: indexing with fewer subscripts than dimensions folds the
//    trailing dimensions into one linear span ──
#[test]
fn linear_tail_extension() {
    let mut interp = interpreter();
    let reshape_call = Expr::Param {
        callee: Box::new(Expr::Symbol("reshape".into())),
        args: vec![
            Expr::Range { start: Box::new(Expr::IntConst(1)), step: None, end: Box::new(Expr::IntConst(12)) },
            Expr::IntConst(2),
            Expr::IntConst(3),
            Expr::IntConst(2),
        ],
    };
    let body = vec![
        Stmt::new(StmtKind::Assign { lvalues: vec![LValue::Symbol("a".into())], rvalue: reshape_call }),
        Stmt::new(StmtKind::Assign {
            lvalues: vec![LValue::Symbol("x".into())],
            rvalue: Expr::Param {
                callee: Box::new(Expr::Symbol("a".into())),
                args: vec![Expr::IntConst(2), Expr::IntConst(6)],
            },
        }),
    ];
    run_script(&mut interp, body).unwrap();
    assert_eq!(interp.root_env.get("x").unwrap().display_text(), "[12]");
}

// ── scenario 3: comparing an array against a scalar broadcasts the scalar
//    and always yields a bool array ──
#[test]
fn broadcast_comparison_yields_bool_array() {
    let mut interp = interpreter();
    let body = vec![Stmt::new(StmtKind::Assign {
        lvalues: vec![LValue::Symbol("m".into())],
        rvalue: Expr::BinaryOp {
            op: BinOpTag::Lt,
            lhs: Box::new(Expr::Matrix(vec![vec![Expr::IntConst(1), Expr::IntConst(2), Expr::IntConst(3)]])),
            rhs: Box::new(Expr::IntConst(2)),
        },
    })];
    run_script(&mut interp, body).unwrap();
    assert_eq!(interp.root_env.get("m").unwrap().display_text(), "[true false false]");
}

// ── scenario 4: indexed-assigning into an empty cell array past its
//    current length grows it and wraps the scalar into a cell ──
#[test]
fn cell_index_auto_wrap() {
    let mut interp = interpreter();
    let body = vec![
        Stmt::new(StmtKind::Assign { lvalues: vec![LValue::Symbol("c".into())], rvalue: Expr::CellArray(vec![]) }),
        Stmt::new(StmtKind::Assign {
            lvalues: vec![LValue::CellIndex { name: "c".into(), args: vec![Expr::IntConst(2)] }],
            rvalue: Expr::StringConst("hi".into()),
        }),
    ];
    run_script(&mut interp, body).unwrap();
    let c = interp.root_env.get("c").unwrap();
    let arr = c.as_array().unwrap();
    assert_eq!(arr.borrow().dims, vec![1, 2]);
}

// ── scenario 5: a function with two declared outputs can be called for
//    one value or destructured into both ──
#[test]
fn multi_value_return() {
    let mut interp = interpreter();
    let def = Definition::Function {
        name: "pair".into(),
        in_params: vec![],
        out_params: vec!["a".into(), "b".into()],
        nested: vec![],
        body: vec![
            Stmt::new(StmtKind::Assign { lvalues: vec![LValue::Symbol("a".into())], rvalue: Expr::IntConst(10) }),
            Stmt::new(StmtKind::Assign { lvalues: vec![LValue::Symbol("b".into())], rvalue: Expr::IntConst(20) }),
        ],
        is_script: false,
        is_closure: false,
    };
    load_definition(&interp, &def);

    let single = vec![Stmt::new(StmtKind::Assign {
        lvalues: vec![LValue::Symbol("x".into())],
        rvalue: Expr::Param { callee: Box::new(Expr::Symbol("pair".into())), args: vec![] },
    })];
    run_script(&mut interp, single).unwrap();
    assert_eq!(interp.root_env.get("x").unwrap().display_text(), "[10]");

    let destructured = vec![Stmt::new(StmtKind::Assign {
        lvalues: vec![LValue::Symbol("p".into()), LValue::Symbol("q".into())],
        rvalue: Expr::Param { callee: Box::new(Expr::Symbol("pair".into())), args: vec![] },
    })];
    run_script(&mut interp, destructured).unwrap();
    assert_eq!(interp.root_env.get("p").unwrap().display_text(), "[10]");
    assert_eq!(interp.root_env.get("q").unwrap().display_text(), "[20]");
}

// ── scenario 6: a `for` loop over a descending range runs while its
//    signed step still moves toward the end bound ──
#[test]
fn for_range_with_negative_step() {
    let mut interp = interpreter();
    let body = vec![
        Stmt::new(StmtKind::Assign { lvalues: vec![LValue::Symbol("s".into())], rvalue: Expr::IntConst(0) }),
        Stmt::new(StmtKind::For {
            var: "i".into(),
            iterable: Expr::Range {
                start: Box::new(Expr::IntConst(5)),
                step: Some(Box::new(Expr::IntConst(-2))),
                end: Box::new(Expr::IntConst(0)),
            },
            body: vec![Stmt::new(StmtKind::Assign {
                lvalues: vec![LValue::Symbol("s".into())],
                rvalue: Expr::BinaryOp {
                    op: BinOpTag::Add,
                    lhs: Box::new(Expr::Symbol("s".into())),
                    rhs: Box::new(Expr::Symbol("i".into())),
                },
            })],
        }),
    ];
    run_script(&mut interp, body).unwrap();
    // 5 + 3 + 1 = 9
    assert_eq!(interp.root_env.get("s").unwrap().display_text(), "[9]");
}
