//! The intermediate representation delivered by the (external) parser (C4,
//! §3.5, §6.1).
//!
//! An owned tree of sub-nodes rather than a pointer-heavy shared graph —
//! `Environment::copy` deep-copies closures, so nothing here needs to be an
//! arena of indices; see the design notes on this tradeoff.

/// A statement. Every statement carries a `suppress` flag controlling echo
/// on completion (§3.5).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub suppress: bool,
    /// Reconstructed source text, used only for error-breadcrumb display
    /// (§7); absent for synthesized (lowered) statements.
    pub source: Option<String>,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Stmt { kind, suppress: true, source: None }
    }

    pub fn with_suppress(kind: StmtKind, suppress: bool) -> Self {
        Stmt { kind, suppress, source: None }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum StmtKind {
    IfElse {
        branches: Vec<(Expr, Vec<Stmt>)>,
        else_body: Vec<Stmt>,
    },
    /// Canonical loop form produced by lowering (§4.2.7, §4.3).
    Loop {
        init: Vec<Stmt>,
        test: Vec<Stmt>,
        test_var: String,
        body: Vec<Stmt>,
        incr: Vec<Stmt>,
    },
    For {
        var: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Switch {
        scrutinee: Expr,
        cases: Vec<(Expr, Vec<Stmt>)>,
        default: Vec<Stmt>,
    },
    Break,
    Continue,
    Return,
    Assign {
        lvalues: Vec<LValue>,
        rvalue: Expr,
    },
    Expr(Expr),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum LValue {
    Symbol(String),
    Index { name: String, args: Vec<Expr> },
    CellIndex { name: String, args: Vec<Expr> },
}

/// One `(symbol, dim-index, is-last-component)` association attached to an
/// `end` token (§4.2.9).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EndAssoc {
    pub symbol: String,
    pub dim_index: usize,
    pub is_last_component: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    /// `f(...)` / `M(...)` — resolved to a call or an index at evaluation
    /// time by the runtime kind of the callee (§4.2.3).
    Param { callee: Box<Expr>, args: Vec<Expr> },
    /// `M{...}`.
    CellIndex { object: Box<Expr>, args: Vec<Expr> },
    BinaryOp { op: BinOpTag, lhs: Box<Expr>, rhs: Box<Expr> },
    UnaryOp { op: UnOpTag, operand: Box<Expr> },
    Symbol(String),
    IntConst(i64),
    FloatConst(f64),
    StringConst(String),
    Range { start: Box<Expr>, step: Option<Box<Expr>>, end: Box<Expr> },
    /// The `:` full-range sentinel used bare as an index argument.
    FullRange,
    End(Vec<EndAssoc>),
    /// Row-list-of-row-lists literal, e.g. `[1 2; 3 4]`.
    Matrix(Vec<Vec<Expr>>),
    CellArray(Vec<Vec<Expr>>),
    FnHandle(String),
    Lambda { params: Vec<String>, body: Box<Expr> },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Copy, PartialEq, Eq)]
pub enum BinOpTag {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Mod,
    MatMul,
    LeftDivide,
    RightDivide,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    ShortAnd,
    ShortOr,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Copy, PartialEq, Eq)]
pub enum UnOpTag {
    Neg,
    Not,
    Transpose,
}

/// A top-level definition delivered by the parser (§6.1): either a script
/// or a function.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Definition {
    Script { name: String, body: Vec<Stmt> },
    Function {
        name: String,
        in_params: Vec<String>,
        out_params: Vec<String>,
        nested: Vec<Definition>,
        body: Vec<Stmt>,
        is_script: bool,
        is_closure: bool,
    },
}

impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Definition::Script { name, .. } => name,
            Definition::Function { name, .. } => name,
        }
    }
}
