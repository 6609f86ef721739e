//! The statement/expression evaluator (C7, §4.2).
//!
//! Control flow for `break`/`continue`/`return` travels on [`Signal`], a
//! channel kept deliberately distinct from `error::Traced` (design note:
//! "control-flow exceptions should NOT use the target language's generic
//! error mechanism"). `?` still works throughout this module because
//! `Signal` implements `From<Traced>`, but a loop or function dispatcher
//! can pattern-match `Signal::Flow(_)` out before it ever looks like an
//! ordinary error to a caller further up.

use std::rc::Rc;

use crate::env::Environment;
use crate::error::{ErrorKind, Traced};
use crate::interp::Interpreter;
use crate::ir::{BinOpTag, EndAssoc, Expr, LValue, Stmt, StmtKind, UnOpTag};
use crate::value::array::index::IndexComponent;
use crate::value::array::ops::{self, BinOp};
use crate::value::array::{linalg, ArrayBody, ArrayData};
use crate::value::{ElementKind, FunctionValue, Value};

/// The three non-local transfers the language defines (§4.2.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Break,
    Continue,
    Return,
}

/// Either an ordinary error or a control-flow transfer in flight.
#[derive(Debug, Clone)]
pub enum Signal {
    Error(Traced),
    Flow(Flow),
}

impl From<Traced> for Signal {
    fn from(t: Traced) -> Self {
        Signal::Error(t)
    }
}

pub type EvalResult<T> = std::result::Result<T, Signal>;

fn err<T>(kind: ErrorKind, msg: impl Into<String>) -> EvalResult<T> {
    Err(Signal::Error(Traced::new(kind, msg)))
}

// ── statement execution (§4.2.1) ──

pub fn exec_body(interp: &mut Interpreter, env: &Environment, body: &[Stmt]) -> EvalResult<()> {
    for stmt in body {
        exec_stmt(interp, env, stmt)?;
    }
    Ok(())
}

pub fn exec_stmt(interp: &mut Interpreter, env: &Environment, stmt: &Stmt) -> EvalResult<()> {
    match &stmt.kind {
        StmtKind::Expr(expr) => {
            let value = eval_expr_as_stmt(interp, env, expr)?;
            if !stmt.suppress {
                interp.host.println(&value.display_text());
            }
            Ok(())
        }
        StmtKind::Assign { lvalues, rvalue } => exec_assign(interp, env, lvalues, rvalue, stmt.suppress),
        StmtKind::IfElse { branches, else_body } => {
            for (cond, body) in branches {
                if eval_expr(interp, env, cond)?.is_truthy() {
                    return exec_body(interp, env, body);
                }
            }
            exec_body(interp, env, else_body)
        }
        StmtKind::Switch { scrutinee, cases, default } => {
            let value = eval_expr(interp, env, scrutinee)?;
            for (case_expr, body) in cases {
                let case_value = eval_expr(interp, env, case_expr)?;
                if values_equal(&value, &case_value) {
                    return exec_body(interp, env, body);
                }
            }
            exec_body(interp, env, default)
        }
        StmtKind::Loop { init, test, test_var, body, incr } => exec_loop(interp, env, init, test, test_var, body, incr),
        StmtKind::For { .. } | StmtKind::While { .. } => {
            // Canonical lowering (C6) runs once per function body on first
            // load; reaching an un-lowered loop here means it was executed
            // without going through `lowering::lower_body` first.
            err(ErrorKind::HostError, "encountered an un-lowered loop statement")
        }
        StmtKind::Break => Err(Signal::Flow(Flow::Break)),
        StmtKind::Continue => Err(Signal::Flow(Flow::Continue)),
        StmtKind::Return => Err(Signal::Flow(Flow::Return)),
    }
}

fn exec_loop(
    interp: &mut Interpreter,
    env: &Environment,
    init: &[Stmt],
    test: &[Stmt],
    test_var: &str,
    body: &[Stmt],
    incr: &[Stmt],
) -> EvalResult<()> {
    exec_body(interp, env, init)?;
    loop {
        exec_body(interp, env, test)?;
        let cond = env.get(test_var).ok_or_else(|| Signal::Error(Traced::new(ErrorKind::HostError, "loop test variable unbound")))?;
        if !cond.is_truthy() {
            break;
        }
        match exec_body(interp, env, body) {
            Ok(()) => {}
            Err(Signal::Flow(Flow::Break)) => break,
            Err(Signal::Flow(Flow::Continue)) => {}
            other => return other,
        }
        exec_body(interp, env, incr)?;
    }
    Ok(())
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            let xb = x.borrow();
            let yb = y.borrow();
            xb.numel() == yb.numel() && (0..xb.numel()).all(|i| xb.data.get_scalar(i).as_f64() == yb.data.get_scalar(i).as_f64())
        }
        _ => false,
    }
}

// ── assignment (§4.2.2) ──

fn exec_assign(interp: &mut Interpreter, env: &Environment, lvalues: &[LValue], rvalue: &Expr, suppress: bool) -> EvalResult<()> {
    let nargout = lvalues.len().max(1);
    let result = eval_expr_for_assign(interp, env, rvalue, nargout)?;

    if lvalues.len() == 1 {
        let value = match result {
            Value::Tuple(mut items) if !items.is_empty() => items.remove(0),
            Value::Tuple(_) => return err(ErrorKind::InsufficientReturns, "right-hand side produced no values"),
            other => other,
        };
        assign_lvalue(interp, env, &lvalues[0], value.clone())?;
        if !suppress {
            interp.host.println(&format!("{} = {}", lvalue_name(&lvalues[0]), value.display_text()));
        }
        return Ok(());
    }

    let items = match result {
        Value::Tuple(items) if items.len() >= lvalues.len() => items,
        _ => return err(ErrorKind::InsufficientReturns, format!("expected {} return values", lvalues.len())),
    };
    for (lv, v) in lvalues.iter().zip(items.into_iter()) {
        assign_lvalue(interp, env, lv, v)?;
    }
    Ok(())
}

fn lvalue_name(lv: &LValue) -> &str {
    match lv {
        LValue::Symbol(n) | LValue::Index { name: n, .. } | LValue::CellIndex { name: n, .. } => n,
    }
}

/// Returns the array bound to `name`, cloning its body first if it's
/// shared with another binding (copy-on-write enforcement for in-place
/// slice writes — see §3.1's value-semantics requirement).
fn own_array_for_mutation(env: &Environment, name: &str, fallback_kind: ElementKind) -> crate::value::array::ArrayRef {
    let existing = env.get(name).and_then(|v| v.as_array().cloned());
    let arr = existing.unwrap_or_else(|| ArrayBody::empty_of_kind(fallback_kind));
    let owned = if Rc::strong_count(&arr) > 1 {
        let cloned = arr.borrow().clone();
        Rc::new(std::cell::RefCell::new(cloned))
    } else {
        arr
    };
    env.define(name, Value::Array(owned.clone()));
    owned
}

fn assign_lvalue(interp: &mut Interpreter, env: &Environment, lvalue: &LValue, value: Value) -> EvalResult<()> {
    match lvalue {
        LValue::Symbol(name) => {
            env.assign_local(name, value);
            Ok(())
        }
        LValue::Index { name, args } => {
            let kind = value.as_array().map(|a| a.borrow().kind()).unwrap_or(ElementKind::Float);
            let target = own_array_for_mutation(env, name, kind);
            let target_kind = target.borrow().kind();
            let components = resolve_index_args(interp, env, args)?;
            let source = value.as_array().cloned().ok_or_else(|| Signal::Error(Traced::new(ErrorKind::ShapeMismatch, "cannot assign a non-array value into an indexed position")))?;
            interp.note_type_check(name, target_kind, source.borrow().kind());
            crate::value::array::slice::write_slice(&mut target.borrow_mut(), &components, &source.borrow())?;
            Ok(())
        }
        LValue::CellIndex { name, args } => {
            let target = own_array_for_mutation(env, name, ElementKind::Cell);
            if target.borrow().kind() != ElementKind::Cell {
                if target.borrow().is_empty() {
                    target.borrow_mut().data = ArrayData::Cell(vec![]);
                } else {
                    return err(ErrorKind::KindConversionRefused, "cell-index assignment target is not a cell array");
                }
            }
            let components = resolve_index_args(interp, env, args)?;
            let boxed = ArrayBody::new(vec![1, 1], ArrayData::Cell(vec![value]));
            interp.note_type_check(name, ElementKind::Cell, ElementKind::Cell);
            crate::value::array::slice::write_slice(&mut target.borrow_mut(), &components, &boxed.borrow())?;
            Ok(())
        }
    }
}

// ── expression evaluation (§4.2.3) ──

pub fn eval_expr(interp: &mut Interpreter, env: &Environment, expr: &Expr) -> EvalResult<Value> {
    let v = eval_expr_for_assign(interp, env, expr, 1)?;
    Ok(unwrap_single(v))
}

fn unwrap_single(v: Value) -> Value {
    match v {
        Value::Tuple(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    }
}

/// Evaluates a bare statement-level expression (§4.2.5 step 5): a call at
/// statement position is made with `nargout=0`, so a function with an
/// unassigned output is not an error there — it simply contributes nothing
/// to echo, rather than tripping `UnassignedReturn` the way an assignment's
/// right-hand side would.
fn eval_expr_as_stmt(interp: &mut Interpreter, env: &Environment, expr: &Expr) -> EvalResult<Value> {
    let v = eval_expr_for_assign(interp, env, expr, 0)?;
    Ok(unwrap_single(v))
}

/// The general entry point: identical to `eval_expr` except that a
/// call-site expression is evaluated with the given `nargout`, returning a
/// `Tuple` of the collected outputs. Used directly by assignment (§4.2.2).
fn eval_expr_for_assign(interp: &mut Interpreter, env: &Environment, expr: &Expr, nargout: usize) -> EvalResult<Value> {
    match expr {
        Expr::Symbol(name) => {
            let resolved = resolve_symbol(interp, env, name)?;
            if is_callable(&resolved) {
                call_value(interp, env, &resolved, vec![], nargout, name)
            } else {
                Ok(resolved)
            }
        }
        Expr::Param { callee, args } => eval_param(interp, env, callee, args, nargout),
        other => eval_plain(interp, env, other),
    }
}

fn is_callable(v: &Value) -> bool {
    matches!(v, Value::Function(_) | Value::FunctionHandle(_))
}

fn eval_param(interp: &mut Interpreter, env: &Environment, callee: &Expr, args: &[Expr], nargout: usize) -> EvalResult<Value> {
    let callee_name = if let Expr::Symbol(n) = callee { Some(n.clone()) } else { None };
    let callee_value = match &callee_name {
        Some(name) => resolve_symbol(interp, env, name)?,
        None => eval_expr(interp, env, callee)?,
    };

    match &callee_value {
        Value::Function(_) | Value::FunctionHandle(_) => {
            let mut evaluated = Vec::with_capacity(args.len());
            for a in args {
                evaluated.push(materialize(eval_expr(interp, env, a)?));
            }
            let label = callee_name.as_deref().unwrap_or("<anonymous>");
            call_value(interp, env, &callee_value, evaluated, nargout, label)
        }
        Value::Array(arr) => {
            let components = resolve_index_args(interp, env, args)?;
            let result = crate::value::array::slice::read_slice(&arr.borrow(), &components)?;
            Ok(Value::Array(result))
        }
        _ => err(ErrorKind::NotIndexable, "value is neither callable nor indexable"),
    }
}

fn eval_plain(interp: &mut Interpreter, env: &Environment, expr: &Expr) -> EvalResult<Value> {
    match expr {
        Expr::IntConst(i) => Ok(Value::scalar_int(*i)),
        Expr::FloatConst(f) => Ok(Value::scalar_float(*f)),
        Expr::StringConst(s) => Ok(Value::string(s)),
        Expr::FnHandle(name) => Ok(Value::FunctionHandle(name.clone())),
        Expr::FullRange => Ok(Value::Range(crate::value::range::RangeValue::full())),
        Expr::Range { start, step, end } => {
            let s = eval_expr(interp, env, start)?.as_array().map(|a| a.borrow().data.get_scalar(0).as_f64()).unwrap_or(0.0);
            let st = match step {
                Some(e) => eval_expr(interp, env, e)?.as_array().map(|a| a.borrow().data.get_scalar(0).as_f64()).unwrap_or(1.0),
                None => 1.0,
            };
            let e = eval_expr(interp, env, end)?.as_array().map(|a| a.borrow().data.get_scalar(0).as_f64()).unwrap_or(0.0);
            Ok(Value::Range(crate::value::range::RangeValue::new(s, st, e)))
        }
        Expr::End(assocs) => eval_end(env, assocs),
        Expr::BinaryOp { op, lhs, rhs } => eval_binop(interp, env, *op, lhs, rhs),
        Expr::UnaryOp { op, operand } => eval_unop(interp, env, *op, operand),
        Expr::Matrix(rows) => eval_matrix_literal(interp, env, rows),
        Expr::CellArray(rows) => eval_cell_literal(interp, env, rows),
        Expr::CellIndex { object, args } => eval_cell_index(interp, env, object, args),
        Expr::Lambda { params, body } => {
            let func = FunctionValue {
                name: "<lambda>".to_string(),
                in_params: params.clone(),
                out_params: vec!["ans".to_string()],
                nested: vec![],
                body: vec![Stmt::new(StmtKind::Assign {
                    lvalues: vec![LValue::Symbol("ans".to_string())],
                    rvalue: (**body).clone(),
                })],
                is_script: false,
                is_closure: true,
                captured_env: std::cell::RefCell::new(Some(env.copy())),
            };
            Ok(Value::Function(Rc::new(func)))
        }
        Expr::Symbol(_) | Expr::Param { .. } => unreachable!("handled by eval_expr_for_assign"),
    }
}

fn eval_end(env: &Environment, assocs: &[EndAssoc]) -> EvalResult<Value> {
    for assoc in assocs {
        if let Some(Value::Array(arr)) = env.get(&assoc.symbol) {
            let body = arr.borrow();
            let size = if assoc.is_last_component {
                body.dims.get(assoc.dim_index..).map(|s| s.iter().product::<usize>()).unwrap_or(1)
            } else {
                body.dims.get(assoc.dim_index).copied().unwrap_or(1)
            };
            return Ok(Value::scalar_int(size as i64));
        }
    }
    err(ErrorKind::UnboundEnd, "`end` used outside a resolvable index context")
}

fn eval_binop(interp: &mut Interpreter, env: &Environment, op: BinOpTag, lhs: &Expr, rhs: &Expr) -> EvalResult<Value> {
    if matches!(op, BinOpTag::ShortAnd | BinOpTag::ShortOr) {
        let l = eval_expr(interp, env, lhs)?;
        let truthy = l.is_truthy();
        let short_circuits = (op == BinOpTag::ShortAnd && !truthy) || (op == BinOpTag::ShortOr && truthy);
        if short_circuits {
            return Ok(Value::scalar_bool(truthy));
        }
        let r = eval_expr(interp, env, rhs)?;
        return Ok(Value::scalar_bool(r.is_truthy()));
    }

    let l = eval_expr(interp, env, lhs)?;
    let r = eval_expr(interp, env, rhs)?;
    let (la, ra) = (to_array(&l)?, to_array(&r)?);

    let result = match op {
        BinOpTag::MatMul => {
            if la.borrow().is_scalar() || ra.borrow().is_scalar() {
                ops::elementwise(BinOp::Mul, &la.borrow(), &ra.borrow())?
            } else {
                linalg::matmul(&la.borrow(), &ra.borrow())?
            }
        }
        BinOpTag::LeftDivide => {
            if ra.borrow().is_scalar() {
                ops::elementwise(BinOp::Div, &ra.borrow(), &la.borrow())?
            } else {
                linalg::solve(&la.borrow(), &ra.borrow())?
            }
        }
        BinOpTag::RightDivide => {
            if ra.borrow().is_scalar() {
                ops::elementwise(BinOp::Div, &la.borrow(), &ra.borrow())?
            } else {
                linalg::rdivide(&la.borrow(), &ra.borrow())?
            }
        }
        _ => ops::elementwise(tag_to_binop(op), &la.borrow(), &ra.borrow())?,
    };
    Ok(Value::Array(result))
}

fn tag_to_binop(op: BinOpTag) -> BinOp {
    match op {
        BinOpTag::Add => BinOp::Add,
        BinOpTag::Sub => BinOp::Sub,
        BinOpTag::Mul => BinOp::Mul,
        BinOpTag::Div => BinOp::Div,
        BinOpTag::Pow => BinOp::Pow,
        BinOpTag::Mod => BinOp::Mod,
        BinOpTag::Eq => BinOp::Eq,
        BinOpTag::Ne => BinOp::Ne,
        BinOpTag::Lt => BinOp::Lt,
        BinOpTag::Le => BinOp::Le,
        BinOpTag::Gt => BinOp::Gt,
        BinOpTag::Ge => BinOp::Ge,
        BinOpTag::And => BinOp::And,
        BinOpTag::Or => BinOp::Or,
        BinOpTag::MatMul | BinOpTag::LeftDivide | BinOpTag::RightDivide => unreachable!("handled separately"),
        BinOpTag::ShortAnd | BinOpTag::ShortOr => unreachable!("handled separately"),
    }
}

fn eval_unop(interp: &mut Interpreter, env: &Environment, op: UnOpTag, operand: &Expr) -> EvalResult<Value> {
    let v = eval_expr(interp, env, operand)?;
    let arr = to_array(&v)?;
    match op {
        UnOpTag::Neg => {
            let zero = ArrayBody::scalar_int(0);
            let result = ops::elementwise(BinOp::Sub, &zero.borrow(), &arr.borrow())?;
            Ok(Value::Array(result))
        }
        UnOpTag::Not => {
            let body = arr.borrow();
            let mut out = ArrayData::zero_of_kind(ElementKind::Bool, body.numel());
            for i in 0..body.numel() {
                out.set_scalar(i, ops::Scalar::Bool(!body.data.get_scalar(i).is_nonzero()));
            }
            Ok(Value::Array(ArrayBody::new(body.dims.clone(), out)))
        }
        UnOpTag::Transpose => Ok(Value::Array(linalg::transpose(&arr.borrow())?)),
    }
}

/// A `Range` used as an ordinary r-value (function argument, arithmetic
/// operand) materializes to a row vector; everything else passes through
/// unchanged. Index arguments bypass this entirely (§4.2.4).
fn materialize(v: Value) -> Value {
    match v {
        Value::Range(r) => Value::Array(r.expand()),
        other => other,
    }
}

fn to_array(v: &Value) -> EvalResult<crate::value::array::ArrayRef> {
    match v {
        Value::Array(a) => Ok(a.clone()),
        Value::Range(r) => Ok(r.expand()),
        _ => err(ErrorKind::ShapeMismatch, "expected a numeric value"),
    }
}

fn eval_matrix_literal(interp: &mut Interpreter, env: &Environment, rows: &[Vec<Expr>]) -> EvalResult<Value> {
    let mut row_arrays = Vec::new();
    for row in rows {
        let mut acc: Option<crate::value::array::ArrayRef> = None;
        for e in row {
            let v = eval_expr(interp, env, e)?;
            let arr = to_array(&v)?;
            acc = Some(match acc {
                None => arr,
                Some(a) => ops::concat(&a.borrow(), &arr.borrow(), 1)?,
            });
        }
        if let Some(a) = acc {
            row_arrays.push(a);
        }
    }
    let mut acc: Option<crate::value::array::ArrayRef> = None;
    for r in row_arrays {
        acc = Some(match acc {
            None => r,
            Some(a) => ops::concat(&a.borrow(), &r.borrow(), 0)?,
        });
    }
    Ok(Value::Array(acc.unwrap_or_else(|| ArrayBody::empty_of_kind(ElementKind::Float))))
}

fn eval_cell_literal(interp: &mut Interpreter, env: &Environment, rows: &[Vec<Expr>]) -> EvalResult<Value> {
    if rows.is_empty() {
        return Ok(Value::empty_cell());
    }
    let nrows = rows.len();
    let ncols = rows[0].len();
    let mut data = vec![Value::empty_cell(); nrows * ncols];
    for (r, row) in rows.iter().enumerate() {
        for (c, e) in row.iter().enumerate() {
            let v = eval_expr(interp, env, e)?;
            data[r + c * nrows] = v;
        }
    }
    Ok(Value::Array(ArrayBody::new(vec![nrows, ncols], ArrayData::Cell(data))))
}

fn eval_cell_index(interp: &mut Interpreter, env: &Environment, object: &Expr, args: &[Expr]) -> EvalResult<Value> {
    let v = eval_expr(interp, env, object)?;
    let arr = to_array(&v)?;
    let components = resolve_index_args(interp, env, args)?;
    let sliced = crate::value::array::slice::read_slice(&arr.borrow(), &components)?;
    let body = sliced.borrow();
    if let ArrayData::Cell(items) = &body.data {
        if items.len() == 1 {
            return Ok(items[0].clone());
        }
        return Ok(Value::Tuple(items.clone()));
    }
    err(ErrorKind::NotIndexable, "`{}` indexing requires a cell array")
}

// ── index-argument evaluation (§4.2.4) ──

fn resolve_index_args(interp: &mut Interpreter, env: &Environment, args: &[Expr]) -> EvalResult<Vec<IndexComponent>> {
    args.iter().map(|a| eval_index_arg(interp, env, a)).collect()
}

fn eval_index_arg(interp: &mut Interpreter, env: &Environment, expr: &Expr) -> EvalResult<IndexComponent> {
    match expr {
        Expr::FullRange => Ok(IndexComponent::Range { start: 0.0, step: 0.0, end: 0.0, is_full: true }),
        _ => {
            let v = eval_expr(interp, env, expr)?;
            match v {
                Value::Range(r) if r.is_full => Ok(IndexComponent::Range { start: 0.0, step: 0.0, end: 0.0, is_full: true }),
                Value::Range(r) => Ok(IndexComponent::Range { start: r.start, step: r.step, end: r.end, is_full: false }),
                Value::Array(arr) => array_to_index_component(&arr),
                _ => err(ErrorKind::InvalidIndex, "value cannot be used as an index"),
            }
        }
    }
}

fn array_to_index_component(arr: &crate::value::array::ArrayRef) -> EvalResult<IndexComponent> {
    let body = arr.borrow();
    if body.kind() == ElementKind::Bool {
        if let ArrayData::Bool(v) = &body.data {
            return Ok(IndexComponent::Mask(v.clone()));
        }
    }
    if body.is_scalar() {
        return Ok(IndexComponent::Scalar(body.data.get_scalar(0).as_f64() as i64));
    }
    let values: Vec<i64> = (0..body.numel()).map(|i| body.data.get_scalar(i).as_f64() as i64).collect();
    Ok(IndexComponent::Numeric(values))
}

// ── symbol resolution & deferred loading (§4.2.8) ──

fn resolve_symbol(interp: &mut Interpreter, env: &Environment, name: &str) -> EvalResult<Value> {
    if let Some(v) = env.get(name) {
        return Ok(v);
    }
    if interp.registry.contains(name) {
        return Ok(Value::FunctionHandle(name.to_string()));
    }
    interp.note(&format!("`{name}` not found in any live scope; falling back to deferred module load"));
    if let Some(defs) = interp.try_load_module(name) {
        for def in &defs {
            let func = definition_to_function(def);
            interp.root_env.define(def.name(), Value::Function(Rc::new(func)));
        }
        if let Some(v) = env.get(name) {
            return Ok(v);
        }
    }
    err(ErrorKind::UnknownSymbol, format!("unknown symbol `{name}`"))
}

/// Converts a parser-delivered `Definition` into a callable `FunctionValue`,
/// applying loop lowering (§4.3) to its body (and every nested function's
/// body) so the evaluator never sees a raw `For`/`While` statement
/// regardless of whether the definition arrived via [`crate::load_definition`]
/// or a deferred module load (§6.2).
pub(crate) fn definition_to_function(def: &crate::ir::Definition) -> FunctionValue {
    match def {
        crate::ir::Definition::Script { name, body } => FunctionValue {
            name: name.clone(),
            in_params: vec![],
            out_params: vec![],
            nested: vec![],
            body: crate::lowering::lower_body(body.clone()),
            is_script: true,
            is_closure: false,
            captured_env: std::cell::RefCell::new(None),
        },
        crate::ir::Definition::Function { name, in_params, out_params, nested, body, is_script, is_closure } => {
            // A nested function always captures its parent's call environment
            // (it has a non-null parent, per §4.2.5), so it is built as a
            // closure regardless of what the parser marked it — its
            // `captured_env` is overwritten on every invocation of the
            // enclosing function (see `call_user_function`).
            let nested = nested
                .iter()
                .map(|d| {
                    let mut f = definition_to_function(d);
                    f.is_closure = true;
                    Rc::new(f)
                })
                .collect();
            FunctionValue {
                name: name.clone(),
                in_params: in_params.clone(),
                out_params: out_params.clone(),
                nested,
                body: crate::lowering::lower_body(body.clone()),
                is_script: *is_script,
                is_closure: *is_closure,
                captured_env: std::cell::RefCell::new(None),
            }
        }
    }
}

// ── function call protocol (§4.2.5) ──

fn call_value(interp: &mut Interpreter, env: &Environment, callee: &Value, args: Vec<Value>, nargout: usize, name: &str) -> EvalResult<Value> {
    match callee {
        Value::FunctionHandle(lib_name) => call_library(interp, lib_name, args, nargout),
        Value::Function(f) => call_user_function(interp, env, f, args, nargout),
        _ => err(ErrorKind::NotCallable, format!("`{name}` is not callable")),
    }
}

fn call_library(interp: &mut Interpreter, name: &str, args: Vec<Value>, nargout: usize) -> EvalResult<Value> {
    let func = interp
        .registry
        .get(name)
        .cloned()
        .ok_or_else(|| Signal::Error(Traced::new(ErrorKind::UnknownSymbol, format!("unknown library function `{name}`"))))?;
    let outputs = (func.handler)(interp, &args, nargout).map_err(|e| Signal::Error(e.wrap_call(name)))?;
    Ok(Value::Tuple(outputs))
}

fn call_user_function(interp: &mut Interpreter, caller_env: &Environment, func: &Rc<FunctionValue>, args: Vec<Value>, nargout: usize) -> EvalResult<Value> {
    if args.len() > func.in_params.len() {
        return err(ErrorKind::TooManyInputs, format!("`{}` takes at most {} inputs", func.name, func.in_params.len()));
    }
    if nargout > func.out_params.len().max(1) {
        return err(ErrorKind::TooManyOutputs, format!("`{}` returns at most {} outputs", func.name, func.out_params.len()));
    }

    interp.enter_call().map_err(Signal::Error)?;
    let result = (|| {
        // §4.2.5 step 1: script shares its stored local environment;
        // closures overwrite their captured environment with the caller's
        // current environment (closure dispatch); ordinary functions
        // extend their stored (usually root) environment with a fresh child.
        let call_env = if func.is_script {
            func.captured_env.borrow().clone().unwrap_or_else(|| interp.root_env.extend())
        } else if func.is_closure {
            func.captured_env.replace(Some(caller_env.copy()));
            func.captured_env.borrow().clone().unwrap().extend()
        } else {
            interp.root_env.extend()
        };

        for (param, arg) in func.in_params.iter().zip(args.iter()) {
            call_env.define(param, arg.clone());
        }
        call_env.define("nargin", Value::scalar_int(args.len() as i64));
        call_env.define("nargout", Value::scalar_int(nargout as i64));

        // §4.2.5: a nested function's stored local environment is
        // overwritten with this call's environment on every invocation of
        // its parent, so it always sees the parent's latest locals.
        for nested in &func.nested {
            nested.captured_env.replace(Some(call_env.clone()));
            call_env.define(nested.name.clone(), Value::Function(nested.clone()));
        }

        match exec_body(interp, &call_env, &func.body) {
            Ok(()) => {}
            Err(Signal::Flow(Flow::Return)) => {}
            Err(Signal::Flow(flow)) => {
                return err(ErrorKind::HostError, format!("{flow:?} escaped the body of `{}`", func.name));
            }
            Err(other) => return Err(other),
        }

        let effective = nargout.max(1).min(func.out_params.len().max(nargout.max(1)));
        let mut outputs = Vec::new();
        for (i, out_name) in func.out_params.iter().enumerate() {
            if i >= effective {
                break;
            }
            match call_env.get(out_name) {
                Some(v) => outputs.push(v),
                None if nargout > 0 => {
                    return err(ErrorKind::UnassignedReturn, format!("output `{out_name}` of `{}` was never assigned", func.name));
                }
                None => break,
            }
        }
        Ok(Value::Tuple(outputs))
    })();
    interp.leave_call();
    result.map_err(|e| match e {
        Signal::Error(t) => Signal::Error(t.wrap_call(&func.name)),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{BufferHost, NullResolver};
    use crate::ir::{BinOpTag as B, Expr as E, LValue as L, Stmt as S, StmtKind as SK};

    fn fresh() -> (Interpreter, Environment) {
        let interp = Interpreter::new(Box::new(BufferHost::default()), NullResolver);
        let env = interp.root_env.clone();
        (interp, env)
    }

    // ── scenario 1: auto-expand on write ──
    #[test]
    fn scenario_auto_expand_on_write() {
        let (mut interp, env) = fresh();
        let stmts = vec![
            S::new(SK::Assign { lvalues: vec![L::Symbol("a".into())], rvalue: E::Matrix(vec![]) }),
            S::new(SK::Assign {
                lvalues: vec![L::Index { name: "a".into(), args: vec![E::IntConst(3)] }],
                rvalue: E::IntConst(7),
            }),
        ];
        exec_body(&mut interp, &env, &stmts).unwrap();
        let a = env.get("a").unwrap();
        assert_eq!(a.display_text(), "[0 0 7]");
    }

    // ── scenario 3: broadcast comparison ──
    #[test]
    fn scenario_broadcast_comparison() {
        let (mut interp, env) = fresh();
        let expr = E::BinaryOp {
            op: B::Lt,
            lhs: Box::new(E::Matrix(vec![vec![E::IntConst(1), E::IntConst(2), E::IntConst(3)]])),
            rhs: Box::new(E::IntConst(2)),
        };
        let result = eval_expr(&mut interp, &env, &expr).unwrap();
        assert_eq!(result.display_text(), "[true false false]");
    }

    // ── scenario 4: cell-index auto-wrap ──
    #[test]
    fn scenario_cell_auto_wrap() {
        let (mut interp, env) = fresh();
        let stmts = vec![
            S::new(SK::Assign { lvalues: vec![L::Symbol("c".into())], rvalue: E::CellArray(vec![]) }),
            S::new(SK::Assign {
                lvalues: vec![L::CellIndex { name: "c".into(), args: vec![E::IntConst(2)] }],
                rvalue: E::StringConst("hi".into()),
            }),
        ];
        exec_body(&mut interp, &env, &stmts).unwrap();
        let c = env.get("c").unwrap();
        let arr = c.as_array().unwrap();
        assert_eq!(arr.borrow().dims, vec![1, 2]);
    }

    // ── scenario 5: multi-value return ──
    #[test]
    fn scenario_multi_value_return() {
        let (mut interp, env) = fresh();
        let f = FunctionValue {
            name: "f".into(),
            in_params: vec![],
            out_params: vec!["a".into(), "b".into()],
            nested: vec![],
            body: vec![
                S::new(SK::Assign { lvalues: vec![L::Symbol("a".into())], rvalue: E::IntConst(1) }),
                S::new(SK::Assign { lvalues: vec![L::Symbol("b".into())], rvalue: E::IntConst(2) }),
            ],
            is_script: false,
            is_closure: false,
            captured_env: std::cell::RefCell::new(None),
        };
        env.define("f", Value::Function(Rc::new(f)));

        let x_stmt = S::new(SK::Assign {
            lvalues: vec![L::Symbol("x".into())],
            rvalue: E::Param { callee: Box::new(E::Symbol("f".into())), args: vec![] },
        });
        exec_stmt(&mut interp, &env, &x_stmt).unwrap();
        assert_eq!(env.get("x").unwrap().display_text(), "[1]");

        let pq_stmt = S::new(SK::Assign {
            lvalues: vec![L::Symbol("p".into()), L::Symbol("q".into())],
            rvalue: E::Param { callee: Box::new(E::Symbol("f".into())), args: vec![] },
        });
        exec_stmt(&mut interp, &env, &pq_stmt).unwrap();
        assert_eq!(env.get("p").unwrap().display_text(), "[1]");
        assert_eq!(env.get("q").unwrap().display_text(), "[2]");
    }

    // ── bare statement calls use nargout=0 (§4.2.5 step 5) ──
    #[test]
    fn unassigned_output_is_not_an_error_at_statement_position() {
        let (mut interp, env) = fresh();
        let maybe_set = FunctionValue {
            name: "maybe_set".into(),
            in_params: vec!["x".into()],
            out_params: vec!["y".into()],
            nested: vec![],
            body: vec![S::new(SK::IfElse {
                branches: vec![(
                    E::BinaryOp { op: B::Gt, lhs: Box::new(E::Symbol("x".into())), rhs: Box::new(E::IntConst(0)) },
                    vec![S::new(SK::Assign { lvalues: vec![L::Symbol("y".into())], rvalue: E::Symbol("x".into()) })],
                )],
                else_body: vec![],
            })],
            is_script: false,
            is_closure: false,
            captured_env: std::cell::RefCell::new(None),
        };
        env.define("maybe_set", Value::Function(Rc::new(maybe_set)));

        let call = S::with_suppress(
            SK::Expr(E::Param { callee: Box::new(E::Symbol("maybe_set".into())), args: vec![E::IntConst(-1)] }),
            true,
        );
        exec_stmt(&mut interp, &env, &call).unwrap();
    }

    // ── value semantics / copy-on-write ──
    #[test]
    fn assignment_copies_not_aliases() {
        let (mut interp, env) = fresh();
        let stmts = vec![
            S::new(SK::Assign {
                lvalues: vec![L::Symbol("a".into())],
                rvalue: E::Matrix(vec![vec![E::IntConst(1), E::IntConst(2)]]),
            }),
            S::new(SK::Assign { lvalues: vec![L::Symbol("b".into())], rvalue: E::Symbol("a".into()) }),
            S::new(SK::Assign {
                lvalues: vec![L::Index { name: "a".into(), args: vec![E::IntConst(1)] }],
                rvalue: E::IntConst(99),
            }),
        ];
        exec_body(&mut interp, &env, &stmts).unwrap();
        assert_eq!(env.get("b").unwrap().display_text(), "[1 2]");
        assert_eq!(env.get("a").unwrap().display_text(), "[99 2]");
    }

    // ── control flow: break ──
    #[test]
    fn break_stops_loop_dispatch() {
        let (mut interp, env) = fresh();
        let loop_stmt = S::new(SK::Loop {
            init: vec![S::new(SK::Assign { lvalues: vec![L::Symbol("i".into())], rvalue: E::IntConst(0) })],
            test: vec![S::new(SK::Assign { lvalues: vec![L::Symbol("t".into())], rvalue: E::IntConst(1) })],
            test_var: "t".into(),
            body: vec![S::new(SK::Break)],
            incr: vec![],
        });
        exec_stmt(&mut interp, &env, &loop_stmt).unwrap();
    }

    // ── unknown symbol ──
    #[test]
    fn unknown_symbol_errors() {
        let (mut interp, env) = fresh();
        let result = eval_expr(&mut interp, &env, &E::Symbol("nope".into()));
        assert!(matches!(result, Err(Signal::Error(_))));
    }
}
