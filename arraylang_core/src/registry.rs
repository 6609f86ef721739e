//! Library-function registry (C8, §4.4).
//!
//! A closed `(name, handler, type-hint)` table, grounded in the shape of
//! the teacher's `compile/tfuncs::registry` (name → handler map populated
//! once at startup) rather than the teacher's `builtins.rs` `BuiltinId`
//! enum, since this spec wants an open extension point, not a fixed enum.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{ErrorKind, Result, Traced};
use crate::value::array::ops::{default_reduction_dim, reduce, ReduceOp};
use crate::value::array::{canonical_dims, ArrayBody, ArrayData};
use crate::value::Value;
use crate::Interpreter;

/// A coarse hint for what shape of result a built-in tends to produce;
/// purely advisory (e.g. for a `verbose` diagnostic), never load-bearing
/// for correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeHint {
    PreservesInputKind,
    AlwaysBool,
    AlwaysFloat,
    Unconstrained,
}

pub type LibraryHandler = Rc<dyn Fn(&mut Interpreter, &[Value], usize) -> Result<Vec<Value>>>;

#[derive(Clone)]
pub struct LibraryFunction {
    pub name: String,
    pub handler: LibraryHandler,
    pub type_hint: TypeHint,
}

impl std::fmt::Debug for LibraryFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryFunction")
            .field("name", &self.name)
            .field("type_hint", &self.type_hint)
            .finish()
    }
}

/// The closed registry. Populated once via `register`, then only read.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    functions: HashMap<String, LibraryFunction>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn register(&mut self, name: &str, type_hint: TypeHint, handler: LibraryHandler) {
        self.functions.insert(name.to_string(), LibraryFunction { name: name.to_string(), handler, type_hint });
    }

    pub fn get(&self, name: &str) -> Option<&LibraryFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }
}

fn require_array(args: &[Value], i: usize, fname: &str) -> Result<std::rc::Rc<std::cell::RefCell<ArrayBody>>> {
    args.get(i)
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| Traced::new(ErrorKind::NotIndexable, format!("{fname}: expected an array argument")))
}

/// Registers the minimal always-on built-in set (§4.4 supplement): enough
/// to exercise the evaluator end-to-end without an external stdlib.
pub fn install_prelude(registry: &mut Registry) {
    registry.register(
        "size",
        TypeHint::AlwaysFloat,
        Rc::new(|_interp, args, _nargout| {
            let a = require_array(args, 0, "size")?;
            let dims: Vec<i64> = a.borrow().dims.iter().map(|&d| d as i64).collect();
            let n = dims.len();
            Ok(vec![Value::Array(ArrayBody::new(vec![1, n], ArrayData::Int(dims)))])
        }),
    );

    registry.register(
        "numel",
        TypeHint::AlwaysFloat,
        Rc::new(|_interp, args, _nargout| {
            let a = require_array(args, 0, "numel")?;
            let n = a.borrow().numel();
            Ok(vec![Value::scalar_int(n as i64)])
        }),
    );

    registry.register(
        "length",
        TypeHint::AlwaysFloat,
        Rc::new(|_interp, args, _nargout| {
            let a = require_array(args, 0, "length")?;
            let longest = a.borrow().dims.iter().copied().max().unwrap_or(0);
            Ok(vec![Value::scalar_int(longest as i64)])
        }),
    );

    registry.register(
        "zeros",
        TypeHint::AlwaysFloat,
        Rc::new(|_interp, args, _nargout| Ok(vec![Value::Array(make_filled(args, 0.0)?)])),
    );

    registry.register(
        "ones",
        TypeHint::AlwaysFloat,
        Rc::new(|_interp, args, _nargout| Ok(vec![Value::Array(make_filled(args, 1.0)?)])),
    );

    registry.register(
        "reshape",
        TypeHint::PreservesInputKind,
        Rc::new(|_interp, args, _nargout| {
            let a = require_array(args, 0, "reshape")?;
            let mut new_dims = Vec::new();
            for v in &args[1..] {
                let arr = v.as_array().ok_or_else(|| Traced::new(ErrorKind::ShapeMismatch, "reshape: dimension arguments must be numeric"))?;
                new_dims.push(arr.borrow().data.get_scalar(0).as_f64() as usize);
            }
            let body = a.borrow();
            let target = canonical_dims(new_dims);
            if target.iter().product::<usize>() != body.numel() {
                return Err(Traced::new(ErrorKind::ShapeMismatch, "reshape: element count must be preserved"));
            }
            Ok(vec![Value::Array(ArrayBody::new(target, body.data.clone()))])
        }),
    );

    registry.register(
        "sum",
        TypeHint::PreservesInputKind,
        Rc::new(|_interp, args, _nargout| reduce_builtin(args, ReduceOp::Sum)),
    );
    registry.register(
        "any",
        TypeHint::AlwaysBool,
        Rc::new(|_interp, args, _nargout| reduce_builtin(args, ReduceOp::Any)),
    );
    registry.register(
        "all",
        TypeHint::AlwaysBool,
        Rc::new(|_interp, args, _nargout| reduce_builtin(args, ReduceOp::All)),
    );
    registry.register(
        "max",
        TypeHint::PreservesInputKind,
        Rc::new(|_interp, args, _nargout| reduce_builtin(args, ReduceOp::Max)),
    );
    registry.register(
        "min",
        TypeHint::PreservesInputKind,
        Rc::new(|_interp, args, _nargout| reduce_builtin(args, ReduceOp::Min)),
    );

    registry.register(
        "disp",
        TypeHint::Unconstrained,
        Rc::new(|interp, args, _nargout| {
            if let Some(v) = args.first() {
                interp.host.println(&v.display_text());
            }
            Ok(vec![])
        }),
    );
    registry.register(
        "print",
        TypeHint::Unconstrained,
        Rc::new(|interp, args, _nargout| {
            if let Some(v) = args.first() {
                interp.host.print(&v.display_text());
            }
            Ok(vec![])
        }),
    );
}

fn make_filled(args: &[Value], fill: f64) -> Result<std::rc::Rc<std::cell::RefCell<ArrayBody>>> {
    let mut dims = Vec::new();
    for v in args {
        let arr = v.as_array().ok_or_else(|| Traced::new(ErrorKind::ShapeMismatch, "expected numeric dimension arguments"))?;
        dims.push(arr.borrow().data.get_scalar(0).as_f64() as usize);
    }
    if dims.is_empty() {
        dims = vec![1, 1];
    } else if dims.len() == 1 {
        dims.push(dims[0]);
    }
    let dims = canonical_dims(dims);
    let n: usize = dims.iter().product();
    Ok(ArrayBody::new(dims, ArrayData::Float(vec![fill; n])))
}

fn reduce_builtin(args: &[Value], op: ReduceOp) -> Result<Vec<Value>> {
    let a = require_array(args, 0, "reduce")?;
    let body = a.borrow();
    let dim = if args.len() > 1 {
        args[1].as_array().map(|d| d.borrow().data.get_scalar(0).as_f64() as usize - 1).unwrap_or(0)
    } else {
        default_reduction_dim(&body.dims)
    };
    let result = reduce(op, &body, dim)?;
    Ok(vec![Value::Array(result)])
}
