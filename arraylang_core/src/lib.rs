//! Core runtime engine for a tree-walking interpreter of a MATLAB-family,
//! array-oriented language.
//!
//! This crate owns the data model (arrays, ranges, values), the evaluator,
//! lexical environments, loop lowering, and the library-function extension
//! point. It does not parse source text, print prompts, or ship a standard
//! library beyond a minimal always-on prelude — those are external
//! collaborators wired in through [`host`] and [`registry`].

#![deny(clippy::print_stderr)]

pub mod config;
pub mod env;
pub mod error;
pub mod eval;
pub mod host;
pub mod interp;
pub mod ir;
pub mod lowering;
pub mod registry;
pub mod value;

pub use config::InterpreterConfig;
pub use env::Environment;
pub use error::{ErrorKind, Traced};
pub use eval::{exec_body, Flow, Signal};
pub use host::{BufferHost, Host, ModuleResolver, NullHost, NullResolver, StdoutHost};
pub use interp::Interpreter;
pub use ir::Definition;
pub use value::Value;

/// Loads one function-or-script `Definition` into `interp`'s root
/// environment, applying loop lowering (§4.3) to its body and every nested
/// function's body. This is the entry point a host uses once the external
/// parser hands it a top-level definition (§6.1) — deferred loads
/// triggered by symbol resolution go through `Interpreter::try_load_module`
/// instead, which applies the same conversion internally.
pub fn load_definition(interp: &Interpreter, def: &Definition) {
    use std::rc::Rc;

    let name = def.name().to_string();
    let func = eval::definition_to_function(def);
    interp.root_env.define(name, Value::Function(Rc::new(func)));
}

/// Runs a script's statements directly against `interp`'s root
/// environment (the common case for a top-level program body), applying
/// loop lowering once up front.
pub fn run_script(interp: &mut Interpreter, body: Vec<ir::Stmt>) -> eval::EvalResult<()> {
    let lowered = lowering::lower_body(body);
    let env = interp.root_env.clone();
    eval::exec_body(interp, &env, &lowered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use host::{BufferHost, NullResolver};
    use ir::{BinOpTag, Expr, LValue, Stmt, StmtKind};

    // A nested function sees its parent's locals through the captured
    // environment that's rebound on every call to the parent (§4.2.5).
    #[test]
    fn nested_function_reads_parent_local() {
        let mut interp = Interpreter::new(Box::new(BufferHost::default()), NullResolver);

        let helper = Definition::Function {
            name: "helper".into(),
            in_params: vec![],
            out_params: vec!["z".into()],
            nested: vec![],
            body: vec![Stmt::new(StmtKind::Assign {
                lvalues: vec![LValue::Symbol("z".into())],
                rvalue: Expr::BinaryOp {
                    op: BinOpTag::Add,
                    lhs: Box::new(Expr::Symbol("x".into())),
                    rhs: Box::new(Expr::IntConst(1)),
                },
            })],
            is_script: false,
            is_closure: false,
        };
        let outer = Definition::Function {
            name: "outer".into(),
            in_params: vec!["x".into()],
            out_params: vec!["y".into()],
            nested: vec![helper],
            body: vec![Stmt::new(StmtKind::Assign {
                lvalues: vec![LValue::Symbol("y".into())],
                rvalue: Expr::Param { callee: Box::new(Expr::Symbol("helper".into())), args: vec![] },
            })],
            is_script: false,
            is_closure: false,
        };
        load_definition(&interp, &outer);

        let call = vec![Stmt::new(StmtKind::Assign {
            lvalues: vec![LValue::Symbol("result".into())],
            rvalue: Expr::Param { callee: Box::new(Expr::Symbol("outer".into())), args: vec![Expr::IntConst(41)] },
        })];
        run_script(&mut interp, call).unwrap();
        assert_eq!(interp.root_env.get("result").unwrap().display_text(), "[42]");
    }
}
