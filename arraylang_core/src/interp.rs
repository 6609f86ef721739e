//! The `Interpreter` context object (A2, §5, §9 design note).
//!
//! Global mutable state — the root environment, the library-function
//! registry, the open-"file" table, and the call-depth fuse — lives here
//! instead of as free-floating statics, per the design note: "global
//! mutable state moves into an explicit `Interpreter` context value
//! threaded through the evaluator."

use std::collections::HashMap;

use crate::config::{InterpreterConfig, TypeCheckCounter};
use crate::env::Environment;
use crate::error::{ErrorKind, Result, Traced};
use crate::host::{Host, ModuleResolver};
use crate::registry::{self, Registry};
use crate::value::ElementKind;

/// A handle returned by the (stubbed) open-file table. Real filesystem
/// access is an external collaborator per the Non-goals; the core only
/// owns the handle lifecycle (`§5`: "file handles opened by `fopen` are
/// released by matching `fclose`, or at process shutdown").
pub type FileHandle = u32;

#[derive(Debug, Default)]
struct OpenFileTable {
    next_handle: FileHandle,
    open: HashMap<FileHandle, String>,
}

impl OpenFileTable {
    fn open(&mut self, descriptor: String) -> FileHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.open.insert(handle, descriptor);
        handle
    }

    fn close(&mut self, handle: FileHandle) -> bool {
        self.open.remove(&handle).is_some()
    }
}

pub struct Interpreter {
    pub root_env: Environment,
    pub registry: Registry,
    pub config: InterpreterConfig,
    pub host: Box<dyn Host>,
    resolver: Box<dyn ModuleResolver>,
    open_files: OpenFileTable,
    call_depth: usize,
    type_checks: TypeCheckCounter,
}

impl Interpreter {
    pub fn new(host: Box<dyn Host>, resolver: impl ModuleResolver + 'static) -> Self {
        let mut registry = Registry::new();
        registry::install_prelude(&mut registry);
        Interpreter {
            root_env: Environment::root(),
            registry,
            config: InterpreterConfig::default(),
            host,
            resolver: Box::new(resolver),
            open_files: OpenFileTable::default(),
            call_depth: 0,
            type_checks: TypeCheckCounter::default(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    /// §6.2 deferred load: consults the module resolver and binds any
    /// returned definitions into the root environment.
    pub fn try_load_module(&mut self, symbol_name: &str) -> Option<Vec<crate::ir::Definition>> {
        if self.config.verbose {
            self.host.println(&format!("note: deferring to module resolver for `{symbol_name}`"));
        }
        let result = self.resolver.resolve(symbol_name);
        if self.config.verbose {
            match &result {
                Some(defs) => self.host.println(&format!("note: module load for `{symbol_name}` bound {} definition(s)", defs.len())),
                None => self.host.println(&format!("note: module load for `{symbol_name}` found nothing")),
            }
        }
        result
    }

    /// Emits a diagnostic note via the `Host` when `verbose` is set.
    /// Used at symbol-resolution sites so `§6.5`'s `verbose` knob is
    /// actually observable rather than a documented no-op.
    pub fn note(&mut self, message: &str) {
        if self.config.verbose {
            self.host.println(&format!("note: {message}"));
        }
    }

    /// §6.5: cross-checks (or tallies, under `profile_type_infer`) a
    /// mutating operation's source element kind against the array it's
    /// writing into, subject to the per-run hit limit. A no-op unless
    /// `validate_types` or `profile_type_infer` is set; with no
    /// type-inference oracle wired into this crate, "cross-check" means
    /// comparing against the target array's own runtime kind rather than
    /// an external prediction.
    pub fn note_type_check(&mut self, site: &str, expected: ElementKind, actual: ElementKind) {
        if !self.config.validate_types && !self.config.profile_type_infer {
            return;
        }
        if !self.type_checks.tick() {
            return;
        }
        if self.config.validate_types && expected != actual {
            self.host.println(&format!("note: `{site}` writes {actual:?} elements into a {expected:?} array"));
        }
    }

    pub fn open_file(&mut self, descriptor: impl Into<String>) -> FileHandle {
        self.open_files.open(descriptor.into())
    }

    pub fn close_file(&mut self, handle: FileHandle) -> bool {
        self.open_files.close(handle)
    }

    /// Enters a user-function call, bumping the depth fuse. Pair with
    /// `leave_call` on every return path (the evaluator uses a guard).
    pub fn enter_call(&mut self) -> Result<()> {
        if self.call_depth >= self.config.max_call_depth {
            return Err(Traced::new(ErrorKind::HostError, "maximum call depth exceeded"));
        }
        self.call_depth += 1;
        Ok(())
    }

    pub fn leave_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    pub fn call_depth(&self) -> usize {
        self.call_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;
    use crate::host::NullResolver;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Captures everything printed, so tests can assert on diagnostic notes
    /// without reaching into a `Box<dyn Host>`.
    #[derive(Clone, Default)]
    struct SpyHost(Rc<RefCell<Vec<String>>>);

    impl Host for SpyHost {
        fn print(&mut self, text: &str) {
            self.0.borrow_mut().push(text.to_string());
        }
        fn println(&mut self, text: &str) {
            self.0.borrow_mut().push(text.to_string());
        }
    }

    #[test]
    fn new_interpreter_has_prelude_installed() {
        let interp = Interpreter::new(Box::new(NullHost), NullResolver);
        assert!(interp.registry.contains("zeros"));
    }

    #[test]
    fn file_table_round_trips() {
        let mut interp = Interpreter::new(Box::new(NullHost), NullResolver);
        let h = interp.open_file("scratch.txt");
        assert!(interp.close_file(h));
        assert!(!interp.close_file(h));
    }

    #[test]
    fn call_depth_fuse_trips() {
        let mut interp = Interpreter::new(Box::new(NullHost), NullResolver);
        interp.config.max_call_depth = 1;
        assert!(interp.enter_call().is_ok());
        assert!(interp.enter_call().is_err());
    }

    #[test]
    fn verbose_is_silent_by_default() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut interp = Interpreter::new(Box::new(SpyHost(log.clone())), NullResolver);
        interp.note("should not print");
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn verbose_emits_a_note() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut interp = Interpreter::new(Box::new(SpyHost(log.clone())), NullResolver);
        interp.config.verbose = true;
        interp.note("hello");
        assert_eq!(*log.borrow(), vec!["note: hello".to_string()]);
    }

    #[test]
    fn type_check_reports_a_kind_mismatch_only_under_validate_types() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut interp = Interpreter::new(Box::new(SpyHost(log.clone())), NullResolver);

        // Neither flag set: the counter isn't even ticked.
        interp.note_type_check("a", ElementKind::Int, ElementKind::Float);
        assert!(log.borrow().is_empty());

        interp.config.validate_types = true;
        interp.note_type_check("a", ElementKind::Int, ElementKind::Float);
        assert_eq!(log.borrow().len(), 1);
        assert!(log.borrow()[0].contains("Float"));
        assert!(log.borrow()[0].contains("Int"));

        // A matching kind never reports, even though the tick still counts.
        interp.note_type_check("a", ElementKind::Int, ElementKind::Int);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn type_check_counter_stops_after_the_limit() {
        let mut interp = Interpreter::new(Box::new(NullHost), NullResolver);
        interp.config.profile_type_infer = true;
        for _ in 0..128 {
            interp.note_type_check("a", ElementKind::Int, ElementKind::Int);
        }
        let hits_before = interp.type_checks.hits();
        interp.note_type_check("a", ElementKind::Int, ElementKind::Int);
        assert_eq!(interp.type_checks.hits(), hits_before);
    }
}
