//! Interpreter configuration knobs (§6.5).

/// Knobs that change evaluator behavior without changing the IR contract.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Cross-check a type-inference oracle's predictions against runtime
    /// types at each statement, limited to 128 hits per statement. The
    /// oracle itself is an external collaborator (JIT/type-infer is out of
    /// scope); when no oracle is wired in, this is a no-op regardless of
    /// the flag.
    pub validate_types: bool,
    /// Tally per-statement type-set statistics instead of validating.
    pub profile_type_infer: bool,
    /// Emit diagnostic notes on symbol resolution and module loading via
    /// the `Host`.
    pub verbose: bool,
    /// When true and the called function is not a script or closure, the
    /// core SHOULD delegate to an external JIT collaborator; this crate
    /// has no JIT, so the flag is observable but always falls back to
    /// plain evaluation.
    pub jit_enable: bool,
    /// Guards native-stack recursion depth. A tree-walker has no explicit
    /// frame stack to bound, unlike a bytecode VM, so user function calls
    /// are counted and this is the fuse against a runaway recursive
    /// script blowing the host's stack.
    pub max_call_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            validate_types: false,
            profile_type_infer: false,
            verbose: false,
            jit_enable: false,
            max_call_depth: 2048,
        }
    }
}

/// Per-statement counters gated by `validate_types`/`profile_type_infer`,
/// resolving the open question in the design notes with a single uniform
/// counter rather than the original's two diverging passes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeCheckCounter {
    hits: u32,
}

impl TypeCheckCounter {
    const LIMIT: u32 = 128;

    /// Returns `true` if this statement should still be checked/profiled;
    /// increments the counter as a side effect.
    pub fn tick(&mut self) -> bool {
        if self.hits >= Self::LIMIT {
            return false;
        }
        self.hits += 1;
        true
    }

    /// Hits recorded so far, for tests asserting the limit actually trips.
    pub fn hits(&self) -> u32 {
        self.hits
    }
}
