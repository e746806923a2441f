// ABOUTME: Two-level lexical environment shared by the compiler and the VM

use crate::value::{Symbol, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// A runtime environment frame: an ordered slot of values, and the
/// enclosing frame. The distinguished *null environment* is represented
/// as `next = None` rather than the original's self-referential sentinel
/// — an idiomatic simplification that preserves the documented semantics
/// ("chain terminating at the null environment") without an `Rc` cycle.
///
/// Binding *values* live here; the binding *symbols* for a given frame are
/// fixed at compile time (the compile-time `CompileEnv` below) and are
/// not duplicated per runtime frame — `LVAR`/`LSET` address slots purely
/// by `(i, j)`, carrying the symbol only as a diagnostic annotation on the
/// instruction itself.
pub struct EnvData {
    bindings: RefCell<Vec<Value>>,
    next: Option<Environment>,
}

#[derive(Clone)]
pub struct Environment(Rc<EnvData>);

impl Environment {
    /// The null/global environment: no bindings, no parent.
    pub fn null() -> Self {
        Environment(Rc::new(EnvData {
            bindings: RefCell::new(Vec::new()),
            next: None,
        }))
    }

    pub fn is_null(&self) -> bool {
        self.0.next.is_none() && self.0.bindings.borrow().is_empty()
    }

    /// `EXTENV n`: build a new frame holding `values` (already popped off
    /// the VM stack by the caller, in binding order) whose parent is
    /// `self`.
    pub fn extend(&self, values: Vec<Value>) -> Environment {
        Environment(Rc::new(EnvData {
            bindings: RefCell::new(values),
            next: Some(self.clone()),
        }))
    }

    /// `POPENV`: the parent frame, or `self` if already at the null
    /// environment (defensive; the compiler is responsible for balancing
    /// every `EXTENV` with a `POPENV` on every exit path).
    pub fn pop(&self) -> Environment {
        self.0.next.clone().unwrap_or_else(|| self.clone())
    }

    fn nth_frame(&self, i: usize) -> Environment {
        let mut env = self.clone();
        for _ in 0..i {
            env = env.0.next.clone().expect("LVAR/LSET: frame index out of range");
        }
        env
    }

    /// `LVAR i j`: read slot `j` of the frame `i` levels out.
    pub fn lvar(&self, i: usize, j: usize) -> Value {
        let frame = self.nth_frame(i);
        frame
            .0
            .bindings
            .borrow()
            .get(j)
            .cloned()
            .expect("LVAR: slot index out of range")
    }

    /// `LSET i j`: write slot `j` of the frame `i` levels out.
    pub fn lset(&self, i: usize, j: usize, value: Value) {
        let frame = self.nth_frame(i);
        let mut bindings = frame.0.bindings.borrow_mut();
        let slot = bindings.get_mut(j).expect("LSET: slot index out of range");
        *slot = value;
    }

    pub fn frame_len(&self) -> usize {
        self.0.bindings.borrow().len()
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#<environment>")
    }
}

/// The compiler's parallel compile-time environment: frames of ordered
/// symbol lists, used to resolve a variable reference to `(i, j)` or fall
/// back to a global reference. Frame 0 is the innermost (most recently
/// opened) frame, matching the runtime chain's addressing.
#[derive(Clone, Debug, Default)]
pub struct CompileEnv {
    frames: Vec<Vec<Symbol>>,
}

impl CompileEnv {
    pub fn new() -> Self {
        CompileEnv { frames: Vec::new() }
    }

    pub fn push_frame(&self, symbols: Vec<Symbol>) -> CompileEnv {
        let mut frames = self.frames.clone();
        frames.push(symbols);
        CompileEnv { frames }
    }

    /// Resolve `sym` to `(frames-out, position-in-frame)`, innermost frame
    /// first (`i = 0`), or `None` if it is free (a global reference).
    pub fn resolve(&self, sym: &Symbol) -> Option<(usize, usize)> {
        for (i, frame) in self.frames.iter().rev().enumerate() {
            if let Some(j) = frame.iter().position(|s| s == sym) {
                return Some((i, j));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_environment_has_no_parent() {
        let env = Environment::null();
        assert!(env.is_null());
        assert_eq!(env.pop(), env);
    }

    #[test]
    fn extend_then_lvar_reads_back_bound_value() {
        let env = Environment::null();
        let extended = env.extend(vec![Value::Fixnum(42)]);
        assert!(matches!(extended.lvar(0, 0), Value::Fixnum(42)));
    }

    #[test]
    fn lvar_walks_outer_frames_by_distance() {
        let env = Environment::null();
        let outer = env.extend(vec![Value::Fixnum(1)]);
        let inner = outer.extend(vec![Value::Fixnum(2)]);
        assert!(matches!(inner.lvar(0, 0), Value::Fixnum(2)));
        assert!(matches!(inner.lvar(1, 0), Value::Fixnum(1)));
    }

    #[test]
    fn lset_mutates_the_addressed_slot() {
        let env = Environment::null().extend(vec![Value::Fixnum(1)]);
        env.lset(0, 0, Value::Fixnum(99));
        assert!(matches!(env.lvar(0, 0), Value::Fixnum(99)));
    }

    #[test]
    fn compile_env_resolves_innermost_first() {
        let x = Symbol::new("x");
        let y = Symbol::new("y");
        let cenv = CompileEnv::new()
            .push_frame(vec![x.clone()])
            .push_frame(vec![y.clone()]);
        assert_eq!(cenv.resolve(&x), Some((1, 0)));
        assert_eq!(cenv.resolve(&y), Some((0, 0)));
        assert_eq!(cenv.resolve(&Symbol::new("z")), None);
    }
}
