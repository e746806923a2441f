// ABOUTME: Process-wide state grouped into a single context, per the Design Notes

use crate::env::Environment;
use crate::port::{InputPort, OutputPort};
use crate::value::{Package, Symbol, Value};
use std::cell::Cell;

/// The "process-wide state" described in §5 and by the Design Notes
/// ("Global state... Group them into a single VM context and pass by
/// reference to every subsystem; avoid re-introducing hidden globals"):
/// packages, the current package, the gensym counter, the three standard
/// ports, and the debug/check-type/check-exception flags. One `Context`
/// is created by `init()` and threaded through the reader, compiler and
/// VM; nothing here is a Rust global/static.
pub struct Context {
    pub lisp_package: Package,
    pub user_package: Package,
    pub current_package: std::cell::RefCell<Package>,
    pub standard_in: InputPort,
    pub standard_out: OutputPort,
    pub standard_error: OutputPort,
    pub gensym_counter: Cell<u64>,
    pub debug: Cell<bool>,
    pub check_types: Cell<bool>,
    pub check_exceptions: Cell<bool>,
    pub null_env: Environment,

    // Pre-interned special-form symbols (object.c `init_global_variable`).
    pub sym_begin: Symbol,
    pub sym_catch: Symbol,
    pub sym_dot: Symbol,
    pub sym_goto: Symbol,
    pub sym_if: Symbol,
    pub sym_lambda: Symbol,
    pub sym_quasiquote: Symbol,
    pub sym_quote: Symbol,
    pub sym_set: Symbol,
    pub sym_splicing: Symbol,
    pub sym_tagbody: Symbol,
    pub sym_unquote: Symbol,
}

impl Context {
    /// `init()` (§6): build packages, pre-intern special-form symbols,
    /// install the standard ports and global bindings, and register
    /// primitives (via `crate::primitives::install`).
    pub fn init() -> Self {
        let lisp_package = Package::new("Lisp");
        let user_package = Package::new("User");
        user_package.use_package(lisp_package.clone());

        let standard_in = InputPort::from_str("");
        let standard_out = OutputPort::stdout();
        let standard_error = OutputPort::stderr();

        let ctx = Context {
            sym_begin: lisp_package.find_or_create_symbol("begin"),
            sym_catch: lisp_package.find_or_create_symbol("catch"),
            sym_dot: lisp_package.find_or_create_symbol("."),
            sym_goto: lisp_package.find_or_create_symbol("goto"),
            sym_if: lisp_package.find_or_create_symbol("if"),
            sym_lambda: lisp_package.find_or_create_symbol("lambda"),
            sym_quasiquote: lisp_package.find_or_create_symbol("quasiquote"),
            sym_quote: lisp_package.find_or_create_symbol("quote"),
            sym_set: lisp_package.find_or_create_symbol("set"),
            sym_splicing: lisp_package.find_or_create_symbol("unquote-splicing"),
            sym_tagbody: lisp_package.find_or_create_symbol("tagbody"),
            sym_unquote: lisp_package.find_or_create_symbol("unquote"),

            current_package: std::cell::RefCell::new(lisp_package.clone()),
            lisp_package,
            user_package,
            standard_in,
            standard_out,
            standard_error,
            gensym_counter: Cell::new(0),
            debug: Cell::new(false),
            check_types: Cell::new(true),
            check_exceptions: Cell::new(true),
            null_env: Environment::null(),
        };

        ctx.install_globals();
        crate::primitives::install(&ctx);
        ctx
    }

    fn install_globals(&self) {
        let argv = self
            .lisp_package
            .find_or_create_symbol("*ARGV*");
        argv.set_value(Value::Vector(crate::value::LispVector::new(0)));

        let gensym = self.lisp_package.find_or_create_symbol("*gensym-counter*");
        gensym.set_value(Value::Fixnum(0));

        self.lisp_package
            .find_or_create_symbol("*standard-input*")
            .set_value(Value::InputPort(self.standard_in.clone()));
        self.lisp_package
            .find_or_create_symbol("*standard-output*")
            .set_value(Value::OutputPort(self.standard_out.clone()));
        self.lisp_package
            .find_or_create_symbol("*standard-error*")
            .set_value(Value::OutputPort(self.standard_error.clone()));

        self.lisp_package
            .find_or_create_symbol("*package*")
            .set_value(Value::Package(self.lisp_package.clone()));
        self.user_package
            .find_or_create_symbol("*package*")
            .set_value(Value::Package(self.user_package.clone()));
    }

    pub fn current_package(&self) -> Package {
        self.current_package.borrow().clone()
    }

    pub fn set_current_package(&self, pkg: Package) {
        *self.current_package.borrow_mut() = pkg;
    }

    /// Generate a fresh uninterned-feeling symbol name, `G<n>`, used by
    /// the macro expander and by `gensym` if exposed as a primitive.
    pub fn gensym(&self, prefix: &str) -> Symbol {
        let n = self.gensym_counter.get();
        self.gensym_counter.set(n + 1);
        Symbol::new(format!("{prefix}{n}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_wires_user_package_to_use_lisp() {
        let ctx = Context::init();
        assert!(ctx.user_package.find_symbol("if").is_some());
        assert!(ctx.lisp_package.find_symbol("if").is_some());
    }

    #[test]
    fn gensym_produces_distinct_symbols() {
        let ctx = Context::init();
        let a = ctx.gensym("L");
        let b = ctx.gensym("L");
        assert_ne!(a, b);
    }
}
