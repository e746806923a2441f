// ABOUTME: Fatal (Rust-level) errors, plus exception tag constants and constructors

use crate::context::Context;
use crate::value::{LispException, Value};
use thiserror::Error;

/// Exception tags (§7). Interned lazily on first use via `Context`; these
/// constants are just the names, kept here so every producer of a given
/// exception kind spells the tag the same way.
pub const TAG_READER_ERROR: &str = "READER-ERROR";
pub const TAG_TYPE_ERROR: &str = "TYPE-ERROR";
pub const TAG_ARITY_ERROR: &str = "ARITY-ERROR";
pub const TAG_UNBOUND: &str = "UNBOUND";
pub const TAG_ARITH: &str = "ARITH";
pub const TAG_USER: &str = "USER";

/// Fatal errors (§7): invariants the compiler/assembler is responsible
/// for upholding. These never become Lisp values; they abort the
/// operation that produced them with a `Result`, the same split the
/// teacher's `EvalError` draws between recoverable and structural
/// failure.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    #[error("unresolved label: {0}")]
    UnresolvedLabel(String),

    #[error("dispatch on invalid bytecode at pc {0}")]
    InvalidBytecode(usize),

    #[error("empty code vector")]
    EmptyCode,

    #[error("malformed special form: {0}")]
    MalformedForm(String),

    #[error("{0}")]
    Io(String),
}

/// Build a `Value::Exception` with `flag = true` (signalled), tagged in
/// the `Lisp` package under `tag_name`.
pub fn raise(ctx: &Context, tag_name: &str, message: impl Into<String>) -> Value {
    let tag = ctx.lisp_package.find_or_create_symbol(tag_name);
    Value::Exception(LispException::new(message, tag))
}

pub fn reader_error(ctx: &Context, message: impl Into<String>) -> Value {
    raise(ctx, TAG_READER_ERROR, message)
}

pub fn type_error(ctx: &Context, function: &str, expected: &str, actual: &Value) -> Value {
    raise(
        ctx,
        TAG_TYPE_ERROR,
        format!(
            "{function}: expected {expected}, got {} ({})",
            actual.type_name(),
            crate::writer::write_to_string(actual)
        ),
    )
}

pub fn arity_error(ctx: &Context, function: &str, expected: &str, actual: usize) -> Value {
    raise(
        ctx,
        TAG_ARITY_ERROR,
        format!("{function}: expected {expected} argument(s), got {actual}"),
    )
}

pub fn unbound_error(ctx: &Context, name: &str) -> Value {
    raise(ctx, TAG_UNBOUND, format!("Undefined symbol: {name}"))
}

pub fn arith_error(ctx: &Context, message: impl Into<String>) -> Value {
    raise(ctx, TAG_ARITH, message)
}

pub fn signal_user(ctx: &Context, message: impl Into<String>) -> Value {
    raise(ctx, TAG_USER, message)
}
