//! Procedural macros for the Lisp core's primitive catalogue
//!
//! Provides the `#[primitive]` attribute macro for defining native
//! primitive functions. Adapted from the teacher's `#[builtin]` macro: the
//! same attribute-parsing shape, but emitting an `inventory::submit!` of a
//! `PrimitiveDescriptor` (name, arity, rest-flag, opcode shortcut, type
//! signature) instead of a per-function registration closure plus help
//! entry, since this core has no help system.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn};

/// Parsed `#[primitive(...)]` attribute arguments.
struct PrimitiveArgs {
    name: String,
    arity: usize,
    restp: bool,
    shortcut: Option<String>,
    signature: Vec<String>,
}

fn parse_primitive_args(attr_stream: TokenStream) -> PrimitiveArgs {
    let attr_str = attr_stream.to_string();

    let mut name = String::new();
    let mut arity = 0usize;
    let mut restp = false;
    let mut shortcut = None;
    let mut signature = Vec::new();

    if let Some(start) = attr_str.find("name = \"") {
        let rest = &attr_str[start + 8..];
        if let Some(end) = rest.find('"') {
            name = rest[..end].to_string();
        }
    }

    if let Some(start) = attr_str.find("arity = ") {
        let rest = attr_str[start + 8..].trim_start();
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        arity = digits.parse().unwrap_or(0);
    }

    if attr_str.contains("restp = true") {
        restp = true;
    }

    if let Some(start) = attr_str.find("shortcut = \"") {
        let rest = &attr_str[start + 12..];
        if let Some(end) = rest.find('"') {
            shortcut = Some(rest[..end].to_string());
        }
    }

    // `TokenStream::to_string()` inserts a space between the `signature`
    // ident and its parenthesized group, so this can't search for the
    // literal "signature(" the way the quoted-string fields above do.
    if let Some(start) = attr_str.find("signature") {
        let after_ident = attr_str[start + "signature".len()..].trim_start();
        if let Some(rest) = after_ident.strip_prefix('(') {
            if let Some(end) = rest.find(')') {
                signature = rest[..end]
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
        }
    }

    PrimitiveArgs {
        name,
        arity,
        restp,
        shortcut,
        signature,
    }
}

/// Attribute macro registering a native primitive function.
///
/// # Attribute arguments
///
/// - `name`: the Lisp-visible symbol name, e.g. `"fx+"`.
/// - `arity`: the number of required arguments.
/// - `restp`: whether trailing arguments beyond `arity` are packed into a
///   list bound as the last argument (default `false`).
/// - `shortcut`: the name of an `Op` variant this primitive may compile to
///   directly at a saturated call site, e.g. `"Cons"`.
/// - `signature(...)`: a comma-separated list of `TypeTag` variant names
///   used to emit `CHKTYPE` checks ahead of the call.
///
/// The annotated function must have the signature
/// `fn(&mut Vm, &[Value]) -> Value`.
#[proc_macro_attribute]
pub fn primitive(attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as ItemFn);
    let args = parse_primitive_args(attr);

    let fn_name = func.sig.ident.clone();
    let lisp_name = if args.name.is_empty() {
        fn_name.to_string()
    } else {
        args.name
    };
    let arity = args.arity;
    let restp = args.restp;

    let shortcut_expr = match args.shortcut {
        Some(op_name) => {
            let op_ident = quote::format_ident!("{}", op_name);
            quote! { Some(crate::opcode::Op::#op_ident) }
        }
        None => quote! { None },
    };

    let signature_idents: Vec<_> = args
        .signature
        .iter()
        .map(|t| {
            let ident = quote::format_ident!("{}", t);
            quote! { crate::value::TypeTag::#ident }
        })
        .collect();

    let expanded = quote! {
        #func

        ::inventory::submit! {
            crate::primitives::PrimitiveDescriptor {
                name: #lisp_name,
                arity: #arity,
                restp: #restp,
                func: #fn_name,
                shortcut: #shortcut_expr,
                signature: &[#(#signature_idents),*],
            }
        }
    };

    TokenStream::from(expanded)
}
