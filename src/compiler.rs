// ABOUTME: The compiler (value -> instruction list) and assembler (labels -> absolute indices) (§4.3)

use crate::context::Context;
use crate::env::CompileEnv;
use crate::error::CoreError;
use crate::opcode::{CodeObject, Instr, Op};
use crate::value::{Function, ParamList, Pair, Symbol, TypeTag, Value};
use std::collections::HashMap;
use std::rc::Rc;

/// A compile error is either a fatal (compiler-upheld) invariant violation,
/// or a Lisp exception signalled while running a macro at compile time.
/// Only the latter is something a caller could have caught with `catch`;
/// a fatal error means the input form itself was malformed and aborts the
/// compilation attempt, per §7 ("fatal errors abort... invariants the
/// compiler is responsible for upholding").
#[derive(Debug, Clone)]
pub enum CompileError {
    Fatal(CoreError),
    Signalled(Value),
}

impl From<CoreError> for CompileError {
    fn from(e: CoreError) -> Self {
        CompileError::Fatal(e)
    }
}

fn malformed(msg: impl Into<String>) -> CompileError {
    CompileError::Fatal(CoreError::MalformedForm(msg.into()))
}

/// One item of the compiler's intermediate representation (§4.3): either a
/// real instruction, or a label marking a position for the assembler to
/// resolve and drop.
#[derive(Clone, Debug)]
enum Asm {
    Instr(Op, Vec<Value>),
    Label(Symbol),
}

fn instr(op: Op, operands: Vec<Value>) -> Asm {
    Asm::Instr(op, operands)
}

type CompileOut = Result<Vec<Asm>, CompileError>;

/// Compile a single top-level expression into a frozen, assembled code
/// vector. This is the `compile(value) -> code` interface of §6; the
/// top-level expression is always compiled in tail position so its final
/// `RETURN` hands control back to whatever installed the VM's initial
/// retaddr.
pub fn compile_toplevel(ctx: &Context, expr: Value) -> Result<Rc<CodeObject>, CompileError> {
    let cenv = CompileEnv::new();
    let asm = compile_expr(ctx, &expr, &cenv, true)?;
    Ok(assemble(asm)?)
}

fn finish(mut asm: Vec<Asm>, tail: bool) -> Vec<Asm> {
    if tail {
        asm.push(instr(Op::Return, vec![]));
    }
    asm
}

fn compile_expr(ctx: &Context, expr: &Value, cenv: &CompileEnv, tail: bool) -> CompileOut {
    match expr {
        Value::Symbol(sym) => compile_symbol_ref(sym, cenv, tail),
        Value::Pair(p) => compile_pair(ctx, p, cenv, tail),
        _ => Ok(finish(vec![instr(Op::Const, vec![expr.clone()])], tail)),
    }
}

fn compile_symbol_ref(sym: &Symbol, cenv: &CompileEnv, tail: bool) -> CompileOut {
    let asm = if let Some((i, j)) = cenv.resolve(sym) {
        vec![instr(
            Op::Lvar,
            vec![
                Value::Fixnum(i as i64),
                Value::Fixnum(j as i64),
                Value::Symbol(sym.clone()),
            ],
        )]
    } else {
        vec![instr(Op::Gvar, vec![Value::Symbol(sym.clone())])]
    };
    Ok(finish(asm, tail))
}

fn compile_pair(ctx: &Context, p: &Pair, cenv: &CompileEnv, tail: bool) -> CompileOut {
    let head = p.head();
    if let Value::Symbol(s) = &head {
        if cenv.resolve(s).is_none() {
            if *s == ctx.sym_quote {
                return compile_quote(p, tail);
            }
            if *s == ctx.sym_set {
                return compile_set(ctx, p, cenv, tail);
            }
            if *s == ctx.sym_if {
                return compile_if(ctx, p, cenv, tail);
            }
            if *s == ctx.sym_begin {
                return compile_begin(ctx, to_vec(&p.tail()), cenv, tail);
            }
            if *s == ctx.sym_lambda {
                return compile_lambda(ctx, p, cenv, tail);
            }
            if *s == ctx.sym_catch {
                return compile_catch(ctx, p, cenv, tail);
            }
            if *s == ctx.sym_tagbody {
                return compile_tagbody(ctx, p, cenv, tail);
            }
            if *s == ctx.sym_quasiquote {
                let arg = to_vec(&p.tail()).into_iter().next().unwrap_or(Value::Undefined);
                let expanded = qq_expand(ctx, &arg, 1)?;
                return compile_expr(ctx, &expanded, cenv, tail);
            }
            if s.is_macro() {
                let Value::Function(macro_fn) = s.get_macro() else {
                    return Err(malformed(format!(
                        "{}: macro cell is not a function",
                        s.name()
                    )));
                };
                let args = to_vec(&p.tail());
                let expansion = crate::macroexpand::expand_once(ctx, &macro_fn, &args);
                if expansion.is_signalled_exception() {
                    return Err(CompileError::Signalled(expansion));
                }
                return compile_expr(ctx, &expansion, cenv, tail);
            }
        }
    }
    compile_call(ctx, p, cenv, tail)
}

fn compile_quote(p: &Pair, tail: bool) -> CompileOut {
    let v = to_vec(&p.tail()).into_iter().next().unwrap_or(Value::Undefined);
    Ok(finish(vec![instr(Op::Const, vec![v])], tail))
}

fn compile_set(ctx: &Context, p: &Pair, cenv: &CompileEnv, tail: bool) -> CompileOut {
    let args = to_vec(&p.tail());
    if args.len() != 2 {
        return Err(malformed("set: expected (set symbol expr)"));
    }
    let Value::Symbol(sym) = &args[0] else {
        return Err(malformed("set: first argument must be a symbol"));
    };
    let mut asm = compile_expr(ctx, &args[1], cenv, false)?;
    if let Some((i, j)) = cenv.resolve(sym) {
        asm.push(instr(
            Op::Lset,
            vec![
                Value::Fixnum(i as i64),
                Value::Fixnum(j as i64),
                Value::Symbol(sym.clone()),
            ],
        ));
    } else {
        asm.push(instr(Op::Gset, vec![Value::Symbol(sym.clone())]));
    }
    Ok(finish(asm, tail))
}

fn compile_if(ctx: &Context, p: &Pair, cenv: &CompileEnv, tail: bool) -> CompileOut {
    let args = to_vec(&p.tail());
    if args.len() != 3 {
        return Err(malformed("if: expected (if test consequent alternative)"));
    }
    let mut asm = compile_expr(ctx, &args[0], cenv, false)?;
    let l_else = ctx.gensym("L-ELSE-");
    asm.push(instr(Op::Fjump, vec![Value::Symbol(l_else.clone())]));
    asm.extend(compile_expr(ctx, &args[1], cenv, tail)?);
    if tail {
        asm.push(Asm::Label(l_else));
        asm.extend(compile_expr(ctx, &args[2], cenv, tail)?);
    } else {
        let l_end = ctx.gensym("L-ENDIF-");
        asm.push(instr(Op::Jump, vec![Value::Symbol(l_end.clone())]));
        asm.push(Asm::Label(l_else));
        asm.extend(compile_expr(ctx, &args[2], cenv, false)?);
        asm.push(Asm::Label(l_end));
    }
    Ok(asm)
}

fn compile_begin(ctx: &Context, body: Vec<Value>, cenv: &CompileEnv, tail: bool) -> CompileOut {
    if body.is_empty() {
        return Ok(finish(
            vec![instr(Op::Const, vec![Value::EmptyList])],
            tail,
        ));
    }
    let mut asm = Vec::new();
    let last = body.len() - 1;
    for (idx, e) in body.iter().enumerate() {
        if idx == last {
            asm.extend(compile_expr(ctx, e, cenv, tail)?);
        } else {
            asm.extend(compile_expr(ctx, e, cenv, false)?);
            asm.push(instr(Op::Pop, vec![]));
        }
    }
    Ok(asm)
}

fn parse_param_list(form: &Value) -> Result<(Vec<Symbol>, Option<Symbol>), CompileError> {
    match form {
        Value::Symbol(s) => Ok((vec![], Some(s.clone()))),
        Value::EmptyList => Ok((vec![], None)),
        Value::Pair(_) => {
            let mut required = Vec::new();
            let mut cur = form.clone();
            loop {
                match cur {
                    Value::Pair(p) => {
                        let Value::Symbol(s) = p.head() else {
                            return Err(malformed("lambda: parameter must be a symbol"));
                        };
                        required.push(s);
                        cur = p.tail();
                    }
                    Value::EmptyList => return Ok((required, None)),
                    Value::Symbol(s) => return Ok((required, Some(s))),
                    _ => return Err(malformed("lambda: malformed parameter list")),
                }
            }
        }
        _ => Err(malformed("lambda: malformed parameter list")),
    }
}

fn compile_lambda(ctx: &Context, p: &Pair, cenv: &CompileEnv, tail: bool) -> CompileOut {
    let rest = to_vec(&p.tail());
    if rest.is_empty() {
        return Err(malformed("lambda: missing parameter list"));
    }
    let (required, rest_sym) = parse_param_list(&rest[0])?;
    let body = rest[1..].to_vec();

    let mut frame_syms = required.clone();
    if let Some(r) = &rest_sym {
        frame_syms.push(r.clone());
    }
    let body_cenv = cenv.push_frame(frame_syms);

    let n = required.len();
    let mut body_asm = if rest_sym.is_some() {
        vec![instr(Op::Restargs, vec![Value::Fixnum(n as i64)])]
    } else {
        vec![
            instr(Op::Chkarity, vec![Value::Fixnum(n as i64)]),
            instr(Op::Moveargs, vec![Value::Fixnum(n as i64)]),
        ]
    };
    body_asm.extend(compile_begin(ctx, body, &body_cenv, true)?);

    let code = assemble(body_asm)?;
    let param_list = ParamList {
        required,
        rest: rest_sym,
    };
    let template = Function::new(param_list, code, ctx.null_env.clone());
    Ok(finish(
        vec![instr(Op::Fn, vec![Value::Function(template)])],
        tail,
    ))
}

fn compile_catch(ctx: &Context, p: &Pair, cenv: &CompileEnv, tail: bool) -> CompileOut {
    let rest = to_vec(&p.tail());
    if rest.is_empty() {
        return Err(malformed("catch: missing tag expression"));
    }
    let mut asm = compile_expr(ctx, &rest[0], cenv, false)?;
    let l_handler = ctx.gensym("L-HANDLER-");
    asm.push(instr(Op::Catch, vec![Value::Symbol(l_handler.clone())]));
    asm.extend(compile_begin(ctx, rest[1..].to_vec(), cenv, false)?);
    asm.push(Asm::Label(l_handler));
    Ok(finish(asm, tail))
}

fn compile_tagbody(ctx: &Context, p: &Pair, cenv: &CompileEnv, tail: bool) -> CompileOut {
    let forms = to_vec(&p.tail());
    let mut labels: HashMap<Symbol, Symbol> = HashMap::new();
    for f in &forms {
        if let Value::Symbol(s) = f {
            labels.insert(s.clone(), ctx.gensym("TAG-"));
        }
    }
    let mut asm = Vec::new();
    for f in &forms {
        match f {
            Value::Symbol(s) if labels.contains_key(s) => {
                asm.push(Asm::Label(labels[s].clone()));
            }
            Value::Pair(gp) if matches!(&gp.head(), Value::Symbol(hs) if *hs == ctx.sym_goto) => {
                let goto_args = to_vec(&gp.tail());
                let Some(Value::Symbol(target)) = goto_args.first() else {
                    return Err(malformed("goto: expected a label symbol"));
                };
                let Some(resolved) = labels.get(target) else {
                    return Err(malformed(format!(
                        "goto: undefined label {}",
                        target.name()
                    )));
                };
                asm.push(instr(Op::Jump, vec![Value::Symbol(resolved.clone())]));
            }
            other => {
                asm.extend(compile_expr(ctx, other, cenv, false)?);
                asm.push(instr(Op::Pop, vec![]));
            }
        }
    }
    asm.push(instr(Op::Const, vec![Value::EmptyList]));
    Ok(finish(asm, tail))
}

fn compile_call(ctx: &Context, p: &Pair, cenv: &CompileEnv, tail: bool) -> CompileOut {
    let head = p.head();
    let args = to_vec(&p.tail());
    let nargs = args.len();

    if let Value::Symbol(s) = &head {
        if cenv.resolve(s).is_none() {
            if let Value::Primitive(prim) = s.get_value() {
                let saturated = !prim.0.restp && nargs == prim.0.arity;

                let mut asm = Vec::new();
                for a in &args {
                    asm.extend(compile_expr(ctx, a, cenv, false)?);
                }
                // §4.3: "Emit optional CHKTYPE instructions from the
                // primitive's declared signature if applicable" — applicable
                // means the call site supplies exactly the arguments the
                // signature describes; a rest-arg overflow or an arity
                // mismatch is left for CHKARITY/RESTARGS to report instead.
                if saturated && !prim.0.signature.is_empty() {
                    asm.extend(chktype_instrs(&prim.0.signature, nargs));
                }
                if let Some(op) = prim.0.shortcut {
                    if saturated {
                        asm.push(instr(op, vec![]));
                        return Ok(finish(asm, tail));
                    }
                }
                asm.extend(compile_expr(ctx, &head, cenv, false)?);
                asm.push(instr(Op::Call, vec![Value::Fixnum(nargs as i64)]));
                return Ok(finish(asm, tail));
            }
        }
    }

    let mut asm = Vec::new();
    for a in &args {
        asm.extend(compile_expr(ctx, a, cenv, false)?);
    }
    asm.extend(compile_expr(ctx, &head, cenv, false)?);
    asm.push(instr(Op::Call, vec![Value::Fixnum(nargs as i64)]));
    Ok(finish(asm, tail))
}

/// One CHKTYPE per signature position, each indexing the already-pushed
/// argument stack from the top (§4.4's CHKTYPE row).
fn chktype_instrs(signature: &[TypeTag], nargs: usize) -> Vec<Asm> {
    signature
        .iter()
        .enumerate()
        .map(|(pos, tag)| {
            instr(
                Op::Chktype,
                vec![
                    Value::Fixnum(pos as i64),
                    Value::Type(*tag),
                    Value::Fixnum(nargs as i64),
                ],
            )
        })
        .collect()
}

/// Classic quasiquote desugaring (§4.1 grammar, exercised by the `` `(1
/// ,(fx+ 1 1) 3) `` scenario in §8): rewrite into `cons`/`list`/`append`
/// calls over quoted literals, tracking nesting depth so a quasiquote
/// inside a quasiquote defers its own unquotes to the outer level.
fn qq_expand(ctx: &Context, expr: &Value, depth: usize) -> Result<Value, CompileError> {
    if let Value::Pair(p) = expr {
        let head = p.head();
        if is_sym(&head, &ctx.sym_unquote) {
            let arg = nth(ctx, &p.tail(), 0, "unquote")?;
            if depth == 1 {
                return Ok(arg);
            }
            let inner = qq_expand(ctx, &arg, depth - 1)?;
            return Ok(qq_call(
                ctx,
                "list",
                vec![quote_wrap(ctx, Value::Symbol(ctx.sym_unquote.clone())), inner],
            ));
        }
        if is_sym(&head, &ctx.sym_quasiquote) {
            let arg = nth(ctx, &p.tail(), 0, "quasiquote")?;
            let inner = qq_expand(ctx, &arg, depth + 1)?;
            return Ok(qq_call(
                ctx,
                "list",
                vec![
                    quote_wrap(ctx, Value::Symbol(ctx.sym_quasiquote.clone())),
                    inner,
                ],
            ));
        }
        if let Value::Pair(hp) = &head {
            if is_sym(&hp.head(), &ctx.sym_splicing) && depth == 1 {
                let spliced = nth(ctx, &hp.tail(), 0, "unquote-splicing")?;
                let rest_expanded = qq_expand(ctx, &p.tail(), depth)?;
                return Ok(qq_call(ctx, "append", vec![spliced, rest_expanded]));
            }
        }
        let head_expanded = qq_expand(ctx, &head, depth)?;
        let tail_expanded = qq_expand(ctx, &p.tail(), depth)?;
        Ok(qq_call(ctx, "cons", vec![head_expanded, tail_expanded]))
    } else {
        Ok(quote_wrap(ctx, expr.clone()))
    }
}

fn is_sym(v: &Value, sym: &Symbol) -> bool {
    matches!(v, Value::Symbol(s) if s == sym)
}

fn quote_wrap(ctx: &Context, v: Value) -> Value {
    Value::Pair(Pair::new(
        Value::Symbol(ctx.sym_quote.clone()),
        Value::Pair(Pair::new(v, Value::EmptyList)),
    ))
}

fn qq_call(ctx: &Context, fname: &str, args: Vec<Value>) -> Value {
    let sym = ctx.lisp_package.find_or_create_symbol(fname);
    let mut tail = Value::EmptyList;
    for a in args.into_iter().rev() {
        tail = Value::Pair(Pair::new(a, tail));
    }
    Value::Pair(Pair::new(Value::Symbol(sym), tail))
}

/// Pull the `n`th element out of a quasiquote subform's argument list,
/// the compiler's analogue of `original_source/prims.c`'s
/// `lt_raw_nth`/`lt_raw_nthtail`. A list too short to hold it is a
/// malformed `(unquote ...)`/`(unquote-splicing ...)`/`(quasiquote ...)`
/// form, raised uniformly as a TYPE-ERROR rather than silently compiled
/// into a bogus `Undefined` literal.
fn nth(ctx: &Context, list: &Value, n: usize, form: &str) -> Result<Value, CompileError> {
    let mut cur = list.clone();
    for _ in 0..n {
        match cur {
            Value::Pair(p) => cur = p.tail(),
            _ => return Err(CompileError::Signalled(qq_short_list_error(ctx, form, n))),
        }
    }
    match cur {
        Value::Pair(p) => Ok(p.head()),
        _ => Err(CompileError::Signalled(qq_short_list_error(ctx, form, n))),
    }
}

fn qq_short_list_error(ctx: &Context, form: &str, n: usize) -> Value {
    crate::error::raise(
        ctx,
        crate::error::TAG_TYPE_ERROR,
        format!("{form}: expected an argument at index {n}, got too few"),
    )
}

fn to_vec(list: &Value) -> Vec<Value> {
    let mut out = Vec::new();
    let mut cur = list.clone();
    while let Value::Pair(p) = cur {
        out.push(p.head());
        cur = p.tail();
    }
    out
}

/// Resolve every label in `asm` to an absolute instruction index and
/// freeze the result. Labels are dropped; `JUMP`/`FJUMP`/`CATCH` operands
/// that were label symbols become fixnum indices.
fn assemble(asm: Vec<Asm>) -> Result<Rc<CodeObject>, CoreError> {
    let mut positions: HashMap<usize, usize> = HashMap::new();
    let mut raw: Vec<(Op, Vec<Value>)> = Vec::new();
    for item in asm {
        match item {
            Asm::Label(sym) => {
                positions.insert(Rc::as_ptr(&sym.0) as usize, raw.len());
            }
            Asm::Instr(op, operands) => raw.push((op, operands)),
        }
    }

    let mut instrs = Vec::with_capacity(raw.len());
    for (op, operands) in raw {
        let operands = if matches!(op, Op::Jump | Op::Fjump | Op::Catch) {
            let mut resolved = Vec::with_capacity(operands.len());
            for operand in operands {
                match &operand {
                    Value::Symbol(sym) => {
                        let key = Rc::as_ptr(&sym.0) as usize;
                        let idx = positions
                            .get(&key)
                            .ok_or_else(|| CoreError::UnresolvedLabel(sym.name().to_string()))?;
                        resolved.push(Value::Fixnum(*idx as i64));
                    }
                    _ => resolved.push(operand),
                }
            }
            resolved
        } else {
            operands
        };
        instrs.push(Rc::new(Instr::new(op, operands)));
    }
    Ok(Rc::new(CodeObject { instrs }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read;
    use crate::port::InputPort;

    fn compile_str(ctx: &Context, s: &str) -> Result<Rc<CodeObject>, CompileError> {
        let expr = read(ctx, &InputPort::from_str(s));
        compile_toplevel(ctx, expr)
    }

    fn mnemonics(code: &CodeObject) -> Vec<&'static str> {
        (0..code.len())
            .map(|i| code.get(i).unwrap().op.mnemonic())
            .collect()
    }

    #[test]
    fn self_evaluating_form_compiles_to_const_return() {
        let ctx = Context::init();
        let code = compile_str(&ctx, "42").unwrap();
        assert_eq!(mnemonics(&code), vec!["CONST", "RETURN"]);
    }

    #[test]
    fn quote_compiles_to_const_of_the_unevaluated_datum() {
        let ctx = Context::init();
        let code = compile_str(&ctx, "(quote (a b))").unwrap();
        assert_eq!(mnemonics(&code), vec!["CONST", "RETURN"]);
    }

    #[test]
    fn if_in_tail_position_has_no_trailing_jump() {
        let ctx = Context::init();
        let code = compile_str(&ctx, "(if #t 1 2)").unwrap();
        // test; FJUMP; consequent CONST+RETURN; alternative CONST+RETURN.
        assert_eq!(
            mnemonics(&code),
            vec!["CONST", "FJUMP", "CONST", "RETURN", "CONST", "RETURN"]
        );
    }

    #[test]
    fn lambda_with_fixed_arity_emits_chkarity_and_moveargs() {
        let ctx = Context::init();
        let code = compile_str(&ctx, "(lambda (x) x)").unwrap();
        assert_eq!(mnemonics(&code), vec!["FN", "RETURN"]);
        let Some(instr) = code.get(0) else {
            panic!("expected an FN instruction");
        };
        let Value::Function(f) = &instr.operands[0] else {
            panic!("expected FN operand to be a function");
        };
        assert_eq!(
            mnemonics(&f.0.code),
            vec!["CHKARITY", "MOVEARGS", "LVAR", "RETURN"]
        );
    }

    #[test]
    fn lambda_with_rest_parameter_emits_restargs() {
        let ctx = Context::init();
        let code = compile_str(&ctx, "(lambda (x . y) x)").unwrap();
        let Value::Function(f) = &code.get(0).unwrap().operands[0] else {
            panic!("expected function");
        };
        assert_eq!(mnemonics(&f.0.code)[0], "RESTARGS");
    }

    #[test]
    fn general_call_compiles_args_then_callee_then_call() {
        let ctx = Context::init();
        let code = compile_str(&ctx, "(undefined-function 1 2)").unwrap();
        assert_eq!(
            mnemonics(&code),
            vec!["CONST", "CONST", "GVAR", "CALL", "RETURN"]
        );
    }

    #[test]
    fn malformed_set_form_is_a_fatal_compile_error() {
        let ctx = Context::init();
        let result = compile_str(&ctx, "(set 1 2)");
        assert!(matches!(result, Err(CompileError::Fatal(_))));
    }

    #[test]
    fn quasiquote_with_unquote_desugars_to_cons_calls() {
        let ctx = Context::init();
        let code = compile_str(&ctx, "`(1 ,x)").unwrap();
        // (cons (quote 1) (cons x (quote ()))) compiled as a general call tree.
        assert!(mnemonics(&code).contains(&"CALL"));
    }

    #[test]
    fn a_saturated_call_to_a_primitive_with_a_declared_signature_emits_chktype() {
        let ctx = Context::init();
        let code = compile_str(&ctx, "(head 5)").unwrap();
        let names = mnemonics(&code);
        assert!(names.contains(&"CHKTYPE"));
        // CHKTYPE runs after the argument is pushed and before the call.
        assert!(names.iter().position(|m| *m == "CHKTYPE").unwrap() < names.iter().rposition(|m| *m == "CALL").unwrap());
    }

    #[test]
    fn a_primitive_with_no_declared_signature_emits_no_chktype() {
        let ctx = Context::init();
        let code = compile_str(&ctx, "(fx= 1 2)").unwrap();
        assert!(!mnemonics(&code).contains(&"CHKTYPE"));
    }

    #[test]
    fn unquote_with_a_missing_argument_raises_a_type_error_instead_of_compiling_undefined() {
        let ctx = Context::init();
        let form = Value::Pair(Pair::new(
            Value::Symbol(ctx.sym_quasiquote.clone()),
            Value::Pair(Pair::new(
                Value::Pair(Pair::new(
                    Value::Symbol(ctx.sym_unquote.clone()),
                    Value::EmptyList,
                )),
                Value::EmptyList,
            )),
        ));
        let result = compile_toplevel(&ctx, form);
        match result {
            Err(CompileError::Signalled(Value::Exception(e))) => {
                assert!(e.is_signalled());
                assert_eq!(e.0.tag.name(), "TYPE-ERROR");
            }
            other => panic!("expected a signalled TYPE-ERROR, got {other:?}"),
        }
    }
}
