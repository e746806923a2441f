// ABOUTME: Value types representing the tagged value universe of the Lisp core

use crate::env::Environment;
use crate::opcode::Instr;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A interned symbol: a name plus a value cell, a macro cell, and the
/// package it was interned in. Two symbols are the same binding iff they
/// are the same `Rc` (pointer identity), matching the "symbols interned in
/// a given package are unique by name" invariant.
pub struct SymbolData {
    pub name: String,
    pub value: RefCell<Value>,
    pub macro_cell: RefCell<Value>,
    pub package: RefCell<Option<Value>>, // Value::Package, set once at intern time
}

#[derive(Clone)]
pub struct Symbol(pub Rc<SymbolData>);

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Symbol(Rc::new(SymbolData {
            name: name.into(),
            value: RefCell::new(Value::Undefined),
            macro_cell: RefCell::new(Value::Undefined),
            package: RefCell::new(None),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_bound(&self) -> bool {
        !matches!(&*self.0.value.borrow(), Value::Undefined)
    }

    pub fn get_value(&self) -> Value {
        self.0.value.borrow().clone()
    }

    pub fn set_value(&self, v: Value) {
        *self.0.value.borrow_mut() = v;
    }

    pub fn is_macro(&self) -> bool {
        !matches!(&*self.0.macro_cell.borrow(), Value::Undefined)
    }

    pub fn get_macro(&self) -> Value {
        self.0.macro_cell.borrow().clone()
    }

    pub fn set_macro(&self, v: Value) {
        *self.0.macro_cell.borrow_mut() = v;
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Symbol {}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

/// A package: a named intern table plus the list of packages it uses for
/// fallback symbol resolution (`find_symbol`).
pub struct PackageData {
    pub name: String,
    pub table: RefCell<std::collections::HashMap<String, Symbol>>,
    pub used: RefCell<Vec<Package>>,
}

#[derive(Clone)]
pub struct Package(pub Rc<PackageData>);

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Package(Rc::new(PackageData {
            name: name.into(),
            table: RefCell::new(std::collections::HashMap::new()),
            used: RefCell::new(Vec::new()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn use_package(&self, other: Package) {
        self.0.used.borrow_mut().push(other);
    }

    /// Search this package's own table, then its used packages, recursively.
    pub fn find_symbol(&self, name: &str) -> Option<Symbol> {
        if let Some(sym) = self.0.table.borrow().get(name) {
            return Some(sym.clone());
        }
        for used in self.0.used.borrow().iter() {
            if let Some(sym) = used.find_symbol(name) {
                return Some(sym);
            }
        }
        None
    }

    pub fn find_or_create_symbol(&self, name: &str) -> Symbol {
        if let Some(sym) = self.find_symbol(name) {
            return sym;
        }
        let sym = Symbol::new(name);
        *sym.0.package.borrow_mut() = Some(Value::Package(self.clone()));
        self.0.table.borrow_mut().insert(name.to_string(), sym.clone());
        sym
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<package {}>", self.0.name)
    }
}

/// head/tail pair. Not a heap identity the program can normally mutate
/// (no `set-car!`/`set-cdr!` in the catalogue), but kept as `RefCell` so
/// a re-implementation of those primitives is a local change, and so
/// `quasiquote` splicing can build structure incrementally without extra
/// allocation machinery.
pub struct PairData {
    pub head: RefCell<Value>,
    pub tail: RefCell<Value>,
}

#[derive(Clone)]
pub struct Pair(pub Rc<PairData>);

impl Pair {
    pub fn new(head: Value, tail: Value) -> Self {
        Pair(Rc::new(PairData {
            head: RefCell::new(head),
            tail: RefCell::new(tail),
        }))
    }
    pub fn head(&self) -> Value {
        self.0.head.borrow().clone()
    }
    pub fn tail(&self) -> Value {
        self.0.tail.borrow().clone()
    }
    pub fn set_head(&self, v: Value) {
        *self.0.head.borrow_mut() = v;
    }
    pub fn set_tail(&self, v: Value) {
        *self.0.tail.borrow_mut() = v;
    }
}

impl PartialEq for Pair {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Fixed-arity parameter list of a lambda: the required parameter symbols
/// in order, plus an optional rest-parameter symbol for `(x . y)` lambdas.
#[derive(Clone, Debug)]
pub struct ParamList {
    pub required: Vec<Symbol>,
    pub rest: Option<Symbol>,
}

impl ParamList {
    pub fn arity(&self) -> usize {
        self.required.len()
    }
}

/// A compiled function: its parameter list, its assembled code, the
/// environment it closed over, and an optional name for backtraces.
pub struct FunctionData {
    pub params: ParamList,
    pub code: Rc<crate::opcode::CodeObject>,
    pub env: Environment,
    pub name: RefCell<Option<String>>,
}

#[derive(Clone)]
pub struct Function(pub Rc<FunctionData>);

impl Function {
    pub fn new(params: ParamList, code: Rc<crate::opcode::CodeObject>, env: Environment) -> Self {
        Function(Rc::new(FunctionData {
            params,
            code,
            env,
            name: RefCell::new(None),
        }))
    }

    /// Instantiate a template function (built by the compiler, closed over
    /// the null environment) into a closure over `env` — the effect of `FN`.
    pub fn close_over(&self, env: Environment) -> Function {
        Function(Rc::new(FunctionData {
            params: self.0.params.clone(),
            code: Rc::clone(&self.0.code),
            env,
            name: RefCell::new(self.0.name.borrow().clone()),
        }))
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// A primitive (native) function. `arity` is the required argument count;
/// `restp` means trailing args beyond `arity` are packed into a list.
/// `shortcut` is the opcode this primitive may be compiled to directly
/// instead of a general `CALL` (the "opcode shortcut" side table).
pub struct PrimitiveData {
    pub name: &'static str,
    pub arity: usize,
    pub restp: bool,
    pub func: fn(&mut crate::vm::Vm<'_>, &[Value]) -> Value,
    pub signature: Vec<TypeTag>,
    pub shortcut: Option<crate::opcode::Op>,
}

#[derive(Clone)]
pub struct Primitive(pub Rc<PrimitiveData>);

impl PartialEq for Primitive {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<primitive {}>", self.0.name)
    }
}

/// Saved VM state for `RETURN` to restore the caller. Per Design Note (c),
/// the original's `sp` constructor parameter is never read; it is omitted
/// here.
pub struct RetaddrData {
    pub code: Rc<crate::opcode::CodeObject>,
    pub env: Environment,
    pub caller: Option<Function>,
    pub pc: usize,
}

#[derive(Clone)]
pub struct Retaddr(pub Rc<RetaddrData>);

/// Reification of a heap object kind, used by `type-of` and by `CHKTYPE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeTag {
    Bool,
    Character,
    EmptyList,
    Fixnum,
    Close,
    Eof,
    Undef,
    Environment,
    Exception,
    Function,
    Float,
    InputPort,
    OutputPort,
    Opcode,
    Package,
    Pair,
    Primitive,
    Retaddr,
    String,
    Symbol,
    Type,
    Vector,
}

impl TypeTag {
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Bool => "bool",
            TypeTag::Character => "character",
            TypeTag::EmptyList => "empty-list",
            TypeTag::Fixnum => "fixnum",
            TypeTag::Close => "tclose",
            TypeTag::Eof => "teof",
            TypeTag::Undef => "tundef",
            TypeTag::Environment => "environment",
            TypeTag::Exception => "exception",
            TypeTag::Function => "function",
            TypeTag::Float => "float",
            TypeTag::InputPort => "input-file",
            TypeTag::OutputPort => "output-file",
            TypeTag::Opcode => "opcode",
            TypeTag::Package => "package",
            TypeTag::Pair => "pair",
            TypeTag::Primitive => "primitive-function",
            TypeTag::Retaddr => "retaddr",
            TypeTag::String => "string",
            TypeTag::Symbol => "symbol",
            TypeTag::Type => "type",
            TypeTag::Vector => "vector",
        }
    }
}

/// A growable vector with a separate "last used index" so `vector-push`/
/// `vector-pop` are O(1) without resizing the backing buffer on every call;
/// `vector-push-extend` may grow the backing buffer.
pub struct VectorData {
    pub items: RefCell<Vec<Value>>,
    pub last: RefCell<i64>, // -1 when empty, matching `vector_last`
}

#[derive(Clone)]
pub struct LispVector(pub Rc<VectorData>);

impl LispVector {
    pub fn new(len: usize) -> Self {
        LispVector(Rc::new(VectorData {
            items: RefCell::new(vec![Value::Undefined; len]),
            last: RefCell::new(len as i64 - 1),
        }))
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        let last = values.len() as i64 - 1;
        LispVector(Rc::new(VectorData {
            items: RefCell::new(values),
            last: RefCell::new(last),
        }))
    }

    pub fn len(&self) -> usize {
        (*self.0.last.borrow() + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Option<Value> {
        self.0.items.borrow().get(i).cloned()
    }

    pub fn set(&self, i: usize, v: Value) -> bool {
        if let Some(slot) = self.0.items.borrow_mut().get_mut(i) {
            *slot = v;
            true
        } else {
            false
        }
    }

    pub fn push_extend(&self, v: Value) {
        let mut items = self.0.items.borrow_mut();
        let mut last = self.0.last.borrow_mut();
        *last += 1;
        if (*last as usize) < items.len() {
            items[*last as usize] = v;
        } else {
            items.push(v);
        }
    }

    pub fn pop(&self) -> Option<Value> {
        let mut last = self.0.last.borrow_mut();
        if *last < 0 {
            return None;
        }
        let v = self.0.items.borrow()[*last as usize].clone();
        *last -= 1;
        Some(v)
    }
}

impl PartialEq for LispVector {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// The exception heap kind: message, signalled flag, tag symbol, and an
/// accumulating backtrace of unwound functions/primitive names.
pub struct ExceptionData {
    pub message: String,
    pub flag: RefCell<bool>,
    pub tag: Symbol,
    pub backtrace: RefCell<Vec<String>>,
}

#[derive(Clone)]
pub struct LispException(pub Rc<ExceptionData>);

impl LispException {
    pub fn new(message: impl Into<String>, tag: Symbol) -> Self {
        LispException(Rc::new(ExceptionData {
            message: message.into(),
            flag: RefCell::new(true),
            tag,
            backtrace: RefCell::new(Vec::new()),
        }))
    }

    pub fn is_signalled(&self) -> bool {
        *self.0.flag.borrow()
    }

    pub fn clear_flag(&self) {
        *self.0.flag.borrow_mut() = false;
    }

    pub fn push_backtrace(&self, frame: impl Into<String>) {
        self.0.backtrace.borrow_mut().push(frame.into());
    }
}

impl PartialEq for LispException {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// A value: the tagged universe of §3. Immediate families (fixnum,
/// character, the boolean/empty-list/eof/undefined/close-paren
/// singletons) are represented as plain enum variants rather than
/// bit-packed machine words — the Design Notes explicitly sanction this
/// substitution ("a re-implementation may use a tagged union instead,
/// provided the semantics below hold"); heap kinds are `Rc`-backed so
/// pointer equality (`eq?`) is `Rc::ptr_eq` and cloning a `Value` is
/// always cheap.
#[derive(Clone)]
pub enum Value {
    Fixnum(i64),
    Character(u8),
    False,
    True,
    EmptyList,
    Eof,
    Undefined,
    /// Reader-internal sentinel for a lone `)` or `]`; never escapes the
    /// reader into compiled code, but must be distinguishable from every
    /// other value while it does.
    CloseParen,
    Float(Rc<f64>),
    Pair(Pair),
    Symbol(Symbol),
    Package(Package),
    Environment(Environment),
    Function(Function),
    Primitive(Primitive),
    Retaddr(Retaddr),
    String(Rc<String>),
    Vector(LispVector),
    Exception(LispException),
    Type(TypeTag),
    Opcode(Rc<Instr>),
    InputPort(crate::port::InputPort),
    OutputPort(crate::port::OutputPort),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::String(Rc::new(s.into()))
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::False)
    }

    pub fn boolean(b: bool) -> Value {
        if b {
            Value::True
        } else {
            Value::False
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Value::Pair(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::EmptyList)
    }

    pub fn is_fixnum(&self) -> bool {
        matches!(self, Value::Fixnum(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Fixnum(_) | Value::Float(_))
    }

    pub fn is_signalled_exception(&self) -> bool {
        matches!(self, Value::Exception(e) if e.is_signalled())
    }

    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::False | Value::True => TypeTag::Bool,
            Value::Character(_) => TypeTag::Character,
            Value::EmptyList => TypeTag::EmptyList,
            Value::Fixnum(_) => TypeTag::Fixnum,
            Value::CloseParen => TypeTag::Close,
            Value::Eof => TypeTag::Eof,
            Value::Undefined => TypeTag::Undef,
            Value::Environment(_) => TypeTag::Environment,
            Value::Exception(_) => TypeTag::Exception,
            Value::Function(_) => TypeTag::Function,
            Value::Float(_) => TypeTag::Float,
            Value::InputPort(_) => TypeTag::InputPort,
            Value::OutputPort(_) => TypeTag::OutputPort,
            Value::Opcode(_) => TypeTag::Opcode,
            Value::Package(_) => TypeTag::Package,
            Value::Pair(_) => TypeTag::Pair,
            Value::Primitive(_) => TypeTag::Primitive,
            Value::Retaddr(_) => TypeTag::Retaddr,
            Value::String(_) => TypeTag::String,
            Value::Symbol(_) => TypeTag::Symbol,
            Value::Type(_) => TypeTag::Type,
            Value::Vector(_) => TypeTag::Vector,
        }
    }

    pub fn type_name(&self) -> String {
        self.type_tag().name().to_string()
    }

    /// `eq?`: pointer/word identity. Fixnums, characters and singletons
    /// compare equal iff they encode the same word; heap values compare
    /// equal iff they are the same object.
    pub fn eq_identity(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Fixnum(a), Value::Fixnum(b)) => a == b,
            (Value::Character(a), Value::Character(b)) => a == b,
            (Value::False, Value::False) => true,
            (Value::True, Value::True) => true,
            (Value::EmptyList, Value::EmptyList) => true,
            (Value::Eof, Value::Eof) => true,
            (Value::Undefined, Value::Undefined) => true,
            (Value::CloseParen, Value::CloseParen) => true,
            (Value::Float(a), Value::Float(b)) => Rc::ptr_eq(a, b),
            (Value::Pair(a), Value::Pair(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Package(a), Value::Package(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Primitive(a), Value::Primitive(b)) => a == b,
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::Vector(a), Value::Vector(b)) => a == b,
            (Value::Exception(a), Value::Exception(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            _ => false,
        }
    }

    /// `equal?`: structural equality, recursing into pairs, vectors and
    /// strings; falls back to `eq_identity` for atoms.
    pub fn equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Pair(a), Value::Pair(b)) => {
                a.head().equal(&b.head()) && a.tail().equal(&b.tail())
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Vector(a), Value::Vector(b)) => {
                a.len() == b.len()
                    && (0..a.len()).all(|i| a.get(i).unwrap().equal(&b.get(i).unwrap()))
            }
            (Value::Float(a), Value::Float(b)) => a == b,
            _ => self.eq_identity(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::writer::write_to_string(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixnum_eq_identity_by_value() {
        assert!(Value::Fixnum(3).eq_identity(&Value::Fixnum(3)));
        assert!(!Value::Fixnum(3).eq_identity(&Value::Fixnum(4)));
    }

    #[test]
    fn pairs_compare_structurally_under_equal() {
        let a = Value::Pair(Pair::new(Value::Fixnum(1), Value::EmptyList));
        let b = Value::Pair(Pair::new(Value::Fixnum(1), Value::EmptyList));
        assert!(a.equal(&b));
        assert!(!a.eq_identity(&b));
    }

    #[test]
    fn symbols_are_unique_by_identity_not_name() {
        let pkg = Package::new("Test");
        let s1 = pkg.find_or_create_symbol("foo");
        let s2 = pkg.find_or_create_symbol("foo");
        assert_eq!(s1, s2);
        let s3 = Symbol::new("foo");
        assert_ne!(s1, s3);
    }

    #[test]
    fn empty_list_is_not_a_pair() {
        assert!(!Value::EmptyList.is_pair());
        assert!(Value::EmptyList.is_null());
    }

    #[test]
    fn vector_push_pop_uses_last_index() {
        let v = LispVector::new(0);
        assert!(v.is_empty());
        v.push_extend(Value::Fixnum(1));
        v.push_extend(Value::Fixnum(2));
        assert_eq!(v.len(), 2);
        assert!(matches!(v.pop(), Some(Value::Fixnum(2))));
        assert_eq!(v.len(), 1);
    }
}
