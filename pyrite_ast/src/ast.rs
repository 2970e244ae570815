//! AST node definitions.
//!
//! The node surface is the Python 2 statement set (`print` and `exec`
//! statements, backtick repr, split try/except and try/finally). Struct
//! variants keep construction sites readable and pattern matches exhaustive.

use pyrite_core::{InternedString, Span};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Identity of an AST node within one compilation.
///
/// Stands in for the node's address: unique per [`NodeIdGen`], never
/// reused while the tree is alive. Temporary names are derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Allocator for [`NodeId`]s.
///
/// One generator serves a whole compilation: the parser draws ids from it
/// while building the input tree, and the lowering pass continues drawing
/// from the same generator for the nodes it synthesizes. Not thread-safe;
/// a compilation unit is lowered by one thread.
#[derive(Debug, Default)]
pub struct NodeIdGen {
    next: Cell<u32>,
}

impl NodeIdGen {
    /// Create a generator starting at id 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id.
    #[inline]
    pub fn fresh(&self) -> NodeId {
        let id = self.next.get();
        self.next.set(id.checked_add(1).expect("node id overflow"));
        NodeId(id)
    }
}

/// The syntactic role a name-like expression appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprContext {
    /// The expression is read.
    Load,
    /// The expression is assigned to.
    Store,
    /// The expression is a `del` target.
    Del,
    /// The expression is a formal parameter.
    Param,
}

/// Binary operators (also used for augmented assignment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mult,
    /// `/`
    Div,
    /// `//`
    FloorDiv,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `<<`
    LShift,
    /// `>>`
    RShift,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&`
    BitAnd,
}

impl BinOp {
    /// The operator's surface syntax.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `~`
    Invert,
    /// `not`
    Not,
    /// `+`
    UAdd,
    /// `-`
    USub,
}

impl UnaryOp {
    /// The operator's surface syntax.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Invert => "~",
            Self::Not => "not ",
            Self::UAdd => "+",
            Self::USub => "-",
        }
    }
}

/// Short-circuit boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOpKind {
    /// `and`
    And,
    /// `or`
    Or,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtE,
    /// `>`
    Gt,
    /// `>=`
    GtE,
    /// `is`
    Is,
    /// `is not`
    IsNot,
    /// `in`
    In,
    /// `not in`
    NotIn,
}

impl CmpOp {
    /// The operator's surface syntax.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}

/// A numeric literal value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// An integer literal.
    Int(i64),
    /// A float literal.
    Float(f64),
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// An expression node.
#[derive(Debug, Clone)]
pub struct Expr {
    /// Node identity.
    pub id: NodeId,
    /// Source location.
    pub span: Span,
    /// What kind of expression this is.
    pub kind: ExprKind,
}

impl Expr {
    /// Create a new expression node with a fresh id.
    #[must_use]
    pub fn new(ids: &NodeIdGen, kind: ExprKind, span: Span) -> Self {
        Self {
            id: ids.fresh(),
            span,
            kind,
        }
    }
}

/// A keyword argument at a call site.
#[derive(Debug, Clone)]
pub struct Keyword {
    /// Argument name.
    pub name: InternedString,
    /// Argument value.
    pub value: Expr,
}

/// One `for ... in ... [if ...]` clause of a comprehension.
#[derive(Debug, Clone)]
pub struct Comprehension {
    /// Node identity (seeds per-clause iterator temporaries).
    pub id: NodeId,
    /// The assignment target of the clause.
    pub target: Expr,
    /// The iterable.
    pub iter: Expr,
    /// Filter conditions, applied in order.
    pub ifs: Vec<Expr>,
}

/// Formal parameter list of a function or lambda.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    /// Positional parameters (names in `Param` context).
    pub args: Vec<Expr>,
    /// Default expressions for the trailing parameters.
    pub defaults: Vec<Expr>,
    /// `*args` name, if present.
    pub vararg: Option<InternedString>,
    /// `**kwargs` name, if present.
    pub kwarg: Option<InternedString>,
}

/// A lambda expression payload.
#[derive(Debug, Clone)]
pub struct Lambda {
    /// Parameter list.
    pub args: Arguments,
    /// The body expression (not lowered by the CFG pass).
    pub body: Expr,
}

/// Expression kinds.
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// An identifier reference.
    Name {
        /// The identifier.
        sym: InternedString,
        /// Load / store / del / param.
        ctx: ExprContext,
    },
    /// A numeric literal.
    Num(Number),
    /// A string literal.
    Str(std::sync::Arc<str>),
    /// Attribute access `value.attr`.
    Attribute {
        /// The object.
        value: Box<Expr>,
        /// The attribute name (unmangled).
        attr: InternedString,
        /// Load / store / del.
        ctx: ExprContext,
    },
    /// Subscript `value[slice]`.
    Subscript {
        /// The object.
        value: Box<Expr>,
        /// An `Index` or `Slice` expression.
        slice: Box<Expr>,
        /// Load / store / del.
        ctx: ExprContext,
    },
    /// A plain subscript index wrapper.
    Index {
        /// The index expression.
        value: Box<Expr>,
    },
    /// An extended slice `lower:upper:step`.
    Slice {
        /// Lower bound.
        lower: Option<Box<Expr>>,
        /// Upper bound.
        upper: Option<Box<Expr>>,
        /// Step.
        step: Option<Box<Expr>>,
    },
    /// A binary operation.
    BinOp {
        /// The operator.
        op: BinOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// A unary operation.
    UnaryOp {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
    },
    /// Short-circuit `and` / `or` over two or more values.
    BoolOp {
        /// `and` or `or`.
        op: BoolOpKind,
        /// The operand chain.
        values: Vec<Expr>,
    },
    /// A (possibly chained) comparison.
    Compare {
        /// Leftmost operand.
        left: Box<Expr>,
        /// Operators, one per comparison.
        ops: Vec<CmpOp>,
        /// Right-hand operands, parallel to `ops`.
        comparators: Vec<Expr>,
    },
    /// A call.
    Call {
        /// The callee.
        func: Box<Expr>,
        /// Positional arguments.
        args: Vec<Expr>,
        /// Keyword arguments.
        keywords: Vec<Keyword>,
        /// `*args` argument.
        starargs: Option<Box<Expr>>,
        /// `**kwargs` argument.
        kwargs: Option<Box<Expr>>,
    },
    /// A tuple display.
    Tuple {
        /// Elements.
        elts: Vec<Expr>,
        /// Load / store / del.
        ctx: ExprContext,
    },
    /// A list display.
    List {
        /// Elements.
        elts: Vec<Expr>,
        /// Load / store / del.
        ctx: ExprContext,
    },
    /// A set display.
    Set {
        /// Elements.
        elts: Vec<Expr>,
    },
    /// A dict display.
    Dict {
        /// Keys, parallel to `values`.
        keys: Vec<Expr>,
        /// Values.
        values: Vec<Expr>,
    },
    /// A conditional expression `body if test else orelse`.
    IfExp {
        /// The condition.
        test: Box<Expr>,
        /// Value when true.
        body: Box<Expr>,
        /// Value when false.
        orelse: Box<Expr>,
    },
    /// A list comprehension.
    ListComp {
        /// The element expression.
        elt: Box<Expr>,
        /// Generator clauses, outermost first.
        generators: Vec<Comprehension>,
    },
    /// A set comprehension.
    SetComp {
        /// The element expression.
        elt: Box<Expr>,
        /// Generator clauses, outermost first.
        generators: Vec<Comprehension>,
    },
    /// A dict comprehension.
    DictComp {
        /// The key expression.
        key: Box<Expr>,
        /// The value expression.
        value: Box<Expr>,
        /// Generator clauses, outermost first.
        generators: Vec<Comprehension>,
    },
    /// A generator expression.
    GeneratorExp {
        /// The element expression.
        elt: Box<Expr>,
        /// Generator clauses, outermost first.
        generators: Vec<Comprehension>,
    },
    /// A `yield` expression.
    Yield {
        /// The yielded value, if any.
        value: Option<Box<Expr>>,
    },
    /// A lambda. `Rc`-shared so the payload can be passed through the
    /// lowering without cloning the body.
    Lambda(Rc<Lambda>),
    /// Backtick repr `` `value` ``.
    Repr {
        /// The expression to repr.
        value: Box<Expr>,
    },
}

/// A statement node.
#[derive(Debug, Clone)]
pub struct Stmt {
    /// Node identity.
    pub id: NodeId,
    /// Source location.
    pub span: Span,
    /// What kind of statement this is.
    pub kind: StmtKind,
}

impl Stmt {
    /// Create a new statement node with a fresh id.
    #[must_use]
    pub fn new(ids: &NodeIdGen, kind: StmtKind, span: Span) -> Self {
        Self {
            id: ids.fresh(),
            span,
            kind,
        }
    }
}

/// A function definition payload.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    /// The function name.
    pub name: InternedString,
    /// Parameter list.
    pub args: Arguments,
    /// The body (not lowered by the CFG pass; it gets its own CFG later).
    pub body: Vec<Stmt>,
    /// Decorators, outermost first.
    pub decorators: Vec<Expr>,
}

/// A class definition payload.
#[derive(Debug, Clone)]
pub struct ClassDef {
    /// The class name.
    pub name: InternedString,
    /// Base class expressions.
    pub bases: Vec<Expr>,
    /// The body (not lowered by the CFG pass).
    pub body: Vec<Stmt>,
    /// Decorators, outermost first.
    pub decorators: Vec<Expr>,
}

/// One `except` clause of a try/except statement.
#[derive(Debug, Clone)]
pub struct ExceptHandler {
    /// Source location.
    pub span: Span,
    /// The exception type to match; `None` for a bare `except:`.
    pub exc_type: Option<Expr>,
    /// The target binding the caught exception, if any.
    pub name: Option<Expr>,
    /// The clause body.
    pub body: Vec<Stmt>,
}

/// One name binding in an import statement.
#[derive(Debug, Clone)]
pub struct Alias {
    /// Node identity (seeds the per-alias import temporary).
    pub id: NodeId,
    /// The imported (possibly dotted) name.
    pub name: InternedString,
    /// The `as` binding, if any.
    pub asname: Option<InternedString>,
}

/// Statement kinds.
#[derive(Debug, Clone)]
pub enum StmtKind {
    /// A function definition.
    FunctionDef(Rc<FunctionDef>),
    /// A class definition.
    ClassDef(Rc<ClassDef>),
    /// `return [value]`.
    Return {
        /// The returned value, if any.
        value: Option<Expr>,
    },
    /// `del target, ...`.
    Delete {
        /// Deletion targets.
        targets: Vec<Expr>,
    },
    /// `target = ... = value`.
    Assign {
        /// Assignment targets, left to right.
        targets: Vec<Expr>,
        /// The assigned value.
        value: Expr,
    },
    /// `target op= value`.
    AugAssign {
        /// The augmented target.
        target: Expr,
        /// The operator.
        op: BinOp,
        /// The right-hand side.
        value: Expr,
    },
    /// A `print` statement.
    Print {
        /// `>> dest`, if present.
        dest: Option<Expr>,
        /// The printed values.
        values: Vec<Expr>,
        /// Whether a trailing newline is emitted.
        newline: bool,
    },
    /// A `for` loop.
    For {
        /// The loop target.
        target: Expr,
        /// The iterable.
        iter: Expr,
        /// The loop body.
        body: Vec<Stmt>,
        /// The `else` clause.
        orelse: Vec<Stmt>,
    },
    /// A `while` loop.
    While {
        /// The loop condition.
        test: Expr,
        /// The loop body.
        body: Vec<Stmt>,
        /// The `else` clause.
        orelse: Vec<Stmt>,
    },
    /// An `if` statement.
    If {
        /// The condition.
        test: Expr,
        /// The true branch.
        body: Vec<Stmt>,
        /// The false branch (possibly an elif chain).
        orelse: Vec<Stmt>,
    },
    /// A `with` statement (single context manager).
    With {
        /// The context manager expression.
        context_expr: Expr,
        /// The `as` target, if any.
        optional_vars: Option<Expr>,
        /// The body.
        body: Vec<Stmt>,
    },
    /// `raise [type[, value[, traceback]]]`.
    Raise {
        /// The exception type.
        exc_type: Option<Expr>,
        /// The exception value.
        value: Option<Expr>,
        /// The traceback.
        traceback: Option<Expr>,
    },
    /// `try` / `except` (with optional `else`).
    TryExcept {
        /// The protected body.
        body: Vec<Stmt>,
        /// The handler clauses, in order.
        handlers: Vec<ExceptHandler>,
        /// The `else` clause.
        orelse: Vec<Stmt>,
    },
    /// `try` / `finally`.
    TryFinally {
        /// The protected body.
        body: Vec<Stmt>,
        /// The cleanup body.
        finalbody: Vec<Stmt>,
    },
    /// `assert test[, msg]`.
    Assert {
        /// The asserted condition.
        test: Expr,
        /// The failure message, if any.
        msg: Option<Expr>,
    },
    /// `import name [as alias], ...`.
    Import {
        /// The imported names.
        names: Vec<Alias>,
    },
    /// `from module import name [as alias], ...`.
    ImportFrom {
        /// The source module.
        module: InternedString,
        /// The imported names (`*` allowed).
        names: Vec<Alias>,
        /// Relative-import level (number of leading dots).
        level: u32,
    },
    /// An `exec` statement.
    Exec {
        /// The code object / string.
        body: Expr,
        /// The globals mapping, if given.
        globals: Option<Expr>,
        /// The locals mapping, if given.
        locals: Option<Expr>,
    },
    /// A `global` declaration.
    Global {
        /// The declared names.
        names: Vec<InternedString>,
    },
    /// An expression evaluated for effect.
    Expr {
        /// The expression.
        value: Expr,
    },
    /// `pass`.
    Pass,
    /// `break`.
    Break,
    /// `continue`.
    Continue,
}
