//! The lowered statement and expression forms.
//!
//! After lowering, every operand position holds a *primitive* (a name
//! reference, a numeric literal, or a string literal), and composite
//! expressions appear only as the right-hand side of an assignment (or as
//! the value of an expression statement). The types here enforce most of
//! that shape statically: composite kinds take [`Operand`] children, so a
//! nested composite cannot be represented at all.
//!
//! One sanctioned exception: a call's callee may be an attribute load
//! ([`Callee::Attr`]), so that method calls survive lowering as a single
//! expression.

use crate::graph::{BlockRef, Cfg};
use pyrite_ast::ast::{self, BinOp, CmpOp, NodeId, NodeIdGen, Number, UnaryOp};
use pyrite_core::{InternedString, Span};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// A name reference.
#[derive(Debug, Clone)]
pub struct NameRef {
    /// Node identity.
    pub id: NodeId,
    /// Source location.
    pub span: Span,
    /// The referenced identifier.
    pub sym: InternedString,
}

impl NameRef {
    /// Whether this is a generated temporary (or the `#rtnval` slot).
    #[inline]
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.sym.is_temporary()
    }
}

/// A numeric literal.
#[derive(Debug, Clone)]
pub struct NumLit {
    /// Node identity.
    pub id: NodeId,
    /// Source location.
    pub span: Span,
    /// The literal value.
    pub value: Number,
}

/// A string literal.
#[derive(Debug, Clone)]
pub struct StrLit {
    /// Node identity.
    pub id: NodeId,
    /// Source location.
    pub span: Span,
    /// The literal content.
    pub value: Arc<str>,
}

/// A primitive operand: the only expression forms allowed as children of
/// statements and composites after lowering.
#[derive(Debug, Clone)]
pub enum Operand {
    /// A name reference.
    Name(NameRef),
    /// A numeric literal.
    Num(NumLit),
    /// A string literal.
    Str(StrLit),
}

impl Operand {
    /// The operand's node identity.
    #[must_use]
    pub fn id(&self) -> NodeId {
        match self {
            Self::Name(n) => n.id,
            Self::Num(n) => n.id,
            Self::Str(s) => s.id,
        }
    }

    /// The operand's source location.
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::Name(n) => n.span,
            Self::Num(n) => n.span,
            Self::Str(s) => s.span,
        }
    }

    /// Whether this is a load of a generated temporary.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Name(n) if n.is_temporary())
    }

    /// Structurally duplicate this operand under a fresh node id.
    ///
    /// Later phases require every node to appear at most once in the
    /// graph; when the same primitive is needed twice, it is duplicated
    /// rather than shared.
    #[must_use]
    pub fn duplicate(&self, ids: &NodeIdGen) -> Operand {
        match self {
            Self::Name(n) => Self::Name(NameRef {
                id: ids.fresh(),
                span: n.span,
                sym: n.sym.clone(),
            }),
            Self::Num(n) => Self::Num(NumLit {
                id: ids.fresh(),
                span: n.span,
                value: n.value,
            }),
            Self::Str(s) => Self::Str(StrLit {
                id: ids.fresh(),
                span: s.span,
                value: s.value.clone(),
            }),
        }
    }

    fn visit_ids(&self, f: &mut impl FnMut(NodeId)) {
        f(self.id());
    }
}

/// The callee of a lowered call.
#[derive(Debug, Clone)]
pub enum Callee {
    /// An ordinary operand callee.
    Value(Operand),
    /// An attribute load fused into the call (`obj.method(...)`).
    Attr {
        /// Node identity of the attribute load.
        id: NodeId,
        /// Source location.
        span: Span,
        /// The object.
        value: Operand,
        /// The (mangled) attribute name.
        attr: InternedString,
        /// Whether lookup skips the instance dict (internal protocol
        /// lookups such as `__hasnext__`).
        cls_only: bool,
    },
}

impl Callee {
    fn visit_ids(&self, f: &mut impl FnMut(NodeId)) {
        match self {
            Self::Value(v) => v.visit_ids(f),
            Self::Attr { id, value, .. } => {
                f(*id);
                value.visit_ids(f);
            }
        }
    }
}

/// A keyword argument of a lowered call.
#[derive(Debug, Clone)]
pub struct LowKeyword {
    /// The argument name.
    pub name: InternedString,
    /// The argument value.
    pub value: Operand,
}

/// The `tuple-or-None` second argument of `IMPORT_NAME`.
#[derive(Debug, Clone)]
pub enum ImportNames {
    /// A plain `import`: no from-list.
    None,
    /// A `from ... import ...`: the imported names.
    Names(Vec<StrLit>),
}

/// Language primitives emitted by the lowering pass and consumed by later
/// phases. Opaque here: the pass only constructs them.
#[derive(Debug, Clone)]
pub enum Primitive {
    /// Truthiness test.
    Nonzero(Operand),
    /// Iterator acquisition.
    GetIter(Operand),
    /// Module import. `level` is `-1` for implicit relative imports.
    ImportName {
        /// The import level.
        level: i64,
        /// The from-list, or none for a plain import.
        names: ImportNames,
        /// The (dotted) module name.
        module: StrLit,
    },
    /// Fetch one name from an imported module.
    ImportFrom {
        /// The module object.
        module: Operand,
        /// The fetched name.
        name: StrLit,
    },
    /// `from module import *`.
    ImportStar {
        /// The module object.
        module: Operand,
    },
    /// Materialize the in-flight exception as a (type, value, traceback)
    /// triple. The first statement of every exception landing block.
    LandingPad,
    /// Publish the caught exception as the current exception info.
    SetExcInfo {
        /// The exception type.
        exc_type: Operand,
        /// The exception value.
        value: Operand,
        /// The traceback.
        traceback: Operand,
    },
    /// Invalidate cached exception info (emitted after every yield).
    UncacheExcInfo,
    /// Exception-clause type test.
    IsInstance {
        /// The tested object.
        value: Operand,
        /// The candidate class.
        class: Operand,
        /// Return false (rather than raising) on a non-class candidate.
        false_on_non_class: bool,
    },
    /// The local-variable dictionary (class-body epilogue).
    Locals,
}

impl Primitive {
    fn visit_ids(&self, f: &mut impl FnMut(NodeId)) {
        match self {
            Self::Nonzero(x) | Self::GetIter(x) | Self::ImportStar { module: x } => x.visit_ids(f),
            Self::ImportName { names, module, .. } => {
                if let ImportNames::Names(names) = names {
                    for n in names {
                        f(n.id);
                    }
                }
                f(module.id);
            }
            Self::ImportFrom { module, name } => {
                module.visit_ids(f);
                f(name.id);
            }
            Self::SetExcInfo {
                exc_type,
                value,
                traceback,
            } => {
                exc_type.visit_ids(f);
                value.visit_ids(f);
                traceback.visit_ids(f);
            }
            Self::IsInstance { value, class, .. } => {
                value.visit_ids(f);
                class.visit_ids(f);
            }
            Self::LandingPad | Self::UncacheExcInfo | Self::Locals => {}
        }
    }
}

/// A composite (non-primitive) lowered expression. Appears only as the
/// right-hand side of an assignment or the value of an expression
/// statement.
#[derive(Debug, Clone)]
pub enum CompositeKind {
    /// A binary operation.
    BinOp {
        /// The operator.
        op: BinOp,
        /// Left operand.
        left: Operand,
        /// Right operand.
        right: Operand,
    },
    /// The binary operation of an augmented assignment (may dispatch to
    /// the in-place dunder at runtime).
    AugBinOp {
        /// The operator.
        op: BinOp,
        /// Left operand.
        left: Operand,
        /// Right operand.
        right: Operand,
    },
    /// A unary operation.
    UnaryOp {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Operand,
    },
    /// A single two-operand comparison (chains are decomposed).
    Compare {
        /// The operator.
        op: CmpOp,
        /// Left operand.
        left: Operand,
        /// Right operand.
        right: Operand,
    },
    /// A call.
    Call {
        /// The callee.
        func: Callee,
        /// Positional arguments.
        args: Vec<Operand>,
        /// Keyword arguments.
        keywords: Vec<LowKeyword>,
        /// `*args`, if present.
        starargs: Option<Operand>,
        /// `**kwargs`, if present.
        kwargs: Option<Operand>,
    },
    /// An attribute load.
    Attribute {
        /// The object.
        value: Operand,
        /// The (mangled) attribute name.
        attr: InternedString,
        /// Class-only lookup (see [`Callee::Attr`]).
        cls_only: bool,
    },
    /// A subscript load.
    Subscript {
        /// The object.
        value: Operand,
        /// The index or slice-object operand.
        slice: Operand,
    },
    /// A tuple display.
    Tuple(Vec<Operand>),
    /// A list display.
    List(Vec<Operand>),
    /// A set display.
    Set(Vec<Operand>),
    /// A dict display.
    Dict {
        /// Keys, parallel to `values`.
        keys: Vec<Operand>,
        /// Values.
        values: Vec<Operand>,
    },
    /// A slice object `lower:upper:step`.
    Slice {
        /// Lower bound.
        lower: Option<Operand>,
        /// Upper bound.
        upper: Option<Operand>,
        /// Step.
        step: Option<Operand>,
    },
    /// Backtick repr.
    Repr(Operand),
    /// A yield point; the lowered form is always `#tmp = yield x`.
    Yield(Option<Operand>),
    /// A lambda, passed through for later compilation with its default
    /// expressions already evaluated in the enclosing scope.
    Lambda {
        /// The original lambda payload.
        node: Rc<ast::Lambda>,
        /// The remapped default operands.
        defaults: Vec<Operand>,
    },
    /// A language primitive.
    Primitive(Primitive),
}

impl CompositeKind {
    fn visit_ids(&self, f: &mut impl FnMut(NodeId)) {
        match self {
            Self::BinOp { left, right, .. }
            | Self::AugBinOp { left, right, .. }
            | Self::Compare { left, right, .. } => {
                left.visit_ids(f);
                right.visit_ids(f);
            }
            Self::UnaryOp { operand, .. } | Self::Repr(operand) => operand.visit_ids(f),
            Self::Call {
                func,
                args,
                keywords,
                starargs,
                kwargs,
            } => {
                func.visit_ids(f);
                for a in args {
                    a.visit_ids(f);
                }
                for k in keywords {
                    k.value.visit_ids(f);
                }
                if let Some(s) = starargs {
                    s.visit_ids(f);
                }
                if let Some(k) = kwargs {
                    k.visit_ids(f);
                }
            }
            Self::Attribute { value, .. } => value.visit_ids(f),
            Self::Subscript { value, slice } => {
                value.visit_ids(f);
                slice.visit_ids(f);
            }
            Self::Tuple(elts) | Self::List(elts) | Self::Set(elts) => {
                for e in elts {
                    e.visit_ids(f);
                }
            }
            Self::Dict { keys, values } => {
                for k in keys {
                    k.visit_ids(f);
                }
                for v in values {
                    v.visit_ids(f);
                }
            }
            Self::Slice { lower, upper, step } => {
                for part in [lower, upper, step].into_iter().flatten() {
                    part.visit_ids(f);
                }
            }
            Self::Yield(value) => {
                if let Some(v) = value {
                    v.visit_ids(f);
                }
            }
            Self::Lambda { defaults, .. } => {
                for d in defaults {
                    d.visit_ids(f);
                }
            }
            Self::Primitive(p) => p.visit_ids(f),
        }
    }
}

/// A lowered expression: either a primitive operand or a single composite.
#[derive(Debug, Clone)]
pub enum LowExpr {
    /// A primitive operand.
    Prim(Operand),
    /// A freshly allocated composite.
    Composite {
        /// Node identity.
        id: NodeId,
        /// Source location.
        span: Span,
        /// The composite form.
        kind: CompositeKind,
    },
}

impl LowExpr {
    /// The expression's node identity.
    #[must_use]
    pub fn id(&self) -> NodeId {
        match self {
            Self::Prim(op) => op.id(),
            Self::Composite { id, .. } => *id,
        }
    }

    /// The expression's source location.
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::Prim(op) => op.span(),
            Self::Composite { span, .. } => *span,
        }
    }

    fn visit_ids(&self, f: &mut impl FnMut(NodeId)) {
        match self {
            Self::Prim(op) => op.visit_ids(f),
            Self::Composite { id, kind, .. } => {
                f(*id);
                kind.visit_ids(f);
            }
        }
    }
}

/// An assignment target after lowering.
#[derive(Debug, Clone)]
pub enum Target {
    /// A plain name.
    Name(NameRef),
    /// An attribute store; the object is already a primitive.
    Attribute {
        /// Node identity.
        id: NodeId,
        /// Source location.
        span: Span,
        /// The object.
        value: Operand,
        /// The (mangled) attribute name.
        attr: InternedString,
    },
    /// A subscript store; object and index are already primitives.
    Subscript {
        /// Node identity.
        id: NodeId,
        /// Source location.
        span: Span,
        /// The object.
        value: Operand,
        /// The index or slice-object operand.
        slice: Operand,
    },
    /// Destructuring into per-element temporaries (recursively assigned
    /// afterwards). Also carries the exception triple of a landing pad.
    Tuple {
        /// Node identity.
        id: NodeId,
        /// Source location.
        span: Span,
        /// The element names (always generated temporaries).
        elts: Vec<NameRef>,
    },
}

impl Target {
    fn visit_ids(&self, f: &mut impl FnMut(NodeId)) {
        match self {
            Self::Name(n) => f(n.id),
            Self::Attribute { id, value, .. } => {
                f(*id);
                value.visit_ids(f);
            }
            Self::Subscript { id, value, slice, .. } => {
                f(*id);
                value.visit_ids(f);
                slice.visit_ids(f);
            }
            Self::Tuple { id, elts, .. } => {
                f(*id);
                for e in elts {
                    f(e.id);
                }
            }
        }
    }
}

/// A deletion target after lowering.
#[derive(Debug, Clone)]
pub enum DelTarget {
    /// `del name`.
    Name(NameRef),
    /// `del obj.attr`.
    Attribute {
        /// Node identity.
        id: NodeId,
        /// Source location.
        span: Span,
        /// The object.
        value: Operand,
        /// The (mangled) attribute name.
        attr: InternedString,
    },
    /// `del obj[index]`.
    Subscript {
        /// Node identity.
        id: NodeId,
        /// Source location.
        span: Span,
        /// The object.
        value: Operand,
        /// The index or slice-object operand.
        slice: Operand,
    },
}

impl DelTarget {
    fn visit_ids(&self, f: &mut impl FnMut(NodeId)) {
        match self {
            Self::Name(n) => f(n.id),
            Self::Attribute { id, value, .. } => {
                f(*id);
                value.visit_ids(f);
            }
            Self::Subscript { id, value, slice, .. } => {
                f(*id);
                value.visit_ids(f);
                slice.visit_ids(f);
            }
        }
    }
}

/// A lowered statement.
#[derive(Debug, Clone)]
pub struct LowStmt {
    /// Node identity.
    pub id: NodeId,
    /// Source location.
    pub span: Span,
    /// What kind of statement this is.
    pub kind: LowStmtKind,
}

/// Lowered statement kinds.
#[derive(Debug, Clone)]
pub enum LowStmtKind {
    /// A single-target assignment.
    Assign {
        /// The target.
        target: Target,
        /// The right-hand side.
        value: LowExpr,
    },
    /// An expression evaluated for effect.
    Expr {
        /// The expression.
        value: LowExpr,
    },
    /// An unconditional jump (terminator).
    Jump {
        /// The jump target.
        target: BlockRef,
    },
    /// A conditional branch (terminator). The test is always a name or a
    /// numeric literal.
    Branch {
        /// The tested operand.
        test: Operand,
        /// Target when truthy.
        iftrue: BlockRef,
        /// Target when falsy.
        iffalse: BlockRef,
    },
    /// A return (terminator).
    Return {
        /// The returned value; `None` for the synthetic terminal return.
        value: Option<Operand>,
    },
    /// A raise (terminator).
    Raise {
        /// The exception type.
        exc_type: Option<Operand>,
        /// The exception value.
        value: Option<Operand>,
        /// The traceback.
        traceback: Option<Operand>,
    },
    /// A side-effecting statement wrapped with an explicit exception edge
    /// (terminator).
    Invoke {
        /// The wrapped statement.
        inner: Box<LowStmt>,
        /// Successor on normal completion.
        normal: BlockRef,
        /// Successor on exception (for a wrapped raise, equal to
        /// `normal`).
        exc: BlockRef,
    },
    /// A function definition, passed through with decorators and defaults
    /// already evaluated.
    FunctionDef {
        /// The original definition payload.
        node: Rc<ast::FunctionDef>,
        /// Remapped decorator operands, outermost first.
        decorators: Vec<Operand>,
        /// Remapped default operands.
        defaults: Vec<Operand>,
    },
    /// A class definition, passed through with decorators and bases
    /// already evaluated.
    ClassDef {
        /// The original definition payload.
        node: Rc<ast::ClassDef>,
        /// Remapped decorator operands, outermost first.
        decorators: Vec<Operand>,
        /// Remapped base-class operands.
        bases: Vec<Operand>,
    },
    /// A `global` declaration, passed through.
    Global {
        /// The declared names.
        names: Vec<InternedString>,
    },
    /// A single-target deletion.
    Delete {
        /// The target.
        target: DelTarget,
    },
    /// A `print` of at most one value.
    Print {
        /// `>> dest`, if present.
        dest: Option<Operand>,
        /// The printed value; `None` prints just the newline.
        value: Option<Operand>,
        /// Whether a trailing newline is emitted.
        newline: bool,
    },
    /// An always-failing assertion (the false arm of a lowered `assert`).
    Assert {
        /// The (always-zero) test operand.
        test: Operand,
        /// The failure message, if any.
        msg: Option<Operand>,
    },
}

impl LowStmt {
    /// Whether this statement transfers control.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            LowStmtKind::Jump { .. }
                | LowStmtKind::Branch { .. }
                | LowStmtKind::Return { .. }
                | LowStmtKind::Raise { .. }
                | LowStmtKind::Invoke { .. }
        )
    }

    /// Visit every node id in this statement, including nested operands
    /// and, for invokes, the wrapped statement.
    pub fn visit_ids(&self, f: &mut impl FnMut(NodeId)) {
        f(self.id);
        match &self.kind {
            LowStmtKind::Assign { target, value } => {
                target.visit_ids(f);
                value.visit_ids(f);
            }
            LowStmtKind::Expr { value } => value.visit_ids(f),
            LowStmtKind::Jump { .. } => {}
            LowStmtKind::Branch { test, .. } => test.visit_ids(f),
            LowStmtKind::Return { value } => {
                if let Some(v) = value {
                    v.visit_ids(f);
                }
            }
            LowStmtKind::Raise {
                exc_type,
                value,
                traceback,
            } => {
                for part in [exc_type, value, traceback].into_iter().flatten() {
                    part.visit_ids(f);
                }
            }
            LowStmtKind::Invoke { inner, .. } => inner.visit_ids(f),
            LowStmtKind::FunctionDef {
                decorators,
                defaults,
                ..
            } => {
                for d in decorators.iter().chain(defaults) {
                    d.visit_ids(f);
                }
            }
            LowStmtKind::ClassDef {
                decorators, bases, ..
            } => {
                for d in decorators.iter().chain(bases) {
                    d.visit_ids(f);
                }
            }
            LowStmtKind::Global { .. } => {}
            LowStmtKind::Delete { target } => target.visit_ids(f),
            LowStmtKind::Print { dest, value, .. } => {
                for part in [dest, value].into_iter().flatten() {
                    part.visit_ids(f);
                }
            }
            LowStmtKind::Assert { test, msg } => {
                test.visit_ids(f);
                if let Some(m) = msg {
                    m.visit_ids(f);
                }
            }
        }
    }

    /// Visit every operand position in this statement, including nested
    /// composites and, for invokes, the wrapped statement.
    pub fn visit_operands(&self, f: &mut impl FnMut(&Operand)) {
        fn expr(e: &LowExpr, f: &mut impl FnMut(&Operand)) {
            match e {
                LowExpr::Prim(op) => f(op),
                LowExpr::Composite { kind, .. } => composite(kind, f),
            }
        }

        fn callee(c: &Callee, f: &mut impl FnMut(&Operand)) {
            match c {
                Callee::Value(op) => f(op),
                Callee::Attr { value, .. } => f(value),
            }
        }

        fn primitive(p: &Primitive, f: &mut impl FnMut(&Operand)) {
            match p {
                Primitive::Nonzero(x)
                | Primitive::GetIter(x)
                | Primitive::ImportStar { module: x } => f(x),
                Primitive::ImportName { .. } => {}
                Primitive::ImportFrom { module, .. } => f(module),
                Primitive::SetExcInfo {
                    exc_type,
                    value,
                    traceback,
                } => {
                    f(exc_type);
                    f(value);
                    f(traceback);
                }
                Primitive::IsInstance { value, class, .. } => {
                    f(value);
                    f(class);
                }
                Primitive::LandingPad | Primitive::UncacheExcInfo | Primitive::Locals => {}
            }
        }

        fn composite(kind: &CompositeKind, f: &mut impl FnMut(&Operand)) {
            match kind {
                CompositeKind::BinOp { left, right, .. }
                | CompositeKind::AugBinOp { left, right, .. }
                | CompositeKind::Compare { left, right, .. } => {
                    f(left);
                    f(right);
                }
                CompositeKind::UnaryOp { operand, .. } | CompositeKind::Repr(operand) => f(operand),
                CompositeKind::Call {
                    func,
                    args,
                    keywords,
                    starargs,
                    kwargs,
                } => {
                    callee(func, f);
                    for a in args {
                        f(a);
                    }
                    for k in keywords {
                        f(&k.value);
                    }
                    if let Some(s) = starargs {
                        f(s);
                    }
                    if let Some(k) = kwargs {
                        f(k);
                    }
                }
                CompositeKind::Attribute { value, .. } => f(value),
                CompositeKind::Subscript { value, slice } => {
                    f(value);
                    f(slice);
                }
                CompositeKind::Tuple(elts)
                | CompositeKind::List(elts)
                | CompositeKind::Set(elts) => {
                    for e in elts {
                        f(e);
                    }
                }
                CompositeKind::Dict { keys, values } => {
                    for o in keys.iter().chain(values) {
                        f(o);
                    }
                }
                CompositeKind::Slice { lower, upper, step } => {
                    for o in [lower, upper, step].into_iter().flatten() {
                        f(o);
                    }
                }
                CompositeKind::Yield(value) => {
                    if let Some(v) = value {
                        f(v);
                    }
                }
                CompositeKind::Lambda { defaults, .. } => {
                    for d in defaults {
                        f(d);
                    }
                }
                CompositeKind::Primitive(p) => primitive(p, f),
            }
        }

        match &self.kind {
            LowStmtKind::Assign { target, value } => {
                match target {
                    Target::Attribute { value, .. } => f(value),
                    Target::Subscript { value, slice, .. } => {
                        f(value);
                        f(slice);
                    }
                    Target::Name(_) | Target::Tuple { .. } => {}
                }
                expr(value, f);
            }
            LowStmtKind::Expr { value } => expr(value, f),
            LowStmtKind::Jump { .. } | LowStmtKind::Global { .. } => {}
            LowStmtKind::Branch { test, .. } => f(test),
            LowStmtKind::Return { value } => {
                if let Some(v) = value {
                    f(v);
                }
            }
            LowStmtKind::Raise {
                exc_type,
                value,
                traceback,
            } => {
                for o in [exc_type, value, traceback].into_iter().flatten() {
                    f(o);
                }
            }
            LowStmtKind::Invoke { inner, .. } => inner.visit_operands(f),
            LowStmtKind::FunctionDef {
                decorators,
                defaults,
                ..
            } => {
                for o in decorators.iter().chain(defaults) {
                    f(o);
                }
            }
            LowStmtKind::ClassDef {
                decorators, bases, ..
            } => {
                for o in decorators.iter().chain(bases) {
                    f(o);
                }
            }
            LowStmtKind::Delete { target } => match target {
                DelTarget::Name(_) => {}
                DelTarget::Attribute { value, .. } => f(value),
                DelTarget::Subscript { value, slice, .. } => {
                    f(value);
                    f(slice);
                }
            },
            LowStmtKind::Print { dest, value, .. } => {
                for o in [dest, value].into_iter().flatten() {
                    f(o);
                }
            }
            LowStmtKind::Assert { test, msg } => {
                f(test);
                if let Some(m) = msg {
                    f(m);
                }
            }
        }
    }

    /// Pretty-print this statement; block targets are shown by index,
    /// which requires the owning graph.
    #[must_use]
    pub fn display<'a>(&'a self, cfg: &'a Cfg) -> StmtDisplay<'a> {
        StmtDisplay { stmt: self, cfg }
    }
}

// =============================================================================
// Pretty-printing
// =============================================================================

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(n) => write!(f, "{}", n.sym),
            Self::Num(n) => write!(f, "{}", n.value),
            Self::Str(s) => write!(f, "{:?}", &*s.value),
        }
    }
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Attr {
                value,
                attr,
                cls_only,
                ..
            } => write!(f, "{}{}{}", value, if *cls_only { ":" } else { "." }, attr),
        }
    }
}

fn fmt_operand_list(f: &mut fmt::Formatter<'_>, elts: &[Operand]) -> fmt::Result {
    for (i, e) in elts.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{e}")?;
    }
    Ok(())
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nonzero(x) => write!(f, "NONZERO({x})"),
            Self::GetIter(x) => write!(f, "GET_ITER({x})"),
            Self::ImportName {
                level,
                names,
                module,
            } => {
                write!(f, "IMPORT_NAME({level}, ")?;
                match names {
                    ImportNames::None => write!(f, "None")?,
                    ImportNames::Names(names) => {
                        write!(f, "(")?;
                        for (i, n) in names.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{:?}", &*n.value)?;
                        }
                        write!(f, ")")?;
                    }
                }
                write!(f, ", {:?})", &*module.value)
            }
            Self::ImportFrom { module, name } => {
                write!(f, "IMPORT_FROM({}, {:?})", module, &*name.value)
            }
            Self::ImportStar { module } => write!(f, "IMPORT_STAR({module})"),
            Self::LandingPad => write!(f, "LANDINGPAD()"),
            Self::SetExcInfo {
                exc_type,
                value,
                traceback,
            } => write!(f, "SET_EXC_INFO({exc_type}, {value}, {traceback})"),
            Self::UncacheExcInfo => write!(f, "UNCACHE_EXC_INFO()"),
            Self::IsInstance {
                value,
                class,
                false_on_non_class,
            } => write!(
                f,
                "ISINSTANCE({}, {}, {})",
                value,
                class,
                i32::from(*false_on_non_class)
            ),
            Self::Locals => write!(f, "LOCALS()"),
        }
    }
}

impl fmt::Display for CompositeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BinOp { op, left, right } => write!(f, "{} {} {}", left, op.symbol(), right),
            Self::AugBinOp { op, left, right } => write!(f, "{} {}= {}", left, op.symbol(), right),
            Self::UnaryOp { op, operand } => write!(f, "{}{}", op.symbol(), operand),
            Self::Compare { op, left, right } => write!(f, "{} {} {}", left, op.symbol(), right),
            Self::Call {
                func,
                args,
                keywords,
                starargs,
                kwargs,
            } => {
                write!(f, "{func}(")?;
                let mut first = true;
                for a in args {
                    if !first {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                    first = false;
                }
                for k in keywords {
                    if !first {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", k.name, k.value)?;
                    first = false;
                }
                if let Some(s) = starargs {
                    if !first {
                        write!(f, ", ")?;
                    }
                    write!(f, "*{s}")?;
                    first = false;
                }
                if let Some(k) = kwargs {
                    if !first {
                        write!(f, ", ")?;
                    }
                    write!(f, "**{k}")?;
                }
                write!(f, ")")
            }
            Self::Attribute {
                value,
                attr,
                cls_only,
            } => write!(f, "{}{}{}", value, if *cls_only { ":" } else { "." }, attr),
            Self::Subscript { value, slice } => write!(f, "{value}[{slice}]"),
            Self::Tuple(elts) => {
                write!(f, "(")?;
                fmt_operand_list(f, elts)?;
                write!(f, ")")
            }
            Self::List(elts) => {
                write!(f, "[")?;
                fmt_operand_list(f, elts)?;
                write!(f, "]")
            }
            Self::Set(elts) => {
                write!(f, "{{")?;
                fmt_operand_list(f, elts)?;
                write!(f, "}}")
            }
            Self::Dict { keys, values } => {
                write!(f, "{{")?;
                for (i, (k, v)) in keys.iter().zip(values).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Self::Slice { lower, upper, step } => {
                if let Some(l) = lower {
                    write!(f, "{l}")?;
                }
                write!(f, ":")?;
                if let Some(u) = upper {
                    write!(f, "{u}")?;
                }
                if let Some(s) = step {
                    write!(f, ":{s}")?;
                }
                Ok(())
            }
            Self::Repr(v) => write!(f, "`{v}`"),
            Self::Yield(Some(v)) => write!(f, "yield {v}"),
            Self::Yield(None) => write!(f, "yield"),
            Self::Lambda { node, .. } => write!(f, "<lambda ({} args)>", node.args.args.len()),
            Self::Primitive(p) => write!(f, "{p}"),
        }
    }
}

impl fmt::Display for LowExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prim(op) => write!(f, "{op}"),
            Self::Composite { kind, .. } => write!(f, "{kind}"),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(n) => write!(f, "{}", n.sym),
            Self::Attribute { value, attr, .. } => write!(f, "{value}.{attr}"),
            Self::Subscript { value, slice, .. } => write!(f, "{value}[{slice}]"),
            Self::Tuple { elts, .. } => {
                write!(f, "(")?;
                for (i, e) in elts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e.sym)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for DelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(n) => write!(f, "{}", n.sym),
            Self::Attribute { value, attr, .. } => write!(f, "{value}.{attr}"),
            Self::Subscript { value, slice, .. } => write!(f, "{value}[{slice}]"),
        }
    }
}

/// Pretty-printer for a statement inside a particular graph.
pub struct StmtDisplay<'a> {
    stmt: &'a LowStmt,
    cfg: &'a Cfg,
}

impl StmtDisplay<'_> {
    fn block_idx(&self, r: BlockRef) -> String {
        let idx = self.cfg.block(r).idx();
        if idx < 0 {
            String::from("?")
        } else {
            idx.to_string()
        }
    }
}

impl fmt::Display for StmtDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.stmt.kind {
            LowStmtKind::Assign { target, value } => write!(f, "{target} = {value}"),
            LowStmtKind::Expr { value } => write!(f, "{value}"),
            LowStmtKind::Jump { target } => write!(f, "jump {}", self.block_idx(*target)),
            LowStmtKind::Branch {
                test,
                iftrue,
                iffalse,
            } => write!(
                f,
                "if {} goto {} else goto {}",
                test,
                self.block_idx(*iftrue),
                self.block_idx(*iffalse)
            ),
            LowStmtKind::Return { value: Some(v) } => write!(f, "return {v}"),
            LowStmtKind::Return { value: None } => write!(f, "return"),
            LowStmtKind::Raise {
                exc_type,
                value,
                traceback,
            } => {
                write!(f, "raise")?;
                let mut sep = " ";
                for part in [exc_type, value, traceback].into_iter().flatten() {
                    write!(f, "{sep}{part}")?;
                    sep = ", ";
                }
                Ok(())
            }
            LowStmtKind::Invoke { inner, normal, exc } => write!(
                f,
                "invoke {} [normal {}, exc {}]",
                inner.display(self.cfg),
                self.block_idx(*normal),
                self.block_idx(*exc)
            ),
            LowStmtKind::FunctionDef { node, .. } => write!(f, "def {}", node.name),
            LowStmtKind::ClassDef { node, .. } => write!(f, "class {}", node.name),
            LowStmtKind::Global { names } => {
                write!(f, "global ")?;
                for (i, n) in names.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{n}")?;
                }
                Ok(())
            }
            LowStmtKind::Delete { target } => write!(f, "del {target}"),
            LowStmtKind::Print {
                dest,
                value,
                newline,
            } => {
                write!(f, "print")?;
                if let Some(d) = dest {
                    write!(f, " >>{d},")?;
                }
                if let Some(v) = value {
                    write!(f, " {v}")?;
                }
                if !newline {
                    write!(f, ",")?;
                }
                Ok(())
            }
            LowStmtKind::Assert { test, msg } => {
                write!(f, "assert {test}")?;
                if let Some(m) = msg {
                    write!(f, ", {m}")?;
                }
                Ok(())
            }
        }
    }
}
