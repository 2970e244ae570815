//! The CFG builder.
//!
//! [`compute_cfg`] walks a statement list and produces a graph of basic
//! blocks whose bodies are straight-line, temporary-normalized statements.
//! The builder holds the mutable lowering state: the current insertion
//! block, the continuation stack (where `continue` / `break` / `return`
//! go), and the exception-handler stack (where exceptions land).
//!
//! While generating the CFG we need to know what to do if we (1) hit a
//! `continue`, (2) hit a `break`, (3) hit a `return`, or (4) raise an
//! exception. Loops affect (1)-(2), `try`/`except` affects (4), and
//! `try`/`finally` and `with` affect all four. Each takes effect only
//! within some chunk of code, so the builder keeps two stacks whose top
//! entries say what to do when the condition occurs: continuation records
//! for (1)-(3), exception-handler records for (4). A cleanup continuation
//! additionally needs to know *why* it was entered; the [`Why`] tag is
//! threaded through a temporary so the cleanup block can resume the
//! interrupted transfer when it finishes.

mod expr;
mod stmt;

use crate::graph::{BlockRef, Cfg};
use crate::lowered::{
    CompositeKind, LowExpr, LowStmt, LowStmtKind, NameRef, NumLit, Operand, Primitive, StrLit,
    Target,
};
use crate::simplify::simplify;
use crate::validate::validate;
use pyrite_ast::ast::{self, NodeId, NodeIdGen, Number};
use pyrite_core::{InternedString, PyriteError, Span, StringInterner};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;

/// The reserved name of the return-value slot threaded through `finally`
/// blocks.
pub const RETURN_NAME: &str = "#rtnval";

/// An error produced while lowering ill-formed input.
#[derive(Debug, Clone)]
pub struct LowerError {
    /// Error message.
    pub message: String,
    /// Location of the offending construct.
    pub span: Span,
}

impl LowerError {
    /// Create a new lowering error.
    #[must_use]
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for LowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.span, self.message)
    }
}

impl std::error::Error for LowerError {}

impl From<LowerError> for PyriteError {
    fn from(err: LowerError) -> Self {
        PyriteError::syntax(err.message, err.span)
    }
}

/// Result type for lowering.
pub type LowerResult<T> = Result<T, LowerError>;

/// What kind of AST root is being lowered.
///
/// Checked when a `return` is found: returns are allowed in functions,
/// lambdas, and `eval` strings (which get an implicit return), but not at
/// module or class level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    /// A module body.
    Module,
    /// A function body.
    FunctionDef,
    /// A lambda body.
    Lambda,
    /// An `eval` string.
    Expression,
    /// A class body.
    ClassDef,
}

/// Per-module `from __future__` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FutureFlags(u32);

impl FutureFlags {
    /// No future flags.
    pub const NONE: FutureFlags = FutureFlags(0);
    /// `from __future__ import absolute_import`.
    pub const ABSOLUTE_IMPORT: FutureFlags = FutureFlags(1 << 0);

    /// Whether all the given flags are set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: FutureFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for FutureFlags {
    type Output = FutureFlags;

    fn bitor(self, rhs: FutureFlags) -> FutureFlags {
        FutureFlags(self.0 | rhs.0)
    }
}

/// The scoping-analysis collaborator.
///
/// The lowering pass touches scoping in exactly two places: private-name
/// mangling of attribute names, and registering the function definitions
/// it synthesizes for generator expressions so the scoping results of the
/// original expression carry over.
pub trait ScopingAnalysis {
    /// Mangle an attribute name per class-privacy rules.
    fn mangle_name(&self, name: &InternedString, interner: &StringInterner) -> InternedString;

    /// Record that `replacement` was synthesized to stand in for the
    /// scope of the original node.
    fn register_scope_replacement(&mut self, original: NodeId, replacement: Rc<ast::FunctionDef>);
}

/// A straightforward [`ScopingAnalysis`]: optional class-privacy mangling
/// plus a replacement map. Suitable for tests and simple embedders.
#[derive(Debug, Default)]
pub struct DefaultScoping {
    privacy_prefix: Option<String>,
    replacements: FxHashMap<NodeId, Rc<ast::FunctionDef>>,
}

impl DefaultScoping {
    /// Scoping with no privacy mangling (module and function roots).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scoping for a class body: `__name`-style attributes are mangled to
    /// `_Class__name`.
    #[must_use]
    pub fn for_class(class_name: &str) -> Self {
        let stripped = class_name.trim_start_matches('_');
        Self {
            privacy_prefix: (!stripped.is_empty()).then(|| stripped.to_owned()),
            replacements: FxHashMap::default(),
        }
    }

    /// Look up a registered scope replacement.
    #[must_use]
    pub fn replacement(&self, original: NodeId) -> Option<&Rc<ast::FunctionDef>> {
        self.replacements.get(&original)
    }
}

impl ScopingAnalysis for DefaultScoping {
    fn mangle_name(&self, name: &InternedString, interner: &StringInterner) -> InternedString {
        match &self.privacy_prefix {
            Some(prefix) if name.starts_with("__") && !name.ends_with("__") => {
                interner.intern_owned(format!("_{prefix}{}", name.as_str()))
            }
            _ => name.clone(),
        }
    }

    fn register_scope_replacement(&mut self, original: NodeId, replacement: Rc<ast::FunctionDef>) {
        self.replacements.insert(original, replacement);
    }
}

/// Everything the lowering needs to know about the unit being compiled.
pub struct SourceInfo<'a> {
    /// What kind of root is being lowered.
    pub root: RootKind,
    /// The root node's identity (seeds root-level temporaries).
    pub root_node: NodeId,
    /// The root node's span.
    pub root_span: Span,
    /// The enclosing module's `__name__`.
    pub module_name: std::sync::Arc<str>,
    /// The module's future flags.
    pub future_flags: FutureFlags,
    /// The identifier interner.
    pub interner: &'a StringInterner,
    /// The node-id generator the input tree was built with.
    pub ids: &'a NodeIdGen,
    /// The scoping-analysis collaborator.
    pub scoping: &'a mut dyn ScopingAnalysis,
}

/// The reasons a cleanup block (`finally`, `with` exit) might be entered.
///
/// Encoded as a small integer assigned to the continuation's `why`
/// temporary; the cleanup block branches on it to resume the interrupted
/// control transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum Why {
    /// Normal control flow.
    Fallthrough = 0,
    /// A `continue` passed through.
    Continue = 1,
    /// A `break` passed through.
    Break = 2,
    /// A `return` passed through.
    Return = 3,
    /// An exception is propagating.
    Exception = 4,
}

impl Why {
    /// The bit for this reason in a continuation's observed-reasons mask.
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Where `continue`, `break`, and `return` go within the current nesting.
///
/// Loops push a record with continue/break destinations; `try`/`finally`
/// and `with` push a record whose three destinations all point at the
/// cleanup block, with a `why` temporary naming the entry reason.
#[derive(Debug)]
struct ContInfo {
    /// Jump target for `continue`, if this record handles it.
    continue_dest: Option<BlockRef>,
    /// Jump target for `break`, if this record handles it.
    break_dest: Option<BlockRef>,
    /// Jump target for `return`, if this record handles it.
    return_dest: Option<BlockRef>,
    /// The temporary carrying the entry reason; `Some` only for cleanup
    /// continuations that need to know why they were entered.
    why_name: Option<InternedString>,
    /// Bitmask of reasons actually observed (one bit per [`Why`] value);
    /// tells the cleanup emitter which resume cases it must generate.
    did_why: u8,
}

/// Where exceptions land within the current nesting: the handler block
/// plus the three temporaries the landing pad fills in.
#[derive(Debug, Clone)]
struct ExcHandlerInfo {
    /// The handler (landing) block.
    handler: BlockRef,
    /// Temporary receiving the exception type.
    type_name: InternedString,
    /// Temporary receiving the exception value.
    value_name: InternedString,
    /// Temporary receiving the traceback.
    traceback_name: InternedString,
}

/// The CFG builder: a visitor with mutable cursors.
pub(crate) struct CfgBuilder<'a> {
    source: SourceInfo<'a>,
    cfg: Cfg,
    /// The block new statements are appended to; `None` after a
    /// terminator until the next block is opened.
    cur: Option<BlockRef>,
    continuations: SmallVec<[ContInfo; 4]>,
    exc_handlers: SmallVec<[ExcHandlerInfo; 4]>,
    #[cfg(feature = "validate-temps")]
    seen_temps: rustc_hash::FxHashSet<InternedString>,
}

impl<'a> CfgBuilder<'a> {
    pub(crate) fn new(source: SourceInfo<'a>) -> Self {
        let mut cfg = Cfg::new();
        let entry = cfg.add_block("entry");
        Self {
            source,
            cfg,
            cur: Some(entry),
            continuations: SmallVec::new(),
            exc_handlers: SmallVec::new(),
            #[cfg(feature = "validate-temps")]
            seen_temps: rustc_hash::FxHashSet::default(),
        }
    }

    // =========================================================================
    // Small helpers
    // =========================================================================

    #[inline]
    pub(crate) fn intern(&self, s: &str) -> InternedString {
        self.source.interner.intern(s)
    }

    #[inline]
    pub(crate) fn fresh_id(&self) -> NodeId {
        self.source.ids.fresh()
    }

    pub(crate) fn mangle(&self, name: &InternedString) -> InternedString {
        self.source.scoping.mangle_name(name, self.source.interner)
    }

    fn record_temp(&mut self, name: InternedString) -> InternedString {
        #[cfg(feature = "validate-temps")]
        assert!(
            self.seen_temps.insert(name.clone()),
            "temporary name {name} generated twice"
        );
        name
    }

    /// `#<node>`: a temporary keyed by node identity alone.
    pub(crate) fn node_name(&mut self, node: NodeId) -> InternedString {
        let name = self.source.interner.intern_owned(format!("#{node}"));
        self.record_temp(name)
    }

    /// `#<node>_<suffix>`.
    pub(crate) fn node_name_sfx(&mut self, node: NodeId, suffix: &str) -> InternedString {
        let name = self
            .source
            .interner
            .intern_owned(format!("#{node}_{suffix}"));
        self.record_temp(name)
    }

    /// `#<node>_<suffix>_<idx>`.
    pub(crate) fn node_name_idx(
        &mut self,
        node: NodeId,
        suffix: &str,
        idx: usize,
    ) -> InternedString {
        let name = self
            .source
            .interner
            .intern_owned(format!("#{node}_{suffix}_{idx}"));
        self.record_temp(name)
    }

    pub(crate) fn make_load(&self, sym: InternedString, span: Span) -> Operand {
        Operand::Name(NameRef {
            id: self.fresh_id(),
            span,
            sym,
        })
    }

    pub(crate) fn make_num(&self, value: i64, span: Span) -> Operand {
        Operand::Num(NumLit {
            id: self.fresh_id(),
            span,
            value: Number::Int(value),
        })
    }

    pub(crate) fn make_str(&self, value: &str, span: Span) -> StrLit {
        StrLit {
            id: self.fresh_id(),
            span,
            value: value.into(),
        }
    }

    pub(crate) fn composite(&self, kind: CompositeKind, span: Span) -> LowExpr {
        LowExpr::Composite {
            id: self.fresh_id(),
            span,
            kind,
        }
    }

    // =========================================================================
    // Statement emission (invoke wrapping)
    // =========================================================================

    /// Append a statement to the current block.
    ///
    /// With no active exception handler this is a plain append. Inside a
    /// handler, only statements that cannot raise are appended as-is;
    /// anything side-effecting is wrapped in an invoke with an explicit
    /// exception edge that lands the exception triple and jumps to the
    /// handler.
    pub(crate) fn emit(&mut self, stmt: LowStmt) {
        debug_assert!(
            !matches!(stmt.kind, LowStmtKind::Invoke { .. }),
            "invokes are created here, never passed in"
        );

        let Some(cur) = self.cur else { return };

        if self.exc_handlers.is_empty() {
            self.cfg.push_stmt(cur, stmt);
            return;
        }

        let safe = match &stmt.kind {
            LowStmtKind::Jump { .. } | LowStmtKind::Return { .. } => true,
            LowStmtKind::Branch { test, .. } => {
                assert!(
                    !matches!(test, Operand::Str(_)),
                    "branch test must be a name or a number"
                );
                true
            }
            LowStmtKind::Assign {
                target: Target::Name(target),
                value,
            } => {
                let value_is_safe = match value {
                    // A load of a temporary has already happened; a literal
                    // cannot raise.
                    LowExpr::Prim(Operand::Name(n)) => n.is_temporary(),
                    LowExpr::Prim(_) => true,
                    LowExpr::Composite { .. } => false,
                };
                if target.is_temporary() {
                    value_is_safe
                } else {
                    // Stores to source-level names cannot raise; by this
                    // point the source must already be primitive.
                    assert!(
                        value_is_safe,
                        "non-trivial assignment to {} inside an invoke",
                        target.sym
                    );
                    true
                }
            }
            _ => false,
        };

        if safe {
            self.cfg.push_stmt(cur, stmt);
            return;
        }

        // A raise never takes the normal path, so both invoke successors
        // are the exception trampoline; every other statement gets a fresh
        // normal block that becomes the new current block.
        let is_raise = matches!(stmt.kind, LowStmtKind::Raise { .. });
        let normal = self.cfg.add_block("");
        let exc = if is_raise {
            normal
        } else {
            self.cfg.add_block("")
        };

        let span = stmt.span;
        let invoke = LowStmt {
            id: self.fresh_id(),
            span,
            kind: LowStmtKind::Invoke {
                inner: Box::new(stmt),
                normal,
                exc,
            },
        };
        self.cfg.push_stmt(cur, invoke);
        self.cfg.connect(cur, normal, false);
        if !is_raise {
            self.cfg.connect(cur, exc, false);
        }

        let handler = self.exc_handlers.last().expect("handler stack empty").clone();

        // The landing pad bypasses `emit`: it must not itself be wrapped.
        let pad = LowStmt {
            id: self.fresh_id(),
            span,
            kind: LowStmtKind::Assign {
                target: Target::Tuple {
                    id: self.fresh_id(),
                    span,
                    elts: vec![
                        NameRef {
                            id: self.fresh_id(),
                            span,
                            sym: handler.type_name.clone(),
                        },
                        NameRef {
                            id: self.fresh_id(),
                            span,
                            sym: handler.value_name.clone(),
                        },
                        NameRef {
                            id: self.fresh_id(),
                            span,
                            sym: handler.traceback_name.clone(),
                        },
                    ],
                },
                value: LowExpr::Composite {
                    id: self.fresh_id(),
                    span,
                    kind: CompositeKind::Primitive(Primitive::LandingPad),
                },
            },
        };
        self.cfg.push_stmt(exc, pad);
        self.cur = Some(exc);
        self.push_jump(handler.handler, false);

        self.cur = if is_raise { None } else { Some(normal) };
    }

    /// Emit a jump to `target` and close the current block.
    pub(crate) fn push_jump(&mut self, target: BlockRef, allow_backedge: bool) {
        let cur = self.cur.expect("jump emitted with no current block");
        let id = self.fresh_id();
        self.emit(LowStmt {
            id,
            span: Span::dummy(),
            kind: LowStmtKind::Jump { target },
        });
        self.cfg.connect(cur, target, allow_backedge);
        self.cur = None;
    }

    /// Emit a truthiness branch on `test` and close the current block.
    ///
    /// Both targets must still be deferred: materializing the truthiness
    /// test can open new blocks, which would otherwise slip between the
    /// branch and already-placed targets.
    pub(crate) fn push_branch(&mut self, test: LowExpr, iftrue: BlockRef, iffalse: BlockRef) {
        assert!(
            !self.cfg.block(iftrue).is_placed() && !self.cfg.block(iffalse).is_placed(),
            "branch targets must be deferred"
        );
        let test = self.call_nonzero(test);
        let cur = self.cur.expect("branch emitted with no current block");
        self.cfg.connect(cur, iftrue, false);
        self.cfg.connect(cur, iffalse, false);
        let id = self.fresh_id();
        let span = test.span();
        self.emit(LowStmt {
            id,
            span,
            kind: LowStmtKind::Branch {
                test,
                iftrue,
                iffalse,
            },
        });
        self.cur = None;
    }

    /// Flatten a possibly composite expression to an operand by assigning
    /// it to a fresh temporary if needed.
    pub(crate) fn into_operand(&mut self, e: LowExpr) -> Operand {
        match e {
            LowExpr::Prim(op) => op,
            composite => {
                let span = composite.span();
                let name = self.node_name(composite.id());
                self.push_assign_name(name.clone(), span, composite);
                self.make_load(name, span)
            }
        }
    }

    /// Wrap `e` in an explicit truthiness test and return the temporary
    /// holding the result. Branch tests always go through this, so a test
    /// operand is always a plain name (or number).
    pub(crate) fn call_nonzero(&mut self, e: LowExpr) -> Operand {
        let arg = self.into_operand(e);
        let span = arg.span();
        let seed = arg.id();
        let call = self.composite(CompositeKind::Primitive(Primitive::Nonzero(arg)), span);
        let name = self.node_name(seed);
        self.push_assign_name(name.clone(), span, call);
        self.make_load(name, span)
    }

    /// Emit `sym = value` where `sym` is a bare (usually generated) name.
    pub(crate) fn push_assign_name(&mut self, sym: InternedString, span: Span, value: LowExpr) {
        let stmt = LowStmt {
            id: self.fresh_id(),
            span,
            kind: LowStmtKind::Assign {
                target: Target::Name(NameRef {
                    id: self.fresh_id(),
                    span,
                    sym,
                }),
                value,
            },
        };
        self.emit(stmt);
    }

    // =========================================================================
    // Continuations
    // =========================================================================

    pub(crate) fn push_loop_continuation(&mut self, continue_dest: BlockRef, break_dest: BlockRef) {
        // Equal destinations would mean the loop shape collapsed; loops
        // never need the entry reason.
        debug_assert_ne!(continue_dest, break_dest);
        self.continuations.push(ContInfo {
            continue_dest: Some(continue_dest),
            break_dest: Some(break_dest),
            return_dest: None,
            why_name: None,
            did_why: 0,
        });
    }

    pub(crate) fn push_finally_continuation(
        &mut self,
        finally_block: BlockRef,
        why_name: InternedString,
    ) {
        self.continuations.push(ContInfo {
            continue_dest: Some(finally_block),
            break_dest: Some(finally_block),
            return_dest: Some(finally_block),
            why_name: Some(why_name),
            did_why: 0,
        });
    }

    /// Pop the innermost continuation, returning its observed-reasons
    /// mask.
    pub(crate) fn pop_continuation(&mut self) -> u8 {
        self.continuations
            .pop()
            .expect("continuation stack underflow")
            .did_why
    }

    fn set_why(&mut self, index: usize, why: Why, span: Span) {
        if let Some(why_name) = self.continuations[index].why_name.clone() {
            let num = self.make_num(why as i64, span);
            self.push_assign_name(why_name, span, LowExpr::Prim(num));
            self.continuations[index].did_why |= why.bit();
        }
    }

    /// Route a `return` of `value` through the innermost continuation that
    /// handles returns, or emit a terminal return.
    pub(crate) fn do_return(&mut self, value: Operand, span: Span) {
        let handler = (0..self.continuations.len())
            .rev()
            .find(|&i| self.continuations[i].return_dest.is_some());
        if let Some(i) = handler {
            let dest = self.continuations[i].return_dest.expect("checked above");
            self.set_why(i, Why::Return, span);
            let rtn = self.intern(RETURN_NAME);
            self.push_assign_name(rtn, span, LowExpr::Prim(value));
            self.push_jump(dest, false);
            return;
        }

        let id = self.fresh_id();
        self.emit(LowStmt {
            id,
            span,
            kind: LowStmtKind::Return { value: Some(value) },
        });
        self.cur = None;
    }

    /// Route a `continue` through the innermost continuation that handles
    /// it.
    pub(crate) fn do_continue(&mut self, span: Span) -> LowerResult<()> {
        let handler = (0..self.continuations.len())
            .rev()
            .find(|&i| self.continuations[i].continue_dest.is_some());
        match handler {
            Some(i) => {
                let dest = self.continuations[i].continue_dest.expect("checked above");
                self.set_why(i, Why::Continue, span);
                self.push_jump(dest, true);
                Ok(())
            }
            None => Err(LowerError::new("'continue' not properly in loop", span)),
        }
    }

    /// Route a `break` through the innermost continuation that handles it.
    pub(crate) fn do_break(&mut self, span: Span) -> LowerResult<()> {
        let handler = (0..self.continuations.len())
            .rev()
            .find(|&i| self.continuations[i].break_dest.is_some());
        match handler {
            Some(i) => {
                let dest = self.continuations[i].break_dest.expect("checked above");
                self.set_why(i, Why::Break, span);
                self.push_jump(dest, true);
                Ok(())
            }
            None => Err(LowerError::new("'break' outside loop", span)),
        }
    }

    /// Emit one dispatch arm of a cleanup block: branch to `then_block`
    /// when the `why` temporary equals `reason`, otherwise fall through to
    /// the returned block.
    pub(crate) fn make_finally_cont(
        &mut self,
        reason: Why,
        why_name: &InternedString,
        span: Span,
        then_block: BlockRef,
    ) -> BlockRef {
        let otherwise = self.cfg.add_deferred_block("finally_otherwise");
        let why = self.make_load(why_name.clone(), span);
        let num = self.make_num(reason as i64, span);
        let cmp = self.composite(
            CompositeKind::Compare {
                op: ast::CmpOp::Eq,
                left: why,
                right: num,
            },
            span,
        );
        self.push_branch(cmp, then_block, otherwise);
        self.cfg.place_block(otherwise);
        otherwise
    }

    pub(crate) fn push_exc_handler(
        &mut self,
        handler: BlockRef,
        type_name: InternedString,
        value_name: InternedString,
        traceback_name: InternedString,
    ) {
        self.exc_handlers.push(ExcHandlerInfo {
            handler,
            type_name,
            value_name,
            traceback_name,
        });
    }

    pub(crate) fn pop_exc_handler(&mut self) {
        self.exc_handlers.pop().expect("handler stack underflow");
    }

    fn finish(self) -> Cfg {
        assert!(
            self.continuations.is_empty(),
            "continuation left on the stack"
        );
        assert!(
            self.exc_handlers.is_empty(),
            "exception handler left on the stack"
        );
        self.cfg
    }
}

/// Lower a statement list into a control-flow graph.
///
/// The returned graph satisfies the documented invariants (placed blocks
/// only, terminators everywhere, no critical edges, topological-ish
/// ordering) and has had trivial jump chains fused.
pub fn compute_cfg(source: SourceInfo<'_>, body: &[ast::Stmt]) -> LowerResult<Cfg> {
    let is_class_root = source.root == RootKind::ClassDef;
    let root_node = source.root_node;
    let root_span = source.root_span;
    let module_name = source.module_name.clone();

    let mut builder = CfgBuilder::new(source);

    let mut skip_first = false;
    if is_class_root {
        // A class body always starts with `__module__ = __name__`.
        let module_str = builder.make_str(&module_name, root_span);
        let module_sym = builder.intern("__module__");
        builder.push_assign_name(module_sym, root_span, LowExpr::Prim(Operand::Str(module_str)));

        // A leading bare string becomes the docstring.
        if let Some(first) = body.first() {
            if let ast::StmtKind::Expr { value } = &first.kind {
                if let ast::ExprKind::Str(s) = &value.kind {
                    let doc = StrLit {
                        id: builder.fresh_id(),
                        span: value.span,
                        value: s.clone(),
                    };
                    let doc_sym = builder.intern("__doc__");
                    builder.push_assign_name(doc_sym, value.span, LowExpr::Prim(Operand::Str(doc)));
                    skip_first = true;
                }
            }
        }
    }

    for stmt in body.iter().skip(usize::from(skip_first)) {
        builder.lower_stmt(stmt)?;
    }

    if is_class_root {
        // A class body evaluates to its locals dictionary.
        let locals = builder.composite(CompositeKind::Primitive(Primitive::Locals), root_span);
        let name = builder.node_name_sfx(root_node, "locals");
        builder.push_assign_name(name.clone(), root_span, locals);
        let value = builder.make_load(name, root_span);
        let id = builder.fresh_id();
        builder.emit(LowStmt {
            id,
            span: root_span,
            kind: LowStmtKind::Return { value: Some(value) },
        });
    } else {
        // Terminate every other root with a synthetic value-less return so
        // downstream phases never see a fall-off-the-end block.
        let id = builder.fresh_id();
        builder.emit(LowStmt {
            id,
            span: Span::dummy(),
            kind: LowStmtKind::Return { value: None },
        });
    }

    let mut cfg = builder.finish();
    validate(&cfg);
    simplify(&mut cfg);
    Ok(cfg)
}
