//! Shared helpers for the lowering integration tests.
//!
//! There is no parser in this workspace, so tests build input trees
//! directly and lower them through [`compute_cfg`]. Every lowering helper
//! re-validates the returned graph and checks the simplifier fixpoint.

#![allow(dead_code)]

use pyrite_ast::ast::{
    Alias, Arguments, BinOp, BoolOpKind, CmpOp, Comprehension, ExceptHandler, Expr, ExprContext,
    ExprKind, FunctionDef, Lambda, NodeIdGen, Number, Stmt, StmtKind,
};
use pyrite_cfg::lowered::{LowStmt, LowStmtKind};
use pyrite_cfg::{
    compute_cfg, simplify, validate, Cfg, DefaultScoping, FutureFlags, LowerError, RootKind,
    ScopingAnalysis, SourceInfo,
};
use pyrite_core::{Span, StringInterner};

/// Node-id generator plus interner for building test inputs.
pub struct TestCtx {
    pub ids: NodeIdGen,
    pub interner: StringInterner,
}

impl TestCtx {
    pub fn new() -> Self {
        Self {
            ids: NodeIdGen::new(),
            interner: StringInterner::new(),
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn load(&self, name: &str) -> Expr {
        Expr::new(
            &self.ids,
            ExprKind::Name {
                sym: self.interner.intern(name),
                ctx: ExprContext::Load,
            },
            Span::dummy(),
        )
    }

    pub fn store(&self, name: &str) -> Expr {
        Expr::new(
            &self.ids,
            ExprKind::Name {
                sym: self.interner.intern(name),
                ctx: ExprContext::Store,
            },
            Span::dummy(),
        )
    }

    pub fn num(&self, value: i64) -> Expr {
        Expr::new(&self.ids, ExprKind::Num(Number::Int(value)), Span::dummy())
    }

    pub fn str_lit(&self, value: &str) -> Expr {
        Expr::new(&self.ids, ExprKind::Str(value.into()), Span::dummy())
    }

    pub fn attr(&self, object: Expr, name: &str, ctx: ExprContext) -> Expr {
        Expr::new(
            &self.ids,
            ExprKind::Attribute {
                value: Box::new(object),
                attr: self.interner.intern(name),
                ctx,
            },
            Span::dummy(),
        )
    }

    pub fn index(&self, value: Expr) -> Expr {
        Expr::new(
            &self.ids,
            ExprKind::Index {
                value: Box::new(value),
            },
            Span::dummy(),
        )
    }

    pub fn subscript(&self, object: Expr, index: Expr, ctx: ExprContext) -> Expr {
        Expr::new(
            &self.ids,
            ExprKind::Subscript {
                value: Box::new(object),
                slice: Box::new(self.index(index)),
                ctx,
            },
            Span::dummy(),
        )
    }

    pub fn binop(&self, left: Expr, op: BinOp, right: Expr) -> Expr {
        Expr::new(
            &self.ids,
            ExprKind::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            Span::dummy(),
        )
    }

    pub fn boolop(&self, op: BoolOpKind, values: Vec<Expr>) -> Expr {
        Expr::new(&self.ids, ExprKind::BoolOp { op, values }, Span::dummy())
    }

    pub fn compare(&self, left: Expr, ops: Vec<CmpOp>, comparators: Vec<Expr>) -> Expr {
        Expr::new(
            &self.ids,
            ExprKind::Compare {
                left: Box::new(left),
                ops,
                comparators,
            },
            Span::dummy(),
        )
    }

    pub fn call(&self, func: Expr, args: Vec<Expr>) -> Expr {
        Expr::new(
            &self.ids,
            ExprKind::Call {
                func: Box::new(func),
                args,
                keywords: Vec::new(),
                starargs: None,
                kwargs: None,
            },
            Span::dummy(),
        )
    }

    pub fn call_named(&self, func: &str, args: Vec<Expr>) -> Expr {
        self.call(self.load(func), args)
    }

    pub fn if_exp(&self, test: Expr, body: Expr, orelse: Expr) -> Expr {
        Expr::new(
            &self.ids,
            ExprKind::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            },
            Span::dummy(),
        )
    }

    pub fn lambda(&self, body: Expr) -> Expr {
        Expr::new(
            &self.ids,
            ExprKind::Lambda(std::rc::Rc::new(Lambda {
                args: Arguments::default(),
                body,
            })),
            Span::dummy(),
        )
    }

    pub fn yield_expr(&self, value: Option<Expr>) -> Expr {
        Expr::new(
            &self.ids,
            ExprKind::Yield {
                value: value.map(Box::new),
            },
            Span::dummy(),
        )
    }

    pub fn comprehension(&self, target: Expr, iter: Expr, ifs: Vec<Expr>) -> Comprehension {
        Comprehension {
            id: self.ids.fresh(),
            target,
            iter,
            ifs,
        }
    }

    pub fn list_comp(&self, elt: Expr, generators: Vec<Comprehension>) -> Expr {
        Expr::new(
            &self.ids,
            ExprKind::ListComp {
                elt: Box::new(elt),
                generators,
            },
            Span::dummy(),
        )
    }

    pub fn set_comp(&self, elt: Expr, generators: Vec<Comprehension>) -> Expr {
        Expr::new(
            &self.ids,
            ExprKind::SetComp {
                elt: Box::new(elt),
                generators,
            },
            Span::dummy(),
        )
    }

    pub fn dict_comp(&self, key: Expr, value: Expr, generators: Vec<Comprehension>) -> Expr {
        Expr::new(
            &self.ids,
            ExprKind::DictComp {
                key: Box::new(key),
                value: Box::new(value),
                generators,
            },
            Span::dummy(),
        )
    }

    pub fn generator_exp(&self, elt: Expr, generators: Vec<Comprehension>) -> Expr {
        Expr::new(
            &self.ids,
            ExprKind::GeneratorExp {
                elt: Box::new(elt),
                generators,
            },
            Span::dummy(),
        )
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub fn expr_stmt(&self, value: Expr) -> Stmt {
        Stmt::new(&self.ids, StmtKind::Expr { value }, Span::dummy())
    }

    pub fn assign(&self, name: &str, value: Expr) -> Stmt {
        self.assign_to(self.store(name), value)
    }

    pub fn assign_to(&self, target: Expr, value: Expr) -> Stmt {
        Stmt::new(
            &self.ids,
            StmtKind::Assign {
                targets: vec![target],
                value,
            },
            Span::dummy(),
        )
    }

    pub fn aug_assign(&self, target: Expr, op: BinOp, value: Expr) -> Stmt {
        Stmt::new(
            &self.ids,
            StmtKind::AugAssign { target, op, value },
            Span::dummy(),
        )
    }

    pub fn ret(&self, value: Option<Expr>) -> Stmt {
        Stmt::new(&self.ids, StmtKind::Return { value }, Span::dummy())
    }

    pub fn pass(&self) -> Stmt {
        Stmt::new(&self.ids, StmtKind::Pass, Span::dummy())
    }

    pub fn brk(&self) -> Stmt {
        Stmt::new(&self.ids, StmtKind::Break, Span::dummy())
    }

    pub fn cont(&self) -> Stmt {
        Stmt::new(&self.ids, StmtKind::Continue, Span::dummy())
    }

    pub fn if_stmt(&self, test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt>) -> Stmt {
        Stmt::new(&self.ids, StmtKind::If { test, body, orelse }, Span::dummy())
    }

    pub fn while_stmt(&self, test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt>) -> Stmt {
        Stmt::new(
            &self.ids,
            StmtKind::While { test, body, orelse },
            Span::dummy(),
        )
    }

    pub fn for_stmt(&self, target: Expr, iter: Expr, body: Vec<Stmt>, orelse: Vec<Stmt>) -> Stmt {
        Stmt::new(
            &self.ids,
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            },
            Span::dummy(),
        )
    }

    pub fn try_finally(&self, body: Vec<Stmt>, finalbody: Vec<Stmt>) -> Stmt {
        Stmt::new(
            &self.ids,
            StmtKind::TryFinally { body, finalbody },
            Span::dummy(),
        )
    }

    pub fn try_except(
        &self,
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
    ) -> Stmt {
        Stmt::new(
            &self.ids,
            StmtKind::TryExcept {
                body,
                handlers,
                orelse,
            },
            Span::dummy(),
        )
    }

    pub fn handler(&self, exc_type: Option<Expr>, name: Option<Expr>, body: Vec<Stmt>) -> ExceptHandler {
        ExceptHandler {
            span: Span::dummy(),
            exc_type,
            name,
            body,
        }
    }

    pub fn with_stmt(&self, context_expr: Expr, optional_vars: Option<Expr>, body: Vec<Stmt>) -> Stmt {
        Stmt::new(
            &self.ids,
            StmtKind::With {
                context_expr,
                optional_vars,
                body,
            },
            Span::dummy(),
        )
    }

    pub fn raise(&self, exc_type: Option<Expr>) -> Stmt {
        Stmt::new(
            &self.ids,
            StmtKind::Raise {
                exc_type,
                value: None,
                traceback: None,
            },
            Span::dummy(),
        )
    }

    pub fn assert_stmt(&self, test: Expr, msg: Option<Expr>) -> Stmt {
        Stmt::new(&self.ids, StmtKind::Assert { test, msg }, Span::dummy())
    }

    pub fn delete(&self, targets: Vec<Expr>) -> Stmt {
        Stmt::new(&self.ids, StmtKind::Delete { targets }, Span::dummy())
    }

    pub fn import(&self, name: &str, asname: Option<&str>) -> Stmt {
        Stmt::new(
            &self.ids,
            StmtKind::Import {
                names: vec![Alias {
                    id: self.ids.fresh(),
                    name: self.interner.intern(name),
                    asname: asname.map(|a| self.interner.intern(a)),
                }],
            },
            Span::dummy(),
        )
    }

    pub fn import_from(&self, module: &str, names: &[&str], level: u32) -> Stmt {
        Stmt::new(
            &self.ids,
            StmtKind::ImportFrom {
                module: self.interner.intern(module),
                names: names
                    .iter()
                    .map(|n| Alias {
                        id: self.ids.fresh(),
                        name: self.interner.intern(n),
                        asname: None,
                    })
                    .collect(),
                level,
            },
            Span::dummy(),
        )
    }

    pub fn function_def(&self, name: &str, defaults: Vec<Expr>, decorators: Vec<Expr>) -> Stmt {
        Stmt::new(
            &self.ids,
            StmtKind::FunctionDef(std::rc::Rc::new(FunctionDef {
                name: self.interner.intern(name),
                args: Arguments {
                    args: Vec::new(),
                    defaults,
                    vararg: None,
                    kwarg: None,
                },
                body: vec![self.pass()],
                decorators,
            })),
            Span::dummy(),
        )
    }

    // =========================================================================
    // Lowering
    // =========================================================================

    fn source_info<'a>(
        &'a self,
        root: RootKind,
        flags: FutureFlags,
        scoping: &'a mut dyn ScopingAnalysis,
    ) -> SourceInfo<'a> {
        SourceInfo {
            root,
            root_node: self.ids.fresh(),
            root_span: Span::dummy(),
            module_name: "test_module".into(),
            future_flags: flags,
            interner: &self.interner,
            ids: &self.ids,
            scoping,
        }
    }

    pub fn lower(&self, root: RootKind, body: &[Stmt]) -> Cfg {
        let mut scoping = DefaultScoping::new();
        self.lower_with(root, FutureFlags::NONE, body, &mut scoping)
    }

    pub fn lower_with(
        &self,
        root: RootKind,
        flags: FutureFlags,
        body: &[Stmt],
        scoping: &mut dyn ScopingAnalysis,
    ) -> Cfg {
        let source = self.source_info(root, flags, scoping);
        let cfg = compute_cfg(source, body).expect("lowering failed");
        check_invariants(cfg)
    }

    pub fn lower_module(&self, body: &[Stmt]) -> Cfg {
        self.lower(RootKind::Module, body)
    }

    pub fn lower_function(&self, body: &[Stmt]) -> Cfg {
        self.lower(RootKind::FunctionDef, body)
    }

    pub fn lower_err(&self, root: RootKind, body: &[Stmt]) -> LowerError {
        let mut scoping = DefaultScoping::new();
        let source = self.source_info(root, FutureFlags::NONE, &mut scoping);
        compute_cfg(source, body).expect_err("lowering should have failed")
    }
}

/// Re-validate a returned graph and check the simplifier fixpoint.
pub fn check_invariants(mut cfg: Cfg) -> Cfg {
    validate(&cfg);
    assert_eq!(simplify(&mut cfg), 0, "simplifier must reach a fixpoint");
    cfg
}

/// All statements in block order, with invoke-wrapped statements also
/// yielded (after the invoke itself).
pub fn flat_stmts(cfg: &Cfg) -> Vec<&LowStmt> {
    let mut out = Vec::new();
    for block in cfg.blocks_in_order() {
        for stmt in block.body() {
            out.push(stmt);
            if let LowStmtKind::Invoke { inner, .. } = &stmt.kind {
                out.push(inner);
            }
        }
    }
    out
}

/// Count the statements matching a predicate (invoke inners included).
pub fn count_stmts(cfg: &Cfg, pred: impl Fn(&LowStmtKind) -> bool) -> usize {
    flat_stmts(cfg).iter().filter(|s| pred(&s.kind)).count()
}

/// Whether any block has a back-edge (a successor with a smaller index).
pub fn has_backedge(cfg: &Cfg) -> bool {
    cfg.blocks_in_order().any(|b| {
        b.successors()
            .iter()
            .any(|&s| cfg.block(s).idx() <= b.idx())
    })
}
