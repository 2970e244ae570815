//! CFG lowering benchmarks.
//!
//! Measures `compute_cfg` over representative program shapes: straight-line
//! assignments, loop nests with branches, and exception-heavy bodies where
//! every statement goes through invoke wrapping.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use pyrite_ast::ast::{
    Comprehension, ExceptHandler, Expr, ExprContext, ExprKind, NodeIdGen, Number, Stmt, StmtKind,
};
use pyrite_cfg::{compute_cfg, DefaultScoping, FutureFlags, RootKind, SourceInfo};
use pyrite_core::{Span, StringInterner};

struct Builder {
    ids: NodeIdGen,
    interner: StringInterner,
}

impl Builder {
    fn new() -> Self {
        Self {
            ids: NodeIdGen::new(),
            interner: StringInterner::new(),
        }
    }

    fn name(&self, sym: &str, ctx: ExprContext) -> Expr {
        Expr::new(
            &self.ids,
            ExprKind::Name {
                sym: self.interner.intern(sym),
                ctx,
            },
            Span::dummy(),
        )
    }

    fn num(&self, value: i64) -> Expr {
        Expr::new(&self.ids, ExprKind::Num(Number::Int(value)), Span::dummy())
    }

    fn call(&self, func: &str, args: Vec<Expr>) -> Expr {
        Expr::new(
            &self.ids,
            ExprKind::Call {
                func: Box::new(self.name(func, ExprContext::Load)),
                args,
                keywords: Vec::new(),
                starargs: None,
                kwargs: None,
            },
            Span::dummy(),
        )
    }

    fn assign(&self, target: &str, value: Expr) -> Stmt {
        Stmt::new(
            &self.ids,
            StmtKind::Assign {
                targets: vec![self.name(target, ExprContext::Store)],
                value,
            },
            Span::dummy(),
        )
    }

    fn expr_stmt(&self, value: Expr) -> Stmt {
        Stmt::new(&self.ids, StmtKind::Expr { value }, Span::dummy())
    }

    /// A run of `x<i> = f(x<i-1>)` assignments.
    fn straight_line(&self, n: usize) -> Vec<Stmt> {
        (0..n)
            .map(|i| {
                let arg = self.name(&format!("x{i}"), ExprContext::Load);
                self.assign(&format!("x{}", i + 1), self.call("f", vec![arg]))
            })
            .collect()
    }

    /// A run of for loops with branchy bodies.
    fn loop_nest(&self, n: usize) -> Vec<Stmt> {
        (0..n)
            .map(|_| {
                let body = vec![Stmt::new(
                    &self.ids,
                    StmtKind::If {
                        test: self.call("p", vec![self.name("x", ExprContext::Load)]),
                        body: vec![self.expr_stmt(self.call("g", vec![]))],
                        orelse: vec![Stmt::new(&self.ids, StmtKind::Continue, Span::dummy())],
                    },
                    Span::dummy(),
                )];
                Stmt::new(
                    &self.ids,
                    StmtKind::For {
                        target: self.name("x", ExprContext::Store),
                        iter: self.name("xs", ExprContext::Load),
                        body,
                        orelse: Vec::new(),
                    },
                    Span::dummy(),
                )
            })
            .collect()
    }

    /// try/except bodies whose statements all need invoke wrapping.
    fn exception_heavy(&self, n: usize) -> Vec<Stmt> {
        (0..n)
            .map(|_| {
                Stmt::new(
                    &self.ids,
                    StmtKind::TryExcept {
                        body: vec![
                            self.expr_stmt(self.call("f", vec![])),
                            self.assign("y", self.call("g", vec![self.num(1)])),
                        ],
                        handlers: vec![ExceptHandler {
                            span: Span::dummy(),
                            exc_type: None,
                            name: None,
                            body: vec![self.expr_stmt(self.call("handle", vec![]))],
                        }],
                        orelse: Vec::new(),
                    },
                    Span::dummy(),
                )
            })
            .collect()
    }

    /// A filtered list comprehension.
    fn comprehension(&self) -> Vec<Stmt> {
        let comp = Expr::new(
            &self.ids,
            ExprKind::ListComp {
                elt: self.name("x", ExprContext::Load).into(),
                generators: vec![Comprehension {
                    id: self.ids.fresh(),
                    target: self.name("x", ExprContext::Store),
                    iter: self.name("xs", ExprContext::Load),
                    ifs: vec![self.call("p", vec![self.name("x", ExprContext::Load)])],
                }],
            },
            Span::dummy(),
        );
        vec![self.assign("result", comp)]
    }
}

fn lower(builder: &Builder, body: &[Stmt]) -> pyrite_cfg::Cfg {
    let mut scoping = DefaultScoping::new();
    let source = SourceInfo {
        root: RootKind::Module,
        root_node: builder.ids.fresh(),
        root_span: Span::dummy(),
        module_name: "bench".into(),
        future_flags: FutureFlags::NONE,
        interner: &builder.interner,
        ids: &builder.ids,
        scoping: &mut scoping,
    };
    compute_cfg(source, body).expect("lowering failed")
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_straight_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("straight_line");
    for size in [10usize, 100] {
        group.bench_function(size.to_string(), |b| {
            b.iter_batched(
                || {
                    let builder = Builder::new();
                    let body = builder.straight_line(size);
                    (builder, body)
                },
                |(builder, body)| lower(&builder, &body),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_loops(c: &mut Criterion) {
    c.bench_function("loop_nest", |b| {
        b.iter_batched(
            || {
                let builder = Builder::new();
                let body = builder.loop_nest(8);
                (builder, body)
            },
            |(builder, body)| lower(&builder, &body),
            BatchSize::SmallInput,
        )
    });
}

fn bench_exceptions(c: &mut Criterion) {
    c.bench_function("exception_heavy", |b| {
        b.iter_batched(
            || {
                let builder = Builder::new();
                let body = builder.exception_heavy(8);
                (builder, body)
            },
            |(builder, body)| lower(&builder, &body),
            BatchSize::SmallInput,
        )
    });
}

fn bench_comprehension(c: &mut Criterion) {
    c.bench_function("list_comprehension", |b| {
        b.iter_batched(
            || {
                let builder = Builder::new();
                let body = builder.comprehension();
                (builder, body)
            },
            |(builder, body)| lower(&builder, &body),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_straight_line,
    bench_loops,
    bench_exceptions,
    bench_comprehension
);
criterion_main!(benches);
