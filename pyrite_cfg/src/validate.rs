//! Graph invariant checks.
//!
//! Later phases assume the properties verified here; a violation is a bug
//! in the lowering pass, not in the input program, so every check is a
//! fatal assertion.

use crate::graph::Cfg;
use crate::lowered::{LowStmt, LowStmtKind, Operand, Target};
use pyrite_ast::ast::NodeId;
use rustc_hash::FxHashMap;

/// Verify all graph invariants; panics on the first violation.
///
/// Checked properties:
/// - the entry block has index 0 and no predecessors;
/// - every block is placed and its index equals its position;
/// - every non-entry block has a predecessor with a smaller index, and
///   its first listed predecessor has a smaller index;
/// - every block body is non-empty and ends in a terminator;
/// - blocks with no successors end in a return or raise;
/// - no block has more than two successors, and no critical edges exist;
/// - branch tests are names or numeric literals;
/// - `#`-prefixed identifiers are `#rtnval` or generated temporaries;
/// - no AST node appears twice anywhere in the graph.
pub fn validate(cfg: &Cfg) {
    assert!(!cfg.is_empty(), "graph has no blocks");

    let entry = cfg.entry();
    assert_eq!(cfg.block(entry).idx(), 0, "entry block is not block 0");
    assert!(
        cfg.block(entry).predecessors().is_empty(),
        "entry block has predecessors"
    );

    for (pos, &r) in cfg.order().iter().enumerate() {
        let b = cfg.block(r);
        assert_eq!(
            b.idx(),
            pos as i32,
            "block index does not match its position in the order"
        );

        for &p in b.predecessors() {
            assert!(cfg.block(p).is_placed(), "unplaced predecessor of block {}", b.idx());
        }
        for &s in b.successors() {
            assert!(cfg.block(s).is_placed(), "unplaced successor of block {}", b.idx());
        }

        assert!(!b.body().is_empty(), "block {} has an empty body", b.idx());
        let last = b.body().last().expect("checked non-empty");
        assert!(
            last.is_terminator(),
            "block {} does not end in a terminator",
            b.idx()
        );

        assert!(
            b.successors().len() <= 2,
            "block {} has too many successors",
            b.idx()
        );
        if b.successors().is_empty() {
            assert!(
                matches!(
                    last.kind,
                    LowStmtKind::Return { .. } | LowStmtKind::Raise { .. }
                ),
                "terminal block {} must end in a return or raise",
                b.idx()
            );
        }

        if pos == 0 {
            assert!(b.predecessors().is_empty());
        } else {
            assert!(
                !b.predecessors().is_empty(),
                "block {} has no predecessors",
                b.idx()
            );
            assert!(
                b.predecessors()
                    .iter()
                    .any(|&p| cfg.block(p).idx() < b.idx()),
                "block {} has no predecessor with a smaller index",
                b.idx()
            );
            assert!(
                cfg.block(b.predecessors()[0]).idx() < b.idx(),
                "block {}'s first predecessor must have a smaller index",
                b.idx()
            );
        }

        for stmt in b.body() {
            check_stmt(stmt);
        }
    }

    // No critical edges: a two-successor block may only feed
    // single-predecessor blocks.
    for &r in cfg.order() {
        let b = cfg.block(r);
        if b.successors().len() >= 2 {
            for &s in b.successors() {
                assert!(
                    cfg.block(s).predecessors().len() < 2,
                    "critical edge from block {} to block {}",
                    b.idx(),
                    cfg.block(s).idx()
                );
            }
        }
    }

    // Every lowered node must be freshly allocated: no node id may appear
    // twice anywhere in the graph.
    let mut counts: FxHashMap<NodeId, u32> = FxHashMap::default();
    for block in cfg.blocks_in_order() {
        for stmt in block.body() {
            stmt.visit_ids(&mut |id| *counts.entry(id).or_insert(0) += 1);
        }
    }
    for (id, count) in &counts {
        assert_eq!(*count, 1, "AST node {id:?} appears {count} times in the graph");
    }
}

/// Per-statement checks: branch-test primitivity, invoke nesting, and the
/// shape of generated identifiers.
fn check_stmt(stmt: &LowStmt) {
    match &stmt.kind {
        LowStmtKind::Branch { test, .. } => {
            assert!(
                matches!(test, Operand::Name(_) | Operand::Num(_)),
                "branch test must be a name or a numeric literal"
            );
        }
        LowStmtKind::Invoke { inner, .. } => {
            assert!(
                !matches!(inner.kind, LowStmtKind::Invoke { .. }),
                "nested invoke"
            );
            check_stmt(inner);
        }
        LowStmtKind::Assign { target, .. } => match target {
            Target::Name(n) => check_generated_name(&n.sym),
            Target::Tuple { elts, .. } => {
                for e in elts {
                    check_generated_name(&e.sym);
                }
            }
            Target::Attribute { .. } | Target::Subscript { .. } => {}
        },
        _ => {}
    }

    stmt.visit_operands(&mut |op| {
        if let Operand::Name(n) = op {
            check_generated_name(&n.sym);
        }
    });
}

/// A `#`-prefixed identifier must be the reserved return-value slot or a
/// node-derived temporary (`#<id>`, `#<id>_<suffix>`, ...). User
/// identifiers can never start with `#`; the parser rejects them.
fn check_generated_name(sym: &str) {
    if let Some(rest) = sym.strip_prefix('#') {
        assert!(
            sym == "#rtnval" || rest.chars().next().is_some_and(|c| c.is_ascii_digit()),
            "identifier {sym:?} is not a generated temporary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lowered::{LowExpr, NameRef, NumLit};
    use pyrite_ast::ast::{NodeIdGen, Number};
    use pyrite_core::{Span, StringInterner};

    fn ret(ids: &NodeIdGen) -> LowStmt {
        LowStmt {
            id: ids.fresh(),
            span: Span::dummy(),
            kind: LowStmtKind::Return { value: None },
        }
    }

    #[test]
    fn test_minimal_graph_validates() {
        let ids = NodeIdGen::new();
        let mut cfg = Cfg::new();
        let entry = cfg.add_block("entry");
        cfg.push_stmt(entry, ret(&ids));
        validate(&cfg);
    }

    #[test]
    #[should_panic(expected = "empty body")]
    fn test_empty_block_rejected() {
        let ids = NodeIdGen::new();
        let mut cfg = Cfg::new();
        let entry = cfg.add_block("entry");
        cfg.push_stmt(entry, ret(&ids));
        cfg.add_block("");
        validate(&cfg);
    }

    #[test]
    #[should_panic(expected = "appears 2 times")]
    fn test_node_reuse_rejected() {
        let ids = NodeIdGen::new();
        let interner = StringInterner::new();
        let mut cfg = Cfg::new();
        let entry = cfg.add_block("entry");
        let shared = NameRef {
            id: ids.fresh(),
            span: Span::dummy(),
            sym: interner.intern("#0"),
        };
        for _ in 0..2 {
            cfg.push_stmt(
                entry,
                LowStmt {
                    id: ids.fresh(),
                    span: Span::dummy(),
                    kind: LowStmtKind::Assign {
                        target: Target::Name(shared.clone()),
                        value: LowExpr::Prim(Operand::Num(NumLit {
                            id: ids.fresh(),
                            span: Span::dummy(),
                            value: Number::Int(0),
                        })),
                    },
                },
            );
        }
        cfg.push_stmt(entry, ret(&ids));
        validate(&cfg);
    }

    #[test]
    #[should_panic(expected = "not a generated temporary")]
    fn test_malformed_temporary_rejected() {
        let ids = NodeIdGen::new();
        let interner = StringInterner::new();
        let mut cfg = Cfg::new();
        let entry = cfg.add_block("entry");
        cfg.push_stmt(
            entry,
            LowStmt {
                id: ids.fresh(),
                span: Span::dummy(),
                kind: LowStmtKind::Return {
                    value: Some(Operand::Name(NameRef {
                        id: ids.fresh(),
                        span: Span::dummy(),
                        sym: interner.intern("#bogus"),
                    })),
                },
            },
        );
        validate(&cfg);
    }
}
