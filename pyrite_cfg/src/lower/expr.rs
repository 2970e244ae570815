//! Expression lowering.
//!
//! [`CfgBuilder::remap`] flattens a nested expression into straight-line
//! assignments through fresh temporaries and returns a primitive operand.
//! Most expression kinds remap their children recursively and build one
//! freshly allocated composite; the short-circuiting kinds (`and`/`or`,
//! chained comparisons, conditional expressions) and the comprehensions
//! additionally open and wire new blocks.

use super::{CfgBuilder, LowerResult};
use crate::graph::BlockRef;
use crate::lowered::{
    Callee, CompositeKind, LowExpr, LowKeyword, LowStmt, LowStmtKind, NameRef, NumLit, Operand,
    Primitive, StrLit,
};
use pyrite_ast::ast::{self, BoolOpKind};
use smallvec::SmallVec;
use std::rc::Rc;

/// Which accumulator an in-place comprehension builds.
enum CompAcc<'n> {
    List(&'n ast::Expr),
    Set(&'n ast::Expr),
    Dict { key: &'n ast::Expr, value: &'n ast::Expr },
}

impl CfgBuilder<'_> {
    /// Structurally duplicate a primitive under a fresh node id.
    pub(crate) fn dup(&self, op: &Operand) -> Operand {
        op.duplicate(self.source.ids)
    }

    /// Remap `node` to a primitive operand, emitting assignments (and, for
    /// the control-flow kinds, blocks) into the graph as needed.
    ///
    /// Literals and loads of already-generated temporaries come back
    /// unchanged; everything else is assigned to a fresh temporary and a
    /// load of that temporary is returned.
    pub(crate) fn remap(&mut self, node: &ast::Expr) -> LowerResult<Operand> {
        match self.remap_value(node)? {
            LowExpr::Prim(op @ (Operand::Num(_) | Operand::Str(_))) => Ok(op),
            LowExpr::Prim(Operand::Name(n)) if n.is_temporary() => Ok(Operand::Name(n)),
            value => {
                let span = value.span();
                let name = self.node_name(node.id);
                self.push_assign_name(name.clone(), span, value);
                Ok(self.make_load(name, span))
            }
        }
    }

    /// Remap an optional expression.
    pub(crate) fn remap_opt(&mut self, node: Option<&ast::Expr>) -> LowerResult<Option<Operand>> {
        node.map(|n| self.remap(n)).transpose()
    }

    /// Remap `node` without forcing the result into a temporary: the
    /// result may be a composite. Used for expression statements, where
    /// the composite becomes the statement's value directly.
    pub(crate) fn remap_value(&mut self, node: &ast::Expr) -> LowerResult<LowExpr> {
        let span = node.span;
        let kind = match &node.kind {
            ast::ExprKind::Name { sym, .. } => {
                // Names keep their identity; the caller decides whether a
                // load needs to be materialized through a temporary.
                return Ok(LowExpr::Prim(Operand::Name(NameRef {
                    id: node.id,
                    span,
                    sym: sym.clone(),
                })));
            }
            ast::ExprKind::Num(n) => {
                return Ok(LowExpr::Prim(Operand::Num(NumLit {
                    id: node.id,
                    span,
                    value: *n,
                })));
            }
            ast::ExprKind::Str(s) => {
                return Ok(LowExpr::Prim(Operand::Str(StrLit {
                    id: node.id,
                    span,
                    value: s.clone(),
                })));
            }
            ast::ExprKind::Attribute { value, attr, .. } => CompositeKind::Attribute {
                value: self.remap(value)?,
                attr: self.mangle(attr),
                cls_only: false,
            },
            ast::ExprKind::Subscript { value, slice, .. } => CompositeKind::Subscript {
                value: self.remap(value)?,
                slice: self.remap_slice(slice)?,
            },
            ast::ExprKind::Index { .. } | ast::ExprKind::Slice { .. } => {
                return Ok(LowExpr::Prim(self.remap_slice(node)?));
            }
            ast::ExprKind::BinOp { op, left, right } => CompositeKind::BinOp {
                op: *op,
                left: self.remap(left)?,
                right: self.remap(right)?,
            },
            ast::ExprKind::UnaryOp { op, operand } => CompositeKind::UnaryOp {
                op: *op,
                operand: self.remap(operand)?,
            },
            ast::ExprKind::BoolOp { op, values } => {
                return self.remap_bool_op(node, *op, values);
            }
            ast::ExprKind::Compare {
                left,
                ops,
                comparators,
            } => return self.remap_compare(node, left, ops, comparators),
            ast::ExprKind::Call { .. } => return self.remap_call(node),
            ast::ExprKind::Tuple { elts, .. } => CompositeKind::Tuple(self.remap_list(elts)?),
            ast::ExprKind::List { elts, .. } => CompositeKind::List(self.remap_list(elts)?),
            ast::ExprKind::Set { elts } => CompositeKind::Set(self.remap_list(elts)?),
            ast::ExprKind::Dict { keys, values } => CompositeKind::Dict {
                keys: self.remap_list(keys)?,
                values: self.remap_list(values)?,
            },
            ast::ExprKind::IfExp { test, body, orelse } => {
                return self.remap_if_exp(node, test, body, orelse);
            }
            ast::ExprKind::ListComp { elt, generators } => {
                return self.remap_comprehension(node, generators, CompAcc::List(elt));
            }
            ast::ExprKind::SetComp { elt, generators } => {
                return self.remap_comprehension(node, generators, CompAcc::Set(elt));
            }
            ast::ExprKind::DictComp {
                key,
                value,
                generators,
            } => {
                return self.remap_comprehension(node, generators, CompAcc::Dict { key, value });
            }
            ast::ExprKind::GeneratorExp { elt, generators } => {
                return self.remap_generator_exp(node, elt, generators);
            }
            ast::ExprKind::Yield { value } => return self.remap_yield(node, value.as_deref()),
            ast::ExprKind::Lambda(lambda) => {
                // Defaults are evaluated in the enclosing scope; the body
                // is compiled when the lambda itself is.
                let defaults = lambda
                    .args
                    .defaults
                    .iter()
                    .map(|d| self.remap(d))
                    .collect::<LowerResult<Vec<_>>>()?;
                CompositeKind::Lambda {
                    node: Rc::clone(lambda),
                    defaults,
                }
            }
            ast::ExprKind::Repr { value } => CompositeKind::Repr(self.remap(value)?),
        };
        Ok(self.composite(kind, span))
    }

    fn remap_list(&mut self, exprs: &[ast::Expr]) -> LowerResult<Vec<Operand>> {
        exprs.iter().map(|e| self.remap(e)).collect()
    }

    /// Remap the slice position of a subscript. Literal indices stay
    /// inline; slice objects are built and spilled to a temporary.
    pub(crate) fn remap_slice(&mut self, slice: &ast::Expr) -> LowerResult<Operand> {
        match &slice.kind {
            ast::ExprKind::Index { value } => {
                if let ast::ExprKind::Num(n) = &value.kind {
                    Ok(Operand::Num(NumLit {
                        id: value.id,
                        span: value.span,
                        value: *n,
                    }))
                } else {
                    self.remap(value)
                }
            }
            ast::ExprKind::Slice { lower, upper, step } => {
                let lower = self.remap_opt(lower.as_deref())?;
                let upper = self.remap_opt(upper.as_deref())?;
                let step = self.remap_opt(step.as_deref())?;
                let composite = self.composite(CompositeKind::Slice { lower, upper, step }, slice.span);
                let name = self.node_name(slice.id);
                self.push_assign_name(name.clone(), slice.span, composite);
                Ok(self.make_load(name, slice.span))
            }
            _ => self.remap(slice),
        }
    }

    fn remap_call(&mut self, node: &ast::Expr) -> LowerResult<LowExpr> {
        let ast::ExprKind::Call {
            func,
            args,
            keywords,
            starargs,
            kwargs,
        } = &node.kind
        else {
            unreachable!()
        };

        // An attribute callee stays fused with the call so method calls
        // survive as one expression.
        let func = match &func.kind {
            ast::ExprKind::Attribute { value, attr, .. } => Callee::Attr {
                id: self.fresh_id(),
                span: func.span,
                value: self.remap(value)?,
                attr: self.mangle(attr),
                cls_only: false,
            },
            _ => Callee::Value(self.remap(func)?),
        };

        let args = self.remap_list(args)?;
        let keywords = keywords
            .iter()
            .map(|k| {
                Ok(LowKeyword {
                    name: k.name.clone(),
                    value: self.remap(&k.value)?,
                })
            })
            .collect::<LowerResult<Vec<_>>>()?;
        let starargs = self.remap_opt(starargs.as_deref())?;
        let kwargs = self.remap_opt(kwargs.as_deref())?;

        Ok(self.composite(
            CompositeKind::Call {
                func,
                args,
                keywords,
                starargs,
                kwargs,
            },
            node.span,
        ))
    }

    /// `a and b and ...` / `a or b or ...`: evaluate operands left to
    /// right into one result temporary, short-circuiting to a common exit.
    fn remap_bool_op(
        &mut self,
        node: &ast::Expr,
        op: BoolOpKind,
        values: &[ast::Expr],
    ) -> LowerResult<LowExpr> {
        let name = self.node_name(node.id);
        let exit = self.cfg.add_deferred_block("");

        for value in &values[..values.len() - 1] {
            let val = self.remap(value)?;
            let val_dup = self.dup(&val);
            self.push_assign_name(name.clone(), value.span, LowExpr::Prim(val));
            let test = self.call_nonzero(LowExpr::Prim(val_dup));

            let was = self.cur.expect("boolop with no current block");
            let next = self.cfg.add_block("");
            let short_circuit = self.cfg.add_block("");
            self.cfg.connect(was, next, false);
            self.cfg.connect(was, short_circuit, false);

            let (iftrue, iffalse) = match op {
                BoolOpKind::Or => (short_circuit, next),
                BoolOpKind::And => (next, short_circuit),
            };
            let id = self.fresh_id();
            self.emit(LowStmt {
                id,
                span: node.span,
                kind: LowStmtKind::Branch {
                    test,
                    iftrue,
                    iffalse,
                },
            });

            self.cur = Some(short_circuit);
            self.push_jump(exit, false);
            self.cur = Some(next);
        }

        let last = values.last().expect("boolop needs operands");
        let final_val = self.remap(last)?;
        self.push_assign_name(name.clone(), last.span, LowExpr::Prim(final_val));
        self.push_jump(exit, false);

        self.cfg.place_block(exit);
        self.cur = Some(exit);

        Ok(LowExpr::Prim(self.make_load(name, node.span)))
    }

    /// Comparisons: a single comparison stays one composite; a chain
    /// decomposes into two-operand comparisons joined by short-circuit-and
    /// semantics, the right operand of each step reused (via duplication)
    /// as the left operand of the next.
    fn remap_compare(
        &mut self,
        node: &ast::Expr,
        left: &ast::Expr,
        ops: &[ast::CmpOp],
        comparators: &[ast::Expr],
    ) -> LowerResult<LowExpr> {
        if ops.len() == 1 {
            let kind = CompositeKind::Compare {
                op: ops[0],
                left: self.remap(left)?,
                right: self.remap(&comparators[0])?,
            };
            return Ok(self.composite(kind, node.span));
        }

        let name = self.node_name(node.id);
        let exit = self.cfg.add_deferred_block("");
        let mut left = self.remap(left)?;

        for (i, (op, comparator)) in ops.iter().zip(comparators).enumerate() {
            let right = self.remap(comparator)?;
            let next_left = (i + 1 < ops.len()).then(|| self.dup(&right));

            let cmp = self.composite(
                CompositeKind::Compare {
                    op: *op,
                    left,
                    right,
                },
                node.span,
            );
            self.push_assign_name(name.clone(), node.span, cmp);
            let load = self.make_load(name.clone(), node.span);
            let test = self.call_nonzero(LowExpr::Prim(load));

            let was = self.cur.expect("compare with no current block");
            let next = self.cfg.add_block("");
            let short_circuit = self.cfg.add_block("");
            self.cfg.connect(was, next, false);
            self.cfg.connect(was, short_circuit, false);

            let id = self.fresh_id();
            self.emit(LowStmt {
                id,
                span: node.span,
                kind: LowStmtKind::Branch {
                    test,
                    iftrue: next,
                    iffalse: short_circuit,
                },
            });

            self.cur = Some(short_circuit);
            self.push_jump(exit, false);
            self.cur = Some(next);

            left = match next_left {
                Some(l) => l,
                // The last comparison's result already sits in `name`.
                None => break,
            };
        }

        self.push_jump(exit, false);
        self.cfg.place_block(exit);
        self.cur = Some(exit);

        Ok(LowExpr::Prim(self.make_load(name, node.span)))
    }

    /// `body if test else orelse`: branch, assign each arm into one result
    /// temporary, rejoin.
    fn remap_if_exp(
        &mut self,
        node: &ast::Expr,
        test: &ast::Expr,
        body: &ast::Expr,
        orelse: &ast::Expr,
    ) -> LowerResult<LowExpr> {
        let rtn_name = self.node_name(node.id);
        let iftrue = self.cfg.add_deferred_block("iftrue");
        let iffalse = self.cfg.add_deferred_block("iffalse");
        let exit = self.cfg.add_deferred_block("");

        let test = self.remap(test)?;
        self.push_branch(LowExpr::Prim(test), iftrue, iffalse);

        self.cfg.place_block(iftrue);
        self.cur = Some(iftrue);
        let body_val = self.remap(body)?;
        self.push_assign_name(rtn_name.clone(), body.span, LowExpr::Prim(body_val));
        self.push_jump(exit, false);

        self.cfg.place_block(iffalse);
        self.cur = Some(iffalse);
        let orelse_val = self.remap(orelse)?;
        self.push_assign_name(rtn_name.clone(), orelse.span, LowExpr::Prim(orelse_val));
        self.push_jump(exit, false);

        self.cfg.place_block(exit);
        self.cur = Some(exit);

        Ok(LowExpr::Prim(self.make_load(rtn_name, node.span)))
    }

    /// Comprehensions lower in place as nested loops: one iterator, test
    /// block, and body block per generator clause, with the innermost body
    /// feeding the accumulator. Exit blocks are placed outermost-last so
    /// the layout nests like handwritten loops.
    fn remap_comprehension(
        &mut self,
        node: &ast::Expr,
        generators: &[ast::Comprehension],
        acc: CompAcc<'_>,
    ) -> LowerResult<LowExpr> {
        let span = node.span;
        let rtn_name = self.node_name(node.id);
        let seed = match &acc {
            CompAcc::List(_) => CompositeKind::List(Vec::new()),
            CompAcc::Set(_) => CompositeKind::Set(Vec::new()),
            CompAcc::Dict { .. } => CompositeKind::Dict {
                keys: Vec::new(),
                values: Vec::new(),
            },
        };
        let seed = self.composite(seed, span);
        self.push_assign_name(rtn_name.clone(), span, seed);

        let mut exit_blocks: SmallVec<[BlockRef; 4]> = SmallVec::new();

        // Where the current level jumps once its iteration is finished:
        // none for the outermost level, the next-outer test block for the
        // inner ones.
        let mut finished_block: Option<BlockRef> = None;

        for (i, clause) in generators.iter().enumerate() {
            let is_innermost = i + 1 == generators.len();

            let iterable = self.remap(&clause.iter)?;
            let iter_call =
                self.composite(CompositeKind::Primitive(Primitive::GetIter(iterable)), span);
            let iter_name = self.node_name_idx(node.id, "lc_iter", i);
            self.push_assign_name(iter_name.clone(), span, iter_call);

            let test_block = self.cfg.add_block("comprehension_test");
            self.push_jump(test_block, false);
            self.cur = Some(test_block);

            let hasnext = self.protocol_call(&iter_name, "__hasnext__", span);
            let test = self.call_nonzero(hasnext);

            let body_block = self.cfg.add_block("comprehension_body");
            let exit_block = self.cfg.add_deferred_block("comprehension_exit");
            exit_blocks.push(exit_block);

            let was = self.cur.expect("comprehension test block vanished");
            self.cfg.connect(was, body_block, false);
            self.cfg.connect(was, exit_block, false);
            let id = self.fresh_id();
            self.emit(LowStmt {
                id,
                span,
                kind: LowStmtKind::Branch {
                    test,
                    iftrue: body_block,
                    iffalse: exit_block,
                },
            });

            self.cur = Some(body_block);
            let next_attr_id = self.fresh_id();
            let next_name = self.node_name(next_attr_id);
            let next_call = self.composite(
                CompositeKind::Call {
                    func: Callee::Attr {
                        id: next_attr_id,
                        span,
                        value: self.make_load(iter_name.clone(), span),
                        attr: self.intern("next"),
                        cls_only: true,
                    },
                    args: Vec::new(),
                    keywords: Vec::new(),
                    starargs: None,
                    kwargs: None,
                },
                span,
            );
            self.push_assign_name(next_name.clone(), span, next_call);
            let next_load = self.make_load(next_name, span);
            self.push_assign_target(&clause.target, next_load)?;

            for if_condition in &clause.ifs {
                let cond = self.remap(if_condition)?;
                let test = self.call_nonzero(LowExpr::Prim(cond));

                let was = self.cur.expect("comprehension body vanished");
                let body_tramp = self.cfg.add_block("comprehension_if_trampoline");
                let body_continue = self.cfg.add_block("comprehension_if_continue");
                self.cfg.connect(was, body_tramp, false);
                self.cfg.connect(was, body_continue, false);
                let id = self.fresh_id();
                self.emit(LowStmt {
                    id,
                    span,
                    kind: LowStmtKind::Branch {
                        test,
                        iftrue: body_continue,
                        iffalse: body_tramp,
                    },
                });

                self.cur = Some(body_tramp);
                self.push_jump(test_block, true);

                self.cur = Some(body_continue);
            }

            let body_end = self.cur;

            debug_assert_eq!(finished_block.is_some(), i != 0);
            if let Some(finished) = finished_block {
                self.cur = Some(exit_block);
                self.push_jump(finished, true);
            }
            finished_block = Some(test_block);

            self.cur = body_end;
            if is_innermost {
                let call = match &acc {
                    CompAcc::List(elt) => {
                        let elt = self.remap(elt)?;
                        self.accumulator_call(&rtn_name, "append", vec![elt], span)
                    }
                    CompAcc::Set(elt) => {
                        let elt = self.remap(elt)?;
                        self.accumulator_call(&rtn_name, "add", vec![elt], span)
                    }
                    CompAcc::Dict { key, value } => {
                        let key = self.remap(key)?;
                        let value = self.remap(value)?;
                        self.accumulator_call(&rtn_name, "__setitem__", vec![key, value], span)
                    }
                };
                let id = self.fresh_id();
                self.emit(LowStmt {
                    id,
                    span,
                    kind: LowStmtKind::Expr { value: call },
                });

                self.push_jump(test_block, true);
                self.cur = Some(exit_blocks[0]);
            }
        }

        // Place the exit blocks innermost-first so the structure nests the
        // way explicit nested for loops would.
        for &exit in exit_blocks.iter().rev() {
            self.cfg.place_block(exit);
        }

        Ok(LowExpr::Prim(self.make_load(rtn_name, span)))
    }

    /// A no-argument class-only protocol call on a named temporary.
    pub(crate) fn protocol_call(
        &mut self,
        object: &pyrite_core::InternedString,
        method: &str,
        span: pyrite_core::Span,
    ) -> LowExpr {
        self.composite(
            CompositeKind::Call {
                func: Callee::Attr {
                    id: self.fresh_id(),
                    span,
                    value: self.make_load(object.clone(), span),
                    attr: self.intern(method),
                    cls_only: true,
                },
                args: Vec::new(),
                keywords: Vec::new(),
                starargs: None,
                kwargs: None,
            },
            span,
        )
    }

    fn accumulator_call(
        &mut self,
        accumulator: &pyrite_core::InternedString,
        method: &str,
        args: Vec<Operand>,
        span: pyrite_core::Span,
    ) -> LowExpr {
        self.composite(
            CompositeKind::Call {
                func: Callee::Attr {
                    id: self.fresh_id(),
                    span,
                    value: self.make_load(accumulator.clone(), span),
                    attr: self.intern(method),
                    cls_only: true,
                },
                args,
                keywords: Vec::new(),
                starargs: None,
                kwargs: None,
            },
            span,
        )
    }

    /// A generator expression synthesizes a fresh generator function whose
    /// body is the equivalent nested `for`/`if` tree ending in a yield,
    /// registers it with the scoping analysis, and evaluates to a call of
    /// that function on the outermost iterable (which, alone among the
    /// iterables, is evaluated in the enclosing scope).
    fn remap_generator_exp(
        &mut self,
        node: &ast::Expr,
        elt: &ast::Expr,
        generators: &[ast::Comprehension],
    ) -> LowerResult<LowExpr> {
        assert!(!generators.is_empty(), "generator expression without generators");
        let span = node.span;
        let ids = self.source.ids;

        let first = self.remap(&generators[0].iter)?;

        let func_stmt_id = self.fresh_id();
        let func_name = self.node_name(func_stmt_id);
        let first_generator_name = self.node_name(generators[0].id);

        // Build the nested loop body innermost-out.
        let yield_expr = ast::Expr::new(
            ids,
            ast::ExprKind::Yield {
                value: Some(Box::new(elt.clone())),
            },
            span,
        );
        let mut body = vec![ast::Stmt::new(
            ids,
            ast::StmtKind::Expr { value: yield_expr },
            span,
        )];
        for (i, clause) in generators.iter().enumerate().rev() {
            for if_condition in clause.ifs.iter().rev() {
                // The synthesized tree goes through CFG construction
                // itself, so the test stays a plain expression here.
                body = vec![ast::Stmt::new(
                    ids,
                    ast::StmtKind::If {
                        test: if_condition.clone(),
                        body,
                        orelse: Vec::new(),
                    },
                    span,
                )];
            }
            let iter = if i == 0 {
                ast::Expr::new(
                    ids,
                    ast::ExprKind::Name {
                        sym: first_generator_name.clone(),
                        ctx: ast::ExprContext::Load,
                    },
                    span,
                )
            } else {
                clause.iter.clone()
            };
            body = vec![ast::Stmt::new(
                ids,
                ast::StmtKind::For {
                    target: clause.target.clone(),
                    iter,
                    body,
                    orelse: Vec::new(),
                },
                span,
            )];
        }

        let func = Rc::new(ast::FunctionDef {
            name: func_name.clone(),
            args: ast::Arguments {
                args: vec![ast::Expr::new(
                    ids,
                    ast::ExprKind::Name {
                        sym: first_generator_name,
                        ctx: ast::ExprContext::Param,
                    },
                    span,
                )],
                defaults: Vec::new(),
                vararg: None,
                kwarg: None,
            },
            body,
            decorators: Vec::new(),
        });

        self.source
            .scoping
            .register_scope_replacement(node.id, Rc::clone(&func));

        self.emit(LowStmt {
            id: func_stmt_id,
            span,
            kind: LowStmtKind::FunctionDef {
                node: func,
                decorators: Vec::new(),
                defaults: Vec::new(),
            },
        });

        let call = CompositeKind::Call {
            func: Callee::Value(self.make_load(func_name, span)),
            args: vec![first],
            keywords: Vec::new(),
            starargs: None,
            kwargs: None,
        };
        Ok(self.composite(call, span))
    }

    /// `yield x` lowers to an assignment of the yield into a temporary
    /// followed by an exception-info invalidation, so exception state seen
    /// after resumption reflects the resumer's context.
    fn remap_yield(
        &mut self,
        node: &ast::Expr,
        value: Option<&ast::Expr>,
    ) -> LowerResult<LowExpr> {
        let span = node.span;
        let value = self.remap_opt(value)?;
        let yield_id = self.fresh_id();
        let composite = LowExpr::Composite {
            id: yield_id,
            span,
            kind: CompositeKind::Yield(value),
        };
        let name = self.node_name(yield_id);
        self.push_assign_name(name.clone(), span, composite);

        let uncache = self.composite(CompositeKind::Primitive(Primitive::UncacheExcInfo), span);
        let id = self.fresh_id();
        self.emit(LowStmt {
            id,
            span,
            kind: LowStmtKind::Expr { value: uncache },
        });

        Ok(LowExpr::Prim(self.make_load(name, span)))
    }
}
