//! Statement lowering.
//!
//! Each statement kind turns into blocks, branches, jumps, and
//! assignments. Compound statements manage the current insertion block
//! and the continuation/handler stacks; simple statements reduce to
//! remapped assignments and pass-throughs.

use super::{CfgBuilder, FutureFlags, LowerError, LowerResult, RootKind, Why, RETURN_NAME};
use crate::lowered::{
    Callee, CompositeKind, DelTarget, ImportNames, LowExpr, LowStmt, LowStmtKind, NameRef, Operand,
    Primitive, StrLit, Target,
};
use pyrite_ast::ast;
use std::rc::Rc;

impl CfgBuilder<'_> {
    /// Lower one statement into the graph.
    pub(crate) fn lower_stmt(&mut self, stmt: &ast::Stmt) -> LowerResult<()> {
        // Some inputs are rejected outright, reachable or not.
        match &stmt.kind {
            ast::StmtKind::Return { .. } => {
                if !matches!(
                    self.source.root,
                    RootKind::FunctionDef | RootKind::Lambda | RootKind::Expression
                ) {
                    return Err(LowerError::new("'return' outside function", stmt.span));
                }
            }
            ast::StmtKind::Exec { .. } => {
                return Err(LowerError::new("'exec' currently not supported", stmt.span));
            }
            _ => {}
        }

        // Statements after a terminator in the same suite are dead.
        if self.cur.is_none() {
            return Ok(());
        }

        match &stmt.kind {
            ast::StmtKind::Expr { value } => {
                let value = self.remap_value(value)?;
                let id = self.fresh_id();
                self.emit(LowStmt {
                    id,
                    span: stmt.span,
                    kind: LowStmtKind::Expr { value },
                });
            }

            ast::StmtKind::Assign { targets, value } => {
                let value = self.remap(value)?;
                for target in targets {
                    let value = self.dup(&value);
                    self.push_assign_target(target, value)?;
                }
            }

            ast::StmtKind::AugAssign { target, op, value } => {
                self.lower_aug_assign(stmt, target, *op, value)?;
            }

            ast::StmtKind::Print {
                dest,
                values,
                newline,
            } => self.lower_print(stmt, dest.as_ref(), values, *newline)?,

            ast::StmtKind::Return { value } => {
                let value = match value {
                    Some(v) => self.remap(v)?,
                    None => {
                        let none = self.intern("None");
                        self.make_load(none, stmt.span)
                    }
                };
                self.do_return(value, stmt.span);
            }

            ast::StmtKind::Pass => {}

            ast::StmtKind::Break => self.do_break(stmt.span)?,

            ast::StmtKind::Continue => self.do_continue(stmt.span)?,

            ast::StmtKind::If { test, body, orelse } => {
                self.lower_if(test, body, orelse)?;
            }

            ast::StmtKind::While { test, body, orelse } => {
                self.lower_while(test, body, orelse)?;
            }

            ast::StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => self.lower_for(stmt, target, iter, body, orelse)?,

            ast::StmtKind::Raise {
                exc_type,
                value,
                traceback,
            } => {
                let exc_type = self.remap_opt(exc_type.as_ref())?;
                let value = self.remap_opt(value.as_ref())?;
                let traceback = self.remap_opt(traceback.as_ref())?;
                let id = self.fresh_id();
                self.emit(LowStmt {
                    id,
                    span: stmt.span,
                    kind: LowStmtKind::Raise {
                        exc_type,
                        value,
                        traceback,
                    },
                });
                self.cur = None;
            }

            ast::StmtKind::TryExcept {
                body,
                handlers,
                orelse,
            } => self.lower_try_except(stmt, body, handlers, orelse)?,

            ast::StmtKind::TryFinally { body, finalbody } => {
                self.lower_try_finally(stmt, body, finalbody)?;
            }

            ast::StmtKind::With {
                context_expr,
                optional_vars,
                body,
            } => self.lower_with(stmt, context_expr, optional_vars.as_ref(), body)?,

            ast::StmtKind::Assert { test, msg } => {
                self.lower_assert(stmt, test, msg.as_ref())?;
            }

            ast::StmtKind::Delete { targets } => {
                for target in targets {
                    self.lower_delete_target(target)?;
                }
            }

            ast::StmtKind::Import { names } => self.lower_import(stmt, names),

            ast::StmtKind::ImportFrom {
                module,
                names,
                level,
            } => self.lower_import_from(stmt, module, names, *level)?,

            ast::StmtKind::Global { names } => {
                let id = self.fresh_id();
                self.emit(LowStmt {
                    id,
                    span: stmt.span,
                    kind: LowStmtKind::Global {
                        names: names.clone(),
                    },
                });
            }

            ast::StmtKind::FunctionDef(def) => {
                // Decorators are evaluated before the defaults; the body is
                // not lowered here (it gets its own CFG later).
                let decorators = def
                    .decorators
                    .iter()
                    .map(|d| self.remap(d))
                    .collect::<LowerResult<Vec<_>>>()?;
                let defaults = def
                    .args
                    .defaults
                    .iter()
                    .map(|d| self.remap(d))
                    .collect::<LowerResult<Vec<_>>>()?;
                self.emit(LowStmt {
                    id: stmt.id,
                    span: stmt.span,
                    kind: LowStmtKind::FunctionDef {
                        node: Rc::clone(def),
                        decorators,
                        defaults,
                    },
                });
            }

            ast::StmtKind::ClassDef(def) => {
                let decorators = def
                    .decorators
                    .iter()
                    .map(|d| self.remap(d))
                    .collect::<LowerResult<Vec<_>>>()?;
                let bases = def
                    .bases
                    .iter()
                    .map(|b| self.remap(b))
                    .collect::<LowerResult<Vec<_>>>()?;
                self.emit(LowStmt {
                    id: stmt.id,
                    span: stmt.span,
                    kind: LowStmtKind::ClassDef {
                        node: Rc::clone(def),
                        decorators,
                        bases,
                    },
                });
            }

            ast::StmtKind::Exec { .. } => unreachable!("rejected above"),
        }
        Ok(())
    }

    // =========================================================================
    // Assignment
    // =========================================================================

    /// Emit the store(s) assigning `value` into `target`.
    ///
    /// Subscript and attribute targets remap their addressable parts into
    /// temporaries first; tuple/list targets destructure through fresh
    /// per-element temporaries and recurse.
    pub(crate) fn push_assign_target(
        &mut self,
        target: &ast::Expr,
        value: Operand,
    ) -> LowerResult<()> {
        let span = target.span;
        match &target.kind {
            ast::ExprKind::Name { sym, .. } => {
                let id = self.fresh_id();
                self.emit(LowStmt {
                    id,
                    span: value.span(),
                    kind: LowStmtKind::Assign {
                        target: Target::Name(NameRef {
                            id: target.id,
                            span,
                            sym: sym.clone(),
                        }),
                        value: LowExpr::Prim(value),
                    },
                });
            }
            ast::ExprKind::Subscript {
                value: object,
                slice,
                ..
            } => {
                let object = self.remap(object)?;
                let slice = self.remap_slice(slice)?;
                let id = self.fresh_id();
                let target_id = self.fresh_id();
                self.emit(LowStmt {
                    id,
                    span: value.span(),
                    kind: LowStmtKind::Assign {
                        target: Target::Subscript {
                            id: target_id,
                            span,
                            value: object,
                            slice,
                        },
                        value: LowExpr::Prim(value),
                    },
                });
            }
            ast::ExprKind::Attribute {
                value: object,
                attr,
                ..
            } => {
                let object = self.remap(object)?;
                let attr = self.mangle(attr);
                let id = self.fresh_id();
                let target_id = self.fresh_id();
                self.emit(LowStmt {
                    id,
                    span: value.span(),
                    kind: LowStmtKind::Assign {
                        target: Target::Attribute {
                            id: target_id,
                            span,
                            value: object,
                            attr,
                        },
                        value: LowExpr::Prim(value),
                    },
                });
            }
            ast::ExprKind::Tuple { elts, .. } | ast::ExprKind::List { elts, .. } => {
                let mut names = Vec::with_capacity(elts.len());
                for i in 0..elts.len() {
                    names.push(self.node_name_idx(target.id, "", i));
                }
                let elt_refs = names
                    .iter()
                    .map(|name| NameRef {
                        id: self.fresh_id(),
                        span,
                        sym: name.clone(),
                    })
                    .collect();
                let id = self.fresh_id();
                let target_id = self.fresh_id();
                self.emit(LowStmt {
                    id,
                    span: value.span(),
                    kind: LowStmtKind::Assign {
                        target: Target::Tuple {
                            id: target_id,
                            span,
                            elts: elt_refs,
                        },
                        value: LowExpr::Prim(value),
                    },
                });
                for (name, elt) in names.into_iter().zip(elts) {
                    let load = self.make_load(name, span);
                    self.push_assign_target(elt, load)?;
                }
            }
            kind => panic!("unexpected assignment target: {kind:?}"),
        }
        Ok(())
    }

    /// `target op= value`: evaluate the target's addressable parts once,
    /// load the current value through them, compute the augmented binary
    /// operation into a temporary, and only then store back. Keeping the
    /// store separate from the operation preserves exception safety.
    fn lower_aug_assign(
        &mut self,
        stmt: &ast::Stmt,
        target: &ast::Expr,
        op: ast::BinOp,
        value: &ast::Expr,
    ) -> LowerResult<()> {
        let span = stmt.span;
        let (lowered_target, lhs) = match &target.kind {
            ast::ExprKind::Name { sym, .. } => {
                let saved = self.node_name(target.id);
                let current = self.make_load(sym.clone(), target.span);
                self.push_assign_name(saved.clone(), span, LowExpr::Prim(current));
                (
                    Target::Name(NameRef {
                        id: target.id,
                        span: target.span,
                        sym: sym.clone(),
                    }),
                    self.make_load(saved, span),
                )
            }
            ast::ExprKind::Subscript {
                value: object,
                slice,
                ..
            } => {
                let object = self.remap(object)?;
                let slice = self.remap_slice(slice)?;
                let object_dup = self.dup(&object);
                let slice_dup = self.dup(&slice);
                let load = self.composite(
                    CompositeKind::Subscript {
                        value: object_dup,
                        slice: slice_dup,
                    },
                    span,
                );
                let lhs = self.into_operand(load);
                let target_id = self.fresh_id();
                (
                    Target::Subscript {
                        id: target_id,
                        span: target.span,
                        value: object,
                        slice,
                    },
                    lhs,
                )
            }
            ast::ExprKind::Attribute {
                value: object,
                attr,
                ..
            } => {
                let object = self.remap(object)?;
                let attr = self.mangle(attr);
                let object_dup = self.dup(&object);
                let load = self.composite(
                    CompositeKind::Attribute {
                        value: object_dup,
                        attr: attr.clone(),
                        cls_only: false,
                    },
                    span,
                );
                let lhs = self.into_operand(load);
                let target_id = self.fresh_id();
                (
                    Target::Attribute {
                        id: target_id,
                        span: target.span,
                        value: object,
                        attr,
                    },
                    lhs,
                )
            }
            kind => panic!("unexpected augmented-assignment target: {kind:?}"),
        };

        let rhs = self.remap(value)?;
        let binop = self.composite(
            CompositeKind::AugBinOp {
                op,
                left: lhs,
                right: rhs,
            },
            span,
        );
        let result = self.node_name(stmt.id);
        self.push_assign_name(result.clone(), span, binop);
        let load = self.make_load(result, span);
        let id = self.fresh_id();
        self.emit(LowStmt {
            id,
            span,
            kind: LowStmtKind::Assign {
                target: lowered_target,
                value: LowExpr::Prim(load),
            },
        });
        Ok(())
    }

    // =========================================================================
    // Control flow
    // =========================================================================

    fn lower_if(
        &mut self,
        test: &ast::Expr,
        body: &[ast::Stmt],
        orelse: &[ast::Stmt],
    ) -> LowerResult<()> {
        let test_val = self.remap(test)?;
        let test_op = self.call_nonzero(LowExpr::Prim(test_val));
        let starting = self.cur.expect("if with no current block");

        let exit = self.cfg.add_deferred_block("ifexit");
        let iftrue = self.cfg.add_block("iftrue");
        let iffalse = self.cfg.add_deferred_block("iffalse");

        let id = self.fresh_id();
        self.emit(LowStmt {
            id,
            span: test.span,
            kind: LowStmtKind::Branch {
                test: test_op,
                iftrue,
                iffalse,
            },
        });
        self.cfg.connect(starting, iftrue, false);

        self.cur = Some(iftrue);
        for s in body {
            self.lower_stmt(s)?;
        }
        if self.cur.is_some() {
            self.push_jump(exit, false);
        }

        self.cfg.connect(starting, iffalse, false);
        self.cfg.place_block(iffalse);
        self.cur = Some(iffalse);
        for s in orelse {
            self.lower_stmt(s)?;
        }
        if self.cur.is_some() {
            self.push_jump(exit, false);
        }

        if self.cfg.block(exit).predecessors().is_empty() {
            self.cur = None;
        } else {
            self.cfg.place_block(exit);
            self.cur = Some(exit);
        }
        Ok(())
    }

    fn lower_while(
        &mut self,
        test: &ast::Expr,
        body: &[ast::Stmt],
        orelse: &[ast::Stmt],
    ) -> LowerResult<()> {
        let test_block = self.cfg.add_block("while_test");
        self.push_jump(test_block, false);
        self.cur = Some(test_block);

        let test_val = self.remap(test)?;
        let test_op = self.call_nonzero(LowExpr::Prim(test_val));
        // Remapping the condition may have opened new blocks.
        let test_block_end = self.cur.expect("while test block vanished");

        // The loop exit is needed as a break target well before it can be
        // laid out (it goes after the else clause).
        let end = self.cfg.add_deferred_block("while_exit");
        self.push_loop_continuation(test_block, end);

        let body_block = self.cfg.add_block("while_body_start");
        let orelse_block = self.cfg.add_deferred_block("while_orelse_start");

        let id = self.fresh_id();
        self.emit(LowStmt {
            id,
            span: test.span,
            kind: LowStmtKind::Branch {
                test: test_op,
                iftrue: body_block,
                iffalse: orelse_block,
            },
        });
        self.cfg.connect(test_block_end, body_block, false);

        self.cur = Some(body_block);
        for s in body {
            self.lower_stmt(s)?;
        }
        if self.cur.is_some() {
            self.push_jump(test_block, true);
        }
        self.pop_continuation();

        self.cfg.connect(test_block_end, orelse_block, false);
        self.cfg.place_block(orelse_block);
        self.cur = Some(orelse_block);
        for s in orelse {
            self.lower_stmt(s)?;
        }
        if self.cur.is_some() {
            self.push_jump(end, false);
        }

        if self.cfg.block(end).predecessors().is_empty() {
            self.cur = None;
        } else {
            self.cfg.place_block(end);
            self.cur = Some(end);
        }
        Ok(())
    }

    fn lower_for(
        &mut self,
        stmt: &ast::Stmt,
        target: &ast::Expr,
        iter: &ast::Expr,
        body: &[ast::Stmt],
        orelse: &[ast::Stmt],
    ) -> LowerResult<()> {
        let span = stmt.span;

        let iterable = self.remap(iter)?;
        let iter_call = self.composite(
            CompositeKind::Primitive(Primitive::GetIter(iterable)),
            span,
        );
        let iter_name = self.node_name_sfx(stmt.id, "iter");
        self.push_assign_name(iter_name.clone(), span, iter_call);

        let test_block = self.cfg.add_block("");
        self.push_jump(test_block, false);
        self.cur = Some(test_block);

        let hasnext = self.protocol_call(&iter_name, "__hasnext__", span);
        let test_op = self.call_nonzero(hasnext);
        let was = self.cur.expect("for test block vanished");

        let test_true = self.cfg.add_block("");
        let test_false = self.cfg.add_block("");
        let id = self.fresh_id();
        self.emit(LowStmt {
            id,
            span,
            kind: LowStmtKind::Branch {
                test: test_op,
                iftrue: test_true,
                iffalse: test_false,
            },
        });
        self.cfg.connect(was, test_true, false);
        self.cfg.connect(was, test_false, false);

        let loop_block = self.cfg.add_block("");
        let end_block = self.cfg.add_deferred_block("");
        let else_block = self.cfg.add_deferred_block("");

        // Both branch targets trampoline so neither edge is critical.
        self.cur = Some(test_true);
        self.push_jump(loop_block, false);
        self.cur = Some(test_false);
        self.push_jump(else_block, false);

        self.push_loop_continuation(test_block, end_block);

        self.cur = Some(loop_block);
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
        self.push_assign_target(target, next_load)?;

        for s in body {
            self.lower_stmt(s)?;
        }
        self.pop_continuation();

        if self.cur.is_some() {
            // Re-test at the end of the body instead of jumping straight
            // to the test block, which would create a critical edge.
            let hasnext = self.protocol_call(&iter_name, "__hasnext__", span);
            let end_test = self.call_nonzero(hasnext);
            let was = self.cur.expect("for body end vanished");

            let end_true = self.cfg.add_block("");
            let end_false = self.cfg.add_block("");
            let id = self.fresh_id();
            self.emit(LowStmt {
                id,
                span,
                kind: LowStmtKind::Branch {
                    test: end_test,
                    iftrue: end_true,
                    iffalse: end_false,
                },
            });
            self.cfg.connect(was, end_true, false);
            self.cfg.connect(was, end_false, false);

            self.cur = Some(end_true);
            self.push_jump(loop_block, true);
            self.cur = Some(end_false);
            self.push_jump(else_block, false);
        }

        self.cfg.place_block(else_block);
        self.cur = Some(else_block);
        for s in orelse {
            self.lower_stmt(s)?;
        }
        if self.cur.is_some() {
            self.push_jump(end_block, false);
        }

        if self.cfg.block(end_block).predecessors().is_empty() {
            self.cur = None;
        } else {
            self.cfg.place_block(end_block);
            self.cur = Some(end_block);
        }
        Ok(())
    }

    // =========================================================================
    // Exceptions and cleanup
    // =========================================================================

    fn lower_try_except(
        &mut self,
        stmt: &ast::Stmt,
        body: &[ast::Stmt],
        handlers: &[ast::ExceptHandler],
        orelse: &[ast::Stmt],
    ) -> LowerResult<()> {
        // A try with no except clauses protects nothing.
        if handlers.is_empty() {
            for s in body {
                self.lower_stmt(s)?;
            }
            return Ok(());
        }

        let handler_block = self.cfg.add_deferred_block("");
        let type_name = self.node_name_sfx(stmt.id, "type");
        let value_name = self.node_name_sfx(stmt.id, "value");
        let traceback_name = self.node_name_sfx(stmt.id, "traceback");
        self.push_exc_handler(
            handler_block,
            type_name.clone(),
            value_name.clone(),
            traceback_name.clone(),
        );

        for s in body {
            self.lower_stmt(s)?;
        }

        self.pop_exc_handler();

        // The else clause runs unprotected.
        for s in orelse {
            self.lower_stmt(s)?;
        }

        let join_block = self.cfg.add_deferred_block("");
        if self.cur.is_some() {
            self.push_jump(join_block, false);
        }

        if !self.cfg.block(handler_block).predecessors().is_empty() {
            self.cfg.place_block(handler_block);
            self.cur = Some(handler_block);

            let mut caught_all = false;
            for handler in handlers {
                assert!(!caught_all, "bare except clause not the last one in the list");

                let mut exc_next = None;
                if let Some(exc_type) = &handler.exc_type {
                    let handled_type = self.remap(exc_type)?;
                    let exc_obj = self.make_load(value_name.clone(), handler.span);
                    let is_caught = self.composite(
                        CompositeKind::Primitive(Primitive::IsInstance {
                            value: exc_obj,
                            class: handled_type,
                            false_on_non_class: true,
                        }),
                        handler.span,
                    );
                    let test = self.call_nonzero(is_caught);
                    let was = self.cur.expect("handler chain block vanished");

                    let exc_handle = self.cfg.add_block("");
                    let next = self.cfg.add_deferred_block("");
                    self.cfg.connect(was, exc_handle, false);
                    self.cfg.connect(was, next, false);
                    let id = self.fresh_id();
                    self.emit(LowStmt {
                        id,
                        span: handler.span,
                        kind: LowStmtKind::Branch {
                            test,
                            iftrue: exc_handle,
                            iffalse: next,
                        },
                    });
                    self.cur = Some(exc_handle);
                    exc_next = Some(next);
                } else {
                    caught_all = true;
                }

                let set_exc_info = self.composite(
                    CompositeKind::Primitive(Primitive::SetExcInfo {
                        exc_type: self.make_load(type_name.clone(), handler.span),
                        value: self.make_load(value_name.clone(), handler.span),
                        traceback: self.make_load(traceback_name.clone(), handler.span),
                    }),
                    handler.span,
                );
                let id = self.fresh_id();
                self.emit(LowStmt {
                    id,
                    span: handler.span,
                    kind: LowStmtKind::Expr {
                        value: set_exc_info,
                    },
                });

                if let Some(name) = &handler.name {
                    let bound = self.make_load(value_name.clone(), handler.span);
                    self.push_assign_target(name, bound)?;
                }

                for s in &handler.body {
                    self.lower_stmt(s)?;
                }
                if self.cur.is_some() {
                    self.push_jump(join_block, false);
                }

                match exc_next {
                    Some(next) => {
                        self.cfg.place_block(next);
                        self.cur = Some(next);
                    }
                    None => {
                        debug_assert!(caught_all);
                        self.cur = None;
                    }
                }
            }

            if !caught_all {
                // No clause matched: propagate the saved exception.
                let id = self.fresh_id();
                let raise = LowStmt {
                    id,
                    span: stmt.span,
                    kind: LowStmtKind::Raise {
                        exc_type: Some(self.make_load(type_name, stmt.span)),
                        value: Some(self.make_load(value_name, stmt.span)),
                        traceback: Some(self.make_load(traceback_name, stmt.span)),
                    },
                };
                self.emit(raise);
                self.cur = None;
            }
        }

        if self.cfg.block(join_block).predecessors().is_empty() {
            self.cur = None;
        } else {
            self.cfg.place_block(join_block);
            self.cur = Some(join_block);
        }
        Ok(())
    }

    fn lower_try_finally(
        &mut self,
        stmt: &ast::Stmt,
        body: &[ast::Stmt],
        finalbody: &[ast::Stmt],
    ) -> LowerResult<()> {
        let span = stmt.span;

        let handler_block = self.cfg.add_deferred_block("");
        let type_name = self.node_name_sfx(stmt.id, "type");
        let value_name = self.node_name_sfx(stmt.id, "value");
        let traceback_name = self.node_name_sfx(stmt.id, "traceback");
        let why_name = self.node_name_sfx(stmt.id, "why");
        self.push_exc_handler(
            handler_block,
            type_name.clone(),
            value_name.clone(),
            traceback_name.clone(),
        );

        let finally_block = self.cfg.add_deferred_block("");
        self.push_finally_continuation(finally_block, why_name.clone());

        for s in body {
            self.lower_stmt(s)?;
        }

        self.pop_exc_handler();
        let did_why = self.pop_continuation();

        if self.cur.is_some() {
            let num = self.make_num(Why::Fallthrough as i64, span);
            self.push_assign_name(why_name.clone(), span, LowExpr::Prim(num));
            self.push_jump(finally_block, false);
        }

        if !self.cfg.block(handler_block).predecessors().is_empty() {
            self.cfg.place_block(handler_block);
            self.cur = Some(handler_block);
            let num = self.make_num(Why::Exception as i64, span);
            self.push_assign_name(why_name.clone(), span, LowExpr::Prim(num));
            self.push_jump(finally_block, false);
        }

        self.cfg.place_block(finally_block);
        self.cur = Some(finally_block);

        for s in finalbody {
            self.lower_stmt(s)?;
        }

        if self.cur.is_some() {
            // One dispatch arm per reason actually observed, re-running
            // the interrupted transfer through the (now popped) outer
            // continuations.
            if did_why & Why::Return.bit() != 0 {
                let do_return = self.cfg.add_deferred_block("");
                let otherwise = self.make_finally_cont(Why::Return, &why_name, span, do_return);

                self.cfg.place_block(do_return);
                self.cur = Some(do_return);
                let rtn = self.intern(RETURN_NAME);
                let value = self.make_load(rtn, span);
                self.do_return(value, span);

                self.cur = Some(otherwise);
            }

            if did_why & Why::Break.bit() != 0 {
                let do_break = self.cfg.add_deferred_block("");
                let otherwise = self.make_finally_cont(Why::Break, &why_name, span, do_break);

                self.cfg.place_block(do_break);
                self.cur = Some(do_break);
                self.do_break(span)?;

                self.cur = Some(otherwise);
            }

            if did_why & Why::Continue.bit() != 0 {
                let do_continue = self.cfg.add_deferred_block("");
                let otherwise = self.make_finally_cont(Why::Continue, &why_name, span, do_continue);

                self.cfg.place_block(do_continue);
                self.cur = Some(do_continue);
                self.do_continue(span)?;

                self.cur = Some(otherwise);
            }

            let reraise = self.cfg.add_deferred_block("");
            let no_exc = self.make_finally_cont(Why::Exception, &why_name, span, reraise);

            self.cfg.place_block(reraise);
            self.cur = Some(reraise);
            let id = self.fresh_id();
            let raise = LowStmt {
                id,
                span,
                kind: LowStmtKind::Raise {
                    exc_type: Some(self.make_load(type_name, span)),
                    value: Some(self.make_load(value_name, span)),
                    traceback: Some(self.make_load(traceback_name, span)),
                },
            };
            self.emit(raise);

            self.cur = Some(no_exc);
        }
        Ok(())
    }

    /// The context-manager protocol: bind `__exit__`, call `__enter__`,
    /// then act like a try/finally whose handler calls
    /// `__exit__(type, value, traceback)` and re-raises unless the result
    /// is truthy, and whose cleanup calls `__exit__(None, None, None)`.
    fn lower_with(
        &mut self,
        stmt: &ast::Stmt,
        context_expr: &ast::Expr,
        optional_vars: Option<&ast::Expr>,
        body: &[ast::Stmt],
    ) -> LowerResult<()> {
        let span = stmt.span;

        let ctxmgr = self.node_name_sfx(stmt.id, "ctxmgr");
        let exit_name = self.node_name_sfx(stmt.id, "exit");
        let why_name = self.node_name_sfx(stmt.id, "why");
        let exc_type_name = self.node_name_sfx(stmt.id, "exc_type");
        let exc_value_name = self.node_name_sfx(stmt.id, "exc_value");
        let exc_traceback_name = self.node_name_sfx(stmt.id, "exc_traceback");
        let none_name = self.intern("None");
        let exit_block = self.cfg.add_deferred_block("with_exit");

        let mgr = self.remap(context_expr)?;
        self.push_assign_name(ctxmgr.clone(), span, LowExpr::Prim(mgr));

        let exit_attr = self.composite(
            CompositeKind::Attribute {
                value: self.make_load(ctxmgr.clone(), span),
                attr: self.intern("__exit__"),
                cls_only: true,
            },
            span,
        );
        self.push_assign_name(exit_name.clone(), span, exit_attr);

        let enter_call = self.protocol_call(&ctxmgr, "__enter__", span);
        let enter = self.into_operand(enter_call);
        match optional_vars {
            Some(var) => self.push_assign_target(var, enter)?,
            None => {
                let id = self.fresh_id();
                self.emit(LowStmt {
                    id,
                    span,
                    kind: LowStmtKind::Expr {
                        value: LowExpr::Prim(enter),
                    },
                });
            }
        }

        let finally_block = self.cfg.add_deferred_block("with_finally");
        self.push_finally_continuation(finally_block, why_name.clone());

        let exc_block = self.cfg.add_deferred_block("with_exc");
        self.push_exc_handler(
            exc_block,
            exc_type_name.clone(),
            exc_value_name.clone(),
            exc_traceback_name.clone(),
        );

        for s in body {
            self.lower_stmt(s)?;
        }

        self.pop_exc_handler();
        let finally_did_why = self.pop_continuation();

        if self.cur.is_some() {
            // The body finished normally: record that and run the cleanup.
            let num = self.make_num(Why::Fallthrough as i64, span);
            self.push_assign_name(why_name.clone(), span, LowExpr::Prim(num));
            self.push_jump(finally_block, false);
        }

        // The exit block can end up with several incoming edges, so every
        // *branch* into it is routed through a trampoline block; only
        // direct jumps target it straight.

        if !self.cfg.block(exc_block).predecessors().is_empty() {
            self.cfg.place_block(exc_block);
            self.cur = Some(exc_block);

            // suppress = __exit__(type, value, traceback)
            let suppress = self.node_name_sfx(stmt.id, "suppress");
            let call = self.composite(
                CompositeKind::Call {
                    func: Callee::Value(self.make_load(exit_name.clone(), span)),
                    args: vec![
                        self.make_load(exc_type_name.clone(), span),
                        self.make_load(exc_value_name.clone(), span),
                        self.make_load(exc_traceback_name.clone(), span),
                    ],
                    keywords: Vec::new(),
                    starargs: None,
                    kwargs: None,
                },
                span,
            );
            self.push_assign_name(suppress.clone(), span, call);

            let reraise_block = self.cfg.add_deferred_block("with_reraise");
            let exiter = self.cfg.add_deferred_block("with_exiter");
            let load = self.make_load(suppress, span);
            self.push_branch(LowExpr::Prim(load), exiter, reraise_block);

            self.cfg.place_block(exiter);
            self.cur = Some(exiter);
            self.push_jump(exit_block, false);

            self.cfg.place_block(reraise_block);
            self.cur = Some(reraise_block);
            let id = self.fresh_id();
            let raise = LowStmt {
                id,
                span,
                kind: LowStmtKind::Raise {
                    exc_type: Some(self.make_load(exc_type_name.clone(), span)),
                    value: Some(self.make_load(exc_value_name.clone(), span)),
                    traceback: Some(self.make_load(exc_traceback_name.clone(), span)),
                },
            };
            self.emit(raise);
        }

        if !self.cfg.block(finally_block).predecessors().is_empty() {
            self.cfg.place_block(finally_block);
            self.cur = Some(finally_block);

            // __exit__(None, None, None), result ignored.
            let call = self.composite(
                CompositeKind::Call {
                    func: Callee::Value(self.make_load(exit_name.clone(), span)),
                    args: vec![
                        self.make_load(none_name.clone(), span),
                        self.make_load(none_name.clone(), span),
                        self.make_load(none_name.clone(), span),
                    ],
                    keywords: Vec::new(),
                    starargs: None,
                    kwargs: None,
                },
                span,
            );
            let id = self.fresh_id();
            self.emit(LowStmt {
                id,
                span,
                kind: LowStmtKind::Expr { value: call },
            });

            if finally_did_why & Why::Return.bit() != 0 {
                let do_return = self.cfg.add_deferred_block("with_do_return");
                let otherwise = self.make_finally_cont(Why::Return, &why_name, span, do_return);

                self.cfg.place_block(do_return);
                self.cur = Some(do_return);
                let rtn = self.intern(RETURN_NAME);
                let value = self.make_load(rtn, span);
                self.do_return(value, span);

                self.cur = Some(otherwise);
            }

            if finally_did_why & Why::Break.bit() != 0 {
                let do_break = self.cfg.add_deferred_block("with_do_break");
                let otherwise = self.make_finally_cont(Why::Break, &why_name, span, do_break);

                self.cfg.place_block(do_break);
                self.cur = Some(do_break);
                self.do_break(span)?;

                self.cur = Some(otherwise);
            }

            if finally_did_why & Why::Continue.bit() != 0 {
                let do_continue = self.cfg.add_deferred_block("with_do_continue");
                let otherwise = self.make_finally_cont(Why::Continue, &why_name, span, do_continue);

                self.cfg.place_block(do_continue);
                self.cur = Some(do_continue);
                self.do_continue(span)?;

                self.cur = Some(otherwise);
            }

            // Remaining reason: fallthrough. Trampoline into the exit.
            let trampoline = self.cfg.add_block("with_break_critical_edge_to_exit");
            self.push_jump(trampoline, false);
            self.cur = Some(trampoline);
            self.push_jump(exit_block, false);
        }

        if self.cfg.block(exit_block).predecessors().is_empty() {
            self.cur = None;
        } else {
            self.cfg.place_block(exit_block);
            self.cur = Some(exit_block);
        }
        Ok(())
    }

    fn lower_assert(
        &mut self,
        stmt: &ast::Stmt,
        test: &ast::Expr,
        msg: Option<&ast::Expr>,
    ) -> LowerResult<()> {
        let test_val = self.remap(test)?;
        let test_op = self.call_nonzero(LowExpr::Prim(test_val));
        let was = self.cur.expect("assert with no current block");

        let iffalse = self.cfg.add_block("assert_fail");
        let iftrue = self.cfg.add_block("assert_pass");
        self.cfg.connect(was, iffalse, false);
        self.cfg.connect(was, iftrue, false);
        let id = self.fresh_id();
        self.emit(LowStmt {
            id,
            span: stmt.span,
            kind: LowStmtKind::Branch {
                test: test_op,
                iftrue,
                iffalse,
            },
        });

        self.cur = Some(iffalse);
        let msg = self.remap_opt(msg)?;
        // The failing side carries an always-false assertion; the runtime
        // terminates there, so the block just self-loops afterwards.
        let zero = self.make_num(0, stmt.span);
        let id = self.fresh_id();
        self.emit(LowStmt {
            id,
            span: stmt.span,
            kind: LowStmtKind::Assert { test: zero, msg },
        });

        let unreachable_block = self.cfg.add_block("unreachable");
        self.push_jump(unreachable_block, false);
        self.cur = Some(unreachable_block);
        self.push_jump(unreachable_block, true);

        self.cur = Some(iftrue);
        Ok(())
    }

    // =========================================================================
    // Deletion and imports
    // =========================================================================

    fn lower_delete_target(&mut self, target: &ast::Expr) -> LowerResult<()> {
        let span = target.span;
        match &target.kind {
            ast::ExprKind::Subscript { value, slice, .. } => {
                let value = self.remap(value)?;
                let slice = self.remap_slice(slice)?;
                let id = self.fresh_id();
                let target_id = self.fresh_id();
                self.emit(LowStmt {
                    id,
                    span,
                    kind: LowStmtKind::Delete {
                        target: DelTarget::Subscript {
                            id: target_id,
                            span,
                            value,
                            slice,
                        },
                    },
                });
            }
            ast::ExprKind::Attribute { value, attr, .. } => {
                let value = self.remap(value)?;
                let attr = self.mangle(attr);
                let id = self.fresh_id();
                let target_id = self.fresh_id();
                self.emit(LowStmt {
                    id,
                    span,
                    kind: LowStmtKind::Delete {
                        target: DelTarget::Attribute {
                            id: target_id,
                            span,
                            value,
                            attr,
                        },
                    },
                });
            }
            ast::ExprKind::Name { sym, .. } => {
                let id = self.fresh_id();
                self.emit(LowStmt {
                    id,
                    span,
                    kind: LowStmtKind::Delete {
                        target: DelTarget::Name(NameRef {
                            id: target.id,
                            span,
                            sym: sym.clone(),
                        }),
                    },
                });
            }
            ast::ExprKind::List { elts, .. } | ast::ExprKind::Tuple { elts, .. } => {
                for elt in elts {
                    self.lower_delete_target(elt)?;
                }
            }
            _ => return Err(LowerError::new("invalid delete target", span)),
        }
        Ok(())
    }

    fn lower_import(&mut self, stmt: &ast::Stmt, names: &[ast::Alias]) {
        let span = stmt.span;
        for alias in names {
            let tmp = self.node_name(alias.id);
            let module = self.make_str(&alias.name, span);
            let import = self.composite(
                CompositeKind::Primitive(Primitive::ImportName {
                    level: -1,
                    names: ImportNames::None,
                    module,
                }),
                span,
            );
            self.push_assign_name(tmp.clone(), span, import);

            match &alias.asname {
                None => {
                    // `import a.b.c` binds the top-level module `a`.
                    let top = alias
                        .name
                        .split('.')
                        .next()
                        .expect("import of an empty name");
                    let top_sym = self.intern(top);
                    let load = self.make_load(tmp.clone(), span);
                    self.push_assign_name(top_sym, span, LowExpr::Prim(load));
                }
                Some(asname) => {
                    // `import a.b.c as x` walks down to the bottom-level
                    // module through attribute loads, then binds the alias.
                    for component in alias.name.split('.').skip(1) {
                        let attr = self.composite(
                            CompositeKind::Attribute {
                                value: self.make_load(tmp.clone(), span),
                                attr: self.intern(component),
                                cls_only: false,
                            },
                            span,
                        );
                        self.push_assign_name(tmp.clone(), span, attr);
                    }
                    let load = self.make_load(tmp.clone(), span);
                    self.push_assign_name(asname.clone(), span, LowExpr::Prim(load));
                }
            }
        }
    }

    fn lower_import_from(
        &mut self,
        stmt: &ast::Stmt,
        module: &pyrite_core::InternedString,
        names: &[ast::Alias],
        level: u32,
    ) -> LowerResult<()> {
        let span = stmt.span;
        if level != 0 {
            return Err(LowerError::new(
                format!("'from ... import' with level {level} is not supported"),
                span,
            ));
        }
        // Without the absolute-import future flag, a level of zero means
        // "relative then absolute", which the import machinery spells -1.
        let level = if self
            .source
            .future_flags
            .contains(FutureFlags::ABSOLUTE_IMPORT)
        {
            0
        } else {
            -1
        };

        let from_names: Vec<StrLit> = names.iter().map(|a| self.make_str(&a.name, span)).collect();
        let module_str = self.make_str(module, span);
        let import = self.composite(
            CompositeKind::Primitive(Primitive::ImportName {
                level,
                names: ImportNames::Names(from_names),
                module: module_str,
            }),
            span,
        );
        let tmp_module = self.node_name(stmt.id);
        self.push_assign_name(tmp_module.clone(), span, import);

        for alias in names {
            if &*alias.name == "*" {
                let star = self.composite(
                    CompositeKind::Primitive(Primitive::ImportStar {
                        module: self.make_load(tmp_module.clone(), span),
                    }),
                    span,
                );
                let id = self.fresh_id();
                self.emit(LowStmt {
                    id,
                    span,
                    kind: LowStmtKind::Expr { value: star },
                });
            } else {
                let name_str = self.make_str(&alias.name, span);
                let fetch = self.composite(
                    CompositeKind::Primitive(Primitive::ImportFrom {
                        module: self.make_load(tmp_module.clone(), span),
                        name: name_str,
                    }),
                    span,
                );
                let tmp = self.node_name(alias.id);
                self.push_assign_name(tmp.clone(), span, fetch);
                let bind = alias.asname.clone().unwrap_or_else(|| alias.name.clone());
                let load = self.make_load(tmp, span);
                self.push_assign_name(bind, span, LowExpr::Prim(load));
            }
        }
        Ok(())
    }

    fn lower_print(
        &mut self,
        stmt: &ast::Stmt,
        dest: Option<&ast::Expr>,
        values: &[ast::Expr],
        newline: bool,
    ) -> LowerResult<()> {
        let span = stmt.span;
        let dest = self.remap_opt(dest)?;

        for (i, value) in values.iter().enumerate() {
            let value = self.remap(value)?;
            // Only the last printed value carries the trailing newline.
            let nl = if i + 1 < values.len() { false } else { newline };
            let dest = dest.as_ref().map(|d| self.dup(d));
            let id = self.fresh_id();
            self.emit(LowStmt {
                id,
                span,
                kind: LowStmtKind::Print {
                    dest,
                    value: Some(value),
                    newline: nl,
                },
            });
        }

        if values.is_empty() {
            debug_assert!(newline, "bare print must emit a newline");
            let id = self.fresh_id();
            self.emit(LowStmt {
                id,
                span,
                kind: LowStmtKind::Print {
                    dest,
                    value: None,
                    newline,
                },
            });
        }
        Ok(())
    }
}
