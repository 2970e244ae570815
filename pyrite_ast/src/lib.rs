//! Input AST for the Pyrite front-end.
//!
//! This crate defines the abstract syntax tree the CFG lowering pass
//! consumes. The parser that would produce it is a separate component;
//! tests construct trees directly through the node constructors.
//!
//! Every node carries a [`NodeId`](ast::NodeId) assigned from a
//! [`NodeIdGen`](ast::NodeIdGen). Node identity is load-bearing: the
//! lowering pass derives temporary-variable names from it and the graph
//! validator uses it to detect accidental node sharing.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod ast;

pub use ast::{Expr, ExprKind, NodeId, NodeIdGen, Stmt, StmtKind};
