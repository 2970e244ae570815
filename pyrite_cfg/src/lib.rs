//! CFG lowering for the Pyrite front-end.
//!
//! This crate turns a structured Python AST into a control-flow graph of
//! basic blocks whose bodies are straight-line, temporary-normalized,
//! three-address-style statements, ready for type analysis and code
//! generation.
//!
//! # Architecture
//!
//! ```text
//! AST → statement visitor → blocks of lowered statements → validate → fuse
//! ```
//!
//! # Key types
//!
//! - [`Cfg`] / [`BasicBlock`] - the graph of placed blocks
//! - [`lowered::LowStmt`] / [`lowered::Operand`] - the lowered statement IR
//! - [`SourceInfo`] - the compilation-unit context handed to the pass
//! - [`compute_cfg`] - the entry point
//!
//! # Example
//!
//! ```
//! use pyrite_ast::ast::{Expr, ExprContext, ExprKind, NodeIdGen, Number, Stmt, StmtKind};
//! use pyrite_cfg::{compute_cfg, DefaultScoping, FutureFlags, RootKind, SourceInfo};
//! use pyrite_core::{Span, StringInterner};
//!
//! let ids = NodeIdGen::new();
//! let interner = StringInterner::new();
//! let mut scoping = DefaultScoping::new();
//!
//! // x = 1
//! let value = Expr::new(&ids, ExprKind::Num(Number::Int(1)), Span::new(4, 5));
//! let target = Expr::new(
//!     &ids,
//!     ExprKind::Name { sym: interner.intern("x"), ctx: ExprContext::Store },
//!     Span::new(0, 1),
//! );
//! let assign = Stmt::new(
//!     &ids,
//!     StmtKind::Assign { targets: vec![target], value },
//!     Span::new(0, 5),
//! );
//!
//! let source = SourceInfo {
//!     root: RootKind::Module,
//!     root_node: ids.fresh(),
//!     root_span: Span::dummy(),
//!     module_name: "example".into(),
//!     future_flags: FutureFlags::NONE,
//!     interner: &interner,
//!     ids: &ids,
//!     scoping: &mut scoping,
//! };
//! let cfg = compute_cfg(source, &[assign]).unwrap();
//! assert_eq!(cfg.len(), 1);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod graph;
pub mod lower;
pub mod lowered;
pub mod simplify;
pub mod validate;

pub use graph::{BasicBlock, BlockRef, Cfg};
pub use lower::{
    compute_cfg, DefaultScoping, FutureFlags, LowerError, LowerResult, RootKind, ScopingAnalysis,
    SourceInfo, Why, RETURN_NAME,
};
pub use simplify::simplify;
pub use validate::validate;
