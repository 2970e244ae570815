//! Shared infrastructure for the Pyrite front-end.
//!
//! This crate provides the pieces every front-end phase needs:
//!
//! - [`Span`] - byte offset ranges for diagnostics
//! - [`StringInterner`] / [`InternedString`] - O(1)-equality identifier handles
//! - [`PyriteError`] / [`PyriteResult`] - the unified error type
//!
//! Nothing here knows about Python syntax or the CFG; those live in
//! `pyrite_ast` and `pyrite_cfg`.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod error;
pub mod intern;
pub mod span;

pub use error::{PyriteError, PyriteResult};
pub use intern::{InternedString, StringInterner};
pub use span::Span;
