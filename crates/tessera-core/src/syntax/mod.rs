//! The expression grammar shared by the graph builder (reference scanning),
//! the renderer (rewrite and reprint) and the runtime loader (evaluation).
//!
//! # Architecture
//!
//! - [`lexer`] turns source text into tokens.
//! - [`parser`] builds an [`ast::Expr`].
//! - [`printer`] emits the canonical form.
//! - [`scope`] finds and rewrites free references.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod scope;

use thiserror::Error;

pub use ast::Expr;
pub use parser::{parse_expression, parse_expression_prefix};
pub use printer::{print_expression, print_expression_at};
pub use scope::{free_references, rewrite_references, FreeReference};

/// A lexing or parsing failure at a byte offset of the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct SyntaxError {
    pub message: String,
    pub offset: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        SyntaxError {
            message: message.into(),
            offset,
        }
    }

    /// Same error, relative to an enclosing source that starts `base` bytes earlier.
    pub fn shifted(self, base: usize) -> Self {
        SyntaxError {
            offset: self.offset + base,
            ..self
        }
    }
}
