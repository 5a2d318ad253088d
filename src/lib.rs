//! Crate root: wires together the gox compilation pipeline.
//!
//! The stages are small and strictly linear:
//! - `tokenizer` turns source text into a flat token stream.
//! - `parser` builds the statement list, with a binding-power loop for
//!   expressions.
//! - `ast` holds the closed statement and expression node types.
//! - `codegen` lowers the statements into Go source, expanding `or_panic`.
//! - `error` centralises the fatal diagnostics shared by the other modules.
//!
//! Every call works on fresh state, so separate units can be compiled from
//! separate threads.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod parser;
pub mod tokenizer;

pub use ast::{Block, Expr, Parameter, Stmt};
pub use codegen::generate;
pub use error::{CompileError, CompileResult};
pub use parser::parse;
pub use tokenizer::{Token, TokenKind, tokenize};

/// Parse a source string into its top-level statements.
pub fn parse_source(source: &str) -> CompileResult<Vec<Stmt>> {
  let tokens = tokenize(source)?;
  parse(tokens, source)
}

/// Compile gox source into Go source.
pub fn transpile(source: &str) -> CompileResult<String> {
  let program = parse_source(source)?;
  generate(&program)
}
