//! Shared error utilities used across the compilation pipeline.
//!
//! Every failure aborts the current unit; nothing is recovered. Diagnostics
//! anchored in the source reproduce the offending line (tabs rendered as
//! single spaces) and point at the column with a run of dashes ending in a
//! caret.

use snafu::Snafu;

use crate::tokenizer::Token;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  /// No lexical rule matched at the cursor.
  #[snafu(display("invalid character '{found}' at line {line} column {column}\n{excerpt}\n{marker}"))]
  InvalidCharacter {
    found: char,
    line: usize,
    column: usize,
    excerpt: String,
    marker: String,
  },

  /// A token the grammar does not accept at this point, or an operand
  /// shape the token's rule rejects.
  #[snafu(display("invalid token {token} at line {line} column {column}\n{excerpt}\n{marker}"))]
  InvalidToken {
    token: Token,
    line: usize,
    column: usize,
    excerpt: String,
    marker: String,
  },

  #[snafu(display("unexpected end of input at line {line} column {column}"))]
  UnexpectedEof { line: usize, column: usize },

  /// `or_panic` decorating a call outside the statement positions that
  /// know how to expand it.
  #[snafu(display(
    "or_panic on call to {callee} at line {line} column {column} is not allowed {position}"
  ))]
  MisplacedOrPanic {
    callee: String,
    line: usize,
    column: usize,
    position: String,
  },

  /// The generator met a node it has no lowering for. Meant for tool
  /// developers: carries everything emitted so far.
  #[snafu(display("\n{output}... <--- unhandled {node}"))]
  Internal { output: String, node: String },
}

impl CompileError {
  /// Construct a lexical error anchored at `line`/`column` of `source`.
  pub fn invalid_character(source: &str, found: char, line: usize, column: usize) -> Self {
    Self::InvalidCharacter {
      found,
      line,
      column,
      excerpt: excerpt(source, line),
      marker: marker(column),
    }
  }

  /// Construct a syntax error pointing at `token`.
  pub fn invalid_token(source: &str, token: &Token) -> Self {
    Self::InvalidToken {
      token: token.clone(),
      line: token.line,
      column: token.column,
      excerpt: excerpt(source, token.line),
      marker: marker(token.column),
    }
  }

  pub fn unexpected_eof(token: &Token) -> Self {
    Self::UnexpectedEof {
      line: token.line,
      column: token.column,
    }
  }

  pub fn internal(output: &str, node: impl Into<String>) -> Self {
    Self::Internal {
      output: output.to_string(),
      node: node.into(),
    }
  }
}

/// The 1-based `line` of `source` with tabs flattened to single spaces so the
/// marker below it lines up.
fn excerpt(source: &str, line: usize) -> String {
  source
    .split('\n')
    .nth(line.saturating_sub(1))
    .unwrap_or_default()
    .trim_end_matches('\r')
    .replace('\t', " ")
}

fn marker(column: usize) -> String {
  format!("{}^", "-".repeat(column))
}
