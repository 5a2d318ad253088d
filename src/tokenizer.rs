//! Lexical analysis: turns gox source text into a flat vector of tokens.
//!
//! Lexing is driven by an ordered rule table. At every cursor position the
//! rules are tried top to bottom and the first one that matches wins, so the
//! order encodes precedence: keywords are never matched directly, they come
//! out of the identifier rule and are reclassified through [`TokenKind::keyword`].

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
  String,
  Number,
  Identifier,

  Assign,
  DeclAssign,
  Plus,
  Star,

  Dot,
  ParenOpen,
  ParenClose,
  BraceOpen,
  BraceClose,
  Comma,
  NewLine,

  Package,
  Import,
  Func,
  Var,
  OrPanic,
  Return,

  Eof,
}

impl TokenKind {
  /// Map an identifier-shaped lexeme onto its keyword kind, if it is one.
  pub fn keyword(ident: &str) -> Option<Self> {
    match ident {
      "package" => Some(Self::Package),
      "import" => Some(Self::Import),
      "func" => Some(Self::Func),
      "var" => Some(Self::Var),
      "or_panic" => Some(Self::OrPanic),
      "return" => Some(Self::Return),
      _ => None,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::String => "STRING",
      Self::Number => "NUMBER",
      Self::Identifier => "IDENTIFIER",
      Self::Assign => "ASSIGN",
      Self::DeclAssign => "DECL_ASSIGN",
      Self::Plus => "PLUS",
      Self::Star => "STAR",
      Self::Dot => "DOT",
      Self::ParenOpen => "PAREN_OPEN",
      Self::ParenClose => "PAREN_CLOSE",
      Self::BraceOpen => "BRACE_OPEN",
      Self::BraceClose => "BRACE_CLOSE",
      Self::Comma => "COMMA",
      Self::NewLine => "NEW_LINE",
      Self::Package => "PACKAGE",
      Self::Import => "IMPORT",
      Self::Func => "FUNC",
      Self::Var => "VAR",
      Self::OrPanic => "OR_PANIC",
      Self::Return => "RETURN",
      Self::Eof => "EOF",
    }
  }
}

impl fmt::Display for TokenKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// A lexeme with the position it started at.
///
/// `text` is empty for keywords and punctuation, the lexeme itself for
/// identifiers and numbers, and the unquoted contents for strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub text: String,
  /// 1-based.
  pub line: usize,
  /// 0-based, in bytes from the start of the line.
  pub column: usize,
}

impl Token {
  pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, column: usize) -> Self {
    Self {
      kind,
      text: text.into(),
      line,
      column,
    }
  }

  pub fn is(&self, kind: TokenKind) -> bool {
    self.kind == kind
  }
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.text.is_empty() {
      write!(f, "{}", self.kind)
    } else {
      write!(f, "{} ({})", self.kind, self.text)
    }
  }
}

/// What a rule does with the text it matched.
#[derive(Debug, Clone, Copy)]
enum Action {
  Skip,
  Emit(TokenKind),
  Identifier,
  String,
  Number,
}

impl Action {
  fn token(self, lexeme: &str, line: usize, column: usize) -> Option<Token> {
    let token = match self {
      Self::Skip => return None,
      Self::Emit(kind) => Token::new(kind, "", line, column),
      Self::Identifier => match TokenKind::keyword(lexeme) {
        Some(kind) => Token::new(kind, "", line, column),
        None => Token::new(TokenKind::Identifier, lexeme, line, column),
      },
      Self::String => Token::new(TokenKind::String, &lexeme[1..lexeme.len() - 1], line, column),
      Self::Number => Token::new(TokenKind::Number, lexeme, line, column),
    };
    Some(token)
  }
}

struct Rule {
  pattern: Regex,
  action: Action,
}

fn rule(pattern: &str, action: Action) -> Rule {
  Rule {
    pattern: Regex::new(pattern).expect("lexical rule patterns are valid"),
    action,
  }
}

/// Ordered lexical rules. Every pattern is anchored and consumes at least one
/// byte.
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
  vec![
    // A newline swallows the blank lines and indentation after it.
    rule(r"^\n\s*", Action::Emit(TokenKind::NewLine)),
    rule(r"^[ \t\r\f\v]+", Action::Skip),
    rule(r"^[A-Za-z_][A-Za-z0-9_]*", Action::Identifier),
    rule(r#"^"[^"]*""#, Action::String),
    rule(r"^\d+(\.\d+)?", Action::Number),
    rule(r"^:=", Action::Emit(TokenKind::DeclAssign)),
    rule(r"^=", Action::Emit(TokenKind::Assign)),
    rule(r"^\+", Action::Emit(TokenKind::Plus)),
    rule(r"^\*", Action::Emit(TokenKind::Star)),
    rule(r"^\(", Action::Emit(TokenKind::ParenOpen)),
    rule(r"^\)", Action::Emit(TokenKind::ParenClose)),
    rule(r"^\{", Action::Emit(TokenKind::BraceOpen)),
    rule(r"^\}", Action::Emit(TokenKind::BraceClose)),
    rule(r"^\.", Action::Emit(TokenKind::Dot)),
    rule(r"^,", Action::Emit(TokenKind::Comma)),
  ]
});

/// Byte offset plus the line bookkeeping needed to report positions.
struct Cursor {
  pos: usize,
  line: usize,
  line_start: usize,
}

impl Cursor {
  fn column(&self) -> usize {
    self.pos - self.line_start
  }

  fn advance(&mut self, consumed: &str) {
    if let Some(last) = consumed.rfind('\n') {
      self.line += consumed.matches('\n').count();
      self.line_start = self.pos + last + 1;
    }
    self.pos += consumed.len();
  }
}

/// Lex `source` into a flat vector of tokens terminated by an `Eof` marker
/// positioned at the end of input.
pub fn tokenize(source: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let mut cursor = Cursor {
    pos: 0,
    line: 1,
    line_start: 0,
  };

  'scan: while cursor.pos < source.len() {
    let rest = &source[cursor.pos..];

    for rule in RULES.iter() {
      let Some(found) = rule.pattern.find(rest) else {
        continue;
      };
      let lexeme = found.as_str();
      if let Some(token) = rule.action.token(lexeme, cursor.line, cursor.column()) {
        tokens.push(token);
      }
      cursor.advance(lexeme);
      continue 'scan;
    }

    let found = rest.chars().next().unwrap_or('\0');
    return Err(CompileError::invalid_character(
      source,
      found,
      cursor.line,
      cursor.column(),
    ));
  }

  tokens.push(Token::new(TokenKind::Eof, "", cursor.line, cursor.column()));
  debug!(count = tokens.len(), "tokenized source");
  Ok(tokens)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
      .expect("source should tokenize")
      .into_iter()
      .map(|token| token.kind)
      .collect()
  }

  #[test]
  fn reports_one_based_line_and_zero_based_column() {
    let tokens = tokenize("a\nbb cd\n").unwrap();
    let cd = tokens.iter().find(|token| token.text == "cd").unwrap();
    assert_eq!((cd.line, cd.column), (2, 3));

    let eof = tokens.last().unwrap();
    assert_eq!(eof.kind, TokenKind::Eof);
    assert_eq!((eof.line, eof.column), (3, 0));
  }

  #[test]
  fn tokenizing_is_deterministic() {
    let source = "package main\n\nfunc main() {\n\tx := fmt.Println(\"hi\") or_panic\n}\n";
    assert_eq!(tokenize(source).unwrap(), tokenize(source).unwrap());
  }

  #[test]
  fn keywords_are_reclassified_identifiers() {
    use TokenKind::*;
    assert_eq!(
      kinds("package import func var or_panic return packages"),
      vec![Package, Import, Func, Var, OrPanic, Return, Identifier, Eof]
    );

    let tokens = tokenize("return").unwrap();
    assert!(tokens[0].text.is_empty());
  }

  #[test]
  fn blank_lines_collapse_into_one_newline() {
    use TokenKind::*;
    assert_eq!(
      kinds("a\n\n   \n\tb\n"),
      vec![Identifier, NewLine, Identifier, NewLine, Eof]
    );
  }

  #[test]
  fn strings_are_unquoted_and_numbers_keep_their_text() {
    let tokens = tokenize(r#""fmt" 3.14 42"#).unwrap();
    assert_eq!(tokens[0], Token::new(TokenKind::String, "fmt", 1, 0));
    assert_eq!(tokens[1], Token::new(TokenKind::Number, "3.14", 1, 6));
    assert_eq!(tokens[2], Token::new(TokenKind::Number, "42", 1, 11));
  }

  #[test]
  fn decl_assign_wins_over_assign() {
    use TokenKind::*;
    assert_eq!(
      kinds("x := y = 1 + 2 * 3"),
      vec![
        Identifier, DeclAssign, Identifier, Assign, Number, Plus, Number, Star, Number, Eof
      ]
    );
  }

  #[test]
  fn punctuation() {
    use TokenKind::*;
    assert_eq!(
      kinds("a.b(c, d) {}"),
      vec![
        Identifier, Dot, Identifier, ParenOpen, Identifier, Comma, Identifier, ParenClose,
        BraceOpen, BraceClose, Eof
      ]
    );
  }

  #[test]
  fn unknown_character_is_fatal() {
    let err = tokenize("x := 1\n\ty := $\n").unwrap_err();
    match &err {
      CompileError::InvalidCharacter {
        found,
        line,
        column,
        ..
      } => {
        assert_eq!(*found, '$');
        assert_eq!((*line, *column), (2, 6));
      }
      other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().ends_with("\n y := $\n------^"));
  }

  #[test]
  fn token_display() {
    assert_eq!(Token::new(TokenKind::Comma, "", 1, 0).to_string(), "COMMA");
    assert_eq!(
      Token::new(TokenKind::Identifier, "main", 1, 0).to_string(),
      "IDENTIFIER (main)"
    );
  }
}
