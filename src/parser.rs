//! Parser producing the top-level statement list.
//!
//! Two layers cooperate here. Statements are parsed by plain recursive
//! descent, dispatching on the first token of each line. Expressions use a
//! binding-power (Pratt) loop: every token has a prefix rule (NUD) used when
//! it starts an expression and an infix/postfix rule (LED) used when it
//! extends the expression built so far. A token extends the current
//! expression only while its binding power is strictly greater than the
//! caller's minimum.

use tracing::{debug, trace};

use crate::ast::{Block, Expr, Parameter, Stmt};
use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind};

/// `or_panic`, call parentheses and member access.
const POSTFIX_BP: u8 = 14;
const PRODUCT_BP: u8 = 12;
const SUM_BP: u8 = 11;
const ASSIGN_BP: u8 = 2;
const LIST_BP: u8 = 1;
const TERMINATOR_BP: u8 = 0;

/// Parse a whole token stream into its top-level statements.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Vec<Stmt>> {
  let mut stream = TokenStream::new(tokens, source);
  let mut stmts = Vec::new();

  while !stream.is_eof() {
    if let Some(stmt) = parse_stmt(&mut stream)? {
      trace!(kind = stmt.kind(), "parsed statement");
      stmts.push(stmt);
    }
  }

  debug!(count = stmts.len(), "parsed program");
  Ok(stmts)
}

/// Dispatch on the next token. Newlines produce no statement.
fn parse_stmt(stream: &mut TokenStream) -> CompileResult<Option<Stmt>> {
  let stmt = match stream.peek().kind {
    TokenKind::NewLine => {
      stream.advance();
      return Ok(None);
    }
    TokenKind::Package => parse_package(stream)?,
    TokenKind::Import => parse_import(stream)?,
    TokenKind::Func => parse_func_decl(stream)?,
    TokenKind::Var => parse_var_decl(stream)?,
    TokenKind::Return => parse_return(stream)?,
    TokenKind::Identifier => Stmt::Expr(parse_expr(stream, TERMINATOR_BP)?),
    _ => return Err(stream.invalid_here()),
  };
  Ok(Some(stmt))
}

fn parse_package(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.expect(TokenKind::Package)?;
  let name = stream.expect(TokenKind::Identifier)?;
  stream.expect_line_end()?;
  Ok(Stmt::Package { name })
}

fn parse_import(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.expect(TokenKind::Import)?;

  let names = if stream.equal(TokenKind::ParenOpen) {
    stream.expect(TokenKind::NewLine)?;
    let mut names = Vec::new();
    loop {
      let token = stream.advance();
      match token.kind {
        TokenKind::ParenClose => break,
        TokenKind::String => {
          names.push(token);
          stream.expect(TokenKind::NewLine)?;
        }
        TokenKind::Eof => return Err(CompileError::unexpected_eof(&token)),
        _ => return Err(stream.invalid(&token)),
      }
    }
    names
  } else {
    vec![stream.expect(TokenKind::String)?]
  };

  stream.expect_line_end()?;
  Ok(Stmt::Import { names })
}

fn parse_func_decl(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.expect(TokenKind::Func)?;
  let name = stream.expect(TokenKind::Identifier)?;

  stream.expect(TokenKind::ParenOpen)?;
  let mut parameters = Vec::new();
  if !stream.equal(TokenKind::ParenClose) {
    loop {
      let name = stream.expect(TokenKind::Identifier)?;
      let ty = stream.expect(TokenKind::Identifier)?;
      parameters.push(Parameter { name, ty });
      if !stream.list_continues(TokenKind::ParenClose)? {
        break;
      }
    }
  }

  let return_types = parse_return_types(stream)?;
  let body = parse_block(stream)?;

  Ok(Stmt::FuncDecl {
    name,
    parameters,
    return_types,
    body,
  })
}

/// Either a single bare type or a parenthesised, comma separated list.
fn parse_return_types(stream: &mut TokenStream) -> CompileResult<Vec<Token>> {
  match stream.peek().kind {
    TokenKind::Identifier => Ok(vec![stream.advance()]),
    TokenKind::ParenOpen => {
      stream.advance();
      let mut types = Vec::new();
      loop {
        types.push(stream.expect(TokenKind::Identifier)?);
        if !stream.list_continues(TokenKind::ParenClose)? {
          break;
        }
      }
      Ok(types)
    }
    _ => Ok(Vec::new()),
  }
}

fn parse_block(stream: &mut TokenStream) -> CompileResult<Block> {
  stream.expect(TokenKind::BraceOpen)?;
  let mut body = Vec::new();

  loop {
    match stream.peek().kind {
      TokenKind::BraceClose => {
        stream.advance();
        break;
      }
      TokenKind::Eof => return Err(CompileError::unexpected_eof(stream.peek())),
      _ => {
        if let Some(stmt) = parse_stmt(stream)? {
          body.push(stmt);
        }
      }
    }
  }

  Ok(Block { body })
}

fn parse_var_decl(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.expect(TokenKind::Var)?;
  let name = stream.expect(TokenKind::Identifier)?;
  let ty = stream.expect(TokenKind::Identifier)?;
  Ok(Stmt::VarDecl { name, ty })
}

fn parse_return(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.expect(TokenKind::Return)?;
  let values = match stream.peek().kind {
    TokenKind::NewLine | TokenKind::BraceClose | TokenKind::Eof => None,
    _ => Some(parse_expr(stream, TERMINATOR_BP)?),
  };
  Ok(Stmt::Return { values })
}

/// Core Pratt loop.
fn parse_expr(stream: &mut TokenStream, min_bp: u8) -> CompileResult<Expr> {
  let token = stream.advance();
  let mut left = nud(stream, token)?;

  loop {
    let bp = binding_power(stream, stream.peek())?;
    if bp <= min_bp {
      break;
    }
    let token = stream.advance();
    left = led(stream, left, token)?;
  }

  Ok(left)
}

fn binding_power(stream: &TokenStream, token: &Token) -> CompileResult<u8> {
  match token.kind {
    TokenKind::OrPanic | TokenKind::ParenOpen | TokenKind::Dot => Ok(POSTFIX_BP),
    TokenKind::Star => Ok(PRODUCT_BP),
    TokenKind::Plus => Ok(SUM_BP),
    TokenKind::Assign | TokenKind::DeclAssign => Ok(ASSIGN_BP),
    TokenKind::Comma => Ok(LIST_BP),
    TokenKind::Number
    | TokenKind::Identifier
    | TokenKind::ParenClose
    | TokenKind::NewLine
    | TokenKind::BraceClose
    | TokenKind::Eof => Ok(TERMINATOR_BP),
    _ => Err(stream.invalid(token)),
  }
}

/// Prefix rules.
fn nud(stream: &mut TokenStream, token: Token) -> CompileResult<Expr> {
  match token.kind {
    TokenKind::String => Ok(Expr::String(token)),
    TokenKind::Identifier => Ok(Expr::Symbol(token)),
    TokenKind::Number => Ok(Expr::Number(token)),
    TokenKind::ParenOpen => {
      let inner = parse_expr(stream, LIST_BP)?;
      stream.expect(TokenKind::ParenClose)?;
      Ok(inner)
    }
    _ => Err(stream.invalid(&token)),
  }
}

/// Infix and postfix rules, extending `left`.
fn led(stream: &mut TokenStream, left: Expr, token: Token) -> CompileResult<Expr> {
  match token.kind {
    TokenKind::OrPanic => match left {
      Expr::Call { callee, args, .. } => Ok(Expr::Call {
        callee,
        args,
        or_panic: true,
      }),
      _ => Err(stream.invalid(&token)),
    },
    TokenKind::ParenOpen => parse_call(stream, left, &token),
    TokenKind::Dot => {
      let right = parse_expr(stream, POSTFIX_BP)?;
      if matches!(left, Expr::Symbol(_)) && matches!(right, Expr::Symbol(_)) {
        Ok(Expr::access(left, right))
      } else {
        Err(stream.invalid(&token))
      }
    }
    TokenKind::Star | TokenKind::Plus => {
      let bp = binding_power(stream, &token)?;
      let right = parse_expr(stream, bp)?;
      Ok(Expr::binary(left, token, right))
    }
    TokenKind::Assign => Ok(Expr::assign(left, parse_expr(stream, TERMINATOR_BP)?)),
    TokenKind::DeclAssign => Ok(Expr::decl_assign(left, parse_expr(stream, TERMINATOR_BP)?)),
    TokenKind::Comma => parse_list(stream, left, &token),
    _ => Err(stream.invalid(&token)),
  }
}

fn parse_call(stream: &mut TokenStream, callee: Expr, paren: &Token) -> CompileResult<Expr> {
  if !matches!(callee, Expr::Symbol(_) | Expr::Access { .. }) {
    return Err(stream.invalid(paren));
  }

  if stream.equal(TokenKind::ParenClose) {
    return Ok(Expr::call(callee, None));
  }

  let args = parse_expr(stream, TERMINATOR_BP)?;
  stream.expect(TokenKind::ParenClose)?;
  Ok(Expr::call(callee, Some(args)))
}

/// Everything after the first comma. Elements bind tighter than assignment
/// so that `a, b := f()` keeps the whole list on the left of `:=`.
fn parse_list(stream: &mut TokenStream, first: Expr, comma: &Token) -> CompileResult<Expr> {
  let mut items = vec![first];
  loop {
    items.push(parse_expr(stream, ASSIGN_BP)?);
    if !stream.equal(TokenKind::Comma) {
      break;
    }
  }
  Expr::list_of(items).ok_or_else(|| stream.invalid(comma))
}

/// Cursor over the token vector. The final `Eof` token is sticky: advancing
/// past it keeps returning it.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  fn new(mut tokens: Vec<Token>, source: &'a str) -> Self {
    if !tokens.last().is_some_and(|token| token.is(TokenKind::Eof)) {
      let (line, column) = tokens
        .last()
        .map_or((1, 0), |token| (token.line, token.column));
      tokens.push(Token::new(TokenKind::Eof, "", line, column));
    }
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  fn peek(&self) -> &Token {
    &self.tokens[self.pos]
  }

  fn advance(&mut self) -> Token {
    let token = self.tokens[self.pos].clone();
    if self.pos + 1 < self.tokens.len() {
      self.pos += 1;
    }
    token
  }

  fn is_eof(&self) -> bool {
    self.peek().is(TokenKind::Eof)
  }

  /// Consume the current token if it has the given kind.
  fn equal(&mut self, kind: TokenKind) -> bool {
    if self.peek().is(kind) {
      self.advance();
      return true;
    }
    false
  }

  fn expect(&mut self, kind: TokenKind) -> CompileResult<Token> {
    let token = self.advance();
    if token.is(kind) {
      Ok(token)
    } else {
      Err(self.invalid(&token))
    }
  }

  /// A statement line ends at a newline, or at the end of input.
  fn expect_line_end(&mut self) -> CompileResult<()> {
    if self.is_eof() {
      return Ok(());
    }
    self.expect(TokenKind::NewLine).map(|_| ())
  }

  /// After a list entry: `,` continues, `close` ends, anything else is fatal.
  fn list_continues(&mut self, close: TokenKind) -> CompileResult<bool> {
    let token = self.advance();
    match token.kind {
      TokenKind::Comma => Ok(true),
      kind if kind == close => Ok(false),
      _ => Err(self.invalid(&token)),
    }
  }

  fn invalid(&self, token: &Token) -> CompileError {
    CompileError::invalid_token(self.source, token)
  }

  fn invalid_here(&self) -> CompileError {
    self.invalid(self.peek())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tokenizer::tokenize;

  fn parse_source(source: &str) -> CompileResult<Vec<Stmt>> {
    parse(tokenize(source)?, source)
  }

  fn parse_expression(source: &str) -> CompileResult<Expr> {
    let mut stream = TokenStream::new(tokenize(source)?, source);
    parse_expr(&mut stream, TERMINATOR_BP)
  }

  fn tok(kind: TokenKind, text: &str, column: usize) -> Token {
    Token::new(kind, text, 1, column)
  }

  fn sym(text: &str, column: usize) -> Expr {
    Expr::Symbol(tok(TokenKind::Identifier, text, column))
  }

  fn num(text: &str, column: usize) -> Expr {
    Expr::Number(tok(TokenKind::Number, text, column))
  }

  fn invalid_token_text(err: CompileError) -> String {
    match err {
      CompileError::InvalidToken { token, .. } => token.text,
      other => panic!("expected an invalid token error, got {other:?}"),
    }
  }

  #[test]
  fn multiplication_binds_tighter_than_addition() {
    let expr = parse_expression("1 + 2 * 3").unwrap();
    assert_eq!(
      expr,
      Expr::binary(
        num("1", 0),
        tok(TokenKind::Plus, "", 2),
        Expr::binary(num("2", 4), tok(TokenKind::Star, "", 6), num("3", 8)),
      )
    );
  }

  #[test]
  fn binary_operators_are_left_associative() {
    let expr = parse_expression("a + b + c").unwrap();
    let Expr::Binary { left, right, .. } = expr else {
      panic!("expected a binary expression");
    };
    assert!(matches!(*left, Expr::Binary { .. }));
    assert_eq!(*right, sym("c", 8));
  }

  #[test]
  fn grouping_overrides_precedence() {
    let expr = parse_expression("(1 + 2) * 3").unwrap();
    let Expr::Binary { left, operator, .. } = expr else {
      panic!("expected a binary expression");
    };
    assert_eq!(operator.kind, TokenKind::Star);
    assert!(matches!(*left, Expr::Binary { .. }));
  }

  #[test]
  fn call_without_arguments() {
    assert_eq!(
      parse_expression("foo()").unwrap(),
      Expr::call(sym("foo", 0), None)
    );
  }

  #[test]
  fn call_arguments_form_a_list() {
    assert_eq!(
      parse_expression("foo(a, b)").unwrap(),
      Expr::call(
        sym("foo", 0),
        Some(Expr::list(sym("a", 4), Some(Expr::list(sym("b", 7), None)))),
      )
    );
  }

  #[test]
  fn longer_lists_lean_right() {
    let expr = parse_expression("a, b + 1, c").unwrap();
    let Expr::List { value, next } = &expr else {
      panic!("expected a list");
    };
    assert_eq!(**value, sym("a", 0));
    assert!(matches!(next.as_deref(), Some(Expr::List { .. })));
    let items: Vec<String> = expr.items().map(|item| item.to_string()).collect();
    assert_eq!(items, ["a", "b + 1", "c"]);
  }

  #[test]
  fn member_call() {
    let expr = parse_expression("fmt.Println(\"hi\")").unwrap();
    let Expr::Call { callee, args, or_panic } = expr else {
      panic!("expected a call");
    };
    assert_eq!(*callee, Expr::access(sym("fmt", 0), sym("Println", 4)));
    assert_eq!(args.unwrap().to_string(), "\"hi\"");
    assert!(!or_panic);
  }

  #[test]
  fn access_requires_symbols() {
    assert!(matches!(
      parse_expression("a.b").unwrap(),
      Expr::Access { .. }
    ));

    let err = parse_expression("foo().bar").unwrap_err();
    match err {
      CompileError::InvalidToken { token, column, .. } => {
        assert_eq!(token.kind, TokenKind::Dot);
        assert_eq!(column, 5);
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn call_requires_symbol_or_access_callee() {
    let err = parse_expression("(1 + 2)(3)").unwrap_err();
    assert!(matches!(
      err,
      CompileError::InvalidToken { ref token, .. } if token.kind == TokenKind::ParenOpen
    ));
  }

  #[test]
  fn or_panic_marks_the_preceding_call() {
    let expr = parse_expression("foo(x) or_panic").unwrap();
    assert!(expr.is_fallible_call());
  }

  #[test]
  fn or_panic_requires_a_call() {
    let err = parse_expression("foo or_panic").unwrap_err();
    assert!(matches!(
      err,
      CompileError::InvalidToken { ref token, .. } if token.kind == TokenKind::OrPanic
    ));
  }

  #[test]
  fn decl_assign_keeps_lists_on_both_sides() {
    let expr = parse_expression("x, y := a, b").unwrap();
    let Expr::DeclAssign { left, right } = expr else {
      panic!("expected a declaration");
    };
    assert_eq!(left.items().count(), 2);
    assert_eq!(right.items().count(), 2);
  }

  #[test]
  fn decl_assign_with_fallible_call() {
    let expr = parse_expression("x := foo() or_panic").unwrap();
    let Expr::DeclAssign { left, right } = expr else {
      panic!("expected a declaration");
    };
    assert_eq!(*left, sym("x", 0));
    assert!(right.is_fallible_call());
  }

  #[test]
  fn token_outside_binding_power_table_is_fatal() {
    let err = parse_expression("a \"b\"").unwrap_err();
    assert!(matches!(
      err,
      CompileError::InvalidToken { ref token, .. } if token.kind == TokenKind::String
    ));
  }

  #[test]
  fn parses_package_and_imports() {
    let stmts = parse_source("package main\n\nimport \"fmt\"\nimport (\n\"a\"\n\"b\"\n)\n").unwrap();
    assert_eq!(stmts.len(), 3);
    assert!(matches!(&stmts[0], Stmt::Package { name } if name.text == "main"));
    assert!(matches!(&stmts[1], Stmt::Import { names } if names.len() == 1));
    let Stmt::Import { names } = &stmts[2] else {
      panic!("expected an import group");
    };
    let names: Vec<&str> = names.iter().map(|name| name.text.as_str()).collect();
    assert_eq!(names, ["a", "b"]);
  }

  #[test]
  fn parses_function_signature() {
    let source = "func add(a int, b int) (int, error) {\n\treturn a + b, nil\n}\n";
    let stmts = parse_source(source).unwrap();
    let Stmt::FuncDecl {
      name,
      parameters,
      return_types,
      body,
    } = &stmts[0]
    else {
      panic!("expected a function");
    };
    assert_eq!(name.text, "add");
    let params: Vec<(&str, &str)> = parameters
      .iter()
      .map(|param| (param.name.text.as_str(), param.ty.text.as_str()))
      .collect();
    assert_eq!(params, [("a", "int"), ("b", "int")]);
    let types: Vec<&str> = return_types.iter().map(|ty| ty.text.as_str()).collect();
    assert_eq!(types, ["int", "error"]);
    assert!(matches!(
      &body.body[0],
      Stmt::Return { values: Some(Expr::List { .. }) }
    ));
  }

  #[test]
  fn single_bare_return_type() {
    let stmts = parse_source("func one() int {\n\treturn 1\n}\n").unwrap();
    assert!(matches!(
      &stmts[0],
      Stmt::FuncDecl { return_types, .. } if return_types.len() == 1
    ));
  }

  #[test]
  fn missing_parameter_comma_is_fatal() {
    let err = parse_source("func f(x int y int) {}").unwrap_err();
    assert_eq!(invalid_token_text(err), "y");
  }

  #[test]
  fn trailing_parameter_comma_is_fatal() {
    let err = parse_source("func f(x int,) {}").unwrap_err();
    assert!(matches!(
      err,
      CompileError::InvalidToken { ref token, .. } if token.kind == TokenKind::ParenClose
    ));
  }

  #[test]
  fn unterminated_block_is_fatal() {
    let err = parse_source("func main() {\n\tfoo()\n").unwrap_err();
    assert!(matches!(err, CompileError::UnexpectedEof { line: 3, .. }));
  }

  #[test]
  fn var_and_bare_return() {
    let stmts = parse_source("func f() {\n\tvar x int\n\treturn\n}\n").unwrap();
    let Stmt::FuncDecl { body, .. } = &stmts[0] else {
      panic!("expected a function");
    };
    assert!(matches!(&body.body[0], Stmt::VarDecl { name, ty } if name.text == "x" && ty.text == "int"));
    assert_eq!(body.body[1], Stmt::Return { values: None });
  }

  #[test]
  fn one_line_body() {
    let stmts = parse_source("func main() { foo() }").unwrap();
    let Stmt::FuncDecl { body, .. } = &stmts[0] else {
      panic!("expected a function");
    };
    assert_eq!(body.body.len(), 1);
  }

  #[test]
  fn statement_cannot_start_with_a_number() {
    let err = parse_source("42\n").unwrap_err();
    assert!(matches!(
      err,
      CompileError::InvalidToken { ref token, .. } if token.kind == TokenKind::Number
    ));
  }
}
