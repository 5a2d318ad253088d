//! Syntax tree produced by the parser and consumed by the code generator.
//!
//! Both node families are closed enums so every consumer matches them
//! exhaustively. Nodes own their children; nothing is shared.

use std::fmt;

use crate::tokenizer::{Token, TokenKind};

/// Expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
  Symbol(Token),
  Number(Token),
  String(Token),
  /// `instance.field`; both sides are always `Symbol`.
  Access {
    instance: Box<Expr>,
    field: Box<Expr>,
  },
  /// The callee is always a `Symbol` or an `Access`.
  Call {
    callee: Box<Expr>,
    args: Option<Box<Expr>>,
    or_panic: bool,
  },
  Binary {
    left: Box<Expr>,
    operator: Token,
    right: Box<Expr>,
  },
  Assign {
    left: Box<Expr>,
    right: Box<Expr>,
  },
  DeclAssign {
    left: Box<Expr>,
    right: Box<Expr>,
  },
  /// Comma separated sequence as a right-leaning cons chain.
  List {
    value: Box<Expr>,
    next: Option<Box<Expr>>,
  },
}

impl Expr {
  pub fn access(instance: Expr, field: Expr) -> Self {
    Self::Access {
      instance: Box::new(instance),
      field: Box::new(field),
    }
  }

  pub fn call(callee: Expr, args: Option<Expr>) -> Self {
    Self::Call {
      callee: Box::new(callee),
      args: args.map(Box::new),
      or_panic: false,
    }
  }

  pub fn binary(left: Expr, operator: Token, right: Expr) -> Self {
    Self::Binary {
      left: Box::new(left),
      operator,
      right: Box::new(right),
    }
  }

  pub fn assign(left: Expr, right: Expr) -> Self {
    Self::Assign {
      left: Box::new(left),
      right: Box::new(right),
    }
  }

  pub fn decl_assign(left: Expr, right: Expr) -> Self {
    Self::DeclAssign {
      left: Box::new(left),
      right: Box::new(right),
    }
  }

  pub fn list(value: Expr, next: Option<Expr>) -> Self {
    Self::List {
      value: Box::new(value),
      next: next.map(Box::new),
    }
  }

  /// Build a right-leaning chain from `items`. Returns `None` when empty.
  pub fn list_of(items: Vec<Expr>) -> Option<Self> {
    items
      .into_iter()
      .rev()
      .fold(None, |next, value| Some(Self::list(value, next)))
  }

  /// Iterate the values of a `List` chain in order. Any other expression
  /// yields itself once.
  pub fn items(&self) -> ListItems<'_> {
    ListItems {
      current: Some(self),
    }
  }

  /// Token that best locates this expression in the source.
  pub fn anchor(&self) -> &Token {
    match self {
      Self::Symbol(token) | Self::Number(token) | Self::String(token) => token,
      Self::Access { instance, .. } => instance.anchor(),
      Self::Call { callee, .. } => callee.anchor(),
      Self::Binary { left, .. }
      | Self::Assign { left, .. }
      | Self::DeclAssign { left, .. } => left.anchor(),
      Self::List { value, .. } => value.anchor(),
    }
  }

  /// True for a call carrying the `or_panic` marker.
  pub fn is_fallible_call(&self) -> bool {
    matches!(self, Self::Call { or_panic: true, .. })
  }
}

pub struct ListItems<'a> {
  current: Option<&'a Expr>,
}

impl<'a> Iterator for ListItems<'a> {
  type Item = &'a Expr;

  fn next(&mut self) -> Option<Self::Item> {
    match self.current? {
      Expr::List { value, next } => {
        self.current = next.as_deref();
        Some(value)
      }
      other => {
        self.current = None;
        Some(other)
      }
    }
  }
}

impl fmt::Display for Expr {
  /// Source-like rendering, used to name callees in diagnostics.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Symbol(token) | Self::Number(token) => f.write_str(&token.text),
      Self::String(token) => write!(f, "\"{}\"", token.text),
      Self::Access { instance, field } => write!(f, "{instance}.{field}"),
      Self::Call { callee, args, .. } => match args {
        Some(args) => write!(f, "{callee}({args})"),
        None => write!(f, "{callee}()"),
      },
      Self::Binary {
        left,
        operator,
        right,
      } => {
        let op = match operator.kind {
          TokenKind::Plus => "+",
          TokenKind::Star => "*",
          other => other.name(),
        };
        write!(f, "{left} {op} {right}")
      }
      Self::Assign { left, right } => write!(f, "{left} = {right}"),
      Self::DeclAssign { left, right } => write!(f, "{left} := {right}"),
      Self::List { value, next } => match next {
        Some(next) => write!(f, "{value}, {next}"),
        None => write!(f, "{value}"),
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
  pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
  pub name: Token,
  pub ty: Token,
}

/// Statement tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
  Block(Block),
  Package {
    name: Token,
  },
  /// One name for `import "x"`, several for the parenthesised group.
  Import {
    names: Vec<Token>,
  },
  FuncDecl {
    name: Token,
    parameters: Vec<Parameter>,
    return_types: Vec<Token>,
    body: Block,
  },
  VarDecl {
    name: Token,
    ty: Token,
  },
  Return {
    values: Option<Expr>,
  },
  Expr(Expr),
}

impl Stmt {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Block(_) => "Block",
      Self::Package { .. } => "Package",
      Self::Import { .. } => "Import",
      Self::FuncDecl { .. } => "FuncDecl",
      Self::VarDecl { .. } => "VarDecl",
      Self::Return { .. } => "Return",
      Self::Expr(_) => "Expr",
    }
  }
}
