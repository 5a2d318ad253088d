//! Code generation: lower the parsed statements into Go source text.
//!
//! The generator walks the tree once, writing into a single buffer. Besides
//! the indentation depth it threads a [`Scope`] recording which names are
//! already declared in the function being lowered; the `or_panic` expansion
//! consults it to pick `:=` for the first introduction of the synthetic `ret`
//! and `err` names and `=` afterwards. Each function body works on its own
//! copy of the enclosing scope, so nothing declared inside leaks back out.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::ast::{Expr, Parameter, Stmt};
use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind};

const RET: &str = "ret";
const ERR: &str = "err";

/// Names known to be declared at the current point of a function body.
#[derive(Debug, Clone, Default)]
pub struct Scope {
  declared: HashMap<String, bool>,
}

impl Scope {
  pub fn is_declared(&self, name: &str) -> bool {
    self.declared.get(name).copied().unwrap_or(false)
  }

  pub fn declare(&mut self, name: impl Into<String>) {
    self.declared.insert(name.into(), true);
  }
}

/// Emit Go source for a whole program, trimmed of surrounding whitespace.
pub fn generate(stmts: &[Stmt]) -> CompileResult<String> {
  let mut generator = Generator::default();
  let mut scope = Scope::default();
  generator.emit_stmts(stmts, 0, &mut scope)?;

  let output = generator.out.trim().to_string();
  debug!(bytes = output.len(), "generated target source");
  Ok(output)
}

const SUM_POWER: u8 = 11;
const PRODUCT_POWER: u8 = 12;

/// Binding power of a binary operator as parsed. Anything else reaching a
/// `Binary` node is rejected before this matters.
fn operator_power(kind: TokenKind) -> u8 {
  match kind {
    TokenKind::Star => PRODUCT_POWER,
    _ => SUM_POWER,
  }
}

fn indent(depth: usize) -> String {
  "\t".repeat(depth)
}

#[derive(Default)]
struct Generator {
  out: String,
}

impl Generator {
  fn emit_stmts(&mut self, stmts: &[Stmt], depth: usize, scope: &mut Scope) -> CompileResult<()> {
    for stmt in stmts {
      trace!(kind = stmt.kind(), depth, "lowering statement");
      self.emit_stmt(stmt, depth, scope)?;
    }
    Ok(())
  }

  fn emit_stmt(&mut self, stmt: &Stmt, depth: usize, scope: &mut Scope) -> CompileResult<()> {
    let indent = indent(depth);
    match stmt {
      Stmt::Package { name } => {
        self
          .out
          .push_str(&format!("{indent}package {}\n\n", name.text));
      }
      Stmt::Import { names } => self.emit_import(names, &indent)?,
      Stmt::FuncDecl {
        name,
        parameters,
        return_types,
        body,
      } => {
        scope.declare(&name.text);
        let mut inner = scope.clone();
        self.emit_signature(name, parameters, return_types, &indent, &mut inner);
        self.out.push_str("{\n");
        self.emit_stmts(&body.body, depth + 1, &mut inner)?;
        // Only top-level declarations are separated by a blank line.
        let separator = if depth == 0 { "\n\n" } else { "\n" };
        self.out.push_str(&format!("{indent}}}{separator}"));
      }
      Stmt::VarDecl { name, ty } => {
        scope.declare(&name.text);
        self
          .out
          .push_str(&format!("{indent}var {} {}\n", name.text, ty.text));
      }
      Stmt::Return { values } => self.emit_return(values.as_ref(), &indent, scope)?,
      Stmt::Expr(expr) => self.emit_expr_stmt(expr, &indent, scope)?,
      Stmt::Block(_) => return Err(self.unhandled(stmt.kind())),
    }
    Ok(())
  }

  fn emit_import(&mut self, names: &[Token], indent: &str) -> CompileResult<()> {
    match names {
      [] => return Err(self.unhandled("Import without names")),
      [name] => {
        self
          .out
          .push_str(&format!("{indent}import \"{}\"\n\n", name.text));
      }
      names => {
        self.out.push_str(&format!("{indent}import (\n"));
        for name in names {
          self
            .out
            .push_str(&format!("{indent}\t\"{}\"\n", name.text));
        }
        self.out.push_str(&format!("{indent})\n\n"));
      }
    }
    Ok(())
  }

  /// `func name(a int, b int) (int, error) `; parameters are declared in the
  /// body's scope.
  fn emit_signature(
    &mut self,
    name: &Token,
    parameters: &[Parameter],
    return_types: &[Token],
    indent: &str,
    scope: &mut Scope,
  ) {
    let params = parameters
      .iter()
      .map(|param| {
        scope.declare(&param.name.text);
        format!("{} {}", param.name.text, param.ty.text)
      })
      .collect::<Vec<_>>()
      .join(", ");
    self
      .out
      .push_str(&format!("{indent}func {}({params}) ", name.text));

    match return_types {
      [] => {}
      [ty] => self.out.push_str(&format!("{} ", ty.text)),
      types => {
        let types = types
          .iter()
          .map(|ty| ty.text.as_str())
          .collect::<Vec<_>>()
          .join(", ");
        self.out.push_str(&format!("({types}) "));
      }
    }
  }

  fn emit_return(
    &mut self,
    values: Option<&Expr>,
    indent: &str,
    scope: &mut Scope,
  ) -> CompileResult<()> {
    match values {
      None => self.out.push_str(&format!("{indent}return\n")),
      Some(Expr::Call {
        callee,
        args,
        or_panic: true,
      }) => {
        let op = if scope.is_declared(RET) && scope.is_declared(ERR) {
          "="
        } else {
          ":="
        };
        scope.declare(RET);
        scope.declare(ERR);

        self.out.push_str(&format!("{indent}{RET}, {ERR} {op} "));
        self.emit_call(callee, args.as_deref())?;
        self.out.push('\n');
        self.emit_panic_check(indent);
        self.out.push_str(&format!("{indent}return {RET}\n"));
      }
      Some(expr) => {
        self.out.push_str(&format!("{indent}return "));
        self.emit_expr(expr)?;
        self.out.push('\n');
      }
    }
    Ok(())
  }

  fn emit_expr_stmt(&mut self, expr: &Expr, indent: &str, scope: &mut Scope) -> CompileResult<()> {
    match expr {
      Expr::Call {
        callee,
        args,
        or_panic: true,
      } => {
        let op = if scope.is_declared(ERR) { "=" } else { ":=" };
        scope.declare(ERR);

        self.out.push_str(&format!("{indent}{ERR} {op} "));
        self.emit_call(callee, args.as_deref())?;
        self.out.push('\n');
        self.emit_panic_check(indent);
      }
      Expr::DeclAssign { left, right } => {
        for item in left.items() {
          if let Expr::Symbol(name) = item {
            scope.declare(&name.text);
          }
        }

        self.out.push_str(indent);
        self.emit_expr(left)?;
        match &**right {
          Expr::Call {
            callee,
            args,
            or_panic: true,
          } => {
            if !matches!(**left, Expr::Symbol(_)) {
              return Err(misplaced(right, "unless a single name is declared"));
            }
            scope.declare(ERR);
            self.out.push_str(&format!(", {ERR} := "));
            self.emit_call(callee, args.as_deref())?;
            self.out.push('\n');
            self.emit_panic_check(indent);
          }
          right => {
            self.out.push_str(" := ");
            self.emit_expr(right)?;
            self.out.push('\n');
          }
        }
      }
      Expr::Assign { left, right } => {
        self.out.push_str(indent);
        self.emit_expr(left)?;
        self.out.push_str(" = ");
        self.emit_expr(right)?;
        self.out.push('\n');
      }
      other => {
        self.out.push_str(indent);
        self.emit_expr(other)?;
        self.out.push('\n');
      }
    }
    Ok(())
  }

  fn emit_panic_check(&mut self, indent: &str) {
    self.out.push_str(&format!(
      "{indent}if {ERR} != nil {{\n{indent}\tpanic({ERR})\n{indent}}}\n"
    ));
  }

  /// Lower an expression inline, without indentation or trailing newline.
  fn emit_expr(&mut self, expr: &Expr) -> CompileResult<()> {
    match expr {
      Expr::Symbol(token) | Expr::Number(token) => self.out.push_str(&token.text),
      Expr::String(token) => self.out.push_str(&format!("\"{}\"", token.text)),
      Expr::Access { instance, field } => {
        self.emit_expr(instance)?;
        self.out.push('.');
        self.emit_expr(field)?;
      }
      call if call.is_fallible_call() => {
        return Err(misplaced(call, "inside an expression"));
      }
      Expr::Call { callee, args, .. } => self.emit_call(callee, args.as_deref())?,
      Expr::Binary {
        left,
        operator,
        right,
      } => {
        let (op, power) = match operator.kind {
          TokenKind::Plus => (" + ", SUM_POWER),
          TokenKind::Star => (" * ", PRODUCT_POWER),
          _ => return Err(self.unhandled(format!("Binary operator {operator}"))),
        };
        self.emit_operand(left, power, false)?;
        self.out.push_str(op);
        self.emit_operand(right, power, true)?;
      }
      Expr::Assign { left, right } => {
        self.emit_expr(left)?;
        self.out.push_str(" = ");
        self.emit_expr(right)?;
      }
      Expr::DeclAssign { left, right } => {
        self.emit_expr(left)?;
        self.out.push_str(" := ");
        self.emit_expr(right)?;
      }
      Expr::List { value, next } => {
        self.emit_expr(value)?;
        if let Some(next) = next {
          self.out.push_str(", ");
          self.emit_expr(next)?;
        }
      }
    }
    Ok(())
  }

  /// Operand of a binary operator binding at `parent`. A looser operand is
  /// parenthesised, and so is an equally tight one on the right, since the
  /// operators are left-associative.
  fn emit_operand(&mut self, operand: &Expr, parent: u8, right: bool) -> CompileResult<()> {
    let grouped = match operand {
      Expr::Binary { operator, .. } => {
        let power = operator_power(operator.kind);
        power < parent || (right && power == parent)
      }
      _ => false,
    };
    if grouped {
      self.out.push('(');
      self.emit_expr(operand)?;
      self.out.push(')');
      Ok(())
    } else {
      self.emit_expr(operand)
    }
  }

  fn emit_call(&mut self, callee: &Expr, args: Option<&Expr>) -> CompileResult<()> {
    self.emit_expr(callee)?;
    self.out.push('(');
    if let Some(args) = args {
      self.emit_expr(args)?;
    }
    self.out.push(')');
    Ok(())
  }

  fn unhandled(&self, node: impl Into<String>) -> CompileError {
    CompileError::internal(&self.out, node)
  }
}

fn misplaced(call: &Expr, position: &str) -> CompileError {
  let anchor = call.anchor();
  let callee = match call {
    Expr::Call { callee, .. } => callee.to_string(),
    other => other.to_string(),
  };
  CompileError::MisplacedOrPanic {
    callee,
    line: anchor.line,
    column: anchor.column,
    position: position.to_string(),
  }
}
