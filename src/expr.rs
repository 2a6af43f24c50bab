//! Integer expressions and the stack machine that evaluates them.
//!
//! Templates carry their arithmetic as an already-linearised (postfix) list of
//! [`Cell`]s. The parser decides precedence by the order in which it pushes
//! operator cells; this module only evaluates.
//!
//! ```text
//! 7 - 3          →  [Const(7), Const(3), Op(Sub)]          →  4
//! image_idx > 1  →  [Var("image_idx"), Const(1), Op(CmpGt)] →  0 | 1
//! ```
//!
//! ## Evaluation rules
//!
//! - Constants push themselves, variables push whatever the [`VarResolver`] answers.
//! - Binary operators pop `b` first, then `a`, and push `a OP b`, so
//!   non-commutative operators keep their left-to-right reading.
//! - Popping an empty stack yields `0`, and an empty expression evaluates to `0`.
//! - Logical and comparison operators always produce exactly `0` or `1`.
//! - Arithmetic is on `i64` and wraps on overflow.
//! - Division by zero is a defined error ([`EvalError::DivisionByZero`]) from
//!   [`Expr::try_eval`]. The render path uses [`Expr::eval`], which logs it and
//!   yields `0`.
//!
//! Every evaluation owns a fresh working stack, so evaluating one expression
//! from inside a resolver that is itself evaluating another is safe.
//!
//! ## Sharing
//!
//! Cells are immutable once built. Variable names are `Rc<str>`, so splicing
//! one expression into another ([`Expr::push_expr`]) shares the names instead
//! of copying them, and tags share whole expressions through `Rc<Expr>`.

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,
}

/// Operators understood by the stack machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Not,
    And,
    Or,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpGt,
    CmpLe,
    CmpGe,
}

impl Op {
    /// Number of operands consumed from the stack.
    pub fn arity(self) -> usize {
        match self {
            Op::Neg | Op::Not => 1,
            _ => 2,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Neg => "neg",
            Op::Not => "!",
            Op::And => "&&",
            Op::Or => "||",
            Op::CmpEq => "==",
            Op::CmpNe => "!=",
            Op::CmpLt => "<",
            Op::CmpGt => ">",
            Op::CmpLe => "<=",
            Op::CmpGe => ">=",
        }
    }

    fn apply_unary(self, a: i64) -> i64 {
        match self {
            Op::Neg => a.wrapping_neg(),
            Op::Not => i64::from(a == 0),
            _ => a,
        }
    }

    fn apply_binary(self, a: i64, b: i64) -> Result<i64, EvalError> {
        Ok(match self {
            Op::Add => a.wrapping_add(b),
            Op::Sub => a.wrapping_sub(b),
            Op::Mul => a.wrapping_mul(b),
            Op::Div => {
                if b == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                a.wrapping_div(b)
            }
            Op::And => i64::from(a != 0 && b != 0),
            Op::Or => i64::from(a != 0 || b != 0),
            Op::CmpEq => i64::from(a == b),
            Op::CmpNe => i64::from(a != b),
            Op::CmpLt => i64::from(a < b),
            Op::CmpGt => i64::from(a > b),
            Op::CmpLe => i64::from(a <= b),
            Op::CmpGe => i64::from(a >= b),
            Op::Neg | Op::Not => self.apply_unary(b),
        })
    }
}

/// One unit of an expression.
///
/// Serialized externally tagged: `{"const": 5}`, `{"var": "image_idx"}`,
/// `{"op": "sub"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    Op(Op),
    Var(Rc<str>),
    Const(i64),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Op(op) => f.write_str(op.symbol()),
            Cell::Var(name) => f.write_str(name),
            Cell::Const(n) => write!(f, "{n}"),
        }
    }
}

/// Maps a variable name to its current integer value.
///
/// Implementations are expected to log names they do not know and answer `0`.
pub trait VarResolver {
    fn resolve(&self, name: &str) -> i64;
}

/// Resolver used when nothing is bound: every variable is `0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResolver;

impl VarResolver for NullResolver {
    fn resolve(&self, _name: &str) -> i64 {
        0
    }
}

impl<F> VarResolver for F
where
    F: Fn(&str) -> i64,
{
    fn resolve(&self, name: &str) -> i64 {
        self(name)
    }
}

/// A postfix sequence of cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expr {
    cells: Vec<Cell>,
}

impl Expr {
    pub fn new() -> Self {
        Self::default()
    }

    /// An expression consisting of a single constant.
    pub fn constant(value: i64) -> Self {
        Self {
            cells: vec![Cell::Const(value)],
        }
    }

    /// An expression consisting of a single variable reference.
    pub fn var(name: &str) -> Self {
        Self {
            cells: vec![Cell::Var(Rc::from(name))],
        }
    }

    pub fn from_cells(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn push_constant(&mut self, value: i64) -> &mut Self {
        self.cells.push(Cell::Const(value));
        self
    }

    pub fn push_var(&mut self, name: &str) -> &mut Self {
        self.cells.push(Cell::Var(Rc::from(name)));
        self
    }

    pub fn push_op(&mut self, op: Op) -> &mut Self {
        self.cells.push(Cell::Op(op));
        self
    }

    /// Append all of `other`'s cells, sharing variable names.
    pub fn push_expr(&mut self, other: &Expr) -> &mut Self {
        self.cells.extend(other.cells.iter().cloned());
        self
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// The last cell pushed, if any.
    pub fn top(&self) -> Option<&Cell> {
        self.cells.last()
    }

    /// Evaluate, reporting division by zero as an error.
    pub fn try_eval<R>(&self, resolver: &R) -> Result<i64, EvalError>
    where
        R: VarResolver + ?Sized,
    {
        let mut stack: Vec<i64> = Vec::with_capacity(self.cells.len());
        for cell in &self.cells {
            let value = match cell {
                Cell::Const(n) => *n,
                Cell::Var(name) => resolver.resolve(name),
                Cell::Op(op) if op.arity() == 1 => op.apply_unary(stack.pop().unwrap_or(0)),
                Cell::Op(op) => {
                    let b = stack.pop().unwrap_or(0);
                    let a = stack.pop().unwrap_or(0);
                    op.apply_binary(a, b)?
                }
            };
            stack.push(value);
        }
        Ok(stack.last().copied().unwrap_or(0))
    }

    /// Evaluate for rendering. Errors degrade to `0` with a warning.
    pub fn eval<R>(&self, resolver: &R) -> i64
    where
        R: VarResolver + ?Sized,
    {
        self.try_eval(resolver).unwrap_or_else(|err| {
            warn!("{err} while evaluating `{self}`, using 0");
            0
        })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{cell}")?;
        }
        Ok(())
    }
}
