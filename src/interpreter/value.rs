//! Runtime value types and operator semantics

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{EvalError, EvalResult};
use crate::vm::device::DeviceId;

/// Runtime value type
///
/// `Field` is the aggregate-computing addition: a per-device map produced by
/// the neighbor-exchange construct. Operators apply pointwise to fields
/// (device-key intersection when both operands are fields, broadcast when
/// one side is a scalar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Value>),
    Field(BTreeMap<DeviceId, Value>),
}

impl Value {
    /// Check if value is truthy (for conditionals)
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Num(_) => "num",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Field(_) => "field",
        }
    }

    fn as_num(&self, operation: &'static str) -> EvalResult<f64> {
        match self {
            Value::Num(n) => Ok(*n),
            other => Err(EvalError::TypeMismatch {
                operation,
                found: other.type_name().to_string(),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Num(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Field(entries) => {
                f.write_str("{")?;
                for (i, (device, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{device}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/* ===================== Operators ===================== */

/// Two-operand operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Min,
    Max,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Min => "min",
            BinaryOp::Max => "max",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// One-operand operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "neg",
        }
    }
}

/// Reductions over a field's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FoldOp {
    Min,
    Max,
    Sum,
    Any,
    All,
}

impl FoldOp {
    pub fn label(&self) -> &'static str {
        match self {
            FoldOp::Min => "fold-min",
            FoldOp::Max => "fold-max",
            FoldOp::Sum => "fold-sum",
            FoldOp::Any => "fold-any",
            FoldOp::All => "fold-all",
        }
    }
}

/// Apply a binary operator, distributing pointwise over fields.
///
/// Field-field combination keeps only devices present on both sides: a
/// device a neighbor never reported on one operand contributes nothing.
pub fn apply_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    match (lhs, rhs) {
        (Value::Field(l), Value::Field(r)) => {
            let mut out = BTreeMap::new();
            for (device, lv) in l {
                if let Some(rv) = r.get(device) {
                    out.insert(*device, apply_binary(op, lv, rv)?);
                }
            }
            Ok(Value::Field(out))
        }
        (Value::Field(l), scalar) => {
            let mut out = BTreeMap::new();
            for (device, lv) in l {
                out.insert(*device, apply_binary(op, lv, scalar)?);
            }
            Ok(Value::Field(out))
        }
        (scalar, Value::Field(r)) => {
            let mut out = BTreeMap::new();
            for (device, rv) in r {
                out.insert(*device, apply_binary(op, scalar, rv)?);
            }
            Ok(Value::Field(out))
        }
        _ => scalar_binary(op, lhs, rhs),
    }
}

fn scalar_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    let operation = op.symbol();
    match op {
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Num(l), Value::Num(r)) => Ok(Value::Num(l + r)),
            (Value::Str(l), Value::Str(r)) => Ok(Value::Str(format!("{l}{r}"))),
            _ => Err(mismatch(operation, lhs, rhs)),
        },
        BinaryOp::Sub => Ok(Value::Num(
            lhs.as_num(operation)? - rhs.as_num(operation)?,
        )),
        BinaryOp::Mul => Ok(Value::Num(
            lhs.as_num(operation)? * rhs.as_num(operation)?,
        )),
        BinaryOp::Div => Ok(Value::Num(
            lhs.as_num(operation)? / rhs.as_num(operation)?,
        )),
        BinaryOp::Rem => Ok(Value::Num(
            lhs.as_num(operation)? % rhs.as_num(operation)?,
        )),
        BinaryOp::Min => Ok(Value::Num(
            lhs.as_num(operation)?.min(rhs.as_num(operation)?),
        )),
        BinaryOp::Max => Ok(Value::Num(
            lhs.as_num(operation)?.max(rhs.as_num(operation)?),
        )),
        BinaryOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::NotEq => Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Less => Ok(Value::Bool(
            lhs.as_num(operation)? < rhs.as_num(operation)?,
        )),
        BinaryOp::LessEq => Ok(Value::Bool(
            lhs.as_num(operation)? <= rhs.as_num(operation)?,
        )),
        BinaryOp::Greater => Ok(Value::Bool(
            lhs.as_num(operation)? > rhs.as_num(operation)?,
        )),
        BinaryOp::GreaterEq => Ok(Value::Bool(
            lhs.as_num(operation)? >= rhs.as_num(operation)?,
        )),
        BinaryOp::And => Ok(Value::Bool(lhs.is_truthy() && rhs.is_truthy())),
        BinaryOp::Or => Ok(Value::Bool(lhs.is_truthy() || rhs.is_truthy())),
    }
}

/// Apply a unary operator, distributing pointwise over fields.
pub fn apply_unary(op: UnaryOp, value: &Value) -> EvalResult<Value> {
    match value {
        Value::Field(entries) => {
            let mut out = BTreeMap::new();
            for (device, v) in entries {
                out.insert(*device, apply_unary(op, v)?);
            }
            Ok(Value::Field(out))
        }
        _ => match op {
            UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
            UnaryOp::Neg => Ok(Value::Num(-value.as_num("neg")?)),
        },
    }
}

/// Reduce a field's values; an empty field yields `default`.
pub fn fold_field(
    op: FoldOp,
    field: &BTreeMap<DeviceId, Value>,
    default: &Value,
) -> EvalResult<Value> {
    if field.is_empty() {
        return Ok(default.clone());
    }
    let operation = op.label();
    match op {
        FoldOp::Min | FoldOp::Max | FoldOp::Sum => {
            let mut acc: Option<f64> = None;
            for value in field.values() {
                let n = value.as_num(operation)?;
                acc = Some(match (acc, op) {
                    (None, _) => n,
                    (Some(a), FoldOp::Min) => a.min(n),
                    (Some(a), FoldOp::Max) => a.max(n),
                    (Some(a), _) => a + n,
                });
            }
            Ok(Value::Num(acc.unwrap_or(0.0)))
        }
        FoldOp::Any => Ok(Value::Bool(field.values().any(Value::is_truthy))),
        FoldOp::All => Ok(Value::Bool(field.values().all(Value::is_truthy))),
    }
}

fn mismatch(operation: &'static str, lhs: &Value, rhs: &Value) -> EvalError {
    EvalError::TypeMismatch {
        operation,
        found: format!("{} and {}", lhs.type_name(), rhs.type_name()),
    }
}
