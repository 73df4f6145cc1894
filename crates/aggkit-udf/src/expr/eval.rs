use std::borrow::Cow;
use std::cmp::Ordering;

use aggkit_core::Value;

use super::{BinaryOp, Node, UnaryOp};
use crate::error::UdfError;

const RECORD_NAME: &str = "rec";

pub(super) fn eval<'a>(node: &'a Node, record: &'a Value) -> Result<Cow<'a, Value>, UdfError> {
    match node {
        Node::Literal(v) => Ok(Cow::Borrowed(v)),
        Node::Name(name) if name == RECORD_NAME => Ok(Cow::Borrowed(record)),
        Node::Name(_) => Ok(Cow::Owned(Value::Nil)),
        Node::Index(target, key) => {
            let key = eval(key, record)?;
            match eval(target, record)? {
                Cow::Borrowed(t) => index(t, &key).map(Cow::Borrowed),
                Cow::Owned(t) => index(&t, &key).map(|v| Cow::Owned(v.clone())),
            }
        }
        Node::Unary(op, operand) => {
            let v = eval(operand, record)?;
            unary(*op, &v).map(Cow::Owned)
        }
        Node::And(lhs, rhs) => {
            let l = eval(lhs, record)?;
            if l.is_truthy() { eval(rhs, record) } else { Ok(l) }
        }
        Node::Or(lhs, rhs) => {
            let l = eval(lhs, record)?;
            if l.is_truthy() { Ok(l) } else { eval(rhs, record) }
        }
        Node::Binary(op, lhs, rhs) => {
            let l = eval(lhs, record)?;
            let r = eval(rhs, record)?;
            binary(*op, &l, &r).map(Cow::Owned)
        }
    }
}

fn index<'v>(target: &'v Value, key: &Value) -> Result<&'v Value, UdfError> {
    const NIL: &Value = &Value::Nil;
    match target {
        Value::Map(map) => Ok(match key {
            Value::String(k) => map.get(k).unwrap_or(NIL),
            _ => NIL,
        }),
        // Lua lists are 1-based.
        Value::List(items) => Ok(key
            .as_i64()
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| items.get(i))
            .unwrap_or(NIL)),
        other => Err(UdfError::Runtime(format!(
            "attempt to index a {} value",
            other.type_name()
        ))),
    }
}

fn unary(op: UnaryOp, v: &Value) -> Result<Value, UdfError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
        UnaryOp::Neg => match v {
            Value::Int(i) => Ok(i
                .checked_neg()
                .map_or(Value::Float(-(*i as f64)), Value::Int)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(arith_error(other)),
        },
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, UdfError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(equals(l, r))),
        BinaryOp::Ne => Ok(Value::Bool(!equals(l, r))),
        BinaryOp::Lt => order(l, r).map(|o| Value::Bool(o == Ordering::Less)),
        BinaryOp::Le => order(l, r).map(|o| Value::Bool(o != Ordering::Greater)),
        BinaryOp::Gt => order(l, r).map(|o| Value::Bool(o == Ordering::Greater)),
        BinaryOp::Ge => order(l, r).map(|o| Value::Bool(o != Ordering::Less)),
        BinaryOp::Concat => concat(l, r),
        _ => arith(op, l, r),
    }
}

fn arith_error(v: &Value) -> UdfError {
    UdfError::Runtime(format!(
        "attempt to perform arithmetic on a {} value",
        v.type_name()
    ))
}

fn arith(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, UdfError> {
    if let (Value::Int(a), Value::Int(b)) = (l, r) {
        let (a, b) = (*a, *b);
        let exact = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            // Lua's modulo takes the sign of the divisor.
            BinaryOp::Mod => a
                .checked_rem_euclid(b)
                .map(|m| if b < 0 && m != 0 { m + b } else { m }),
            _ => None,
        };
        if let Some(v) = exact {
            return Ok(Value::Int(v));
        }
    }

    let a = l.as_f64().ok_or_else(|| arith_error(l))?;
    let b = r.as_f64().ok_or_else(|| arith_error(r))?;
    let v = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a - (a / b).floor() * b,
        BinaryOp::Pow => a.powf(b),
        other => {
            return Err(UdfError::Runtime(format!(
                "operator {other:?} is not arithmetic"
            )));
        }
    };
    Ok(Value::Float(v))
}

fn concat(l: &Value, r: &Value) -> Result<Value, UdfError> {
    for v in [l, r] {
        if !matches!(v, Value::String(_) | Value::Int(_) | Value::Float(_)) {
            return Err(UdfError::Runtime(format!(
                "attempt to concatenate a {} value",
                v.type_name()
            )));
        }
    }
    Ok(Value::String(format!("{l}{r}")))
}

fn equals(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            l.as_f64() == r.as_f64()
        }
        _ => l == r,
    }
}

fn order(l: &Value, r: &Value) -> Result<Ordering, UdfError> {
    compare(l, r).ok_or_else(|| {
        UdfError::Runtime(format!(
            "attempt to compare {} with {}",
            l.type_name(),
            r.type_name()
        ))
    })
}

/// Order two numbers or two strings. Anything else is incomparable, as in
/// Lua; NaN is incomparable too.
pub fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => l.as_f64()?.partial_cmp(&r.as_f64()?),
    }
}

/// Sum two numbers, keeping integers integral until they overflow.
///
/// Callers must only pass numbers; anything else sums as zero.
pub fn numeric_add(l: &Value, r: &Value) -> Value {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => a
            .checked_add(*b)
            .map_or(Value::Float(*a as f64 + *b as f64), Value::Int),
        _ => Value::Float(l.as_f64().unwrap_or(0.0) + r.as_f64().unwrap_or(0.0)),
    }
}
