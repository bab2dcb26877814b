//! Typed views over raw replies.
//!
//! Consoles are loose about argument types: numbers arrive as ints, floats
//! or numeric strings depending on the attribute. The conversions here are
//! the only place that coercion happens.

use serde_json::Value;

use crate::error::ParseError;
use crate::osc::{OscArg, Reply};

/// A single attribute value as reported by a console.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Empty,
}

impl AttributeValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Bool(b) => AttributeValue::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(AttributeValue::Empty, AttributeValue::Number),
            Value::String(s) => AttributeValue::Text(s.clone()),
            _ => AttributeValue::Empty,
        }
    }

    pub fn from_arg(arg: &OscArg) -> Self {
        match arg {
            OscArg::Bool(b) => AttributeValue::Bool(*b),
            OscArg::Int(i) => AttributeValue::Number(*i as f64),
            OscArg::Long(i) => AttributeValue::Number(*i as f64),
            OscArg::Float(f) => AttributeValue::Number(*f as f64),
            OscArg::Double(f) => AttributeValue::Number(*f),
            OscArg::String(s) => AttributeValue::Text(s.clone()),
            _ => AttributeValue::Empty,
        }
    }

    /// Numbers, and text that parses as a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) if n.is_finite() => Some(*n),
            AttributeValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Non-negative whole numbers, and text that parses as one.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            AttributeValue::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64 => {
                Some(*n as u32)
            }
            AttributeValue::Text(s) => s.trim().parse::<u32>().ok(),
            _ => None,
        }
    }

    /// Booleans, `0`/`1`, and `"true"`/`"false"`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            AttributeValue::Number(n) if *n == 0.0 || *n == 1.0 => Some(*n == 1.0),
            AttributeValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Non-empty text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}

/// The attribute at `index` in a positional reply.
pub fn positional(reply: &Reply, index: usize) -> AttributeValue {
    reply
        .args
        .get(index)
        .map_or(AttributeValue::Empty, AttributeValue::from_arg)
}

/// Text at `index`, or a parse error naming `field`.
pub fn positional_text(reply: &Reply, index: usize, field: &str) -> Result<String, ParseError> {
    match positional(reply, index) {
        AttributeValue::Text(s) => Ok(s),
        other => Err(ParseError::new(
            &reply.address,
            format!("expected {} text at argument {}, got {:?}", field, index, other),
        )),
    }
}

/// The first argument of a count reply.
pub fn count(reply: &Reply) -> Result<u32, ParseError> {
    positional(reply, 0).as_u32().ok_or_else(|| {
        ParseError::new(
            &reply.address,
            format!("expected a count, got {:?}", reply.args.first()),
        )
    })
}
