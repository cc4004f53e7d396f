use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ty::TypeId;

/// A compile-time value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstValue {
    Int(i32),
    Float(f32),
    Str(String),
    Bytes(Vec<u8>),
}

impl ConstValue {
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ConstValue::Int(v) => Some(*v as f32),
            ConstValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ConstValue::Int(_) | ConstValue::Float(_))
    }

    /// Text used when the value is concatenated onto a string.
    pub fn to_plain_string(&self) -> String {
        match self {
            ConstValue::Int(v) => v.to_string(),
            ConstValue::Float(v) => format_float(*v),
            ConstValue::Str(s) => s.clone(),
            ConstValue::Bytes(b) => bytes_to_caos(b),
        }
    }
}

/// Renders the value as a CAOS literal.
impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Float(v) => f.write_str(&format_float(*v)),
            ConstValue::Str(s) => f.write_str(&escape_string(s)),
            ConstValue::Bytes(b) => f.write_str(&bytes_to_caos(b)),
        }
    }
}

/// A value together with the type it was declared or inferred as.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub value: ConstValue,
    pub ty: TypeId,
}

impl Constant {
    pub fn new(value: ConstValue, ty: TypeId) -> Self {
        Self { value, ty }
    }

    pub fn to_caos(&self) -> String {
        self.value.to_string()
    }
}

/// Floats always carry a decimal point so CAOS reads them as floats.
pub fn format_float(v: f32) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

/// Quotes and escapes a string literal.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn bytes_to_caos(bytes: &[u8]) -> String {
    let parts: Vec<String> = bytes.iter().map(u8::to_string).collect();
    format!("[{}]", parts.join(" "))
}
