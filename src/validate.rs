//! Request validation.
//!
//! Each field is first coerced to a number, then checked against the ranges
//! declared on `PredictionRequest`. Every violation is collected, not just
//! the first. Items use the FastAPI
//! `{type, loc, msg, input, ctx}` layout.

use serde::Serialize;
use serde_json::{json, Map, Value};
use utoipa::ToSchema;
use validator::Validate;

use crate::types::{PredictionRequest, FEATURE_ORDER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Missing,
    FloatType,
    FloatParsing,
    IntType,
    IntParsing,
    IntFromFloat,
    FiniteNumber,
    GreaterThanEqual,
    LessThanEqual,
    JsonInvalid,
    ModelAttributesType,
}

/// One offending input location.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FieldViolation {
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    #[schema(value_type = Vec<Object>)]
    pub loc: Vec<Value>,
    pub msg: String,
    #[schema(value_type = Object)]
    pub input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub ctx: Option<Value>,
}

impl FieldViolation {
    fn at_body(kind: ViolationKind, msg: impl Into<String>, input: Value) -> Self {
        Self {
            kind,
            loc: vec![json!("body")],
            msg: msg.into(),
            input,
            ctx: None,
        }
    }

    fn at_field(field: &str, kind: ViolationKind, msg: impl Into<String>, input: Value) -> Self {
        Self {
            kind,
            loc: vec![json!("body"), json!(field)],
            msg: msg.into(),
            input,
            ctx: None,
        }
    }

    fn with_ctx(mut self, ctx: Value) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Name of the offending field, if the violation is field-scoped.
    pub fn field(&self) -> Option<&str> {
        self.loc.get(1).and_then(Value::as_str)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("request failed validation ({} violation(s))", .violations.len())]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    fn single(v: FieldViolation) -> Self {
        Self { violations: vec![v] }
    }

    /// Body was not parseable JSON.
    pub fn json_invalid(body: &[u8], err: &serde_json::Error) -> Self {
        let offset = byte_offset(body, err.line(), err.column());
        Self::single(FieldViolation {
            kind: ViolationKind::JsonInvalid,
            loc: vec![json!("body"), json!(offset)],
            msg: "JSON decode error".to_string(),
            input: json!({}),
            ctx: Some(json!({ "error": err.to_string() })),
        })
    }

    /// Body was absent or whitespace only.
    pub fn body_missing() -> Self {
        Self::single(FieldViolation::at_body(
            ViolationKind::Missing,
            "Field required",
            Value::Null,
        ))
    }
}

// serde_json reports 1-based line/column; convert to a byte offset into the body.
fn byte_offset(body: &[u8], line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (i, l) in body.split(|b| *b == b'\n').enumerate() {
        if i + 1 == line {
            return (offset + column.saturating_sub(1)).min(body.len());
        }
        offset += l.len() + 1;
    }
    body.len()
}

/// Integer-valued fields; everything else is a float.
const INTEGER_FIELDS: [&str; 1] = ["crop"];

fn is_integer(field: &str) -> bool {
    INTEGER_FIELDS.iter().any(|f| *f == field)
}

type Coerced = Result<f64, (ViolationKind, &'static str)>;

fn coerce_float(raw: &Value) -> Coerced {
    let x = match raw {
        Value::Number(n) => n
            .as_f64()
            .ok_or((ViolationKind::FloatType, "Input should be a valid number"))?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
            (
                ViolationKind::FloatParsing,
                "Input should be a valid number, unable to parse string as a number",
            )
        })?,
        _ => return Err((ViolationKind::FloatType, "Input should be a valid number")),
    };
    // NaN compares false against both range bounds
    if x.is_nan() {
        return Err((ViolationKind::FiniteNumber, "Input should be a finite number"));
    }
    Ok(x)
}

fn coerce_int(raw: &Value) -> Coerced {
    match raw {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i as f64)
            } else if let Some(u) = n.as_u64() {
                Ok(u as f64)
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 => Ok(f),
                    Some(_) => Err((
                        ViolationKind::IntFromFloat,
                        "Input should be a valid integer, got a number with a fractional part",
                    )),
                    None => Err((ViolationKind::IntType, "Input should be a valid integer")),
                }
            }
        }
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(|i| i as f64)
                .or_else(|_| match s.parse::<f64>() {
                    Ok(f) if f.fract() == 0.0 => Ok(f),
                    _ => Err(()),
                })
                .map_err(|_| {
                    (
                        ViolationKind::IntParsing,
                        "Input should be a valid integer, unable to parse string as an integer",
                    )
                })
        }
        _ => Err((ViolationKind::IntType, "Input should be a valid integer")),
    }
}

/// Validate a decoded JSON body. Unknown keys are ignored.
pub fn validate_request(body: &Value) -> Result<PredictionRequest, ValidationError> {
    let Some(obj) = body.as_object() else {
        return Err(ValidationError::single(FieldViolation::at_body(
            ViolationKind::ModelAttributesType,
            "Input should be a valid dictionary or object to extract fields from",
            body.clone(),
        )));
    };
    validate_fields(obj)
}

fn validate_fields(obj: &Map<String, Value>) -> Result<PredictionRequest, ValidationError> {
    let mut values = [0.0f64; 7];
    // (field index, violation) so type and range failures interleave in field order
    let mut violations: Vec<(usize, FieldViolation)> = Vec::new();

    for (i, (slot, name)) in values.iter_mut().zip(FEATURE_ORDER).enumerate() {
        let Some(raw) = obj.get(name) else {
            violations.push((
                i,
                FieldViolation::at_field(
                    name,
                    ViolationKind::Missing,
                    "Field required",
                    Value::Object(obj.clone()),
                ),
            ));
            continue;
        };
        let coerced = if is_integer(name) {
            coerce_int(raw)
        } else {
            coerce_float(raw)
        };
        match coerced {
            Ok(x) => *slot = x,
            Err((kind, msg)) => {
                violations.push((i, FieldViolation::at_field(name, kind, msg, raw.clone())))
            }
        }
    }

    // Fields that failed coercion hold 0.0, which is inside every range.
    let req = PredictionRequest::from_features(values);
    if let Err(errs) = req.validate() {
        violations.extend(range_violations(&errs, &values, obj));
    }

    if violations.is_empty() {
        return Ok(req);
    }
    violations.sort_by_key(|(i, _)| *i);
    Err(ValidationError {
        violations: violations.into_iter().map(|(_, v)| v).collect(),
    })
}

/// Translate `range` failures from the declared constraints into items.
fn range_violations(
    errs: &validator::ValidationErrors,
    values: &[f64; 7],
    obj: &Map<String, Value>,
) -> Vec<(usize, FieldViolation)> {
    let mut out = Vec::new();
    for (field, list) in errs.field_errors() {
        let field: &str = &field;
        let Some(i) = FEATURE_ORDER.iter().position(|f| *f == field) else {
            continue;
        };
        let raw = obj.get(field).cloned().unwrap_or(Value::Null);
        for e in list.iter() {
            if let Some(v) = bound_violation(field, values[i], e, raw.clone()) {
                out.push((i, v));
            }
        }
    }
    out
}

fn bound_violation(
    field: &str,
    x: f64,
    e: &validator::ValidationError,
    raw: Value,
) -> Option<FieldViolation> {
    if e.code != "range" {
        return None;
    }
    let min = e.params.get("min").and_then(Value::as_f64);
    let max = e.params.get("max").and_then(Value::as_f64);
    let (kind, key, word, bound) = match (min, max) {
        (Some(min), _) if x < min => (ViolationKind::GreaterThanEqual, "ge", "greater", min),
        (_, Some(max)) if x > max => (ViolationKind::LessThanEqual, "le", "less", max),
        _ => return None,
    };

    let bound_json = if is_integer(field) {
        json!(bound as i64)
    } else {
        json!(bound)
    };
    let mut ctx = Map::new();
    ctx.insert(key.to_string(), bound_json);

    Some(
        FieldViolation::at_field(
            field,
            kind,
            format!("Input should be {word} than or equal to {bound}"),
            raw,
        )
        .with_ctx(Value::Object(ctx)),
    )
}
