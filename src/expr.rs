//! Evaluator for the subset of MapLibre style expressions the layer set uses.
//!
//! The browser hands expressions to MapLibre untouched; this evaluator exists
//! so the headless surface (and the tests) can answer the same questions the
//! browser answers: does this feature pass the layer filter, what radius does
//! it render at, which color does it get.
//!
//! Supported operators: `literal`, `get`, `has`, `id`, `!`, `==`, `!=`, `<`,
//! `<=`, `>`, `>=`, `all`, `any`, `coalesce`, `case`, `match`, `step`,
//! `interpolate` (linear), `to-string`, `to-number`. Unknown operators
//! evaluate to `null`, which no filter treats as a match.

#[cfg(test)]
#[path = "expr_test.rs"]
mod expr_test;

use serde_json::{Map, Number, Value};

use crate::feature::FeatureId;

/// What an expression is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub id: Option<&'a FeatureId>,
    pub properties: &'a Map<String, Value>,
}

impl<'a> EvalContext<'a> {
    #[must_use]
    pub fn new(id: Option<&'a FeatureId>, properties: &'a Map<String, Value>) -> Self {
        Self { id, properties }
    }
}

/// Evaluate `expr` against `ctx`.
#[must_use]
pub fn evaluate(expr: &Value, ctx: &EvalContext<'_>) -> Value {
    let Some(items) = expr.as_array() else {
        return expr.clone();
    };
    let Some((op, args)) = items.split_first() else {
        return Value::Array(Vec::new());
    };
    let Some(op) = op.as_str() else {
        return expr.clone();
    };

    match op {
        "literal" => args.first().cloned().unwrap_or(Value::Null),
        "get" => args
            .first()
            .and_then(Value::as_str)
            .and_then(|key| ctx.properties.get(key))
            .cloned()
            .unwrap_or(Value::Null),
        "has" => Value::Bool(args.first().and_then(Value::as_str).is_some_and(|key| ctx.properties.contains_key(key))),
        "id" => ctx.id.map_or(Value::Null, FeatureId::to_value),
        "!" => match args.first().map(|a| evaluate(a, ctx)) {
            Some(Value::Bool(b)) => Value::Bool(!b),
            _ => Value::Null,
        },
        "==" | "!=" => {
            let (Some(a), Some(b)) = (args.first(), args.get(1)) else {
                return Value::Null;
            };
            let equal = values_equal(&evaluate(a, ctx), &evaluate(b, ctx));
            Value::Bool(if op == "==" { equal } else { !equal })
        }
        "<" | "<=" | ">" | ">=" => {
            let (Some(a), Some(b)) = (args.first(), args.get(1)) else {
                return Value::Null;
            };
            let (Some(a), Some(b)) = (evaluate(a, ctx).as_f64(), evaluate(b, ctx).as_f64()) else {
                return Value::Null;
            };
            Value::Bool(match op {
                "<" => a < b,
                "<=" => a <= b,
                ">" => a > b,
                _ => a >= b,
            })
        }
        "all" => Value::Bool(args.iter().all(|a| is_truthy(&evaluate(a, ctx)))),
        "any" => Value::Bool(args.iter().any(|a| is_truthy(&evaluate(a, ctx)))),
        "coalesce" => args.iter().map(|a| evaluate(a, ctx)).find(|v| !v.is_null()).unwrap_or(Value::Null),
        "case" => eval_case(args, ctx),
        "match" => eval_match(args, ctx),
        "step" => eval_step(args, ctx),
        "interpolate" => eval_interpolate(args, ctx),
        "to-string" => Value::String(args.first().map(|a| to_string(&evaluate(a, ctx))).unwrap_or_default()),
        "to-number" => args
            .iter()
            .find_map(|a| to_number(&evaluate(a, ctx)))
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number),
        _ => Value::Null,
    }
}

/// Whether a filter result selects the feature. Only `true` does.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    matches!(value, Value::Bool(true))
}

/// Stringify a JSON number the way JavaScript does (`1.0` → `"1"`).
#[must_use]
pub fn number_to_string(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        #[allow(clippy::cast_possible_truncation)]
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => format!("{f}"),
        None => n.to_string(),
    }
}

fn to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => number_to_string(n),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Some(f),
            _ => None,
        },
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn eval_case(args: &[Value], ctx: &EvalContext<'_>) -> Value {
    let mut pairs = args.chunks_exact(2);
    for pair in pairs.by_ref() {
        if is_truthy(&evaluate(&pair[0], ctx)) {
            return evaluate(&pair[1], ctx);
        }
    }
    pairs.remainder().first().map_or(Value::Null, |fallback| evaluate(fallback, ctx))
}

fn eval_match(args: &[Value], ctx: &EvalContext<'_>) -> Value {
    let Some((input, rest)) = args.split_first() else {
        return Value::Null;
    };
    let input = evaluate(input, ctx);
    let mut pairs = rest.chunks_exact(2);
    for pair in pairs.by_ref() {
        let hit = match &pair[0] {
            Value::Array(labels) => labels.iter().any(|l| values_equal(l, &input)),
            label => values_equal(label, &input),
        };
        if hit {
            return evaluate(&pair[1], ctx);
        }
    }
    pairs.remainder().first().map_or(Value::Null, |fallback| evaluate(fallback, ctx))
}

fn eval_step(args: &[Value], ctx: &EvalContext<'_>) -> Value {
    let (Some(input), Some(base)) = (args.first(), args.get(1)) else {
        return Value::Null;
    };
    let Some(x) = evaluate(input, ctx).as_f64() else {
        return Value::Null;
    };
    let mut out = base;
    for pair in args[2..].chunks_exact(2) {
        match pair[0].as_f64() {
            Some(stop) if x >= stop => out = &pair[1],
            _ => break,
        }
    }
    evaluate(out, ctx)
}

fn eval_interpolate(args: &[Value], ctx: &EvalContext<'_>) -> Value {
    // Only ["linear"] interpolation is used by the layer set.
    let (Some(kind), Some(input)) = (args.first(), args.get(1)) else {
        return Value::Null;
    };
    if kind.as_array().and_then(|k| k.first()).and_then(Value::as_str) != Some("linear") {
        return Value::Null;
    }
    let Some(x) = evaluate(input, ctx).as_f64() else {
        return Value::Null;
    };
    let stops: Vec<(f64, f64)> = args[2..]
        .chunks_exact(2)
        .filter_map(|pair| Some((pair[0].as_f64()?, evaluate(&pair[1], ctx).as_f64()?)))
        .collect();
    let (Some(&(x0, y0)), Some(&(xn, yn))) = (stops.first(), stops.last()) else {
        return Value::Null;
    };

    let y = if x <= x0 {
        y0
    } else if x >= xn {
        yn
    } else {
        stops
            .windows(2)
            .find(|w| x >= w[0].0 && x <= w[1].0)
            .map_or(yn, |w| {
                let (a, ya) = w[0];
                let (b, yb) = w[1];
                ya + (x - a) / (b - a) * (yb - ya)
            })
    };
    Number::from_f64(y).map_or(Value::Null, Value::Number)
}
