#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;

fn eval_with(expr: &Value, id: Option<&FeatureId>, props: &Value) -> Value {
    let map = props.as_object().cloned().unwrap_or_default();
    evaluate(expr, &EvalContext::new(id, &map))
}

fn eval(expr: &Value, props: &Value) -> Value {
    eval_with(expr, None, props)
}

fn eval_f64(expr: &Value, props: &Value) -> f64 {
    eval(expr, props).as_f64().unwrap()
}

// --- Lookups ---

#[test]
fn literals_evaluate_to_themselves() {
    assert_eq!(eval(&json!(3), &json!({})), json!(3));
    assert_eq!(eval(&json!("x"), &json!({})), json!("x"));
    assert_eq!(eval(&json!(["literal", [1, 2]]), &json!({})), json!([1, 2]));
}

#[test]
fn get_and_has() {
    let props = json!({ "name": "Lab", "count": 3 });
    assert_eq!(eval(&json!(["get", "name"]), &props), json!("Lab"));
    assert_eq!(eval(&json!(["get", "missing"]), &props), Value::Null);
    assert_eq!(eval(&json!(["has", "count"]), &props), json!(true));
    assert_eq!(eval(&json!(["has", "missing"]), &props), json!(false));
}

#[test]
fn id_reads_top_level_identifier() {
    let id = FeatureId::from(9);
    assert_eq!(eval_with(&json!(["id"]), Some(&id), &json!({})), json!(9));
    assert_eq!(eval_with(&json!(["id"]), None, &json!({})), Value::Null);
}

// --- Logic ---

#[test]
fn not_all_any() {
    let props = json!({ "a": 1 });
    assert_eq!(eval(&json!(["!", ["has", "a"]]), &props), json!(false));
    assert_eq!(eval(&json!(["all", ["has", "a"], ["==", ["get", "a"], 1]]), &props), json!(true));
    assert_eq!(eval(&json!(["any", ["has", "b"], ["has", "c"]]), &props), json!(false));
    assert_eq!(eval(&json!(["all"]), &props), json!(true));
}

#[test]
fn equality_compares_numbers_by_value() {
    assert_eq!(eval(&json!(["==", 1, 1.0]), &json!({})), json!(true));
    assert_eq!(eval(&json!(["!=", "1", 1]), &json!({})), json!(true));
}

#[test]
fn ordering_operators() {
    let props = json!({ "n": 5 });
    assert_eq!(eval(&json!([">", ["get", "n"], 4]), &props), json!(true));
    assert_eq!(eval(&json!(["<=", ["get", "n"], 4]), &props), json!(false));
    assert_eq!(eval(&json!(["<", ["get", "missing"], 4]), &props), Value::Null);
}

#[test]
fn coalesce_takes_first_non_null() {
    let props = json!({ "b": "second" });
    assert_eq!(eval(&json!(["coalesce", ["get", "a"], ["get", "b"], "third"]), &props), json!("second"));
    assert_eq!(eval(&json!(["coalesce", ["get", "a"]]), &props), Value::Null);
}

#[test]
fn case_picks_first_true_branch() {
    let expr = json!(["case", ["has", "x"], "x", ["has", "y"], "y", "none"]);
    assert_eq!(eval(&expr, &json!({ "y": 1 })), json!("y"));
    assert_eq!(eval(&expr, &json!({})), json!("none"));
}

// --- Conversions ---

#[test]
fn to_string_formats_like_javascript() {
    assert_eq!(eval(&json!(["to-string", 1.0]), &json!({})), json!("1"));
    assert_eq!(eval(&json!(["to-string", 2.5]), &json!({})), json!("2.5"));
    assert_eq!(eval(&json!(["to-string", ["get", "none"]]), &json!({})), json!(""));
    assert_eq!(eval(&json!(["to-string", true]), &json!({})), json!("true"));
}

#[test]
fn to_number_with_fallback() {
    assert_eq!(eval_f64(&json!(["to-number", "12", 0]), &json!({})), 12.0);
    assert_eq!(eval_f64(&json!(["to-number", "many", 0]), &json!({})), 0.0);
    assert_eq!(eval_f64(&json!(["to-number", ["get", "missing"], 7]), &json!({})), 0.0);
}

// --- Ramps ---

#[test]
fn match_with_fallback() {
    let expr = json!(["match", ["get", "bsl"], "BSL-3", "orange", ["BSL-4", "BSL4"], "red", "grey"]);
    assert_eq!(eval(&expr, &json!({ "bsl": "BSL-3" })), json!("orange"));
    assert_eq!(eval(&expr, &json!({ "bsl": "BSL4" })), json!("red"));
    assert_eq!(eval(&expr, &json!({ "bsl": "nope" })), json!("grey"));
    assert_eq!(eval(&expr, &json!({})), json!("grey"));
}

#[test]
fn step_buckets() {
    let expr = json!(["step", ["get", "n"], 10, 10, 20, 50, 30]);
    assert_eq!(eval_f64(&expr, &json!({ "n": 2 })), 10.0);
    assert_eq!(eval_f64(&expr, &json!({ "n": 10 })), 20.0);
    assert_eq!(eval_f64(&expr, &json!({ "n": 49 })), 20.0);
    assert_eq!(eval_f64(&expr, &json!({ "n": 500 })), 30.0);
}

#[test]
fn interpolate_is_linear_between_stops() {
    let expr = json!(["interpolate", ["linear"], ["get", "n"], 0, 0, 10, 100]);
    assert_eq!(eval_f64(&expr, &json!({ "n": 5 })), 50.0);
    assert_eq!(eval_f64(&expr, &json!({ "n": 2.5 })), 25.0);
}

#[test]
fn interpolate_clamps_at_both_ends() {
    let expr = json!(["interpolate", ["linear"], ["get", "n"], 1, 6, 1000, 18]);
    assert_eq!(eval_f64(&expr, &json!({ "n": 0 })), 6.0);
    assert_eq!(eval_f64(&expr, &json!({ "n": 1_000_000 })), 18.0);
}

#[test]
fn interpolate_rejects_unsupported_curves() {
    let expr = json!(["interpolate", ["exponential", 2], ["get", "n"], 0, 0, 10, 100]);
    assert_eq!(eval(&expr, &json!({ "n": 5 })), Value::Null);
}

#[test]
fn unknown_operator_is_null_and_not_truthy() {
    let v = eval(&json!(["within", {}]), &json!({}));
    assert_eq!(v, Value::Null);
    assert!(!is_truthy(&v));
}

#[test]
fn number_to_string_integers_and_floats() {
    assert_eq!(number_to_string(&Number::from(3)), "3");
    assert_eq!(number_to_string(&Number::from_f64(3.0).unwrap()), "3");
    assert_eq!(number_to_string(&Number::from_f64(0.25).unwrap()), "0.25");
}
