use crate::value::Value;

/// Makes a result tree safe for JSON: every NaN or infinite float becomes integer `0`.
///
/// Maps and arrays are rebuilt element-wise with their order intact; everything else passes
/// through untouched. Applying it twice yields the same tree.
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::Float(f) if !f.is_finite() => Value::Int(0),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::Map(map) => Value::Map(map.into_iter().map(|(k, v)| (k, sanitize(v))).collect()),
        other => other,
    }
}

/// Scalar form of [`sanitize`] for confidences and percentages.
pub fn finite_or_zero(f: f64) -> f64 {
    if f.is_finite() {
        f
    } else {
        0.0
    }
}
