//! Field equality for verification.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::core::value::{CanonicalValue, Number};

/// Compare a source cell with a target cell.
///
/// - NULL equals NULL and equals the empty string on the other side
/// - temporal values compare as instants
/// - numbers compare numerically (at single precision if either side is FLOAT)
/// - everything else compares by rendered text, without trimming
pub fn values_equal(source: &CanonicalValue, target: &CanonicalValue) -> bool {
    use CanonicalValue as V;

    match (source, target) {
        (V::Null, V::Null) => true,
        (V::Null, V::Text(s)) | (V::Text(s), V::Null) => s.is_empty(),
        (V::Null, V::Bytes(b)) | (V::Bytes(b), V::Null) => b.is_empty(),
        (V::Null, _) | (_, V::Null) => false,
        (V::Temporal { at: a, .. }, V::Temporal { at: b, .. }) => a == b,
        (V::Bytes(a), V::Bytes(b)) => a == b,
        (a, b) if is_numeric(a) && is_numeric(b) => numbers_equal(a, b),
        (a, b) => a.to_string() == b.to_string(),
    }
}

fn is_numeric(value: &CanonicalValue) -> bool {
    matches!(
        value,
        CanonicalValue::Int(_)
            | CanonicalValue::UInt(_)
            | CanonicalValue::Float(_)
            | CanonicalValue::Numeric { .. }
    )
}

fn numbers_equal(a: &CanonicalValue, b: &CanonicalValue) -> bool {
    if is_single_precision(a) || is_single_precision(b) {
        return match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => (x as f32) == (y as f32),
            _ => false,
        };
    }
    if let (Some(x), Some(y)) = (as_decimal(a), as_decimal(b)) {
        return x == y;
    }
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn is_single_precision(value: &CanonicalValue) -> bool {
    matches!(
        value,
        CanonicalValue::Numeric {
            value: Number::F32(_),
            ..
        }
    )
}

fn as_decimal(value: &CanonicalValue) -> Option<Decimal> {
    match value {
        CanonicalValue::Int(v) => Some(Decimal::from(*v)),
        CanonicalValue::UInt(v) => Some(Decimal::from(*v)),
        CanonicalValue::Numeric {
            value: Number::Decimal(d),
            ..
        } => Some(*d),
        _ => None,
    }
}

fn as_f64(value: &CanonicalValue) -> Option<f64> {
    match value {
        CanonicalValue::Int(v) => Some(*v as f64),
        CanonicalValue::UInt(v) => Some(*v as f64),
        CanonicalValue::Float(v) => Some(*v),
        CanonicalValue::Numeric { value, .. } => match value {
            Number::F32(v) => Some(f64::from(*v)),
            Number::F64(v) => Some(*v),
            Number::Decimal(d) => d.to_f64(),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{target_to_canonical, to_canonical};
    use crate::core::value::RawValue;
    use crate::typemap::SourceType;

    fn conv(raw: &str, ty: &str) -> CanonicalValue {
        to_canonical(&RawValue::from(raw), &SourceType::parse(ty))
    }

    fn target(raw: &str, ty: &str) -> CanonicalValue {
        target_to_canonical(&RawValue::from(raw), &SourceType::parse(ty))
    }

    #[test]
    fn test_null_and_empty_string_are_equal() {
        let empty = CanonicalValue::Text(String::new());
        assert!(values_equal(&CanonicalValue::Null, &empty));
        assert!(values_equal(&empty, &CanonicalValue::Null));
        assert!(values_equal(&CanonicalValue::Null, &CanonicalValue::Null));
    }

    #[test]
    fn test_value_against_null_is_not_equal() {
        let x = CanonicalValue::Text("x".into());
        assert!(!values_equal(&x, &CanonicalValue::Null));
        assert!(!values_equal(&CanonicalValue::Null, &x));
        assert!(!values_equal(&CanonicalValue::Int(0), &CanonicalValue::Null));
    }

    #[test]
    fn test_trailing_space_is_a_difference() {
        assert!(!values_equal(&conv("Alice", "varchar"), &target("Alice ", "varchar")));
        assert!(values_equal(&conv("Alice", "varchar"), &target("Alice", "varchar")));
    }

    #[test]
    fn test_temporal_compares_instants() {
        let source = conv("2024-03-01 10:00:00", "datetime");
        assert!(values_equal(&source, &target("2024-03-01 10:00:00.000000", "datetime")));
        assert!(!values_equal(&source, &target("2024-03-01 10:00:01", "datetime")));

        let date = conv("2024-03-01", "date");
        assert!(values_equal(&date, &target("2024-03-01 00:00:00", "date")));
    }

    #[test]
    fn test_numeric_equality() {
        assert!(values_equal(&conv("1.50", "decimal"), &target("1.5", "decimal")));
        assert!(!values_equal(&conv("1.51", "decimal"), &target("1.5", "decimal")));
        assert!(values_equal(&conv("0.1", "float"), &target("0.100000001490116", "float")));
        assert!(values_equal(&conv("2.5", "double"), &target("2.5E0", "double")));
        assert!(values_equal(&conv("42", "bigint"), &CanonicalValue::Int(42)));
    }

    #[test]
    fn test_text_compares_rendered_form() {
        assert!(values_equal(&conv("42", "int"), &target("42", "int")));
        assert!(values_equal(&conv("42", "int"), &CanonicalValue::Int(42)));
        assert!(!values_equal(&conv("42", "int"), &target("43", "int")));
    }

    #[test]
    fn test_json_compares_normalized() {
        assert!(values_equal(&conv(r#"{"a":1,"b":2}"#, "json"), &target(r#"{"b": 2, "a": 1}"#, "json")));
    }

    #[test]
    fn test_bytes_compare_exactly() {
        let a = CanonicalValue::Bytes(vec![1, 2, 3]);
        assert!(values_equal(&a, &CanonicalValue::Bytes(vec![1, 2, 3])));
        assert!(!values_equal(&a, &CanonicalValue::Bytes(vec![1, 2])));
    }
}
