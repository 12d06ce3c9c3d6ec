//! Typed extraction from a value bag (a JSON object of field name to untyped
//! value).
//!
//! Absence and type mismatch are not exceptional: both resolve to
//! [`Resolution::UsingDefault`], which the facades collapse to the
//! caller-supplied default. Evaluation is total; nothing in this module can
//! fail.
use serde_json::{Map, Value};

/// Outcome of a typed read: either the field held a usable value, or the
/// caller's default applies.
///
/// Keeping this distinction explicit (rather than eagerly substituting the
/// default) lets layers log parameter exposures only for reads that actually
/// resolved, and keeps the "never throw" contract testable at this seam.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Resolution<T> {
    Resolved(T),
    UsingDefault,
}

impl<T> Resolution<T> {
    /// Collapse to a plain value at the public boundary.
    pub fn or_default(self, default: T) -> T {
        match self {
            Resolution::Resolved(value) => value,
            Resolution::UsingDefault => default,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

impl<T> From<Option<T>> for Resolution<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Resolution::Resolved(value),
            None => Resolution::UsingDefault,
        }
    }
}

pub(crate) fn get_bool(bag: &Map<String, Value>, key: &str) -> Resolution<bool> {
    bag.get(key).and_then(Value::as_bool).into()
}

/// Integer read. Satisfied by integer-valued JSON numbers that fit in `i32`;
/// float-valued numbers do not satisfy it (no truncation across the
/// int/float line).
pub(crate) fn get_int(bag: &Map<String, Value>, key: &str) -> Resolution<i32> {
    integer(bag, key).and_then(|n| i32::try_from(n).ok()).into()
}

/// Long read. Satisfied by any integer-valued JSON number.
pub(crate) fn get_long(bag: &Map<String, Value>, key: &str) -> Resolution<i64> {
    integer(bag, key).into()
}

/// Double read. Satisfied only by float-valued JSON numbers: an
/// integer-valued field does not implicitly widen to double.
pub(crate) fn get_double(bag: &Map<String, Value>, key: &str) -> Resolution<f64> {
    match bag.get(key) {
        Some(Value::Number(n)) if n.is_f64() => n.as_f64().into(),
        _ => Resolution::UsingDefault,
    }
}

pub(crate) fn get_string(bag: &Map<String, Value>, key: &str) -> Resolution<String> {
    bag.get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .into()
}

/// Array read requiring every element to be a string; mixed-type content
/// falls back to the default. Element order is preserved.
pub(crate) fn get_string_array(bag: &Map<String, Value>, key: &str) -> Resolution<Vec<String>> {
    let Some(Value::Array(items)) = bag.get(key) else {
        return Resolution::UsingDefault;
    };
    items
        .iter()
        .map(|item| item.as_str().map(str::to_owned))
        .collect::<Option<Vec<_>>>()
        .into()
}

pub(crate) fn get_object(bag: &Map<String, Value>, key: &str) -> Resolution<Map<String, Value>> {
    bag.get(key).and_then(Value::as_object).cloned().into()
}

fn integer(bag: &Map<String, Value>, key: &str) -> Option<i64> {
    match bag.get(key) {
        Some(Value::Number(n)) if !n.is_f64() => n.as_i64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::*;

    fn bag() -> Map<String, Value> {
        json!({
            "a_bool": true,
            "an_int": 1,
            "a_long": 9_223_372_036_854_775_806_i64,
            "a_double": 1.5,
            "a_string": "val",
            "an_array": ["a", "b"],
            "a_mixed_array": ["a", 1],
            "an_object": {"a_key": "val"},
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[test]
    fn present_fields_resolve_exactly() {
        let bag = bag();
        assert_eq!(get_bool(&bag, "a_bool"), Resolution::Resolved(true));
        assert_eq!(get_int(&bag, "an_int"), Resolution::Resolved(1));
        assert_eq!(get_long(&bag, "an_int"), Resolution::Resolved(1));
        assert_eq!(
            get_long(&bag, "a_long"),
            Resolution::Resolved(9_223_372_036_854_775_806)
        );
        assert_eq!(get_double(&bag, "a_double"), Resolution::Resolved(1.5));
        assert_eq!(
            get_string(&bag, "a_string"),
            Resolution::Resolved("val".to_owned())
        );
    }

    #[test]
    fn absent_fields_use_default() {
        let bag = bag();
        assert_eq!(get_bool(&bag, "missing"), Resolution::UsingDefault);
        assert_eq!(get_string(&bag, "missing"), Resolution::UsingDefault);
        assert_eq!(get_bool(&bag, "missing").or_default(true), true);
    }

    #[test]
    fn type_mismatch_uses_default() {
        let bag = bag();
        // Requesting an int from a string-valued field returns the default,
        // not the string coerced and not an error.
        assert_eq!(get_int(&bag, "a_string"), Resolution::UsingDefault);
        assert_eq!(get_string(&bag, "an_int"), Resolution::UsingDefault);
        assert_eq!(get_bool(&bag, "a_string"), Resolution::UsingDefault);
    }

    #[test]
    fn no_widening_across_the_int_float_line() {
        let bag = bag();
        // int field does not satisfy a double request...
        assert_eq!(get_double(&bag, "an_int"), Resolution::UsingDefault);
        // ...and a float field does not satisfy int/long requests.
        assert_eq!(get_int(&bag, "a_double"), Resolution::UsingDefault);
        assert_eq!(get_long(&bag, "a_double"), Resolution::UsingDefault);
    }

    #[test]
    fn int_request_on_out_of_range_integer_uses_default() {
        let bag = bag();
        assert_eq!(get_int(&bag, "a_long"), Resolution::UsingDefault);
        assert_eq!(get_long(&bag, "a_long").is_resolved(), true);
    }

    #[test]
    fn arrays_preserve_order_and_require_homogeneous_elements() {
        let bag = bag();
        assert_eq!(
            get_string_array(&bag, "an_array"),
            Resolution::Resolved(vec!["a".to_owned(), "b".to_owned()])
        );
        assert_eq!(get_string_array(&bag, "a_mixed_array"), Resolution::UsingDefault);
        assert_eq!(get_string_array(&bag, "a_string"), Resolution::UsingDefault);
    }

    #[test]
    fn objects_round_trip_unchanged() {
        let bag = bag();
        let object = get_object(&bag, "an_object");
        let Resolution::Resolved(object) = object else {
            panic!("object field should resolve");
        };
        assert_eq!(object.get("a_key"), Some(&json!("val")));
        assert_eq!(get_object(&bag, "an_int"), Resolution::UsingDefault);
    }
}
