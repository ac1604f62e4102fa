//! JSON text and `serde_json` bridge.

use crate::error::{ValueError, ValueResult};
use crate::value::{Map, Value};

impl Value {
    /// Parses JSON text into a value, preserving object key order.
    pub fn from_json_str(text: &str) -> ValueResult<Self> {
        serde_json::from_str(text).map_err(|e| ValueError::parse_failed(e.to_string()))
    }

    /// Renders this value as JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the value contains a NaN or infinite float, which
    /// JSON cannot represent.
    pub fn to_json_string(&self, pretty: bool) -> ValueResult<String> {
        self.ensure_finite("")?;
        let rendered = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        rendered.map_err(|e| ValueError::render_failed(e.to_string()))
    }

    /// Converts this value into a `serde_json::Value`.
    pub fn to_json(&self) -> ValueResult<serde_json::Value> {
        self.ensure_finite("")?;
        Ok(self.to_json_unchecked())
    }

    fn to_json_unchecked(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::from(*n),
            Value::Unsigned(n) => serde_json::Value::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json_unchecked).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json_unchecked()))
                    .collect(),
            ),
        }
    }

    fn ensure_finite(&self, path: &str) -> ValueResult<()> {
        match self {
            Value::Float(f) if !f.is_finite() => Err(ValueError::non_finite_float(if path.is_empty() {
                "/"
            } else {
                path
            })),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| item.ensure_finite(&format!("{path}/{i}"))),
            Value::Object(map) => map
                .iter()
                .try_for_each(|(k, v)| v.ensure_finite(&format!("{path}/{k}"))),
            _ => Ok(()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Unsigned(u)
                } else {
                    n.as_f64().map_or(Value::Null, Value::Float)
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<Map>(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn parse_keeps_key_order() {
        let value = Value::from_json_str(r#"{"type":"Page","id":"p1","width":10}"#).unwrap();
        let keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["type", "id", "width"]);
    }

    #[test]
    fn integers_and_floats_stay_distinct() {
        let value = Value::from_json_str(r#"{"a":5,"b":5.0,"c":-3}"#).unwrap();
        assert_eq!(value.get("a"), Some(&Value::Integer(5)));
        assert_eq!(value.get("b"), Some(&Value::Float(5.0)));
        assert_eq!(value.get("c"), Some(&Value::Integer(-3)));

        let text = value.to_json_string(false).unwrap();
        assert_eq!(text, r#"{"a":5,"b":5.0,"c":-3}"#);
    }

    #[test]
    fn from_serde_json_value() {
        let value = Value::from(json!({
            "label": {"en": ["Folio 1r"]},
            "height": 4000,
            "behavior": ["paged"],
            "navDate": null
        }));

        assert_eq!(value.get("height"), Some(&Value::Integer(4000)));
        assert_eq!(value.get("navDate"), Some(&Value::Null));
        assert_eq!(
            value.get("label").and_then(|l| l.get("en")),
            Some(&Value::from(vec!["Folio 1r"]))
        );
    }

    #[test]
    fn integers_past_i64_stay_exact() {
        let text = r#"{"x-big":18446744073709551615,"x-edge":9223372036854775808,"x-max":9223372036854775807}"#;
        let value = Value::from_json_str(text).unwrap();
        assert_eq!(value.get("x-big"), Some(&Value::Unsigned(u64::MAX)));
        assert_eq!(value.get("x-edge"), Some(&Value::Unsigned(1 << 63)));
        assert_eq!(value.get("x-max"), Some(&Value::Integer(i64::MAX)));
        assert_eq!(value.to_json_string(false).unwrap(), text);

        let bridged = Value::from(json!({"x-big": u64::MAX}));
        assert_eq!(bridged.get("x-big"), Some(&Value::Unsigned(u64::MAX)));
        assert_eq!(bridged.to_json().unwrap(), json!({"x-big": u64::MAX}));
    }

    #[test]
    fn non_finite_float_is_rejected() {
        let value = Value::object([("items", Value::Array(vec![Value::Float(f64::NAN)]))]);
        let err = value.to_json_string(false).unwrap_err();
        assert_eq!(err, ValueError::non_finite_float("/items/0"));
        assert!(value.to_json().is_err());
    }

    #[test]
    fn invalid_json_reports_parse_error() {
        let err = Value::from_json_str("{\"id\":").unwrap_err();
        assert!(matches!(err, ValueError::ParseFailed { .. }));
    }

    fn leaf_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            any::<u64>().prop_map(Value::from),
            (-4000i32..4000).prop_map(|n| Value::Float(f64::from(n) / 8.0)),
            "[a-zA-Z0-9 ]{0,12}".prop_map(Value::Text),
        ]
    }

    fn value_strategy() -> impl Strategy<Value = Value> {
        leaf_strategy().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::vec(("[a-z]{1,6}", inner), 0..4)
                    .prop_map(|pairs| Value::object(pairs)),
            ]
        })
    }

    proptest! {
        #[test]
        fn json_text_is_lossless(value in value_strategy()) {
            let text = value.to_json_string(false).unwrap();
            let parsed = Value::from_json_str(&text).unwrap();
            prop_assert_eq!(parsed, value);
        }
    }
}
