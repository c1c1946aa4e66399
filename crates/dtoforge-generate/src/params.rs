use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use crate::config::{Bound, PartialConfig, SelectionMode};
use crate::errors::GenerationError;

/// Attribute keys with a typed meaning. Anything else is kept as a free
/// generator param.
pub const KNOWN_ATTRIBUTES: &[&str] = &[
    "min",
    "max",
    "min_len",
    "max_len",
    "charset",
    "pattern",
    "max_repeat",
    "scale",
    "values",
    "min_size",
    "max_size",
    "selection",
    "size_selection",
    "generator",
];

/// Parse a JSON attribute object (rule attributes or a settings table) into
/// one configuration layer.
pub fn parse_attributes(
    attributes: &Map<String, Value>,
    ctx: &str,
) -> Result<PartialConfig, GenerationError> {
    let mut config = PartialConfig::default();
    for (key, value) in attributes {
        match key.as_str() {
            "min" => config.min = Some(parse_bound(ctx, key, value)?),
            "max" => config.max = Some(parse_bound(ctx, key, value)?),
            "min_len" => config.min_len = Some(parse_usize(ctx, key, value)?),
            "max_len" => config.max_len = Some(parse_usize(ctx, key, value)?),
            "charset" => {
                let charset = parse_string(ctx, key, value)?;
                if charset.is_empty() {
                    return Err(GenerationError::InvalidConfig(format!(
                        "{ctx}: charset must not be empty"
                    )));
                }
                config.charset = Some(charset);
            }
            "pattern" => config.pattern = Some(parse_string(ctx, key, value)?),
            "max_repeat" => config.max_repeat = Some(parse_u32(ctx, key, value)?),
            "scale" => config.scale = Some(parse_u32(ctx, key, value)?),
            "values" => config.values = Some(parse_string_list(ctx, key, value)?),
            "min_size" => config.min_size = Some(parse_usize(ctx, key, value)?),
            "max_size" => config.max_size = Some(parse_usize(ctx, key, value)?),
            "selection" => config.selection = Some(parse_selection(ctx, key, value)?),
            "size_selection" => config.size_selection = Some(parse_selection(ctx, key, value)?),
            "generator" => config.generator = Some(parse_string(ctx, key, value)?),
            _ => {
                config.params.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(config)
}

fn invalid(ctx: &str, key: &str) -> GenerationError {
    GenerationError::InvalidConfig(format!("{ctx}: invalid value for param '{key}'"))
}

fn parse_bound(ctx: &str, key: &str, value: &Value) -> Result<Bound, GenerationError> {
    if let Some(value) = value.as_i64() {
        return Ok(Bound::Int(value));
    }
    if let Some(value) = value.as_f64() {
        return Ok(Bound::Float(value));
    }
    let text = value.as_str().ok_or_else(|| invalid(ctx, key))?;
    if let Some(date) = parse_date_value(text) {
        return Ok(Bound::Date(date));
    }
    parse_timestamp_value(text)
        .map(Bound::Timestamp)
        .ok_or_else(|| invalid(ctx, key))
}

fn parse_usize(ctx: &str, key: &str, value: &Value) -> Result<usize, GenerationError> {
    value
        .as_u64()
        .and_then(|value| usize::try_from(value).ok())
        .ok_or_else(|| invalid(ctx, key))
}

fn parse_u32(ctx: &str, key: &str, value: &Value) -> Result<u32, GenerationError> {
    value
        .as_u64()
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| invalid(ctx, key))
}

fn parse_string(ctx: &str, key: &str, value: &Value) -> Result<String, GenerationError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(ctx, key))
}

fn parse_string_list(ctx: &str, key: &str, value: &Value) -> Result<Vec<String>, GenerationError> {
    let items = value.as_array().ok_or_else(|| invalid(ctx, key))?;
    items
        .iter()
        .map(|item| parse_string(ctx, key, item))
        .collect()
}

fn parse_selection(ctx: &str, key: &str, value: &Value) -> Result<SelectionMode, GenerationError> {
    value
        .as_str()
        .and_then(SelectionMode::parse)
        .ok_or_else(|| invalid(ctx, key))
}

pub fn parse_date_value(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

pub fn parse_timestamp_value(value: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.naive_utc())
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn typed_attributes_are_parsed() {
        let config = parse_attributes(
            &attrs(json!({
                "min": 3,
                "max": 2.5,
                "min_len": 2,
                "charset": "abc",
                "values": ["a", "b"],
                "selection": "max",
                "size_selection": "min"
            })),
            "test",
        )
        .expect("parse");
        assert_eq!(config.min, Some(Bound::Int(3)));
        assert_eq!(config.max, Some(Bound::Float(2.5)));
        assert_eq!(config.min_len, Some(2));
        assert_eq!(config.values, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(config.selection, Some(SelectionMode::Max));
        assert_eq!(config.size_selection, Some(SelectionMode::Min));
        assert!(config.params.is_empty());
    }

    #[test]
    fn date_and_timestamp_bounds_are_recognized() {
        let config = parse_attributes(
            &attrs(json!({"min": "2024-02-01", "max": "2024-02-03T10:00:00"})),
            "test",
        )
        .expect("parse");
        assert!(matches!(config.min, Some(Bound::Date(_))));
        assert!(matches!(config.max, Some(Bound::Timestamp(_))));
    }

    #[test]
    fn unknown_keys_become_params() {
        let config = parse_attributes(&attrs(json!({"prefix": "usr-", "width": 4})), "test")
            .expect("parse");
        assert_eq!(config.params.get("prefix"), Some(&json!("usr-")));
        assert_eq!(config.params.get("width"), Some(&json!(4)));
    }

    #[test]
    fn malformed_values_are_rejected() {
        for bad in [
            json!({"min_len": -1}),
            json!({"selection": "sometimes"}),
            json!({"min": "yesterday"}),
            json!({"charset": ""}),
            json!({"values": [1, 2]}),
        ] {
            let result = parse_attributes(&attrs(bad.clone()), "test");
            assert!(
                matches!(result, Err(GenerationError::InvalidConfig(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rfc3339_timestamps_are_normalized_to_utc() {
        let parsed = parse_timestamp_value("2024-01-01T12:00:00+02:00").expect("timestamp");
        assert_eq!(parsed.to_string(), "2024-01-01 10:00:00");
    }
}
