//! Stock field types.

use super::FieldType;
use regex::Regex;
use serde_json::{json, Value};

pub fn string() -> FieldType {
    FieldType::new().with().default_value(json!(""))
}

pub fn boolean() -> FieldType {
    FieldType::new()
        .with()
        .schema("boolean")
        .and()
        .default_value(json!(false))
}

pub fn number() -> FieldType {
    let base = FieldType::new()
        .with()
        .cell_class("numeric")
        .and()
        .example_value(json!(1234.56))
        .and()
        .default_value(json!(0));
    match Regex::new("[0-9$.,]") {
        Ok(mask) => base.with().input_mask(mask),
        Err(_) => base,
    }
}

/// Dates are `YYYY-MM-DD` strings; the default is today's local date.
pub fn date() -> FieldType {
    FieldType::new()
        .with()
        .cell_class("date")
        .and()
        .min_column_width(50)
        .and()
        .target_column_width(80)
        .and()
        .max_column_width(200)
        .and()
        .default_value(Value::String(today()))
}

fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_and_boolean_defaults() {
        assert_eq!(string().default_value(None), json!(""));
        assert_eq!(boolean().default_value(None), json!(false));
        assert_eq!(boolean().schema(), "boolean");
    }

    #[test]
    fn test_number_primitive() {
        let n = number();
        assert_eq!(n.default_value(None), json!(0));
        assert_eq!(n.example_value(7), json!(1234.56));
        assert_eq!(n.cell_classes(&json!(1)), vec!["numeric"]);
        assert!(n.allow_input_char("$"));
        assert!(!n.allow_input_char("a"));
    }

    #[test]
    fn test_date_primitive() {
        let d = date();
        assert_eq!(d.min_column_width(), 50);
        assert_eq!(d.target_column_width(), Some(80));
        assert_eq!(d.max_column_width(), Some(200));
        let today = d.default_value(None);
        assert!(chrono::NaiveDate::parse_from_str(today.as_str().unwrap(), "%Y-%m-%d").is_ok());
    }
}
