//! Extra utilities for use elsewhere in the API.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::error::{SchoolError, SchoolResult};

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub fn current_time() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

pub fn current_year() -> i32 {
    current_time().year()
}

/// Trims the field and rejects it if nothing is left.
pub fn required(field: &str, value: Option<&str>) -> SchoolResult<String> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_owned()),
        _ => Err(SchoolError::BadRequest(format!("{} is required", field))),
    }
}

/// Empty strings count as absent.
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

pub fn validate_mobile_no(mobile_no: &str) -> SchoolResult<()> {
    static MOBILE_NO: OnceLock<Regex> = OnceLock::new();
    let pattern =
        MOBILE_NO.get_or_init(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("valid mobile regex"));

    if pattern.is_match(mobile_no) {
        Ok(())
    } else {
        Err(SchoolError::BadRequest(
            "mobileNo must be 10 to 15 digits".to_owned(),
        ))
    }
}

/// Attendance dates are plain `YYYY-MM-DD` strings.
pub fn validate_date(date: &str) -> SchoolResult<Date> {
    Date::parse(date, DATE_FORMAT)
        .map_err(|_err| SchoolError::BadRequest(format!("invalid date {}, expected YYYY-MM-DD", date)))
}

/// Accepts `"12"` and `12` alike, for fields like roll numbers that clients send either way.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_fields_are_trimmed() {
        assert_eq!(required("name", Some("  Asha ")).unwrap(), "Asha");
        assert!(required("name", Some("   ")).is_err());
        assert!(required("name", None).is_err());
    }

    #[test]
    fn mobile_numbers_are_digits() {
        assert!(validate_mobile_no("9876543210").is_ok());
        assert!(validate_mobile_no("+919876543210").is_ok());
        assert!(validate_mobile_no("98765").is_err());
        assert!(validate_mobile_no("98765abcde").is_err());
    }

    #[test]
    fn roll_numbers_may_be_numbers() {
        #[derive(Deserialize)]
        struct Form {
            #[serde(default, deserialize_with = "string_or_number")]
            roll_no: Option<String>,
        }

        let form: Form = serde_json::from_str(r#"{"roll_no": 12}"#).unwrap();
        assert_eq!(form.roll_no.as_deref(), Some("12"));
        let form: Form = serde_json::from_str(r#"{"roll_no": "12B"}"#).unwrap();
        assert_eq!(form.roll_no.as_deref(), Some("12B"));
        let form: Form = serde_json::from_str("{}").unwrap();
        assert_eq!(form.roll_no, None);
    }

    #[test]
    fn dates_must_be_calendar_dates() {
        assert!(validate_date("2025-03-14").is_ok());
        assert!(validate_date("2025-02-30").is_err());
        assert!(validate_date("14/03/2025").is_err());
    }
}
