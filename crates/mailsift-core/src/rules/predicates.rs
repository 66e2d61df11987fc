use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::emails::FieldKind;

const DAYS_PER_MONTH: i64 = 30;

static TARGET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\S+)\s+(days|months)\s*$").expect("target pattern is a valid regex")
});

/// A lone hour digit (`9:30:00`), which strict RFC 2822 parsing rejects.
static SHORT_HOUR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|\s)(\d):(\d{2})").expect("hour pattern is a valid regex"));

/// Zoned formats tried after RFC 2822 and RFC 3339.
const ZONED_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M %z",
];

/// Zone-less formats, interpreted in the local timezone.
const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d %b %Y %H:%M:%S",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PredicateError {
    #[error("{predicate} - invalid predicate for {kind} type field")]
    InvalidPredicate { predicate: String, kind: FieldKind },
    #[error("{target} - invalid time unit in predicate value, use 'days' or 'months'")]
    InvalidTargetUnit { target: String },
    #[error("{target} - invalid amount in predicate value, expected '<integer> days' or '<integer> months'")]
    InvalidTargetAmount { target: String },
    #[error("could not parse email date '{value}'")]
    DateParse { value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringPredicate {
    Contains,
    DoesNotContain,
    Equals,
    DoesNotEqual,
}

impl StringPredicate {
    pub fn parse(name: &str) -> Result<Self, PredicateError> {
        match name {
            "contains" => Ok(Self::Contains),
            "does_not_contains" => Ok(Self::DoesNotContain),
            "equals" => Ok(Self::Equals),
            "does_not_equals" => Ok(Self::DoesNotEqual),
            other => Err(PredicateError::InvalidPredicate {
                predicate: other.to_string(),
                kind: FieldKind::String,
            }),
        }
    }

    pub fn matches(&self, value: &str, target: &str) -> bool {
        match self {
            Self::Contains => value.contains(target),
            Self::DoesNotContain => !value.contains(target),
            Self::Equals => value == target,
            Self::DoesNotEqual => value != target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePredicate {
    /// Younger than the target age.
    LessThan,
    /// Older than the target age.
    GreaterThan,
}

impl DatePredicate {
    pub fn parse(name: &str) -> Result<Self, PredicateError> {
        match name {
            "less_than" => Ok(Self::LessThan),
            "greater_than" => Ok(Self::GreaterThan),
            other => Err(PredicateError::InvalidPredicate {
                predicate: other.to_string(),
                kind: FieldKind::Date,
            }),
        }
    }
}

/// Parses `"<n> days"` or `"<n> months"` into an age. A month counts as 30 days.
pub fn parse_age(target: &str) -> Result<Duration, PredicateError> {
    let captures = TARGET_PATTERN
        .captures(target)
        .ok_or_else(|| PredicateError::InvalidTargetUnit {
            target: target.to_string(),
        })?;

    let invalid_amount = || PredicateError::InvalidTargetAmount {
        target: target.to_string(),
    };
    let amount: i64 = captures[1].parse().map_err(|_| invalid_amount())?;
    let days = match &captures[2] {
        "months" => amount.checked_mul(DAYS_PER_MONTH).ok_or_else(invalid_amount)?,
        _ => amount,
    };

    Duration::try_days(days).ok_or_else(invalid_amount)
}

pub fn parse_email_date(value: &str) -> Result<DateTime<Utc>, PredicateError> {
    let trimmed = value.trim();
    let parse_error = || PredicateError::DateParse {
        value: value.to_string(),
    };

    let zoned = normalize_zoned(trimmed);
    if let Ok(parsed) = DateTime::parse_from_rfc2822(&zoned) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Some(parsed) = ZONED_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(&zoned, format).ok())
    {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .ok_or_else(parse_error)?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(parse_error)
}

/// Rewrites the loose header forms mail clients send into strict RFC 2822:
/// drops a `(UTC)` comment, spells a textual `UTC`/`Z` zone as `+0000` and
/// zero-pads a single-digit hour.
fn normalize_zoned(value: &str) -> String {
    let value = strip_zone_comment(value);
    let value = match value
        .strip_suffix(" UTC")
        .or_else(|| value.strip_suffix(" Z"))
    {
        Some(rest) => format!("{} +0000", rest.trim_end()),
        None => value.to_string(),
    };
    SHORT_HOUR.replace(&value, "${1}0${2}:${3}").into_owned()
}

/// Drops a trailing `(UTC)`-style comment that Gmail leaves on some `Date` headers.
fn strip_zone_comment(value: &str) -> &str {
    match (value.ends_with(')'), value.rfind('(')) {
        (true, Some(start)) => value[..start].trim_end(),
        _ => value,
    }
}

pub fn evaluate_string_predicate(
    value: &str,
    predicate: &str,
    target: &str,
) -> Result<bool, PredicateError> {
    Ok(StringPredicate::parse(predicate)?.matches(value, target))
}

/// Compares the age of `value` against `target` relative to `now`.
pub fn evaluate_date_predicate(
    value: &str,
    predicate: &str,
    target: &str,
    now: DateTime<Utc>,
) -> Result<bool, PredicateError> {
    let predicate = DatePredicate::parse(predicate)?;
    let age = parse_age(target)?;
    let threshold = now
        .checked_sub_signed(age)
        .ok_or_else(|| PredicateError::InvalidTargetAmount {
            target: target.to_string(),
        })?;
    let received = parse_email_date(value)?;

    Ok(match predicate {
        DatePredicate::LessThan => received > threshold,
        DatePredicate::GreaterThan => received < threshold,
    })
}
