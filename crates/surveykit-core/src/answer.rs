//! Answer type descriptors and the JSON codec for typed answers.
//!
//! An [`AnswerType`] is attached to every recorded answer. It converts
//! between [`AnswerValue`]s held by item groups and the loosely-typed
//! `serde_json::Value` stored in results. For any value accepted by
//! [`AnswerType::decode`], decoding the encoded form yields the same value,
//! up to base64 canonicalization and date truncation to the pattern's
//! precision.

use std::fmt::{self, Write as _};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::CoreError;
use crate::form::DataType;
use crate::value::{AnswerValue, Fraction};

/// Pattern used to encode dates when the type declares none.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

const ISO_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Leaf kind of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseType {
    String,
    Boolean,
    Integer,
    Decimal,
    Date,
    Data,
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Date => "date",
            Self::Data => "data",
        };
        f.write_str(name)
    }
}

/// Sequence wrapping of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SequenceType {
    /// Ordered list of leaves.
    Array,
}

/// Immutable descriptor of the expected shape of an answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerType {
    pub base_type: BaseType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_type: Option<SequenceType>,

    /// strftime pattern for date answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Separator accepted when a sequence arrives as a single string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_separator: Option<String>,

    /// Data type of the originating input field, when it refines decoding
    /// (e.g. decimals that are fractions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_data_type: Option<DataType>,
}

impl AnswerType {
    /// Create a scalar answer type.
    pub fn new(base_type: BaseType) -> Self {
        Self {
            base_type,
            sequence_type: None,
            date_format: None,
            unit: None,
            sequence_separator: None,
            form_data_type: None,
        }
    }

    /// Builder method to wrap the type in an ordered list.
    pub fn with_sequence(mut self) -> Self {
        self.sequence_type = Some(SequenceType::Array);
        self
    }

    /// Builder method to set the date pattern.
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    /// Builder method to set the unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Builder method to set the sequence separator.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.sequence_separator = Some(separator.into());
        self
    }

    /// Builder method to set the form data type.
    pub fn with_form_data_type(mut self, data_type: DataType) -> Self {
        self.form_data_type = Some(data_type);
        self
    }

    pub fn is_sequence(&self) -> bool {
        self.sequence_type.is_some()
    }

    fn is_fraction(&self) -> bool {
        self.base_type == BaseType::Decimal
            && self.form_data_type.map(|t| t.is_fraction()).unwrap_or(false)
    }

    /// Decode a JSON value into a typed answer. `null` decodes to `None`.
    pub fn decode(&self, json: &Value) -> Result<Option<AnswerValue>, CoreError> {
        if json.is_null() {
            return Ok(None);
        }
        if !self.is_sequence() {
            return self.decode_leaf(json).map(Some);
        }

        let items = match (json, self.sequence_separator.as_deref()) {
            (Value::Array(items), _) => items
                .iter()
                .map(|item| self.decode_leaf(item))
                .collect::<Result<Vec<_>, _>>()?,
            (Value::String(text), Some(separator)) => text
                .split(separator)
                .map(|part| self.decode_leaf(&Value::String(part.trim().to_string())))
                .collect::<Result<Vec<_>, _>>()?,
            (other, _) => return Err(CoreError::mismatch(self, other)),
        };
        Ok(Some(AnswerValue::Sequence(items)))
    }

    /// Encode a typed answer into its JSON form.
    pub fn encode(&self, value: &AnswerValue) -> Result<Value, CoreError> {
        match (self.is_sequence(), value) {
            (true, AnswerValue::Sequence(items)) => items
                .iter()
                .map(|item| self.encode_leaf(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (false, AnswerValue::Sequence(_)) | (true, _) => Err(CoreError::TypeMismatch {
                expected: self.to_string(),
                found: value.kind_name().to_string(),
            }),
            (false, leaf) => self.encode_leaf(leaf),
        }
    }

    /// Encode an optional answer; absence encodes to `null`.
    pub fn encode_answer(&self, value: Option<&AnswerValue>) -> Result<Value, CoreError> {
        match value {
            Some(value) => self.encode(value),
            None => Ok(Value::Null),
        }
    }

    fn decode_leaf(&self, json: &Value) -> Result<AnswerValue, CoreError> {
        let decoded = match self.base_type {
            BaseType::String => json.as_str().map(|s| AnswerValue::String(s.to_string())),
            BaseType::Boolean => json.as_bool().map(AnswerValue::Boolean),
            BaseType::Integer => decode_integer(json).map(AnswerValue::Integer),
            BaseType::Decimal if self.is_fraction() => {
                decode_fraction(json).map(AnswerValue::Fraction)
            }
            BaseType::Decimal => decode_decimal(json).map(AnswerValue::Decimal),
            BaseType::Date => self.decode_date(json).map(AnswerValue::Date),
            BaseType::Data => json
                .as_str()
                .and_then(|s| STANDARD.decode(s.trim()).ok())
                .map(AnswerValue::Data),
        };
        decoded.ok_or_else(|| CoreError::mismatch(self.base_type, json))
    }

    fn encode_leaf(&self, value: &AnswerValue) -> Result<Value, CoreError> {
        let encoded = match (self.base_type, value) {
            (BaseType::String, AnswerValue::String(s)) => Some(Value::String(s.clone())),
            (BaseType::Boolean, AnswerValue::Boolean(b)) => Some(Value::Bool(*b)),
            (BaseType::Integer, AnswerValue::Integer(i)) => Some(Value::from(*i)),
            (BaseType::Decimal, AnswerValue::Integer(i)) => Some(Value::from(*i)),
            (BaseType::Decimal, AnswerValue::Decimal(d)) => {
                Number::from_f64(*d).map(Value::Number)
            }
            (BaseType::Decimal, AnswerValue::Fraction(f)) => {
                Number::from_f64(f.to_f64()).map(Value::Number)
            }
            (BaseType::Date, AnswerValue::Date(date)) => self.format_date(date),
            (BaseType::Data, AnswerValue::Data(bytes)) => Some(Value::String(STANDARD.encode(bytes))),
            _ => None,
        };
        encoded.ok_or_else(|| CoreError::TypeMismatch {
            expected: self.base_type.to_string(),
            found: value.kind_name().to_string(),
        })
    }

    fn decode_date(&self, json: &Value) -> Option<NaiveDateTime> {
        match json {
            Value::String(text) => {
                let text = text.trim();
                match &self.date_format {
                    Some(format) => parse_date(text, format),
                    None => DateTime::parse_from_rfc3339(text)
                        .map(|d| d.naive_utc())
                        .ok()
                        .or_else(|| NaiveDateTime::parse_from_str(text, ISO_DATE_TIME_FORMAT).ok())
                        .or_else(|| parse_date(text, DEFAULT_DATE_FORMAT)),
                }
            }
            Value::Number(n) => n
                .as_i64()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .map(|d| d.naive_utc()),
            _ => None,
        }
    }

    fn format_date(&self, date: &NaiveDateTime) -> Option<Value> {
        let format = self.date_format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
        let mut out = String::new();
        // An invalid pattern surfaces as a formatting error rather than a panic.
        write!(out, "{}", date.format(format)).ok()?;
        Some(Value::String(out))
    }
}

impl fmt::Display for AnswerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_type)?;
        if self.is_sequence() {
            f.write_str("[]")?;
        }
        if let Some(unit) = &self.unit {
            write!(f, " (unit: {unit})")?;
        }
        if let Some(format) = &self.date_format {
            write!(f, " (format: {format})")?;
        }
        Ok(())
    }
}

fn decode_integer(json: &Value) -> Option<i64> {
    match json {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn decode_decimal(json: &Value) -> Option<f64> {
    match json {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn decode_fraction(json: &Value) -> Option<Fraction> {
    match json {
        Value::Number(n) => n.as_f64().and_then(Fraction::from_f64),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Parse `text` with a strftime pattern. Patterns without a full calendar
/// date still decode what they encode: time-only patterns land on the Unix
/// epoch date, and missing month or day fields default to 1.
fn parse_date(text: &str, format: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_str(text, format)
        .map(|d| d.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .or_else(|| {
            NaiveTime::parse_from_str(text, format)
                .ok()
                .map(|t| DateTime::<Utc>::UNIX_EPOCH.date_naive().and_time(t))
        })
        .or_else(|| parse_partial_date(text, format))
}

fn parse_partial_date(text: &str, format: &str) -> Option<NaiveDateTime> {
    const MONTH_SPECS: [&str; 4] = ["%m", "%b", "%B", "%h"];
    const DAY_SPECS: [&str; 3] = ["%d", "%e", "%j"];

    let mut text = text.to_string();
    let mut format = format.to_string();
    let has_month = MONTH_SPECS.iter().any(|spec| format.contains(*spec));
    if !has_month && !format.contains("%j") {
        text.push_str(" 01");
        format.push_str(" %m");
    }
    if !DAY_SPECS.iter().any(|spec| format.contains(*spec)) {
        text.push_str(" 01");
        format.push_str(" %d");
    }
    NaiveDateTime::parse_from_str(&text, &format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(&text, &format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
