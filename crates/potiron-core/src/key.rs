//! Store key construction and calendar helpers.
//!
//! Sorted sets are named `source[:protocol]:date:field`, where `date` is
//! `YYYYMMDD` for day keys and `YYYYMM` for month keys. Keys are only built
//! through the constructors here so every component is validated once.

use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::error::{Error, Result};

/// Layout of a day inside store keys and the `DAYS` set.
pub const DAY_FORMAT: &str = "%Y%m%d";

/// Layout of a day in user-facing input and output.
pub const DISPLAY_DAY_FORMAT: &str = "%Y-%m-%d";

/// Set of every day with ingested data (`YYYYMMDD` members).
pub const DAYS: &str = "DAYS";

/// Set of every field known to the sensor.
pub const FIELDS: &str = "FIELDS";

/// Set of fields shown on the dashboard.
pub const ENABLED_FIELDS: &str = "ENFIELDS";

/// Set holding [`COMBINED_KEYS_ENABLED`] when day keys carry a protocol.
pub const COMBINED_KEYS: &str = "CK";

/// Member of [`COMBINED_KEYS`] marking protocol-aware keys.
pub const COMBINED_KEYS_ENABLED: &str = "YES";

/// Hash translating stored values of `field` into human labels.
pub fn translation_key(field: &str) -> String {
    format!("TR:{field}")
}

/// Hash translating human labels of `field` back into stored values.
pub fn reverse_translation_key(field: &str) -> String {
    format!("RT:{field}")
}

/// String holding the description of `field`.
pub fn description_key(field: &str) -> String {
    format!("DS:{field}")
}

/// Format a day the way store keys spell it.
pub fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

/// Parse a day written either as `YYYYMMDD` or `YYYY-MM-DD`.
pub fn parse_day(input: &str) -> Result<NaiveDate> {
    let layout = if input.contains('-') {
        DISPLAY_DAY_FORMAT
    } else {
        DAY_FORMAT
    };
    NaiveDate::parse_from_str(input, layout).map_err(|e| Error::InvalidDate {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// Check that `source` can name a sensor in store keys.
pub fn validate_source(source: &str) -> Result<()> {
    validate("source", source).map(|_| ())
}

fn validate<'a>(component: &'static str, value: &'a str) -> Result<&'a str> {
    if value.is_empty() {
        return Err(Error::InvalidKey {
            component,
            reason: "must not be empty".to_string(),
        });
    }
    if value.contains(':') {
        return Err(Error::InvalidKey {
            component,
            reason: format!("'{value}' must not contain ':'"),
        });
    }
    Ok(value)
}

// ═══════════════════════════════════════════════════════════════════════════
// YearMonth
// ═══════════════════════════════════════════════════════════════════════════

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    first: NaiveDate,
}

impl YearMonth {
    /// Build a month from its year and 1-based month number.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first| Self { first })
            .ok_or_else(|| Error::InvalidDate {
                input: format!("{year:04}-{month:02}"),
                reason: "no such month".to_string(),
            })
    }

    /// Parse `YYYY-MM` or `YYYYMM`.
    pub fn parse(input: &str) -> Result<Self> {
        let compact: String = input.chars().filter(|c| *c != '-').collect();
        if compact.len() != 6 || !compact.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidDate {
                input: input.to_string(),
                reason: "expected YYYY-MM".to_string(),
            });
        }
        // Six ASCII digits always parse.
        let year: i32 = compact[..4].parse().unwrap_or_default();
        let month: u32 = compact[4..].parse().unwrap_or_default();
        Self::new(year, month).map_err(|_| Error::InvalidDate {
            input: input.to_string(),
            reason: "no such month".to_string(),
        })
    }

    /// The month containing `day`.
    pub fn of(day: NaiveDate) -> Self {
        Self {
            first: day.with_day(1).unwrap_or(day),
        }
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    /// `YYYYMM`, as used in store keys.
    pub fn compact(&self) -> String {
        self.first.format("%Y%m").to_string()
    }

    /// Every calendar day of the month, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let month = self.first.month();
        self.first.iter_days().take_while(move |d| d.month() == month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first.format("%Y-%m"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Keys
// ═══════════════════════════════════════════════════════════════════════════

/// Name of one sorted set in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey(String);

impl SourceKey {
    /// `source:YYYYMMDD:field`
    pub fn day(source: &str, day: NaiveDate, field: &str) -> Result<Self> {
        Ok(FieldKey::new(source, field)?.for_day(day))
    }

    /// `source:protocol:YYYYMMDD:field`
    pub fn day_with_protocol(
        source: &str,
        protocol: &str,
        day: NaiveDate,
        field: &str,
    ) -> Result<Self> {
        Ok(FieldKey::new(source, field)?
            .with_protocol(protocol)?
            .for_day(day))
    }

    /// `source:YYYYMM:field`
    pub fn month(source: &str, month: YearMonth, field: &str) -> Result<Self> {
        Ok(FieldKey::new(source, field)?.for_month(month))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SourceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validated `source[:protocol]` and `field` parts of a key, missing only the date.
///
/// Used wherever the same field is read for many days.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    source: String,
    protocol: Option<String>,
    field: String,
}

impl FieldKey {
    pub fn new(source: &str, field: &str) -> Result<Self> {
        Ok(Self {
            source: validate("source", source)?.to_string(),
            protocol: None,
            field: validate("field", field)?.to_string(),
        })
    }

    pub fn with_protocol(mut self, protocol: &str) -> Result<Self> {
        self.protocol = Some(validate("protocol", protocol)?.to_string());
        Ok(self)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    pub fn for_day(&self, day: NaiveDate) -> SourceKey {
        self.with_date(&format_day(day))
    }

    pub fn for_month(&self, month: YearMonth) -> SourceKey {
        self.with_date(&month.compact())
    }

    fn with_date(&self, date: &str) -> SourceKey {
        match &self.protocol {
            Some(protocol) => SourceKey(format!(
                "{}:{}:{}:{}",
                self.source, protocol, date, self.field
            )),
            None => SourceKey(format!("{}:{}:{}", self.source, date, self.field)),
        }
    }
}
