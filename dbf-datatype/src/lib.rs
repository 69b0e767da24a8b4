pub mod column;
pub mod error;
pub mod value;

pub use column::Column;
pub use value::Value;

pub use fxd::{Error as DecimalError, FixedDecimal as Decimal};
pub use time::format_description::{self, BorrowedFormatItem};
pub use time::{Date, Month};

use static_init::dynamic;
use std::borrow::Cow;

/// Runtime type of a column.
///
/// Numeric types form two widening ladders:
/// `Byte -> Short -> Int -> Long -> String` for integers and
/// `Float -> Double -> Decimal -> String` for reals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    Bool,
    /// Unsigned 8-bit integer.
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    String,
    Date,
}

impl ValueType {
    /// Returns next wider type on the ladder, or None if this type
    /// cannot be widened.
    #[inline]
    pub fn widen(self) -> Option<ValueType> {
        let res = match self {
            ValueType::Byte => ValueType::Short,
            ValueType::Short => ValueType::Int,
            ValueType::Int => ValueType::Long,
            ValueType::Long => ValueType::String,
            ValueType::Float => ValueType::Double,
            ValueType::Double => ValueType::Decimal,
            ValueType::Decimal => ValueType::String,
            ValueType::Bool | ValueType::String | ValueType::Date => return None,
        };
        Some(res)
    }

    #[inline]
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ValueType::Byte | ValueType::Short | ValueType::Int | ValueType::Long
        )
    }

    #[inline]
    pub fn is_real(self) -> bool {
        matches!(
            self,
            ValueType::Float | ValueType::Double | ValueType::Decimal
        )
    }

    #[inline]
    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_real()
    }

    /// Parse trimmed numeric text as this type.
    /// Returns None if the text does not fit, which is the signal for widening.
    #[inline]
    pub fn parse_numeric(self, text: &str) -> Option<Value> {
        let res = match self {
            ValueType::Byte => Value::I64(text.parse::<u8>().ok()? as i64),
            ValueType::Short => Value::I64(text.parse::<i16>().ok()? as i64),
            ValueType::Int => Value::I64(text.parse::<i32>().ok()? as i64),
            ValueType::Long => Value::I64(text.parse::<i64>().ok()?),
            ValueType::Float => {
                let v = text.parse::<f32>().ok()?;
                if !v.is_finite() {
                    return None;
                }
                Value::F64(v as f64)
            }
            ValueType::Double => {
                let v = text.parse::<f64>().ok()?;
                if !v.is_finite() {
                    return None;
                }
                Value::F64(v)
            }
            ValueType::Decimal => Value::Decimal(text.parse::<Decimal>().ok()?),
            ValueType::String => Value::Text(text.to_string()),
            ValueType::Bool | ValueType::Date => return None,
        };
        Some(res)
    }

    #[inline]
    pub fn to_lower(&self) -> Cow<'static, str> {
        let s = match self {
            ValueType::Bool => "bool",
            ValueType::Byte => "byte",
            ValueType::Short => "short",
            ValueType::Int => "int",
            ValueType::Long => "long",
            ValueType::Float => "float",
            ValueType::Double => "double",
            ValueType::Decimal => "decimal",
            ValueType::String => "string",
            ValueType::Date => "date",
        };
        Cow::Borrowed(s)
    }
}

/// Parse logical text. Only the first character is significant.
#[inline]
pub fn parse_logical(text: &str) -> bool {
    matches!(text.trim_start().as_bytes().first(), Some(b'T' | b't' | b'Y' | b'y'))
}

/// Parse date in compact `YYYYMMDD` form, `YYYY-MM-DD` is also accepted.
/// Any malformed component or impossible calendar date results in None.
#[inline]
pub fn parse_date(text: &str) -> Option<Date> {
    let text = text.trim();
    let digits: Cow<'_, str> = if text.len() == 10 && text.as_bytes()[4] == b'-' {
        Cow::Owned(text.replace('-', ""))
    } else {
        Cow::Borrowed(text)
    };
    let bs = digits.as_bytes();
    if bs.len() != 8 || !bs.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let year: i32 = digits[0..4].parse().ok()?;
    let month: u8 = digits[4..6].parse().ok()?;
    let day: u8 = digits[6..8].parse().ok()?;
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

/// Format date in compact `YYYYMMDD` form used by the record layout.
#[inline]
pub fn format_date_compact(date: Date) -> String {
    format!("{:04}{:02}{:02}", date.year(), date.month() as u8, date.day())
}

#[dynamic]
pub static DEFAULT_DATE_FORMAT: Vec<BorrowedFormatItem<'static>> =
    format_description::parse_borrowed::<1>("[year]-[month]-[day]").unwrap();
