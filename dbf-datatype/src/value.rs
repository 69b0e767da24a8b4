use crate::{Date, Decimal, DEFAULT_DATE_FORMAT};
use std::fmt;

/// Dynamically typed scalar of one attribute cell.
///
/// All integer widths collapse into `I64` and `f32`/`f64` collapse
/// into `F64`. The declared width lives in the column, not the value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Decimal(Decimal),
    Text(String),
    Date(Date),
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            Value::F64(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 => {
                Some(*f as i64)
            }
            Value::Decimal(d) => d.to_string(-1).parse().ok(),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I64(i) => Some(*i as f64),
            Value::F64(f) => Some(*f),
            Value::Decimal(d) => d.to_string(-1).parse().ok(),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[inline]
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::I64(i) => Some(Decimal::from(*i)),
            Value::F64(f) if f.is_finite() => format!("{}", f).parse().ok(),
            Value::Decimal(d) => Some(d.clone()),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_date(&self) -> Option<Date> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Text(s) => crate::parse_date(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::I64(i) => write!(f, "{}", i),
            Value::F64(v) => write!(f, "{}", v),
            Value::Decimal(d) => write!(f, "{}", d.to_string(-1)),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => {
                let s = d.format(&DEFAULT_DATE_FORMAT).map_err(|_| fmt::Error)?;
                f.write_str(&s)
            }
        }
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                #[inline]
                fn from(src: $ty) -> Self {
                    Value::I64(src as i64)
                }
            }
        )*
    };
}

impl_from_int!(u8, i8, u16, i16, u32, i32, i64);

impl From<f32> for Value {
    #[inline]
    fn from(src: f32) -> Self {
        Value::F64(src as f64)
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(src: f64) -> Self {
        Value::F64(src)
    }
}

impl From<bool> for Value {
    #[inline]
    fn from(src: bool) -> Self {
        Value::Bool(src)
    }
}

impl From<Decimal> for Value {
    #[inline]
    fn from(src: Decimal) -> Self {
        Value::Decimal(src)
    }
}

impl From<Date> for Value {
    #[inline]
    fn from(src: Date) -> Self {
        Value::Date(src)
    }
}

impl From<&str> for Value {
    #[inline]
    fn from(src: &str) -> Self {
        Value::Text(src.to_string())
    }
}

impl From<String> for Value {
    #[inline]
    fn from(src: String) -> Self {
        Value::Text(src)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    #[inline]
    fn from(src: Option<T>) -> Self {
        match src {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
