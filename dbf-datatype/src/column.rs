use crate::error::{Error, Result};
use crate::{parse_date, parse_logical, Date, Decimal, Value, ValueType};

/// Typed storage of one materialized column.
///
/// Each variant keeps its native width so that widening a column
/// is an explicit variant replacement via [`Column::retype`].
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Bool(Vec<Option<bool>>),
    Byte(Vec<Option<u8>>),
    Short(Vec<Option<i16>>),
    Int(Vec<Option<i32>>),
    Long(Vec<Option<i64>>),
    Float(Vec<Option<f32>>),
    Double(Vec<Option<f64>>),
    Decimal(Vec<Option<Decimal>>),
    String(Vec<Option<String>>),
    Date(Vec<Option<Date>>),
}

macro_rules! dispatch {
    ($self:expr, $v:ident => $body:expr) => {
        match $self {
            Column::Bool($v) => $body,
            Column::Byte($v) => $body,
            Column::Short($v) => $body,
            Column::Int($v) => $body,
            Column::Long($v) => $body,
            Column::Float($v) => $body,
            Column::Double($v) => $body,
            Column::Decimal($v) => $body,
            Column::String($v) => $body,
            Column::Date($v) => $body,
        }
    };
}

#[allow(clippy::len_without_is_empty)]
impl Column {
    #[inline]
    pub fn new(ty: ValueType) -> Self {
        Self::with_capacity(ty, 0)
    }

    #[inline]
    pub fn with_capacity(ty: ValueType, cap: usize) -> Self {
        match ty {
            ValueType::Bool => Column::Bool(Vec::with_capacity(cap)),
            ValueType::Byte => Column::Byte(Vec::with_capacity(cap)),
            ValueType::Short => Column::Short(Vec::with_capacity(cap)),
            ValueType::Int => Column::Int(Vec::with_capacity(cap)),
            ValueType::Long => Column::Long(Vec::with_capacity(cap)),
            ValueType::Float => Column::Float(Vec::with_capacity(cap)),
            ValueType::Double => Column::Double(Vec::with_capacity(cap)),
            ValueType::Decimal => Column::Decimal(Vec::with_capacity(cap)),
            ValueType::String => Column::String(Vec::with_capacity(cap)),
            ValueType::Date => Column::Date(Vec::with_capacity(cap)),
        }
    }

    #[inline]
    pub fn ty(&self) -> ValueType {
        match self {
            Column::Bool(_) => ValueType::Bool,
            Column::Byte(_) => ValueType::Byte,
            Column::Short(_) => ValueType::Short,
            Column::Int(_) => ValueType::Int,
            Column::Long(_) => ValueType::Long,
            Column::Float(_) => ValueType::Float,
            Column::Double(_) => ValueType::Double,
            Column::Decimal(_) => ValueType::Decimal,
            Column::String(_) => ValueType::String,
            Column::Date(_) => ValueType::Date,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        dispatch!(self, v => v.len())
    }

    #[inline]
    pub fn is_null(&self, idx: usize) -> bool {
        dispatch!(self, v => v[idx].is_none())
    }

    /// Returns value at given index.
    /// Panics if index is out of bound.
    #[inline]
    pub fn get(&self, idx: usize) -> Value {
        match self {
            Column::Bool(v) => v[idx].into(),
            Column::Byte(v) => v[idx].into(),
            Column::Short(v) => v[idx].into(),
            Column::Int(v) => v[idx].into(),
            Column::Long(v) => v[idx].into(),
            Column::Float(v) => v[idx].into(),
            Column::Double(v) => v[idx].into(),
            Column::Decimal(v) => v[idx].clone().into(),
            Column::String(v) => v[idx].clone().into(),
            Column::Date(v) => v[idx].into(),
        }
    }

    /// Returns text form of the cell, using the native width of the column.
    #[inline]
    pub fn text(&self, idx: usize) -> Option<String> {
        match self {
            Column::Bool(v) => v[idx].map(|b| if b { "T".to_string() } else { "F".to_string() }),
            Column::Byte(v) => v[idx].map(|n| n.to_string()),
            Column::Short(v) => v[idx].map(|n| n.to_string()),
            Column::Int(v) => v[idx].map(|n| n.to_string()),
            Column::Long(v) => v[idx].map(|n| n.to_string()),
            Column::Float(v) => v[idx].map(|n| n.to_string()),
            Column::Double(v) => v[idx].map(|n| n.to_string()),
            Column::Decimal(v) => v[idx].as_ref().map(|d| d.to_string(-1)),
            Column::String(v) => v[idx].clone(),
            Column::Date(v) => v[idx].map(crate::format_date_compact),
        }
    }

    #[inline]
    pub fn push_null(&mut self) {
        dispatch!(self, v => v.push(None))
    }

    /// Push value converted to the type of this column.
    /// On failure, nothing is pushed.
    #[inline]
    pub fn push(&mut self, val: Value) -> Result<()> {
        if val.is_null() {
            self.push_null();
            return Ok(());
        }
        match self {
            Column::Bool(v) => v.push(Some(to_bool(&val)?)),
            Column::Byte(v) => v.push(Some(u8::try_from(to_i64(&val)?)?)),
            Column::Short(v) => v.push(Some(i16::try_from(to_i64(&val)?)?)),
            Column::Int(v) => v.push(Some(i32::try_from(to_i64(&val)?)?)),
            Column::Long(v) => v.push(Some(to_i64(&val)?)),
            Column::Float(v) => v.push(Some(to_f32(&val)?)),
            Column::Double(v) => v.push(Some(to_f64(&val)?)),
            Column::Decimal(v) => v.push(Some(val.as_decimal().ok_or(Error::TypeMismatch)?)),
            Column::String(v) => v.push(Some(val.to_string())),
            Column::Date(v) => v.push(Some(val.as_date().ok_or(Error::TypeMismatch)?)),
        }
        Ok(())
    }

    /// Overwrite value at given index, converted to the type of this column.
    #[inline]
    pub fn set(&mut self, idx: usize, val: Value) -> Result<()> {
        if idx >= self.len() {
            return Err(Error::ValueOutOfRange);
        }
        let mut single = Column::new(self.ty());
        single.push(val)?;
        match (self, single) {
            (Column::Bool(v), Column::Bool(mut s)) => v[idx] = s.pop().flatten(),
            (Column::Byte(v), Column::Byte(mut s)) => v[idx] = s.pop().flatten(),
            (Column::Short(v), Column::Short(mut s)) => v[idx] = s.pop().flatten(),
            (Column::Int(v), Column::Int(mut s)) => v[idx] = s.pop().flatten(),
            (Column::Long(v), Column::Long(mut s)) => v[idx] = s.pop().flatten(),
            (Column::Float(v), Column::Float(mut s)) => v[idx] = s.pop().flatten(),
            (Column::Double(v), Column::Double(mut s)) => v[idx] = s.pop().flatten(),
            (Column::Decimal(v), Column::Decimal(mut s)) => v[idx] = s.pop().flatten(),
            (Column::String(v), Column::String(mut s)) => v[idx] = s.pop().flatten(),
            (Column::Date(v), Column::Date(mut s)) => v[idx] = s.pop().flatten(),
            _ => unreachable!(),
        }
        Ok(())
    }

    #[inline]
    pub fn remove(&mut self, idx: usize) {
        dispatch!(self, v => {
            v.remove(idx);
        })
    }

    #[inline]
    pub fn truncate(&mut self, len: usize) {
        dispatch!(self, v => v.truncate(len))
    }

    /// Convert every cell to a new type through its text form.
    ///
    /// Returns the new column and indexes of cells which could not be
    /// converted. Those cells are null in the new column.
    pub fn retype(&self, ty: ValueType) -> (Column, Vec<usize>) {
        let len = self.len();
        let mut res = Column::with_capacity(ty, len);
        let mut failures = vec![];
        for idx in 0..len {
            match self.text(idx) {
                None => res.push_null(),
                Some(text) => {
                    let converted = match ty {
                        ValueType::Bool => Some(Value::Bool(parse_logical(&text))),
                        ValueType::Date => parse_date(&text).map(Value::Date),
                        _ => ty.parse_numeric(text.trim()),
                    };
                    match converted.map(|v| res.push(v)) {
                        Some(Ok(())) => (),
                        _ => {
                            res.push_null();
                            failures.push(idx);
                        }
                    }
                }
            }
        }
        (res, failures)
    }
}

#[inline]
fn to_bool(val: &Value) -> Result<bool> {
    match val {
        Value::Bool(b) => Ok(*b),
        Value::I64(i) => Ok(*i != 0),
        Value::Text(s) => Ok(parse_logical(s)),
        _ => Err(Error::TypeMismatch),
    }
}

#[inline]
fn to_i64(val: &Value) -> Result<i64> {
    match val {
        Value::Text(s) => Ok(s.trim().parse::<i64>()?),
        Value::F64(f) if f.fract() != 0.0 => Err(Error::ValueOutOfRange),
        Value::Date(_) => Err(Error::TypeMismatch),
        other => other.as_i64().ok_or(Error::ValueOutOfRange),
    }
}

#[inline]
fn to_f64(val: &Value) -> Result<f64> {
    match val {
        Value::Text(s) => Ok(s.trim().parse::<f64>()?),
        Value::Bool(_) | Value::Date(_) => Err(Error::TypeMismatch),
        other => other.as_f64().ok_or(Error::TypeMismatch),
    }
}

#[inline]
fn to_f32(val: &Value) -> Result<f32> {
    let v = match val {
        Value::Text(s) => s.trim().parse::<f32>()?,
        other => to_f64(other)? as f32,
    };
    if v.is_finite() {
        Ok(v)
    } else {
        Err(Error::ValueOutOfRange)
    }
}
