//! Codec of fixed-length records.
//!
//! A record is one flag byte followed by the field bytes in schema order.
//! All values are stored as text: numbers right-justified ASCII, strings
//! in the table encoding padded with spaces, dates as `YYYYMMDD` and
//! logicals as a single character.
use crate::data::DataTable;
use crate::deletion::{FLAG_DELETED, FLAG_LIVE};
use crate::encoding::TextEncoding;
use crate::error::{Error, Result};
use crate::field::{Field, FieldType, Schema};
use crate::number::{format_integer, NumberConverter};
use dbf_datatype::{format_date_compact, parse_date, parse_logical, Value, ValueType};
use std::borrow::Cow;

/// Values of one row by field name, produced by stateless reads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<(String, Value)>,
}

impl Row {
    #[inline]
    pub fn from_pairs<I: IntoIterator<Item = (String, Value)>>(pairs: I) -> Self {
        Row {
            values: pairs.into_iter().collect(),
        }
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    #[inline]
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().map(|(_, v)| v)
    }

    #[inline]
    pub fn into_values(self) -> Vec<Value> {
        self.values.into_iter().map(|(_, v)| v).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Outcome of decoding one field buffer.
enum FieldRead {
    Value(Value),
    /// Numeric text does not fit the declared value type.
    Overflow(String),
}

#[derive(Debug, Clone, Copy)]
pub struct RecordCodec {
    encoding: TextEncoding,
}

impl RecordCodec {
    #[inline]
    pub fn new(encoding: TextEncoding) -> Self {
        RecordCodec { encoding }
    }

    #[inline]
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Decode one field without any table to widen.
    /// Numeric text that does not fit the declared type is an error.
    #[inline]
    pub fn decode_field(&self, field: &Field, bs: &[u8]) -> Result<Value> {
        match self.read_field(field, bs)? {
            FieldRead::Value(v) => Ok(v),
            FieldRead::Overflow(text) => Err(Error::NumericOverflow {
                field: field.name.clone(),
                text,
            }),
        }
    }

    /// Decode one field, parsing numeric text that does not fit the declared
    /// type at the first wider type that holds it. The schema is untouched.
    pub fn decode_field_widened(&self, field: &Field, bs: &[u8]) -> Result<Value> {
        match self.read_field(field, bs)? {
            FieldRead::Value(v) => Ok(v),
            FieldRead::Overflow(text) => {
                let mut ty = field.value_type;
                while let Some(next) = ty.widen() {
                    ty = next;
                    if let Some(v) = ty.parse_numeric(&text) {
                        return Ok(v);
                    }
                }
                Err(Error::NumericOverflow {
                    field: field.name.clone(),
                    text,
                })
            }
        }
    }

    /// Decode field bytes of a record, flag byte excluded.
    pub fn decode_row(&self, schema: &Schema, data: &[u8]) -> Result<Row> {
        let mut values = Vec::with_capacity(schema.len());
        let mut offset = 0;
        for f in schema.fields() {
            let end = (offset + f.length as usize).min(data.len());
            let v = self.decode_field(f, &data[offset.min(end)..end])?;
            values.push((f.name.clone(), v));
            offset = end;
        }
        Ok(Row { values })
    }

    /// Decode field bytes of a record and append it to the table.
    ///
    /// A numeric column whose declared type cannot hold the value is widened
    /// along its ladder, converting rows already in the table.
    /// On error the table is left as it was.
    pub fn decode_into(&self, data: &[u8], table: &mut DataTable) -> Result<()> {
        let rows = table.num_rows();
        match self.decode_into_inner(data, table) {
            Ok(()) => {
                table.commit_row();
                Ok(())
            }
            Err(e) => {
                table.truncate(rows);
                Err(e)
            }
        }
    }

    fn decode_into_inner(&self, data: &[u8], table: &mut DataTable) -> Result<()> {
        let mut offset = 0;
        for col in 0..table.schema().len() {
            let field = table.schema().field(col);
            let end = (offset + field.length as usize).min(data.len());
            let bs = &data[offset.min(end)..end];
            offset = end;
            match self.read_field(field, bs)? {
                FieldRead::Value(v) => table.push_cell(col, v)?,
                FieldRead::Overflow(text) => {
                    let mut ty = field.value_type;
                    let value = loop {
                        ty = match ty.widen() {
                            Some(next) => next,
                            None => {
                                return Err(Error::NumericOverflow {
                                    field: field.name.clone(),
                                    text,
                                })
                            }
                        };
                        if let Some(v) = ty.parse_numeric(&text) {
                            break v;
                        }
                    };
                    table.widen_column(col, ty);
                    table.push_cell(col, value)?;
                }
            }
        }
        Ok(())
    }

    fn read_field(&self, field: &Field, bs: &[u8]) -> Result<FieldRead> {
        if field.ty == FieldType::Time {
            return Err(Error::UnsupportedFieldType('T'));
        }
        if bs.iter().all(|b| *b == b' ' || *b == 0) {
            return Ok(FieldRead::Value(Value::Null));
        }
        let res = match field.ty {
            FieldType::Logical => Value::Bool(parse_logical(&ascii(bs))),
            FieldType::Date => parse_date(&ascii(bs)).map_or(Value::Null, Value::Date),
            FieldType::Numeric | FieldType::Float | FieldType::Binary => {
                let text = ascii(bs);
                let text = text.trim();
                match field.value_type {
                    ValueType::String => Value::Text(text.to_string()),
                    ty => match ty.parse_numeric(text) {
                        Some(v) => v,
                        None => return Ok(FieldRead::Overflow(text.to_string())),
                    },
                }
            }
            FieldType::Character | FieldType::Memo | FieldType::Other(_) | FieldType::Time => {
                let s = self.encoding.decode(bs);
                let s = if s.contains('\0') {
                    Cow::Owned(s.replace('\0', ""))
                } else {
                    s
                };
                Value::Text(s.trim().to_string())
            }
        };
        Ok(FieldRead::Value(res))
    }

    /// Encode a full record, flag byte included, into `buf`.
    ///
    /// Missing values are written as blanks. The record is always exactly
    /// `record_length` bytes.
    pub fn encode_row(&self, schema: &Schema, values: &[Value], deleted: bool, buf: &mut Vec<u8>) {
        buf.clear();
        buf.push(if deleted { FLAG_DELETED } else { FLAG_LIVE });
        for (idx, f) in schema.fields().iter().enumerate() {
            let v = values.get(idx).unwrap_or(&Value::Null);
            self.encode_field(f, v, buf);
        }
        buf.resize(schema.record_length(), b' ');
    }

    /// Append encoded field bytes to `buf`, exactly `field.length` of them.
    pub fn encode_field(&self, field: &Field, value: &Value, buf: &mut Vec<u8>) {
        let len = field.length as usize;
        let start = buf.len();
        if field.ty == FieldType::Character && !value.is_null() {
            let s = value.to_string();
            buf.extend_from_slice(&self.encoding.encode_bounded(&s, len));
        } else {
            match value {
                Value::Null => (),
                Value::Bool(b) => buf.push(if *b { b'T' } else { b'F' }),
                Value::I64(i) => buf.extend_from_slice(&format_integer(*i, len)),
                Value::F64(f) => {
                    let nc = NumberConverter::new(field.length, field.decimal_count);
                    if field.value_type == ValueType::Float {
                        buf.extend_from_slice(&nc.format_f32(*f as f32));
                    } else {
                        buf.extend_from_slice(&nc.format_f64(*f));
                    }
                }
                Value::Decimal(d) => {
                    let nc = NumberConverter::new(field.length, field.decimal_count);
                    buf.extend_from_slice(&nc.format_decimal(d));
                }
                Value::Text(s) => buf.extend_from_slice(&self.encoding.encode_bounded(s, len)),
                Value::Date(d) => buf.extend_from_slice(format_date_compact(*d).as_bytes()),
            }
        }
        buf.truncate(start + len);
        buf.resize(start + len, b' ');
    }
}

#[inline]
fn ascii(bs: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bs)
}
