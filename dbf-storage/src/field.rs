use crate::error::{Error, Result};
use dbf_datatype::ValueType;
use smallvec::SmallVec;

/// Maximum length of a field in bytes.
pub const MAX_FIELD_LENGTH: usize = 255;

/// Physical type tag of a field descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Character,
    Numeric,
    Float,
    Binary,
    Logical,
    Date,
    Time,
    Memo,
    Other(u8),
}

impl FieldType {
    #[inline]
    pub fn from_tag(tag: u8) -> Self {
        match tag.to_ascii_uppercase() {
            b'C' => FieldType::Character,
            b'N' => FieldType::Numeric,
            b'F' => FieldType::Float,
            b'B' => FieldType::Binary,
            b'L' => FieldType::Logical,
            b'D' => FieldType::Date,
            b'T' => FieldType::Time,
            b'M' => FieldType::Memo,
            _ => FieldType::Other(tag),
        }
    }

    #[inline]
    pub fn tag(&self) -> u8 {
        match self {
            FieldType::Character => b'C',
            FieldType::Numeric => b'N',
            FieldType::Float => b'F',
            FieldType::Binary => b'B',
            FieldType::Logical => b'L',
            FieldType::Date => b'D',
            FieldType::Time => b'T',
            FieldType::Memo => b'M',
            FieldType::Other(tag) => *tag,
        }
    }

    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Numeric | FieldType::Float | FieldType::Binary)
    }

    /// Value type a freshly read field starts with.
    #[inline]
    pub fn initial_value_type(&self, length: u8, decimal_count: u8) -> ValueType {
        match self {
            FieldType::Logical => ValueType::Bool,
            FieldType::Date => ValueType::Date,
            FieldType::Numeric | FieldType::Float | FieldType::Binary => {
                if decimal_count == 0 {
                    match length {
                        0..=2 => ValueType::Byte,
                        3..=4 => ValueType::Short,
                        5..=9 => ValueType::Int,
                        10..=18 => ValueType::Long,
                        _ => ValueType::Decimal,
                    }
                } else {
                    match length {
                        0..=7 => ValueType::Float,
                        8..=15 => ValueType::Double,
                        _ => ValueType::Decimal,
                    }
                }
            }
            FieldType::Character | FieldType::Time | FieldType::Memo | FieldType::Other(_) => {
                ValueType::String
            }
        }
    }
}

/// Column definition of an attribute table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    pub length: u8,
    pub decimal_count: u8,
    pub value_type: ValueType,
    pub ordinal: usize,
}

impl Field {
    /// Create a field whose value type is derived from its physical shape.
    #[inline]
    pub fn new(name: impl Into<String>, ty: FieldType, length: u8, decimal_count: u8) -> Result<Self> {
        let name = name.into();
        if decimal_count > length {
            return Err(Error::InvalidField(name));
        }
        let value_type = ty.initial_value_type(length, decimal_count);
        Ok(Field {
            name,
            ty,
            length,
            decimal_count,
            value_type,
            ordinal: 0,
        })
    }

    #[inline]
    pub fn character(name: impl Into<String>, length: u8) -> Result<Self> {
        Field::new(name, FieldType::Character, length, 0)
    }

    #[inline]
    pub fn numeric(name: impl Into<String>, length: u8, decimal_count: u8) -> Result<Self> {
        Field::new(name, FieldType::Numeric, length, decimal_count)
    }

    #[inline]
    pub fn logical(name: impl Into<String>) -> Result<Self> {
        Field::new(name, FieldType::Logical, 1, 0)
    }

    #[inline]
    pub fn date(name: impl Into<String>) -> Result<Self> {
        Field::new(name, FieldType::Date, 8, 0)
    }

    /// Override value type, keeping length and decimal count.
    #[inline]
    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }
}

/// Ordered field list with derived record layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Build schema, assigning ordinals and making names unique by
    /// appending a numeric suffix to duplicates.
    pub fn new(fields: Vec<Field>) -> Self {
        let mut res: Vec<Field> = Vec::with_capacity(fields.len());
        for (ordinal, mut f) in fields.into_iter().enumerate() {
            if res.iter().any(|e| e.name.eq_ignore_ascii_case(&f.name)) {
                let mut suffix = 1;
                let name = loop {
                    let candidate = format!("{}{}", f.name, suffix);
                    if !res.iter().any(|e| e.name.eq_ignore_ascii_case(&candidate)) {
                        break candidate;
                    }
                    suffix += 1;
                };
                f.name = name;
            }
            f.ordinal = ordinal;
            res.push(f);
        }
        Schema { fields: res }
    }

    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[inline]
    pub fn field(&self, idx: usize) -> &Field {
        &self.fields[idx]
    }

    #[inline]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    #[inline]
    pub fn find(&self, name: &str) -> Result<usize> {
        self.position(name)
            .ok_or_else(|| Error::FieldNotFound(name.to_string()))
    }

    /// Replace value type of a field, keeping its physical shape.
    #[inline]
    pub fn set_value_type(&mut self, idx: usize, value_type: ValueType) {
        self.fields[idx].value_type = value_type;
    }

    /// Replace field definition at given position.
    #[inline]
    pub fn replace(&mut self, idx: usize, mut field: Field) {
        field.ordinal = idx;
        self.fields[idx] = field;
    }

    #[inline]
    pub fn push(&mut self, field: Field) {
        let mut fields = std::mem::take(&mut self.fields);
        fields.push(field);
        *self = Schema::new(fields);
    }

    /// One deletion flag byte followed by all field bytes.
    #[inline]
    pub fn record_length(&self) -> usize {
        1 + self.fields.iter().map(|f| f.length as usize).sum::<usize>()
    }

    #[inline]
    pub fn header_length(&self) -> usize {
        32 + 32 * self.fields.len() + 1
    }

    /// Whether records of both schemas are laid out alike. Names and value
    /// types are not part of the layout.
    #[inline]
    pub fn same_layout(&self, other: &Schema) -> bool {
        self.fields.len() == other.fields.len()
            && self.fields.iter().zip(&other.fields).all(|(a, b)| {
                a.ty == b.ty && a.length == b.length && a.decimal_count == b.decimal_count
            })
    }

    /// Byte offset of each field within a record, deletion flag included.
    #[inline]
    pub fn offsets(&self) -> SmallVec<[usize; 16]> {
        let mut res = SmallVec::with_capacity(self.fields.len());
        let mut offset = 1;
        for f in &self.fields {
            res.push(offset);
            offset += f.length as usize;
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_value_type() {
        let cases = [
            (FieldType::Numeric, 2, 0, ValueType::Byte),
            (FieldType::Numeric, 4, 0, ValueType::Short),
            (FieldType::Numeric, 9, 0, ValueType::Int),
            (FieldType::Numeric, 18, 0, ValueType::Long),
            (FieldType::Numeric, 20, 0, ValueType::Decimal),
            (FieldType::Float, 6, 2, ValueType::Float),
            (FieldType::Numeric, 12, 3, ValueType::Double),
            (FieldType::Numeric, 19, 11, ValueType::Decimal),
            (FieldType::Character, 20, 0, ValueType::String),
            (FieldType::Logical, 1, 0, ValueType::Bool),
            (FieldType::Date, 8, 0, ValueType::Date),
        ];
        for (ty, len, dec, expected) in cases {
            assert_eq!(ty.initial_value_type(len, dec), expected, "{:?}({}, {})", ty, len, dec);
        }
    }

    #[test]
    fn test_field_invalid_decimal_count() {
        assert!(Field::numeric("AREA", 4, 5).is_err());
    }

    #[test]
    fn test_schema_layout() {
        let schema = Schema::new(vec![
            Field::character("NAME", 10).unwrap(),
            Field::numeric("POP", 9, 0).unwrap(),
            Field::date("BUILT").unwrap(),
        ]);
        assert_eq!(schema.record_length(), 28);
        assert_eq!(schema.header_length(), 32 + 96 + 1);
        assert_eq!(schema.offsets().as_slice(), &[1, 11, 20]);
        assert_eq!(schema.find("pop").unwrap(), 1);
        assert!(schema.find("missing").is_err());
    }

    #[test]
    fn test_same_layout() {
        let schema = Schema::new(vec![
            Field::character("NAME", 10).unwrap(),
            Field::numeric("POP", 9, 0).unwrap(),
        ]);
        let mut other = schema.clone();
        other.set_value_type(1, ValueType::Long);
        other.replace(0, Field::character("TITLE", 10).unwrap());
        assert!(schema.same_layout(&other));
        other.replace(1, Field::numeric("POP", 9, 2).unwrap());
        assert!(!schema.same_layout(&other));
        let mut longer = schema.clone();
        longer.push(Field::logical("PAVED").unwrap());
        assert!(!schema.same_layout(&longer));
    }

    #[test]
    fn test_schema_duplicate_names() {
        let schema = Schema::new(vec![
            Field::character("NAME", 10).unwrap(),
            Field::character("NAME", 10).unwrap(),
            Field::character("name", 10).unwrap(),
        ]);
        let names: Vec<_> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["NAME", "NAME1", "name2"]);
        assert_eq!(schema.field(2).ordinal, 2);
    }
}
