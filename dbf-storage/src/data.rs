//! In-memory table of materialized rows.
use crate::error::{Error, Result};
use crate::field::{Field, Schema};
use dbf_datatype::{Column, Value, ValueType};

/// Cell which could not be converted when its column was widened.
/// The cell is null afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionFailure {
    pub row: usize,
    pub field: String,
    pub text: String,
}

/// Columnar table owning its own copy of the schema.
///
/// Value types of the schema always equal the types of the columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    schema: Schema,
    columns: Vec<Column>,
    rows: usize,
    failures: Vec<ConversionFailure>,
}

impl DataTable {
    #[inline]
    pub fn new(schema: Schema) -> Self {
        Self::with_capacity(schema, 0)
    }

    #[inline]
    pub fn with_capacity(schema: Schema, rows: usize) -> Self {
        let columns = schema
            .fields()
            .iter()
            .map(|f| Column::with_capacity(f.value_type, rows))
            .collect();
        DataTable {
            schema,
            columns,
            rows: 0,
            failures: vec![],
        }
    }

    #[inline]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn column(&self, idx: usize) -> &Column {
        &self.columns[idx]
    }

    #[inline]
    pub fn column_by_name(&self, name: &str) -> Result<&Column> {
        let idx = self.schema.find(name)?;
        Ok(&self.columns[idx])
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Value {
        self.columns[col].get(row)
    }

    #[inline]
    pub fn row(&self, row: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c.get(row)).collect()
    }

    #[inline]
    pub fn rows(&self) -> impl Iterator<Item = Vec<Value>> + '_ {
        (0..self.rows).map(move |r| self.row(r))
    }

    /// Conversion failures collected while widening columns.
    #[inline]
    pub fn failures(&self) -> &[ConversionFailure] {
        &self.failures
    }

    /// Append a row. Missing trailing values are null.
    /// On error the table is left as it was.
    pub fn push_row(&mut self, values: Vec<Value>) -> Result<()> {
        let mut values = values.into_iter();
        for col in 0..self.columns.len() {
            let v = values.next().unwrap_or_default();
            if let Err(e) = self.columns[col].push(v) {
                self.truncate(self.rows);
                return Err(e.into());
            }
        }
        self.rows += 1;
        Ok(())
    }

    /// Overwrite a row. Missing trailing values are null.
    /// On error the row is left as it was.
    pub fn set_row(&mut self, row: usize, values: &[Value]) -> Result<()> {
        if row >= self.rows {
            return Err(Error::RowOutOfBound(row));
        }
        for (c, v) in self.columns.iter().zip(values) {
            Column::new(c.ty()).push(v.clone())?;
        }
        for (col, c) in self.columns.iter_mut().enumerate() {
            let v = values.get(col).cloned().unwrap_or_default();
            c.set(row, v)?;
        }
        Ok(())
    }

    /// Check that every value can be stored, allowing numeric columns to
    /// widen along their ladder. Nothing is changed.
    ///
    /// A row passing the check is accepted by [`DataTable::widen_to_fit`]
    /// followed by [`DataTable::push_row`] or [`DataTable::set_row`].
    pub fn check_row(&self, values: &[Value]) -> Result<()> {
        for (c, v) in self.columns.iter().zip(values) {
            let mut ty = c.ty();
            let err = match Column::new(ty).push(v.clone()) {
                Ok(()) => continue,
                Err(e) => e,
            };
            let mut widened = false;
            if ty.is_numeric() {
                while let Some(next) = ty.widen() {
                    ty = next;
                    if fits(ty, v) {
                        widened = true;
                        break;
                    }
                }
            }
            if !widened {
                return Err(err.into());
            }
        }
        Ok(())
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: Value) -> Result<()> {
        if row >= self.rows {
            return Err(Error::RowOutOfBound(row));
        }
        self.columns[col].set(row, value)?;
        Ok(())
    }

    #[inline]
    pub fn remove_row(&mut self, row: usize) -> Result<()> {
        if row >= self.rows {
            return Err(Error::RowOutOfBound(row));
        }
        for c in &mut self.columns {
            c.remove(row);
        }
        self.rows -= 1;
        Ok(())
    }

    /// Append a new column filled with nulls.
    #[inline]
    pub fn add_column(&mut self, field: Field) {
        let mut col = Column::with_capacity(field.value_type, self.rows);
        for _ in 0..self.rows {
            col.push_null();
        }
        self.schema.push(field);
        self.columns.push(col);
    }

    /// Copy given rows into a new table with the same schema.
    pub fn select(&self, rows: &[usize]) -> Result<DataTable> {
        let mut res = DataTable::with_capacity(self.schema.clone(), rows.len());
        for &r in rows {
            if r >= self.rows {
                return Err(Error::RowOutOfBound(r));
            }
            res.push_row(self.row(r))?;
        }
        Ok(res)
    }

    /// Widen column to a new value type.
    ///
    /// Every materialized cell is converted through its text form. Cells
    /// that fail are nulled and recorded as conversion failures.
    pub fn widen_column(&mut self, col: usize, ty: ValueType) {
        let old = &self.columns[col];
        let (new, failed) = old.retype(ty);
        let name = self.schema.field(col).name.clone();
        log::warn!(
            "widen column {} from {} to {} at row {}",
            name,
            old.ty().to_lower(),
            ty.to_lower(),
            old.len()
        );
        for row in failed {
            let text = old.text(row).unwrap_or_default();
            log::warn!("cannot convert row {} of column {}: '{}'", row, name, text);
            self.failures.push(ConversionFailure {
                row,
                field: name.clone(),
                text,
            });
        }
        self.columns[col] = new;
        self.schema.set_value_type(col, ty);
    }

    /// Widen numeric columns whose current type cannot hold given values.
    pub fn widen_to_fit(&mut self, values: &[Value]) {
        for (col, v) in values.iter().enumerate().take(self.columns.len()) {
            let mut ty = self.columns[col].ty();
            if v.is_null() || !ty.is_numeric() || fits(ty, v) {
                continue;
            }
            while let Some(next) = ty.widen() {
                ty = next;
                if fits(ty, v) {
                    self.widen_column(col, ty);
                    break;
                }
            }
        }
    }

    #[inline]
    pub(crate) fn push_cell(&mut self, col: usize, value: Value) -> Result<()> {
        self.columns[col].push(value)?;
        Ok(())
    }

    #[inline]
    pub(crate) fn commit_row(&mut self) {
        self.rows += 1;
    }

    #[inline]
    pub(crate) fn truncate(&mut self, rows: usize) {
        for c in &mut self.columns {
            c.truncate(rows);
        }
        self.rows = rows;
    }
}

#[inline]
fn fits(ty: ValueType, value: &Value) -> bool {
    Column::new(ty).push(value.clone()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widen_to_fit() {
        let mut t = table();
        t.push_row(vec![Value::from("a"), Value::I64(7)]).unwrap();
        let values = vec![Value::from("b"), Value::I64(-70000)];
        t.widen_to_fit(&values);
        assert_eq!(t.schema().field(1).value_type, ValueType::Int);
        t.push_row(values).unwrap();
        assert_eq!(t.get(0, 1), Value::I64(7));
        assert_eq!(t.get(1, 1), Value::I64(-70000));
    }

    fn table() -> DataTable {
        DataTable::new(Schema::new(vec![
            Field::character("NAME", 10).unwrap(),
            Field::numeric("CODE", 3, 0).unwrap().with_value_type(ValueType::Byte),
        ]))
    }

    #[test]
    fn test_push_and_remove_rows() {
        let mut t = table();
        t.push_row(vec![Value::from("a"), Value::I64(1)]).unwrap();
        t.push_row(vec![Value::from("b")]).unwrap();
        // 300 does not fit the byte column, nothing is appended
        assert!(t.push_row(vec![Value::from("c"), Value::I64(300)]).is_err());
        assert_eq!(t.num_rows(), 2);
        assert_eq!(t.column(0).len(), 2);
        assert_eq!(t.row(1), vec![Value::from("b"), Value::Null]);
        t.remove_row(0).unwrap();
        assert_eq!(t.num_rows(), 1);
        assert_eq!(t.get(0, 0), Value::from("b"));
        assert!(t.remove_row(1).is_err());
    }

    #[test]
    fn test_widen_column_updates_schema() {
        let mut t = table();
        t.push_row(vec![Value::from("a"), Value::I64(10)]).unwrap();
        t.push_row(vec![Value::from("b"), Value::I64(20)]).unwrap();
        t.widen_column(1, ValueType::Short);
        assert_eq!(t.schema().field(1).value_type, ValueType::Short);
        assert_eq!(t.schema().field(1).length, 3);
        assert_eq!(t.column(1).ty(), ValueType::Short);
        t.push_row(vec![Value::from("c"), Value::I64(300)]).unwrap();
        let codes: Vec<_> = t.rows().map(|r| r[1].clone()).collect();
        assert_eq!(codes, vec![Value::I64(10), Value::I64(20), Value::I64(300)]);
        assert!(t.failures().is_empty());
    }

    #[test]
    fn test_failed_set_row_keeps_row() {
        let mut t = DataTable::new(Schema::new(vec![
            Field::character("NAME", 10).unwrap(),
            Field::date("FOUNDED").unwrap(),
        ]));
        let founded = Value::from("2000-01-01").as_date().map(Value::Date).unwrap();
        t.push_row(vec![Value::from("a"), founded.clone()]).unwrap();
        let bad = vec![Value::from("changed"), Value::from("notadate")];
        assert!(t.check_row(&bad).is_err());
        assert!(t.set_row(0, &bad).is_err());
        assert_eq!(t.row(0), vec![Value::from("a"), founded]);
        assert!(t.check_row(&[Value::from("b"), Value::Bool(true)]).is_err());
    }

    #[test]
    fn test_check_row_allows_widening() {
        let t = table();
        assert!(t.check_row(&[Value::from("a"), Value::I64(300)]).is_ok());
        assert!(t.check_row(&[Value::from("a"), Value::from("x1")]).is_ok());
        assert!(t.check_row(&[Value::from("a"), Value::Bool(true)]).is_ok());
        assert!(t.check_row(&[Value::from("a")]).is_ok());
    }

    #[test]
    fn test_select_and_add_column() {
        let mut t = table();
        for (i, n) in ["a", "b", "c"].iter().enumerate() {
            t.push_row(vec![Value::from(*n), Value::I64(i as i64)]).unwrap();
        }
        let s = t.select(&[2, 0]).unwrap();
        assert_eq!(s.num_rows(), 2);
        assert_eq!(s.get(0, 0), Value::from("c"));
        assert_eq!(s.get(1, 0), Value::from("a"));
        t.add_column(Field::logical("FLAG").unwrap());
        assert_eq!(t.num_columns(), 3);
        assert_eq!(t.get(2, 2), Value::Null);
        t.set(2, 2, Value::Bool(true)).unwrap();
        assert_eq!(t.get(2, 2), Value::Bool(true));
    }
}
