//! Column bindings: positional fields to named, coerced variables.

use crate::config::ConfigError;
use crate::row::RowError;
use crate::value::{DataType, Value};

/// One bound column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBinding {
    /// `c1`, `c2`, ...
    pub name: String,
    /// Type from the column metadata
    pub declared: DataType,
    /// Type the field is actually coerced to
    pub effective: DataType,
}

impl ColumnBinding {
    /// Cast expression shown for this column, e.g. `float(c2)`
    pub fn cast_expression(&self) -> String {
        format!("{}({})", self.effective, self.name)
    }
}

/// Ordered column bindings for a run; immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    columns: Vec<ColumnBinding>,
}

impl Binding {
    /// Build bindings `c1..cN` from the declared column types.
    ///
    /// When results are not rounded, `int` columns are read as `float` so
    /// intermediate arithmetic is not truncated.
    pub fn build<S: AsRef<str>>(
        column_count: usize,
        declared_types: &[S],
        round_result: bool,
    ) -> Result<Self, ConfigError> {
        if declared_types.len() != column_count {
            return Err(ConfigError::SchemaMismatch {
                column_count,
                type_count: declared_types.len(),
            });
        }

        let columns = declared_types
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let name = name.as_ref().trim();
                let declared =
                    DataType::from_name(name).ok_or_else(|| ConfigError::UnknownColumnType {
                        column: i + 1,
                        name: name.to_string(),
                    })?;
                let effective = match declared {
                    DataType::Int if !round_result => DataType::Float,
                    other => other,
                };
                Ok(ColumnBinding {
                    name: format!("c{}", i + 1),
                    declared,
                    effective,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnBinding] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn cast_expressions(&self) -> Vec<String> {
        self.columns.iter().map(ColumnBinding::cast_expression).collect()
    }

    /// 0-based index of a bound column name; only the exact `c<k>` form matches
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let digits = name.strip_prefix('c')?;
        if digits.is_empty()
            || digits.starts_with('0')
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let k = digits.parse::<usize>().ok()?;
        (1..=self.columns.len()).contains(&k).then(|| k - 1)
    }

    /// Split a row into exactly N tab-separated fields and coerce each one
    pub fn bind(&self, line: &str) -> Result<Vec<Value>, RowError> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != self.columns.len() {
            return Err(RowError::FieldCount {
                expected: self.columns.len(),
                actual: fields.len(),
            });
        }

        fields
            .iter()
            .zip(&self.columns)
            .map(|(field, column)| {
                column
                    .effective
                    .coerce(field)
                    .ok_or_else(|| RowError::Coercion {
                        column: column.name.clone(),
                        expected: column.effective,
                        field: field.to_string(),
                    })
            })
            .collect()
    }
}
