//! Columnar feature table consumed by the transformers.
//!
//! A [`FeatureFrame`] holds named columns of equal length. Each column is
//! either categorical (`Option<String>`, `None` marks a missing value) or
//! numeric (`f64`). Columns are looked up by name, so the order in which a
//! caller assembles a frame does not matter to the transformers.

use crate::preprocessing::error::PreprocessingError;
use std::fmt;

/// Kind of values held by a [`Column`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Categorical,
    Numeric,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Categorical => write!(f, "categorical"),
            ColumnKind::Numeric => write!(f, "numeric"),
        }
    }
}

/// A single column of a [`FeatureFrame`].
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    /// String categories; `None` is a missing value.
    Categorical(Vec<Option<String>>),
    /// Finite or non-finite floating point values.
    Numeric(Vec<f64>),
}

impl Column {
    /// Number of rows in the column.
    pub fn len(&self) -> usize {
        match self {
            Column::Categorical(values) => values.len(),
            Column::Numeric(values) => values.len(),
        }
    }

    /// Check if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The kind of values held by this column.
    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Categorical(_) => ColumnKind::Categorical,
            Column::Numeric(_) => ColumnKind::Numeric,
        }
    }

    /// Borrow the categorical values, or report the kind mismatch for `name`.
    pub fn as_categorical(&self, name: &str) -> Result<&[Option<String>], PreprocessingError> {
        match self {
            Column::Categorical(values) => Ok(values),
            Column::Numeric(_) => Err(type_error(name, ColumnKind::Categorical, self.kind())),
        }
    }

    /// Borrow the numeric values, or report the kind mismatch for `name`.
    pub fn as_numeric(&self, name: &str) -> Result<&[f64], PreprocessingError> {
        match self {
            Column::Numeric(values) => Ok(values),
            Column::Categorical(_) => Err(type_error(name, ColumnKind::Numeric, self.kind())),
        }
    }
}

fn type_error(name: &str, expected: ColumnKind, got: ColumnKind) -> PreprocessingError {
    PreprocessingError::ColumnType {
        column: name.to_string(),
        expected: expected.to_string(),
        got: got.to_string(),
    }
}

/// Named columns of equal length.
///
/// # Example
/// ```
/// use motovalue::preprocessing::FeatureFrame;
///
/// let frame = FeatureFrame::new()
///     .with_categorical("seller_type", [Some("Individual"), Some("Dealer")])
///     .unwrap()
///     .with_numeric("year", [2015.0, 2018.0])
///     .unwrap();
///
/// assert_eq!(frame.n_rows(), 2);
/// assert_eq!(frame.column_names(), ["seller_type", "year"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureFrame {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl FeatureFrame {
    /// Create an empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column.
    ///
    /// # Errors
    /// - [`PreprocessingError::InvalidParameter`] if the name is already used.
    /// - [`PreprocessingError::InvalidShape`] if the column length differs
    ///   from the existing columns.
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        column: Column,
    ) -> Result<Self, PreprocessingError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(PreprocessingError::InvalidParameter(format!(
                "Duplicate column name '{}'",
                name
            )));
        }
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                return Err(PreprocessingError::InvalidShape {
                    expected: format!("{} rows in column '{}'", first.len(), name),
                    got: format!("{} rows", column.len()),
                });
            }
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(self)
    }

    /// Build a frame from columns the caller already knows to be aligned and
    /// uniquely named.
    pub(crate) fn from_aligned(columns: Vec<(&str, Column)>) -> Self {
        debug_assert!(columns.windows(2).all(|w| w[0].1.len() == w[1].1.len()));
        let (names, columns) = columns
            .into_iter()
            .map(|(name, column)| (name.to_string(), column))
            .unzip();
        Self { names, columns }
    }

    /// Append a categorical column.
    pub fn with_categorical<I, S>(
        self,
        name: impl Into<String>,
        values: I,
    ) -> Result<Self, PreprocessingError>
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let values = values.into_iter().map(|v| v.map(Into::into)).collect();
        self.with_column(name, Column::Categorical(values))
    }

    /// Append a numeric column.
    pub fn with_numeric<I>(self, name: impl Into<String>, values: I) -> Result<Self, PreprocessingError>
    where
        I: IntoIterator<Item = f64>,
    {
        self.with_column(name, Column::Numeric(values.into_iter().collect()))
    }

    /// Number of rows (0 for a frame without columns).
    pub fn n_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Check whether a column with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Look up a column by name.
    ///
    /// # Errors
    /// [`PreprocessingError::MissingColumn`] naming the absent column.
    pub fn column(&self, name: &str) -> Result<&Column, PreprocessingError> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| &self.columns[idx])
            .ok_or_else(|| PreprocessingError::MissingColumn(name.to_string()))
    }

    /// Build a new frame holding only the named columns, in the given order.
    pub fn select(&self, names: &[String]) -> Result<FeatureFrame, PreprocessingError> {
        let mut selected = FeatureFrame::new();
        for name in names {
            selected = selected.with_column(name.clone(), self.column(name)?.clone())?;
        }
        Ok(selected)
    }

    /// Iterate over `(name, column)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }
}
