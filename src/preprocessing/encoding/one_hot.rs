//! One-hot encoding for categorical features.
//!
//! Transforms string categories to one-hot (dummy) encoded vectors.

use crate::preprocessing::encoding::{category_order, HandleUnknown, MISSING_CATEGORY_LABEL};
use crate::preprocessing::error::PreprocessingError;
use crate::preprocessing::frame::FeatureFrame;
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// One-hot encoder for categorical features.
///
/// Every column of the input frame is treated as a categorical feature, and
/// the encoder learns the distinct values (categories) present in each
/// column during fitting.
///
/// # Example
/// ```
/// use motovalue::preprocessing::{FeatureFrame, FittedTransformer, OneHotEncoder, Transformer};
///
/// let frame = FeatureFrame::new()
///     .with_categorical("seller_type", [Some("Individual"), Some("Dealer")])
///     .unwrap();
///
/// let fitted = OneHotEncoder::new().fit(&frame).unwrap();
/// let encoded = fitted.transform(&frame).unwrap();
///
/// // Categories are sorted: Dealer, Individual
/// assert_eq!(encoded.row(0).to_vec(), vec![0.0, 1.0]);
/// assert_eq!(encoded.row(1).to_vec(), vec![1.0, 0.0]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct OneHotEncoder {
    /// How to handle unknown categories during transform.
    handle_unknown: HandleUnknown,
}

impl OneHotEncoder {
    /// Create a new OneHotEncoder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the strategy for handling unknown categories.
    pub fn with_handle_unknown(mut self, strategy: HandleUnknown) -> Self {
        self.handle_unknown = strategy;
        self
    }
}

/// Serializable parameters for a fitted OneHotEncoder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OneHotEncoderParams {
    /// Input column names, in fit order.
    pub columns: Vec<String>,
    /// Categories (sorted distinct values) for each input column.
    pub categories_: Vec<Vec<Option<String>>>,
    /// Handle unknown strategy.
    pub handle_unknown: HandleUnknown,
}

/// Fitted OneHotEncoder ready for inference.
#[derive(Clone, Debug)]
pub struct FittedOneHotEncoder {
    /// Input column names, in fit order.
    columns: Vec<String>,
    /// Categories (sorted distinct values) for each input column.
    categories_: Vec<Vec<Option<String>>>,
    /// Number of categories per column.
    n_values_: Vec<usize>,
    /// Total number of output features (sum of n_values_).
    n_features_out: usize,
    handle_unknown: HandleUnknown,
}

impl FittedOneHotEncoder {
    fn from_parts(
        columns: Vec<String>,
        categories_: Vec<Vec<Option<String>>>,
        handle_unknown: HandleUnknown,
    ) -> Self {
        let n_values_: Vec<usize> = categories_.iter().map(Vec::len).collect();
        let n_features_out = n_values_.iter().sum();
        Self {
            columns,
            categories_,
            n_values_,
            n_features_out,
            handle_unknown,
        }
    }

    /// Get the categories learned for each column.
    pub fn categories(&self) -> &[Vec<Option<String>>] {
        &self.categories_
    }

    /// Get the input column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Get the number of categories per input column.
    pub fn n_values(&self) -> &[usize] {
        &self.n_values_
    }

    /// Unknown category handling this encoder was fitted with.
    pub fn handle_unknown(&self) -> HandleUnknown {
        self.handle_unknown
    }
}

impl Transformer for OneHotEncoder {
    type Input = FeatureFrame;
    type Output = Array2<f64>;
    type Params = OneHotEncoderParams;
    type Fitted = FittedOneHotEncoder;

    fn fit(&self, data: &Self::Input) -> Result<Self::Fitted, PreprocessingError> {
        if data.n_rows() == 0 {
            return Err(PreprocessingError::EmptyData(
                "Cannot fit OneHotEncoder on empty data".to_string(),
            ));
        }

        let mut columns = Vec::with_capacity(data.n_columns());
        let mut categories_ = Vec::with_capacity(data.n_columns());

        for (name, column) in data.iter() {
            let values = column.as_categorical(name)?;

            let mut col_cats: Vec<Option<String>> = values.to_vec();
            col_cats.sort_by(category_order);
            col_cats.dedup();

            columns.push(name.to_string());
            categories_.push(col_cats);
        }

        Ok(FittedOneHotEncoder::from_parts(
            columns,
            categories_,
            self.handle_unknown,
        ))
    }
}

impl FittedTransformer for FittedOneHotEncoder {
    type Input = FeatureFrame;
    type Output = Array2<f64>;
    type Params = OneHotEncoderParams;

    fn transform(&self, data: &Self::Input) -> Result<Self::Output, PreprocessingError> {
        let rows = data.n_rows();
        let mut result = Array2::<f64>::zeros((rows, self.n_features_out));

        let mut out_col_offset = 0;
        for (col, name) in self.columns.iter().enumerate() {
            let values = data.column(name)?.as_categorical(name)?;
            let cats = &self.categories_[col];

            for (row, value) in values.iter().enumerate() {
                match cats.binary_search_by(|c| category_order(c, value)) {
                    Ok(idx) => {
                        result[[row, out_col_offset + idx]] = 1.0;
                    }
                    Err(_) => {
                        if self.handle_unknown == HandleUnknown::Error {
                            return Err(PreprocessingError::UnknownCategory {
                                column: name.clone(),
                                value: value.clone(),
                            });
                        }
                        // With Ignore, leave the block as zeros
                    }
                }
            }

            out_col_offset += self.n_values_[col];
        }

        Ok(result)
    }

    fn extract_params(&self) -> Self::Params {
        OneHotEncoderParams {
            columns: self.columns.clone(),
            categories_: self.categories_.clone(),
            handle_unknown: self.handle_unknown,
        }
    }

    fn from_params(params: Self::Params) -> Result<Self, PreprocessingError> {
        if params.columns.len() != params.categories_.len() {
            return Err(PreprocessingError::SerializationError(format!(
                "OneHotEncoder params list {} columns but {} vocabularies",
                params.columns.len(),
                params.categories_.len()
            )));
        }
        let mut categories_ = params.categories_;
        for cats in categories_.iter_mut() {
            cats.sort_by(category_order);
            cats.dedup();
        }
        Ok(FittedOneHotEncoder::from_parts(
            params.columns,
            categories_,
            params.handle_unknown,
        ))
    }

    fn n_features_in(&self) -> usize {
        self.columns.len()
    }

    fn n_features_out(&self) -> usize {
        self.n_features_out
    }

    fn feature_names_out(&self) -> Vec<String> {
        self.columns
            .iter()
            .zip(self.categories_.iter())
            .flat_map(|(name, cats)| {
                cats.iter().map(move |cat| {
                    format!(
                        "{}={}",
                        name,
                        cat.as_deref().unwrap_or(MISSING_CATEGORY_LABEL)
                    )
                })
            })
            .collect()
    }
}
