//! ColumnTransformer implementation.
//!
//! Applies different transformers to different column subsets and concatenates results.

use crate::preprocessing::encoding::{FittedOneHotEncoder, OneHotEncoder, OneHotEncoderParams};
use crate::preprocessing::error::PreprocessingError;
use crate::preprocessing::frame::FeatureFrame;
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use ndarray::{concatenate, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Specifies which columns a transformer should be applied to.
#[derive(Clone, Debug)]
pub enum ColumnSpec {
    /// Apply to the named columns, in this order.
    Names(Vec<String>),
    /// Apply to all columns of the frame seen during fit.
    All,
}

impl ColumnSpec {
    /// Convenience constructor from string slices.
    pub fn names(names: &[&str]) -> Self {
        ColumnSpec::Names(names.iter().map(|n| n.to_string()).collect())
    }

    /// Resolve the column spec to actual column names.
    fn resolve(&self, data: &FeatureFrame) -> Vec<String> {
        match self {
            ColumnSpec::Names(names) => names.clone(),
            ColumnSpec::All => data.column_names().to_vec(),
        }
    }
}

/// What happens to columns not claimed by any step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Remainder {
    /// Unclaimed columns are left out of the output.
    #[default]
    Drop,
    /// Unclaimed columns are appended unchanged, in frame order.
    Passthrough,
}

/// Enum of unfitted transformers that can be used in a ColumnTransformer.
#[derive(Clone, Debug)]
pub enum ColumnTransformerStep {
    OneHotEncoder(OneHotEncoder),
    /// Copy numeric columns unchanged.
    Passthrough,
}

/// Numeric columns copied unchanged into the output.
#[derive(Clone, Debug)]
pub struct FittedPassthrough {
    columns: Vec<String>,
}

impl FittedPassthrough {
    fn transform(&self, data: &FeatureFrame) -> Result<Array2<f64>, PreprocessingError> {
        let mut result = Array2::<f64>::zeros((data.n_rows(), self.columns.len()));
        for (col, name) in self.columns.iter().enumerate() {
            let values = data.column(name)?.as_numeric(name)?;
            for (row, &value) in values.iter().enumerate() {
                result[[row, col]] = value;
            }
        }
        Ok(result)
    }
}

/// Enum of fitted transformers for ColumnTransformer.
#[derive(Clone, Debug)]
pub enum FittedColumnTransformerStep {
    OneHotEncoder(FittedOneHotEncoder),
    Passthrough(FittedPassthrough),
}

impl FittedColumnTransformerStep {
    /// Transform the data.
    fn transform(&self, data: &FeatureFrame) -> Result<Array2<f64>, PreprocessingError> {
        match self {
            FittedColumnTransformerStep::OneHotEncoder(t) => t.transform(data),
            FittedColumnTransformerStep::Passthrough(t) => t.transform(data),
        }
    }

    /// Get the step name.
    fn step_name(&self) -> &'static str {
        match self {
            FittedColumnTransformerStep::OneHotEncoder(_) => "OneHotEncoder",
            FittedColumnTransformerStep::Passthrough(_) => "Passthrough",
        }
    }

    /// Get the number of output features.
    fn n_features_out(&self) -> usize {
        match self {
            FittedColumnTransformerStep::OneHotEncoder(t) => t.n_features_out(),
            FittedColumnTransformerStep::Passthrough(t) => t.columns.len(),
        }
    }

    fn feature_names_out(&self) -> Vec<String> {
        match self {
            FittedColumnTransformerStep::OneHotEncoder(t) => t.feature_names_out(),
            FittedColumnTransformerStep::Passthrough(t) => t.columns.clone(),
        }
    }
}

/// Fit a column transformer step from an unfitted step.
fn fit_step(
    step: &ColumnTransformerStep,
    data: &FeatureFrame,
) -> Result<FittedColumnTransformerStep, PreprocessingError> {
    match step {
        ColumnTransformerStep::OneHotEncoder(t) => {
            t.fit(data).map(FittedColumnTransformerStep::OneHotEncoder)
        }
        ColumnTransformerStep::Passthrough => {
            for (name, column) in data.iter() {
                column.as_numeric(name)?;
            }
            Ok(FittedColumnTransformerStep::Passthrough(FittedPassthrough {
                columns: data.column_names().to_vec(),
            }))
        }
    }
}

/// ColumnTransformer applies different transformers to different columns.
///
/// This is useful for heterogeneous listing data: one-hot encode the
/// categorical columns and pass the numeric ones through unchanged.
///
/// # Example
/// ```
/// use motovalue::preprocessing::{
///     ColumnSpec, ColumnTransformer, FeatureFrame, FittedTransformer, HandleUnknown,
///     OneHotEncoder, Remainder, Transformer,
/// };
///
/// let frame = FeatureFrame::new()
///     .with_categorical("owner", [Some("1st owner"), Some("2nd owner")])
///     .unwrap()
///     .with_numeric("year", [2015.0, 2010.0])
///     .unwrap();
///
/// let ct = ColumnTransformer::new()
///     .add_one_hot_encoder(
///         OneHotEncoder::new().with_handle_unknown(HandleUnknown::Ignore),
///         ColumnSpec::names(&["owner"]),
///     )
///     .with_remainder(Remainder::Passthrough);
///
/// let fitted = ct.fit(&frame).unwrap();
/// assert_eq!(fitted.feature_names_out(), ["owner=1st owner", "owner=2nd owner", "year"]);
/// assert_eq!(fitted.transform(&frame).unwrap().row(1).to_vec(), vec![0.0, 1.0, 2010.0]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ColumnTransformer {
    steps: Vec<(ColumnSpec, ColumnTransformerStep)>,
    remainder: Remainder,
}

impl ColumnTransformer {
    /// Create a new empty ColumnTransformer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a OneHotEncoder for specified columns.
    pub fn add_one_hot_encoder(mut self, encoder: OneHotEncoder, spec: ColumnSpec) -> Self {
        self.steps
            .push((spec, ColumnTransformerStep::OneHotEncoder(encoder)));
        self
    }

    /// Pass the specified numeric columns through unchanged.
    pub fn add_passthrough(mut self, spec: ColumnSpec) -> Self {
        self.steps.push((spec, ColumnTransformerStep::Passthrough));
        self
    }

    /// Add a generic step.
    pub fn add(mut self, step: ColumnTransformerStep, spec: ColumnSpec) -> Self {
        self.steps.push((spec, step));
        self
    }

    /// Set how unclaimed columns are handled.
    pub fn with_remainder(mut self, remainder: Remainder) -> Self {
        self.remainder = remainder;
        self
    }

    /// Get the number of transformer steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Serializable parameters of one fitted step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StepKindParams {
    OneHotEncoder(OneHotEncoderParams),
    Passthrough,
}

/// Serializable parameters for fitted column transformer step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepParams {
    /// Columns this step was applied to.
    pub columns: Vec<String>,
    /// Step parameters.
    pub step: StepKindParams,
}

/// Serializable parameters for a fitted ColumnTransformer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnTransformerParams {
    /// Number of input columns.
    pub n_features_in: usize,
    /// Number of output features.
    pub n_features_out: usize,
    /// Step parameters.
    pub steps: Vec<StepParams>,
}

/// Fitted ColumnTransformer ready for inference.
#[derive(Clone, Debug)]
pub struct FittedColumnTransformer {
    /// Fitted steps with their column names.
    fitted_steps: Vec<(Vec<String>, FittedColumnTransformerStep)>,
    n_features_in: usize,
    n_features_out: usize,
}

impl FittedColumnTransformer {
    /// Get step names together with the columns each step consumes.
    pub fn step_names(&self) -> Vec<(&'static str, &[String])> {
        self.fitted_steps
            .iter()
            .map(|(cols, step)| (step.step_name(), cols.as_slice()))
            .collect()
    }

    /// Every input column the transformer reads, in step order.
    pub fn input_columns(&self) -> Vec<&str> {
        self.fitted_steps
            .iter()
            .flat_map(|(cols, _)| cols.iter().map(String::as_str))
            .collect()
    }

    /// The fitted one-hot encoder responsible for `column`, if any.
    pub fn one_hot_for(&self, column: &str) -> Option<&FittedOneHotEncoder> {
        self.fitted_steps.iter().find_map(|(cols, step)| match step {
            FittedColumnTransformerStep::OneHotEncoder(t) if cols.iter().any(|c| c == column) => {
                Some(t)
            }
            _ => None,
        })
    }
}

impl Transformer for ColumnTransformer {
    type Input = FeatureFrame;
    type Output = Array2<f64>;
    type Params = ColumnTransformerParams;
    type Fitted = FittedColumnTransformer;

    fn fit(&self, data: &Self::Input) -> Result<Self::Fitted, PreprocessingError> {
        if data.n_rows() == 0 {
            return Err(PreprocessingError::EmptyData(
                "Cannot fit ColumnTransformer on empty data".to_string(),
            ));
        }

        if self.steps.is_empty() && self.remainder == Remainder::Drop {
            return Err(PreprocessingError::InvalidParameter(
                "Cannot fit empty ColumnTransformer".to_string(),
            ));
        }

        let mut fitted_steps = Vec::with_capacity(self.steps.len() + 1);
        let mut claimed: Vec<String> = Vec::new();
        let mut n_features_out = 0;

        for (spec, step) in &self.steps {
            let columns = spec.resolve(data);

            for col in &columns {
                if claimed.contains(col) {
                    return Err(PreprocessingError::InvalidParameter(format!(
                        "Column '{}' is claimed by more than one step",
                        col
                    )));
                }
                claimed.push(col.clone());
            }

            let col_data = data.select(&columns)?;
            let fitted = fit_step(step, &col_data)?;

            n_features_out += fitted.n_features_out();
            fitted_steps.push((columns, fitted));
        }

        if self.remainder == Remainder::Passthrough {
            let rest: Vec<String> = data
                .column_names()
                .iter()
                .filter(|name| !claimed.contains(name))
                .cloned()
                .collect();
            if !rest.is_empty() {
                let fitted = fit_step(&ColumnTransformerStep::Passthrough, &data.select(&rest)?)?;
                n_features_out += fitted.n_features_out();
                claimed.extend(rest.iter().cloned());
                fitted_steps.push((rest, fitted));
            }
        }

        Ok(FittedColumnTransformer {
            fitted_steps,
            n_features_in: claimed.len(),
            n_features_out,
        })
    }
}

impl FittedTransformer for FittedColumnTransformer {
    type Input = FeatureFrame;
    type Output = Array2<f64>;
    type Params = ColumnTransformerParams;

    fn transform(&self, data: &Self::Input) -> Result<Self::Output, PreprocessingError> {
        let mut transformed_outputs = Vec::with_capacity(self.fitted_steps.len());

        for (_, step) in &self.fitted_steps {
            transformed_outputs.push(step.transform(data)?);
        }

        if transformed_outputs.is_empty() {
            return Ok(Array2::zeros((data.n_rows(), 0)));
        }

        // Concatenate all outputs horizontally
        let views: Vec<_> = transformed_outputs.iter().map(|t| t.view()).collect();
        concatenate(Axis(1), &views).map_err(|e| PreprocessingError::InvalidShape {
            expected: format!("{} aligned rows per step", data.n_rows()),
            got: e.to_string(),
        })
    }

    fn extract_params(&self) -> Self::Params {
        let steps = self
            .fitted_steps
            .iter()
            .map(|(columns, step)| StepParams {
                columns: columns.clone(),
                step: match step {
                    FittedColumnTransformerStep::OneHotEncoder(t) => {
                        StepKindParams::OneHotEncoder(t.extract_params())
                    }
                    FittedColumnTransformerStep::Passthrough(_) => StepKindParams::Passthrough,
                },
            })
            .collect();

        ColumnTransformerParams {
            n_features_in: self.n_features_in,
            n_features_out: self.n_features_out,
            steps,
        }
    }

    fn from_params(params: Self::Params) -> Result<Self, PreprocessingError> {
        let mut fitted_steps = Vec::with_capacity(params.steps.len());
        let mut n_features_out = 0;
        let mut n_features_in = 0;

        for step_params in params.steps {
            let step = match step_params.step {
                StepKindParams::OneHotEncoder(p) => {
                    if p.columns != step_params.columns {
                        return Err(PreprocessingError::SerializationError(format!(
                            "OneHotEncoder columns {:?} do not match step columns {:?}",
                            p.columns, step_params.columns
                        )));
                    }
                    FittedColumnTransformerStep::OneHotEncoder(FittedOneHotEncoder::from_params(p)?)
                }
                StepKindParams::Passthrough => {
                    FittedColumnTransformerStep::Passthrough(FittedPassthrough {
                        columns: step_params.columns.clone(),
                    })
                }
            };
            n_features_out += step.n_features_out();
            n_features_in += step_params.columns.len();
            fitted_steps.push((step_params.columns, step));
        }

        if n_features_out != params.n_features_out || n_features_in != params.n_features_in {
            return Err(PreprocessingError::FeatureMismatch {
                expected_features: params.n_features_out,
                got_features: n_features_out,
            });
        }

        Ok(FittedColumnTransformer {
            fitted_steps,
            n_features_in,
            n_features_out,
        })
    }

    fn n_features_in(&self) -> usize {
        self.n_features_in
    }

    fn n_features_out(&self) -> usize {
        self.n_features_out
    }

    fn feature_names_out(&self) -> Vec<String> {
        self.fitted_steps
            .iter()
            .flat_map(|(_, step)| step.feature_names_out())
            .collect()
    }
}
