//! Price estimation pipeline: categorical encoding followed by a random forest.
//!
//! [`PriceEstimator`] is the unfitted pipeline. Fitting it on a listings
//! [`FeatureFrame`] yields a [`FitOutcome`] holding the fitted
//! [`PricePipeline`] together with the encoded column names and their
//! importances. The fitted pipeline is immutable: it predicts, reports
//! importances and round-trips through a single bincode file.

use crate::dataset::{
    DatasetError, ListingFeatures, ListingTable, CATEGORICAL_FEATURES, EX_SHOWROOM_PRICE,
    FEATURE_COLUMNS, KM_DRIVEN, NAME, NUMERIC_FEATURES, OWNER, SELLER_TYPE, YEAR,
};
use crate::metrics::{Metrics, RegressionMetrics};
use crate::model::{
    Fitted, ForestConfig, ForestParams, InferenceModel, ModelError, RandomForest,
    RandomForestRegressor,
};
use crate::preprocessing::{
    ColumnSpec, ColumnTransformer, ColumnTransformerParams, FeatureFrame,
    FittedColumnTransformer, FittedTransformer, HandleUnknown, OneHotEncoder,
    PreprocessingError, Remainder, Transformer,
};
use crate::serialization::SerializableParams;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised by the price pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Preprocessing error: {0}")]
    Preprocessing(#[from] PreprocessingError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// A prediction record lacks a required field.
    #[error("Missing field '{0}'")]
    MissingField(String),

    /// A numeric field does not hold a finite number.
    #[error("Invalid value {value:?} for field '{field}'")]
    InvalidField { field: String, value: String },

    /// A loaded artifact is internally inconsistent.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Importance of one encoded column.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub column: String,
    pub weight: f64,
}

/// Result of [`PriceEstimator::fit`].
#[derive(Clone, Debug)]
pub struct FitOutcome {
    pub pipeline: PricePipeline,
    /// Encoded column names, in design-matrix order.
    pub encoded_column_names: Vec<String>,
    /// Importances sorted by descending weight.
    pub per_column_importance: Vec<FeatureImportance>,
}

/// Unfitted price pipeline.
///
/// # Example
/// ```
/// use motovalue::dataset::ListingLoader;
/// use motovalue::pipeline::PriceEstimator;
///
/// let csv = "\
/// name,year,selling_price,km_driven,seller_type,owner,ex_showroom_price
/// A,2015,40000,10000,individual,1st,50000
/// A,2018,52000,5000,dealer,1st,60000
/// B,2010,20000,40000,individual,2nd,45000
/// ";
/// let (table, _) = ListingLoader::new().load_from_reader(csv.as_bytes()).unwrap();
/// let outcome = PriceEstimator::new().with_n_trees(10).fit_table(&table).unwrap();
///
/// assert_eq!(outcome.encoded_column_names.len(), 9);
/// let prices = outcome.pipeline.predict(&table.features()).unwrap();
/// assert_eq!(prices.len(), 3);
/// ```
#[derive(Clone, Debug, Default)]
pub struct PriceEstimator {
    forest: ForestConfig,
}

impl PriceEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_forest_config(mut self, forest: ForestConfig) -> Self {
        self.forest = forest;
        self
    }

    pub fn with_n_trees(mut self, n_trees: usize) -> Self {
        self.forest.n_trees = n_trees;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.forest.seed = seed;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.forest.n_jobs = n_jobs;
        self
    }

    pub fn forest_config(&self) -> &ForestConfig {
        &self.forest
    }

    /// Fit on a cleaned listings table.
    pub fn fit_table(&self, table: &ListingTable) -> Result<FitOutcome, PipelineError> {
        self.fit(&table.features(), &table.targets())
    }

    /// Fit the encoder and the forest on `features` and aligned `targets`.
    ///
    /// Columns of `features` beyond the six listing features are ignored.
    ///
    /// # Errors
    /// - [`ModelError::EmptyData`] for a frame without rows.
    /// - [`ModelError::LengthMismatch`] when `targets` is not aligned.
    /// - [`ModelError::NonFiniteTarget`] for a NaN or infinite target.
    /// - [`PreprocessingError::MissingColumn`] naming an absent feature column.
    /// - [`PipelineError::InvalidField`] for a non-finite numeric feature.
    pub fn fit(&self, features: &FeatureFrame, targets: &[f64]) -> Result<FitOutcome, PipelineError> {
        let n_rows = features.n_rows();
        if n_rows == 0 {
            return Err(ModelError::EmptyData("Cannot fit on an empty frame".to_string()).into());
        }
        if n_rows != targets.len() {
            return Err(ModelError::LengthMismatch {
                rows: n_rows,
                targets: targets.len(),
            }
            .into());
        }
        if let Some((row, &value)) = targets.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ModelError::NonFiniteTarget { row, value }.into());
        }

        let columns: Vec<String> = FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect();
        let frame = features.select(&columns)?;
        check_numeric_finite(&frame)?;

        info!(n_rows, n_trees = self.forest.n_trees, "fitting price pipeline");

        let preprocessor = ColumnTransformer::new()
            .add_one_hot_encoder(
                OneHotEncoder::new().with_handle_unknown(HandleUnknown::Ignore),
                ColumnSpec::names(&CATEGORICAL_FEATURES),
            )
            .with_remainder(Remainder::Passthrough)
            .fit(&frame)?;
        let x = preprocessor.transform(&frame)?;
        debug!(encoded_columns = x.ncols(), "listings encoded");

        let model = RandomForestRegressor::new(self.forest.clone()).fit(&x, targets)?;
        let feature_names = preprocessor.feature_names_out();

        let pipeline = PricePipeline {
            preprocessor,
            model,
            feature_names,
        };
        let per_column_importance = pipeline.feature_importance();

        info!(
            encoded_columns = pipeline.feature_names.len(),
            "price pipeline fitted"
        );

        Ok(FitOutcome {
            encoded_column_names: pipeline.feature_names.clone(),
            per_column_importance,
            pipeline,
        })
    }
}

/// Reject NaN and infinite values in the numeric feature columns.
fn check_numeric_finite(frame: &FeatureFrame) -> Result<(), PipelineError> {
    for name in NUMERIC_FEATURES {
        let values = frame.column(name)?.as_numeric(name)?;
        if let Some(value) = values.iter().find(|v| !v.is_finite()) {
            return Err(PipelineError::InvalidField {
                field: name.to_string(),
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

/// Untyped prediction input: field name to raw text, as submitted by a form.
///
/// Blank categorical fields stand for a missing value; blank numeric fields
/// are invalid.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    fn categorical(&self, field: &str) -> Result<Option<String>, PipelineError> {
        let raw = self
            .get(field)
            .ok_or_else(|| PipelineError::MissingField(field.to_string()))?;
        let trimmed = raw.trim();
        Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
    }

    fn numeric(&self, field: &str) -> Result<f64, PipelineError> {
        let raw = self
            .get(field)
            .ok_or_else(|| PipelineError::MissingField(field.to_string()))?;
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| PipelineError::InvalidField {
                field: field.to_string(),
                value: raw.to_string(),
            })
    }

    /// Parse into typed listing features.
    ///
    /// # Errors
    /// - [`PipelineError::MissingField`] naming the first absent field.
    /// - [`PipelineError::InvalidField`] for a numeric field that does not parse.
    pub fn to_features(&self) -> Result<ListingFeatures, PipelineError> {
        Ok(ListingFeatures {
            name: self.categorical(NAME)?,
            year: self.numeric(YEAR)?,
            km_driven: self.numeric(KM_DRIVEN)?,
            seller_type: self.categorical(SELLER_TYPE)?,
            owner: self.categorical(OWNER)?,
            ex_showroom_price: self.numeric(EX_SHOWROOM_PRICE)?,
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Serializable parameters of a fitted [`PricePipeline`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PricePipelineParams {
    pub preprocessor: ColumnTransformerParams,
    pub forest: ForestParams,
    pub feature_names: Vec<String>,
}

/// Fitted price pipeline.
///
/// Safe to share across threads; every method takes `&self`.
#[derive(Clone, Debug)]
pub struct PricePipeline {
    preprocessor: FittedColumnTransformer,
    model: RandomForest<Fitted>,
    feature_names: Vec<String>,
}

impl PricePipeline {
    /// Encoded column names, in design-matrix order.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn preprocessor(&self) -> &FittedColumnTransformer {
        &self.preprocessor
    }

    pub fn forest(&self) -> &RandomForest<Fitted> {
        &self.model
    }

    /// Categories the encoder learned for a categorical column, missing last.
    pub fn known_categories(&self, column: &str) -> Option<&[Option<String>]> {
        let encoder = self.preprocessor.one_hot_for(column)?;
        let idx = encoder.columns().iter().position(|c| c == column)?;
        encoder.categories().get(idx).map(Vec::as_slice)
    }

    /// Encode listings with the fitted encoder.
    pub fn encode(&self, features: &FeatureFrame) -> Result<Array2<f64>, PipelineError> {
        check_numeric_finite(features)?;
        Ok(self.preprocessor.transform(features)?)
    }

    /// One estimated price per row of `features`.
    ///
    /// Categories unseen during fit encode as all zeros and never fail.
    pub fn predict(&self, features: &FeatureFrame) -> Result<Vec<f64>, PipelineError> {
        let x = self.encode(features)?;
        let prices = self.model.predict_batch(&x)?;
        debug!(rows = prices.len(), "predicted prices");
        Ok(prices.to_vec())
    }

    /// Estimated price of a single listing.
    pub fn predict_one(&self, features: &ListingFeatures) -> Result<f64, PipelineError> {
        self.predict(&features.to_frame())?
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::EmptyData("no prediction produced".to_string()).into())
    }

    /// Estimated price of an untyped record.
    pub fn predict_record(&self, record: &RawRecord) -> Result<f64, PipelineError> {
        self.predict_one(&record.to_features()?)
    }

    /// Output of every tree for one listing; their mean is [`predict_one`](Self::predict_one).
    pub fn tree_predictions(&self, features: &ListingFeatures) -> Result<Vec<f64>, PipelineError> {
        let x = self.encode(&features.to_frame())?;
        Ok(self.model.tree_predictions(x.row(0))?)
    }

    /// Importance of every encoded column, sorted by descending weight.
    /// Ties keep design-matrix order.
    pub fn feature_importance(&self) -> Vec<FeatureImportance> {
        let mut importance: Vec<FeatureImportance> = self
            .feature_names
            .iter()
            .zip(self.model.feature_importances())
            .map(|(column, weight)| FeatureImportance {
                column: column.clone(),
                weight,
            })
            .collect();
        importance.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        importance
    }

    /// The `k` most important encoded columns.
    pub fn top_features(&self, k: usize) -> Vec<FeatureImportance> {
        let mut importance = self.feature_importance();
        importance.truncate(k);
        importance
    }

    /// Metrics of the pipeline's predictions against known prices.
    pub fn evaluate(
        &self,
        features: &FeatureFrame,
        targets: &[f64],
    ) -> Result<RegressionMetrics, PipelineError> {
        let predictions = self.predict(features)?;
        if predictions.len() != targets.len() {
            return Err(ModelError::LengthMismatch {
                rows: predictions.len(),
                targets: targets.len(),
            }
            .into());
        }
        Ok(Metrics::calculate_all(targets, &predictions))
    }

    pub fn extract_params(&self) -> PricePipelineParams {
        PricePipelineParams {
            preprocessor: self.preprocessor.extract_params(),
            forest: self.model.extract_params(),
            feature_names: self.feature_names.clone(),
        }
    }

    /// Rebuild a pipeline, checking that encoder, forest and names agree.
    ///
    /// # Errors
    /// [`PipelineError::SchemaMismatch`] describing the first inconsistency.
    pub fn from_params(params: PricePipelineParams) -> Result<Self, PipelineError> {
        let preprocessor = FittedColumnTransformer::from_params(params.preprocessor)
            .map_err(|e| PipelineError::SchemaMismatch(e.to_string()))?;
        let model = RandomForest::<Fitted>::from_params(params.forest)
            .map_err(|e| PipelineError::SchemaMismatch(e.to_string()))?;

        let mut inputs = preprocessor.input_columns();
        inputs.sort_unstable();
        let mut expected = FEATURE_COLUMNS.to_vec();
        expected.sort_unstable();
        if inputs != expected {
            return Err(PipelineError::SchemaMismatch(format!(
                "encoder reads columns {:?}, expected {:?}",
                inputs, expected
            )));
        }

        let width = preprocessor.n_features_out();
        if model.n_features() != width || params.feature_names.len() != width {
            return Err(PipelineError::SchemaMismatch(format!(
                "encoder produces {} columns, forest expects {}, {} names stored",
                width,
                model.n_features(),
                params.feature_names.len()
            )));
        }
        if preprocessor.feature_names_out() != params.feature_names {
            return Err(PipelineError::SchemaMismatch(
                "stored column names differ from the encoder's output names".to_string(),
            ));
        }

        Ok(Self {
            preprocessor,
            model,
            feature_names: params.feature_names,
        })
    }

    /// Write the pipeline as a single bincode file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PipelineError> {
        let bytes = self
            .extract_params()
            .to_bytes()
            .map_err(|e| PipelineError::Serialization(e.to_string()))?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Read a pipeline written by [`save_to_file`](Self::save_to_file).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let bytes = std::fs::read(path)?;
        let params = PricePipelineParams::from_bytes(&bytes)
            .map_err(|e| PipelineError::Serialization(e.to_string()))?;
        Self::from_params(params)
    }
}
