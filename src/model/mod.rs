//! Regression models with compile-time state safety.
//!
//! A model starts out `Unfitted` (hyperparameters only) and becomes `Fitted`
//! (inference parameters only) through `fit`. Only fitted models implement
//! [`InferenceModel`].

pub mod error;
pub mod forest;
pub mod state;
pub mod tree;

pub use error::ModelError;
pub use forest::{
    ForestConfig, ForestParams, MaxFeatures, RandomForest, RandomForestRegressor,
    DEFAULT_N_TREES, LARGE_N_TREES,
};
pub use state::{Fitted, Unfitted};
pub use tree::{Node, RegressionTree};

/// Inference interface of a fitted model.
///
/// `extract_params` + `from_params` is a round-trip; the parameter
/// representation is plain data that goes through
/// [`SerializableParams`](crate::serialization::SerializableParams).
pub trait InferenceModel {
    type InputSingle;
    type OutputSingle;
    type InputBatch;
    type OutputBatch;
    type ParamsRepr;

    fn predict(&self, input: &Self::InputSingle) -> Self::OutputSingle;
    fn predict_batch(&self, input: &Self::InputBatch) -> Self::OutputBatch;

    fn extract_params(&self) -> Self::ParamsRepr;
    fn from_params(params: Self::ParamsRepr) -> Result<Self, ModelError>
    where
        Self: Sized;
}
