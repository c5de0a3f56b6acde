//! Random forest regression.
//!
//! This module implements a bagged ensemble of [`RegressionTree`]s with
//! compile-time state tracking:
//! - [`RandomForestRegressor`] = `RandomForest<Unfitted>`: configuration and `fit`.
//! - `RandomForest<Fitted>`: inference-only, serializable predictor.
//!
//! Every tree draws its bootstrap sample and its split candidates from its own
//! RNG, seeded from the forest seed and the tree index. Trees can therefore be
//! grown on any number of threads and in any order without changing the result.

use crate::model::error::ModelError;
use crate::model::tree::{RegressionTree, TreeLimits};
use crate::model::{Fitted, InferenceModel, Unfitted};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::{debug, info};

/// Default ensemble size.
pub const DEFAULT_N_TREES: usize = 100;

/// Ensemble size of the [`ForestConfig::large`] preset.
pub const LARGE_N_TREES: usize = 200;

/// How many encoded columns are drawn as split candidates at each node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Every column is a candidate.
    All,
    /// `sqrt(n_features)` columns.
    Sqrt,
    /// A fraction of the columns, in `(0, 1]`.
    Fraction(f64),
    /// A fixed number of columns (capped at `n_features`).
    Count(usize),
}

impl Default for MaxFeatures {
    fn default() -> Self {
        MaxFeatures::Fraction(1.0 / 3.0)
    }
}

impl MaxFeatures {
    /// Number of candidates for a matrix with `n_features` columns (at least 1).
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match *self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Count(k) => k,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Hyperparameters of a random forest.
///
/// Deserializes from partial JSON: absent fields keep their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees in the ensemble.
    pub n_trees: usize,
    /// Maximum tree depth; `None` grows until the other limits stop it.
    pub max_depth: Option<usize>,
    /// Minimum rows a node needs before it may be split.
    pub min_samples_split: usize,
    /// Minimum rows on each side of a split.
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Draw a bootstrap resample per tree (otherwise every tree sees all rows once).
    pub bootstrap: bool,
    pub seed: u64,
    /// Worker threads used to grow trees.
    pub n_jobs: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_N_TREES,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::default(),
            bootstrap: true,
            seed: 42,
            n_jobs: 1,
        }
    }
}

impl ForestConfig {
    /// The 200-tree preset.
    pub fn large() -> Self {
        Self {
            n_trees: LARGE_N_TREES,
            ..Self::default()
        }
    }

    /// Check every hyperparameter range.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_trees == 0 {
            return Err(ModelError::InvalidParameter(
                "n_trees must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(ModelError::InvalidParameter(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            )));
        }
        if self.min_samples_leaf == 0 {
            return Err(ModelError::InvalidParameter(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if self.max_depth == Some(0) {
            return Err(ModelError::InvalidParameter(
                "max_depth must be at least 1 when set".to_string(),
            ));
        }
        if self.n_jobs == 0 {
            return Err(ModelError::InvalidParameter(
                "n_jobs must be at least 1".to_string(),
            ));
        }
        match self.max_features {
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                Err(ModelError::InvalidParameter(format!(
                    "max_features fraction must be in (0, 1], got {}",
                    f
                )))
            }
            MaxFeatures::Count(0) => Err(ModelError::InvalidParameter(
                "max_features count must be at least 1".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// A random forest with state encoded at the type level.
///
/// - When `S = Unfitted`: holds a [`ForestConfig`] and offers `fit`.
/// - When `S = Fitted`: holds the trees and implements [`InferenceModel`].
#[derive(Clone, Debug)]
pub struct RandomForest<S> {
    config: ForestConfig,
    trees: Vec<RegressionTree>,
    n_features: usize,
    _state: PhantomData<S>,
}

/// Alias for an **unfitted** random forest.
pub type RandomForestRegressor = RandomForest<Unfitted>;

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(ForestConfig::default())
    }
}

impl RandomForestRegressor {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            n_features: 0,
            _state: PhantomData,
        }
    }

    pub fn with_n_trees(mut self, n_trees: usize) -> Self {
        self.config.n_trees = n_trees;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.config.min_samples_split = min_samples_split;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.config.min_samples_leaf = min_samples_leaf;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.config.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.config.bootstrap = bootstrap;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.config.n_jobs = n_jobs;
        self
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Fit the forest on an encoded design matrix and aligned targets.
    ///
    /// # Errors
    /// - [`ModelError::EmptyData`] for a matrix without rows or columns.
    /// - [`ModelError::LengthMismatch`] when `y` is not aligned with `x`.
    /// - [`ModelError::NonFiniteTarget`] for a NaN or infinite target.
    /// - [`ModelError::InvalidParameter`] for an invalid configuration.
    pub fn fit(&self, x: &Array2<f64>, y: &[f64]) -> Result<RandomForest<Fitted>, ModelError> {
        self.config.validate()?;
        let (n_rows, n_features) = x.dim();
        if n_rows == 0 {
            return Err(ModelError::EmptyData(
                "Cannot fit a forest without rows".to_string(),
            ));
        }
        if n_features == 0 {
            return Err(ModelError::EmptyData(
                "Cannot fit a forest without feature columns".to_string(),
            ));
        }
        if n_rows != y.len() {
            return Err(ModelError::LengthMismatch {
                rows: n_rows,
                targets: y.len(),
            });
        }
        if let Some((row, &value)) = y.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ModelError::NonFiniteTarget { row, value });
        }

        let limits = TreeLimits {
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf,
            max_features: self.config.max_features.resolve(n_features),
        };
        let n_trees = self.config.n_trees;
        let n_jobs = self.config.n_jobs.min(n_trees);

        info!(
            n_trees,
            n_rows,
            n_features,
            max_features = limits.max_features,
            n_jobs,
            "fitting random forest"
        );

        let x = x.view();
        let trees = if n_jobs <= 1 {
            (0..n_trees)
                .map(|idx| self.grow_tree(idx, x, y, &limits))
                .collect()
        } else {
            let chunk_size = n_trees.div_ceil(n_jobs);
            let mut slots: Vec<Option<RegressionTree>> = vec![None; n_trees];
            std::thread::scope(|scope| {
                for (chunk_idx, chunk) in slots.chunks_mut(chunk_size).enumerate() {
                    let limits = &limits;
                    scope.spawn(move || {
                        for (offset, slot) in chunk.iter_mut().enumerate() {
                            let idx = chunk_idx * chunk_size + offset;
                            *slot = Some(self.grow_tree(idx, x, y, limits));
                        }
                    });
                }
            });
            slots.into_iter().flatten().collect()
        };

        info!(n_trees, "random forest fitted");

        Ok(RandomForest {
            config: self.config.clone(),
            trees,
            n_features,
            _state: PhantomData,
        })
    }

    fn grow_tree(
        &self,
        idx: usize,
        x: ArrayView2<f64>,
        y: &[f64],
        limits: &TreeLimits,
    ) -> RegressionTree {
        let mut rng = tree_rng(self.config.seed, idx);
        let n_rows = x.nrows();
        let rows: Vec<usize> = if self.config.bootstrap {
            (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect()
        } else {
            (0..n_rows).collect()
        };
        let tree = RegressionTree::grow(x, y, rows, limits, &mut rng);
        debug!(
            tree = idx,
            nodes = tree.nodes().len(),
            depth = tree.depth(),
            "tree grown"
        );
        tree
    }
}

/// Per-tree RNG derived from the forest seed and the tree index.
fn tree_rng(seed: u64, idx: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ (idx as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

impl RandomForest<Fitted> {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Width of the encoded rows the forest was fitted on.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// The configuration the forest was grown with.
    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    fn check_width(&self, got: usize) -> Result<(), ModelError> {
        if got != self.n_features {
            return Err(ModelError::FeatureMismatch {
                expected: self.n_features,
                got,
            });
        }
        Ok(())
    }

    /// Output of every tree for one encoded row, in tree order.
    pub fn tree_predictions(&self, row: ArrayView1<f64>) -> Result<Vec<f64>, ModelError> {
        self.check_width(row.len())?;
        Ok(self.trees.iter().map(|t| t.predict_row(row)).collect())
    }

    fn predict_view(&self, row: ArrayView1<f64>) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        sum / self.trees.len() as f64
    }

    /// Normalized impurity-decrease importance per encoded column.
    ///
    /// Weights are non-negative and sum to 1. A forest without a single split
    /// (constant target) reports all zeros.
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_features];
        for tree in &self.trees {
            tree.accumulate_importances(&mut totals);
        }
        let total: f64 = totals.iter().sum();
        if total > 0.0 {
            for t in &mut totals {
                *t /= total;
            }
        }
        totals
    }
}

/// Serializable parameters of a fitted forest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForestParams {
    pub config: ForestConfig,
    pub n_features: usize,
    pub trees: Vec<RegressionTree>,
}

/// Inference for a fitted forest: the unweighted mean of all trees.
///
/// - Single-sample input: [`Array1<f64>`] → output: `f64`
/// - Batch input: [`Array2<f64>`] → output: [`Array1<f64>`]
///
/// Width mismatches are reported as [`ModelError::FeatureMismatch`].
impl InferenceModel for RandomForest<Fitted> {
    type InputSingle = Array1<f64>;
    type OutputSingle = Result<f64, ModelError>;
    type InputBatch = Array2<f64>;
    type OutputBatch = Result<Array1<f64>, ModelError>;
    type ParamsRepr = ForestParams;

    fn predict(&self, input: &Self::InputSingle) -> Self::OutputSingle {
        self.check_width(input.len())?;
        Ok(self.predict_view(input.view()))
    }

    fn predict_batch(&self, input: &Self::InputBatch) -> Self::OutputBatch {
        self.check_width(input.ncols())?;
        Ok(input
            .rows()
            .into_iter()
            .map(|row| self.predict_view(row))
            .collect())
    }

    fn extract_params(&self) -> Self::ParamsRepr {
        ForestParams {
            config: self.config.clone(),
            n_features: self.n_features,
            trees: self.trees.clone(),
        }
    }

    fn from_params(params: Self::ParamsRepr) -> Result<Self, ModelError> {
        if params.trees.is_empty() {
            return Err(ModelError::CorruptParams(
                "forest has no trees".to_string(),
            ));
        }
        for (idx, tree) in params.trees.iter().enumerate() {
            if tree.n_features() != params.n_features {
                return Err(ModelError::CorruptParams(format!(
                    "tree {} expects {} features, forest expects {}",
                    idx,
                    tree.n_features(),
                    params.n_features
                )));
            }
            tree.validate()?;
        }
        Ok(Self {
            config: params.config,
            trees: params.trees,
            n_features: params.n_features,
            _state: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn step_data() -> (Array2<f64>, Vec<f64>) {
        let x = Array2::from_shape_fn((40, 3), |(i, j)| match j {
            0 => i as f64,
            1 => ((i * 7) % 5) as f64,
            _ => 1.0,
        });
        let y = (0..40).map(|i| if i < 20 { 10.0 } else { 30.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::All.resolve(9), 9);
        assert_eq!(MaxFeatures::Sqrt.resolve(9), 3);
        assert_eq!(MaxFeatures::Fraction(1.0 / 3.0).resolve(10), 4);
        assert_eq!(MaxFeatures::Count(50).resolve(10), 10);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(10), 1);
    }

    #[test]
    fn test_config_defaults_and_preset() {
        let config = ForestConfig::default();
        assert_eq!(config.n_trees, 100);
        assert_eq!(config.seed, 42);
        assert!(config.bootstrap);
        assert!(config.validate().is_ok());
        assert_eq!(ForestConfig::large().n_trees, 200);
    }

    #[test]
    fn test_config_validation() {
        let bad = [
            ForestConfig {
                n_trees: 0,
                ..Default::default()
            },
            ForestConfig {
                min_samples_split: 1,
                ..Default::default()
            },
            ForestConfig {
                min_samples_leaf: 0,
                ..Default::default()
            },
            ForestConfig {
                max_depth: Some(0),
                ..Default::default()
            },
            ForestConfig {
                n_jobs: 0,
                ..Default::default()
            },
            ForestConfig {
                max_features: MaxFeatures::Fraction(1.5),
                ..Default::default()
            },
            ForestConfig {
                max_features: MaxFeatures::Count(0),
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(ModelError::InvalidParameter(_))),
                "{:?}",
                config
            );
        }
    }

    #[test]
    fn test_config_partial_json() {
        let config: ForestConfig = serde_json::from_str(r#"{"n_trees": 7}"#).unwrap();
        assert_eq!(config.n_trees, 7);
        assert_eq!(config.min_samples_leaf, 1);
    }

    #[test]
    fn test_forest_learns_step() {
        let (x, y) = step_data();
        let forest = RandomForestRegressor::default()
            .with_n_trees(25)
            .fit(&x, &y)
            .unwrap();

        assert_eq!(forest.n_trees(), 25);
        assert_eq!(forest.n_features(), 3);
        let low = forest.predict(&array![3.0, 1.0, 1.0]).unwrap();
        let high = forest.predict(&array![35.0, 1.0, 1.0]).unwrap();
        assert!(low < 15.0, "low = {}", low);
        assert!(high > 25.0, "high = {}", high);
    }

    #[test]
    fn test_forest_prediction_is_mean_of_trees() {
        let (x, y) = step_data();
        let forest = RandomForestRegressor::default()
            .with_n_trees(10)
            .fit(&x, &y)
            .unwrap();

        let row = array![19.5, 2.0, 1.0];
        let per_tree = forest.tree_predictions(row.view()).unwrap();
        assert_eq!(per_tree.len(), 10);
        let mean = per_tree.iter().sum::<f64>() / per_tree.len() as f64;
        assert_relative_eq!(forest.predict(&row).unwrap(), mean, epsilon = 1e-9);
    }

    #[test]
    fn test_forest_deterministic_for_seed() {
        let (x, y) = step_data();
        let a = RandomForestRegressor::default().with_n_trees(8).fit(&x, &y).unwrap();
        let b = RandomForestRegressor::default().with_n_trees(8).fit(&x, &y).unwrap();
        assert_eq!(a.trees(), b.trees());

        let c = RandomForestRegressor::default()
            .with_n_trees(8)
            .with_seed(7)
            .fit(&x, &y)
            .unwrap();
        assert_ne!(a.trees(), c.trees());
    }

    #[test]
    fn test_forest_n_jobs_invariant() {
        let (x, y) = step_data();
        let serial = RandomForestRegressor::default()
            .with_n_trees(9)
            .fit(&x, &y)
            .unwrap();
        let parallel = RandomForestRegressor::default()
            .with_n_trees(9)
            .with_n_jobs(4)
            .fit(&x, &y)
            .unwrap();
        assert_eq!(serial.trees(), parallel.trees());
        assert_eq!(
            serial.predict_batch(&x).unwrap(),
            parallel.predict_batch(&x).unwrap()
        );
    }

    #[test]
    fn test_forest_importances_normalized() {
        let (x, y) = step_data();
        let forest = RandomForestRegressor::default()
            .with_n_trees(20)
            .fit(&x, &y)
            .unwrap();
        let imp = forest.feature_importances();
        assert_eq!(imp.len(), 3);
        assert!(imp.iter().all(|&w| w >= 0.0));
        assert_relative_eq!(imp.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        // Constant column never splits.
        assert_eq!(imp[2], 0.0);
        assert!(imp[0] > imp[1]);
    }

    #[test]
    fn test_forest_constant_target_has_zero_importances() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = [5.0, 5.0, 5.0];
        let forest = RandomForestRegressor::default().with_n_trees(3).fit(&x, &y).unwrap();
        assert_eq!(forest.feature_importances(), vec![0.0]);
        assert_relative_eq!(forest.predict(&array![10.0]).unwrap(), 5.0);
    }

    #[test]
    fn test_forest_fit_errors() {
        let forest = RandomForestRegressor::default();
        let x = array![[1.0], [2.0]];

        assert!(matches!(
            forest.fit(&x, &[1.0]),
            Err(ModelError::LengthMismatch { rows: 2, targets: 1 })
        ));
        assert!(matches!(
            forest.fit(&x, &[1.0, f64::INFINITY]),
            Err(ModelError::NonFiniteTarget { row: 1, .. })
        ));
        assert!(matches!(
            forest.fit(&Array2::zeros((0, 1)), &[]),
            Err(ModelError::EmptyData(_))
        ));
        assert!(matches!(
            forest.clone().with_n_trees(0).fit(&x, &[1.0, 2.0]),
            Err(ModelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_forest_predict_width_mismatch() {
        let (x, y) = step_data();
        let forest = RandomForestRegressor::default().with_n_trees(2).fit(&x, &y).unwrap();
        assert_eq!(
            forest.predict(&array![1.0, 2.0]),
            Err(ModelError::FeatureMismatch {
                expected: 3,
                got: 2
            })
        );
    }

    #[test]
    fn test_forest_params_round_trip() {
        use crate::serialization::SerializableParams;

        let (x, y) = step_data();
        let forest = RandomForestRegressor::default().with_n_trees(4).fit(&x, &y).unwrap();

        let bytes = forest.extract_params().to_bytes().unwrap();
        let restored =
            RandomForest::<Fitted>::from_params(ForestParams::from_bytes(&bytes).unwrap()).unwrap();

        assert_eq!(restored.config(), forest.config());
        assert_eq!(
            restored.predict_batch(&x).unwrap(),
            forest.predict_batch(&x).unwrap()
        );
    }

    #[test]
    fn test_forest_from_params_rejects_width_disagreement() {
        let (x, y) = step_data();
        let forest = RandomForestRegressor::default().with_n_trees(2).fit(&x, &y).unwrap();
        let mut params = forest.extract_params();
        params.n_features = 5;
        assert!(matches!(
            RandomForest::<Fitted>::from_params(params),
            Err(ModelError::CorruptParams(_))
        ));

        let empty = ForestParams {
            config: ForestConfig::default(),
            n_features: 3,
            trees: vec![],
        };
        assert!(RandomForest::<Fitted>::from_params(empty).is_err());
    }
}
