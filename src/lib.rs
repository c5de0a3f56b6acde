//! # motovalue
//!
//! Resale price estimation for used motorcycles, with strict separation
//! between fitting and inference.
//!
//! ## Core Design Principles
//!
//! - **Stateful Type Safety**: Models carry their training state in the type system
//!   (`Unfitted` vs `Fitted`), so an untrained forest cannot predict.
//! - **Fit Once, Reuse Unchanged**: the fitted encoder and forest are immutable and
//!   round-trip through a single bincode file.
//! - **Rows, Not Errors**: listings that fail numeric cleaning are dropped and
//!   counted; categories never seen during fit encode as all zeros.
//!
//! ## Quick Start
//!
//! ```rust
//! use motovalue::dataset::{ListingFeatures, ListingLoader};
//! use motovalue::pipeline::PriceEstimator;
//!
//! let csv = "\
//! name,year,selling_price,km_driven,seller_type,owner,ex_showroom_price
//! A,2015,40000,10000,individual,1st,50000
//! A,2018,52000,5000,dealer,1st,60000
//! B,2010,20000,40000,individual,2nd,45000
//! C,2012,30000,unknown,individual,1st,47000
//! ";
//! let (table, report) = ListingLoader::new().load_from_reader(csv.as_bytes()).unwrap();
//! assert_eq!(report.dropped_numeric, 1);
//!
//! let outcome = PriceEstimator::new().fit_table(&table).unwrap();
//! let price = outcome
//!     .pipeline
//!     .predict_one(&ListingFeatures {
//!         name: Some("A".to_string()),
//!         year: 2016.0,
//!         km_driven: 8000.0,
//!         seller_type: Some("individual".to_string()),
//!         owner: Some("1st".to_string()),
//!         ex_showroom_price: 55000.0,
//!     })
//!     .unwrap();
//! assert!(price > 20000.0 && price < 52000.0);
//! ```
//!
//! ## Module Structure
//!
//! - `dataset` — Listing records, CSV loading and cleaning, descriptive summary
//! - `preprocessing` — Feature frames, one-hot encoding, column transformer
//! - `model` — Regression trees and the random forest with stateful type parameters
//! - `pipeline` — Encoder + forest composition, importances and persistence
//! - `config` — JSON training configuration
//! - `metrics` — Regression metrics
//! - `serialization` — Byte-level parameter persistence

/// Listing records, loading and summary statistics.
pub mod dataset;

/// Data preprocessing transformers.
pub mod preprocessing;

/// Regression models with compile-time state safety.
pub mod model;

/// The fitted price estimation pipeline.
pub mod pipeline;

/// Training configuration.
pub mod config;

/// Regression metrics.
pub mod metrics;

/// Model persistence utilities.
pub mod serialization;

pub use config::{ConfigError, TrainingConfig};
pub use dataset::{
    CategoricalPolicy, DatasetError, DatasetSummary, ListingFeatures, ListingLoader,
    ListingTable, LoadReport, LoaderConfig,
};
pub use metrics::{Metrics, RegressionMetrics};
pub use model::{ForestConfig, MaxFeatures, ModelError};
pub use pipeline::{
    FeatureImportance, FitOutcome, PipelineError, PriceEstimator, PricePipeline, RawRecord,
};
