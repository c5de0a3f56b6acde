//! Data preprocessing transformers for the pricing pipeline.
//!
//! Transformers follow the same fit/fitted split as the models in this crate:
//! an unfitted transformer carries hyperparameters, fitting it on a
//! [`FeatureFrame`] yields a fitted counterpart that can transform new rows
//! and be persisted.
//!
//! # Core Traits
//!
//! - [`Transformer`]: Unfitted transformer with hyperparameters
//! - [`FittedTransformer`]: Fitted transformer ready for inference
//!
//! # Available Transformers
//!
//! - [`OneHotEncoder`]: Indicator columns for string categories
//! - [`ColumnTransformer`]: Route column subsets to different steps and
//!   concatenate the results
//!
//! # Example
//!
//! ```ignore
//! use motovalue::preprocessing::{ColumnSpec, ColumnTransformer, OneHotEncoder, Remainder};
//!
//! let ct = ColumnTransformer::new()
//!     .add_one_hot_encoder(OneHotEncoder::new(), ColumnSpec::names(&["owner"]))
//!     .with_remainder(Remainder::Passthrough);
//!
//! let fitted = ct.fit(&training_frame)?;
//! let x = fitted.transform(&new_frame)?;
//! fitted.save_to_file("preprocessor.bin")?;
//! ```

pub mod column_transformer;
pub mod encoding;
pub mod error;
pub mod frame;
pub mod traits;

pub use column_transformer::{
    ColumnSpec, ColumnTransformer, ColumnTransformerParams, FittedColumnTransformer, Remainder,
};
pub use encoding::{
    FittedOneHotEncoder, HandleUnknown, OneHotEncoder, OneHotEncoderParams,
    MISSING_CATEGORY_LABEL,
};
pub use error::PreprocessingError;
pub use frame::{Column, ColumnKind, FeatureFrame};
pub use traits::{FittedTransformer, Transformer};
