/// A marker type indicating that a model is **not yet trained**.
///
/// This phantom type is used in generic parameters (e.g. `RandomForest<Unfitted>`)
/// to enforce compile-time guarantees:
/// - `fit` is only available on an `Unfitted` model.
/// - Inference methods (`predict`) are **not available** until the model is converted to `Fitted`.
#[derive(Clone, Copy, Debug)]
pub struct Unfitted;

/// A marker type indicating that a model has been **fully trained**.
///
/// A `Fitted` model contains **only inference parameters** (tree nodes, input
/// width), never the sampling configuration used to grow it.
#[derive(Clone, Copy, Debug)]
pub struct Fitted;
