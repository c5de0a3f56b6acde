//! Categorical feature encoding transformers.
//!
//! # Available Encoders
//!
//! ## OneHotEncoder
//! Converts string categories to one-hot (dummy) encoding, one block of
//! indicator columns per input column.
//!
//! ```ignore
//! // Input column seller_type: ["Individual", "Dealer", "Individual"]
//! // Output: [[0,1], [1,0], [0,1]]   (categories sorted: Dealer, Individual)
//! ```
//!
//! # Design Notes
//!
//! Missing values (`None`) are a category of their own and sort after every
//! present category, so a column with missing values during fit gets one
//! extra indicator column.

mod one_hot;

pub use one_hot::{FittedOneHotEncoder, OneHotEncoder, OneHotEncoderParams};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Label used in output feature names for the missing category.
pub const MISSING_CATEGORY_LABEL: &str = "<missing>";

/// Strategy for handling unknown categories during transform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleUnknown {
    /// Raise an error when unknown categories are encountered.
    #[default]
    Error,
    /// Ignore unknown categories (output zeros for the whole block).
    Ignore,
}

/// Total order on categories: present values lexicographically, missing last.
pub(crate) fn category_order(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sorts_last() {
        let mut cats = vec![None, Some("b".to_string()), Some("a".to_string())];
        cats.sort_by(category_order);
        assert_eq!(cats, vec![Some("a".to_string()), Some("b".to_string()), None]);
    }
}
