//! Listing records, the cleaned listings table and its loader.
//!
//! A listing has three categorical attributes (`name`, `seller_type`,
//! `owner`), three numeric attributes (`year`, `km_driven`,
//! `ex_showroom_price`) and, in training data, the `selling_price` target.

pub mod error;
pub mod loader;
pub mod summary;

pub use error::DatasetError;
pub use loader::{
    CategoricalPolicy, ListingLoader, LoadReport, LoaderConfig, DEFAULT_MISSING_TOKENS,
};
pub use summary::{DatasetSummary, PriceHistogram, DEFAULT_HISTOGRAM_BINS};

use crate::preprocessing::{Column, FeatureFrame};
use serde::{Deserialize, Serialize};

pub const NAME: &str = "name";
pub const YEAR: &str = "year";
pub const KM_DRIVEN: &str = "km_driven";
pub const SELLER_TYPE: &str = "seller_type";
pub const OWNER: &str = "owner";
pub const EX_SHOWROOM_PRICE: &str = "ex_showroom_price";
/// Target column.
pub const SELLING_PRICE: &str = "selling_price";

/// Feature columns, in the order they appear in a [`FeatureFrame`].
pub const FEATURE_COLUMNS: [&str; 6] = [NAME, YEAR, KM_DRIVEN, SELLER_TYPE, OWNER, EX_SHOWROOM_PRICE];

/// Feature columns that are one-hot encoded.
pub const CATEGORICAL_FEATURES: [&str; 3] = [NAME, SELLER_TYPE, OWNER];

/// Feature columns passed through as numbers.
pub const NUMERIC_FEATURES: [&str; 3] = [YEAR, KM_DRIVEN, EX_SHOWROOM_PRICE];

/// Columns that must be present in an input file.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    NAME,
    YEAR,
    SELLING_PRICE,
    KM_DRIVEN,
    SELLER_TYPE,
    OWNER,
    EX_SHOWROOM_PRICE,
];

/// The six attributes a price is estimated from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListingFeatures {
    pub name: Option<String>,
    pub year: f64,
    pub km_driven: f64,
    pub seller_type: Option<String>,
    pub owner: Option<String>,
    pub ex_showroom_price: f64,
}

impl ListingFeatures {
    /// Columnar view of a batch of records.
    pub fn frame(records: &[ListingFeatures]) -> FeatureFrame {
        let mut name = Vec::with_capacity(records.len());
        let mut year = Vec::with_capacity(records.len());
        let mut km_driven = Vec::with_capacity(records.len());
        let mut seller_type = Vec::with_capacity(records.len());
        let mut owner = Vec::with_capacity(records.len());
        let mut ex_showroom_price = Vec::with_capacity(records.len());

        for r in records {
            name.push(r.name.clone());
            year.push(r.year);
            km_driven.push(r.km_driven);
            seller_type.push(r.seller_type.clone());
            owner.push(r.owner.clone());
            ex_showroom_price.push(r.ex_showroom_price);
        }

        FeatureFrame::from_aligned(vec![
            (NAME, Column::Categorical(name)),
            (YEAR, Column::Numeric(year)),
            (KM_DRIVEN, Column::Numeric(km_driven)),
            (SELLER_TYPE, Column::Categorical(seller_type)),
            (OWNER, Column::Categorical(owner)),
            (EX_SHOWROOM_PRICE, Column::Numeric(ex_showroom_price)),
        ])
    }

    /// Single-row frame.
    pub fn to_frame(&self) -> FeatureFrame {
        Self::frame(std::slice::from_ref(self))
    }
}

/// One cleaned row of the listings table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(flatten)]
    pub features: ListingFeatures,
    pub selling_price: f64,
}

/// Cleaned listings: every row has finite numeric fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListingTable {
    listings: Vec<Listing>,
}

impl ListingTable {
    pub fn new(listings: Vec<Listing>) -> Self {
        Self { listings }
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn iter(&self) -> impl Iterator<Item = &Listing> {
        self.listings.iter()
    }

    /// Feature columns in the order name, year, km_driven, seller_type,
    /// owner, ex_showroom_price.
    pub fn features(&self) -> FeatureFrame {
        let records: Vec<ListingFeatures> =
            self.listings.iter().map(|l| l.features.clone()).collect();
        ListingFeatures::frame(&records)
    }

    /// Selling prices, aligned with [`features`](Self::features).
    pub fn targets(&self) -> Vec<f64> {
        self.listings.iter().map(|l| l.selling_price).collect()
    }
}

impl FromIterator<Listing> for ListingTable {
    fn from_iter<I: IntoIterator<Item = Listing>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
