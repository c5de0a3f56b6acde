//! Descriptive statistics of a cleaned listings table.
//!
//! These are the figures a front end shows next to the estimator: dataset
//! size and ranges, medians used as input defaults, the category
//! vocabularies offered for selection, and the price distribution.

use crate::dataset::error::DatasetError;
use crate::dataset::ListingTable;
use serde::Serialize;

/// Default number of price histogram bins.
pub const DEFAULT_HISTOGRAM_BINS: usize = 20;

/// Summary of a non-empty [`ListingTable`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub n_listings: usize,
    pub year_min: f64,
    pub year_max: f64,
    pub price_min: f64,
    pub price_max: f64,
    pub median_year: f64,
    pub median_km_driven: f64,
    pub median_ex_showroom_price: f64,
    pub max_km_driven: f64,
    pub max_ex_showroom_price: f64,
    /// Distinct names in first-seen order, missing values excluded.
    pub names: Vec<String>,
    pub seller_types: Vec<String>,
    pub owners: Vec<String>,
}

/// Equal-width histogram: `counts[i]` covers `[edges[i], edges[i + 1])`,
/// the last bin also includes its right edge.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PriceHistogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl DatasetSummary {
    /// Summarize a table.
    ///
    /// # Errors
    /// [`DatasetError::Empty`] for a table without listings.
    pub fn from_table(table: &ListingTable) -> Result<Self, DatasetError> {
        if table.is_empty() {
            return Err(DatasetError::Empty);
        }

        let years: Vec<f64> = table.iter().map(|l| l.features.year).collect();
        let prices: Vec<f64> = table.iter().map(|l| l.selling_price).collect();
        let km: Vec<f64> = table.iter().map(|l| l.features.km_driven).collect();
        let ex: Vec<f64> = table.iter().map(|l| l.features.ex_showroom_price).collect();

        Ok(Self {
            n_listings: table.len(),
            year_min: min(&years),
            year_max: max(&years),
            price_min: min(&prices),
            price_max: max(&prices),
            median_year: median(&years),
            median_km_driven: median(&km),
            median_ex_showroom_price: median(&ex),
            max_km_driven: max(&km),
            max_ex_showroom_price: max(&ex),
            names: vocabulary(table.iter().map(|l| &l.features.name)),
            seller_types: vocabulary(table.iter().map(|l| &l.features.seller_type)),
            owners: vocabulary(table.iter().map(|l| &l.features.owner)),
        })
    }
}

impl ListingTable {
    /// See [`DatasetSummary::from_table`].
    pub fn summary(&self) -> Result<DatasetSummary, DatasetError> {
        DatasetSummary::from_table(self)
    }

    /// Histogram of `selling_price` over `bins` equal-width bins spanning
    /// the observed range. When every price is equal the range is widened
    /// by 0.5 on each side.
    ///
    /// # Errors
    /// - [`DatasetError::Empty`] for a table without listings.
    /// - [`DatasetError::InvalidConfig`] when `bins` is 0.
    pub fn price_histogram(&self, bins: usize) -> Result<PriceHistogram, DatasetError> {
        if bins == 0 {
            return Err(DatasetError::InvalidConfig(
                "histogram needs at least one bin".to_string(),
            ));
        }
        if self.is_empty() {
            return Err(DatasetError::Empty);
        }

        let prices: Vec<f64> = self.iter().map(|l| l.selling_price).collect();
        let (mut lo, mut hi) = (min(&prices), max(&prices));
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / bins as f64;
        let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();

        let mut counts = vec![0usize; bins];
        for price in prices {
            let idx = (((price - lo) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }

        Ok(PriceHistogram { edges, counts })
    }
}

fn min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Median of a non-empty slice; the mean of the two middle values for even lengths.
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn vocabulary<'a>(values: impl Iterator<Item = &'a Option<String>>) -> Vec<String> {
    let mut seen = Vec::new();
    for value in values.flatten() {
        if !seen.contains(value) {
            seen.push(value.clone());
        }
    }
    seen
}
