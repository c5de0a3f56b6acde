//! CSV loader for historical listings.
//!
//! The loader validates the header once, then cleans row by row: numeric
//! fields that are absent or do not parse to a finite number drop their row,
//! blank or NA-token categorical fields become missing. Bad rows are
//! counted, never fatal.

use crate::dataset::error::DatasetError;
use crate::dataset::{
    Listing, ListingFeatures, ListingTable, EX_SHOWROOM_PRICE, KM_DRIVEN, NAME, OWNER,
    REQUIRED_COLUMNS, SELLER_TYPE, SELLING_PRICE, YEAR,
};
use csv::{ByteRecord, ReaderBuilder};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// What to do with rows whose categorical fields are missing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalPolicy {
    /// Keep the row; the blank value is encoded as its own "missing" category.
    #[default]
    KeepMissing,
    /// Drop rows with a missing `name`, `seller_type` or `owner`.
    DropMissing,
}

/// Categorical values read as missing, matched after trimming.
pub const DEFAULT_MISSING_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Loader settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Field delimiter; must be a single ASCII character.
    pub delimiter: char,
    pub categorical_policy: CategoricalPolicy,
    /// Exact categorical values treated like a blank field.
    pub missing_tokens: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            categorical_policy: CategoricalPolicy::default(),
            missing_tokens: DEFAULT_MISSING_TOKENS
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

impl LoaderConfig {
    pub fn validate(&self) -> Result<(), DatasetError> {
        self.delimiter_byte().map(|_| ())
    }

    fn delimiter_byte(&self) -> Result<u8, DatasetError> {
        if self.delimiter.is_ascii() && !matches!(self.delimiter, '"' | '\n' | '\r') {
            Ok(self.delimiter as u8)
        } else {
            Err(DatasetError::InvalidConfig(format!(
                "delimiter must be a single ASCII character other than a quote or newline, got {:?}",
                self.delimiter
            )))
        }
    }
}

/// Row counts from one load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Data rows read (header excluded).
    pub rows_read: usize,
    /// Rows kept in the cleaned table.
    pub rows_kept: usize,
    /// Rows dropped because a numeric field was absent, blank, unparsable or non-finite.
    pub dropped_numeric: usize,
    /// Rows dropped by [`CategoricalPolicy::DropMissing`].
    pub dropped_categorical: usize,
}

impl LoadReport {
    pub fn rows_dropped(&self) -> usize {
        self.dropped_numeric + self.dropped_categorical
    }
}

/// Positions of the required columns in the header row.
struct ColumnIndex {
    name: usize,
    year: usize,
    selling_price: usize,
    km_driven: usize,
    seller_type: usize,
    owner: usize,
    ex_showroom_price: usize,
}

impl ColumnIndex {
    fn from_header(header: &ByteRecord) -> Result<Self, DatasetError> {
        let names: Vec<String> = header
            .iter()
            .map(|field| String::from_utf8_lossy(field).trim().to_string())
            .collect();

        for required in REQUIRED_COLUMNS {
            if !names.iter().any(|n| n == required) {
                return Err(DatasetError::MissingColumn(required.to_string()));
            }
        }
        let position = |column: &str| names.iter().position(|n| n == column).unwrap_or(0);

        Ok(Self {
            name: position(NAME),
            year: position(YEAR),
            selling_price: position(SELLING_PRICE),
            km_driven: position(KM_DRIVEN),
            seller_type: position(SELLER_TYPE),
            owner: position(OWNER),
            ex_showroom_price: position(EX_SHOWROOM_PRICE),
        })
    }
}

/// Field at `idx`; empty when the row is shorter than the header.
fn field(record: &ByteRecord, idx: usize) -> Cow<'_, str> {
    String::from_utf8_lossy(record.get(idx).unwrap_or_default())
}

/// Trimmed finite number, or `None` for anything else.
fn parse_numeric(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Trimmed category, or `None` when blank or one of `missing_tokens`.
fn parse_categorical(raw: &str, missing_tokens: &[String]) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || missing_tokens.iter().any(|t| t == trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Reads a listings file into a cleaned [`ListingTable`].
///
/// # Example
/// ```no_run
/// use motovalue::dataset::{CategoricalPolicy, ListingLoader};
///
/// let table = ListingLoader::new()
///     .with_categorical_policy(CategoricalPolicy::DropMissing)
///     .load("BIKE_DETAILS.csv")
///     .unwrap();
/// println!("{} listings", table.len());
/// ```
#[derive(Clone, Debug, Default)]
pub struct ListingLoader {
    config: LoaderConfig,
}

impl ListingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.config.delimiter = delimiter;
        self
    }

    pub fn with_categorical_policy(mut self, policy: CategoricalPolicy) -> Self {
        self.config.categorical_policy = policy;
        self
    }

    pub fn with_missing_tokens<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.config.missing_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load and clean the file at `path`.
    ///
    /// # Errors
    /// - [`DatasetError::MissingFile`] naming the path when it does not exist.
    /// - [`DatasetError::MissingColumn`] naming the first absent required column.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<ListingTable, DatasetError> {
        self.load_with_report(path).map(|(table, _)| table)
    }

    /// Like [`load`](Self::load), also returning the row counts.
    pub fn load_with_report<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<(ListingTable, LoadReport), DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => DatasetError::MissingFile(path.to_path_buf()),
            _ => DatasetError::Io(e),
        })?;
        info!(path = %path.display(), "loading listings");
        self.load_from_reader(BufReader::new(file))
    }

    /// Load and clean listings from any reader.
    pub fn load_from_reader<R: io::Read>(
        &self,
        reader: R,
    ) -> Result<(ListingTable, LoadReport), DatasetError> {
        let delimiter = self.config.delimiter_byte()?;
        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns = ColumnIndex::from_header(rdr.byte_headers()?)?;
        let mut report = LoadReport::default();
        let mut listings = Vec::new();
        let mut record = ByteRecord::new();

        let missing = &self.config.missing_tokens;

        while rdr.read_byte_record(&mut record)? {
            report.rows_read += 1;

            let numeric = (
                parse_numeric(&field(&record, columns.year)),
                parse_numeric(&field(&record, columns.km_driven)),
                parse_numeric(&field(&record, columns.ex_showroom_price)),
                parse_numeric(&field(&record, columns.selling_price)),
            );
            let (Some(year), Some(km_driven), Some(ex_showroom_price), Some(selling_price)) =
                numeric
            else {
                report.dropped_numeric += 1;
                continue;
            };

            let features = ListingFeatures {
                name: parse_categorical(&field(&record, columns.name), missing),
                year,
                km_driven,
                seller_type: parse_categorical(&field(&record, columns.seller_type), missing),
                owner: parse_categorical(&field(&record, columns.owner), missing),
                ex_showroom_price,
            };

            if self.config.categorical_policy == CategoricalPolicy::DropMissing
                && (features.name.is_none()
                    || features.seller_type.is_none()
                    || features.owner.is_none())
            {
                report.dropped_categorical += 1;
                continue;
            }

            listings.push(Listing {
                features,
                selling_price,
            });
        }

        report.rows_kept = listings.len();
        info!(
            rows_read = report.rows_read,
            rows_kept = report.rows_kept,
            "listings loaded"
        );
        if report.rows_dropped() > 0 {
            warn!(
                dropped_numeric = report.dropped_numeric,
                dropped_categorical = report.dropped_categorical,
                "dropped listings during cleaning"
            );
        }

        Ok((ListingTable::new(listings), report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::FEATURE_COLUMNS;

    const CSV: &str = "\
name,selling_price,year,seller_type,owner,km_driven,ex_showroom_price
Royal Enfield Classic 350,175000,2019,Individual,1st owner,350,
Honda Dio,45000,2017,Individual,1st owner,5650,
Royal Enfield Classic Gunmetal Grey,150000,2018,Individual,1st owner,12000,148114
Yamaha FZ S V 2.0,65000,2015,Individual,1st owner,23000,89643
Yamaha Fazer,40000,2011,,2nd owner,unknown,88000
Honda CB Twister,18000,2010,Individual,,60000,53857
";

    fn load(csv: &str, loader: ListingLoader) -> (ListingTable, LoadReport) {
        loader.load_from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_rows_with_missing_numeric_are_dropped() {
        let (table, report) = load(CSV, ListingLoader::new());

        assert_eq!(report.rows_read, 6);
        assert_eq!(report.dropped_numeric, 3);
        assert_eq!(report.rows_kept, 3);
        assert_eq!(table.len(), 3);
        for listing in table.iter() {
            assert!(listing.features.year.is_finite());
            assert!(listing.features.km_driven.is_finite());
            assert!(listing.features.ex_showroom_price.is_finite());
            assert!(listing.selling_price.is_finite());
        }
    }

    #[test]
    fn test_unknown_km_driven_row_excluded() {
        let (table, _) = load(CSV, ListingLoader::new());
        assert!(table
            .iter()
            .all(|l| l.features.name.as_deref() != Some("Yamaha Fazer")));
    }

    #[test]
    fn test_blank_categorical_kept_as_missing() {
        let (table, report) = load(CSV, ListingLoader::new());
        assert_eq!(report.dropped_categorical, 0);
        let twister = table
            .iter()
            .find(|l| l.features.name.as_deref() == Some("Honda CB Twister"))
            .unwrap();
        assert_eq!(twister.features.owner, None);
        assert_eq!(twister.selling_price, 18000.0);
    }

    #[test]
    fn test_drop_missing_policy() {
        let (table, report) = load(
            CSV,
            ListingLoader::new().with_categorical_policy(CategoricalPolicy::DropMissing),
        );
        assert_eq!(report.dropped_categorical, 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_header_order_is_free_and_extra_columns_ignored() {
        let csv = "\
extra,owner,ex_showroom_price,km_driven,seller_type,year,selling_price,name
x,1st owner,60000,5000,Dealer,2018,52000,A
";
        let (table, _) = load(csv, ListingLoader::new());
        let frame = table.features();
        assert_eq!(frame.column_names(), FEATURE_COLUMNS);
        assert_eq!(table.targets(), vec![52000.0]);
        assert_eq!(table.listings()[0].features.seller_type.as_deref(), Some("Dealer"));
    }

    #[test]
    fn test_missing_column_is_named() {
        let csv = "name,year,selling_price,km_driven,seller_type,owner\nA,2015,1,1,x,y\n";
        match ListingLoader::new().load_from_reader(csv.as_bytes()) {
            Err(DatasetError::MissingColumn(name)) => assert_eq!(name, "ex_showroom_price"),
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_row_drops_on_missing_numeric() {
        let csv = "\
name,year,selling_price,km_driven,seller_type,owner,ex_showroom_price
A,2015,40000,10000,individual,1st,50000
B,2010,20000
";
        let (table, report) = load(csv, ListingLoader::new());
        assert_eq!(table.len(), 1);
        assert_eq!(report.dropped_numeric, 1);
    }

    #[test]
    fn test_short_row_with_required_fields_is_kept() {
        let csv = "\
name,year,selling_price,km_driven,seller_type,owner,ex_showroom_price,comment
A,2015,40000,10000,individual,1st,50000,mint
B,2010,20000,40000,individual,2nd,45000
C,2012,30000,12000,dealer,1st,47000,spare key,extra
";
        let (table, report) = load(csv, ListingLoader::new());
        assert_eq!(report.rows_kept, 3);
        assert_eq!(report.rows_dropped(), 0);
        assert_eq!(table.targets(), vec![40000.0, 20000.0, 30000.0]);
    }

    #[test]
    fn test_short_row_missing_trailing_categorical() {
        let csv = "\
name,year,selling_price,km_driven,ex_showroom_price,seller_type,owner
A,2015,40000,10000,50000,individual
";
        let (table, _) = load(csv, ListingLoader::new());
        assert_eq!(table.len(), 1);
        assert_eq!(table.listings()[0].features.owner, None);

        let (table, report) = load(
            csv,
            ListingLoader::new().with_categorical_policy(CategoricalPolicy::DropMissing),
        );
        assert!(table.is_empty());
        assert_eq!(report.dropped_categorical, 1);
    }

    #[test]
    fn test_unparsable_year_is_dropped() {
        let csv = "\
name,year,selling_price,km_driven,seller_type,owner,ex_showroom_price
A,abc,40000,10000,individual,1st,50000
B,2010,20000,40000,individual,2nd,45000
";
        let (table, report) = load(csv, ListingLoader::new());
        assert_eq!(report.dropped_numeric, 1);
        assert_eq!(table.len(), 1);
        assert_eq!(table.listings()[0].features.name.as_deref(), Some("B"));
    }

    #[test]
    fn test_na_tokens_are_missing_categories() {
        let csv = "\
name,year,selling_price,km_driven,seller_type,owner,ex_showroom_price
NA,2015,40000,10000,N/A,null,50000
A,2016,45000,9000, NaN ,<NA>,52000
";
        let (table, _) = load(csv, ListingLoader::new());
        assert_eq!(table.len(), 2);
        for listing in table.iter() {
            assert_eq!(listing.features.seller_type, None);
            assert_eq!(listing.features.owner, None);
        }
        assert_eq!(table.listings()[0].features.name, None);
        assert_eq!(table.listings()[1].features.name.as_deref(), Some("A"));

        let (table, _) = load(csv, ListingLoader::new().with_missing_tokens(["null"]));
        assert_eq!(table.listings()[0].features.name.as_deref(), Some("NA"));
        assert_eq!(table.listings()[0].features.owner, None);
    }

    #[test]
    fn test_custom_delimiter() {
        let csv = "\
name;year;selling_price;km_driven;seller_type;owner;ex_showroom_price
A; 2015 ;40000;10000; individual ;1st;50000
";
        let (table, _) = load(csv, ListingLoader::new().with_delimiter(';'));
        assert_eq!(table.len(), 1);
        let listing = &table.listings()[0];
        assert_eq!(listing.features.year, 2015.0);
        assert_eq!(listing.features.seller_type.as_deref(), Some("individual"));
    }

    #[test]
    fn test_invalid_delimiter() {
        let result = ListingLoader::new()
            .with_delimiter('é')
            .load_from_reader("".as_bytes());
        assert!(matches!(result, Err(DatasetError::InvalidConfig(_))));
    }

    #[test]
    fn test_non_finite_numeric_is_dropped() {
        let csv = "\
name,year,selling_price,km_driven,seller_type,owner,ex_showroom_price
A,2015,inf,10000,individual,1st,50000
A,2015,NaN,10000,individual,1st,50000
";
        let (table, report) = load(csv, ListingLoader::new());
        assert!(table.is_empty());
        assert_eq!(report.dropped_numeric, 2);
    }

    #[test]
    fn test_missing_file_is_named() {
        let path = std::env::temp_dir().join("motovalue_test_no_such_listings.csv");
        match ListingLoader::new().load(&path) {
            Err(DatasetError::MissingFile(p)) => assert_eq!(p, path),
            other => panic!("expected MissingFile, got {:?}", other),
        }
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join("motovalue_test_listings.csv");
        std::fs::write(&path, CSV).unwrap();
        let (table, report) = ListingLoader::new().load_with_report(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(table.len(), 3);
        assert_eq!(report.rows_dropped(), 3);
    }

    #[test]
    fn test_config_from_json() {
        let config: LoaderConfig =
            serde_json::from_str(r#"{"categorical_policy": "drop_missing"}"#).unwrap();
        assert_eq!(config.delimiter, ',');
        assert_eq!(config.categorical_policy, CategoricalPolicy::DropMissing);
        assert!(config.missing_tokens.iter().any(|t| t == "NA"));

        let config: LoaderConfig = serde_json::from_str(r#"{"missing_tokens": []}"#).unwrap();
        assert!(config.missing_tokens.is_empty());
    }
}
