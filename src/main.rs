//! Command-line entry point: train, predict, inspect importances, summarize data.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use motovalue::dataset::{ListingLoader, DEFAULT_HISTOGRAM_BINS};
use motovalue::{CategoricalPolicy, PriceEstimator, PricePipeline, RawRecord, TrainingConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "motovalue")]
#[command(about = "Used motorcycle resale price estimator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the pipeline on a listings CSV and save it
    Train {
        /// Listings CSV with a header row
        #[arg(long)]
        data: PathBuf,
        /// Where to write the fitted pipeline
        #[arg(long)]
        out: PathBuf,
        /// JSON training configuration
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        trees: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        jobs: Option<usize>,
        /// Also drop rows with a blank name, seller_type or owner
        #[arg(long)]
        drop_missing_categories: bool,
    },

    /// Estimate the price of one listing
    Predict {
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        year: String,
        #[arg(long)]
        km_driven: String,
        #[arg(long)]
        seller_type: String,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        ex_showroom_price: String,
    },

    /// Print encoded columns by importance
    Importance {
        #[arg(long)]
        model: PathBuf,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Describe a listings CSV
    Summary {
        #[arg(long)]
        data: PathBuf,
        /// JSON training configuration; its loader section is used
        #[arg(long)]
        config: Option<PathBuf>,
        /// Field delimiter, overrides the configuration
        #[arg(long)]
        delimiter: Option<char>,
        #[arg(long, default_value_t = DEFAULT_HISTOGRAM_BINS)]
        bins: usize,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<&Path>) -> Result<TrainingConfig> {
    TrainingConfig::from_optional_file(path).with_context(|| match path {
        Some(path) => format!("Failed to load config {}", path.display()),
        None => "Invalid default configuration".to_string(),
    })
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            data,
            out,
            config,
            trees,
            seed,
            jobs,
            drop_missing_categories,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(trees) = trees {
                config.forest.n_trees = trees;
            }
            if let Some(seed) = seed {
                config.forest.seed = seed;
            }
            if let Some(jobs) = jobs {
                config.forest.n_jobs = jobs;
            }
            if drop_missing_categories {
                config.loader.categorical_policy = CategoricalPolicy::DropMissing;
            }
            config.validate().context("Invalid training configuration")?;

            let table = ListingLoader::from_config(config.loader.clone())
                .load(&data)
                .with_context(|| format!("Failed to load listings from {}", data.display()))?;

            let outcome = PriceEstimator::new()
                .with_forest_config(config.forest.clone())
                .fit_table(&table)
                .context("Failed to fit price pipeline")?;

            let metrics = outcome
                .pipeline
                .evaluate(&table.features(), &table.targets())
                .context("Failed to evaluate fitted pipeline")?;
            tracing::info!(
                mse = metrics.mse,
                rmse = metrics.rmse,
                mae = metrics.mae,
                r_squared = metrics.r_squared,
                "in-sample fit"
            );
            for feature in outcome.per_column_importance.iter().take(10) {
                tracing::info!(column = %feature.column, weight = feature.weight, "importance");
            }

            outcome
                .pipeline
                .save_to_file(&out)
                .with_context(|| format!("Failed to save pipeline to {}", out.display()))?;
            tracing::info!(path = %out.display(), "pipeline saved");
        }

        Commands::Predict {
            model,
            name,
            year,
            km_driven,
            seller_type,
            owner,
            ex_showroom_price,
        } => {
            let pipeline = PricePipeline::load_from_file(&model)
                .with_context(|| format!("Failed to load pipeline from {}", model.display()))?;
            let record = RawRecord::new()
                .with("name", name)
                .with("year", year)
                .with("km_driven", km_driven)
                .with("seller_type", seller_type)
                .with("owner", owner)
                .with("ex_showroom_price", ex_showroom_price);
            let price = pipeline.predict_record(&record).context("Prediction failed")?;
            println!("{:.0}", price);
        }

        Commands::Importance { model, top } => {
            let pipeline = PricePipeline::load_from_file(&model)
                .with_context(|| format!("Failed to load pipeline from {}", model.display()))?;
            for feature in pipeline.top_features(top) {
                println!("{:.6}\t{}", feature.weight, feature.column);
            }
        }

        Commands::Summary {
            data,
            config,
            delimiter,
            bins,
            json,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(delimiter) = delimiter {
                config.loader.delimiter = delimiter;
            }
            config.validate().context("Invalid loader configuration")?;

            let table = ListingLoader::from_config(config.loader)
                .load(&data)
                .with_context(|| format!("Failed to load listings from {}", data.display()))?;
            let summary = table.summary().context("Cannot summarize listings")?;
            let histogram = table
                .price_histogram(bins)
                .context("Cannot build price histogram")?;

            if json {
                let value = serde_json::json!({
                    "summary": summary,
                    "price_histogram": histogram,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("listings:          {}", summary.n_listings);
                println!("years:             {} - {}", summary.year_min, summary.year_max);
                println!("prices:            {} - {}", summary.price_min, summary.price_max);
                println!("median year:       {}", summary.median_year);
                println!("median km_driven:  {}", summary.median_km_driven);
                println!("median ex_showroom_price: {}", summary.median_ex_showroom_price);
                println!("names:             {}", summary.names.len());
                println!("seller types:      {}", summary.seller_types.join(", "));
                println!("owners:            {}", summary.owners.join(", "));
                println!("price histogram:");
                for (i, count) in histogram.counts.iter().enumerate() {
                    println!(
                        "  [{:>12.0}, {:>12.0}) {}",
                        histogram.edges[i],
                        histogram.edges[i + 1],
                        count
                    );
                }
            }
        }
    }

    Ok(())
}
