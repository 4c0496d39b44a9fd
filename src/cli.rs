//! Command Line
//!
//! Arguments for the `pouch-quote` binary, and loading of the pricing table and request they name.

use std::{fs, path::PathBuf};

use clap::{Args, Parser};
use thiserror::Error;

use crate::{
    fixtures::{Fixture, FixtureError},
    request::QuoteRequest,
    specification::Quantities,
    tables::{PricingTable, TableError},
};

/// Errors loading command line inputs.
#[derive(Debug, Error)]
pub enum CliError {
    /// Request file could not be read
    #[error("failed to read request file: {0}")]
    Io(#[from] std::io::Error),

    /// Request file is not valid YAML or JSON
    #[error("failed to parse request file: {0}")]
    Parse(#[from] serde_norway::Error),

    /// Pricing table could not be loaded
    #[error(transparent)]
    Table(#[from] TableError),

    /// Fixture set could not be loaded
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    /// Neither a request file nor a sample was given
    #[error("no request given, pass --request <file> or --sample <name>")]
    NoRequest,
}

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// What to calculate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// One quote at the request's own quantity
    Quote,

    /// Compare the request at several quantities
    Batch(Vec<Quantities>),

    /// Search for a more economical quantity
    Suggest,
}

/// Pouch Quote
#[derive(Debug, Parser)]
#[command(
    name = "pouch-quote",
    about = "Film usage and pricing for printed pouches and roll film",
    long_about = None
)]
pub struct Cli {
    /// Pricing table file; the bundled standard table when omitted
    #[arg(short, long, env = "POUCH_QUOTE_PRICING")]
    pub pricing: Option<PathBuf>,

    /// Request file (YAML or JSON)
    #[arg(short, long, conflicts_with = "sample")]
    pub request: Option<PathBuf>,

    /// Sample request by name from the fixture set
    #[arg(short, long)]
    pub sample: Option<String>,

    /// Fixture set to take samples from
    #[arg(short, long, default_value = "standard")]
    pub fixture: String,

    /// Fixture directory
    #[arg(long, env = "POUCH_QUOTE_FIXTURES", default_value = "./fixtures")]
    pub fixtures_path: PathBuf,

    /// Candidate quantities to compare, e.g. `1000,5000` or `3000+2000,6000+4000`
    #[arg(
        short,
        long,
        value_delimiter = ',',
        value_parser = parse_quantities,
        conflicts_with = "suggest"
    )]
    pub quantities: Vec<Quantities>,

    /// Search for a more economical quantity
    #[arg(long)]
    pub suggest: bool,

    /// Print JSON records instead of tables
    #[arg(long)]
    pub json: bool,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,
}

impl Cli {
    /// Requested calculation
    pub fn mode(&self) -> Mode {
        if self.suggest {
            Mode::Suggest
        } else if self.quantities.is_empty() {
            Mode::Quote
        } else {
            Mode::Batch(self.quantities.clone())
        }
    }

    /// Load the pricing table
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Table`] if the table cannot be read or is invalid.
    pub fn load_table(&self) -> Result<PricingTable, CliError> {
        let table = match &self.pricing {
            Some(path) => PricingTable::load(path)?,
            None => PricingTable::standard()?,
        };

        Ok(table)
    }

    /// Load the request from a file or the fixture set
    ///
    /// # Errors
    ///
    /// Returns a [`CliError`] if the request cannot be found, read or parsed.
    pub fn load_request(&self) -> Result<QuoteRequest, CliError> {
        if let Some(path) = &self.request {
            let contents = fs::read_to_string(path)?;

            return Ok(serde_norway::from_str(&contents)?);
        }

        let Some(sample) = &self.sample else {
            return Err(CliError::NoRequest);
        };

        let mut fixture = Fixture::with_base_path(&self.fixtures_path);
        fixture.load_requests(&self.fixture)?;

        Ok(fixture.request(sample)?.clone())
    }
}

/// Parse one candidate: a quantity, or per-SKU quantities joined with `+`.
///
/// # Errors
///
/// Returns a message if any part is not a positive whole number.
pub fn parse_quantities(value: &str) -> Result<Quantities, String> {
    let quantities = value
        .split('+')
        .map(|part| {
            part.trim()
                .parse::<u64>()
                .map_err(|err| format!("invalid quantity `{}`: {err}", part.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Quantities::try_from(quantities).map_err(|err| err.to_string())
}
