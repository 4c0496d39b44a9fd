//! Fixtures
//!
//! Named pricing tables and sample requests under a fixtures directory:
//!
//! ```text
//! fixtures/pricing/<name>.yml
//! fixtures/requests/<name>.yml
//! ```

use std::{collections::BTreeMap, fs, path::PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    request::QuoteRequest,
    tables::{PricingTable, TableError},
};

/// Fixture Loading Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Pricing table failed to load
    #[error(transparent)]
    Table(#[from] TableError),

    /// No pricing table loaded yet
    #[error("No pricing table loaded")]
    NoPricing,

    /// Request not found
    #[error("Request not found: {0}")]
    RequestNotFound(String),
}

/// Sample requests file.
#[derive(Debug, Deserialize)]
struct RequestsFixture {
    requests: BTreeMap<String, QuoteRequest>,
}

/// Fixture
#[derive(Debug)]
pub struct Fixture {
    /// Base path for fixture files
    base_path: PathBuf,

    /// Loaded pricing table
    table: Option<PricingTable>,

    /// Sample requests by name
    requests: BTreeMap<String, QuoteRequest>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    /// Create a new empty fixture with default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new empty fixture with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            table: None,
            requests: BTreeMap::new(),
        }
    }

    /// Load a pricing table and the requests of the same name
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be read or parsed.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        let mut fixture = Self::new();

        fixture.load_pricing(name)?.load_requests(name)?;

        Ok(fixture)
    }

    /// Load a pricing table from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the table is invalid.
    pub fn load_pricing(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let file_path = self.base_path.join("pricing").join(format!("{name}.yml"));

        self.table = Some(PricingTable::load(file_path)?);

        Ok(self)
    }

    /// Load sample requests from a YAML fixture file
    ///
    /// Later files replace requests of the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_requests(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let file_path = self.base_path.join("requests").join(format!("{name}.yml"));
        let contents = fs::read_to_string(&file_path)?;
        let fixture: RequestsFixture = serde_norway::from_str(&contents)?;

        self.requests.extend(fixture.requests);

        Ok(self)
    }

    /// Loaded pricing table
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::NoPricing`] if no table was loaded.
    pub fn table(&self) -> Result<&PricingTable, FixtureError> {
        self.table.as_ref().ok_or(FixtureError::NoPricing)
    }

    /// Sample request by name
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::RequestNotFound`] for an unknown name.
    pub fn request(&self, name: &str) -> Result<&QuoteRequest, FixtureError> {
        self.requests
            .get(name)
            .ok_or_else(|| FixtureError::RequestNotFound(name.to_string()))
    }

    /// Names of the loaded requests, sorted
    pub fn request_names(&self) -> impl Iterator<Item = &str> {
        self.requests.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn standard_set_loads() -> TestResult {
        let fixture = Fixture::from_set("standard")?;

        assert_eq!(fixture.table()?.version, "2026.10-standard");
        assert!(fixture.request_names().count() >= 5);
        assert_eq!(
            fixture.request("multi_sku")?.sku_quantities,
            vec![3000, 3000]
        );

        Ok(())
    }

    #[test]
    fn unknown_request_is_reported() -> TestResult {
        let fixture = Fixture::from_set("standard")?;

        assert!(matches!(
            fixture.request("nope"),
            Err(FixtureError::RequestNotFound(name)) if name == "nope"
        ));

        Ok(())
    }

    #[test]
    fn table_must_be_loaded_first() {
        let fixture = Fixture::new();

        assert!(matches!(fixture.table(), Err(FixtureError::NoPricing)));
    }

    #[test]
    fn missing_set_is_an_io_error() {
        let mut fixture = Fixture::new();

        assert!(matches!(
            fixture.load_requests("does-not-exist"),
            Err(FixtureError::Io(_))
        ));
    }
}
