//! Batch Comparison
//!
//! Prices one specification at several candidate quantities and compares the results. Each
//! candidate is priced independently; a failing candidate is reported in its own entry and does
//! not abort the rest.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    quote::{QuoteError, QuoteRecord, QuoteResult, price},
    request::QuoteRequest,
    specification::{PackagingSpecification, Quantities, ValidationError, normalize},
    tables::{ComparisonRules, PricingTable},
};

/// One candidate and its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// Candidate quantities the outcome belongs to
    pub quantities: Quantities,

    /// Priced quote or the reason it could not be priced
    pub result: Result<QuoteResult, QuoteError>,
}

impl BatchEntry {
    /// Serializable form.
    pub fn to_record(&self) -> BatchEntryRecord {
        let outcome = match &self.result {
            Ok(quote) => EntryOutcome::Quote(Box::new(quote.to_record())),
            Err(err) => EntryOutcome::Error(ErrorRecord::from(err)),
        };

        BatchEntryRecord {
            quantities: self.quantities.clone(),
            outcome,
        }
    }
}

/// Direction of unit prices across the candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTrend {
    /// Later candidates cost more per unit
    Increasing,
    /// Later candidates cost less per unit
    Decreasing,
    /// Within tolerance
    Stable,
}

/// Lot label and nominal discount for a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTier {
    /// Candidate quantities
    pub quantities: Quantities,
    /// Lot label
    pub label: String,
    /// Nominal discount, in percent points
    pub discount: Decimal,
}

/// Cost of a candidate against the smallest candidate's unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleStep {
    /// Candidate quantities
    pub quantities: Quantities,
    /// Exact unit price
    pub unit_price: Decimal,
    /// Saving against buying the same quantity at the baseline unit price, in major units
    pub total_savings: Decimal,
    /// Actual cost as percent points of the baseline cost
    pub efficiency: Decimal,
}

/// Coarse trend analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trends {
    /// First-half against second-half average unit price
    pub price_trend: PriceTrend,

    /// How much smaller the last step's improvement is than the first's, in percent points;
    /// absent for fewer than three priced candidates
    pub diminishing_returns: Option<Decimal>,
}

/// Aggregate comparison across priced candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    /// Candidate with the lowest unit price; ties go to the smaller quantity
    pub cheapest: Option<Quantities>,

    /// Lot tiers, in input order
    pub price_breaks: Vec<PriceTier>,

    /// Economies of scale, smallest quantity first
    pub economies_of_scale: Vec<ScaleStep>,

    /// Trends
    pub trends: Trends,
}

/// Results of a batch, in input order, with their comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchComparison {
    /// One entry per candidate, in input order
    pub entries: Vec<BatchEntry>,

    /// Comparison across the candidates that priced
    pub comparison: Comparison,
}

impl BatchComparison {
    /// Entry for a candidate.
    pub fn entry(&self, quantities: &Quantities) -> Option<&BatchEntry> {
        self.entries
            .iter()
            .find(|entry| &entry.quantities == quantities)
    }

    /// Successfully priced quotes, in input order.
    pub fn quotes(&self) -> impl Iterator<Item = &QuoteResult> {
        self.entries.iter().filter_map(|entry| entry.result.as_ref().ok())
    }
}

/// Price a request at each candidate quantity set.
///
/// The request's own quantities are ignored.
///
/// # Errors
///
/// Returns a [`ValidationError`] if there are no candidates or the base specification is invalid.
/// Failures of individual candidates are reported in their entries.
pub fn calculate_batch(
    request: &QuoteRequest,
    candidates: &[Quantities],
    table: &PricingTable,
) -> Result<BatchComparison, ValidationError> {
    let spec = base_specification(request, candidates, table)?;

    let entries = candidates
        .iter()
        .map(|quantities| price_candidate(&spec, quantities, table))
        .collect();

    Ok(finish(entries, table))
}

/// [`calculate_batch`] that yields to the runtime between candidates.
///
/// # Errors
///
/// Same as [`calculate_batch`].
pub async fn calculate_batch_yielding(
    request: &QuoteRequest,
    candidates: &[Quantities],
    table: &PricingTable,
) -> Result<BatchComparison, ValidationError> {
    let spec = base_specification(request, candidates, table)?;
    let mut entries = Vec::with_capacity(candidates.len());

    for quantities in candidates {
        entries.push(price_candidate(&spec, quantities, table));
        tokio::task::yield_now().await;
    }

    Ok(finish(entries, table))
}

fn base_specification(
    request: &QuoteRequest,
    candidates: &[Quantities],
    table: &PricingTable,
) -> Result<PackagingSpecification, ValidationError> {
    let first = candidates
        .first()
        .ok_or(ValidationError::Missing { field: "quantities" })?;

    normalize(&request.with_sku_quantities(first.as_slice()), table)
}

fn price_candidate(
    spec: &PackagingSpecification,
    quantities: &Quantities,
    table: &PricingTable,
) -> BatchEntry {
    let result = price(&spec.with_quantities(quantities.clone()), table);

    if let Err(err) = &result {
        warn!(quantities = %quantities, error = %err, "batch candidate failed");
    }

    BatchEntry {
        quantities: quantities.clone(),
        result,
    }
}

fn finish(entries: Vec<BatchEntry>, table: &PricingTable) -> BatchComparison {
    let priced: Vec<&QuoteResult> = entries
        .iter()
        .filter_map(|entry| entry.result.as_ref().ok())
        .collect();

    let comparison = compare(&priced, &table.comparison);

    info!(
        candidates = entries.len(),
        priced = priced.len(),
        trend = ?comparison.trends.price_trend,
        "calculated batch"
    );

    BatchComparison {
        entries,
        comparison,
    }
}

/// Compare priced quotes given in input order.
pub fn compare(quotes: &[&QuoteResult], rules: &ComparisonRules) -> Comparison {
    let cheapest = quotes
        .iter()
        .min_by(|a, b| cheaper(a, b))
        .map(|quote| quote.quantities().clone());

    let price_breaks = quotes
        .iter()
        .filter_map(|quote| {
            rules.price_break(quote.quantity()).map(|tier| PriceTier {
                quantities: quote.quantities().clone(),
                label: tier.label.clone(),
                discount: crate::money::percent_points(tier.discount),
            })
        })
        .collect();

    let mut ascending = quotes.to_vec();
    ascending.sort_by_key(|quote| quote.quantity());

    let unit_prices: Vec<Decimal> = quotes.iter().map(|quote| quote.unit_price_exact).collect();
    let ascending_prices: Vec<Decimal> = ascending
        .iter()
        .map(|quote| quote.unit_price_exact)
        .collect();

    Comparison {
        cheapest,
        price_breaks,
        economies_of_scale: economies_of_scale(&ascending),
        trends: Trends {
            price_trend: price_trend(&unit_prices, rules.trend_tolerance * Decimal::ONE),
            diminishing_returns: diminishing_returns(&ascending_prices),
        },
    }
}

fn cheaper(a: &QuoteResult, b: &QuoteResult) -> Ordering {
    a.unit_price_exact
        .cmp(&b.unit_price_exact)
        .then_with(|| a.quantity().cmp(&b.quantity()))
}

fn economies_of_scale(ascending: &[&QuoteResult]) -> Vec<ScaleStep> {
    let Some(baseline) = ascending.first() else {
        return Vec::new();
    };

    let baseline_price = baseline.unit_price_exact;

    ascending
        .iter()
        .map(|quote| {
            let quantity = Decimal::from(quote.quantity());
            let exponent = quote.total_price().currency().exponent;

            let actual = quote.unit_price_exact * quantity;
            let baseline_cost = baseline_price * quantity;

            let efficiency = if baseline_cost.is_zero() {
                Decimal::ONE_HUNDRED
            } else {
                (actual / baseline_cost * Decimal::ONE_HUNDRED).round_dp(2)
            };

            ScaleStep {
                quantities: quote.quantities().clone(),
                unit_price: quote.unit_price_exact,
                total_savings: (baseline_cost - actual).round_dp(exponent),
                efficiency,
            }
        })
        .collect()
}

/// First-half against second-half average, stable within `tolerance`.
pub fn price_trend(unit_prices: &[Decimal], tolerance: Decimal) -> PriceTrend {
    if unit_prices.len() < 2 {
        return PriceTrend::Stable;
    }

    let (first, second) = unit_prices.split_at(unit_prices.len() / 2);

    let (Some(first_average), Some(second_average)) = (average(first), average(second)) else {
        return PriceTrend::Stable;
    };

    if first_average.is_zero() {
        return PriceTrend::Stable;
    }

    let change = (second_average - first_average) / first_average;

    if change < -tolerance {
        PriceTrend::Decreasing
    } else if change > tolerance {
        PriceTrend::Increasing
    } else {
        PriceTrend::Stable
    }
}

fn average(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }

    values
        .iter()
        .try_fold(Decimal::ZERO, |acc, value| acc.checked_add(*value))
        .and_then(|total| total.checked_div(Decimal::from(values.len())))
}

/// `(1 - last improvement / first improvement) × 100` over prices in ascending quantity order.
pub fn diminishing_returns(prices: &[Decimal]) -> Option<Decimal> {
    let [p0, p1, ..] = prices else {
        return None;
    };
    let [.., pn_1, pn] = prices else {
        return None;
    };

    if prices.len() < 3 || p0.is_zero() || pn_1.is_zero() {
        return None;
    }

    let first = (*p0 - *p1) / *p0;
    let last = (*pn_1 - *pn) / *pn_1;

    if first.is_zero() {
        return None;
    }

    Some(((Decimal::ONE - last / first) * Decimal::ONE_HUNDRED).round_dp(0))
}

/// Outcome of a candidate, as serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryOutcome {
    /// Priced quote
    Quote(Box<QuoteRecord>),
    /// Failure
    Error(ErrorRecord),
}

/// Serialized batch entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntryRecord {
    /// Candidate quantities
    pub quantities: Quantities,

    /// Quote or error
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

/// Serialized error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// `validation`, `invalidGeometry` or `internalConsistency`
    pub kind: String,

    /// Offending request field, for validation errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// Human-readable message
    pub message: String,
}

impl From<&QuoteError> for ErrorRecord {
    fn from(err: &QuoteError) -> Self {
        let field = match err {
            QuoteError::Validation(validation) => Some(validation.field().to_string()),
            _ => None,
        };

        Self {
            kind: err.kind().to_string(),
            field,
            message: err.to_string(),
        }
    }
}

impl From<&ValidationError> for ErrorRecord {
    fn from(err: &ValidationError) -> Self {
        Self {
            kind: "validation".to_string(),
            field: Some(err.field().to_string()),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;
    use crate::consistency::ConsistencyError;

    fn flat() -> QuoteRequest {
        QuoteRequest {
            bag_type: Some("flat_3_side".to_string()),
            width: Some(Decimal::from(120)),
            height: Some(Decimal::from(180)),
            ..QuoteRequest::default()
        }
    }

    fn singles(quantities: &[u64]) -> TestResult<Vec<Quantities>> {
        Ok(quantities
            .iter()
            .map(|quantity| Quantities::single(*quantity))
            .collect::<Result<Vec<_>, _>>()?)
    }

    #[test]
    fn entries_keep_input_order() -> TestResult {
        let table = PricingTable::standard()?;
        let candidates = singles(&[20_000, 1000, 5000])?;

        let batch = calculate_batch(&flat(), &candidates, &table)?;

        let order: Vec<&Quantities> = batch.entries.iter().map(|entry| &entry.quantities).collect();
        assert_eq!(order, candidates.iter().collect::<Vec<_>>());

        for entry in &batch.entries {
            let quote = entry.result.as_ref().map_err(ToString::to_string)?;
            assert_eq!(quote.quantities(), &entry.quantities);
        }

        Ok(())
    }

    #[test]
    fn no_candidates_is_a_validation_error() -> TestResult {
        let table = PricingTable::standard()?;

        assert_eq!(
            calculate_batch(&flat(), &[], &table),
            Err(ValidationError::Missing { field: "quantities" })
        );

        Ok(())
    }

    #[test]
    fn invalid_base_specification_fails_the_batch() -> TestResult {
        let table = PricingTable::standard()?;
        let request = QuoteRequest {
            width: None,
            ..flat()
        };

        let result = calculate_batch(&request, &singles(&[1000])?, &table);

        assert!(matches!(
            result,
            Err(ValidationError::Missing { field: "width" })
        ));

        Ok(())
    }

    #[test]
    fn failing_candidate_does_not_abort_the_rest() -> TestResult {
        let table = PricingTable::standard()?;

        // Film costs for the second candidate do not fit in minor units
        let candidates = vec![Quantities::single(1000)?, Quantities::single(u64::MAX / 2)?];

        let batch = calculate_batch(&flat(), &candidates, &table)?;

        assert!(batch.entries.first().is_some_and(|entry| entry.result.is_ok()));
        assert!(batch.entries.get(1).is_some_and(|entry| entry.result.is_err()));
        assert_eq!(batch.comparison.cheapest, Some(Quantities::single(1000)?));

        Ok(())
    }

    #[test]
    fn failed_entries_survive_a_clone() -> TestResult {
        let table = PricingTable::standard()?;
        let candidates = vec![Quantities::single(1000)?, Quantities::single(u64::MAX / 2)?];

        let batch = calculate_batch(&flat(), &candidates, &table)?;
        let copy = batch.clone();

        assert_eq!(copy, batch);
        assert!(matches!(
            copy.entries.get(1).map(|entry| &entry.result),
            Some(Err(QuoteError::InternalConsistency(_)))
        ));

        Ok(())
    }

    #[test]
    fn candidate_total_past_u64_is_an_overflow() -> TestResult {
        let table = PricingTable::standard()?;
        let candidates = vec![
            Quantities::single(1000)?,
            Quantities::per_sku([u64::MAX, u64::MAX])?,
        ];

        let batch = calculate_batch(&flat(), &candidates, &table)?;

        assert_eq!(
            batch.entries.get(1).map(|entry| &entry.result),
            Some(&Err(QuoteError::InternalConsistency(
                ConsistencyError::Overflow("total quantity")
            )))
        );

        Ok(())
    }

    #[test]
    fn price_breaks_follow_thresholds() -> TestResult {
        let table = PricingTable::standard()?;
        let batch = calculate_batch(&flat(), &singles(&[4999, 5000, 10_000, 50_000])?, &table)?;

        let labels: Vec<(&str, Decimal)> = batch
            .comparison
            .price_breaks
            .iter()
            .map(|tier| (tier.label.as_str(), tier.discount))
            .collect();

        assert_eq!(
            labels,
            vec![
                ("Minimum lot", Decimal::ZERO),
                ("Small lot", Decimal::from(10)),
                ("Standard lot", Decimal::from(20)),
                ("Large lot", Decimal::from(40)),
            ]
        );

        Ok(())
    }

    #[test]
    fn trend_compares_half_averages() {
        let tolerance = Decimal::new(5, 2);

        let falling = [Decimal::from(100), Decimal::from(90), Decimal::from(50), Decimal::from(40)];
        let rising = [Decimal::from(40), Decimal::from(50), Decimal::from(90), Decimal::from(100)];
        let flat = [Decimal::from(100), Decimal::from(98), Decimal::from(97), Decimal::from(101)];

        assert_eq!(price_trend(&falling, tolerance), PriceTrend::Decreasing);
        assert_eq!(price_trend(&rising, tolerance), PriceTrend::Increasing);
        assert_eq!(price_trend(&flat, tolerance), PriceTrend::Stable);
        assert_eq!(price_trend(&[Decimal::ONE], tolerance), PriceTrend::Stable);
    }

    #[test]
    fn diminishing_returns_compares_first_and_last_steps() {
        // First step saves 50%, last step 10%: 1 - 0.1 / 0.5 = 80%
        let prices = [Decimal::from(100), Decimal::from(50), Decimal::from(40), Decimal::from(36)];

        assert_eq!(diminishing_returns(&prices), Some(Decimal::from(80)));
        assert_eq!(diminishing_returns(&[Decimal::ONE, Decimal::TWO]), None);
    }

    #[test]
    fn economies_of_scale_are_relative_to_smallest_quantity() -> TestResult {
        let table = PricingTable::standard()?;
        let batch = calculate_batch(&flat(), &singles(&[10_000, 1000])?, &table)?;

        let steps = &batch.comparison.economies_of_scale;
        let [smallest, largest] = steps.as_slice() else {
            return Err("expected two steps".into());
        };

        assert_eq!(smallest.quantities, Quantities::single(1000)?);
        assert_eq!(smallest.efficiency, Decimal::ONE_HUNDRED);
        assert_eq!(smallest.total_savings, Decimal::ZERO);

        assert!(largest.efficiency < Decimal::ONE_HUNDRED);
        assert!(largest.total_savings > Decimal::ZERO);

        Ok(())
    }

    #[tokio::test]
    async fn yielding_variant_matches_synchronous() -> TestResult {
        let table = PricingTable::standard()?;
        let candidates = singles(&[1000, 5000, 10_000])?;

        let synchronous = calculate_batch(&flat(), &candidates, &table)?;
        let yielding = calculate_batch_yielding(&flat(), &candidates, &table).await?;

        assert_eq!(synchronous, yielding);

        Ok(())
    }

    #[test]
    fn entry_records_serialize_quote_or_error() -> TestResult {
        let table = PricingTable::standard()?;
        let batch = calculate_batch(&flat(), &singles(&[1000])?, &table)?;

        let record = batch.entries.first().map(BatchEntry::to_record).ok_or("no entry")?;
        let json = serde_json::to_value(&record)?;

        assert!(json.get("quote").is_some());
        assert_eq!(json.get("quantities"), Some(&serde_json::json!([1000])));

        let restored: BatchEntryRecord = serde_json::from_value(json)?;
        assert_eq!(restored, record);

        Ok(())
    }
}
