//! Economic Quantity Advisor
//!
//! Searches quantities that fill the film the order already secures, plus a few rounding steps
//! beyond it, and recommends the one with the lowest unit price. Strictly advisory: the original
//! quote is returned unchanged alongside the suggestion.

use std::fmt;

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    consistency::ConsistencyError,
    money::percent_points,
    parallel::{ParallelOption, ParallelOptionRecord, parallel_options},
    quote::{QuoteError, QuoteRecord, QuoteResult, price},
    request::QuoteRequest,
    specification::{Quantities, normalize},
    tables::PricingTable,
};

/// Why a quantity was recommended.
///
/// The logic never depends on the rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionReason {
    /// No searched quantity beats the request.
    AlreadyEconomic,

    /// More pouches fit in the film the order already pays for.
    FillsSecuredFilm {
        /// Extra units over the request
        extra_units: u64,
    },

    /// A slightly longer run spreads the fixed loss and setup over more units.
    AmortizesFixedLoss {
        /// Extra units over the request
        extra_units: u64,

        /// Extra metres of secured film
        extra_meters: Decimal,
    },
}

impl fmt::Display for SuggestionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuggestionReason::AlreadyEconomic => {
                f.write_str("the requested quantity is already the most economic")
            }
            SuggestionReason::FillsSecuredFilm { extra_units } => write!(
                f,
                "{extra_units} more units fit in the film already secured for this order"
            ),
            SuggestionReason::AmortizesFixedLoss {
                extra_units,
                extra_meters,
            } => write!(
                f,
                "{extra_units} more units on {extra_meters}m more film better amortize the fixed loss"
            ),
        }
    }
}

/// Advisory companion to a quote.
#[derive(Debug, Clone, PartialEq)]
pub struct EconomicSuggestion {
    /// The quote for the quantities actually requested
    pub original: QuoteResult,

    /// The cheapest quote found per unit
    pub recommended: QuoteResult,

    /// Distinct quantity sets priced during the search
    pub candidates_evaluated: usize,

    /// Relative unit-price saving of the recommendation, never negative
    pub savings: Percentage,

    /// Why the recommendation was made
    pub reason: SuggestionReason,

    /// Multi-lane production options for constructions that support them
    pub parallel_options: Vec<ParallelOption>,
}

impl EconomicSuggestion {
    /// Savings in percent points, e.g. `12.5`.
    pub fn percentage_savings(&self) -> Decimal {
        percent_points(self.savings)
    }

    /// Recommended quantities.
    pub fn recommended_quantities(&self) -> &Quantities {
        self.recommended.quantities()
    }

    /// Whether the recommendation differs from the request.
    pub fn changes_quantity(&self) -> bool {
        self.recommended.quantities() != self.original.quantities()
    }

    /// Serializable record.
    pub fn to_record(&self) -> SuggestionRecord {
        SuggestionRecord::from(self)
    }
}

/// Suggestion as persisted and displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRecord {
    /// Quote for the requested quantities
    pub original: QuoteRecord,
    /// Quote for the recommended quantities
    pub recommended: QuoteRecord,
    /// Quantity sets priced
    pub candidates_evaluated: usize,
    /// Unit-price saving in percent points
    pub percentage_savings: Decimal,
    /// Rendered reason
    pub reason: String,
    /// Multi-lane options
    pub parallel_options: Vec<ParallelOptionRecord>,
}

impl From<&EconomicSuggestion> for SuggestionRecord {
    fn from(suggestion: &EconomicSuggestion) -> Self {
        Self {
            original: suggestion.original.to_record(),
            recommended: suggestion.recommended.to_record(),
            candidates_evaluated: suggestion.candidates_evaluated,
            percentage_savings: suggestion.percentage_savings(),
            reason: suggestion.reason.to_string(),
            parallel_options: suggestion
                .parallel_options
                .iter()
                .map(ParallelOption::to_record)
                .collect(),
        }
    }
}

/// Suggest a more economic quantity for a request.
///
/// # Errors
///
/// Returns a [`QuoteError`] if the request itself cannot be priced. A candidate that fails to price
/// is skipped; the original quote is always a candidate.
pub fn suggest_economic_quantity(
    request: &QuoteRequest,
    table: &PricingTable,
) -> Result<EconomicSuggestion, QuoteError> {
    let spec = normalize(request, table)?;
    let original = price(&spec, table)?;

    let mut best = original.clone();
    let mut evaluated = 1;

    for quantities in candidates(&original, table)? {
        if &quantities == original.quantities() {
            continue;
        }

        let candidate = match price(&spec.with_quantities(quantities), table) {
            Ok(candidate) => candidate,
            Err(err) => {
                debug!(error = %err, "skipping advisor candidate");
                continue;
            }
        };

        evaluated += 1;

        if is_better(&candidate, &best) {
            best = candidate;
        }
    }

    let savings = savings(&original, &best);
    let reason = reason(&original, &best);
    let parallel_options = parallel_options(&original, table)?;

    info!(
        requested = %original.quantities(),
        recommended = %best.quantities(),
        candidates = evaluated,
        savings = %percent_points(savings),
        "suggested economic quantity"
    );

    Ok(EconomicSuggestion {
        original,
        recommended: best,
        candidates_evaluated: evaluated,
        savings,
        reason,
        parallel_options,
    })
}

/// Candidate quantity sets: every SKU filled to its secured length, then extended by whole
/// rounding units.
fn candidates(
    original: &QuoteResult,
    table: &PricingTable,
) -> Result<Vec<Quantities>, ConsistencyError> {
    let profile = &original.yield_profile;
    let unit = table.lengths.rounding_unit;
    let mut sets = Vec::new();

    for step in 0..=table.advisor.search_steps {
        let extension = unit
            .checked_mul(Decimal::from(step))
            .ok_or(ConsistencyError::Overflow("advisor extension"))?;

        let quantities = original
            .plan
            .skus
            .iter()
            .map(|sku| {
                sku.secured_meters
                    .checked_add(extension)
                    .and_then(|meters| profile.units_in(meters))
                    .map(|units| units.floor())
                    .and_then(|units| units.to_u64())
                    .map(|units| units.max(sku.quantity))
                    .ok_or(ConsistencyError::Overflow("advisor candidate"))
            })
            .collect::<Result<Vec<u64>, ConsistencyError>>()?;

        let Ok(quantities) = Quantities::per_sku(quantities) else {
            continue;
        };

        if !sets.contains(&quantities) {
            sets.push(quantities);
        }
    }

    Ok(sets)
}

/// Lower unit price wins; on a tie the smaller total quantity does.
fn is_better(candidate: &QuoteResult, best: &QuoteResult) -> bool {
    match candidate.unit_price_exact.cmp(&best.unit_price_exact) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Equal => candidate.quantity() < best.quantity(),
        std::cmp::Ordering::Greater => false,
    }
}

fn savings(original: &QuoteResult, recommended: &QuoteResult) -> Percentage {
    let before = original.unit_price_exact;
    let after = recommended.unit_price_exact;

    if before <= Decimal::ZERO || after >= before {
        return Percentage::from(Decimal::ZERO);
    }

    Percentage::from((before - after) / before)
}

fn reason(original: &QuoteResult, recommended: &QuoteResult) -> SuggestionReason {
    if recommended.quantities() == original.quantities() {
        return SuggestionReason::AlreadyEconomic;
    }

    let extra_units = recommended.quantity().saturating_sub(original.quantity());
    let extra_meters = recommended.plan.secured_meters - original.plan.secured_meters;

    if extra_meters <= Decimal::ZERO {
        SuggestionReason::FillsSecuredFilm { extra_units }
    } else {
        SuggestionReason::AmortizesFixedLoss {
            extra_units,
            extra_meters,
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn flat(quantity: i64) -> QuoteRequest {
        QuoteRequest {
            bag_type: Some("flat_3_side".to_string()),
            width: Some(Decimal::from(120)),
            height: Some(Decimal::from(180)),
            quantity: Some(quantity),
            ..QuoteRequest::default()
        }
    }

    #[test]
    fn recommendation_never_costs_more_per_unit() -> TestResult {
        let table = PricingTable::standard()?;

        for quantity in [300, 1000, 4000, 4200, 9000, 25_000] {
            let suggestion = suggest_economic_quantity(&flat(quantity), &table)?;

            assert!(
                suggestion.recommended.unit_price_exact <= suggestion.original.unit_price_exact,
                "{quantity}"
            );
            assert!(suggestion.percentage_savings() >= Decimal::ZERO, "{quantity}");
        }

        Ok(())
    }

    #[test]
    fn small_order_is_filled_to_the_secured_floor() -> TestResult {
        let table = PricingTable::standard()?;
        let suggestion = suggest_economic_quantity(&flat(1000), &table)?;

        // 120mm pitch: 500m floor holds 4166
        let profile = &suggestion.original.yield_profile;
        let filled = suggestion
            .original
            .plan
            .skus
            .first()
            .and_then(|sku| profile.units_in(sku.secured_meters))
            .map(|units| units.floor())
            .ok_or("no sku")?;

        assert_eq!(filled, Decimal::from(4166));
        assert!(suggestion.changes_quantity());
        assert!(suggestion.recommended.quantity() >= 4166);
        assert!(suggestion.percentage_savings() > Decimal::ZERO);

        Ok(())
    }

    #[test]
    fn original_quote_is_left_untouched() -> TestResult {
        let table = PricingTable::standard()?;
        let request = flat(2500);

        let suggestion = suggest_economic_quantity(&request, &table)?;
        let direct = crate::quote::calculate_quote(&request, &table)?;

        assert_eq!(suggestion.original, direct);

        Ok(())
    }

    #[test]
    fn candidates_keep_every_sku_at_or_above_request() -> TestResult {
        let table = PricingTable::standard()?;
        let request = QuoteRequest {
            quantity: None,
            sku_quantities: vec![800, 3100],
            ..flat(0)
        };

        let spec = normalize(&request, &table)?;

        for candidate in candidates(&price(&spec, &table)?, &table)? {
            let [first, second] = candidate.as_slice() else {
                return Err("expected two skus".into());
            };

            assert!(*first >= 800 && *second >= 3100, "{candidate}");
        }

        Ok(())
    }

    #[test]
    fn record_carries_both_quotes() -> TestResult {
        let table = PricingTable::standard()?;
        let suggestion = suggest_economic_quantity(&flat(1000), &table)?;

        let record = suggestion.to_record();

        assert_eq!(record.original.quantity, 1000);
        assert_eq!(record.recommended.quantity, suggestion.recommended.quantity());
        assert_eq!(record.reason, suggestion.reason.to_string());
        assert!(record.parallel_options.is_empty());

        let json = serde_json::to_string(&record)?;
        let restored: SuggestionRecord = serde_json::from_str(&json)?;
        assert_eq!(restored, record);

        Ok(())
    }

    #[test]
    fn reason_text_is_templated() {
        let reason = SuggestionReason::FillsSecuredFilm { extra_units: 3166 };

        assert_eq!(
            reason.to_string(),
            "3166 more units fit in the film already secured for this order"
        );
        assert_eq!(
            SuggestionReason::AlreadyEconomic.to_string(),
            "the requested quantity is already the most economic"
        );
    }
}
