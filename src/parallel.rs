//! Parallel Production
//!
//! Narrow films can run several lanes side by side on one raw roll. Each additional lane shares
//! the film, printing and lamination run at a discount; slitting and delivery are charged in full.

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    consistency::ConsistencyError,
    costs::{delivery_boxes, film_costs, slitter_cost},
    money::{from_major, percent_points, to_major},
    quote::QuoteResult,
    specification::PackagingSpecification,
    tables::{ParallelRules, PricingTable},
};

/// Millimetres per metre.
const MM_PER_METRE: Decimal = Decimal::ONE_THOUSAND;

/// A multi-lane run on one raw roll.
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelOption {
    /// Lanes run side by side, at least two
    pub lanes: u32,

    /// Raw roll width used, in millimetres
    pub roll_width: Decimal,

    /// Share of the raw roll width covered by finished film
    pub utilisation: Percentage,

    /// Cost of the whole multi-lane run
    pub run_cost: Money<'static, Currency>,

    /// Run cost divided by the number of lanes
    pub lane_cost: Money<'static, Currency>,

    /// Single-lane run cost the option is compared with
    pub baseline_cost: Money<'static, Currency>,

    /// Saving of one lane against the single-lane run; negative when a lane costs more
    pub savings: Percentage,

    /// Whether the option uses the roll well enough to recommend
    pub recommended: bool,
}

impl ParallelOption {
    /// Serializable record.
    pub fn to_record(&self) -> ParallelOptionRecord {
        ParallelOptionRecord::from(self)
    }
}

/// Parallel option as persisted, in minor units and percent points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelOptionRecord {
    /// Lanes side by side
    pub lanes: u32,
    /// Raw roll width in millimetres
    pub roll_width: Decimal,
    /// Roll utilisation in percent points
    pub utilisation: Decimal,
    /// Whole run cost
    pub run_cost: i64,
    /// Cost per lane
    pub lane_cost: i64,
    /// Single-lane comparison cost
    pub baseline_cost: i64,
    /// Saving per lane in percent points
    pub savings: Decimal,
    /// Recommended
    pub recommended: bool,
}

impl From<&ParallelOption> for ParallelOptionRecord {
    fn from(option: &ParallelOption) -> Self {
        Self {
            lanes: option.lanes,
            roll_width: option.roll_width,
            utilisation: percent_points(option.utilisation),
            run_cost: option.run_cost.to_minor_units(),
            lane_cost: option.lane_cost.to_minor_units(),
            baseline_cost: option.baseline_cost.to_minor_units(),
            savings: percent_points(option.savings),
            recommended: option.recommended,
        }
    }
}

/// Price multiplier on the shared run cost for `lanes` lanes.
pub fn lane_factor(lanes: u32, rules: &ParallelRules) -> Decimal {
    if lanes <= 1 {
        return Decimal::ONE;
    }

    Decimal::ONE
        + rules.second_lane * Decimal::ONE
        + rules.additional_lane * Decimal::ONE * Decimal::from(lanes - 2)
}

/// Run cost for `lanes` lanes cut from a roll `roll_width` millimetres wide.
///
/// # Errors
///
/// Returns [`ConsistencyError`] on overflow or a missing rate.
pub fn run_cost(
    spec: &PackagingSpecification,
    roll_width: Decimal,
    length: Decimal,
    lanes: u32,
    table: &PricingTable,
) -> Result<Decimal, ConsistencyError> {
    let film = film_costs(spec, roll_width / MM_PER_METRE, length, table)?;

    let shared = film
        .material
        .checked_add(film.printing)
        .and_then(|cost| cost.checked_add(film.lamination))
        .and_then(|cost| cost.checked_mul(lane_factor(lanes, &table.parallel)))
        .ok_or(ConsistencyError::Overflow("parallel run cost"))?;

    let boxes = Decimal::from(delivery_boxes(film.weight_kg, table)?);
    let delivery = to_major(&table.delivery.per_box)
        .checked_mul(boxes)
        .ok_or(ConsistencyError::Overflow("parallel delivery"))?;

    shared
        .checked_add(slitter_cost(length, table)?)
        .and_then(|cost| cost.checked_add(delivery))
        .ok_or(ConsistencyError::Overflow("parallel run cost"))
}

/// Multi-lane options for a priced quote, best roll utilisation first.
///
/// Empty for constructions that cannot run in parallel.
///
/// # Errors
///
/// Returns [`ConsistencyError`] on overflow or a missing rate.
pub fn parallel_options(
    result: &QuoteResult,
    table: &PricingTable,
) -> Result<Vec<ParallelOption>, ConsistencyError> {
    let spec = &result.specification;
    let rules = &table.parallel;

    if !rules.bag_types.contains(&spec.bag_type()) {
        return Ok(Vec::new());
    }

    let film_width = result.yield_profile.film_width;
    let length = result.plan.total_meters;
    let currency = table.currency;

    if film_width <= Decimal::ZERO {
        return Err(ConsistencyError::Invariant(format!(
            "film width must be positive, got {film_width}"
        )));
    }

    let baseline = run_cost(spec, result.yield_profile.roll_width, length, 1, table)?;
    let baseline_cost = from_major(baseline, currency)?;

    let mut options: Vec<ParallelOption> = Vec::new();

    for roll in &table.film.rolls {
        let usable = roll.roll_width - table.film.edge_trim;
        let max_lanes = (usable / film_width).floor();

        let mut lanes = 2_u32;

        while Decimal::from(lanes) <= max_lanes {
            // A narrower roll already offered this lane count at better utilisation
            if options.iter().any(|option| option.lanes == lanes) {
                lanes += 1;
                continue;
            }

            let total = run_cost(spec, roll.roll_width, length, lanes, table)?;
            let per_lane = total / Decimal::from(lanes);

            let savings = if baseline.is_zero() {
                Decimal::ZERO
            } else {
                (baseline - per_lane) / baseline
            };

            options.push(ParallelOption {
                lanes,
                roll_width: roll.roll_width,
                utilisation: Percentage::from(Decimal::from(lanes) * film_width / roll.roll_width),
                run_cost: from_major(total, currency)?,
                lane_cost: from_major(per_lane, currency)?,
                baseline_cost,
                savings: Percentage::from(savings),
                recommended: false,
            });

            lanes += 1;
        }
    }

    options.sort_by(|a, b| (b.utilisation * Decimal::ONE).cmp(&(a.utilisation * Decimal::ONE)));

    let best = options
        .first()
        .map(|option| option.utilisation * Decimal::ONE);
    let threshold = rules.recommended_utilisation * Decimal::ONE;

    for option in &mut options {
        let utilisation = option.utilisation * Decimal::ONE;
        option.recommended = utilisation >= threshold || Some(utilisation) == best;
    }

    debug!(
        bag_type = %spec.bag_type(),
        film_width = %film_width,
        options = options.len(),
        "computed parallel production options"
    );

    Ok(options)
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;
    use crate::{quote::calculate_quote, request::QuoteRequest};

    fn roll_film(width: i64, metres: i64) -> QuoteRequest {
        QuoteRequest {
            bag_type: Some("roll_film".to_string()),
            width: Some(Decimal::from(width)),
            quantity: Some(metres),
            ..QuoteRequest::default()
        }
    }

    #[test]
    fn lane_factor_discounts_second_and_later_lanes() -> TestResult {
        let table = PricingTable::standard()?;

        assert_eq!(lane_factor(1, &table.parallel), Decimal::ONE);
        assert_eq!(lane_factor(2, &table.parallel), Decimal::new(16, 1));
        assert_eq!(lane_factor(4, &table.parallel), Decimal::new(22, 1));

        Ok(())
    }

    #[test]
    fn narrow_roll_film_offers_two_and_three_lanes() -> TestResult {
        let table = PricingTable::standard()?;
        let result = calculate_quote(&roll_film(200, 500), &table)?;

        let options = parallel_options(&result, &table)?;

        // 590 - 20 fits two 200mm lanes; 760 - 20 fits three, and its two-lane run is dropped
        assert_eq!(options.len(), 2);

        let [best, second] = options.as_slice() else {
            return Err("expected two options".into());
        };

        assert_eq!((best.lanes, best.roll_width), (3, Decimal::from(760)));
        assert_eq!((second.lanes, second.roll_width), (2, Decimal::from(590)));

        assert!(best.recommended);
        assert!(!second.recommended);

        for option in &options {
            assert!(option.savings * Decimal::ONE > Decimal::ZERO, "{option:?}");
            assert!(
                option.lane_cost.to_minor_units() < option.baseline_cost.to_minor_units(),
                "{option:?}"
            );
        }

        Ok(())
    }

    #[test]
    fn best_option_is_recommended_below_threshold() -> TestResult {
        let mut table = PricingTable::standard()?;
        table.parallel.recommended_utilisation = Percentage::from(Decimal::new(99, 2));

        let result = calculate_quote(&roll_film(200, 500), &table)?;
        let options = parallel_options(&result, &table)?;

        let recommended: Vec<u32> = options
            .iter()
            .filter(|option| option.recommended)
            .map(|option| option.lanes)
            .collect();

        assert_eq!(recommended, vec![3]);

        Ok(())
    }

    #[test]
    fn record_reports_percent_points() -> TestResult {
        let table = PricingTable::standard()?;
        let result = calculate_quote(&roll_film(200, 500), &table)?;

        let record = parallel_options(&result, &table)?
            .first()
            .map(ParallelOption::to_record)
            .ok_or("no options")?;

        assert_eq!(record.lanes, 3);
        assert_eq!(record.utilisation, Decimal::new(7895, 2));
        assert!(record.lane_cost < record.baseline_cost);
        assert!(record.recommended);

        let json = serde_json::to_value(&record)?;
        assert!(json.get("baselineCost").is_some());

        Ok(())
    }

    #[test]
    fn flat_pouches_have_no_parallel_options() -> TestResult {
        let table = PricingTable::standard()?;
        let request = QuoteRequest {
            bag_type: Some("flat_3_side".to_string()),
            width: Some(Decimal::from(120)),
            height: Some(Decimal::from(180)),
            quantity: Some(1000),
            ..QuoteRequest::default()
        };

        let result = calculate_quote(&request, &table)?;

        assert!(parallel_options(&result, &table)?.is_empty());

        Ok(())
    }

    #[test]
    fn film_too_wide_for_two_lanes_has_no_options() -> TestResult {
        let table = PricingTable::standard()?;
        let result = calculate_quote(&roll_film(400, 500), &table)?;

        assert!(parallel_options(&result, &table)?.is_empty());

        Ok(())
    }
}
