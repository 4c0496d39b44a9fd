//! Cost Composition
//!
//! Costs are computed exactly in [`Decimal`] and each component is rounded to integer minor units
//! exactly once. Subtotals, margins and totals are built from the rounded components.

use rust_decimal::{Decimal, prelude::ToPrimitive};
use rusty_money::{Money, iso::Currency};
use tracing::debug;

use crate::{
    consistency::ConsistencyError,
    length::BatchPlan,
    money::{from_major, percent_of, sum, to_major},
    specification::{PackagingSpecification, Printing},
    tables::{BagMakingTier, PricingTable},
    yields::YieldProfile,
};

/// Millimetres per metre.
const MM_PER_METRE: Decimal = Decimal::ONE_THOUSAND;

/// Millimetres per centimetre.
const MM_PER_CM: Decimal = Decimal::TEN;

/// Exact film-dependent costs for a given roll width and length, in major units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilmCosts {
    /// Laminated film material
    pub material: Decimal,
    /// Film weight in kilograms
    pub weight_kg: Decimal,
    /// Printing
    pub printing: Decimal,
    /// Matte varnish
    pub matte: Decimal,
    /// Lamination bonds
    pub lamination: Decimal,
}

impl FilmCosts {
    /// Costs that scale with the film run: material, printing, matte and lamination.
    ///
    /// # Errors
    ///
    /// Returns [`ConsistencyError::Overflow`] on overflow.
    pub fn film_total(&self) -> Result<Decimal, ConsistencyError> {
        self.material
            .checked_add(self.printing)
            .and_then(|total| total.checked_add(self.matte))
            .and_then(|total| total.checked_add(self.lamination))
            .ok_or(ConsistencyError::Overflow("film cost"))
    }
}

/// Structured cost breakdown of a quote.
#[derive(Debug, Clone, PartialEq)]
pub struct CostBreakdown {
    /// Laminated film material
    pub material: Money<'static, Currency>,
    /// Printing
    pub printing: Money<'static, Currency>,
    /// Matte varnish
    pub matte: Money<'static, Currency>,
    /// Lamination bonds
    pub lamination: Money<'static, Currency>,
    /// Slitting
    pub slitter: Money<'static, Currency>,
    /// Bag making, summed over SKUs
    pub bag_making: Money<'static, Currency>,
    /// Post-processing surcharge from option multipliers
    pub post_processing: Money<'static, Currency>,
    /// Machine setup
    pub setup: Money<'static, Currency>,
    /// Printing plates or cylinders
    pub tooling: Money<'static, Currency>,
    /// Sum of the components above
    pub subtotal: Money<'static, Currency>,
    /// Manufacturer margin on the subtotal
    pub manufacturing_margin: Money<'static, Currency>,
    /// Import duty
    pub duty: Money<'static, Currency>,
    /// Delivery boxes
    pub delivery: Money<'static, Currency>,
    /// Sales margin on the landed cost
    pub sales_margin: Money<'static, Currency>,
    /// Total price
    pub total: Money<'static, Currency>,
    /// Product of the selected option multipliers
    pub option_multiplier: Decimal,
    /// Film weight in kilograms
    pub weight_kg: Decimal,
    /// Number of delivery boxes
    pub delivery_boxes: u64,
}

impl CostBreakdown {
    /// Setup plus tooling: the costs charged once per quote regardless of quantity.
    ///
    /// # Errors
    ///
    /// Returns [`ConsistencyError::Amount`] on currency mismatch.
    pub fn fixed(&self) -> Result<Money<'static, Currency>, ConsistencyError> {
        Ok(self.setup.add(self.tooling).map_err(crate::money::AmountError::from)?)
    }
}

/// Film costs for a specification over `length` metres of roll `roll_width_metres` wide.
///
/// # Errors
///
/// Returns [`ConsistencyError`] on overflow or when a material or printing tier is missing from
/// the table.
pub fn film_costs(
    spec: &PackagingSpecification,
    roll_width_metres: Decimal,
    length: Decimal,
    table: &PricingTable,
) -> Result<FilmCosts, ConsistencyError> {
    let area = roll_width_metres
        .checked_mul(length)
        .ok_or(ConsistencyError::Overflow("film area"))?;

    let mut material = Decimal::ZERO;
    let mut weight_kg = Decimal::ZERO;

    for layer in spec.layers() {
        let rates = table
            .material(&layer.material_id)
            .ok_or_else(|| ConsistencyError::MissingRate(format!("material {}", layer.material_id)))?;

        let weight = (layer.thickness / MM_PER_METRE)
            .checked_mul(area)
            .and_then(|volume| volume.checked_mul(rates.density))
            .ok_or(ConsistencyError::Overflow("layer weight"))?;

        let cost = weight
            .checked_mul(rates.price_per_kg)
            .ok_or(ConsistencyError::Overflow("layer cost"))?;

        weight_kg = weight_kg
            .checked_add(weight)
            .ok_or(ConsistencyError::Overflow("film weight"))?;
        material = material
            .checked_add(cost)
            .ok_or(ConsistencyError::Overflow("material cost"))?;
    }

    let printing = match spec.printing() {
        Printing::None => Decimal::ZERO,
        Printing::Printed { process, colors } => {
            let tier = table.printing_tier(process, colors).ok_or_else(|| {
                ConsistencyError::MissingRate(format!("{process:?} printing tier for {colors}"))
            })?;

            tier.per_metre
                .checked_mul(length)
                .ok_or(ConsistencyError::Overflow("printing cost"))?
        }
    };

    let matte = if spec.post_processing().is_matte() {
        area.checked_mul(table.processes.matte_per_metre)
            .ok_or(ConsistencyError::Overflow("matte cost"))?
    } else {
        Decimal::ZERO
    };

    let bonds = Decimal::from(spec.layers().len().saturating_sub(1));
    let lamination = area
        .checked_mul(bonds)
        .and_then(|bonded| bonded.checked_mul(table.processes.lamination_per_m2))
        .ok_or(ConsistencyError::Overflow("lamination cost"))?;

    Ok(FilmCosts {
        material,
        weight_kg,
        printing,
        matte,
        lamination,
    })
}

/// Slitting for a run: `max(minimum, length × rate)`.
///
/// # Errors
///
/// Returns [`ConsistencyError::Overflow`] on overflow.
pub fn slitter_cost(length: Decimal, table: &PricingTable) -> Result<Decimal, ConsistencyError> {
    let calculated = length
        .checked_mul(table.processes.slitter_per_metre)
        .ok_or(ConsistencyError::Overflow("slitter cost"))?;

    Ok(calculated.max(to_major(&table.processes.slitter_minimum)))
}

/// Bag making summed over SKUs: `max(minimum, width_cm × rate × quantity)` each.
///
/// # Errors
///
/// Returns [`ConsistencyError`] on overflow or a missing rate.
pub fn bag_making_cost(
    spec: &PackagingSpecification,
    table: &PricingTable,
) -> Result<Decimal, ConsistencyError> {
    let Some(tier) = BagMakingTier::for_bag(spec.bag_type(), spec.post_processing().has_zipper())
    else {
        return Ok(Decimal::ZERO);
    };

    let rate = table
        .bag_making
        .get(&tier)
        .ok_or_else(|| ConsistencyError::MissingRate(format!("bag making rate {tier:?}")))?;

    let width_cm = spec.dimensions().width / MM_PER_CM;
    let minimum = to_major(&rate.minimum);

    spec.quantities()
        .as_slice()
        .iter()
        .try_fold(Decimal::ZERO, |acc, &quantity| {
            let cost = width_cm
                .checked_mul(rate.per_cm)?
                .checked_mul(Decimal::from(quantity))?
                .max(minimum);

            acc.checked_add(cost)
        })
        .ok_or(ConsistencyError::Overflow("bag making cost"))
}

/// Product of the selected options' multipliers.
pub fn option_multiplier(spec: &PackagingSpecification, table: &PricingTable) -> Decimal {
    spec.post_processing()
        .options()
        .iter()
        .fold(Decimal::ONE, |acc, option| acc * table.option_multiplier(*option))
}

/// Delivery boxes for a film weight.
///
/// # Errors
///
/// Returns [`ConsistencyError`] on overflow or a negative weight.
pub fn delivery_boxes(weight_kg: Decimal, table: &PricingTable) -> Result<u64, ConsistencyError> {
    if weight_kg < Decimal::ZERO {
        return Err(ConsistencyError::Invariant(format!(
            "film weight is negative: {weight_kg}"
        )));
    }

    weight_kg
        .checked_div(table.delivery.box_kg)
        .map(|boxes| boxes.ceil())
        .and_then(|boxes| boxes.to_u64())
        .ok_or(ConsistencyError::Overflow("delivery boxes"))
}

fn rounded(
    what: &'static str,
    amount: Decimal,
    currency: &'static Currency,
) -> Result<Money<'static, Currency>, ConsistencyError> {
    if amount < Decimal::ZERO {
        return Err(ConsistencyError::NegativeCost {
            what,
            value: amount,
        });
    }

    Ok(from_major(amount, currency)?)
}

/// Compose the cost breakdown for a planned run.
///
/// # Errors
///
/// Returns [`ConsistencyError`] when any component overflows, comes out negative or needs a rate
/// the table does not define.
pub fn compose(
    spec: &PackagingSpecification,
    profile: &YieldProfile,
    plan: &BatchPlan,
    table: &PricingTable,
) -> Result<CostBreakdown, ConsistencyError> {
    let currency = table.currency;
    let length = plan.total_meters;

    let film = film_costs(spec, profile.roll_width_metres(), length, table)?;
    let slitter = slitter_cost(length, table)?;
    let bag_making = bag_making_cost(spec, table)?;
    let multiplier = option_multiplier(spec, table);

    let base = film
        .film_total()?
        .checked_add(bag_making)
        .ok_or(ConsistencyError::Overflow("post-processing base"))?;

    let surcharge = base
        .checked_mul(multiplier - Decimal::ONE)
        .ok_or(ConsistencyError::Overflow("post-processing surcharge"))?;

    let tooling = match spec.printing() {
        Printing::None => Money::from_minor(0, currency),
        Printing::Printed { process, colors } => table
            .printing_tier(process, colors)
            .map(|tier| tier.tooling)
            .ok_or_else(|| ConsistencyError::MissingRate(format!("{process:?} tooling")))?,
    };

    let material = rounded("material", film.material, currency)?;
    let printing = rounded("printing", film.printing, currency)?;
    let matte = rounded("matte", film.matte, currency)?;
    let lamination = rounded("lamination", film.lamination, currency)?;
    let slitter = rounded("slitter", slitter, currency)?;
    let bag_making = rounded("bag making", bag_making, currency)?;
    let post_processing = from_major(surcharge, currency)?;
    let setup = table.setup;

    let subtotal = sum(
        currency,
        &[
            material,
            printing,
            matte,
            lamination,
            slitter,
            bag_making,
            post_processing,
            setup,
            tooling,
        ],
    )?;

    if subtotal.to_minor_units() <= 0 {
        return Err(ConsistencyError::NegativeCost {
            what: "subtotal",
            value: to_major(&subtotal),
        });
    }

    let manufacturing_margin = percent_of(table.markups.manufacturing, &subtotal)?;
    let manufactured = sum(currency, &[subtotal, manufacturing_margin])?;

    let duty = percent_of(table.markups.duty, &manufactured)?;

    let boxes = delivery_boxes(film.weight_kg, table)?;
    let delivery = i64::try_from(boxes)
        .ok()
        .and_then(|boxes| table.delivery.per_box.to_minor_units().checked_mul(boxes))
        .map(|minor| Money::from_minor(minor, currency))
        .ok_or(ConsistencyError::Overflow("delivery cost"))?;

    let landed = sum(currency, &[manufactured, duty, delivery])?;
    let sales_margin = percent_of(table.markups.sales, &landed)?;
    let total = sum(currency, &[landed, sales_margin])?;

    debug!(
        total_meters = %length,
        weight_kg = %film.weight_kg,
        subtotal = subtotal.to_minor_units(),
        total = total.to_minor_units(),
        "composed costs"
    );

    Ok(CostBreakdown {
        material,
        printing,
        matte,
        lamination,
        slitter,
        bag_making,
        post_processing,
        setup,
        tooling,
        subtotal,
        manufacturing_margin,
        duty,
        delivery,
        sales_margin,
        total,
        option_multiplier: multiplier,
        weight_kg: film.weight_kg,
        delivery_boxes: boxes,
    })
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;
    use crate::{
        length::plan_batch, request::QuoteRequest, specification::normalize,
        yields::yield_profile,
    };

    fn flat(quantity: i64, post_processing: &[&str]) -> QuoteRequest {
        QuoteRequest {
            bag_type: Some("flat_3_side".to_string()),
            width: Some(Decimal::from(120)),
            height: Some(Decimal::from(180)),
            quantity: Some(quantity),
            post_processing: post_processing.iter().map(ToString::to_string).collect(),
            ..QuoteRequest::default()
        }
    }

    fn breakdown(request: &QuoteRequest, table: &PricingTable) -> TestResult<CostBreakdown> {
        let spec = normalize(request, table)?;
        let profile = yield_profile(&spec, table)?;
        let plan = plan_batch(spec.quantities(), &profile, &table.lengths)?;

        Ok(compose(&spec, &profile, &plan, table)?)
    }

    #[test]
    fn material_cost_follows_layer_formula() -> TestResult {
        let table = PricingTable::standard()?;
        let spec = normalize(&flat(1000, &[]), &table)?;

        // 590mm roll, 900m: PET 12µ, AL 7µ, LLDPE 80µ
        let film = film_costs(&spec, Decimal::new(59, 2), Decimal::from(900), &table)?;

        assert_eq!(film.material.round_dp(4), Decimal::new(255_571_999, 4));
        assert_eq!(film.weight_kg.round_dp(4), Decimal::new(580_755, 4));
        assert_eq!(film.printing, Decimal::from(51_300));
        assert_eq!(film.lamination, Decimal::from(9_558));
        assert_eq!(film.matte, Decimal::ZERO);

        Ok(())
    }

    #[test]
    fn components_add_up() -> TestResult {
        let table = PricingTable::standard()?;
        let costs = breakdown(&flat(5000, &["matte"]), &table)?;

        let subtotal = costs.material.to_minor_units()
            + costs.printing.to_minor_units()
            + costs.matte.to_minor_units()
            + costs.lamination.to_minor_units()
            + costs.slitter.to_minor_units()
            + costs.bag_making.to_minor_units()
            + costs.post_processing.to_minor_units()
            + costs.setup.to_minor_units()
            + costs.tooling.to_minor_units();

        assert_eq!(costs.subtotal.to_minor_units(), subtotal);
        assert!(costs.matte.to_minor_units() > 0);

        let total = costs.subtotal.to_minor_units()
            + costs.manufacturing_margin.to_minor_units()
            + costs.duty.to_minor_units()
            + costs.delivery.to_minor_units()
            + costs.sales_margin.to_minor_units();

        assert_eq!(costs.total.to_minor_units(), total);

        Ok(())
    }

    #[test]
    fn multipliers_compose_multiplicatively() -> TestResult {
        let mut table = PricingTable::standard()?;
        table
            .option_multipliers
            .insert("matte".parse()?, Decimal::new(110, 2));
        table
            .option_multipliers
            .insert("valve-yes".parse()?, Decimal::new(105, 2));

        let spec = normalize(&flat(1000, &["matte", "valve-yes"]), &table)?;

        assert_eq!(option_multiplier(&spec, &table), Decimal::new(1155, 3));

        Ok(())
    }

    #[test]
    fn default_options_carry_no_surcharge() -> TestResult {
        let table = PricingTable::standard()?;
        let costs = breakdown(&flat(1000, &[]), &table)?;

        assert_eq!(costs.option_multiplier, Decimal::ONE);
        assert_eq!(costs.post_processing.to_minor_units(), 0);

        Ok(())
    }

    #[test]
    fn bag_making_minimum_applies_per_sku() -> TestResult {
        let table = PricingTable::standard()?;
        let request = QuoteRequest {
            quantity: None,
            sku_quantities: vec![1000, 1000],
            ..flat(0, &["zipper-no"])
        };

        let spec = normalize(&request, &table)?;

        // 12cm × 0.048 × 1000 = 576 per SKU, below the 24000 minimum
        assert_eq!(bag_making_cost(&spec, &table)?, Decimal::from(48_000));

        Ok(())
    }

    #[test]
    fn slitter_has_a_minimum() -> TestResult {
        let table = PricingTable::standard()?;

        assert_eq!(slitter_cost(Decimal::from(900), &table)?, Decimal::from(3600));
        assert_eq!(slitter_cost(Decimal::from(5000), &table)?, Decimal::from(6000));

        Ok(())
    }

    #[test]
    fn delivery_rounds_boxes_up() -> TestResult {
        let table = PricingTable::standard()?;

        assert_eq!(delivery_boxes(Decimal::from(29), &table)?, 1);
        assert_eq!(delivery_boxes(Decimal::new(2901, 2), &table)?, 2);

        Ok(())
    }

    #[test]
    fn roll_film_has_no_bag_making() -> TestResult {
        let table = PricingTable::standard()?;
        let request = QuoteRequest {
            bag_type: Some("roll_film".to_string()),
            width: Some(Decimal::from(300)),
            quantity: Some(2000),
            ..QuoteRequest::default()
        };

        let costs = breakdown(&request, &table)?;

        assert_eq!(costs.bag_making.to_minor_units(), 0);
        assert!(costs.total.to_minor_units() > 0);

        Ok(())
    }
}
