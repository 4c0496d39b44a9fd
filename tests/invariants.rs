//! Property sweeps over every sample request in the standard fixture set.

use rust_decimal::Decimal;
use testresult::TestResult;

use pouch_quote::{
    advisor::suggest_economic_quantity,
    fixtures::Fixture,
    logging,
    quote::{QuoteResult, calculate_quote},
};

fn samples() -> TestResult<(Fixture, Vec<String>)> {
    logging::init_test();

    let fixture = Fixture::from_set("standard")?;
    let names = fixture.request_names().map(str::to_string).collect();

    Ok((fixture, names))
}

fn minor(quote: &QuoteResult) -> [i64; 9] {
    let costs = &quote.costs;

    [
        costs.material,
        costs.printing,
        costs.matte,
        costs.lamination,
        costs.slitter,
        costs.bag_making,
        costs.post_processing,
        costs.setup,
        costs.tooling,
    ]
    .map(|amount| amount.to_minor_units())
}

#[test]
fn every_sample_prices() -> TestResult {
    let (fixture, names) = samples()?;

    assert!(names.len() >= 5);

    for name in &names {
        let quote = calculate_quote(fixture.request(name)?, fixture.table()?)
            .map_err(|err| format!("{name}: {err}"))?;

        assert!(quote.unit_price_exact > Decimal::ZERO, "{name}");
        assert!(quote.costs.total.to_minor_units() > 0, "{name}");
    }

    Ok(())
}

#[test]
fn lengths_respect_floor_rounding_and_single_loss() -> TestResult {
    let (fixture, names) = samples()?;
    let table = fixture.table()?;
    let unit = table.lengths.rounding_unit;

    for name in &names {
        let quote = calculate_quote(fixture.request(name)?, table)?;
        let plan = &quote.plan;

        let secured: Decimal = plan.skus.iter().map(|sku| sku.secured_meters).sum();
        let shares: Decimal = plan.skus.iter().map(|sku| sku.loss_meters).sum();

        assert_eq!(plan.secured_meters, secured, "{name}");
        assert_eq!(plan.loss_meters, table.lengths.fixed_loss, "{name}");
        assert_eq!(shares.round_dp(6), plan.loss_meters, "{name}");
        assert_eq!(plan.total_meters, plan.secured_meters + plan.loss_meters, "{name}");

        for sku in &plan.skus {
            assert!(sku.secured_meters >= sku.minimum_meters, "{name}");
            assert!(sku.secured_meters >= sku.theoretical_meters, "{name}");
            assert!(
                sku.at_minimum() || (sku.secured_meters % unit).is_zero(),
                "{name}: {}",
                sku.secured_meters
            );
        }
    }

    Ok(())
}

#[test]
fn cost_components_add_up_to_the_total() -> TestResult {
    let (fixture, names) = samples()?;

    for name in &names {
        let quote = calculate_quote(fixture.request(name)?, fixture.table()?)?;
        let costs = &quote.costs;

        let subtotal: i64 = minor(&quote).iter().sum();
        assert_eq!(costs.subtotal.to_minor_units(), subtotal, "{name}");

        for amount in minor(&quote) {
            assert!(amount >= 0, "{name}");
        }

        let total = costs.subtotal.to_minor_units()
            + costs.manufacturing_margin.to_minor_units()
            + costs.duty.to_minor_units()
            + costs.delivery.to_minor_units()
            + costs.sales_margin.to_minor_units();

        assert_eq!(costs.total.to_minor_units(), total, "{name}");
        assert_eq!(quote.total_price(), costs.total, "{name}");
    }

    Ok(())
}

#[test]
fn unit_price_is_total_over_requested_quantity() -> TestResult {
    let (fixture, names) = samples()?;

    for name in &names {
        let quote = calculate_quote(fixture.request(name)?, fixture.table()?)?;

        let expected =
            Decimal::from(quote.costs.total.to_minor_units()) / Decimal::from(quote.quantity());

        assert_eq!(quote.unit_price_exact, expected, "{name}");
    }

    Ok(())
}

#[test]
fn quotes_are_deterministic() -> TestResult {
    let (fixture, names) = samples()?;

    for name in &names {
        let request = fixture.request(name)?;

        assert_eq!(
            calculate_quote(request, fixture.table()?)?,
            calculate_quote(request, fixture.table()?)?,
            "{name}"
        );
    }

    Ok(())
}

#[test]
fn unit_price_never_rises_with_quantity() -> TestResult {
    let (fixture, _) = samples()?;
    let table = fixture.table()?;

    for name in ["flat_pouch", "multi_sku"] {
        let base = fixture.request(name)?;
        let skus = base.sku_quantities.len().max(1);
        let mut previous: Option<Decimal> = None;

        for quantity in [500, 1000, 2000, 4000, 8000, 16_000, 32_000, 64_000] {
            let request = base.with_sku_quantities(&vec![quantity; skus]);
            let unit_price = calculate_quote(&request, table)?.unit_price_exact;

            if let Some(previous) = previous {
                assert!(
                    unit_price <= previous,
                    "{name} at {quantity}: {unit_price} > {previous}"
                );
            }

            previous = Some(unit_price);
        }
    }

    Ok(())
}

#[test]
fn suggestions_never_cost_more_per_unit() -> TestResult {
    let (fixture, names) = samples()?;

    for name in &names {
        let request = fixture.request(name)?;
        let suggestion = suggest_economic_quantity(request, fixture.table()?)?;

        assert!(suggestion.percentage_savings() >= Decimal::ZERO, "{name}");
        assert!(
            suggestion.recommended.unit_price_exact <= suggestion.original.unit_price_exact,
            "{name}"
        );
        assert_eq!(
            suggestion.original,
            calculate_quote(request, fixture.table()?)?,
            "{name}"
        );

        for (recommended, requested) in suggestion
            .recommended_quantities()
            .as_slice()
            .iter()
            .zip(suggestion.original.quantities().as_slice())
        {
            assert!(recommended >= requested, "{name}");
        }
    }

    Ok(())
}
