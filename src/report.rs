//! Reports
//!
//! Terminal tables for quotes, batch comparisons and suggestions.

use std::io;

use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{Alignment, Color, Style, Theme, object::Columns, object::Rows},
};
use thiserror::Error;

use crate::{
    advisor::EconomicSuggestion,
    batch::{BatchComparison, PriceTrend},
    money::percent_points,
    quote::QuoteResult,
};

/// Errors that can occur when writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Writing to the output failed.
    #[error("failed to write report")]
    IO(#[from] io::Error),
}

/// Write a single quote: the length plan, the cost breakdown and the prices.
///
/// # Errors
///
/// Returns [`ReportError::IO`] if the output cannot be written.
pub fn write_quote(mut out: impl io::Write, quote: &QuoteResult) -> Result<(), ReportError> {
    let spec = &quote.specification;
    let profile = &quote.yield_profile;

    writeln!(
        out,
        "\n {} {}×{}×{}mm, {} columns on {}mm film ({}mm roll), {} per metre  [{}]",
        spec.bag_type(),
        spec.dimensions().width,
        spec.dimensions().height,
        spec.dimensions().depth,
        profile.columns,
        profile.film_width,
        profile.roll_width,
        profile.pouches_per_metre.round_dp(3),
        quote.table_version,
    )?;

    let mut lengths = Builder::default();
    lengths.push_record(["SKU", "Quantity", "Theoretical m", "Secured m", "Loss m", "Total m"]);

    for (index, sku) in quote.plan.skus.iter().enumerate() {
        lengths.push_record([
            (index + 1).to_string(),
            sku.quantity.to_string(),
            sku.theoretical_meters.round_dp(2).to_string(),
            sku.secured_meters.to_string(),
            sku.loss_meters.round_dp(2).to_string(),
            sku.total_meters.round_dp(2).to_string(),
        ]);
    }

    lengths.push_record([
        String::new(),
        quote.quantity().to_string(),
        String::new(),
        quote.plan.secured_meters.to_string(),
        quote.plan.loss_meters.to_string(),
        quote.plan.total_meters.to_string(),
    ]);

    write_table(&mut out, lengths, 1..6, true)?;

    let costs = &quote.costs;
    let mut breakdown = Builder::default();
    breakdown.push_record(["Component", "Amount"]);

    for (label, amount) in [
        ("Material", costs.material),
        ("Printing", costs.printing),
        ("Matte", costs.matte),
        ("Lamination", costs.lamination),
        ("Slitting", costs.slitter),
        ("Bag making", costs.bag_making),
        ("Post-processing", costs.post_processing),
        ("Setup", costs.setup),
        ("Tooling", costs.tooling),
        ("Subtotal", costs.subtotal),
        ("Manufacturing margin", costs.manufacturing_margin),
        ("Duty", costs.duty),
        ("Delivery", costs.delivery),
        ("Sales margin", costs.sales_margin),
    ] {
        breakdown.push_record([label.to_string(), amount.to_string()]);
    }

    write_table(&mut out, breakdown, 1..2, false)?;

    writeln!(
        out,
        " Weight: {}kg in {} boxes, options ×{}",
        costs.weight_kg.round_dp(2),
        costs.delivery_boxes,
        costs.option_multiplier
    )?;
    writeln!(out, " \x1b[1mTotal: {}\x1b[0m", costs.total)?;
    writeln!(
        out,
        " Unit price: {} ({})\n",
        quote.unit_price,
        quote.unit_price_exact.round_dp(4)
    )?;

    Ok(())
}

/// Write a batch comparison, one row per candidate in input order.
///
/// # Errors
///
/// Returns [`ReportError::IO`] if the output cannot be written.
pub fn write_batch(mut out: impl io::Write, batch: &BatchComparison) -> Result<(), ReportError> {
    let comparison = &batch.comparison;
    let mut builder = Builder::default();

    builder.push_record(["Quantity", "Film m", "Unit price", "Total", "Lot", "Discount"]);

    for entry in &batch.entries {
        let tier = comparison
            .price_breaks
            .iter()
            .find(|tier| tier.quantities == entry.quantities);

        match &entry.result {
            Ok(quote) => {
                let marker = if comparison.cheapest.as_ref() == Some(&entry.quantities) {
                    " *"
                } else {
                    ""
                };

                builder.push_record([
                    format!("{}{marker}", entry.quantities),
                    quote.plan.total_meters.to_string(),
                    quote.unit_price_exact.round_dp(2).to_string(),
                    quote.total_price().to_string(),
                    tier.map(|tier| tier.label.clone()).unwrap_or_default(),
                    tier.map(|tier| format!("{}%", tier.discount.normalize()))
                        .unwrap_or_default(),
                ]);
            }
            Err(err) => {
                builder.push_record([
                    entry.quantities.to_string(),
                    String::new(),
                    String::new(),
                    String::new(),
                    err.kind().to_string(),
                    err.to_string(),
                ]);
            }
        }
    }

    write_table(&mut out, builder, 1..4, false)?;

    let trend = match comparison.trends.price_trend {
        PriceTrend::Increasing => "increasing",
        PriceTrend::Decreasing => "decreasing",
        PriceTrend::Stable => "stable",
    };

    writeln!(out, " Unit price trend: {trend}")?;

    if let Some(diminishing) = comparison.trends.diminishing_returns {
        writeln!(out, " Diminishing returns: {diminishing}%")?;
    }

    if !comparison.economies_of_scale.is_empty() {
        let mut scale = Builder::default();
        scale.push_record(["Quantity", "Unit price", "Savings vs smallest", "Cost efficiency"]);

        for step in &comparison.economies_of_scale {
            scale.push_record([
                step.quantities.to_string(),
                step.unit_price.round_dp(2).to_string(),
                step.total_savings.to_string(),
                format!("{}%", step.efficiency),
            ]);
        }

        write_table(&mut out, scale, 1..4, false)?;
    }

    writeln!(out)?;

    Ok(())
}

/// Write an economic quantity suggestion with any parallel production options.
///
/// # Errors
///
/// Returns [`ReportError::IO`] if the output cannot be written.
pub fn write_suggestion(
    mut out: impl io::Write,
    suggestion: &EconomicSuggestion,
) -> Result<(), ReportError> {
    writeln!(
        out,
        "\n Requested {} at {} per unit",
        suggestion.original.quantities(),
        suggestion.original.unit_price_exact.round_dp(2)
    )?;
    writeln!(
        out,
        " \x1b[1mRecommended {} at {} per unit\x1b[0m (saves {}%, {} candidates)",
        suggestion.recommended.quantities(),
        suggestion.recommended.unit_price_exact.round_dp(2),
        suggestion.percentage_savings(),
        suggestion.candidates_evaluated
    )?;
    writeln!(out, " {}", suggestion.reason)?;

    if !suggestion.parallel_options.is_empty() {
        let mut builder = Builder::default();
        builder.push_record(["Lanes", "Roll mm", "Utilisation", "Lane cost", "Savings", ""]);

        for option in &suggestion.parallel_options {
            builder.push_record([
                option.lanes.to_string(),
                option.roll_width.to_string(),
                format!("{}%", percent_points(option.utilisation).round_dp(1)),
                option.lane_cost.to_string(),
                format!("{}%", percent_points(option.savings).round_dp(1)),
                if option.recommended { "recommended" } else { "" }.to_string(),
            ]);
        }

        write_table(&mut out, builder, 0..5, false)?;
    }

    writeln!(out)?;

    Ok(())
}

fn write_table(
    out: &mut impl io::Write,
    builder: Builder,
    numeric: std::ops::Range<usize>,
    total_row: bool,
) -> Result<(), ReportError> {
    let mut table = builder.build();
    let rows = table.count_rows();
    let mut theme = Theme::from(Style::modern_rounded());
    let separator = HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤'));

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(1, separator);

    if total_row && rows > 2 {
        theme.insert_horizontal_line(rows - 1, separator);
    }

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(numeric), Alignment::right());

    writeln!(out, "{table}")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use super::*;
    use crate::{
        advisor::suggest_economic_quantity, batch::calculate_batch, quote::calculate_quote,
        request::QuoteRequest, specification::Quantities, tables::PricingTable,
    };

    fn flat() -> QuoteRequest {
        QuoteRequest {
            bag_type: Some("flat_3_side".to_string()),
            width: Some(Decimal::from(120)),
            height: Some(Decimal::from(180)),
            quantity: Some(3000),
            ..QuoteRequest::default()
        }
    }

    #[test]
    fn quote_report_lists_lengths_and_costs() -> TestResult {
        let table = PricingTable::standard()?;
        let quote = calculate_quote(&flat(), &table)?;

        let mut out = Vec::new();
        write_quote(&mut out, &quote)?;

        let output = String::from_utf8(out)?;
        assert!(output.contains("Secured m"));
        assert!(output.contains("Bag making"));
        assert!(output.contains("Total:"));
        assert!(output.contains("2026.10-standard"));

        Ok(())
    }

    #[test]
    fn batch_report_marks_the_cheapest_candidate() -> TestResult {
        let table = PricingTable::standard()?;
        let candidates = vec![Quantities::single(1000)?, Quantities::single(20_000)?];
        let batch = calculate_batch(&flat(), &candidates, &table)?;

        let mut out = Vec::new();
        write_batch(&mut out, &batch)?;

        let output = String::from_utf8(out)?;
        assert!(output.contains("20000 *"));
        assert!(output.contains("Medium lot"));
        assert!(output.contains("Unit price trend: decreasing"));

        Ok(())
    }

    #[test]
    fn suggestion_report_shows_parallel_options() -> TestResult {
        let table = PricingTable::standard()?;
        let request = QuoteRequest {
            bag_type: Some("roll_film".to_string()),
            width: Some(Decimal::from(200)),
            height: None,
            quantity: Some(500),
            ..QuoteRequest::default()
        };

        let suggestion = suggest_economic_quantity(&request, &table)?;

        let mut out = Vec::new();
        write_suggestion(&mut out, &suggestion)?;

        let output = String::from_utf8(out)?;
        assert!(output.contains("Recommended"));
        assert!(output.contains("Lanes"));
        assert!(output.contains("recommended"));

        Ok(())
    }
}
