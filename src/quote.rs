//! Quotes
//!
//! The single-quote entry point: normalize, compute yield, plan length, compose costs.

use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::{
    consistency::ConsistencyError,
    costs::{CostBreakdown, compose},
    length::{BatchPlan, LengthPlan, plan_batch},
    money::from_major,
    request::QuoteRequest,
    specification::{BagType, PackagingSpecification, Quantities, ValidationError, normalize},
    tables::PricingTable,
    yields::{GeometryError, YieldProfile, yield_profile},
};

/// Errors from a quote calculation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QuoteError {
    /// The request is malformed or semantically invalid.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The construction cannot be laid out on the available film.
    #[error(transparent)]
    InvalidGeometry(#[from] GeometryError),

    /// The engine's own arithmetic broke an invariant.
    #[error("internal consistency failure: {0}")]
    InternalConsistency(#[from] ConsistencyError),
}

impl QuoteError {
    /// Short machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            QuoteError::Validation(_) => "validation",
            QuoteError::InvalidGeometry(_) => "invalidGeometry",
            QuoteError::InternalConsistency(_) => "internalConsistency",
        }
    }
}

/// A priced quote.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteResult {
    /// Pricing table version the quote was priced with
    pub table_version: String,

    /// Resolved specification
    pub specification: PackagingSpecification,

    /// Physical yield
    pub yield_profile: YieldProfile,

    /// Film length plan
    pub plan: BatchPlan,

    /// Cost breakdown
    pub costs: CostBreakdown,

    /// Total requested quantity across SKUs
    pub total_quantity: u64,

    /// Total price divided by the requested quantity, unrounded
    pub unit_price_exact: Decimal,

    /// Unit price rounded to minor units
    pub unit_price: Money<'static, Currency>,
}

impl QuoteResult {
    /// Requested quantities.
    pub fn quantities(&self) -> &Quantities {
        self.specification.quantities()
    }

    /// Total requested quantity across SKUs.
    pub fn quantity(&self) -> u64 {
        self.total_quantity
    }

    /// Total price.
    pub fn total_price(&self) -> Money<'static, Currency> {
        self.costs.total
    }

    /// Serializable record for persistence and display.
    pub fn to_record(&self) -> QuoteRecord {
        QuoteRecord::from(self)
    }
}

/// Price a raw request.
///
/// # Errors
///
/// Returns [`QuoteError::Validation`] for bad input, [`QuoteError::InvalidGeometry`] when the
/// construction does not fit the film, and [`QuoteError::InternalConsistency`] if the engine's
/// own arithmetic breaks an invariant.
pub fn calculate_quote(
    request: &QuoteRequest,
    table: &PricingTable,
) -> Result<QuoteResult, QuoteError> {
    let spec = normalize(request, table)?;
    let result = price(&spec, table)?;

    info!(
        table_version = %table.version,
        bag_type = %spec.bag_type(),
        quantity = result.quantity(),
        total_meters = %result.plan.total_meters,
        total = result.costs.total.to_minor_units(),
        unit_price = %result.unit_price_exact.round_dp(4),
        "calculated quote"
    );

    Ok(result)
}

/// Price an already-normalized specification.
///
/// # Errors
///
/// Same as [`calculate_quote`], minus validation.
pub fn price(
    spec: &PackagingSpecification,
    table: &PricingTable,
) -> Result<QuoteResult, QuoteError> {
    let yield_profile = yield_profile(spec, table)?;

    price_with_yield(spec, yield_profile, table).inspect_err(|err| {
        if let QuoteError::InternalConsistency(inner) = err {
            error!(
                table_version = %table.version,
                bag_type = %spec.bag_type(),
                quantities = %spec.quantities(),
                error = %inner,
                "internal consistency failure"
            );
        }
    })
}

fn price_with_yield(
    spec: &PackagingSpecification,
    yield_profile: YieldProfile,
    table: &PricingTable,
) -> Result<QuoteResult, QuoteError> {
    let total_quantity = spec.quantities().total()?;
    let plan = plan_batch(spec.quantities(), &yield_profile, &table.lengths)?;

    let costs = compose(spec, &yield_profile, &plan, table)?;

    let unit_price_exact = crate::money::to_major(&costs.total)
        .checked_div(Decimal::from(total_quantity))
        .ok_or(ConsistencyError::Overflow("unit price"))?;
    let unit_price = from_major(unit_price_exact, table.currency).map_err(ConsistencyError::from)?;

    Ok(QuoteResult {
        table_version: table.version.clone(),
        specification: spec.clone(),
        yield_profile,
        plan,
        costs,
        total_quantity,
        unit_price_exact,
        unit_price,
    })
}

/// Cost breakdown as persisted, in integer minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdownRecord {
    /// ISO currency code
    pub currency: String,
    /// Laminated film material
    pub material: i64,
    /// Printing
    pub printing: i64,
    /// Matte varnish
    pub matte: i64,
    /// Lamination
    pub lamination: i64,
    /// Slitting
    pub slitter: i64,
    /// Bag making
    pub bag_making: i64,
    /// Post-processing surcharge
    pub post_processing: i64,
    /// Setup
    pub setup: i64,
    /// Tooling
    pub tooling: i64,
    /// Subtotal
    pub subtotal: i64,
    /// Manufacturer margin
    pub manufacturing_margin: i64,
    /// Duty
    pub duty: i64,
    /// Delivery
    pub delivery: i64,
    /// Sales margin
    pub sales_margin: i64,
    /// Total
    pub total: i64,
    /// Product of option multipliers
    pub option_multiplier: Decimal,
    /// Film weight in kilograms
    pub weight_kg: Decimal,
    /// Delivery boxes
    pub delivery_boxes: u64,
}

impl From<&CostBreakdown> for CostBreakdownRecord {
    fn from(costs: &CostBreakdown) -> Self {
        Self {
            currency: costs.total.currency().iso_alpha_code.to_string(),
            material: costs.material.to_minor_units(),
            printing: costs.printing.to_minor_units(),
            matte: costs.matte.to_minor_units(),
            lamination: costs.lamination.to_minor_units(),
            slitter: costs.slitter.to_minor_units(),
            bag_making: costs.bag_making.to_minor_units(),
            post_processing: costs.post_processing.to_minor_units(),
            setup: costs.setup.to_minor_units(),
            tooling: costs.tooling.to_minor_units(),
            subtotal: costs.subtotal.to_minor_units(),
            manufacturing_margin: costs.manufacturing_margin.to_minor_units(),
            duty: costs.duty.to_minor_units(),
            delivery: costs.delivery.to_minor_units(),
            sales_margin: costs.sales_margin.to_minor_units(),
            total: costs.total.to_minor_units(),
            option_multiplier: costs.option_multiplier,
            weight_kg: costs.weight_kg,
            delivery_boxes: costs.delivery_boxes,
        }
    }
}

/// Quote as persisted by callers and re-displayed by admin tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRecord {
    /// Pricing table version
    pub table_version: String,
    /// Bag construction
    pub bag_type: BagType,
    /// Total requested quantity
    pub quantity: u64,
    /// Unit price in minor units
    pub unit_price: i64,
    /// Total price in minor units
    pub total_price: i64,
    /// Pouches per metre, columns and film widths
    pub yield_profile: YieldProfile,
    /// Per-SKU length plans
    pub skus: Vec<LengthPlan>,
    /// Fixed loss for the run
    pub loss_meters: Decimal,
    /// Total film length for the run
    pub total_meters: Decimal,
    /// Cost breakdown
    pub cost_breakdown: CostBreakdownRecord,
}

impl From<&QuoteResult> for QuoteRecord {
    fn from(result: &QuoteResult) -> Self {
        Self {
            table_version: result.table_version.clone(),
            bag_type: result.specification.bag_type(),
            quantity: result.quantity(),
            unit_price: result.unit_price.to_minor_units(),
            total_price: result.costs.total.to_minor_units(),
            yield_profile: result.yield_profile,
            skus: result.plan.skus.clone(),
            loss_meters: result.plan.loss_meters,
            total_meters: result.plan.total_meters,
            cost_breakdown: CostBreakdownRecord::from(&result.costs),
        }
    }
}
