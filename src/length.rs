//! Length & Loss
//!
//! Converts requested quantities into committed film length. Rules, applied per SKU:
//!
//! - theoretical length is `quantity × pitch / (1000 × columns)`, exact wherever it can be
//! - a SKU whose theoretical length does not exceed the floor is pinned at the floor, unrounded
//! - otherwise it rounds up to the next multiple of the rounding unit
//!
//! The fixed setup loss is added once for the whole run. Per-SKU loss is a display share only.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    consistency::ConsistencyError, specification::Quantities, tables::LengthRules,
    yields::YieldProfile,
};

/// Film length committed to one SKU, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LengthPlan {
    /// Requested quantity
    pub quantity: u64,

    /// `quantity × pitch / (1000 × columns)`
    pub theoretical_meters: Decimal,

    /// Floor that applied to this SKU
    pub minimum_meters: Decimal,

    /// Length after the floor and rounding
    pub secured_meters: Decimal,

    /// This SKU's display share of the run's fixed loss
    pub loss_meters: Decimal,

    /// `secured_meters + loss_meters`
    pub total_meters: Decimal,
}

impl LengthPlan {
    /// Whether the SKU was pinned at the floor.
    pub fn at_minimum(&self) -> bool {
        self.secured_meters == self.minimum_meters && self.theoretical_meters <= self.minimum_meters
    }
}

/// Length plan for a whole production run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPlan {
    /// Per-SKU plans, in SKU order
    pub skus: Vec<LengthPlan>,

    /// Sum of secured lengths
    pub secured_meters: Decimal,

    /// Fixed loss, counted once
    pub loss_meters: Decimal,

    /// `secured_meters + loss_meters`
    pub total_meters: Decimal,
}

/// Secured length for a single SKU.
///
/// # Errors
///
/// Returns [`ConsistencyError`] on overflow or a negative theoretical length.
pub fn secured_length(
    theoretical: Decimal,
    minimum: Decimal,
    rounding_unit: Decimal,
) -> Result<Decimal, ConsistencyError> {
    if theoretical < Decimal::ZERO {
        return Err(ConsistencyError::NegativeLength {
            what: "theoretical length",
            value: theoretical,
        });
    }

    if theoretical <= minimum {
        return Ok(minimum);
    }

    let rounded = theoretical
        .checked_div(rounding_unit)
        .map(|units| units.ceil())
        .and_then(|units| units.checked_mul(rounding_unit))
        .ok_or(ConsistencyError::Overflow("secured length"))?;

    // The quotient can lose digits below the 28th, leaving the cover a hair short.
    if rounded < theoretical {
        return rounded
            .checked_add(rounding_unit)
            .ok_or(ConsistencyError::Overflow("secured length"));
    }

    Ok(rounded)
}

/// Plan film length for a run of SKUs sharing one yield profile.
///
/// # Errors
///
/// Returns [`ConsistencyError`] when the arithmetic overflows, a length comes out negative, or the
/// finished plan breaks its own invariants.
pub fn plan_batch(
    quantities: &Quantities,
    profile: &YieldProfile,
    rules: &LengthRules,
) -> Result<BatchPlan, ConsistencyError> {
    if profile.pitch <= Decimal::ZERO || profile.columns == 0 {
        return Err(ConsistencyError::Invariant(format!(
            "yield must be positive, got a {}mm pitch across {} columns",
            profile.pitch, profile.columns
        )));
    }

    let sku_count = quantities.sku_count();
    let minimum = rules.minimum_for(sku_count);
    let loss_share = rules
        .fixed_loss
        .checked_div(Decimal::from(sku_count))
        .ok_or(ConsistencyError::Overflow("loss share"))?;

    let skus = quantities
        .as_slice()
        .iter()
        .map(|&quantity| {
            let theoretical = profile
                .metres_for(quantity)
                .ok_or(ConsistencyError::Overflow("theoretical length"))?;

            let secured = secured_length(theoretical, minimum, rules.rounding_unit)?;

            let total = secured
                .checked_add(loss_share)
                .ok_or(ConsistencyError::Overflow("sku total length"))?;

            Ok(LengthPlan {
                quantity,
                theoretical_meters: theoretical,
                minimum_meters: minimum,
                secured_meters: secured,
                loss_meters: loss_share,
                total_meters: total,
            })
        })
        .collect::<Result<Vec<_>, ConsistencyError>>()?;

    let secured_meters = skus
        .iter()
        .try_fold(Decimal::ZERO, |acc, sku| acc.checked_add(sku.secured_meters))
        .ok_or(ConsistencyError::Overflow("secured length"))?;

    let total_meters = secured_meters
        .checked_add(rules.fixed_loss)
        .ok_or(ConsistencyError::Overflow("total length"))?;

    let plan = BatchPlan {
        skus,
        secured_meters,
        loss_meters: rules.fixed_loss,
        total_meters,
    };

    plan.check(rules)?;

    debug!(
        skus = sku_count,
        secured_meters = %plan.secured_meters,
        total_meters = %plan.total_meters,
        "planned film length"
    );

    Ok(plan)
}

impl BatchPlan {
    /// Verify the plan's invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConsistencyError::Invariant`] describing the first broken invariant.
    pub fn check(&self, rules: &LengthRules) -> Result<(), ConsistencyError> {
        let minimum = rules.minimum_for(self.skus.len());

        if self.total_meters < Decimal::ZERO {
            return Err(ConsistencyError::NegativeLength {
                what: "total length",
                value: self.total_meters,
            });
        }

        for (index, sku) in self.skus.iter().enumerate() {
            if sku.secured_meters < minimum {
                return Err(ConsistencyError::Invariant(format!(
                    "sku {index} secured {} below minimum {minimum}",
                    sku.secured_meters
                )));
            }

            if sku.theoretical_meters > minimum
                && (sku.secured_meters < sku.theoretical_meters
                    || !(sku.secured_meters % rules.rounding_unit).is_zero())
            {
                return Err(ConsistencyError::Invariant(format!(
                    "sku {index} secured {} is not a rounded cover of {}",
                    sku.secured_meters, sku.theoretical_meters
                )));
            }
        }

        if self.secured_meters + self.loss_meters != self.total_meters {
            return Err(ConsistencyError::Invariant(format!(
                "{} + {} != {}",
                self.secured_meters, self.loss_meters, self.total_meters
            )));
        }

        Ok(())
    }
}
