//! Physical Yield
//!
//! How many sellable units one metre of base film produces, and which film and roll widths the
//! run needs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
    specification::{BagType, PackagingSpecification},
    tables::PricingTable,
};

/// Millimetres per metre.
const MM_PER_METRE: Decimal = Decimal::ONE_THOUSAND;

/// Errors raised when a construction cannot be laid out on the available film.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeometryError {
    /// Even a single column needs more film than the line can run.
    #[error("{bag_type} needs {film_width}mm of film, wider than the {max_film_width}mm limit")]
    FilmTooWide {
        /// Construction
        bag_type: BagType,
        /// Narrowest film width the construction needs
        film_width: Decimal,
        /// Widest film available
        max_film_width: Decimal,
    },

    /// No roll stock is wide enough for the film.
    #[error("no roll stock serves {film_width}mm film")]
    NoRollStock {
        /// Film width
        film_width: Decimal,
    },

    /// The pricing table has no packing rule for the construction.
    #[error("no packing geometry for {0}")]
    MissingRule(BagType),

    /// The pitch or yield works out non-positive.
    #[error("{bag_type} yields {pouches_per_metre} units per metre")]
    NonPositiveYield {
        /// Construction
        bag_type: BagType,
        /// Computed yield
        pouches_per_metre: Decimal,
    },

    /// The yield does not fit in a decimal.
    #[error("{bag_type} yield overflows at a {pitch}mm pitch across {columns} columns")]
    Overflow {
        /// Construction
        bag_type: BagType,
        /// Pitch along the web
        pitch: Decimal,
        /// Pouches across the web
        columns: u32,
    },
}

/// Physical yield of a specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldProfile {
    /// Sellable units per metre of base film; strictly positive
    pub pouches_per_metre: Decimal,

    /// Film consumed per pouch along the web, in millimetres
    pub pitch: Decimal,

    /// Pouches across the web
    pub columns: u32,

    /// Finished film width, in millimetres
    pub film_width: Decimal,

    /// Raw roll width the film is cut from, in millimetres
    pub roll_width: Decimal,
}

impl YieldProfile {
    /// Build a profile from a pitch, column count and film width, resolving roll stock from the
    /// table.
    ///
    /// # Errors
    ///
    /// Returns a [`GeometryError`] if the yield is non-positive or overflows, or no roll stock
    /// fits.
    pub fn new(
        bag_type: BagType,
        pitch: Decimal,
        columns: u32,
        film_width: Decimal,
        table: &PricingTable,
    ) -> Result<Self, GeometryError> {
        let pouches_per_metre = pouches_per_metre(bag_type, pitch, columns)?;

        let roll = table
            .film
            .roll_for(film_width)
            .ok_or(GeometryError::NoRollStock { film_width })?;

        Ok(Self {
            pouches_per_metre,
            pitch,
            columns,
            film_width,
            roll_width: roll.roll_width,
        })
    }

    /// Film needed for `quantity` units, in metres: `quantity × pitch / (1000 × columns)`.
    ///
    /// Computed from the pitch rather than the rounded yield so exact lengths stay exact.
    pub fn metres_for(&self, quantity: u64) -> Option<Decimal> {
        Decimal::from(quantity)
            .checked_mul(self.pitch)?
            .checked_div(MM_PER_METRE.checked_mul(Decimal::from(self.columns))?)
    }

    /// Units that fit in `metres` of film: `metres × 1000 × columns / pitch`, unfloored.
    pub fn units_in(&self, metres: Decimal) -> Option<Decimal> {
        metres
            .checked_mul(MM_PER_METRE)?
            .checked_mul(Decimal::from(self.columns))?
            .checked_div(self.pitch)
    }

    /// Roll width in metres.
    pub fn roll_width_metres(&self) -> Decimal {
        self.roll_width / MM_PER_METRE
    }
}

/// `1000 / pitch × columns`, rejecting non-positive results and reporting overflow.
fn pouches_per_metre(
    bag_type: BagType,
    pitch: Decimal,
    columns: u32,
) -> Result<Decimal, GeometryError> {
    if pitch <= Decimal::ZERO || columns == 0 {
        return Err(GeometryError::NonPositiveYield {
            bag_type,
            pouches_per_metre: Decimal::ZERO,
        });
    }

    MM_PER_METRE
        .checked_div(pitch)
        .and_then(|per_column| per_column.checked_mul(Decimal::from(columns)))
        .ok_or(GeometryError::Overflow {
            bag_type,
            pitch,
            columns,
        })
}

/// Compute the yield profile for a specification.
///
/// Pouches are packed with the most columns whose film width fits the line; roll film is sold by
/// the metre and always yields one unit per metre.
///
/// # Errors
///
/// Returns a [`GeometryError`] when no layout fits or the yield is non-positive or overflows.
pub fn yield_profile(
    spec: &PackagingSpecification,
    table: &PricingTable,
) -> Result<YieldProfile, GeometryError> {
    let bag_type = spec.bag_type();
    let dimensions = spec.dimensions();
    let max_film_width = table.film.max_film_width;

    if bag_type.is_roll_film() {
        if dimensions.width > max_film_width {
            return Err(GeometryError::FilmTooWide {
                bag_type,
                film_width: dimensions.width,
                max_film_width,
            });
        }

        return YieldProfile::new(bag_type, MM_PER_METRE, 1, dimensions.width, table);
    }

    let rule = table
        .geometry
        .get(&bag_type)
        .ok_or(GeometryError::MissingRule(bag_type))?;

    let mut narrowest = None;
    let mut chosen = None;

    for layout in &rule.layouts {
        let Some(film_width) = layout.film_width.apply(dimensions) else {
            continue;
        };

        narrowest = Some(narrowest.map_or(film_width, |width: Decimal| width.min(film_width)));

        if film_width > Decimal::ZERO && film_width <= max_film_width {
            chosen = Some((layout.columns, film_width));
            break;
        }
    }

    let Some((columns, film_width)) = chosen else {
        return Err(GeometryError::FilmTooWide {
            bag_type,
            film_width: narrowest.unwrap_or(Decimal::MAX),
            max_film_width,
        });
    };

    let pitch = rule
        .pitch
        .apply(dimensions)
        .ok_or(GeometryError::NonPositiveYield {
            bag_type,
            pouches_per_metre: Decimal::ZERO,
        })?;

    let profile = YieldProfile::new(bag_type, pitch, columns, film_width, table)?;

    debug!(
        bag_type = %bag_type,
        pitch = %pitch,
        columns,
        film_width = %film_width,
        roll_width = %profile.roll_width,
        pouches_per_metre = %profile.pouches_per_metre,
        "computed yield"
    );

    Ok(profile)
}
