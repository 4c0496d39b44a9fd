//! Pricing Table Loader
//!
//! YAML is deserialized into fixture structs first, then converted with [`TryFrom`] so that
//! amounts, percentages and identifiers are validated in one place.

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use rustc_hash::FxHashMap;
use rusty_money::{
    Money,
    iso::{Currency, EUR, GBP, JPY, KRW, USD},
};
use serde::Deserialize;
use slotmap::SlotMap;
use thiserror::Error;

use crate::{
    specification::{
        BagType, ColorCount, FilmLayer, PostProcessingOption, Printing, PrintingKind,
        ThicknessClass,
    },
    tables::{
        AdvisorRules, BagMakingRate, BagMakingTier, ColumnLayout, ComparisonRules, DeliveryRate,
        Defaults, FilmRules, GeometryRule, LengthRules, LinearFormula, Markups, Material,
        ParallelRules, PriceBreak, PricingTable, PrintingTier, ProcessRates, RollWidth,
    },
};

/// Pricing table parsing errors
#[derive(Debug, Error)]
pub enum TableError {
    /// IO error reading the table file
    #[error("Failed to read pricing table: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Invalid percentage format
    #[error("Invalid percentage format: {0}")]
    InvalidPercentage(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Amount in a different currency from the table
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),

    /// A layer references a material the table does not define
    #[error("Material not found: {0}")]
    MaterialNotFound(String),

    /// An option multiplier references an unknown option id
    #[error("Unknown post-processing option: {0}")]
    UnknownOption(String),

    /// A pouch type has no packing geometry
    #[error("No geometry defined for bag type {0}")]
    MissingGeometry(BagType),

    /// A value is present but unusable
    #[error("Invalid {field}: {reason}")]
    Invalid {
        /// Table field
        field: &'static str,
        /// Human-readable reason
        reason: String,
    },
}

/// Pricing table as written in YAML
#[derive(Debug, Deserialize)]
pub struct PricingTableFixture {
    /// Price list version
    pub version: String,

    /// ISO currency code
    pub currency: String,

    /// Material id -> material
    pub materials: FxHashMap<String, MaterialFixture>,

    /// Sealant thickness multipliers
    pub thickness_classes: FxHashMap<ThicknessClass, Decimal>,

    /// Request defaults
    pub defaults: DefaultsFixture,

    /// Packing geometry per bag type
    pub geometry: FxHashMap<BagType, GeometryFixture>,

    /// Film limits
    pub film: FilmFixture,

    /// Printing tiers per process
    pub printing: FxHashMap<PrintingKind, Vec<PrintingTierFixture>>,

    /// Converting process rates
    pub processes: ProcessesFixture,

    /// Bag-making rates per tier
    pub bag_making: FxHashMap<BagMakingTier, BagMakingFixture>,

    /// Option id -> multiplier
    #[serde(default)]
    pub option_multipliers: FxHashMap<String, Decimal>,

    /// Machine setup (e.g. "6000 JPY")
    pub setup: String,

    /// Margins and duty
    pub markups: MarkupsFixture,

    /// Delivery boxes
    pub delivery: DeliveryFixture,

    /// Length rules
    pub lengths: LengthRules,

    /// Economic quantity search
    pub advisor: AdvisorRules,

    /// Multi-lane production
    pub parallel: ParallelFixture,

    /// Batch comparison
    pub comparison: ComparisonFixture,
}

/// Material Fixture
#[derive(Debug, Deserialize)]
pub struct MaterialFixture {
    /// Display name
    pub name: String,
    /// Specific gravity
    pub density: Decimal,
    /// Price per kilogram in major units
    pub price_per_kg: Decimal,
    /// Default thickness in microns
    pub default_thickness: Decimal,
    /// Scaled by the thickness class
    #[serde(default)]
    pub sealant: bool,
}

/// Defaults Fixture
#[derive(Debug, Deserialize)]
pub struct DefaultsFixture {
    /// Thickness class
    pub thickness: ThicknessClass,
    /// Film structure
    pub layers: Vec<LayerFixture>,
    /// Printing
    pub printing: PrintingFixture,
}

/// Layer Fixture
#[derive(Debug, Deserialize)]
pub struct LayerFixture {
    /// Material id
    pub material: String,
    /// Thickness in microns
    pub thickness: Decimal,
}

/// Printing Fixture
#[derive(Debug, Deserialize)]
pub struct PrintingFixture {
    /// `none` or a printing process
    pub kind: String,
    /// Colour count
    #[serde(default)]
    pub colors: Option<ColorsFixture>,
}

/// Colour count or `full`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ColorsFixture {
    /// Numbered colours
    Count(u8),
    /// Named tier
    Named(String),
}

impl ColorsFixture {
    fn into_color_count(self) -> Result<ColorCount, TableError> {
        match self {
            ColorsFixture::Count(count) => Ok(ColorCount::Colors(count)),
            ColorsFixture::Named(name) if name == "full" => Ok(ColorCount::Full),
            ColorsFixture::Named(name) => Err(TableError::Invalid {
                field: "colors",
                reason: format!("expected a number or `full`, got `{name}`"),
            }),
        }
    }
}

/// Geometry Fixture
#[derive(Debug, Deserialize)]
pub struct GeometryFixture {
    /// Pitch formula
    pub pitch: LinearFormula,
    /// Column layouts
    pub layouts: Vec<ColumnLayout>,
}

/// Film Fixture
#[derive(Debug, Deserialize)]
pub struct FilmFixture {
    /// Widest film the line can run
    pub max_film_width: Decimal,
    /// Edge trim across the roll
    pub edge_trim: Decimal,
    /// Roll stock
    pub rolls: Vec<RollWidth>,
}

/// Printing Tier Fixture
#[derive(Debug, Deserialize)]
pub struct PrintingTierFixture {
    /// Colour ceiling or `full`
    pub colors: ColorsFixture,
    /// Price per metre
    pub per_metre: Decimal,
    /// Tooling (e.g. "14400 JPY")
    pub tooling: String,
}

/// Processes Fixture
#[derive(Debug, Deserialize)]
pub struct ProcessesFixture {
    /// Matte varnish rate
    pub matte_per_metre: Decimal,
    /// Lamination rate
    pub lamination_per_m2: Decimal,
    /// Slitting rate
    pub slitter_per_metre: Decimal,
    /// Minimum slitting charge
    pub slitter_minimum: String,
}

/// Bag Making Fixture
#[derive(Debug, Deserialize)]
pub struct BagMakingFixture {
    /// Price per centimetre of width per pouch
    pub per_cm: Decimal,
    /// Minimum charge
    pub minimum: String,
}

/// Markups Fixture
#[derive(Debug, Deserialize)]
pub struct MarkupsFixture {
    /// Manufacturer margin (e.g. "40%")
    pub manufacturing: String,
    /// Import duty
    pub duty: String,
    /// Sales margin
    pub sales: String,
}

/// Delivery Fixture
#[derive(Debug, Deserialize)]
pub struct DeliveryFixture {
    /// Kilograms per box
    pub box_kg: Decimal,
    /// Price per box
    pub per_box: String,
}

/// Parallel Fixture
#[derive(Debug, Deserialize)]
pub struct ParallelFixture {
    /// Eligible bag types
    pub bag_types: Vec<BagType>,
    /// Second lane share
    pub second_lane: String,
    /// Additional lane share
    pub additional_lane: String,
    /// Recommended utilisation
    pub recommended_utilisation: String,
}

/// Comparison Fixture
#[derive(Debug, Deserialize)]
pub struct ComparisonFixture {
    /// Price breaks
    pub price_breaks: Vec<PriceBreakFixture>,
    /// Stable trend tolerance
    pub trend_tolerance: String,
}

/// Price Break Fixture
#[derive(Debug, Deserialize)]
pub struct PriceBreakFixture {
    /// Smallest quantity in the tier
    pub min_quantity: u64,
    /// Label
    pub label: String,
    /// Nominal discount
    pub discount: String,
}

/// Resolve an ISO currency code.
///
/// # Errors
///
/// Returns [`TableError::UnknownCurrency`] for codes the engine does not price in.
pub fn parse_currency(code: &str) -> Result<&'static Currency, TableError> {
    match code.trim() {
        "JPY" => Ok(JPY),
        "KRW" => Ok(KRW),
        "USD" => Ok(USD),
        "GBP" => Ok(GBP),
        "EUR" => Ok(EUR),
        other => Err(TableError::UnknownCurrency(other.to_string())),
    }
}

/// Parse price string (e.g., "6000 JPY") into minor units and currency
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY",
/// if the amount cannot be parsed, or if the currency code is not recognized.
pub fn parse_price(s: &str) -> Result<(i64, &'static Currency), TableError> {
    let parts: Vec<&str> = s.split_whitespace().collect();

    if parts.len() != 2 {
        return Err(TableError::InvalidPrice(format!(
            "Expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    }

    let amount = parts
        .first()
        .ok_or_else(|| TableError::InvalidPrice(s.to_string()))?
        .parse::<Decimal>()
        .map_err(|_err| TableError::InvalidPrice(s.to_string()))?;

    let currency = parse_currency(
        parts
            .get(1)
            .ok_or_else(|| TableError::InvalidPrice(s.to_string()))?,
    )?;

    let minor_units = 10_i64
        .checked_pow(currency.exponent)
        .and_then(|scale| amount.checked_mul(Decimal::from(scale)))
        .and_then(|value| value.round_dp(0).to_i64())
        .ok_or_else(|| TableError::InvalidPrice(s.to_string()))?;

    Ok((minor_units, currency))
}

/// Parse percentage string (e.g., "40%" or "0.40") into a `Percentage`
///
/// # Errors
///
/// Returns an error if the string cannot be parsed.
pub fn parse_percentage(s: &str) -> Result<Percentage, TableError> {
    let trimmed = s.trim();

    if let Some(percent_str) = trimmed.strip_suffix('%') {
        let value = percent_str
            .trim()
            .parse::<Decimal>()
            .map_err(|_err| TableError::InvalidPercentage(s.to_string()))?;

        Ok(Percentage::from(value / Decimal::ONE_HUNDRED))
    } else {
        let value = trimmed
            .parse::<Decimal>()
            .map_err(|_err| TableError::InvalidPercentage(s.to_string()))?;

        Ok(Percentage::from(value))
    }
}

/// Amount parsing bound to the table currency.
struct PriceParser {
    currency: &'static Currency,
}

impl PriceParser {
    fn parse(&self, s: &str) -> Result<Money<'static, Currency>, TableError> {
        let (minor_units, currency) = parse_price(s)?;

        if currency != self.currency {
            return Err(TableError::CurrencyMismatch(
                self.currency.iso_alpha_code.to_string(),
                currency.iso_alpha_code.to_string(),
            ));
        }

        Ok(Money::from_minor(minor_units, currency))
    }
}

fn positive(field: &'static str, value: Decimal) -> Result<Decimal, TableError> {
    if value > Decimal::ZERO {
        Ok(value)
    } else {
        Err(TableError::Invalid {
            field,
            reason: format!("must be greater than zero, got {value}"),
        })
    }
}

fn parse_printing(fixture: PrintingFixture) -> Result<Printing, TableError> {
    if fixture.kind.trim() == "none" {
        return Ok(Printing::None);
    }

    let process = fixture
        .kind
        .parse::<PrintingKind>()
        .map_err(|_err| TableError::Invalid {
            field: "defaults.printing.kind",
            reason: format!("unknown printing kind `{}`", fixture.kind),
        })?;

    let colors = fixture
        .colors
        .map_or(Ok(ColorCount::Full), ColorsFixture::into_color_count)?;

    Ok(Printing::Printed { process, colors })
}

impl TryFrom<PricingTableFixture> for PricingTable {
    type Error = TableError;

    #[expect(
        clippy::too_many_lines,
        reason = "one straight-line conversion per table section"
    )]
    fn try_from(fixture: PricingTableFixture) -> Result<Self, Self::Error> {
        let currency = parse_currency(&fixture.currency)?;
        let prices = PriceParser { currency };

        let mut materials = SlotMap::with_key();
        let mut material_keys = FxHashMap::default();

        for (id, material) in fixture.materials {
            let key = materials.insert(Material {
                id: id.clone(),
                name: material.name,
                density: positive("materials.density", material.density)?,
                price_per_kg: material.price_per_kg,
                default_thickness: positive(
                    "materials.default_thickness",
                    material.default_thickness,
                )?,
                sealant: material.sealant,
            });

            material_keys.insert(id, key);
        }

        let layers = fixture
            .defaults
            .layers
            .into_iter()
            .map(|layer| {
                if material_keys.contains_key(&layer.material) {
                    Ok(FilmLayer {
                        material_id: layer.material,
                        thickness: positive("defaults.layers.thickness", layer.thickness)?,
                    })
                } else {
                    Err(TableError::MaterialNotFound(layer.material))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let defaults = Defaults {
            thickness: fixture.defaults.thickness,
            layers,
            printing: parse_printing(fixture.defaults.printing)?,
        };

        let mut geometry = FxHashMap::default();

        for (bag_type, rule) in fixture.geometry {
            let mut layouts = rule.layouts;
            layouts.sort_by(|a, b| b.columns.cmp(&a.columns));

            if layouts.iter().any(|layout| layout.columns == 0) {
                return Err(TableError::Invalid {
                    field: "geometry.layouts.columns",
                    reason: format!("{bag_type} has a layout with zero columns"),
                });
            }

            geometry.insert(
                bag_type,
                GeometryRule {
                    pitch: rule.pitch,
                    layouts,
                },
            );
        }

        for bag_type in [
            BagType::FlatThreeSide,
            BagType::StandUp,
            BagType::Box,
            BagType::TShape,
            BagType::SpoutPouch,
        ] {
            if geometry
                .get(&bag_type)
                .is_none_or(|rule: &GeometryRule| rule.layouts.is_empty())
            {
                return Err(TableError::MissingGeometry(bag_type));
            }
        }

        let mut rolls = fixture.film.rolls;
        rolls.sort_by(|a, b| a.max_film_width.cmp(&b.max_film_width));

        let film = FilmRules {
            max_film_width: positive("film.max_film_width", fixture.film.max_film_width)?,
            edge_trim: fixture.film.edge_trim,
            rolls,
        };

        let mut printing = FxHashMap::default();

        for (kind, tiers) in fixture.printing {
            let mut parsed = tiers
                .into_iter()
                .map(|tier| {
                    let max_colors = match tier.colors.into_color_count()? {
                        ColorCount::Colors(count) => Some(count),
                        ColorCount::Full => None,
                    };

                    Ok(PrintingTier {
                        max_colors,
                        per_metre: tier.per_metre,
                        tooling: prices.parse(&tier.tooling)?,
                    })
                })
                .collect::<Result<Vec<_>, TableError>>()?;

            // Numbered tiers ascending, full colour last.
            parsed.sort_by_key(|tier| tier.max_colors.map_or(u16::MAX, u16::from));
            printing.insert(kind, parsed);
        }

        let processes = ProcessRates {
            matte_per_metre: fixture.processes.matte_per_metre,
            lamination_per_m2: fixture.processes.lamination_per_m2,
            slitter_per_metre: fixture.processes.slitter_per_metre,
            slitter_minimum: prices.parse(&fixture.processes.slitter_minimum)?,
        };

        let bag_making = fixture
            .bag_making
            .into_iter()
            .map(|(tier, rate)| {
                Ok((
                    tier,
                    BagMakingRate {
                        per_cm: rate.per_cm,
                        minimum: prices.parse(&rate.minimum)?,
                    },
                ))
            })
            .collect::<Result<FxHashMap<_, _>, TableError>>()?;

        let option_multipliers = fixture
            .option_multipliers
            .into_iter()
            .map(|(id, multiplier)| {
                let option = id
                    .parse::<PostProcessingOption>()
                    .map_err(|_err| TableError::UnknownOption(id.clone()))?;

                Ok((option, positive("option_multipliers", multiplier)?))
            })
            .collect::<Result<FxHashMap<_, _>, TableError>>()?;

        let markups = Markups {
            manufacturing: parse_percentage(&fixture.markups.manufacturing)?,
            duty: parse_percentage(&fixture.markups.duty)?,
            sales: parse_percentage(&fixture.markups.sales)?,
        };

        let delivery = DeliveryRate {
            box_kg: positive("delivery.box_kg", fixture.delivery.box_kg)?,
            per_box: prices.parse(&fixture.delivery.per_box)?,
        };

        let lengths = fixture.lengths;
        positive("lengths.single_sku_minimum", lengths.single_sku_minimum)?;
        positive("lengths.multi_sku_minimum", lengths.multi_sku_minimum)?;
        positive("lengths.rounding_unit", lengths.rounding_unit)?;

        if lengths.fixed_loss < Decimal::ZERO {
            return Err(TableError::Invalid {
                field: "lengths.fixed_loss",
                reason: format!("must not be negative, got {}", lengths.fixed_loss),
            });
        }

        let parallel = ParallelRules {
            bag_types: fixture.parallel.bag_types,
            second_lane: parse_percentage(&fixture.parallel.second_lane)?,
            additional_lane: parse_percentage(&fixture.parallel.additional_lane)?,
            recommended_utilisation: parse_percentage(
                &fixture.parallel.recommended_utilisation,
            )?,
        };

        let mut price_breaks = fixture
            .comparison
            .price_breaks
            .into_iter()
            .map(|price_break| {
                Ok(PriceBreak {
                    min_quantity: price_break.min_quantity,
                    label: price_break.label,
                    discount: parse_percentage(&price_break.discount)?,
                })
            })
            .collect::<Result<Vec<_>, TableError>>()?;

        price_breaks.sort_by(|a, b| b.min_quantity.cmp(&a.min_quantity));

        let comparison = ComparisonRules {
            price_breaks,
            trend_tolerance: parse_percentage(&fixture.comparison.trend_tolerance)?,
        };

        Ok(PricingTable {
            version: fixture.version,
            currency,
            materials,
            material_keys,
            thickness_multipliers: fixture.thickness_classes,
            defaults,
            geometry,
            film,
            printing,
            processes,
            bag_making,
            option_multipliers,
            setup: prices.parse(&fixture.setup)?,
            markups,
            delivery,
            lengths,
            advisor: fixture.advisor,
            parallel,
            comparison,
        })
    }
}
