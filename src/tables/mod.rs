//! Pricing Tables
//!
//! A [`PricingTable`] is an immutable, versioned snapshot of every constant the engine prices
//! with. It is passed explicitly into each entry point; nothing is read from global state.

use std::path::Path;

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use serde::Deserialize;
use slotmap::{SlotMap, new_key_type};

use crate::specification::{
    BagType, ColorCount, Dimensions, FilmLayer, PostProcessingOption, Printing, PrintingKind,
    ThicknessClass,
};

pub mod loader;

pub use loader::TableError;

new_key_type! {
    /// Material Key
    pub struct MaterialKey;
}

/// Film material.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Material id, e.g. `LLDPE`
    pub id: String,

    /// Display name
    pub name: String,

    /// Specific gravity (g/cm³)
    pub density: Decimal,

    /// Price per kilogram, in major units of the table currency
    pub price_per_kg: Decimal,

    /// Thickness used when a layer omits one, in microns
    pub default_thickness: Decimal,

    /// Sealant layers are scaled by the thickness class
    pub sealant: bool,
}

/// `width·W + height·H + depth·G + margin`, in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LinearFormula {
    /// Coefficient on the bag width
    pub width: Decimal,
    /// Coefficient on the bag height
    pub height: Decimal,
    /// Coefficient on the gusset depth
    pub depth: Decimal,
    /// Constant margin
    pub margin: Decimal,
}

impl LinearFormula {
    /// Evaluate for a set of dimensions; `None` on overflow.
    pub fn apply(&self, dimensions: &Dimensions) -> Option<Decimal> {
        self.width
            .checked_mul(dimensions.width)?
            .checked_add(self.height.checked_mul(dimensions.height)?)?
            .checked_add(self.depth.checked_mul(dimensions.depth)?)?
            .checked_add(self.margin)
    }
}

/// Film width needed to run a given number of pouches side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ColumnLayout {
    /// Pouches across the web
    pub columns: u32,

    /// Film width formula for this many columns
    pub film_width: LinearFormula,
}

/// Packing geometry for one bag type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryRule {
    /// Web length consumed per pouch
    pub pitch: LinearFormula,

    /// Layouts, widest (most columns) first
    pub layouts: Vec<ColumnLayout>,
}

/// Raw roll stock used for film up to a given width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RollWidth {
    /// Widest finished film this roll serves, in millimetres
    pub max_film_width: Decimal,

    /// Raw roll width, in millimetres
    pub roll_width: Decimal,
}

/// Film width limits and available roll stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilmRules {
    /// Widest film the line can print and laminate, in millimetres
    pub max_film_width: Decimal,

    /// Edge trim lost across the roll width, in millimetres
    pub edge_trim: Decimal,

    /// Roll stock, narrowest first
    pub rolls: Vec<RollWidth>,
}

impl FilmRules {
    /// Narrowest roll that can serve a film width.
    pub fn roll_for(&self, film_width: Decimal) -> Option<&RollWidth> {
        self.rolls
            .iter()
            .find(|roll| film_width <= roll.max_film_width)
    }
}

/// Printing price for colour counts up to `max_colors`.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintingTier {
    /// Highest colour count this tier covers; `None` for the full-colour tier
    pub max_colors: Option<u8>,

    /// Price per metre of film
    pub per_metre: Decimal,

    /// One-off plate or cylinder cost
    pub tooling: Money<'static, Currency>,
}

/// Bag-making price tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BagMakingTier {
    /// Flat pouch
    Flat,
    /// Stand-up pouch
    StandUp,
    /// Flat pouch with zipper
    Zipper,
    /// Stand-up pouch with zipper
    ZipperStand,
    /// T-shape and box pouches
    Gusseted,
    /// Anything else
    Other,
}

impl BagMakingTier {
    /// Tier for a construction; `None` for roll film, which is not converted.
    pub fn for_bag(bag_type: BagType, zipper: bool) -> Option<Self> {
        match (bag_type, zipper) {
            (BagType::RollFilm, _) => None,
            (BagType::FlatThreeSide, false) => Some(Self::Flat),
            (BagType::FlatThreeSide, true) => Some(Self::Zipper),
            (BagType::StandUp, false) => Some(Self::StandUp),
            (BagType::StandUp, true) => Some(Self::ZipperStand),
            (BagType::TShape | BagType::Box, _) => Some(Self::Gusseted),
            (BagType::SpoutPouch, _) => Some(Self::Other),
        }
    }
}

/// Bag-making rate: `max(minimum, width_cm × per_cm × quantity)`.
#[derive(Debug, Clone, PartialEq)]
pub struct BagMakingRate {
    /// Price per centimetre of bag width per pouch
    pub per_cm: Decimal,

    /// Minimum charge per SKU
    pub minimum: Money<'static, Currency>,
}

/// Converting process rates.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRates {
    /// Matte varnish per metre of roll width per metre of length
    pub matte_per_metre: Decimal,

    /// Lamination per square metre per bond
    pub lamination_per_m2: Decimal,

    /// Slitting per metre
    pub slitter_per_metre: Decimal,

    /// Minimum slitting charge per run
    pub slitter_minimum: Money<'static, Currency>,
}

/// Markups applied after the subtotal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Markups {
    /// Manufacturer margin on the subtotal
    pub manufacturing: Percentage,

    /// Import duty on the marked-up cost
    pub duty: Percentage,

    /// Sales margin on the landed cost
    pub sales: Percentage,
}

/// Delivery priced per shipping box.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRate {
    /// Film weight one box carries, in kilograms
    pub box_kg: Decimal,

    /// Price per box
    pub per_box: Money<'static, Currency>,
}

/// Minimum secured length, fixed loss and rounding, all in metres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LengthRules {
    /// Floor per SKU when the run has exactly one SKU
    pub single_sku_minimum: Decimal,

    /// Floor per SKU when the run has two or more SKUs
    pub multi_sku_minimum: Decimal,

    /// Setup and changeover loss, charged once per run
    pub fixed_loss: Decimal,

    /// Secured lengths above the floor round up to a multiple of this
    pub rounding_unit: Decimal,
}

impl LengthRules {
    /// Floor per SKU for a run of `sku_count` SKUs.
    pub fn minimum_for(&self, sku_count: usize) -> Decimal {
        if sku_count > 1 {
            self.multi_sku_minimum
        } else {
            self.single_sku_minimum
        }
    }
}

/// Economic quantity search settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AdvisorRules {
    /// Rounding steps searched above each SKU's secured length
    pub search_steps: u32,
}

/// Multi-lane production settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelRules {
    /// Constructions that can run several lanes on one roll
    pub bag_types: Vec<BagType>,

    /// Share of the film cost charged for the second lane
    pub second_lane: Percentage,

    /// Share of the film cost charged for each lane after the second
    pub additional_lane: Percentage,

    /// Roll utilisation at which an option is recommended
    pub recommended_utilisation: Percentage,
}

/// Quantity threshold with a lot label and a nominal discount.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBreak {
    /// Smallest quantity in this tier
    pub min_quantity: u64,

    /// Display label
    pub label: String,

    /// Nominal discount advertised for the tier
    pub discount: Percentage,
}

/// Batch comparison settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRules {
    /// Price breaks, highest threshold first
    pub price_breaks: Vec<PriceBreak>,

    /// Relative change under which a trend is reported as stable
    pub trend_tolerance: Percentage,
}

impl ComparisonRules {
    /// Price break a quantity falls into.
    pub fn price_break(&self, quantity: u64) -> Option<&PriceBreak> {
        self.price_breaks
            .iter()
            .find(|price_break| quantity >= price_break.min_quantity)
    }
}

/// Values filled in when a request omits them.
#[derive(Debug, Clone, PartialEq)]
pub struct Defaults {
    /// Thickness class
    pub thickness: ThicknessClass,

    /// Film structure
    pub layers: Vec<FilmLayer>,

    /// Printing process and colours
    pub printing: Printing,
}

/// Versioned pricing-table snapshot.
#[derive(Debug, Clone)]
pub struct PricingTable {
    /// Price list version, carried into every quote
    pub version: String,

    /// Currency every amount is expressed in
    pub currency: &'static Currency,

    /// Film materials
    pub materials: SlotMap<MaterialKey, Material>,

    /// Material id -> key
    pub material_keys: FxHashMap<String, MaterialKey>,

    /// Sealant thickness multipliers
    pub thickness_multipliers: FxHashMap<ThicknessClass, Decimal>,

    /// Request defaults
    pub defaults: Defaults,

    /// Packing geometry per pouch type
    pub geometry: FxHashMap<BagType, GeometryRule>,

    /// Film width limits and roll stock
    pub film: FilmRules,

    /// Printing tiers per process, lowest colour count first, full colour last
    pub printing: FxHashMap<PrintingKind, Vec<PrintingTier>>,

    /// Converting process rates
    pub processes: ProcessRates,

    /// Bag-making rates
    pub bag_making: FxHashMap<BagMakingTier, BagMakingRate>,

    /// Post-processing price multipliers; options not listed are `1`
    pub option_multipliers: FxHashMap<PostProcessingOption, Decimal>,

    /// Machine setup charged once per quote
    pub setup: Money<'static, Currency>,

    /// Margins and duty
    pub markups: Markups,

    /// Delivery boxes
    pub delivery: DeliveryRate,

    /// Length rules
    pub lengths: LengthRules,

    /// Economic quantity search
    pub advisor: AdvisorRules,

    /// Multi-lane production
    pub parallel: ParallelRules,

    /// Batch comparison
    pub comparison: ComparisonRules,
}

const STANDARD_TABLE: &str = include_str!("../../fixtures/pricing/standard.yml");

impl PricingTable {
    /// Built-in standard price list.
    ///
    /// # Errors
    ///
    /// Returns a [`TableError`] if the bundled table fails to parse.
    pub fn standard() -> Result<Self, TableError> {
        Self::from_yaml(STANDARD_TABLE)
    }

    /// Parse a pricing table from YAML.
    ///
    /// # Errors
    ///
    /// Returns a [`TableError`] if the YAML is malformed or references unknown materials,
    /// options or currencies.
    pub fn from_yaml(contents: &str) -> Result<Self, TableError> {
        let fixture: loader::PricingTableFixture = serde_norway::from_str(contents)?;

        fixture.try_into()
    }

    /// Load a pricing table from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns a [`TableError`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let contents = std::fs::read_to_string(path)?;

        Self::from_yaml(&contents)
    }

    /// Look up a material by id.
    pub fn material(&self, id: &str) -> Option<&Material> {
        self.material_keys
            .get(id)
            .and_then(|key| self.materials.get(*key))
    }

    /// Sealant thickness multiplier for a class, `1` if the class is not listed.
    pub fn thickness_multiplier(&self, class: ThicknessClass) -> Decimal {
        self.thickness_multipliers
            .get(&class)
            .copied()
            .unwrap_or(Decimal::ONE)
    }

    /// Printing tier for a process and colour count.
    ///
    /// Counts beyond the last numbered tier fall through to the full-colour tier.
    pub fn printing_tier(&self, kind: PrintingKind, colors: ColorCount) -> Option<&PrintingTier> {
        let tiers = self.printing.get(&kind)?;

        let numbered = match colors {
            ColorCount::Colors(count) => tiers
                .iter()
                .find(|tier| tier.max_colors.is_some_and(|max| count <= max)),
            ColorCount::Full => None,
        };

        numbered.or_else(|| tiers.iter().find(|tier| tier.max_colors.is_none()))
    }

    /// Price multiplier for a post-processing option.
    pub fn option_multiplier(&self, option: PostProcessingOption) -> Decimal {
        self.option_multipliers
            .get(&option)
            .copied()
            .unwrap_or(Decimal::ONE)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn standard_table_loads() -> TestResult {
        let table = PricingTable::standard()?;

        assert_eq!(table.currency.iso_alpha_code, "JPY");
        assert_eq!(table.lengths.single_sku_minimum, Decimal::from(500));
        assert_eq!(table.lengths.multi_sku_minimum, Decimal::from(300));
        assert_eq!(table.lengths.fixed_loss, Decimal::from(400));
        assert_eq!(table.lengths.rounding_unit, Decimal::from(50));
        assert!(table.material("LLDPE").is_some_and(|material| material.sealant));

        Ok(())
    }

    #[test]
    fn minimum_depends_on_sku_count() -> TestResult {
        let table = PricingTable::standard()?;

        assert_eq!(table.lengths.minimum_for(1), Decimal::from(500));
        assert_eq!(table.lengths.minimum_for(2), Decimal::from(300));
        assert_eq!(table.lengths.minimum_for(7), Decimal::from(300));

        Ok(())
    }

    #[test]
    fn printing_lookup_falls_through_to_full_colour() -> TestResult {
        let table = PricingTable::standard()?;

        let two = table
            .printing_tier(PrintingKind::Gravure, ColorCount::Colors(2))
            .ok_or("missing 2 colour tier")?;
        let nine = table
            .printing_tier(PrintingKind::Gravure, ColorCount::Colors(9))
            .ok_or("missing fallback tier")?;
        let full = table
            .printing_tier(PrintingKind::Gravure, ColorCount::Full)
            .ok_or("missing full colour tier")?;

        assert_eq!(two.max_colors, Some(2));
        assert_eq!(nine, full);
        assert_eq!(full.max_colors, None);

        Ok(())
    }

    #[test]
    fn roll_stock_is_chosen_by_film_width() -> TestResult {
        let table = PricingTable::standard()?;

        let narrow = table.film.roll_for(Decimal::from(570)).ok_or("no roll")?;
        let wide = table.film.roll_for(Decimal::from(571)).ok_or("no roll")?;

        assert_eq!(narrow.roll_width, Decimal::from(590));
        assert_eq!(wide.roll_width, Decimal::from(760));
        assert!(table.film.roll_for(Decimal::from(741)).is_none());

        Ok(())
    }

    #[test]
    fn unlisted_options_do_not_change_price() -> TestResult {
        let table = PricingTable::standard()?;

        assert_eq!(
            table.option_multiplier("valve-yes".parse()?),
            Decimal::ONE
        );
        assert_eq!(
            table.option_multiplier("machi-printing-yes".parse()?),
            Decimal::new(105, 2)
        );

        Ok(())
    }
}
