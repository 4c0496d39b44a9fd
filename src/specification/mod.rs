//! Packaging Specification
//!
//! The canonical, validated form of a quote request. Built once by [`normalize`] and read by every
//! later stage.

use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::consistency::ConsistencyError;

pub mod error;
pub mod normalizer;
pub mod options;

pub use error::ValidationError;
pub use normalizer::normalize;
pub use options::{OptionGroup, PostProcessing, PostProcessingOption};

/// Bag construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BagType {
    /// Three-side sealed flat pouch
    #[serde(rename = "flat_3_side")]
    FlatThreeSide,
    /// Stand-up pouch with a bottom gusset
    #[serde(rename = "stand_up")]
    StandUp,
    /// Box pouch with side gussets (M-shape)
    #[serde(rename = "box")]
    Box,
    /// Lap-sealed pillow pouch (T-shape)
    #[serde(rename = "t_shape")]
    TShape,
    /// Stand-up pouch with a spout fitment
    #[serde(rename = "spout_pouch")]
    SpoutPouch,
    /// Printed roll film sold by the metre
    #[serde(rename = "roll_film")]
    RollFilm,
}

impl BagType {
    /// Identifier used in requests and pricing tables.
    pub fn as_str(self) -> &'static str {
        match self {
            BagType::FlatThreeSide => "flat_3_side",
            BagType::StandUp => "stand_up",
            BagType::Box => "box",
            BagType::TShape => "t_shape",
            BagType::SpoutPouch => "spout_pouch",
            BagType::RollFilm => "roll_film",
        }
    }

    /// Whether the product is roll film measured in linear metres.
    pub fn is_roll_film(self) -> bool {
        self == BagType::RollFilm
    }

    /// Whether the construction needs a gusset depth.
    pub fn requires_depth(self) -> bool {
        matches!(self, BagType::StandUp | BagType::Box | BagType::SpoutPouch)
    }
}

impl fmt::Display for BagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BagType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "flat_3_side" | "three_side" | "flat" => Ok(BagType::FlatThreeSide),
            "stand_up" => Ok(BagType::StandUp),
            "box" | "m_shape" | "gusset" => Ok(BagType::Box),
            "t_shape" | "lap_seal" => Ok(BagType::TShape),
            "spout_pouch" => Ok(BagType::SpoutPouch),
            "roll_film" => Ok(BagType::RollFilm),
            other => Err(ValidationError::UnknownOption {
                field: "bagType",
                value: other.to_string(),
            }),
        }
    }
}

/// Thickness class applied to sealant layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThicknessClass {
    /// Thinner sealant for light contents
    Light,
    /// Standard sealant
    Medium,
    /// Thicker sealant for heavy contents
    Heavy,
    /// Heaviest sealant
    Ultra,
}

impl FromStr for ThicknessClass {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "light" => Ok(ThicknessClass::Light),
            "medium" => Ok(ThicknessClass::Medium),
            "heavy" => Ok(ThicknessClass::Heavy),
            "ultra" => Ok(ThicknessClass::Ultra),
            other => Err(ValidationError::UnknownOption {
                field: "thickness",
                value: other.to_string(),
            }),
        }
    }
}

/// One layer of the laminated film.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmLayer {
    /// Material id, as listed in the pricing table
    pub material_id: String,

    /// Thickness in microns
    pub thickness: Decimal,
}

/// Bag dimensions in millimetres.
///
/// `depth` is the gusset and is zero for constructions without one. `height` is zero for roll film.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width (W)
    pub width: Decimal,
    /// Height (H)
    pub height: Decimal,
    /// Gusset depth (G)
    pub depth: Decimal,
}

/// Printing process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintingKind {
    /// Plateless digital printing
    Digital,
    /// Gravure printing with engraved cylinders
    Gravure,
}

impl FromStr for PrintingKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "digital" => Ok(PrintingKind::Digital),
            "gravure" => Ok(PrintingKind::Gravure),
            other => Err(ValidationError::UnknownOption {
                field: "printing.kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Number of printed colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorCount {
    /// A specific number of spot colours
    Colors(u8),
    /// Full colour, priced as its own tier
    Full,
}

impl fmt::Display for ColorCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorCount::Colors(count) => write!(f, "{count}c"),
            ColorCount::Full => f.write_str("full"),
        }
    }
}

/// Printing choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Printing {
    /// Unprinted film
    None,
    /// Printed film
    Printed {
        /// Process used
        process: PrintingKind,
        /// Colour count
        colors: ColorCount,
    },
}

/// Requested quantities, one per SKU sharing the production run.
///
/// Always non-empty with every entry strictly positive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u64>", into = "Vec<u64>")]
pub struct Quantities(SmallVec<[u64; 4]>);

impl Quantities {
    /// Single-SKU order.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NotPositive`] when `quantity` is zero.
    pub fn single(quantity: u64) -> Result<Self, ValidationError> {
        Self::per_sku([quantity])
    }

    /// Multi-SKU order, in SKU order.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Missing`] for an empty list and
    /// [`ValidationError::NotPositive`] when any quantity is zero.
    pub fn per_sku(quantities: impl IntoIterator<Item = u64>) -> Result<Self, ValidationError> {
        let values: SmallVec<[u64; 4]> = quantities.into_iter().collect();

        if values.is_empty() {
            return Err(ValidationError::Missing { field: "quantity" });
        }

        if let Some(zero) = values.iter().find(|quantity| **quantity == 0) {
            return Err(ValidationError::NotPositive {
                field: "quantity",
                value: zero.to_string(),
            });
        }

        Ok(Self(values))
    }

    /// Number of SKUs in the run.
    pub fn sku_count(&self) -> usize {
        self.0.len()
    }

    /// Total requested quantity across SKUs.
    ///
    /// # Errors
    ///
    /// Returns [`ConsistencyError::Overflow`] if the total does not fit in a `u64`.
    pub fn total(&self) -> Result<u64, ConsistencyError> {
        self.0
            .iter()
            .try_fold(0_u64, |total, quantity| total.checked_add(*quantity))
            .ok_or(ConsistencyError::Overflow("total quantity"))
    }

    /// Quantities in SKU order.
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }
}

impl TryFrom<Vec<u64>> for Quantities {
    type Error = ValidationError;

    fn try_from(values: Vec<u64>) -> Result<Self, Self::Error> {
        Self::per_sku(values)
    }
}

impl From<Quantities> for Vec<u64> {
    fn from(quantities: Quantities) -> Self {
        quantities.0.into_vec()
    }
}

impl fmt::Display for Quantities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;

        for quantity in &self.0 {
            if !first {
                f.write_str(" + ")?;
            }

            write!(f, "{quantity}")?;
            first = false;
        }

        Ok(())
    }
}

/// Canonical resolved request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagingSpecification {
    bag_type: BagType,
    layers: Vec<FilmLayer>,
    thickness: ThicknessClass,
    dimensions: Dimensions,
    printing: Printing,
    post_processing: PostProcessing,
    quantities: Quantities,
}

impl PackagingSpecification {
    /// Bag construction
    pub fn bag_type(&self) -> BagType {
        self.bag_type
    }

    /// Film layers, outermost first, with sealant thickness already adjusted
    pub fn layers(&self) -> &[FilmLayer] {
        &self.layers
    }

    /// Thickness class the sealant layers were scaled by
    pub fn thickness(&self) -> ThicknessClass {
        self.thickness
    }

    /// Bag dimensions
    pub fn dimensions(&self) -> &Dimensions {
        &self.dimensions
    }

    /// Printing choice
    pub fn printing(&self) -> Printing {
        self.printing
    }

    /// Resolved post-processing options
    pub fn post_processing(&self) -> &PostProcessing {
        &self.post_processing
    }

    /// Requested quantities
    pub fn quantities(&self) -> &Quantities {
        &self.quantities
    }

    /// Same specification with different quantities.
    #[must_use]
    pub fn with_quantities(&self, quantities: Quantities) -> Self {
        Self {
            quantities,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn bag_type_aliases_resolve() -> TestResult {
        assert_eq!("m_shape".parse::<BagType>()?, BagType::Box);
        assert_eq!("gusset".parse::<BagType>()?, BagType::Box);
        assert_eq!("lap_seal".parse::<BagType>()?, BagType::TShape);
        assert_eq!("three_side".parse::<BagType>()?, BagType::FlatThreeSide);

        Ok(())
    }

    #[test]
    fn unknown_bag_type_names_the_field() {
        let result = "envelope".parse::<BagType>();

        assert!(matches!(result, Err(ref error) if error.field() == "bagType"));
    }

    #[test]
    fn quantities_reject_zero() {
        assert!(matches!(
            Quantities::per_sku([500, 0]),
            Err(ValidationError::NotPositive { .. })
        ));
    }

    #[test]
    fn quantities_reject_empty() {
        assert!(matches!(
            Quantities::per_sku([]),
            Err(ValidationError::Missing { field: "quantity" })
        ));
    }

    #[test]
    fn quantities_report_totals() -> TestResult {
        let quantities = Quantities::per_sku([3000, 2000, 500])?;

        assert_eq!(quantities.sku_count(), 3);
        assert_eq!(quantities.total()?, 5500);
        assert_eq!(quantities.to_string(), "3000 + 2000 + 500");

        Ok(())
    }

    #[test]
    fn total_past_u64_is_an_overflow() -> TestResult {
        let quantities = Quantities::per_sku([u64::MAX, 1])?;

        assert_eq!(
            quantities.total(),
            Err(ConsistencyError::Overflow("total quantity"))
        );

        Ok(())
    }

    #[test]
    fn quantities_deserialize_through_validation() {
        let result: Result<Quantities, _> = serde_json::from_str("[100, 0]");

        assert!(result.is_err(), "zero quantity must not deserialize");
    }
}
