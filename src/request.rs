//! Quote Requests
//!
//! Plain structured input as it arrives from a form or API payload. Nothing here is validated; see
//! [`normalize`](crate::specification::normalize).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Raw quote request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteRequest {
    /// Bag type identifier, e.g. `stand_up`
    pub bag_type: Option<String>,

    /// Film layers, outermost first; empty for the pricing table's default structure
    pub layers: Vec<LayerInput>,

    /// Thickness class: `light`, `medium`, `heavy` or `ultra`
    pub thickness: Option<String>,

    /// Width in millimetres
    pub width: Option<Decimal>,

    /// Height in millimetres
    pub height: Option<Decimal>,

    /// Gusset depth in millimetres
    pub depth: Option<Decimal>,

    /// Printing process and colours
    pub printing: Option<PrintingInput>,

    /// Post-processing option ids, applied in order
    pub post_processing: Vec<String>,

    /// Single-SKU quantity
    pub quantity: Option<i64>,

    /// Per-SKU quantities for a shared production run
    pub sku_quantities: Vec<i64>,
}

impl QuoteRequest {
    /// Same request for a single quantity.
    #[must_use]
    pub fn with_quantity(&self, quantity: u64) -> Self {
        self.with_sku_quantities(&[quantity])
    }

    /// Same request for a set of per-SKU quantities.
    #[must_use]
    pub fn with_sku_quantities(&self, quantities: &[u64]) -> Self {
        let mut request = self.clone();

        request.quantity = None;
        request.sku_quantities = quantities
            .iter()
            .map(|quantity| i64::try_from(*quantity).unwrap_or(i64::MAX))
            .collect();

        request
    }
}

/// Raw film layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerInput {
    /// Material id, e.g. `PET`
    pub material_id: String,

    /// Thickness in microns; the material's default when omitted
    #[serde(default)]
    pub thickness: Option<Decimal>,
}

/// Raw printing choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrintingInput {
    /// `none`, `digital` or `gravure`
    pub kind: Option<String>,

    /// Colour count or `full`
    pub colors: Option<ColorsInput>,
}

/// Colour count as written by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorsInput {
    /// Numeric colour count
    Count(i64),
    /// Named tier, e.g. `full`
    Named(String),
}
