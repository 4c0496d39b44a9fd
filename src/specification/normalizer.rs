//! Specification Normalizer

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::{
    request::{ColorsInput, LayerInput, PrintingInput, QuoteRequest},
    specification::{
        BagType, ColorCount, Dimensions, FilmLayer, PackagingSpecification, PostProcessing,
        Printing, PrintingKind, Quantities, ThicknessClass, ValidationError,
    },
    tables::PricingTable,
};

/// Resolve a raw request into a [`PackagingSpecification`].
///
/// Fills omitted fields from the pricing table's defaults, scales sealant layers by the
/// thickness class and resolves post-processing ids group by group.
///
/// # Errors
///
/// Returns a [`ValidationError`] naming the first offending field.
pub fn normalize(
    request: &QuoteRequest,
    table: &PricingTable,
) -> Result<PackagingSpecification, ValidationError> {
    let bag_type: BagType = request
        .bag_type
        .as_deref()
        .ok_or(ValidationError::Missing { field: "bagType" })?
        .parse()?;

    let dimensions = resolve_dimensions(request, bag_type)?;

    let thickness = match request.thickness.as_deref() {
        Some(class) => class.parse()?,
        None => table.defaults.thickness,
    };

    let layers = resolve_layers(&request.layers, thickness, table)?;
    let printing = resolve_printing(request.printing.as_ref(), table)?;
    let post_processing = PostProcessing::resolve(bag_type, request.post_processing.as_slice())?;
    let quantities = resolve_quantities(request)?;

    debug!(
        bag_type = %bag_type,
        layers = layers.len(),
        skus = quantities.sku_count(),
        "normalized specification"
    );

    Ok(PackagingSpecification {
        bag_type,
        layers,
        thickness,
        dimensions,
        printing,
        post_processing,
        quantities,
    })
}

fn required_positive(
    field: &'static str,
    value: Option<Decimal>,
) -> Result<Decimal, ValidationError> {
    let value = value.ok_or(ValidationError::Missing { field })?;

    if value <= Decimal::ZERO {
        return Err(ValidationError::NotPositive {
            field,
            value: value.to_string(),
        });
    }

    Ok(value)
}

fn resolve_dimensions(
    request: &QuoteRequest,
    bag_type: BagType,
) -> Result<Dimensions, ValidationError> {
    let width = required_positive("width", request.width)?;

    let height = if bag_type.is_roll_film() {
        Decimal::ZERO
    } else {
        required_positive("height", request.height)?
    };

    let depth = if bag_type.requires_depth() {
        required_positive("depth", request.depth)?
    } else {
        Decimal::ZERO
    };

    Ok(Dimensions {
        width,
        height,
        depth,
    })
}

fn resolve_layers(
    layers: &[LayerInput],
    thickness: ThicknessClass,
    table: &PricingTable,
) -> Result<Vec<FilmLayer>, ValidationError> {
    let requested: Vec<FilmLayer> = if layers.is_empty() {
        table.defaults.layers.clone()
    } else {
        layers
            .iter()
            .map(|layer| {
                let material = table.material(&layer.material_id).ok_or_else(|| {
                    ValidationError::UnknownOption {
                        field: "layers.materialId",
                        value: layer.material_id.clone(),
                    }
                })?;

                let thickness = match layer.thickness {
                    Some(value) if value <= Decimal::ZERO => {
                        return Err(ValidationError::NotPositive {
                            field: "layers.thickness",
                            value: value.to_string(),
                        });
                    }
                    Some(value) => value,
                    None => material.default_thickness,
                };

                Ok(FilmLayer {
                    material_id: layer.material_id.clone(),
                    thickness,
                })
            })
            .collect::<Result<_, _>>()?
    };

    let multiplier = table.thickness_multiplier(thickness);

    requested
        .into_iter()
        .map(|layer| {
            let sealant = table
                .material(&layer.material_id)
                .is_some_and(|material| material.sealant);

            if !sealant {
                return Ok(layer);
            }

            let scaled = layer
                .thickness
                .checked_mul(multiplier)
                .ok_or_else(|| ValidationError::Invalid {
                    field: "layers.thickness",
                    reason: format!("{} overflows when scaled", layer.thickness),
                })?
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

            Ok(FilmLayer {
                thickness: scaled,
                ..layer
            })
        })
        .collect()
}

fn resolve_printing(
    input: Option<&PrintingInput>,
    table: &PricingTable,
) -> Result<Printing, ValidationError> {
    let Some(input) = input else {
        return Ok(table.defaults.printing);
    };

    let default_process = match table.defaults.printing {
        Printing::Printed { process, .. } => process,
        Printing::None => PrintingKind::Digital,
    };

    let process = match input.kind.as_deref().map(str::trim) {
        Some("none") => return Ok(Printing::None),
        Some(kind) => kind.parse()?,
        None => default_process,
    };

    if !table.printing.contains_key(&process) {
        return Err(ValidationError::UnknownOption {
            field: "printing.kind",
            value: format!("{process:?}").to_lowercase(),
        });
    }

    let colors = match &input.colors {
        None => ColorCount::Full,
        Some(ColorsInput::Named(name)) if name.trim() == "full" => ColorCount::Full,
        Some(ColorsInput::Named(name)) => {
            return Err(ValidationError::UnknownOption {
                field: "printing.colors",
                value: name.clone(),
            });
        }
        Some(ColorsInput::Count(count)) if *count <= 0 => {
            return Err(ValidationError::NotPositive {
                field: "printing.colors",
                value: count.to_string(),
            });
        }
        Some(ColorsInput::Count(count)) => {
            let count = u8::try_from(*count).map_err(|_err| ValidationError::Invalid {
                field: "printing.colors",
                reason: format!("{count} colours is not a printable count"),
            })?;

            ColorCount::Colors(count)
        }
    };

    Ok(Printing::Printed { process, colors })
}

fn resolve_quantities(request: &QuoteRequest) -> Result<Quantities, ValidationError> {
    let (field, raw): (&'static str, Vec<i64>) =
        match (request.quantity, request.sku_quantities.is_empty()) {
            (Some(_), false) => {
                return Err(ValidationError::Invalid {
                    field: "quantity",
                    reason: "give either quantity or skuQuantities, not both".to_string(),
                });
            }
            (Some(quantity), true) => ("quantity", vec![quantity]),
            (None, false) => ("skuQuantities", request.sku_quantities.clone()),
            (None, true) => return Err(ValidationError::Missing { field: "quantity" }),
        };

    let values = raw
        .into_iter()
        .map(|quantity| {
            u64::try_from(quantity)
                .ok()
                .filter(|quantity| *quantity > 0)
                .ok_or_else(|| ValidationError::NotPositive {
                    field,
                    value: quantity.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Quantities::per_sku(values)
}
