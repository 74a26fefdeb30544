// Ingest - validates upstream footprint data and turns it into line items

use super::types::LineItem;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Footprint document produced by the upstream carbon calculator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarbonData {
    pub products: Vec<ProductFootprint>,
    pub summary: EmissionsSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductFootprint {
    pub product_name: String,
    pub material_type: String,
    pub weight_kg: f64,
    pub emission_factor: f64,
    pub total_emissions: f64,
    /// Upstream share of the total; derived from the summary when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage_of_total: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionsSummary {
    pub total_emissions: f64,
    #[serde(default)]
    pub total_products: usize,
    #[serde(default)]
    pub average_emissions_per_product: f64,
}

impl CarbonData {
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, InputError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| InputError::Io(format!("{}: {}", path.display(), e)))?;
        serde_json::from_slice(&bytes).map_err(|e| InputError::Malformed(e.to_string()))
    }

    /// Validate the document and produce line items in input order
    pub fn line_items(&self) -> Result<Vec<LineItem>, InputError> {
        if self.products.is_empty() {
            return Err(InputError::Empty);
        }

        let total = self.summary.total_emissions;
        if !total.is_finite() || total <= 0.0 {
            return Err(InputError::InvalidNumber {
                product: "summary".to_string(),
                field: "total_emissions",
                value: total,
            });
        }

        if self.summary.total_products != 0 && self.summary.total_products != self.products.len() {
            tracing::warn!(
                declared = self.summary.total_products,
                actual = self.products.len(),
                "summary product count does not match product list"
            );
        }

        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(self.products.len());

        for product in &self.products {
            let name = product.product_name.as_str();
            check_text(name, "product_name", name)?;
            check_text(name, "material_type", &product.material_type)?;
            if !seen.insert(name.to_string()) {
                return Err(InputError::DuplicateProduct(name.to_string()));
            }

            check_number(name, "weight_kg", product.weight_kg)?;
            check_number(name, "emission_factor", product.emission_factor)?;
            check_number(name, "total_emissions", product.total_emissions)?;

            let percentage = match product.percentage_of_total {
                Some(p) => p,
                None => round_percentage(product.total_emissions / total * 100.0),
            };
            if !percentage.is_finite() || !(0.0..=100.0).contains(&percentage) {
                return Err(InputError::InvalidNumber {
                    product: name.to_string(),
                    field: "percentage_of_total",
                    value: percentage,
                });
            }

            items.push(LineItem {
                product_name: name.to_string(),
                material_type: product.material_type.clone(),
                weight_kg: product.weight_kg,
                emission_factor: product.emission_factor,
                total_emissions: product.total_emissions,
                percentage_of_total: percentage,
            });
        }

        Ok(items)
    }
}

// Names are keys across stages and are passed through unaltered, so they
// must arrive trimmed
fn check_text(product: &str, field: &'static str, value: &str) -> Result<(), InputError> {
    if value.trim().is_empty() {
        Err(InputError::BlankField(field))
    } else if value.trim() != value {
        Err(InputError::UntrimmedField {
            product: product.to_string(),
            field,
        })
    } else {
        Ok(())
    }
}

fn check_number(product: &str, field: &'static str, value: f64) -> Result<(), InputError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(InputError::InvalidNumber {
            product: product.to_string(),
            field,
            value,
        })
    }
}

// Two decimals, matching what the calculator prints
fn round_percentage(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Malformed footprint data: {0}")]
    Malformed(String),

    #[error("No products to analyze")]
    Empty,

    #[error("Blank field: {0}")]
    BlankField(&'static str),

    #[error("{field} of {product:?} has leading or trailing whitespace")]
    UntrimmedField { product: String, field: &'static str },

    #[error("Duplicate product name: {0}")]
    DuplicateProduct(String),

    #[error("Invalid {field} for {product}: {value}")]
    InvalidNumber {
        product: String,
        field: &'static str,
        value: f64,
    },
}
