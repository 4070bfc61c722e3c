//! Product catalog models.

use portal_sete_core::{Price, ProductFileId, ProductId};
use serde::{Deserialize, Serialize};

/// A digital product offered by the store.
///
/// Immutable from the shopper's perspective; mutated only through
/// [`crate::admin`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub image_url: String,
    pub is_active: bool,
    /// Free-form tags used for filtering and relating products.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Optional external sample/preview link.
    #[serde(default)]
    pub youtube_url: Option<String>,
    /// Admin-configured headings for the download categories.
    #[serde(default)]
    pub download_label_main: Option<String>,
    #[serde(default)]
    pub download_label_extras: Option<String>,
    #[serde(default)]
    pub download_label_bonus: Option<String>,
}

/// A downloadable file attached to a product.
///
/// Visible to a purchaser only while they hold a paid order containing the
/// product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFile {
    pub id: ProductFileId,
    pub product_id: ProductId,
    /// Publicly fetchable retrieval URL.
    pub file_path: String,
    pub file_name: String,
    /// Free-form category label; see [`file_category`] for the well-known ones.
    pub category: String,
}

/// Well-known file category labels.
///
/// Categories are free-form in the data model; these are the ones the
/// download view groups by.
pub mod file_category {
    pub const MAIN: &str = "main";
    pub const EXTRAS: &str = "extras";
    pub const BONUS: &str = "bonus";
}
