//! The shopper's purchased library and order history.
//!
//! Ownership is derived, never stored: a product is owned exactly when it
//! appears in a line item of a paid order. Assembly is a pure function over
//! fetched rows so it can be tested without a backend.

use std::collections::{BTreeMap, HashSet};

use portal_sete_core::{OrderId, ProductId, UserId};
use tracing::instrument;

use crate::backend::{BackendClient, BackendError};
use crate::models::{Order, OrderItem, Product, ProductFile, file_category};

/// A purchased product together with its downloadable files, grouped by
/// category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDownloads {
    pub product: Product,
    pub files: Vec<ProductFile>,
}

/// One labeled group of downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadGroup {
    pub label: String,
    pub files: Vec<ProductFile>,
}

impl ProductDownloads {
    /// Group this product's files into the fixed main/extras/bonus order,
    /// applying the product's label overrides and dropping empty groups.
    #[must_use]
    pub fn grouped_files(&self) -> Vec<DownloadGroup> {
        let groups = [
            (
                file_category::MAIN,
                self.product.download_label_main.as_deref(),
                "Downloads",
            ),
            (
                file_category::EXTRAS,
                self.product.download_label_extras.as_deref(),
                "Extras",
            ),
            (
                file_category::BONUS,
                self.product.download_label_bonus.as_deref(),
                "Bônus",
            ),
        ];

        groups
            .into_iter()
            .filter_map(|(category, override_label, default_label)| {
                let files: Vec<ProductFile> = self
                    .files
                    .iter()
                    .filter(|file| file.category == category)
                    .cloned()
                    .collect();
                if files.is_empty() {
                    return None;
                }
                Some(DownloadGroup {
                    label: override_label.unwrap_or(default_label).to_string(),
                    files,
                })
            })
            .collect()
    }
}

/// Derive the owned library from raw rows.
///
/// Only items of paid orders count; products missing from the catalog
/// snapshot (deleted or deactivated after purchase) are skipped, and buying
/// the same product in two orders yields one entry.
#[must_use]
pub fn assemble_library(
    orders: &[Order],
    items: &[OrderItem],
    products: Vec<Product>,
    mut files: Vec<ProductFile>,
) -> Vec<ProductDownloads> {
    let paid_orders: HashSet<OrderId> = orders
        .iter()
        .filter(|order| order.status.is_paid())
        .map(|order| order.id)
        .collect();

    let owned: HashSet<ProductId> = items
        .iter()
        .filter(|item| paid_orders.contains(&item.order_id))
        .map(|item| item.product_id)
        .collect();

    let mut files_by_product: BTreeMap<ProductId, Vec<ProductFile>> = BTreeMap::new();
    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    for file in files {
        files_by_product
            .entry(file.product_id)
            .or_default()
            .push(file);
    }

    products
        .into_iter()
        .filter(|product| owned.contains(&product.id))
        .map(|product| {
            let files = files_by_product.remove(&product.id).unwrap_or_default();
            ProductDownloads { product, files }
        })
        .collect()
}

/// Fetch and assemble the user's purchased library.
///
/// # Errors
///
/// Returns an error if any of the underlying reads fail.
#[instrument(skip(backend), fields(user_id = %user_id))]
pub async fn purchased_library(
    backend: &BackendClient,
    user_id: UserId,
) -> Result<Vec<ProductDownloads>, BackendError> {
    let orders = backend.orders_for_user(user_id).await?;

    let paid_ids: Vec<OrderId> = orders
        .iter()
        .filter(|order| order.status.is_paid())
        .map(|order| order.id)
        .collect();
    let items = backend.order_items(&paid_ids).await?;

    let product_ids: Vec<ProductId> = {
        let unique: HashSet<ProductId> = items.iter().map(|item| item.product_id).collect();
        unique.into_iter().collect()
    };
    let products = backend.products_by_ids(&product_ids).await?;
    let files = backend.product_files(&product_ids).await?;

    Ok(assemble_library(&orders, &items, products, files))
}

/// Fetch the user's full order history, newest first.
///
/// # Errors
///
/// Returns an error if the read fails.
#[instrument(skip(backend), fields(user_id = %user_id))]
pub async fn order_history(
    backend: &BackendClient,
    user_id: UserId,
) -> Result<Vec<Order>, BackendError> {
    backend.orders_for_user(user_id).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use portal_sete_core::{OrderItemId, OrderStatus, Price, ProductFileId};
    use uuid::Uuid;

    use super::*;

    fn product(name: &str) -> Product {
        Product {
            id: ProductId::generate(),
            name: name.to_string(),
            description: String::new(),
            price: Price::from_cents(1000),
            image_url: String::new(),
            is_active: true,
            tags: Vec::new(),
            youtube_url: None,
            download_label_main: None,
            download_label_extras: None,
            download_label_bonus: None,
        }
    }

    fn order(status: OrderStatus) -> Order {
        Order {
            id: OrderId::generate(),
            user_id: UserId::generate(),
            total: Price::from_cents(1000),
            status,
            created_at: Utc::now(),
        }
    }

    fn item(order_id: OrderId, product_id: ProductId) -> OrderItem {
        OrderItem {
            id: OrderItemId::generate(),
            order_id,
            product_id,
            price_at_purchase: Price::from_cents(1000),
        }
    }

    fn file(product_id: ProductId, name: &str, category: &str) -> ProductFile {
        ProductFile {
            id: ProductFileId::generate(),
            product_id,
            file_path: format!("{}/{name}", Uuid::new_v4()),
            file_name: name.to_string(),
            category: category.to_string(),
        }
    }

    #[test]
    fn test_only_paid_orders_grant_ownership() {
        let owned_product = product("Owned");
        let pending_product = product("Not yet");

        let paid = order(OrderStatus::Approved);
        let pending = order(OrderStatus::Pending);
        let items = vec![
            item(paid.id, owned_product.id),
            item(pending.id, pending_product.id),
        ];

        let library = assemble_library(
            &[paid, pending],
            &items,
            vec![owned_product.clone(), pending_product],
            Vec::new(),
        );

        assert_eq!(library.len(), 1);
        assert_eq!(library.first().unwrap().product.id, owned_product.id);
    }

    #[test]
    fn test_completed_counts_as_paid_and_duplicates_collapse() {
        let p = product("Twice bought");
        let first = order(OrderStatus::Approved);
        let second = order(OrderStatus::Completed);
        let items = vec![item(first.id, p.id), item(second.id, p.id)];

        let library = assemble_library(&[first, second], &items, vec![p], Vec::new());
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn test_missing_product_rows_are_skipped() {
        let p = product("Ghost");
        let paid = order(OrderStatus::Approved);
        let items = vec![item(paid.id, p.id)];

        // Catalog no longer returns the product.
        let library = assemble_library(&[paid], &items, Vec::new(), Vec::new());
        assert!(library.is_empty());
    }

    #[test]
    fn test_grouped_files_respect_order_and_overrides() {
        let mut p = product("Pack");
        p.download_label_main = Some("Stems".to_string());

        let downloads = ProductDownloads {
            files: vec![
                file(p.id, "bonus.zip", file_category::BONUS),
                file(p.id, "main.zip", file_category::MAIN),
            ],
            product: p,
        };

        let groups = downloads.grouped_files();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].label, "Stems");
        assert_eq!(groups[0].files[0].file_name, "main.zip");
        assert_eq!(groups[1].label, "Bônus");
    }

    #[test]
    fn test_empty_categories_are_dropped() {
        let p = product("Pack");
        let downloads = ProductDownloads {
            files: vec![file(p.id, "only.zip", file_category::EXTRAS)],
            product: p,
        };

        let groups = downloads.grouped_files();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, "Extras");
    }
}
