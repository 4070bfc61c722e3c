//! Admin-side content management.
//!
//! Thin write layer over the backend's tables and buckets. Every successful
//! write invalidates the catalog cache so the storefront picks up changes
//! on the next read instead of after the TTL.

use portal_sete_core::{OrderId, Price, ProductFileId, ProductId, SectionId, SectionKind, SectionLayout};
use serde::Serialize;
use tracing::{info, instrument};

use crate::backend::{BackendClient, BackendError, storage};
use crate::models::{SiteConfig, SiteSection};

/// Fields an admin can set on a product. `id` absent means create.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ProductId>,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub image_url: String,
    pub is_active: bool,
    pub tags: Vec<String>,
    pub youtube_url: Option<String>,
    pub download_label_main: Option<String>,
    pub download_label_extras: Option<String>,
    pub download_label_bonus: Option<String>,
}

/// Fields an admin can set on a section; ordering is assigned on insert.
#[derive(Debug, Clone, Serialize)]
pub struct SectionDraft {
    #[serde(rename = "type")]
    pub kind: SectionKind,
    pub layout: SectionLayout,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub is_visible: bool,
    pub filter_tag: Option<String>,
}

#[derive(Serialize)]
struct NewSectionRow<'a> {
    #[serde(flatten)]
    draft: &'a SectionDraft,
    display_order: i32,
}

#[derive(Serialize)]
struct NewProductFileRow<'a> {
    product_id: ProductId,
    file_path: &'a str,
    file_name: &'a str,
    category: &'a str,
}

/// Admin operations, borrowed from the shared backend client.
pub struct AdminOps<'a> {
    backend: &'a BackendClient,
}

impl<'a> AdminOps<'a> {
    #[must_use]
    pub const fn new(backend: &'a BackendClient) -> Self {
        Self { backend }
    }

    /// Create or overwrite the singleton site configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    #[instrument(skip_all)]
    pub async fn save_site_config(&self, config: &SiteConfig) -> Result<(), BackendError> {
        match config.id {
            Some(id) => {
                self.backend
                    .update_rows("site_config", &format!("id=eq.{id}"), config)
                    .await?;
            }
            None => self.backend.insert_rows("site_config", config).await?,
        }
        self.backend.invalidate_catalog();
        Ok(())
    }

    /// Insert a new section at the end of the display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the read of existing sections or the insert fails.
    #[instrument(skip_all, fields(title = %draft.title))]
    pub async fn create_section(&self, draft: &SectionDraft) -> Result<(), BackendError> {
        let existing = self.backend.sections().await?;
        let row = NewSectionRow {
            draft,
            display_order: next_display_order(&existing),
        };
        self.backend.insert_rows("sections", &row).await?;
        self.backend.invalidate_catalog();
        Ok(())
    }

    /// Overwrite an existing section, display order included.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    #[instrument(skip_all, fields(section_id = %section.id))]
    pub async fn update_section(&self, section: &SiteSection) -> Result<(), BackendError> {
        self.backend
            .update_rows("sections", &format!("id=eq.{}", section.id), section)
            .await?;
        self.backend.invalidate_catalog();
        Ok(())
    }

    /// Delete a section.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    #[instrument(skip(self))]
    pub async fn delete_section(&self, id: SectionId) -> Result<(), BackendError> {
        self.backend
            .delete_rows("sections", &format!("id=eq.{id}"))
            .await?;
        self.backend.invalidate_catalog();
        Ok(())
    }

    /// Create or update a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    #[instrument(skip_all, fields(name = %draft.name))]
    pub async fn save_product(&self, draft: &ProductDraft) -> Result<(), BackendError> {
        match draft.id {
            Some(id) => {
                self.backend
                    .update_rows("products", &format!("id=eq.{id}"), draft)
                    .await?;
            }
            None => self.backend.insert_rows("products", draft).await?,
        }
        self.backend.invalidate_catalog();
        Ok(())
    }

    /// Upload a downloadable file and attach it to a product.
    ///
    /// The stored object key is randomized; the original file name survives
    /// only as display metadata on the row.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload or the row insert fails.
    #[instrument(skip(self, bytes), fields(product_id = %product_id, file_name, size = bytes.len()))]
    pub async fn upload_product_file(
        &self,
        product_id: ProductId,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
        category: &str,
    ) -> Result<(), BackendError> {
        let key = storage::generated_key(file_name);
        storage::upload(
            self.backend,
            storage::PRODUCT_FILES_BUCKET,
            &key,
            bytes,
            content_type,
        )
        .await?;

        let row = NewProductFileRow {
            product_id,
            file_path: &key,
            file_name,
            category,
        };
        self.backend.insert_rows("product_files", &row).await?;
        info!(key, "product file uploaded");
        Ok(())
    }

    /// Detach a downloadable file from its product.
    ///
    /// The stored object is left in the bucket; rows are the source of
    /// truth for what is downloadable.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    #[instrument(skip(self))]
    pub async fn delete_product_file(&self, id: ProductFileId) -> Result<(), BackendError> {
        self.backend
            .delete_rows("product_files", &format!("id=eq.{id}"))
            .await
    }

    /// Upload site imagery and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    #[instrument(skip(self, bytes), fields(file_name, size = bytes.len()))]
    pub async fn upload_site_asset(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError> {
        let key = storage::generated_key(file_name);
        storage::upload(
            self.backend,
            storage::SITE_ASSETS_BUCKET,
            &key,
            bytes,
            content_type,
        )
        .await?;
        Ok(storage::public_url(
            self.backend,
            storage::SITE_ASSETS_BUCKET,
            &key,
        ))
    }

    /// Ask the backend to reject pending orders older than the given age.
    ///
    /// Stale pending orders otherwise accumulate forever, since abandoning
    /// a gateway session produces no callback.
    ///
    /// # Errors
    ///
    /// Returns an error if the function invocation fails. Returns the list
    /// of order ids that were expired.
    #[instrument(skip(self))]
    pub async fn expire_stale_pending_orders(
        &self,
        older_than_minutes: u32,
    ) -> Result<Vec<OrderId>, BackendError> {
        let body = serde_json::json!({ "olderThanMinutes": older_than_minutes });
        let response = self.backend.invoke("expire-pending-orders", &body).await?;

        let expired = response
            .get("expired")
            .and_then(serde_json::Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_str())
                    .filter_map(|s| s.parse().ok())
                    .collect()
            })
            .unwrap_or_default();
        Ok(expired)
    }
}

/// Next display order: one past the current maximum, starting at 1.
fn next_display_order(sections: &[SiteSection]) -> i32 {
    sections
        .iter()
        .map(|section| section.display_order)
        .max()
        .map_or(1, |max| max + 1)
}
