//! Shared application state.
//!
//! Everything the UI shell needs lives behind one cheaply cloneable handle:
//! configuration, the backend client, the cart, and the cached site content
//! (configuration row plus ordered sections). Site content is loaded before
//! the state is handed out so rendering never races initialization.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::backend::BackendClient;
use crate::cart::CartStore;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::models::{SiteConfig, SiteSection};

/// Site presentation content, fetched together.
#[derive(Debug, Clone, Default)]
pub struct SiteContent {
    pub config: SiteConfig,
    pub sections: Vec<SiteSection>,
}

impl SiteContent {
    /// Sections the storefront should render, already ordered.
    #[must_use]
    pub fn visible_sections(&self) -> Vec<&SiteSection> {
        self.sections
            .iter()
            .filter(|section| section.is_visible)
            .collect()
    }
}

/// Shared storefront state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StoreConfig,
    backend: BackendClient,
    cart: CartStore,
    site: RwLock<SiteContent>,
}

impl AppState {
    /// Build the state: connect the backend client, hydrate the cart, and
    /// load site content.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial site-content fetch fails.
    #[instrument(skip_all)]
    pub async fn init(config: StoreConfig) -> Result<Self, StoreError> {
        let backend = BackendClient::new(&config.backend);
        let cart = CartStore::open(&config.cart_file);
        let site = load_site(&backend).await?;

        info!(
            sections = site.sections.len(),
            cart_items = cart.count(),
            "storefront state initialized"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                cart,
                site: RwLock::new(site),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// Snapshot of the current site content.
    pub async fn site(&self) -> SiteContent {
        self.inner.site.read().await.clone()
    }

    /// Re-fetch site content, e.g. after an admin edit.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails; the previous content is kept.
    #[instrument(skip_all)]
    pub async fn refresh_site(&self) -> Result<(), StoreError> {
        let fresh = load_site(&self.inner.backend).await?;
        *self.inner.site.write().await = fresh;
        Ok(())
    }
}

async fn load_site(backend: &BackendClient) -> Result<SiteContent, StoreError> {
    let config = backend.site_config().await?;
    let sections = backend.sections().await?;
    Ok(SiteContent {
        config,
        sections: sections.as_ref().clone(),
    })
}
