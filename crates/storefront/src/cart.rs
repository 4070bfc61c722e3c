//! The shopper's cart, persisted locally across sessions.
//!
//! The cart is independent of authentication and of any server state: it is
//! a plain list of product snapshots kept in memory and mirrored to a JSON
//! file on every mutation. On startup the store hydrates from that file,
//! falling back to an empty cart if the file is missing or unreadable.
//!
//! Each product appears at most once with quantity 1; adding a product that
//! is already present is rejected rather than incremented, and the caller
//! is expected to surface a duplicate-add notice.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use portal_sete_core::{Price, ProductId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::Product;

/// A product snapshot in the cart plus a quantity.
///
/// Quantity is always 1 in this design; it exists so totals read as
/// `price * quantity` everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
}

/// Durable store for the shopper's current selection.
///
/// Derived values ([`total`](Self::total), [`count`](Self::count)) are
/// recomputed from the lines on every read and never stored, so they cannot
/// drift from the actual contents.
#[derive(Debug)]
pub struct CartStore {
    lines: Mutex<Vec<CartLine>>,
    path: PathBuf,
}

impl CartStore {
    /// Open the cart store backed by the given file, hydrating any
    /// previously persisted contents.
    ///
    /// A missing or corrupt file yields an empty cart instead of an error;
    /// local storage is best-effort by design.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lines = hydrate(&path);
        debug!(lines = lines.len(), path = %path.display(), "cart hydrated");
        Self {
            lines: Mutex::new(lines),
            path,
        }
    }

    /// Add a product to the cart.
    ///
    /// Returns `true` if the product was added, `false` if it was already
    /// present (in which case nothing changes). Re-adding never creates a
    /// duplicate line or bumps a quantity.
    pub fn add(&self, product: Product) -> bool {
        let mut lines = self.lock();
        if lines.iter().any(|line| line.product.id == product.id) {
            return false;
        }
        lines.push(CartLine {
            product,
            quantity: 1,
        });
        self.persist(&lines);
        true
    }

    /// Remove the line for the given product, if present.
    ///
    /// A miss is a no-op, not an error.
    pub fn remove(&self, product_id: ProductId) {
        let mut lines = self.lock();
        let before = lines.len();
        lines.retain(|line| line.product.id != product_id);
        if lines.len() != before {
            self.persist(&lines);
        }
    }

    /// Empty the cart unconditionally.
    pub fn clear(&self) {
        let mut lines = self.lock();
        lines.clear();
        self.persist(&lines);
    }

    /// Snapshot of the current lines.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        self.lock().clone()
    }

    /// Sum of `price * quantity` over the current lines.
    #[must_use]
    pub fn total(&self) -> Price {
        self.lock()
            .iter()
            .map(|line| {
                (0..line.quantity)
                    .map(|_| line.product.price)
                    .sum::<Price>()
            })
            .sum()
    }

    /// Sum of quantities over the current lines.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.lock().iter().map(|line| line.quantity).sum()
    }

    /// Whether the cart holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CartLine>> {
        // Mutations are user-triggered and serialized by the event loop;
        // a poisoned lock can only come from a panicking test.
        self.lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Mirror the full line list to the cart file.
    ///
    /// Persistence failure is logged and swallowed: the in-memory cart
    /// stays usable for the rest of the session.
    fn persist(&self, lines: &[CartLine]) {
        match serde_json::to_vec_pretty(lines) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&self.path, bytes) {
                    warn!(path = %self.path.display(), "failed to persist cart: {e}");
                }
            }
            Err(e) => warn!("failed to serialize cart: {e}"),
        }
    }
}

/// Read the persisted line list, defaulting to empty on absence or parse
/// failure.
fn hydrate(path: &Path) -> Vec<CartLine> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(_) => return Vec::new(),
    };

    match serde_json::from_slice(&bytes) {
        Ok(lines) => lines,
        Err(e) => {
            warn!(path = %path.display(), "discarding unreadable cart file: {e}");
            Vec::new()
        }
    }
}
