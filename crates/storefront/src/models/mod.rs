//! Domain models mirroring the backend's table rows.
//!
//! These are plain serde types; all I/O lives in [`crate::backend`].

pub mod order;
pub mod product;
pub mod site;

pub use order::{NewOrderItem, Order, OrderItem};
pub use product::{Product, ProductFile, file_category};
pub use site::{SiteConfig, SiteSection, UserProfile};
