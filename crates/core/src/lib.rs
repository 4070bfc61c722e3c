//! Portal Sete Core - Shared types library.
//!
//! This crate provides common types used across all Portal Sete components:
//! - `storefront` - Shopper-facing application core (cart, checkout, payment
//!   reconciliation, purchased library)
//! - the admin panel operations layered on top of it
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no backend
//! access. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
