//! Portal Sete storefront application core.
//!
//! This crate implements the logic behind the shopper-facing store for
//! downloadable digital products, leaving rendering and navigation to the
//! UI shell that embeds it:
//!
//! - [`cart`] - the shopper's selection, persisted locally across sessions
//! - [`checkout`] - turns a cart into a pending order plus a hosted payment
//!   session redirect
//! - [`payment`] - converges on the order's final payment status after the
//!   shopper returns from the gateway
//! - [`library`] - the purchased-downloads view unlocked by paid orders
//! - [`backend`] - client for the hosted backend service (tables, functions,
//!   auth, storage, realtime)
//! - [`admin`] - administration operations for products, sections, and site
//!   settings

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod admin;
pub mod backend;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod library;
pub mod models;
pub mod payment;
pub mod state;
pub mod telemetry;
