//! STES Core - Shared types library.
//!
//! This crate provides the types shared by every STES.tn component:
//! - `storefront` - HTTP JSON API over `PostgreSQL`
//! - `client` - Async SDK holding session, wishlist, cart and push state
//! - `cli` - Migrations, catalog seeding and order status updates
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. The JSON wire format is defined here once so the
//! server and the client cannot drift apart.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, statuses and tracking codes
//! - [`api`] - Response envelopes and field-level validation errors
//! - [`catalog`] - Product filter normalization, sorting and pagination
//! - [`customer`] - Customer, address and auth payloads
//! - [`wishlist`] - Wishlist and wishlist item shapes
//! - [`notification`] - Preferences, quiet hours and push subscriptions
//! - [`order`] - Orders, totals and loyalty rules

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod catalog;
pub mod customer;
pub mod notification;
pub mod order;
pub mod types;
pub mod wishlist;

pub use types::*;
