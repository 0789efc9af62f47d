//! STES.tn storefront API library.
//!
//! The JSON API behind the STES.tn pool equipment shop: catalog queries,
//! customer accounts, wishlists, notification preferences and orders, all
//! over `PostgreSQL`. Exposed as a library so the router can be tested
//! in-process and the CLI can reuse the repositories and migrations.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
