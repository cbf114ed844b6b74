//! Seaglass Core - Shared types library.
//!
//! This crate provides common types used across all Seaglass components:
//! - `storefront` - Cart, auth/session and checkout core
//! - `integration-tests` - Cross-store scenario tests
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no store
//! logic. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
