//! Seaglass Storefront core.
//!
//! This crate owns the two state containers behind the storefront UI and
//! the services that compose them:
//!
//! - [`cart`] - shopping cart contents with durable local persistence
//! - [`auth`] - live authentication session and derived admin flag
//! - [`backend`] - capability clients for the hosted platform
//!   (auth endpoints + row-query API)
//! - [`catalog`] - product queries and admin product management
//! - [`checkout`] - order totals and order placement
//! - [`orders`] - order history
//!
//! # Architecture
//!
//! The stores never reach into each other; page-level code composes them
//! (checkout needs a non-empty cart *and* a signed-in session). Both expose
//! an explicit subscribe/notify interface: listeners are invoked
//! synchronously after every state change and unsubscribe by dropping the
//! returned guard.
//!
//! All rendering, routing and HTTP serving live elsewhere; this crate is
//! the state core plus the backend plumbing it needs.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod backend;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
mod observe;
pub mod orders;

pub use observe::Subscription;
