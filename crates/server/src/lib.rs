//! Google sign-in to Shopify customer bridge.
//!
//! Exposes one endpoint, `POST /exchange`, that trades a Google OAuth
//! authorization code for the caller's identity and finds or creates the
//! matching Shopify customer. Built as a library so the router can be
//! exercised in tests without binding a socket.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod google;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;
