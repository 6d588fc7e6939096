//! Identity Bridge Core - Shared domain types.
//!
//! This crate provides the types exchanged between the two halves of the
//! sign-in flow:
//! - Identity exchange (Google authorization code → [`IdentityClaims`])
//! - Customer directory sync (claims → Shopify [`CustomerRecord`])
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. The server
//! crate owns every network call.
//!
//! # Modules
//!
//! - [`types`] - Validated emails, customer ids, identity claims and metadata entries

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
