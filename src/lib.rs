//! external-dns webhook provider for zone-partitioned DNS backends such as
//! Google Cloud DNS.
//!
//! The pipeline: the controller's `Changes` are filtered and encoded
//! ([`codec`]), routed to their owning zone and split into bounded batches
//! ([`router`]), then submitted one transaction at a time ([`apply`]). Zones
//! come from the [`zones`] catalog. [`handlers`] serves any [`provider::Provider`]
//! over HTTP and [`webhook`] consumes one.

pub mod apply;
pub mod backend;
pub mod codec;
pub mod config;
pub mod dns;
pub mod error;
pub mod filter;
pub mod google;
pub mod handlers;
pub mod inmemory;
pub mod provider;
pub mod router;
pub mod webhook;
pub mod zones;
