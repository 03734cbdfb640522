//! Straylight — WhatsApp order-status notifications for a storefront.
//!
//! Single Rust binary. Order-event webhooks land in a durable SQLite queue;
//! a polling worker delivers each one over WhatsApp through a baileys-based
//! sidecar bridge. Session credentials are mirrored into SQLite with a
//! debounced flush so a restart never needs a fresh QR scan.
//!
//! See `DESIGN.md` for architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod commerce;
pub mod config;
pub mod logging;
pub mod store;

pub mod session;

pub mod notify;
pub mod webhook;
