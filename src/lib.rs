//! Coupon Club - payment-event reconciliation and subscription engine.
//!
//! Turns at-least-once payment provider webhooks into exactly-once
//! Transaction records, attributes each payment to a member and a partner,
//! drives forward-only subscription transitions, and serves a merged
//! billing history across the card-billing and checkout providers.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
