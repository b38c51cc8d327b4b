//! # Attestation Core
//!
//! Data models, error types, and consumer-facing traits shared by every piece
//! of the attestation store write path.
//!
//! This crate has no I/O of its own: it defines what an [`Attestation`] and a
//! [`StorageEvent`] are, what a [`Signer`], [`Observer`], and [`IdGenerator`]
//! must do, and how the write path reports failure. The actual store lives in
//! `attestation-store`.

pub mod error;
pub mod model;
pub mod traits;

pub use error::*;
pub use model::*;
pub use traits::*;
