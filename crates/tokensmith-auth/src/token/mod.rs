//! Token construction, signing and decoding.
//!
//! This module provides:
//!
//! - [`PayloadBuilder`] - merges claims and stamps the expiry
//! - [`Signer`] / [`JwtSigner`] - the signing capability and its HMAC default
//! - [`TokenCodec`] - encode/decode with expiry and leeway rules

pub mod codec;
pub mod payload;
pub mod signer;

pub use codec::TokenCodec;
pub use payload::{EXPIRY_CLAIM, Payload, PayloadBuilder};
pub use signer::{JwtSigner, Signer, SignerError, SigningAlgorithm, VerifyRules};
