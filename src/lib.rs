//! reef-interface: client engine for Substrate-style chains
//!
//! This crate provides:
//! - A layered type registry (bundled presets, runtime metadata types, overrides)
//! - SCALE encoding and decoding of dynamic values through that registry
//! - Call composition validated against runtime metadata
//! - Signed extrinsic construction and fee estimation
//! - Submission and lifecycle tracking through inclusion and finalization,
//!   ending in a receipt with decoded events and a success/failure outcome
//!
//! # Architecture
//!
//! The chain connection is a [`Transport`] supplied by the caller.
//! [`SubstrateInterface`] drives it; everything below the interface is
//! synchronous and transport-free.

pub mod address;
pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod extrinsic;
pub mod interface;
pub mod keypair;
pub mod lifecycle;
pub mod metadata;
pub mod receipt;
pub mod registry;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use address::{decode_ss58, encode_ss58, is_valid_ss58_address};
pub use builder::{Call, CallParams};
pub use config::InterfaceConfig;
pub use error::{InterfaceError, Result};
pub use events::{Event, EventRecord, Phase};
pub use extrinsic::{Extrinsic, ExtrinsicParams};
pub use interface::{ExtrinsicOptions, SubstrateInterface};
pub use keypair::{CryptoType, Keypair};
pub use lifecycle::SubmitOptions;
pub use metadata::{CallSpec, MetadataResolver, RuntimeMetadata};
pub use receipt::{DispatchFailure, ExtrinsicOutcome, ExtrinsicReceipt};
pub use registry::{ReloadOptions, TypeDescriptor, TypeRegistry};
pub use transport::{StatusStream, TransactionStatus, Transport};
pub use types::{ChainProperties, Era, Hash, Mortality, PaymentInfo, RuntimeVersion};

// Dynamic value model used for call parameters and decoded events
pub use scale_value::Value;
