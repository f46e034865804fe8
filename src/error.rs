//! Error types for reef-interface

use crate::receipt::DispatchFailure;
use std::time::Duration;
use thiserror::Error;

/// Main error type for reef-interface operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterfaceError {
    /// Type name is not known to any registry layer
    #[error("Unknown type: {0}")]
    UnknownType(String),
    /// Alias chain did not reach a concrete type within the hop bound
    #[error("Alias cycle while resolving {name} (gave up after {hops} hops)")]
    AliasCycle { name: String, hops: usize },
    /// Module or function is absent from runtime metadata
    #[error("Unknown call: {module}.{function}")]
    UnknownCall { module: String, function: String },
    /// Call parameter declared in metadata but not supplied
    #[error("Missing parameter `{param}` for {call}")]
    MissingParameter { call: String, param: String },
    /// Supplied call parameter that metadata does not declare
    #[error("Unexpected parameter `{param}` for {call}")]
    ExtraParameter { call: String, param: String },
    /// Value could not be encoded with its declared type
    #[error("Cannot encode `{param}` as {type_name}: {cause}")]
    Encoding {
        param: String,
        type_name: String,
        cause: String,
    },
    /// SCALE decode error
    #[error("SCALE decode error: {0}")]
    Decode(String),
    /// Keypair cannot produce a signature
    #[error("Signing error: {0}")]
    Signing(String),
    /// Inclusion/finalization wait exceeded its bound
    #[error("Subscription timed out after {0:?}")]
    SubscriptionTimeout(Duration),
    /// A single transport request exceeded its bound
    #[error("Request `{0}` timed out")]
    RequestTimeout(&'static str),
    /// Caller-supplied cancellation fired
    #[error("Operation cancelled")]
    Cancelled,
    /// Network or connection failure reported by the transport
    #[error("Transport error: {0}")]
    Transport(String),
    /// Transaction pool rejected or dropped the extrinsic
    #[error("Extrinsic rejected: {0}")]
    ExtrinsicRejected(String),
    /// Including block does not contain the extrinsic
    #[error("Extrinsic {extrinsic} not found in block {block}")]
    ExtrinsicNotFound { extrinsic: String, block: String },
    /// Chain-reported dispatch failure
    #[error("Extrinsic failed: {0}")]
    ExtrinsicFailed(DispatchFailure),
    /// Invalid SS58 address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Malformed runtime metadata
    #[error("Metadata error: {0}")]
    Metadata(String),
    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T, E = InterfaceError> = std::result::Result<T, E>;

impl From<&str> for InterfaceError {
    fn from(s: &str) -> Self {
        InterfaceError::InvalidInput(s.to_string())
    }
}

impl From<String> for InterfaceError {
    fn from(s: String) -> Self {
        InterfaceError::InvalidInput(s)
    }
}

impl From<parity_scale_codec::Error> for InterfaceError {
    fn from(err: parity_scale_codec::Error) -> Self {
        InterfaceError::Decode(err.to_string())
    }
}

impl From<serde_json::Error> for InterfaceError {
    fn from(err: serde_json::Error) -> Self {
        InterfaceError::Config(err.to_string())
    }
}

impl InterfaceError {
    /// Attach the parameter name to a failure raised deeper in the codec.
    ///
    /// Type resolution failures become encoding errors so the caller learns
    /// which parameter's type could not be resolved.
    pub(crate) fn for_param(self, param: &str) -> Self {
        let param = param.to_string();
        match self {
            InterfaceError::Encoding {
                type_name, cause, ..
            } => InterfaceError::Encoding {
                param,
                type_name,
                cause,
            },
            InterfaceError::UnknownType(name) => InterfaceError::Encoding {
                param,
                cause: format!("unknown type `{}`", name),
                type_name: name,
            },
            InterfaceError::AliasCycle { name, hops } => InterfaceError::Encoding {
                param,
                cause: format!("alias cycle after {} hops", hops),
                type_name: name,
            },
            other => other,
        }
    }
}
