//! Standardized error handling for BitSend
//!
//! Every failure that can end a payment run is a [`PaymentError`]. Variants map
//! one-to-one onto what the operator is told, and none of them carry key
//! material.
//!
//! # Usage
//!
//! ```
//! use bitsend_common::error::{PaymentError, ErrorCategory};
//!
//! let err = PaymentError::InsufficientFunds { needed: 50_452, available: 20_000 };
//! assert_eq!(err.category(), ErrorCategory::Funds);
//! assert!(err.user_message().contains("50452"));
//! ```

use std::error::Error as StdError;
use thiserror::Error;

use crate::chain_source::ChainSourceError;

/// The error taxonomy of a payment run
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Malformed WIF, or a key encoded for the other network
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Destination failed to decode for the active network
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Amount text that is not a positive satoshi value within supply
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The source address has no unspent outputs at all
    #[error("No spendable funds: {0}")]
    NoSpendableFunds(String),

    #[error("Insufficient funds: needed {needed} sats, available {available} sats")]
    InsufficientFunds { needed: u64, available: u64 },

    /// Fee subtraction would leave nothing to send
    #[error("Amount too small: {requested} sats does not cover the {fee} sats fee")]
    AmountTooSmall { requested: u64, fee: u64 },

    /// Any failed explorer call, including broadcast rejection
    #[error("Network error: {context}")]
    Network {
        context: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// Sighash or script construction failed for an input
    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller broke an internal contract (e.g. mismatched input total)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Create a new network error with context
pub fn network_error<S: Into<String>>(context: S) -> PaymentError {
    PaymentError::Network {
        context: context.into(),
        source: None,
    }
}

/// Type alias for a Result with PaymentError
pub type PaymentResult<T> = Result<T, PaymentError>;

impl From<ChainSourceError> for PaymentError {
    fn from(err: ChainSourceError) -> Self {
        PaymentError::Network {
            context: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

/// Error category for logging purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Key,
    Address,
    Amount,
    Funds,
    Network,
    Signing,
    Config,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Key => "Key",
            ErrorCategory::Address => "Address",
            ErrorCategory::Amount => "Amount",
            ErrorCategory::Funds => "Funds",
            ErrorCategory::Network => "Network",
            ErrorCategory::Signing => "Signing",
            ErrorCategory::Config => "Config",
            ErrorCategory::Internal => "Internal",
        }
    }
}

impl PaymentError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PaymentError::InvalidKey(_) => ErrorCategory::Key,
            PaymentError::InvalidAddress(_) => ErrorCategory::Address,
            PaymentError::InvalidAmount(_) => ErrorCategory::Amount,
            PaymentError::NoSpendableFunds(_)
            | PaymentError::InsufficientFunds { .. }
            | PaymentError::AmountTooSmall { .. } => ErrorCategory::Funds,
            PaymentError::Network { .. } => ErrorCategory::Network,
            PaymentError::Signing(_) => ErrorCategory::Signing,
            PaymentError::Config(_) => ErrorCategory::Config,
            PaymentError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Whether the operator can simply be asked again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::InvalidAddress(_) | PaymentError::InvalidAmount(_)
        )
    }

    /// Get a message suitable for printing to the operator
    ///
    /// Key errors never echo the supplied key back.
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::InvalidKey(_) => {
                "The private key is not a valid WIF key for the selected network".to_string()
            }
            PaymentError::InsufficientFunds { needed, available } => format!(
                "Insufficient funds: {} sats needed (amount plus fee), {} sats available",
                needed, available
            ),
            PaymentError::AmountTooSmall { requested, fee } => format!(
                "Amount of {} sats is too small to pay the {} sats fee",
                requested, fee
            ),
            PaymentError::Network { context, source } => match source {
                Some(source) if !context.contains(&source.to_string()) => {
                    format!("Network error: {} ({})", context, source)
                }
                _ => format!("Network error: {}", context),
            },
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_source_errors_become_network_errors() {
        let err: PaymentError = ChainSourceError::Connection("refused".to_string()).into();
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.user_message().contains("refused"));
    }

    #[test]
    fn invalid_key_message_does_not_echo_input() {
        let err = PaymentError::InvalidKey("cVt4o7BGAig1UXywgGSm".to_string());
        assert!(!err.user_message().contains("cVt4o7"));
    }

    #[test]
    fn only_operator_input_errors_are_retryable() {
        assert!(PaymentError::InvalidAddress("x".into()).is_retryable());
        assert!(PaymentError::InvalidAmount("x".into()).is_retryable());
        assert!(!PaymentError::NoSpendableFunds("x".into()).is_retryable());
        assert!(!network_error("down").is_retryable());
    }
}
