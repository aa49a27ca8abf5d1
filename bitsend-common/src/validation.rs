//! Validation of operator input
//!
//! Everything typed at a prompt passes through here before it reaches the
//! assembly pipeline. Validation never panics; a bad value is reported as a
//! [`ValidationError`] (or `false`) and the caller decides whether to ask
//! again.

use bitcoin::address::Payload;
use bitcoin::Address;
use log::{debug, warn};
use std::str::FromStr;
use thiserror::Error;

use crate::config::NetworkParams;
use crate::error::PaymentError;
use crate::logging::sanitize_for_logging;
use crate::types::MAX_BITCOIN_SUPPLY;

/// Errors that can occur during validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid Bitcoin address: {0}")]
    InvalidAddress(String),

    #[error("Network mismatch: {0}")]
    NetworkMismatch(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

impl From<ValidationError> for PaymentError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidAddress(msg) | ValidationError::NetworkMismatch(msg) => {
                PaymentError::InvalidAddress(msg)
            }
            ValidationError::InvalidAmount(msg) => PaymentError::InvalidAmount(msg),
        }
    }
}

/// Gatekeeper for destination addresses on the active network
#[derive(Debug, Clone)]
pub struct AddressValidator<'a> {
    params: &'a NetworkParams,
}

impl<'a> AddressValidator<'a> {
    pub fn new(params: &'a NetworkParams) -> Self {
        Self { params }
    }

    pub fn is_valid(&self, address: &str) -> bool {
        self.parse(address).is_ok()
    }

    /// Decode `address` under the active network's rules
    pub fn parse(&self, address: &str) -> Result<Address, ValidationError> {
        validate_bitcoin_address(address, self.params)
    }
}

/// Whether `address` decodes as a payable address on the network in `params`
pub fn is_valid(address: &str, params: &NetworkParams) -> bool {
    AddressValidator::new(params).is_valid(address)
}

/// Parse and network-check a destination address
pub fn validate_bitcoin_address(
    address: &str,
    params: &NetworkParams,
) -> Result<Address, ValidationError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidAddress(
            "Address cannot be empty".to_string(),
        ));
    }

    let unchecked = Address::from_str(trimmed)
        .map_err(|e| ValidationError::InvalidAddress(format!("Failed to parse address: {}", e)))?;

    let addr = unchecked.require_network(params.network).map_err(|_| {
        ValidationError::NetworkMismatch(format!(
            "Address {} is not valid for {:?}",
            trimmed, params.network
        ))
    })?;

    match addr.payload {
        Payload::PubkeyHash(_) => {}
        _ => warn!(
            "Recipient {} is not a P2PKH address; fee estimate assumes P2PKH outputs",
            sanitize_for_logging(trimmed)
        ),
    }

    debug!("Validated recipient {}", sanitize_for_logging(trimmed));
    Ok(addr)
}

/// Parse an amount typed in satoshis
///
/// Accepts an optional "sats"/"sat" suffix and `_` or `,` digit separators.
pub fn parse_amount_sats(input: &str) -> Result<u64, ValidationError> {
    let lowered = input.trim().to_lowercase();
    let digits = lowered
        .strip_suffix("sats")
        .or_else(|| lowered.strip_suffix("sat"))
        .unwrap_or(&lowered)
        .trim()
        .replace(['_', ','], "");

    if digits.is_empty() {
        return Err(ValidationError::InvalidAmount("Amount cannot be empty".to_string()));
    }

    let value = digits
        .parse::<u64>()
        .map_err(|_| ValidationError::InvalidAmount(format!("Failed to parse amount: {}", input.trim())))?;

    if value == 0 {
        return Err(ValidationError::InvalidAmount("Amount must be positive".to_string()));
    }
    if value > MAX_BITCOIN_SUPPLY {
        return Err(ValidationError::InvalidAmount(format!(
            "Amount exceeds total Bitcoin supply: {}",
            value
        )));
    }

    Ok(value)
}

/// Interpret a yes/no answer; anything unrecognised is None
pub fn parse_yes_no(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_accepts_suffix_and_separators() {
        assert_eq!(parse_amount_sats("50000"), Ok(50_000));
        assert_eq!(parse_amount_sats(" 50_000 sats "), Ok(50_000));
        assert_eq!(parse_amount_sats("1,000,000"), Ok(1_000_000));
    }

    #[test]
    fn amount_rejects_garbage() {
        assert!(parse_amount_sats("").is_err());
        assert!(parse_amount_sats("0").is_err());
        assert!(parse_amount_sats("-5").is_err());
        assert!(parse_amount_sats("0.5").is_err());
        assert!(parse_amount_sats("2100000000000001").is_err());
    }

    #[test]
    fn yes_no() {
        assert_eq!(parse_yes_no("Y"), Some(true));
        assert_eq!(parse_yes_no(" no "), Some(false));
        assert_eq!(parse_yes_no("maybe"), None);
    }

    #[test]
    fn garbage_address_is_invalid_not_a_panic() {
        let params = NetworkParams::testnet();
        for input in ["", "   ", "not-an-address", "1111111111", "bc1q", "\u{1F600}"] {
            assert!(!is_valid(input, &params), "{:?} should be invalid", input);
        }
    }
}
