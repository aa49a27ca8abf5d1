//! Common data types for BitSend
//!
//! These types carry funds and payment data between the chain source, the
//! coin selector, the assembler and the signer. Apart from [`SensitiveString`]
//! they never hold private key material.

use bitcoin::{Address, OutPoint, Transaction, Txid};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Change at or below this value is not emitted as an output
pub const DUST_THRESHOLD: u64 = 546;

/// Constant for satoshis per Bitcoin
pub const SATS_PER_BTC: u64 = 100_000_000;

/// Constant for maximum Bitcoin supply in satoshis
pub const MAX_BITCOIN_SUPPLY: u64 = 21_000_000 * SATS_PER_BTC;

/// A string that contains sensitive data that should be zeroed when dropped
///
/// Used for WIF-encoded private keys read from the operator.
///
/// # Examples
///
/// ```
/// use bitsend_common::types::SensitiveString;
///
/// let wif = SensitiveString::new("cVt4o7BGAig1UXywgGSmARhxMdzP5qvQsxKkSsc1XEkw3tDTQFpy");
/// assert_eq!(wif.len(), 52);
/// ```
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SensitiveString {
    inner: String,
}

impl SensitiveString {
    /// Create a new SensitiveString
    pub fn new(s: impl Into<String>) -> Self {
        Self { inner: s.into() }
    }

    /// Expose the secret value
    ///
    /// The returned reference must not be logged or persisted.
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveString(***)")
    }
}

/// Fee rate in whole satoshis per virtual byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeeRate(u64);

impl FeeRate {
    pub const fn from_sat_per_vb(sat_per_vb: u64) -> Self {
        Self(sat_per_vb)
    }

    pub const fn as_sat_per_vb(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sat/vB", self.0)
    }
}

/// Anything that can be fed to the coin selector
pub trait UtxoValue {
    fn value_sats(&self) -> u64;
}

/// An unspent output as listed by the explorer, before its parent is fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedUtxo {
    pub outpoint: OutPoint,
    pub value: u64,
    pub confirmed: bool,
}

impl ListedUtxo {
    pub fn new(outpoint: OutPoint, value: u64, confirmed: bool) -> Self {
        Self { outpoint, value, confirmed }
    }
}

impl UtxoValue for ListedUtxo {
    fn value_sats(&self) -> u64 {
        self.value
    }
}

/// A selected unspent output together with the raw bytes of the transaction
/// that created it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub outpoint: OutPoint,
    pub value: u64,
    pub parent_raw: Vec<u8>,
}

impl UnspentOutput {
    pub fn new(outpoint: OutPoint, value: u64, parent_raw: Vec<u8>) -> Self {
        Self { outpoint, value, parent_raw }
    }

    pub fn txid(&self) -> Txid {
        self.outpoint.txid
    }
}

impl UtxoValue for UnspentOutput {
    fn value_sats(&self) -> u64 {
        self.value
    }
}

/// A validated payment instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub destination: Address,
    pub amount: u64,
    pub subtract_fee_from_amount: bool,
}

impl PaymentRequest {
    pub fn new(destination: Address, amount: u64, subtract_fee_from_amount: bool) -> Self {
        Self {
            destination,
            amount,
            subtract_fee_from_amount,
        }
    }
}

/// One output of an assembled transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutput {
    pub address: Address,
    pub value: u64,
    pub is_change: bool,
}

/// A signed transaction ready to be handed to the broadcaster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledTransaction {
    /// Spent outputs, in input order
    pub inputs: Vec<UnspentOutput>,
    /// Payment first, then change if any
    pub outputs: Vec<PaymentOutput>,
    pub transaction: Transaction,
    pub raw_bytes: Vec<u8>,
    pub txid: Txid,
    /// Measured from the signed serialization, not the fee-model estimate
    pub virtual_size: usize,
    /// Fee the plan was priced at; excludes `dropped_dust`
    pub fee_paid: u64,
    /// Value of the change output, 0 when no change output was emitted
    pub change_returned: u64,
    /// Change at or below the dust threshold that went to miners
    pub dropped_dust: u64,
}

impl AssembledTransaction {
    pub fn input_total(&self) -> u64 {
        self.inputs.iter().map(|input| input.value).sum()
    }

    pub fn output_total(&self) -> u64 {
        self.outputs.iter().map(|output| output.value).sum()
    }

    /// Everything the miner receives, including dropped dust
    pub fn effective_fee(&self) -> u64 {
        self.fee_paid + self.dropped_dust
    }

    /// Amount delivered to the destination
    pub fn payment_amount(&self) -> u64 {
        self.outputs
            .iter()
            .filter(|output| !output.is_change)
            .map(|output| output.value)
            .sum()
    }

    pub fn raw_hex(&self) -> String {
        hex::encode(&self.raw_bytes)
    }
}

/// Balance of one address as reported by the explorer
///
/// Unconfirmed balance can be negative while a spend sits in the mempool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBalance {
    pub confirmed: i64,
    pub unconfirmed: i64,
}

impl AddressBalance {
    pub fn total(&self) -> i64 {
        self.confirmed + self.unconfirmed
    }
}
