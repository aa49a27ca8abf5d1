//! BitSend Common Library
//!
//! Builds, signs and submits single-key Bitcoin payments from the outputs
//! held by one P2PKH address.
//!
//! # Modules
//!
//! - `types`: Payment data types
//! - `math`: Size and fee arithmetic
//! - `logging`: Logger setup and log sanitization
//! - `config`: Configuration file and per-run network parameters
//! - `error`: The payment error taxonomy
//! - `chain_source`: Block explorer access (Esplora and in-memory)
//! - `fee_estimation`: Fee rate lookup with fallback
//! - `utxo_selection`: Listing-order coin selection
//! - `validation`: Address and amount input checks
//! - `key_management`: WIF decoding and key generation
//! - `signer`: Legacy P2PKH input signing
//! - `transaction`: Payment and change computation, assembly
//! - `payment`: The end-to-end pipeline for one key

/// Payment data types
pub mod types;

/// Size and fee arithmetic
pub mod math;

/// Logging setup
pub mod logging;

/// Configuration management
pub mod config;

/// Error taxonomy
pub mod error;

/// Block explorer access
pub mod chain_source;

/// Fee estimation utilities
pub mod fee_estimation;

/// Coin selection
pub mod utxo_selection;

/// Input validation
pub mod validation;

/// Signing key handling
pub mod key_management;

/// Transaction signing
pub mod signer;

/// Transaction assembly
pub mod transaction;

/// Payment pipeline
pub mod payment;

pub use bitcoin::{Address, Network, OutPoint, Transaction, Txid};

pub use chain_source::{ChainSource, ChainSourceError, EsploraClient, MockChainSource};
pub use config::{Config, NetworkParams};
pub use error::{ErrorCategory, PaymentError, PaymentResult};
pub use fee_estimation::FeeModel;
pub use key_management::SigningKey;
pub use payment::PaymentSession;
pub use signer::Signer;
pub use transaction::{PaymentPlan, TransactionAssembler};
pub use types::{
    AddressBalance, AssembledTransaction, FeeRate, ListedUtxo, PaymentOutput, PaymentRequest,
    SensitiveString, UnspentOutput, DUST_THRESHOLD,
};
pub use utxo_selection::{CoinSelector, Selection};
pub use validation::AddressValidator;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Integration tests live in the tests/ directory
