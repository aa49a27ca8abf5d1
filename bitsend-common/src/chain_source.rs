//! Block explorer access
//!
//! [`ChainSource`] is everything a payment run needs from the outside world:
//! a balance, the unspent outputs of one address, fee estimates, raw parent
//! transactions and a broadcast endpoint. [`EsploraClient`] talks to an
//! Esplora-compatible REST API; [`MockChainSource`] serves canned data for
//! tests and offline runs.

use bitcoin::consensus::encode;
use bitcoin::hashes::Hash;
use bitcoin::{
    absolute, Address, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use crate::config::NetworkParams;
use crate::logging::sanitize_for_logging;
use crate::types::{AddressBalance, ListedUtxo};

/// Error types for explorer calls
#[derive(Debug, Error)]
pub enum ChainSourceError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Explorer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected explorer response: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The explorer refused to relay a transaction
    #[error("Broadcast rejected: {0}")]
    Rejected(String),
}

/// Read and write access to the chain for a single address
pub trait ChainSource {
    /// Confirmed and mempool balance of an address
    fn address_balance(&self, address: &Address) -> Result<AddressBalance, ChainSourceError>;

    /// Unspent outputs of an address, in the order the explorer lists them
    fn list_utxos(&self, address: &Address) -> Result<Vec<ListedUtxo>, ChainSourceError>;

    /// Fee rate estimates in sat/vB keyed by confirmation target in blocks
    fn fee_estimates(&self) -> Result<HashMap<u32, f64>, ChainSourceError>;

    /// Consensus serialization of a confirmed or mempool transaction
    fn raw_transaction(&self, txid: &Txid) -> Result<Vec<u8>, ChainSourceError>;

    /// Submit a signed transaction, returning the txid the explorer reports
    fn broadcast(&self, raw_tx: &[u8]) -> Result<Txid, ChainSourceError>;
}

impl<T: ChainSource + ?Sized> ChainSource for &T {
    fn address_balance(&self, address: &Address) -> Result<AddressBalance, ChainSourceError> {
        (**self).address_balance(address)
    }

    fn list_utxos(&self, address: &Address) -> Result<Vec<ListedUtxo>, ChainSourceError> {
        (**self).list_utxos(address)
    }

    fn fee_estimates(&self) -> Result<HashMap<u32, f64>, ChainSourceError> {
        (**self).fee_estimates()
    }

    fn raw_transaction(&self, txid: &Txid) -> Result<Vec<u8>, ChainSourceError> {
        (**self).raw_transaction(txid)
    }

    fn broadcast(&self, raw_tx: &[u8]) -> Result<Txid, ChainSourceError> {
        (**self).broadcast(raw_tx)
    }
}

#[derive(Debug, Deserialize)]
struct EsploraTxoStats {
    funded_txo_sum: u64,
    spent_txo_sum: u64,
}

impl EsploraTxoStats {
    fn net(&self) -> i64 {
        self.funded_txo_sum as i64 - self.spent_txo_sum as i64
    }
}

#[derive(Debug, Deserialize)]
struct EsploraAddressInfo {
    chain_stats: EsploraTxoStats,
    mempool_stats: EsploraTxoStats,
}

#[derive(Debug, Deserialize)]
struct EsploraUtxoStatus {
    confirmed: bool,
}

#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: String,
    vout: u32,
    status: EsploraUtxoStatus,
    value: u64,
}

/// Blocking client for an Esplora REST API
#[derive(Debug, Clone)]
pub struct EsploraClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl EsploraClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ChainSourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainSourceError::Connection(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Client for the explorer configured for the active network
    pub fn from_params(params: &NetworkParams) -> Result<Self, ChainSourceError> {
        Self::new(params.explorer_url.clone(), params.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_text(&self, path: &str) -> Result<String, ChainSourceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| ChainSourceError::Connection(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| ChainSourceError::Connection(e.to_string()))?;

        map_response(status, body, path)
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ChainSourceError> {
        let body = self.get_text(path)?;
        serde_json::from_str(&body).map_err(|e| ChainSourceError::Parse(format!("{}: {}", path, e)))
    }
}

impl ChainSource for EsploraClient {
    fn address_balance(&self, address: &Address) -> Result<AddressBalance, ChainSourceError> {
        let info: EsploraAddressInfo = self.get_json(&format!("/address/{}", address))?;
        Ok(AddressBalance {
            confirmed: info.chain_stats.net(),
            unconfirmed: info.mempool_stats.net(),
        })
    }

    fn list_utxos(&self, address: &Address) -> Result<Vec<ListedUtxo>, ChainSourceError> {
        let listed: Vec<EsploraUtxo> = self.get_json(&format!("/address/{}/utxo", address))?;

        let utxos = listed
            .into_iter()
            .map(|utxo| {
                let txid = Txid::from_str(&utxo.txid)
                    .map_err(|e| ChainSourceError::Parse(format!("txid {}: {}", utxo.txid, e)))?;
                Ok(ListedUtxo::new(
                    OutPoint::new(txid, utxo.vout),
                    utxo.value,
                    utxo.status.confirmed,
                ))
            })
            .collect::<Result<Vec<_>, ChainSourceError>>()?;

        debug!(
            "Explorer listed {} unspent outputs for {}",
            utxos.len(),
            sanitize_for_logging(&address.to_string())
        );
        Ok(utxos)
    }

    fn fee_estimates(&self) -> Result<HashMap<u32, f64>, ChainSourceError> {
        let body = self.get_text("/fee-estimates")?;
        parse_fee_estimates(&body)
    }

    fn raw_transaction(&self, txid: &Txid) -> Result<Vec<u8>, ChainSourceError> {
        let body = self.get_text(&format!("/tx/{}/hex", txid))?;
        decode_raw_transaction(txid, &body)
    }

    fn broadcast(&self, raw_tx: &[u8]) -> Result<Txid, ChainSourceError> {
        let url = format!("{}/tx", self.base_url);
        info!("Broadcasting transaction of {} bytes", raw_tx.len());

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "text/plain")
            .body(hex::encode(raw_tx))
            .send()
            .map_err(|e| ChainSourceError::Connection(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| ChainSourceError::Connection(e.to_string()))?;

        parse_broadcast_response(status, &body)
    }
}

/// Turn an explorer GET response into its body or an error
fn map_response(status: u16, body: String, path: &str) -> Result<String, ChainSourceError> {
    match status {
        200..=299 => Ok(body),
        404 => Err(ChainSourceError::NotFound(path.to_string())),
        _ => Err(ChainSourceError::Status { status, body }),
    }
}

/// Parse `/fee-estimates`, whose keys are block targets written as strings
fn parse_fee_estimates(body: &str) -> Result<HashMap<u32, f64>, ChainSourceError> {
    let raw: HashMap<String, f64> = serde_json::from_str(body)
        .map_err(|e| ChainSourceError::Parse(format!("/fee-estimates: {}", e)))?;

    let mut estimates = HashMap::with_capacity(raw.len());
    for (target, rate) in raw {
        match target.parse::<u32>() {
            Ok(blocks) => {
                estimates.insert(blocks, rate);
            }
            Err(_) => warn!("Ignoring fee estimate with non-numeric target {:?}", target),
        }
    }
    Ok(estimates)
}

fn decode_raw_transaction(txid: &Txid, body: &str) -> Result<Vec<u8>, ChainSourceError> {
    hex::decode(body.trim()).map_err(|e| ChainSourceError::Parse(format!("tx {} hex: {}", txid, e)))
}

/// `POST /tx` answers with the txid on success and a reason otherwise
fn parse_broadcast_response(status: u16, body: &str) -> Result<Txid, ChainSourceError> {
    if !(200..=299).contains(&status) {
        return Err(ChainSourceError::Rejected(format!(
            "HTTP {}: {}",
            status,
            body.trim()
        )));
    }

    Txid::from_str(body.trim())
        .map_err(|e| ChainSourceError::Parse(format!("broadcast response {:?}: {}", body, e)))
}

/// In-memory chain source
///
/// Funding outputs get a synthetic parent transaction so they can be signed
/// against exactly like explorer data. Broadcasts are recorded, not relayed.
#[derive(Debug, Default)]
pub struct MockChainSource {
    utxos: HashMap<String, Vec<ListedUtxo>>,
    parents: HashMap<Txid, Vec<u8>>,
    fee_estimates: HashMap<u32, f64>,
    fee_estimates_fail: bool,
    broadcast_rejection: Option<String>,
    broadcasts: Mutex<Vec<Vec<u8>>>,
    parent_fetches: AtomicUsize,
    funding_counter: u32,
}

impl MockChainSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output of `value` paying `address`, backed by a synthetic parent
    pub fn with_funding(self, address: &Address, value: u64, confirmed: bool) -> Self {
        let script_pubkey = address.script_pubkey();
        self.with_funding_script(address, script_pubkey, value, confirmed)
    }

    /// Like [`with_funding`](Self::with_funding) but the parent output pays
    /// `script_pubkey`, which need not belong to `address`
    pub fn with_funding_script(
        mut self,
        address: &Address,
        script_pubkey: ScriptBuf,
        value: u64,
        confirmed: bool,
    ) -> Self {
        self.funding_counter += 1;
        let parent = Transaction {
            version: 2,
            lock_time: absolute::LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::new(Txid::all_zeros(), self.funding_counter),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::default(),
            }],
            output: vec![TxOut {
                value,
                script_pubkey,
            }],
        };

        let txid = parent.txid();
        let listed = ListedUtxo::new(OutPoint::new(txid, 0), value, confirmed);
        self.parents.insert(txid, encode::serialize(&parent));
        self.utxos.entry(address.to_string()).or_default().push(listed);
        self
    }

    /// Add a listing with caller-supplied parent bytes
    pub fn with_utxo(mut self, address: &Address, utxo: ListedUtxo, parent_raw: Vec<u8>) -> Self {
        self.parents.insert(utxo.outpoint.txid, parent_raw);
        self.utxos.entry(address.to_string()).or_default().push(utxo);
        self
    }

    /// Add a listing whose parent transaction the explorer cannot serve
    pub fn with_orphan_utxo(mut self, address: &Address, utxo: ListedUtxo) -> Self {
        self.utxos.entry(address.to_string()).or_default().push(utxo);
        self
    }

    pub fn with_fee_estimate(mut self, target_blocks: u32, rate: f64) -> Self {
        self.fee_estimates.insert(target_blocks, rate);
        self
    }

    pub fn failing_fee_estimates(mut self) -> Self {
        self.fee_estimates_fail = true;
        self
    }

    pub fn rejecting_broadcasts(mut self, reason: impl Into<String>) -> Self {
        self.broadcast_rejection = Some(reason.into());
        self
    }

    /// Every transaction submitted so far, in submission order
    pub fn broadcasts(&self) -> Vec<Vec<u8>> {
        self.broadcasts
            .lock()
            .map(|recorded| recorded.clone())
            .unwrap_or_default()
    }

    /// Number of raw transaction lookups served or attempted
    pub fn parent_fetches(&self) -> usize {
        self.parent_fetches.load(Ordering::SeqCst)
    }
}

impl ChainSource for MockChainSource {
    fn address_balance(&self, address: &Address) -> Result<AddressBalance, ChainSourceError> {
        let mut balance = AddressBalance::default();
        for utxo in self.utxos.get(&address.to_string()).into_iter().flatten() {
            if utxo.confirmed {
                balance.confirmed += utxo.value as i64;
            } else {
                balance.unconfirmed += utxo.value as i64;
            }
        }
        Ok(balance)
    }

    fn list_utxos(&self, address: &Address) -> Result<Vec<ListedUtxo>, ChainSourceError> {
        Ok(self
            .utxos
            .get(&address.to_string())
            .cloned()
            .unwrap_or_default())
    }

    fn fee_estimates(&self) -> Result<HashMap<u32, f64>, ChainSourceError> {
        if self.fee_estimates_fail {
            return Err(ChainSourceError::Connection(
                "fee estimates unavailable".to_string(),
            ));
        }
        Ok(self.fee_estimates.clone())
    }

    fn raw_transaction(&self, txid: &Txid) -> Result<Vec<u8>, ChainSourceError> {
        self.parent_fetches.fetch_add(1, Ordering::SeqCst);
        self.parents
            .get(txid)
            .cloned()
            .ok_or_else(|| ChainSourceError::NotFound(format!("/tx/{}/hex", txid)))
    }

    fn broadcast(&self, raw_tx: &[u8]) -> Result<Txid, ChainSourceError> {
        if let Some(reason) = &self.broadcast_rejection {
            return Err(ChainSourceError::Rejected(reason.clone()));
        }

        let tx: Transaction = encode::deserialize(raw_tx)
            .map_err(|e| ChainSourceError::Rejected(format!("TX decode failed: {}", e)))?;

        if let Ok(mut recorded) = self.broadcasts.lock() {
            recorded.push(raw_tx.to_vec());
        }
        Ok(tx.txid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCategory, PaymentError};
    use bitcoin::Network;

    fn address() -> Address {
        Address::from_str("mipcBbFg9gMiCh81Kj8tqqdgoZub1ZJRfn")
            .unwrap()
            .require_network(Network::Testnet)
            .unwrap()
    }

    #[test]
    fn mock_funding_serves_matching_parent() {
        let source = MockChainSource::new().with_funding(&address(), 100_000, true);
        let utxos = source.list_utxos(&address()).unwrap();
        assert_eq!(utxos.len(), 1);

        let raw = source.raw_transaction(&utxos[0].outpoint.txid).unwrap();
        let parent: Transaction = encode::deserialize(&raw).unwrap();
        assert_eq!(parent.txid(), utxos[0].outpoint.txid);
        assert_eq!(parent.output[0].value, 100_000);
        assert_eq!(parent.output[0].script_pubkey, address().script_pubkey());
        assert_eq!(source.parent_fetches(), 1);
    }

    #[test]
    fn mock_parents_have_distinct_txids() {
        let source = MockChainSource::new()
            .with_funding(&address(), 5_000, true)
            .with_funding(&address(), 5_000, true);
        let utxos = source.list_utxos(&address()).unwrap();
        assert_ne!(utxos[0].outpoint.txid, utxos[1].outpoint.txid);
    }

    #[test]
    fn mock_balance_splits_confirmed_and_mempool() {
        let source = MockChainSource::new()
            .with_funding(&address(), 70_000, true)
            .with_funding(&address(), 30_000, false);
        let balance = source.address_balance(&address()).unwrap();
        assert_eq!(balance.confirmed, 70_000);
        assert_eq!(balance.unconfirmed, 30_000);
    }

    #[test]
    fn esplora_stats_net_can_be_negative() {
        let info: EsploraAddressInfo = serde_json::from_str(
            r#"{"address":"x","chain_stats":{"funded_txo_count":1,"funded_txo_sum":5000,"spent_txo_count":0,"spent_txo_sum":0,"tx_count":1},
                "mempool_stats":{"funded_txo_count":0,"funded_txo_sum":0,"spent_txo_count":1,"spent_txo_sum":5000,"tx_count":1}}"#,
        )
        .unwrap();
        assert_eq!(info.chain_stats.net(), 5000);
        assert_eq!(info.mempool_stats.net(), -5000);
    }

    #[test]
    fn esplora_utxo_listing_parses() {
        let listed: Vec<EsploraUtxo> = serde_json::from_str(
            r#"[{"txid":"4e3b3fd4c3bb8a9d9c8e3f5c2f5b1c6f1e6c1d9a7f3a7e1f2c4b6d8e0a1b2c3d","vout":1,
                 "status":{"confirmed":false},"value":12345}]"#,
        )
        .unwrap();
        assert_eq!(listed[0].vout, 1);
        assert_eq!(listed[0].value, 12345);
        assert!(!listed[0].status.confirmed);
    }

    #[test]
    fn success_status_yields_body() {
        let body = map_response(200, "abcd".to_string(), "/tx/x/hex").unwrap();
        assert_eq!(body, "abcd");
    }

    #[test]
    fn missing_resource_maps_to_not_found() {
        let err = map_response(404, "Transaction not found".to_string(), "/tx/x/hex").unwrap_err();
        assert!(matches!(err, ChainSourceError::NotFound(ref path) if path == "/tx/x/hex"));
    }

    #[test]
    fn server_error_keeps_status_and_body() {
        let err = map_response(503, "overloaded".to_string(), "/fee-estimates").unwrap_err();
        match err {
            ChainSourceError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn fee_table_keys_become_block_targets() {
        let estimates =
            parse_fee_estimates(r#"{"1": 20.5, "6": 3.2, "144": 1.0, "soon": 9.9}"#).unwrap();
        assert_eq!(estimates.len(), 3);
        assert_eq!(estimates.get(&6), Some(&3.2));
        assert_eq!(estimates.get(&144), Some(&1.0));
    }

    #[test]
    fn malformed_fee_table_is_a_parse_error() {
        let err = parse_fee_estimates("<html>busy</html>").unwrap_err();
        assert!(matches!(err, ChainSourceError::Parse(_)));
    }

    #[test]
    fn raw_transaction_hex_is_decoded() {
        let txid = Txid::all_zeros();
        assert_eq!(decode_raw_transaction(&txid, "0200ff\n").unwrap(), vec![0x02, 0x00, 0xff]);

        let err = decode_raw_transaction(&txid, "not hex").unwrap_err();
        assert!(matches!(err, ChainSourceError::Parse(ref msg) if msg.contains(&txid.to_string())));
    }

    #[test]
    fn accepted_broadcast_returns_txid() {
        let txid = "4e3b3fd4c3bb8a9d9c8e3f5c2f5b1c6f1e6c1d9a7f3a7e1f2c4b6d8e0a1b2c3d";
        let parsed = parse_broadcast_response(200, &format!("{}\n", txid)).unwrap();
        assert_eq!(parsed.to_string(), txid);
    }

    #[test]
    fn refused_broadcast_is_rejected_and_surfaces_as_network_error() {
        let err = parse_broadcast_response(
            400,
            "sendrawtransaction RPC error: {\"code\":-26,\"message\":\"dust\"}",
        )
        .unwrap_err();
        assert!(matches!(err, ChainSourceError::Rejected(ref msg) if msg.starts_with("HTTP 400")));

        let payment: PaymentError = err.into();
        assert_eq!(payment.category(), ErrorCategory::Network);
    }

    #[test]
    fn unreadable_broadcast_reply_is_a_parse_error() {
        let err = parse_broadcast_response(200, "ok").unwrap_err();
        assert!(matches!(err, ChainSourceError::Parse(_)));
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client =
            EsploraClient::new("https://blockstream.info/testnet/api/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.base_url(), "https://blockstream.info/testnet/api");
    }
}
