//! The payment pipeline for one source key
//!
//! A [`PaymentSession`] ties a signing key and the run's network parameters
//! to a [`ChainSource`] and drives the steps in order: list outputs, observe
//! the fee rate, select, fetch the parents of the chosen outputs, assemble
//! and sign. Broadcasting is a separate call so the caller can show the
//! result and ask first.
//!
//! Every external call completes before the next one starts.

use bitcoin::{Address, Txid};
use log::{info, warn};

use crate::chain_source::{ChainSource, ChainSourceError};
use crate::config::{FeeConfig, NetworkParams};
use crate::error::{network_error, PaymentError, PaymentResult};
use crate::fee_estimation::FeeModel;
use crate::key_management::SigningKey;
use crate::logging::sanitize_for_logging;
use crate::signer::Signer;
use crate::transaction::TransactionAssembler;
use crate::types::{
    AddressBalance, AssembledTransaction, ListedUtxo, PaymentRequest, UnspentOutput,
};
use crate::utxo_selection::{CoinSelector, Selection};

/// Payment operations for the address controlled by one key
pub struct PaymentSession<'a, S: ChainSource + ?Sized> {
    source: &'a S,
    params: &'a NetworkParams,
    key: &'a SigningKey,
    fees: FeeConfig,
}

impl<'a, S: ChainSource + ?Sized> PaymentSession<'a, S> {
    pub fn new(source: &'a S, params: &'a NetworkParams, key: &'a SigningKey) -> Self {
        Self {
            source,
            params,
            key,
            fees: FeeConfig::default(),
        }
    }

    pub fn with_fee_config(mut self, fees: FeeConfig) -> Self {
        self.fees = fees;
        self
    }

    pub fn source_address(&self) -> &Address {
        self.key.address()
    }

    pub fn params(&self) -> &NetworkParams {
        self.params
    }

    pub fn balance(&self) -> PaymentResult<AddressBalance> {
        Ok(self.source.address_balance(self.source_address())?)
    }

    /// Unspent outputs of the source address, failing when there are none
    pub fn spendable_utxos(&self) -> PaymentResult<Vec<ListedUtxo>> {
        let utxos = self.source.list_utxos(self.source_address())?;
        if utxos.is_empty() {
            return Err(PaymentError::NoSpendableFunds(format!(
                "address {} has no unspent outputs",
                self.source_address()
            )));
        }
        Ok(utxos)
    }

    /// One fee rate observation for the configured target
    pub fn fee_model(&self) -> FeeModel {
        FeeModel::from_source(
            self.source,
            self.fees.confirmation_target,
            self.fees.fallback_rate(),
        )
    }

    /// Select, fetch parents, assemble and sign a payment
    pub fn prepare(&self, request: &PaymentRequest) -> PaymentResult<AssembledTransaction> {
        let utxos = self.spendable_utxos()?;
        let fee_model = self.fee_model();

        let selection = CoinSelector::new(fee_model)
            .with_margin(self.fees.selection_margin)
            .select(&utxos, request.amount)?;

        self.assemble(selection, request, fee_model)
    }

    /// Send the entire spendable balance to `destination`, fee taken from it
    pub fn prepare_max(&self, destination: Address) -> PaymentResult<AssembledTransaction> {
        let utxos = self.spendable_utxos()?;
        let fee_model = self.fee_model();

        let selection = CoinSelector::new(fee_model).select_all(&utxos)?;
        let request = PaymentRequest::new(destination, selection.total_input_value, true);

        self.assemble(selection, &request, fee_model)
    }

    fn assemble(
        &self,
        selection: Selection<ListedUtxo>,
        request: &PaymentRequest,
        fee_model: FeeModel,
    ) -> PaymentResult<AssembledTransaction> {
        info!(
            "Paying {} sats to {} at {} from {} inputs",
            request.amount,
            sanitize_for_logging(&request.destination.to_string()),
            fee_model.rate(),
            selection.len()
        );

        let inputs = self.resolve_parents(&selection.chosen)?;
        let signer = Signer::new(self.key);

        TransactionAssembler::new(self.params, fee_model).assemble(
            inputs,
            selection.total_input_value,
            request,
            self.source_address(),
            &signer,
        )
    }

    /// Fetch the parent transaction of each chosen output, one at a time
    ///
    /// The returned outputs keep the order of `chosen`.
    pub fn resolve_parents(&self, chosen: &[ListedUtxo]) -> PaymentResult<Vec<UnspentOutput>> {
        let mut resolved = Vec::with_capacity(chosen.len());
        for utxo in chosen {
            let parent_raw = self
                .source
                .raw_transaction(&utxo.outpoint.txid)
                .map_err(|e| match e {
                    ChainSourceError::NotFound(_) => network_error(format!(
                        "Parent transaction {} of a listed output was not found",
                        utxo.outpoint.txid
                    )),
                    other => other.into(),
                })?;
            resolved.push(UnspentOutput::new(utxo.outpoint, utxo.value, parent_raw));
        }
        Ok(resolved)
    }

    /// Submit an assembled transaction
    pub fn broadcast(&self, assembled: &AssembledTransaction) -> PaymentResult<Txid> {
        let txid = self.source.broadcast(&assembled.raw_bytes)?;
        if txid != assembled.txid {
            warn!(
                "Explorer reported txid {} for transaction {}",
                txid, assembled.txid
            );
        }
        info!("Broadcast {}", sanitize_for_logging(&txid.to_string()));
        Ok(txid)
    }
}
