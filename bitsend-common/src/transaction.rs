//! Payment transaction assembly
//!
//! The assembler turns selected inputs and a [`PaymentRequest`] into a signed
//! transaction with one payment output and, when it is worth keeping, one
//! change output back to the source address.
//!
//! Pricing starts from the two-output fee. When the resulting change is dust
//! the transaction is re-priced for a single output: if the change is still
//! dust at the one-output fee, that fee is used; otherwise the two-output fee
//! is kept and the dust is dropped. Dropped change is never part of
//! `fee_paid`; it is reported as `dropped_dust`, and for every assembled
//! transaction
//!
//! ```text
//! inputs == outputs + fee_paid + dropped_dust
//! ```

use bitcoin::consensus::encode;
use bitcoin::{absolute, Address, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};
use log::{debug, info};

use crate::config::NetworkParams;
use crate::error::{PaymentError, PaymentResult};
use crate::fee_estimation::FeeModel;
use crate::logging::sanitize_for_logging;
use crate::math::is_dust_change;
use crate::signer::Signer;
use crate::types::{AssembledTransaction, PaymentOutput, PaymentRequest, UnspentOutput};

/// Transaction version of every assembled payment
pub const TX_VERSION: i32 = 2;

/// Amounts decided for one payment, before any transaction is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentPlan {
    /// Value of the payment output
    pub payment_amount: u64,
    /// Value of the change output, 0 when there is none
    pub change: u64,
    pub fee_paid: u64,
    /// Change too small to emit; goes to miners on top of `fee_paid`
    pub dropped_dust: u64,
}

impl PaymentPlan {
    pub fn has_change_output(&self) -> bool {
        self.change > 0
    }

    pub fn output_count(&self) -> usize {
        if self.has_change_output() {
            2
        } else {
            1
        }
    }
}

/// Builds and signs payment transactions at a fixed fee rate
#[derive(Debug, Clone)]
pub struct TransactionAssembler<'a> {
    params: &'a NetworkParams,
    fee_model: FeeModel,
}

impl<'a> TransactionAssembler<'a> {
    pub fn new(params: &'a NetworkParams, fee_model: FeeModel) -> Self {
        Self { params, fee_model }
    }

    pub fn fee_model(&self) -> &FeeModel {
        &self.fee_model
    }

    /// Decide payment, change and fee for `input_count` inputs worth `total_input`
    pub fn plan(
        &self,
        input_count: usize,
        total_input: u64,
        request: &PaymentRequest,
    ) -> PaymentResult<PaymentPlan> {
        let requested = request.amount;
        let subtract = request.subtract_fee_from_amount;
        let dust = self.params.dust_threshold;

        let fee_two = self.fee_model.estimate_fee(input_count, 2);
        let amount = payment_amount(requested, fee_two, subtract)?;

        // With fee subtraction this is the requested amount itself
        let needed = amount.saturating_add(fee_two);
        if total_input < needed {
            return Err(PaymentError::InsufficientFunds {
                needed,
                available: total_input,
            });
        }

        let change = total_input - amount - fee_two;
        if !is_dust_change(change, dust) {
            return Ok(PaymentPlan {
                payment_amount: amount,
                change,
                fee_paid: fee_two,
                dropped_dust: 0,
            });
        }

        // No change output: try pricing the smaller transaction
        let fee_one = self.fee_model.estimate_fee(input_count, 1);
        let amount_one = payment_amount(requested, fee_one, subtract)?;
        let change_one = total_input - amount_one - fee_one;

        if is_dust_change(change_one, dust) {
            debug!(
                "Dropping {} sats of dust change at the single-output fee of {}",
                change_one, fee_one
            );
            Ok(PaymentPlan {
                payment_amount: amount_one,
                change: 0,
                fee_paid: fee_one,
                dropped_dust: change_one,
            })
        } else {
            debug!(
                "Dropping {} sats of dust change at the two-output fee of {}",
                change, fee_two
            );
            Ok(PaymentPlan {
                payment_amount: amount,
                change: 0,
                fee_paid: fee_two,
                dropped_dust: change,
            })
        }
    }

    /// Build, sign and serialize the payment
    ///
    /// `total_input_value` must equal the sum of `inputs`; it is the value the
    /// selector reported and is checked rather than trusted.
    pub fn assemble(
        &self,
        inputs: Vec<UnspentOutput>,
        total_input_value: u64,
        request: &PaymentRequest,
        source_address: &Address,
        signer: &Signer<'_>,
    ) -> PaymentResult<AssembledTransaction> {
        let actual_total: u64 = inputs.iter().map(|input| input.value).sum();
        if actual_total != total_input_value {
            return Err(PaymentError::Internal(format!(
                "Selected inputs sum to {} sats but {} was reported",
                actual_total, total_input_value
            )));
        }

        let plan = self.plan(inputs.len(), total_input_value, request)?;

        let mut outputs = vec![PaymentOutput {
            address: request.destination.clone(),
            value: plan.payment_amount,
            is_change: false,
        }];
        if plan.has_change_output() {
            outputs.push(PaymentOutput {
                address: source_address.clone(),
                value: plan.change,
                is_change: true,
            });
        }

        let unsigned = Transaction {
            version: TX_VERSION,
            lock_time: absolute::LockTime::ZERO,
            input: inputs
                .iter()
                .map(|utxo| TxIn {
                    previous_output: utxo.outpoint,
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::default(),
                })
                .collect(),
            output: outputs
                .iter()
                .map(|output| TxOut {
                    value: output.value,
                    script_pubkey: output.address.script_pubkey(),
                })
                .collect(),
        };

        let transaction = signer.sign_all_inputs(unsigned, &inputs)?;
        let raw_bytes = encode::serialize(&transaction);
        let txid = transaction.txid();
        let virtual_size = transaction.vsize();

        let assembled = AssembledTransaction {
            inputs,
            outputs,
            transaction,
            raw_bytes,
            txid,
            virtual_size,
            fee_paid: plan.fee_paid,
            change_returned: plan.change,
            dropped_dust: plan.dropped_dust,
        };

        let accounted = assembled.output_total() + assembled.fee_paid + assembled.dropped_dust;
        if assembled.input_total() != accounted {
            return Err(PaymentError::Internal(format!(
                "Value not conserved: inputs {} != outputs + fee + dust {}",
                assembled.input_total(),
                accounted
            )));
        }

        info!(
            "Assembled {} ({} in, {} out, {} vB, fee {} sats) paying {}",
            sanitize_for_logging(&txid.to_string()),
            assembled.inputs.len(),
            assembled.outputs.len(),
            virtual_size,
            assembled.fee_paid,
            sanitize_for_logging(&request.destination.to_string())
        );
        Ok(assembled)
    }
}

fn payment_amount(requested: u64, fee: u64, subtract: bool) -> PaymentResult<u64> {
    if !subtract {
        if requested == 0 {
            return Err(PaymentError::AmountTooSmall { requested, fee });
        }
        return Ok(requested);
    }
    if requested <= fee {
        return Err(PaymentError::AmountTooSmall { requested, fee });
    }
    Ok(requested - fee)
}
