//! Legacy P2PKH input signing
//!
//! Each input is signed over its legacy sighash with SIGHASH_ALL. The
//! previous output is taken from the stored parent transaction, not from the
//! explorer listing, so the signer checks that the two agree before
//! committing to it.

use bitcoin::consensus::encode;
use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::secp256k1::{All, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{ScriptBuf, Transaction, TxOut};
use log::debug;

use crate::error::{PaymentError, PaymentResult};
use crate::key_management::SigningKey;
use crate::types::UnspentOutput;

/// Signs transactions spending outputs locked to one key
pub struct Signer<'a> {
    key: &'a SigningKey,
    secp: Secp256k1<All>,
}

impl<'a> Signer<'a> {
    pub fn new(key: &'a SigningKey) -> Self {
        Self {
            key,
            secp: Secp256k1::new(),
        }
    }

    pub fn key(&self) -> &SigningKey {
        self.key
    }

    /// Fill in the unlocking script of every input of `tx`
    ///
    /// `spent` must list the outputs being spent in input order. All digests
    /// are computed against the unsigned skeleton before any script is set.
    pub fn sign_all_inputs(
        &self,
        mut tx: Transaction,
        spent: &[UnspentOutput],
    ) -> PaymentResult<Transaction> {
        if tx.input.len() != spent.len() {
            return Err(PaymentError::Internal(format!(
                "Transaction has {} inputs but {} spent outputs were supplied",
                tx.input.len(),
                spent.len()
            )));
        }

        let script_sigs = {
            let cache = SighashCache::new(&tx);
            let mut script_sigs = Vec::with_capacity(spent.len());

            for (index, utxo) in spent.iter().enumerate() {
                if tx.input[index].previous_output != utxo.outpoint {
                    return Err(PaymentError::Internal(format!(
                        "Input {} spends {} but {} was supplied",
                        index, tx.input[index].previous_output, utxo.outpoint
                    )));
                }

                let prevout = self.previous_output(utxo)?;
                let sighash = cache
                    .legacy_signature_hash(
                        index,
                        &prevout.script_pubkey,
                        EcdsaSighashType::All.to_u32(),
                    )
                    .map_err(|e| {
                        PaymentError::Signing(format!("Sighash for input {}: {}", index, e))
                    })?;

                let message = Message::from_slice(sighash.as_byte_array()).map_err(|e| {
                    PaymentError::Signing(format!("Digest for input {}: {}", index, e))
                })?;
                let signature = self.secp.sign_ecdsa(&message, self.key.secret_key());

                let mut sig_bytes = signature.serialize_der().to_vec();
                sig_bytes.push(EcdsaSighashType::All.to_u32() as u8);
                let sig_push = PushBytesBuf::try_from(sig_bytes).map_err(|_| {
                    PaymentError::Signing(format!("Signature push for input {}", index))
                })?;

                script_sigs.push(
                    Builder::new()
                        .push_slice(sig_push)
                        .push_key(self.key.public_key())
                        .into_script(),
                );
            }
            script_sigs
        };

        for (input, script_sig) in tx.input.iter_mut().zip(script_sigs) {
            input.script_sig = script_sig;
        }

        debug!("Signed {} inputs", spent.len());
        Ok(tx)
    }

    /// Recover the output `utxo` spends from its parent transaction
    fn previous_output(&self, utxo: &UnspentOutput) -> PaymentResult<TxOut> {
        let parent: Transaction = encode::deserialize(&utxo.parent_raw).map_err(|e| {
            PaymentError::Signing(format!("Parent of {} does not decode: {}", utxo.outpoint, e))
        })?;

        if parent.txid() != utxo.outpoint.txid {
            return Err(PaymentError::Signing(format!(
                "Parent bytes hash to {}, expected {}",
                parent.txid(),
                utxo.outpoint.txid
            )));
        }

        let prevout = parent
            .output
            .get(utxo.outpoint.vout as usize)
            .cloned()
            .ok_or_else(|| {
                PaymentError::Signing(format!(
                    "Parent {} has no output {}",
                    utxo.outpoint.txid, utxo.outpoint.vout
                ))
            })?;

        if prevout.value != utxo.value {
            return Err(PaymentError::Signing(format!(
                "Output {} holds {} sats, listed as {}",
                utxo.outpoint, prevout.value, utxo.value
            )));
        }

        if prevout.script_pubkey != self.expected_script() {
            return Err(PaymentError::InvalidKey(format!(
                "Output {} is not locked to this key",
                utxo.outpoint
            )));
        }

        Ok(prevout)
    }

    fn expected_script(&self) -> ScriptBuf {
        self.key.script_pubkey()
    }
}
