//! The holder's signing key
//!
//! A [`SigningKey`] is decoded once from WIF, checked against the active
//! network and kept for the rest of the run. It only ever locks and unlocks
//! one script type: pay-to-public-key-hash for its own public key.

use bitcoin::secp256k1::{rand, Secp256k1, SecretKey};
use bitcoin::{Address, PrivateKey, PublicKey, ScriptBuf};
use log::debug;
use std::fmt;

use crate::config::NetworkParams;
use crate::error::{PaymentError, PaymentResult};
use crate::logging::sanitize_for_logging;
use crate::types::SensitiveString;

/// A private key bound to the network it was decoded for
#[derive(Clone)]
pub struct SigningKey {
    private_key: PrivateKey,
    public_key: PublicKey,
    address: Address,
}

impl SigningKey {
    /// Decode a WIF private key for the network in `params`
    ///
    /// A well-formed key with the other network's prefix is rejected as
    /// [`PaymentError::InvalidKey`], same as a malformed one.
    pub fn from_wif(wif: &SensitiveString, params: &NetworkParams) -> PaymentResult<Self> {
        let private_key = PrivateKey::from_wif(wif.expose_secret().trim())
            .map_err(|e| PaymentError::InvalidKey(format!("Malformed WIF: {}", e)))?;

        if private_key.network != params.network {
            return Err(PaymentError::InvalidKey(format!(
                "Key is encoded for {:?}, expected {:?}",
                private_key.network, params.network
            )));
        }

        Ok(Self::from_private_key(private_key))
    }

    /// Create a fresh compressed key for the network in `params`
    pub fn generate(params: &NetworkParams) -> Self {
        let secret = SecretKey::new(&mut rand::thread_rng());
        Self::from_private_key(PrivateKey::new(secret, params.network))
    }

    fn from_private_key(private_key: PrivateKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public_key = private_key.public_key(&secp);
        let address = Address::p2pkh(&public_key, private_key.network);
        debug!(
            "Loaded key for address {}",
            sanitize_for_logging(&address.to_string())
        );

        Self {
            private_key,
            public_key,
            address,
        }
    }

    /// WIF encoding of the key, for display right after generation
    pub fn to_wif(&self) -> SensitiveString {
        SensitiveString::new(self.private_key.to_wif())
    }

    /// The P2PKH address this key controls
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Locking script of every output this key can spend
    pub fn script_pubkey(&self) -> ScriptBuf {
        self.address.script_pubkey()
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.private_key.inner
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("address", &self.address.to_string())
            .field("private_key", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_round_trips_through_wif() {
        let params = NetworkParams::testnet();
        let key = SigningKey::generate(&params);
        let restored = SigningKey::from_wif(&key.to_wif(), &params).unwrap();
        assert_eq!(restored.address(), key.address());
        assert_eq!(restored.public_key(), key.public_key());
    }

    #[test]
    fn wrong_network_key_is_invalid() {
        let key = SigningKey::generate(&NetworkParams::mainnet());
        let err = SigningKey::from_wif(&key.to_wif(), &NetworkParams::testnet()).unwrap_err();
        assert!(matches!(err, PaymentError::InvalidKey(_)));
    }

    #[test]
    fn malformed_wif_is_invalid() {
        let err = SigningKey::from_wif(&SensitiveString::new("not a key"), &NetworkParams::testnet())
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidKey(_)));
    }

    #[test]
    fn debug_output_hides_key() {
        let key = SigningKey::generate(&NetworkParams::testnet());
        let wif = key.to_wif();
        let rendered = format!("{:?}", key);
        assert!(!rendered.contains(wif.expose_secret()));
    }
}
