//! The interactive payment flow
//!
//! Questions are asked in a fixed order: network, private key, whether to
//! send, recipient (repeated until valid), amount, fee subtraction, and
//! finally whether to broadcast. Only the network, recipient, amount and
//! yes/no questions are re-asked on a bad answer; every other failure ends
//! the session before anything is broadcast.

use bitcoin::Txid;
use bitsend_common::chain_source::ChainSource;
use bitsend_common::config::{parse_network, Config, NetworkParams};
use bitsend_common::error::{PaymentError, PaymentResult};
use bitsend_common::key_management::SigningKey;
use bitsend_common::payment::PaymentSession;
use bitsend_common::types::{AssembledTransaction, PaymentRequest, SensitiveString};
use bitsend_common::validation::{parse_amount_sats, parse_yes_no, AddressValidator};
use log::{debug, info};
use thiserror::Error;

use crate::prompt::AnswerSource;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("Input closed before the session finished")]
    InputClosed,
}

impl SessionError {
    /// Message for the operator; key errors never echo the key
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Payment(err) => err.user_message(),
            SessionError::InputClosed => self.to_string(),
        }
    }
}

/// How a session that did not fail ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The operator chose not to send
    Declined,
    /// Signed but kept local
    NotBroadcast { txid: Txid, raw_hex: String },
    Broadcast { txid: Txid },
}

/// Answer to the amount question
enum AmountChoice {
    Exact(u64),
    Max,
}

/// Run one payment session
///
/// `connect` builds the chain source once the network is known.
pub fn run_session<S, F>(
    config: &Config,
    io: &mut dyn AnswerSource,
    connect: F,
) -> Result<SessionOutcome, SessionError>
where
    S: ChainSource,
    F: FnOnce(&NetworkParams) -> PaymentResult<S>,
{
    let network = ask_network(config, io)?;
    let params = NetworkParams::from_config(config, network)?;
    info!("Using {:?} via {}", params.network, params.explorer_url);
    if params.is_mainnet() {
        io.say("Mainnet selected: payments spend real bitcoin.");
    }

    let wif = SensitiveString::new(ask(io, "Private key (WIF): ")?);
    let key = SigningKey::from_wif(&wif, &params)?;
    drop(wif);

    let source = connect(&params)?;
    let session =
        PaymentSession::new(&source, &params, &key).with_fee_config(config.fees.clone());

    io.say(&format!("Address: {}", key.address()));
    let balance = session.balance()?;
    io.say(&format!(
        "Balance: {} sats confirmed, {} sats unconfirmed",
        balance.confirmed, balance.unconfirmed
    ));

    if !ask_yes_no(io, "Send a payment? (y/n): ")? {
        return Ok(SessionOutcome::Declined);
    }

    let validator = AddressValidator::new(&params);
    let destination = loop {
        let answer = ask(io, "Recipient address: ")?;
        match validator.parse(&answer) {
            Ok(address) => break address,
            Err(e) => {
                debug!("Rejected recipient: {}", e);
                io.say(&format!("{}. Please try again.", e));
            }
        }
    };

    let assembled = match ask_amount(io)? {
        AmountChoice::Max => session.prepare_max(destination)?,
        AmountChoice::Exact(amount) => {
            let subtract = ask_yes_no(io, "Subtract fee from amount? (y/n): ")?;
            session.prepare(&PaymentRequest::new(destination, amount, subtract))?
        }
    };

    for line in format_summary(&assembled, &params) {
        io.say(&line);
    }

    if !ask_yes_no(io, "Broadcast transaction? (y/n): ")? {
        return Ok(SessionOutcome::NotBroadcast {
            txid: assembled.txid,
            raw_hex: assembled.raw_hex(),
        });
    }

    let txid = session.broadcast(&assembled)?;
    io.say(&format!("Broadcast: {}", params.explorer_tx_url(&txid.to_string())));
    Ok(SessionOutcome::Broadcast { txid })
}

/// Lines shown before the broadcast question
pub fn format_summary(tx: &AssembledTransaction, params: &NetworkParams) -> Vec<String> {
    let mut lines = vec![format!(
        "Transaction {} ({} inputs, {} vB)",
        tx.txid,
        tx.inputs.len(),
        tx.virtual_size
    )];

    for output in &tx.outputs {
        let label = if output.is_change { "change" } else { "pay" };
        lines.push(format!("  {:<6} {} sats to {}", label, output.value, output.address));
    }

    if tx.payment_amount() < params.dust_threshold {
        lines.push(format!(
            "  warning: the payment is below the {} sats dust limit and nodes will likely refuse to relay it",
            params.dust_threshold
        ));
    }

    lines.push(format!("  fee    {} sats", tx.fee_paid));
    if tx.dropped_dust > 0 {
        lines.push(format!(
            "  dust   {} sats added to the fee (below {} sats)",
            tx.dropped_dust, params.dust_threshold
        ));
    }
    lines.push(format!("Raw: {}", tx.raw_hex()));
    lines
}

fn ask(io: &mut dyn AnswerSource, question: &str) -> Result<String, SessionError> {
    io.ask(question).ok_or(SessionError::InputClosed)
}

fn ask_network(
    config: &Config,
    io: &mut dyn AnswerSource,
) -> Result<bitcoin::Network, SessionError> {
    let default = config.default_network()?;
    let question = format!("Network (bitcoin/testnet) [{}]: ", default);
    loop {
        let answer = ask(io, &question)?;
        if answer.trim().is_empty() {
            return Ok(default);
        }
        match parse_network(&answer) {
            Ok(network) => return Ok(network),
            Err(e) => io.say(&format!("{}. Please try again.", e)),
        }
    }
}

fn ask_yes_no(io: &mut dyn AnswerSource, question: &str) -> Result<bool, SessionError> {
    loop {
        match parse_yes_no(&ask(io, question)?) {
            Some(answer) => return Ok(answer),
            None => io.say("Please answer y or n."),
        }
    }
}

fn ask_amount(io: &mut dyn AnswerSource) -> Result<AmountChoice, SessionError> {
    loop {
        let answer = ask(io, "Amount in satoshis (or 'max'): ")?;
        if answer.trim().eq_ignore_ascii_case("max") {
            return Ok(AmountChoice::Max);
        }
        match parse_amount_sats(&answer) {
            Ok(amount) => return Ok(AmountChoice::Exact(amount)),
            Err(e) => io.say(&format!("{}. Please try again.", e)),
        }
    }
}
