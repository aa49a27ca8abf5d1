use anyhow::Result;
use bitsend_cli::cli::{Cli, Command};
use bitsend_cli::prompt::StdinAnswers;
use bitsend_cli::session::{run_session, SessionError, SessionOutcome};
use bitsend_common::chain_source::EsploraClient;
use bitsend_common::config::{self, parse_network, Config, NetworkParams};
use bitsend_common::key_management::SigningKey;
use bitsend_common::logging::{self, LogLevel};
use clap::Parser;
use log::{error, info};
use std::process;

fn main() {
    let args = Cli::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            process::exit(1);
        }
    };

    if let Err(e) = setup_logging(&config, args.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    info!("bitsend {}", bitsend_common::VERSION);

    let result = match args.command() {
        Command::Keygen { network } => keygen(&config, network),
        Command::Send => send(&config),
    };

    if let Err(message) = result {
        eprintln!("Error: {}", message);
        process::exit(1);
    }
}

fn load_config(args: &Cli) -> Result<Config> {
    config::ensure_config_exists(&args.config)?;
    Config::load(&args.config)
}

fn setup_logging(config: &Config, verbose: u8) -> Result<(), String> {
    let mut log_config = config.logging.clone();
    log_config.level = match verbose {
        0 => log_config.level,
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    logging::init(&log_config)
}

fn keygen(config: &Config, network: &str) -> Result<(), String> {
    let network = parse_network(network).map_err(|e| e.user_message())?;
    let params = NetworkParams::from_config(config, network).map_err(|e| e.user_message())?;
    let key = SigningKey::generate(&params);

    println!("Network: {}", params.network);
    println!("Address: {}", key.address());
    println!("Private key (WIF): {}", key.to_wif().expose_secret());
    Ok(())
}

fn send(config: &Config) -> Result<(), String> {
    let mut io = StdinAnswers::new();
    let outcome = run_session(config, &mut io, |params| {
        Ok(EsploraClient::from_params(params)?)
    })
    .map_err(|e| {
        if let SessionError::Payment(err) = &e {
            error!("Payment failed ({})", err.category().as_str());
        }
        e.user_message()
    })?;

    match outcome {
        SessionOutcome::Declined => println!("No payment sent."),
        SessionOutcome::NotBroadcast { txid, raw_hex } => {
            println!("Transaction {} was not broadcast.", txid);
            println!("{}", raw_hex);
        }
        SessionOutcome::Broadcast { txid } => println!("Transaction ID: {}", txid),
    }
    Ok(())
}
