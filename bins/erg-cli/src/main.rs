//! erg-cli — Offline drafting and signing of Ergo transactions.
//!
//! Manages the encrypted root key, drafts transactions over a JSON UTXO
//! file, signs them, and answers the connector's read queries.

mod config;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use erg_connector::wire::{WireAddressedUtxo, WireSignedTx};
use erg_connector::{Connector, NATIVE_TOKEN, WalletBackend};
use erg_core::address::Address;
use erg_core::constants::NetworkType;
use erg_core::prover::ErgoProver;
use erg_core::types::ErgoTree;
use erg_wallet::addressing::level;
use erg_wallet::keys::derive_for_addressing;
use erg_wallet::mnemonic::{generate_mnemonic, mnemonic_to_seed, DEFAULT_WORD_COUNT};
use erg_wallet::{
    AddressedUtxo, Addressing, EncryptedRootKey, ExtendedKey, Receiver, Seed, SignRequest,
    Signer, SpendOutput, TransactionDrafter, WalletError,
};

use crate::config::CliConfig;

/// Ergo offline wallet interface.
#[derive(Parser)]
#[command(name = "erg-cli")]
#[command(version, about = "Draft and sign Ergo transactions offline.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Root key management subcommands.
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Draft a transaction and print its summary.
    Draft(DraftArgs),
    /// Draft and sign a transaction, printing it in wire format.
    Sign(SignArgs),
    /// Balance of the native asset or a token over a UTXO file.
    Balance(BalanceArgs),
    /// List boxes of a UTXO file in wire format.
    Utxos(UtxosArgs),
}

#[derive(Subcommand)]
enum KeyAction {
    /// Generate a new mnemonic and store its root key.
    Generate(KeyGenerateArgs),
    /// Store the root key of an existing mnemonic.
    Import(KeyImportArgs),
}

#[derive(Args)]
struct KeyGenerateArgs {
    /// Path to key file (default: ~/.ergvault/root.key).
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Number of mnemonic words (12, 15, 18, 21 or 24).
    #[arg(long, default_value_t = DEFAULT_WORD_COUNT)]
    words: usize,

    /// Prompt for a BIP-39 passphrase.
    #[arg(long)]
    passphrase: bool,
}

#[derive(Args)]
struct KeyImportArgs {
    /// Path to key file (default: ~/.ergvault/root.key).
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Prompt for a BIP-39 passphrase.
    #[arg(long)]
    passphrase: bool,
}

#[derive(Args)]
struct DraftArgs {
    /// JSON array of addressed UTXOs, in spending preference order.
    #[arg(short, long)]
    utxos: PathBuf,

    /// Sweep every UTXO to this address.
    #[arg(long, conflicts_with_all = ["to", "change", "change_path"])]
    send_all: Option<String>,

    /// Payment as ADDRESS:NANOERG; repeatable.
    #[arg(long, value_parser = parse_payment)]
    to: Vec<Payment>,

    /// Change address (one of the wallet's own).
    #[arg(long, required_unless_present = "send_all")]
    change: Option<String>,

    /// Derivation path of the change address, e.g. 44'/429'/0'/1/0.
    #[arg(long)]
    change_path: Option<String>,

    /// Miner fee in nanoERG (default: ERG_FEE).
    #[arg(short, long)]
    fee: Option<u64>,
}

#[derive(Args)]
struct SignArgs {
    #[command(flatten)]
    draft: DraftArgs,

    /// Path to key file (default: ~/.ergvault/root.key).
    #[arg(short, long)]
    key: Option<PathBuf>,
}

#[derive(Args)]
struct BalanceArgs {
    /// JSON array of addressed UTXOs.
    #[arg(short, long)]
    utxos: PathBuf,

    /// Token id (hex), or ERG for the native asset.
    #[arg(short, long, default_value = NATIVE_TOKEN)]
    token: String,
}

#[derive(Args)]
struct UtxosArgs {
    /// JSON array of addressed UTXOs.
    #[arg(short, long)]
    utxos: PathBuf,

    /// Stop once the listed boxes hold at least this many nanoERG.
    #[arg(long)]
    value_hint: Option<u64>,
}

#[derive(Clone, Debug)]
struct Payment {
    address: String,
    amount: u64,
}

fn parse_payment(s: &str) -> Result<Payment, String> {
    let (address, amount) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("expected ADDRESS:NANOERG, got {s}"))?;
    let amount = amount
        .parse()
        .map_err(|_| format!("invalid amount in {s}"))?;
    Ok(Payment {
        address: address.to_string(),
        amount,
    })
}

/// Wallet backend over a UTXO file and an optional key file.
struct FileWallet {
    utxos: Vec<AddressedUtxo>,
    key_path: Option<PathBuf>,
}

impl FileWallet {
    fn load(utxos: &Path, key_path: Option<PathBuf>) -> Result<Self> {
        let data = std::fs::read_to_string(utxos)
            .with_context(|| format!("Failed to read UTXO file: {}", utxos.display()))?;
        let wire: Vec<WireAddressedUtxo> =
            serde_json::from_str(&data).context("UTXO file is not a JSON array of boxes")?;
        let utxos = wire
            .iter()
            .map(AddressedUtxo::try_from)
            .collect::<Result<Vec<_>, _>>()
            .context("Malformed box in UTXO file")?;
        Ok(Self { utxos, key_path })
    }
}

impl WalletBackend for FileWallet {
    fn native_balance(&self) -> Result<u64, WalletError> {
        self.utxos.iter().try_fold(0u64, |acc, u| {
            acc.checked_add(u.utxo.value).ok_or_else(|| {
                WalletError::InvalidAmount("native balance overflows u64".into())
            })
        })
    }

    fn utxos(&self) -> &[AddressedUtxo] {
        &self.utxos
    }

    fn unlock_root_key(&self, password: &[u8]) -> Result<ExtendedKey, WalletError> {
        let path = self
            .key_path
            .as_deref()
            .ok_or_else(|| WalletError::IoError("no key file configured".into()))?;
        EncryptedRootKey::load(path)?.unlock(password)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Key { action } => match action {
            KeyAction::Generate(args) => key_generate(args),
            KeyAction::Import(args) => key_import(args),
        },
        Commands::Draft(args) => draft(args),
        Commands::Sign(args) => sign(args),
        Commands::Balance(args) => balance(args),
        Commands::Utxos(args) => list_utxos(args),
    }
}

/// Generate a fresh mnemonic and store the encrypted root key.
fn key_generate(args: KeyGenerateArgs) -> Result<()> {
    let key_path = resolve_key_path(args.out)?;
    if key_path.exists() {
        bail!("Key file already exists: {}", key_path.display());
    }

    let phrase = generate_mnemonic(args.words).context("Failed to generate mnemonic")?;
    let passphrase = read_passphrase(args.passphrase)?;
    let seed = mnemonic_to_seed(&phrase, &passphrase).context("Failed to derive seed")?;
    let first = first_address(&seed, CliConfig::from_env()?.network)?;
    let password = prompt_new_password()?;
    write_root_key(&seed, &password, &key_path)?;

    println!("\n=== ROOT KEY CREATED ===");
    println!("\nMNEMONIC ({} WORDS):", args.words);
    println!("  {phrase}");
    println!("\nFIRST ADDRESS: {first}");
    println!("\nWARNING: This mnemonic will NOT be shown again.");
    println!("Anyone with these words can spend your funds.");
    println!("\nKey saved to: {}", key_path.display());
    Ok(())
}

/// Restore the root key of an existing mnemonic.
fn key_import(args: KeyImportArgs) -> Result<()> {
    let key_path = resolve_key_path(args.out)?;
    if key_path.exists() {
        bail!("Key file already exists: {}", key_path.display());
    }

    let phrase = prompt_password("Enter mnemonic")?;
    let passphrase = read_passphrase(args.passphrase)?;
    let seed = mnemonic_to_seed(&phrase, &passphrase).context("Invalid mnemonic")?;
    let first = first_address(&seed, CliConfig::from_env()?.network)?;
    let password = prompt_new_password()?;
    write_root_key(&seed, &password, &key_path)?;

    println!("First address: {first}");
    println!("Key saved to: {}", key_path.display());
    Ok(())
}

/// Print the summary of a drafted transaction.
fn draft(args: DraftArgs) -> Result<()> {
    let config = CliConfig::from_env()?;
    let wallet = FileWallet::load(&args.utxos, None)?;
    let request = build_request(&args, &config, wallet.utxos())?;
    let summary = request.summary(true).context("Failed to summarise draft")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Draft, sign and print a transaction.
fn sign(args: SignArgs) -> Result<()> {
    let config = CliConfig::from_env()?;
    let key_path = resolve_key_path(args.key)?;
    let wallet = FileWallet::load(&args.draft.utxos, Some(key_path))?;
    let request = build_request(&args.draft, &config, wallet.utxos())?;

    let password = prompt_password("Enter key password")?;
    let root = wallet
        .unlock_root_key(password.as_bytes())
        .context("Failed to unlock root key")?;
    let signed = Signer::new(ErgoProver)
        .sign_request(&request, &root)
        .context("Failed to sign transaction")?;
    info!(tx_id = %signed.id, inputs = signed.inputs.len(), "transaction signed");

    let wire = WireSignedTx::try_from(&signed)?;
    println!("{}", serde_json::to_string_pretty(&wire)?);
    Ok(())
}

fn balance(args: BalanceArgs) -> Result<()> {
    let connector = Connector::new(FileWallet::load(&args.utxos, None)?, ErgoProver);
    let amount = connector.get_balance(&args.token)?;
    println!("{amount}");
    Ok(())
}

fn list_utxos(args: UtxosArgs) -> Result<()> {
    let connector = Connector::new(FileWallet::load(&args.utxos, None)?, ErgoProver);
    let boxes = connector.list_utxos(args.value_hint);
    println!("{}", serde_json::to_string_pretty(&boxes)?);
    Ok(())
}

fn build_request(
    args: &DraftArgs,
    config: &CliConfig,
    utxos: &[AddressedUtxo],
) -> Result<SignRequest> {
    let params = config.protocol_params();
    let drafter = TransactionDrafter::new(params.clone(), config.height);
    let fee = args.fee.unwrap_or(config.fee);

    let drafted = if let Some(addr) = &args.send_all {
        let receiver = Receiver {
            address: parse_address(addr, config.network)?,
            addressing: None,
        };
        drafter.send_all(&receiver, utxos, fee)
    } else {
        let outputs = args
            .to
            .iter()
            .map(|p| Ok(SpendOutput::new(parse_address(&p.address, config.network)?, p.amount)))
            .collect::<Result<Vec<_>>>()?;
        let change = args
            .change
            .as_deref()
            .context("--change is required unless --send-all is given")?;
        let addressing = args
            .change_path
            .as_deref()
            .map(|p| Addressing::parse(p, level::PURPOSE))
            .transpose()
            .context("Invalid --change-path")?;
        let receiver = Receiver {
            address: parse_address(change, config.network)?,
            addressing,
        };
        drafter.new_tx(&outputs, &receiver, utxos, fee)
    }
    .context("Failed to draft transaction")?;

    Ok(SignRequest::from_drafted(drafted, params))
}

fn parse_address(s: &str, network: NetworkType) -> Result<ErgoTree> {
    Address::parse_for(s, network)
        .and_then(|a| a.ergo_tree())
        .with_context(|| format!("Invalid {network} address: {s}"))
}

/// Address of `m/44'/429'/0'/0/0`, shown so the user can check a restore.
fn first_address(seed: &Seed, network: NetworkType) -> Result<Address> {
    let root = ExtendedKey::master(seed).context("Failed to derive root key")?;
    let key = derive_for_addressing(&root, &Addressing::bip44(0, 0, 0))
        .context("Failed to derive first address")?;
    Ok(Address::p2pk(key.public_key(), network))
}

fn write_root_key(seed: &Seed, password: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    EncryptedRootKey::seal(seed, &[], password.as_bytes())
        .and_then(|sealed| sealed.save(path))
        .context("Failed to save key file")?;
    info!(path = %path.display(), "root key written");
    Ok(())
}

fn read_passphrase(enabled: bool) -> Result<String> {
    if enabled {
        prompt_password("Enter BIP-39 passphrase")
    } else {
        Ok(String::new())
    }
}

fn prompt_new_password() -> Result<String> {
    let password = prompt_password("Enter key password")?;
    let confirm = prompt_password("Confirm password")?;
    if password != confirm {
        return Err(anyhow!("Passwords do not match"));
    }
    Ok(password)
}

/// Prompt for a secret without echo.
fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(format!("{prompt}: ")).context("Failed to read password")
}

/// Resolve key file path, using default if not provided.
fn resolve_key_path(path: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(p) = path {
        return Ok(p);
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".ergvault").join("root.key"))
}
