//! Command line interface over a persisted local chain.
//!
//! Every invocation opens the chain store under the data directory, applies
//! one command and saves the chain again. Wallets live next to it in
//! `<data-dir>/wallets`.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use epoch_rewards::chain::{ChainResult, ChainStore, LocalChain, SystemClock};
use epoch_rewards::config::{default_data_dir, DeployConfig};
use epoch_rewards::tokenomics::{RewardParams, UserInfo};
use epoch_rewards::types::{Address, TokenAmount};
use epoch_rewards::{RewardsClient, TokenClient, Wallet};

const TOKEN_ALIAS: &str = "token";
const REWARDS_ALIAS: &str = "rewards";

#[derive(Parser)]
#[command(
    name = "rewards",
    version,
    about = "Epoch-based reward distribution on a local chain",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long = "data-dir", global = true, help = "Chain and wallet directory [default: ~/.epoch-rewards]")]
    pub data_dir: Option<PathBuf>,

    #[arg(short = 'w', long = "wallet", default_value = "default", global = true, help = "Wallet that signs transactions")]
    pub wallet: String,

    #[arg(short = 'v', long = "verbose", help = "Print verbose output", global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {

    // Wallet Commands

    Keygen {
        #[arg(help = "Name of the wallet to create; lists wallets when omitted")]
        name: Option<String>,

        #[arg(short = 'f', long = "force", help = "Overwrite an existing wallet")]
        force: bool,
    },

    // Deploy Commands

    DeployToken {
        #[arg(short = 'c', long = "config", help = "Deploy config (TOML)")]
        config: Option<PathBuf>,

        #[arg(long = "name")]
        name: Option<String>,

        #[arg(long = "symbol")]
        symbol: Option<String>,

        #[arg(long = "initial-supply", help = "Tokens minted to the signing wallet")]
        initial_supply: Option<TokenAmount>,
    },
    Deploy {
        #[arg(short = 'c', long = "config", help = "Deploy config (TOML)")]
        config: Option<PathBuf>,

        #[arg(long = "reward-per-epoch")]
        reward_per_epoch: Option<TokenAmount>,

        #[arg(long = "epoch-duration", help = "Epoch length in seconds")]
        epoch_duration: Option<u64>,

        #[arg(long = "reward-duration", help = "Release window in seconds")]
        reward_duration: Option<u64>,

        #[arg(long = "lending-contract", help = "Address or wallet name allowed to supply [default: signer]")]
        lending_contract: Option<String>,

        #[arg(long = "reward-token", help = "Reward token address [default: last deployed token]")]
        reward_token: Option<Address>,
    },

    // Transaction Commands

    Transfer {
        #[arg(help = "Recipient address, wallet name, or 'rewards' for the pool")]
        to: String,

        amount: TokenAmount,
    },
    Mint {
        #[arg(help = "Recipient address or wallet name")]
        to: String,

        amount: TokenAmount,
    },
    Supply {
        #[arg(help = "Participant address or wallet name")]
        account: String,

        amount: TokenAmount,
    },
    Withdraw {
        #[arg(help = "Participant address or wallet name")]
        account: String,

        amount: TokenAmount,
    },
    Claim {},
    SetParameters {
        reward_per_epoch: TokenAmount,

        #[arg(help = "Epoch length in seconds")]
        epoch_duration: u64,

        #[arg(help = "Release window in seconds")]
        reward_duration: u64,
    },
    IncreaseTime {
        #[arg(help = "Seconds to move chain time forward")]
        secs: u64,
    },

    // Query Commands

    Data {},
    Balance {
        #[arg(help = "Address or wallet name [default: signing wallet]")]
        account: Option<String>,
    },
    UserInfo {
        #[arg(help = "Addresses or wallet names", required = true)]
        accounts: Vec<String>,
    },
}

/// Open chain plus the directories around it
struct Session {
    wallet_dir: PathBuf,
    store: ChainStore,
    chain: LocalChain,
}

impl Session {
    fn open(data_dir: &Path) -> Result<Self> {
        let store = ChainStore::open(data_dir.join("chain"))
            .with_context(|| format!("failed to open chain store in {}", data_dir.display()))?;
        let chain = match store.load().context("failed to load chain")? {
            Some(snapshot) => LocalChain::from_snapshot(snapshot, Box::new(SystemClock))
                .context("failed to resume chain")?,
            None => {
                info!(data_dir = %data_dir.display(), "Starting new chain");
                LocalChain::with_system_clock()
            }
        };
        debug!(height = chain.head().header.height, time = chain.time(), "Chain loaded");

        Ok(Self {
            wallet_dir: data_dir.join("wallets"),
            store,
            chain,
        })
    }

    fn save(&self) -> Result<()> {
        self.store
            .save(&self.chain.snapshot())
            .context("failed to save chain")
    }

    /// Persist the chain, then surface the transaction outcome
    ///
    /// Reverted transactions are mined too, so the chain is saved either way.
    fn commit<T>(&self, outcome: ChainResult<T>) -> Result<T> {
        self.save()?;
        outcome.map_err(|e| match e.revert_reason() {
            Some(reason) => anyhow!("transaction reverted: {reason}"),
            None => e.into(),
        })
    }

    fn wallet(&self, name: &str) -> Result<Wallet> {
        Wallet::load_named(&self.wallet_dir, name)
            .with_context(|| format!("no wallet named '{name}', create one with `rewards keygen {name}`"))
    }

    /// Hex address, contract alias or wallet name
    fn account(&self, name: &str) -> Result<Address> {
        if name.starts_with("0x") {
            return name.parse().with_context(|| format!("invalid address {name}"));
        }
        if let Some(id) = self.store.alias(name)? {
            return Ok(Address::from_contract_id(&id));
        }
        Ok(self.wallet(name)?.address())
    }

    fn token(&self) -> Result<TokenClient> {
        self.store
            .alias(TOKEN_ALIAS)?
            .map(TokenClient::at)
            .ok_or_else(|| anyhow!("no reward token deployed, run `rewards deploy-token` first"))
    }

    fn rewards(&self) -> Result<RewardsClient> {
        self.store
            .alias(REWARDS_ALIAS)?
            .map(RewardsClient::at)
            .ok_or_else(|| anyhow!("no rewards contract deployed, run `rewards deploy` first"))
    }
}

fn load_config(path: Option<&Path>) -> Result<DeployConfig> {
    match path {
        Some(path) => DeployConfig::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(DeployConfig::default()),
    }
}

/// Run one command
pub fn run(cli: Cli) -> Result<()> {
    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let mut session = Session::open(&data_dir)?;

    match cli.command {
        Commands::Keygen { name, force } => keygen(&session.wallet_dir, name.as_deref(), force)?,

        Commands::DeployToken {
            config,
            name,
            symbol,
            initial_supply,
        } => {
            let signer = session.wallet(&cli.wallet)?;
            let mut init = load_config(config.as_deref())?.token_init()?;
            if let Some(name) = name {
                init.name = name;
            }
            if let Some(symbol) = symbol {
                init.symbol = symbol;
            }
            if let Some(supply) = initial_supply {
                init.initial_supply = supply;
            }

            let outcome = TokenClient::deploy(&mut session.chain, signer.keypair(), &init);
            let token = session.commit(outcome)?;
            session.store.set_alias(TOKEN_ALIAS, &token.id())?;
            println!("Reward token {} deployed to {}", init.symbol, token.address());
            println!("  Minted {} to {}", init.initial_supply, signer.address());
        }

        Commands::Deploy {
            config,
            reward_per_epoch,
            epoch_duration,
            reward_duration,
            lending_contract,
            reward_token,
        } => {
            let signer = session.wallet(&cli.wallet)?;
            let mut config = load_config(config.as_deref())?;
            if let Some(amount) = reward_per_epoch {
                config.reward_per_epoch = amount.to_string();
            }
            if let Some(secs) = epoch_duration {
                config.epoch_duration = secs;
            }
            if let Some(secs) = reward_duration {
                config.reward_duration = secs;
            }
            if let Some(lending) = lending_contract {
                config.lending_contract = Some(session.account(&lending)?.to_hex());
            }
            let reward_token = match reward_token {
                Some(address) => address,
                None => session.token()?.address(),
            };

            let init = config.rewards_init(signer.address(), reward_token)?;
            let outcome = RewardsClient::deploy(&mut session.chain, signer.keypair(), &init);
            let rewards = session.commit(outcome)?;
            session.store.set_alias(REWARDS_ALIAS, &rewards.id())?;
            println!("Rewarding contract deployed to {}", rewards.address());
        }

        Commands::Transfer { to, amount } => {
            let signer = session.wallet(&cli.wallet)?;
            let to = session.account(&to)?;
            let token = session.token()?;
            let outcome = token.transfer(&mut session.chain, signer.keypair(), to, amount);
            let receipt = session.commit(outcome)?;
            println!("Transferred {amount} to {to} (block {})", receipt.block.header.height);
        }

        Commands::Mint { to, amount } => {
            let signer = session.wallet(&cli.wallet)?;
            let to = session.account(&to)?;
            let token = session.token()?;
            let outcome = token.mint(&mut session.chain, signer.keypair(), to, amount);
            let receipt = session.commit(outcome)?;
            let supply = token.total_supply(&session.chain)?;
            println!("Minted {amount} to {to} (block {})", receipt.block.header.height);
            println!("  Total supply: {supply}");
        }

        Commands::Supply { account, amount } => {
            let signer = session.wallet(&cli.wallet)?;
            let account = session.account(&account)?;
            let outcome = session
                .rewards()?
                .supply(&mut session.chain, signer.keypair(), account, amount);
            let receipt = session.commit(outcome)?;
            println!("Supplied {amount} for {account} (block {})", receipt.block.header.height);
        }

        Commands::Withdraw { account, amount } => {
            let signer = session.wallet(&cli.wallet)?;
            let account = session.account(&account)?;
            let outcome = session
                .rewards()?
                .withdraw(&mut session.chain, signer.keypair(), account, amount);
            let receipt = session.commit(outcome)?;
            println!("Withdrew {amount} for {account} (block {})", receipt.block.header.height);
        }

        Commands::Claim {} => {
            let signer = session.wallet(&cli.wallet)?;
            let outcome = session.rewards()?.claim(&mut session.chain, signer.keypair());
            let amount = session.commit(outcome)?;
            println!("Claimed {amount} to {}", signer.address());
        }

        Commands::SetParameters {
            reward_per_epoch,
            epoch_duration,
            reward_duration,
        } => {
            let signer = session.wallet(&cli.wallet)?;
            let params = RewardParams::new(reward_per_epoch, epoch_duration, reward_duration)?;
            let outcome = session
                .rewards()?
                .set_parameters(&mut session.chain, signer.keypair(), params);
            session.commit(outcome)?;
            println!(
                "Parameters set: {reward_per_epoch} per epoch, epoch {epoch_duration}s, release {reward_duration}s"
            );
        }

        Commands::IncreaseTime { secs } => {
            let outcome = session.chain.increase_time(secs);
            let now = session.commit(outcome)?;
            println!("Chain time is now {now}");
        }

        Commands::Data {} => print_data(&session)?,

        Commands::Balance { account } => {
            let account = match account {
                Some(name) => session.account(&name)?,
                None => session.wallet(&cli.wallet)?.address(),
            };
            let token = session.token()?;
            let balance = token.balance_of(&session.chain, account)?;
            let symbol = token.metadata(&session.chain)?.symbol;
            println!("{account}: {balance} {symbol}");
        }

        Commands::UserInfo { accounts } => {
            let accounts = accounts
                .iter()
                .map(|name| session.account(name))
                .collect::<Result<Vec<_>>>()?;
            for info in session.rewards()?.user_info(&session.chain, accounts)? {
                print_user(&info);
            }
        }
    }

    Ok(())
}

fn keygen(wallet_dir: &Path, name: Option<&str>, force: bool) -> Result<()> {
    let Some(name) = name else {
        let wallets = Wallet::list_wallets(wallet_dir)?;
        if wallets.is_empty() {
            println!("No wallets in {}", wallet_dir.display());
        }
        for wallet in wallets {
            println!("{:<16} {}", wallet.name, wallet.address);
        }
        return Ok(());
    };

    let path = Wallet::path_in(wallet_dir, name);
    if path.exists() && !force {
        bail!("wallet '{name}' already exists at {} (use --force to overwrite)", path.display());
    }

    let mut wallet = Wallet::generate(name);
    wallet
        .save(&path)
        .with_context(|| format!("failed to save wallet {}", path.display()))?;
    println!("Generated wallet '{name}':");
    println!("  Address: {}", wallet.address());
    println!("  Public Key: {}", wallet.public_key().to_hex());
    println!("  File: {}", path.display());
    Ok(())
}

fn print_data(session: &Session) -> Result<()> {
    let data = session.rewards()?.data(&session.chain)?;
    let ledger = &data.ledger;
    println!("Rewarding contract");
    println!("  Owner:              {}", data.config.owner);
    println!("  Lending contract:   {}", data.config.lending_contract);
    println!("  Reward token:       {}", data.config.reward_token);
    println!("  Reward per epoch:   {}", ledger.reward_per_epoch);
    println!("  Epoch duration:     {}s", ledger.epoch_duration);
    println!("  Reward duration:    {}s", ledger.reward_duration);
    println!(
        "  Current epoch:      {} ({} .. {})",
        ledger.current_epoch, ledger.epoch_start, ledger.next_epoch_at
    );
    println!("  Total supplied:     {}", ledger.total_supplied);
    println!("  Participants:       {}", ledger.participants);
    println!("  Distributed:        {}", ledger.total_distributed);
    println!("  Undistributed:      {}", ledger.total_undistributed);
    println!("  Claimed:            {}", ledger.total_claimed);
    println!("  Pool balance:       {}", data.pool_balance);
    Ok(())
}

fn print_user(info: &UserInfo) {
    println!("{}", info.account);
    println!("  Supplied:   {}", info.balance);
    println!("  Claimable:  {}", info.claimable);
    println!("  Accruing:   {}", info.accruing);
    println!("  Claimed:    {}", info.claimed_total);
    match info.last_claim {
        Some(at) => println!("  Last claim: {at}"),
        None => println!("  Last claim: never"),
    }
}
