use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;

use leaderchain::{
    config,
    directory,
    engine::{Engine, MinedBlock, Payment, Submission},
    ledger::Direction,
    metrics,
    profile::{ProfileKind, Registration},
    wallet::UserType,
};

const KEY_ENV: &str = "LEADERCHAIN_KEY";

#[derive(Parser)]
#[command(author, version, about = "Leaders Token campus ledger")]
struct Cli {
    #[arg(short, long, default_value = "leaderchain.conf")]
    config: String,

    /// Show debug logs
    #[arg(short, long, default_value_t = false, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create the data directory, seed wallets and write the first snapshot
    Init,
    /// Register a campus member and print their private key
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
        /// Required for vendors
        #[arg(long)]
        kitchen: Option<String>,
        #[arg(long)]
        program: Option<String>,
        #[arg(long)]
        year: Option<u8>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },
    Balance,
    /// Transfer tokens to another wallet address
    Send {
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: f64,
    },
    /// Pay a school fee or a kitchen
    Pay {
        #[arg(value_enum)]
        what: PayTarget,
        #[arg(long)]
        amount: f64,
        /// Kitchen number as listed by `kitchens` (1-based)
        #[arg(long)]
        kitchen: Option<usize>,
    },
    History,
    /// Print the token header and every block
    Chain,
    /// Check every block hash and back-link
    Validate,
    /// Cut a block from whatever is pending
    Mine,
    /// Write a snapshot now
    Backup,
    Kitchens,
    /// Compare the balance index against a full ledger replay
    Audit,
    /// Print counters in Prometheus text format
    Metrics,
}

#[derive(Clone, Copy, ValueEnum)]
enum PayTarget {
    Tuition,
    LibraryFine,
    HealthInsurance,
    Cafeteria,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let cfg = config::load_or_create(&cli.config)
        .with_context(|| format!("could not load configuration from '{}'", cli.config))?;
    let mut engine = Engine::initialize(cfg).context("failed to initialize the ledger")?;

    match cli.cmd {
        Cmd::Init => {
            println!("🗄️  Data directory: {}", engine.config().data_dir().display());
            println!("⛓️  Chain holds {} block(s)", engine.chain().block_count());
            println!("👛 {} wallet(s) on file", engine.wallets().len());
        }
        Cmd::Register { email, name, kitchen, program, year, department, role } => {
            let kind = match directory::user_type_from_email(&email) {
                Some(UserType::Student) => ProfileKind::Student {
                    year_of_study: year.unwrap_or(1),
                    program: program.unwrap_or_default(),
                },
                Some(UserType::Staff) => ProfileKind::Staff {
                    department: department.unwrap_or_default(),
                    role: role.unwrap_or_default(),
                },
                Some(UserType::Vendor) => ProfileKind::Vendor {
                    kitchen_name: kitchen.context("--kitchen is required for vendor emails")?,
                },
                _ => bail!("'{email}' is not a campus email"),
            };
            let name = name.unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
            let (profile, wallet) = engine.register(Registration { name, email, kind })?;
            println!("✅ Registered {} (id {})", profile.email, profile.id);
            println!("📫 Address:     {}", wallet.address);
            println!("🔑 Private key: {}", wallet.private_key);
            println!("   Keep the private key safe; it is the only way to sign in.");
        }
        Cmd::Balance => {
            let wallet = engine.authenticate(&read_key()?)?;
            let unspent = engine.ledger().unspent_balance(&wallet.address);
            println!("💰 Balance: {:.2} LT", wallet.balance);
            println!("   Unspent:  {:.2} LT", unspent);
        }
        Cmd::Send { to, amount } => {
            let from = engine.authenticate(&read_key()?)?.address.clone();
            let sub = engine.pay(&from, Payment::Transfer { to }, amount)?;
            report_submission(&sub);
        }
        Cmd::Pay { what, amount, kitchen } => {
            let from = engine.authenticate(&read_key()?)?.address.clone();
            let payment = match what {
                PayTarget::Tuition => Payment::Tuition,
                PayTarget::LibraryFine => Payment::LibraryFine,
                PayTarget::HealthInsurance => Payment::HealthInsurance,
                PayTarget::Cafeteria => {
                    let n = kitchen.context("--kitchen is required for cafeteria payments")?;
                    if n == 0 {
                        bail!("kitchens are numbered from 1");
                    }
                    Payment::Cafeteria { kitchen: n - 1 }
                }
            };
            let sub = engine.pay(&from, payment, amount)?;
            report_submission(&sub);
        }
        Cmd::History => {
            let address = engine.authenticate(&read_key()?)?.address.clone();
            let entries = engine.history(&address)?;
            if entries.is_empty() {
                println!("📭 No transactions yet");
            }
            for e in entries {
                let tx = &e.transaction;
                let (arrow, peer) = match e.direction {
                    Direction::Sent => ("➡️ ", &tx.to),
                    Direction::Received => ("⬅️ ", &tx.from),
                };
                println!("{} {:>10.2} LT  {:<18} {}  {}", arrow, tx.amount, tx.kind.label(), short(peer), tx.timestamp);
            }
        }
        Cmd::Chain => {
            let chain = engine.chain();
            let token = chain.token();
            println!("🪙 {} ({}) supply {}", token.name, token.symbol, token.total_supply);
            for b in chain.blocks() {
                println!(
                    "#{:<5} {}  {}  prev {}  txs {}  reward {}",
                    b.index,
                    b.timestamp,
                    short(&b.current_hash),
                    short(&b.previous_hash),
                    b.transaction_count(),
                    b.reward
                );
            }
        }
        Cmd::Validate => {
            if engine.validate_chain_integrity() {
                println!("✅ Chain is valid ({} blocks)", engine.chain().block_count());
            } else {
                bail!("chain integrity check failed");
            }
        }
        Cmd::Mine => {
            let mined = engine.mine_block()?;
            report_mined(&mined);
        }
        Cmd::Backup => {
            let path = engine.backup()?;
            println!("💾 Snapshot written to {}", path.display());
        }
        Cmd::Kitchens => {
            for (i, w) in directory::kitchens(engine.wallets()).iter().enumerate() {
                println!("{:>2}. {}  {}", i + 1, w.kitchen_name.as_deref().unwrap_or_default(), short(&w.address));
            }
        }
        Cmd::Audit => {
            let mismatched = engine.ledger().audit()?;
            if mismatched.is_empty() {
                println!("✅ Ledger index matches a full replay ({} records)", engine.ledger().len());
            } else {
                for a in &mismatched {
                    println!("❌ {a}");
                }
                bail!("{} address(es) disagree with the ledger replay", mismatched.len());
            }
        }
        Cmd::Metrics => {
            print!("{}", metrics::render());
        }
    }
    Ok(())
}

fn read_key() -> anyhow::Result<String> {
    if let Ok(key) = std::env::var(KEY_ENV) {
        return Ok(key.trim().to_string());
    }
    if atty::is(atty::Stream::Stdin) {
        let key = rpassword::prompt_password("🔑 Private key: ")?;
        return Ok(key.trim().to_string());
    }
    bail!("{KEY_ENV} is required in non-interactive mode")
}

fn report_submission(sub: &Submission) {
    let tx = &sub.transaction;
    println!("✅ {} of {:.2} LT to {} accepted", tx.kind.label(), tx.amount, short(&tx.to));
    if let Some(m) = &sub.mined {
        report_mined(m);
    }
    if let Some(e) = &sub.mining_error {
        println!("⚠️  Block not mined, transactions stay queued: {e}");
    }
}

fn report_mined(m: &MinedBlock) {
    println!("⛏️  Block #{} mined with {} transaction(s)", m.index, m.transaction_count);
    match &m.validator {
        Some(v) => println!("🏅 Validator {} earned {} LT", short(v), m.reward),
        None => println!("⚠️  No validator selected, reward not paid"),
    }
    if let Some(p) = &m.snapshot {
        println!("💾 Snapshot written to {}", p.display());
    }
}

fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
