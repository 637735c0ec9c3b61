use std::{fs, path::{Path, PathBuf}};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Runtime settings read from a `key=value` text file.
///
/// Lines starting with `#` and blank lines are skipped; unknown keys are
/// ignored so older binaries can read newer files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub initial_supply: u64,
    pub block_reward: u64,
    pub max_transactions: usize,
    pub backup_directory: String,
    pub auto_backup: bool,
    pub backup_interval: u64,
    pub data_directory: String,
    pub pool_threshold: usize,
    pub default_balance: f64,
    pub mining_delay_ms: u64,
}

fn default_supply() -> u64       { 1_000_000 }
fn default_reward() -> u64       { 2 }
fn default_max_tx() -> usize     { 100 }
fn default_backup_dir() -> String { "./backups".into() }
fn default_interval() -> u64     { 1 }
fn default_threshold() -> usize  { 3 }
fn default_balance() -> f64      { 100.0 }

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_supply: default_supply(),
            block_reward: default_reward(),
            max_transactions: default_max_tx(),
            backup_directory: default_backup_dir(),
            auto_backup: true,
            backup_interval: default_interval(),
            data_directory: ".".into(),
            pool_threshold: default_threshold(),
            default_balance: default_balance(),
            mining_delay_ms: 0,
        }
    }
}

impl Config {
    /// Parse config text on top of the defaults.
    ///
    /// # Errors
    /// * A recognised key whose value does not parse.
    pub fn parse(text: &str) -> Result<Self> {
        let mut cfg = Config::default();
        for (n, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else { continue };
            let (key, value) = (key.trim(), value.trim());
            let ctx = || format!("bad value for '{key}' on line {}", n + 1);
            match key {
                "initial_supply"   => cfg.initial_supply = value.parse::<u64>().with_context(ctx)?,
                "block_reward"     => cfg.block_reward = value.parse::<u64>().with_context(ctx)?,
                "max_transactions" => cfg.max_transactions = value.parse::<usize>().with_context(ctx)?,
                "backup_directory" => cfg.backup_directory = value.to_string(),
                "auto_backup"      => cfg.auto_backup = parse_flag(value).with_context(ctx)?,
                "backup_interval"  => cfg.backup_interval = value.parse::<u64>().with_context(ctx)?,
                "data_directory"   => cfg.data_directory = value.to_string(),
                "pool_threshold"   => cfg.pool_threshold = value.parse::<usize>().with_context(ctx)?,
                "default_balance"  => cfg.default_balance = value.parse::<f64>().with_context(ctx)?,
                "mining_delay_ms"  => cfg.mining_delay_ms = value.parse::<u64>().with_context(ctx)?,
                _ => {}
            }
        }
        if cfg.max_transactions == 0 {
            bail!("max_transactions must be at least 1");
        }
        Ok(cfg)
    }

    /// Render in the on-disk format, defaults included.
    pub fn render(&self) -> String {
        format!(
            "# Leaders Token ledger configuration\n\
             initial_supply={}\n\
             block_reward={}\n\
             max_transactions={}\n\
             backup_directory={}\n\
             auto_backup={}\n\
             backup_interval={}\n\
             data_directory={}\n\
             pool_threshold={}\n\
             default_balance={}\n\
             mining_delay_ms={}\n",
            self.initial_supply,
            self.block_reward,
            self.max_transactions,
            self.backup_directory,
            u8::from(self.auto_backup),
            self.backup_interval,
            self.data_directory,
            self.pool_threshold,
            self.default_balance,
            self.mining_delay_ms,
        )
    }

    /// Directory holding wallet, ledger, pool and profile files.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_directory)
    }

    /// Snapshot directory; relative paths hang off the data directory.
    pub fn backup_dir(&self) -> PathBuf {
        let p = Path::new(&self.backup_directory);
        if p.is_absolute() { p.to_path_buf() } else { self.data_dir().join(p) }
    }

    /// Whether an automatic snapshot is due once the chain holds `block_count` blocks.
    pub fn snapshot_due(&self, block_count: usize) -> bool {
        self.auto_backup && (self.backup_interval <= 1 || block_count as u64 % self.backup_interval == 0)
    }
}

fn parse_flag(v: &str) -> Result<bool> {
    match v {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => bail!("expected 0 or 1, got '{other}'"),
    }
}

/// Read the config file at `p`.
/// *Adds context* so user errors print a friendlier message.
///
/// # Errors
/// * Returns an anyhow::Error if the file cannot be read or parsed.
pub fn load<P: AsRef<Path>>(p: P) -> Result<Config> {
    let text = fs::read_to_string(&p)
        .with_context(|| format!("🗂️  couldn’t read config file {}", p.as_ref().display()))?;
    Config::parse(&text)
        .with_context(|| format!("📝  invalid config file {}", p.as_ref().display()))
}

/// Like [`load`], but writes and returns the defaults when `p` does not exist.
pub fn load_or_create<P: AsRef<Path>>(p: P) -> Result<Config> {
    if p.as_ref().exists() {
        return load(p);
    }
    let cfg = Config::default();
    save(&cfg, &p)?;
    tracing::info!(path = %p.as_ref().display(), "created default config");
    Ok(cfg)
}

pub fn save<P: AsRef<Path>>(cfg: &Config, p: P) -> Result<()> {
    if let Some(parent) = p.as_ref().parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("couldn’t create {}", parent.display()))?;
    }
    fs::write(&p, cfg.render())
        .with_context(|| format!("couldn’t write config file {}", p.as_ref().display()))
}
