use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

// Process-wide collectors. Prefixed with `leaderchain_` for namespacing.
struct Metrics {
    registry: Registry,
    tx_accepted: IntCounter,
    tx_rejected: IntCounter,
    blocks_mined: IntCounter,
    snapshots: IntCounter,
    pool_pending: IntGauge,
}

impl Metrics {
    fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| -> prometheus::Result<IntCounter> {
            let c = IntCounter::new(name, help)?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };
        let tx_accepted = counter("leaderchain_tx_accepted_total", "Transactions recorded in the ledger")?;
        let tx_rejected = counter("leaderchain_tx_rejected_total", "Transactions refused by validation")?;
        let blocks_mined = counter("leaderchain_blocks_mined_total", "Blocks linked onto the chain")?;
        let snapshots = counter("leaderchain_snapshots_total", "Chain snapshots written")?;
        let pool_pending = IntGauge::new("leaderchain_pool_pending", "Transactions waiting for a block")?;
        registry.register(Box::new(pool_pending.clone()))?;
        Ok(Metrics { registry, tx_accepted, tx_rejected, blocks_mined, snapshots, pool_pending })
    }
}

static METRICS: Lazy<Option<Metrics>> = Lazy::new(|| match Metrics::new() {
    Ok(m) => Some(m),
    Err(e) => {
        tracing::warn!(error = %e, "metrics disabled");
        None
    }
});

fn with(f: impl FnOnce(&Metrics)) {
    if let Some(m) = METRICS.as_ref() {
        f(m);
    }
}

pub fn tx_accepted() { with(|m| m.tx_accepted.inc()) }
pub fn tx_rejected() { with(|m| m.tx_rejected.inc()) }
pub fn block_mined() { with(|m| m.blocks_mined.inc()) }
pub fn snapshot_written() { with(|m| m.snapshots.inc()) }
pub fn set_pool_pending(n: usize) { with(|m| m.pool_pending.set(n as i64)) }

/// Text exposition of every collector.
pub fn render() -> String {
    let Some(m) = METRICS.as_ref() else { return String::new() };
    let mut buffer = Vec::new();
    if TextEncoder::new().encode(&m.registry.gather(), &mut buffer).is_err() {
        tracing::warn!("could not encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
