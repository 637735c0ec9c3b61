//! Stake-weighted validator selection.
//!
//! A wallet's stake is its balance. One uniform draw `r` in `[0, total)` is
//! taken, then wallets are walked in file order accumulating stake; the first
//! wallet with positive stake whose running sum reaches `r` wins.
//!
//! Zero-stake wallets are never selected and a store with no stake at all
//! yields no validator.

use rand::Rng;
use crate::wallet::Wallet;

/// Sum of all positive balances.
pub fn total_stake(wallets: &[Wallet]) -> f64 {
    wallets.iter().map(|w| w.balance.max(0.0)).sum()
}

/// Deterministic half of the selection: pick the wallet for a given draw.
pub fn select_by_draw(wallets: &[Wallet], draw: f64) -> Option<&Wallet> {
    let mut cumulative = 0.0;
    for w in wallets {
        if w.balance <= 0.0 {
            continue;
        }
        cumulative += w.balance;
        if cumulative >= draw {
            return Some(w);
        }
    }
    None
}

/// Draws uniformly from `[0, total stake)` with `rng` and selects.
pub fn select<'a, R: Rng>(wallets: &'a [Wallet], rng: &mut R) -> Option<&'a Wallet> {
    let total = total_stake(wallets);
    if !(total > 0.0) {
        return None;
    }
    let draw = rng.gen_range(0.0..total);
    select_by_draw(wallets, draw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use crate::wallet::UserType;

    fn w(addr: &str, balance: f64) -> Wallet {
        Wallet {
            address: addr.into(),
            private_key: format!("k-{addr}"),
            email: format!("{addr}@alustudent.com"),
            balance,
            user_type: UserType::Student,
            kitchen_name: None,
        }
    }

    #[test]
    fn forced_draw_walks_cumulative_sums() {
        let ws = vec![w("a", 100.0), w("b", 200.0)];
        assert_eq!(select_by_draw(&ws, 250.0).unwrap().address, "b");
        assert_eq!(select_by_draw(&ws, 0.0).unwrap().address, "a");
        assert_eq!(select_by_draw(&ws, 100.0).unwrap().address, "a", "reaching the threshold exactly wins");
        assert_eq!(select_by_draw(&ws, 100.5).unwrap().address, "b");
    }

    #[test]
    fn zero_stake_never_wins() {
        let ws = vec![w("zero", 0.0), w("b", 50.0)];
        assert_eq!(select_by_draw(&ws, 0.0).unwrap().address, "b");

        let broke = vec![w("x", 0.0), w("y", 0.0)];
        assert!(select_by_draw(&broke, 0.0).is_none());
        let mut rng = StdRng::seed_from_u64(1);
        assert!(select(&broke, &mut rng).is_none());
        assert!(select(&[], &mut rng).is_none());
    }

    #[test]
    fn seeded_draws_are_weighted() {
        let ws = vec![w("light", 10.0), w("heavy", 990.0)];
        let mut rng = StdRng::seed_from_u64(7);
        let heavy = (0..2_000)
            .filter(|_| select(&ws, &mut rng).unwrap().address == "heavy")
            .count();
        assert!(heavy > 1_900, "heavy stake should win ~99% of draws, won {heavy}");
    }
}
