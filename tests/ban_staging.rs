//! Invariant 6 (spec §8): ban duration follows the staged
//! first-strike/second-strike/final-strike progression, refreshing
//! (not extending) on every subsequent strike, for any strike count.

use proptest::prelude::*;
use signalair_core::config::{BanConfig, RateConfig};
use signalair_core::message::PeerId;
use signalair_core::rate_guard::RateGuard;
use std::time::Duration;

fn rate_config() -> RateConfig {
    RateConfig {
        max_per_second: 10,
        max_per_minute: 100,
        max_burst: 20,
        window: Duration::from_secs(60),
        suspicion_threshold: 5,
    }
}

fn ban_config() -> BanConfig {
    BanConfig {
        first_duration: Duration::from_secs(2 * 3600),
        final_duration: Duration::from_secs(5 * 24 * 3600),
        final_strike: 3,
    }
}

fn duration_for_strike(strike: u32, ban: &BanConfig) -> Duration {
    if strike >= ban.final_strike {
        ban.final_duration
    } else {
        ban.first_duration
    }
}

/// Drives one ban cycle at time `t`: five identical-content frames from
/// `peer`, the fifth crossing the suspicion threshold and recording a
/// strike. Returns the ban's expiry instant.
fn trigger_ban(guard: &mut RateGuard, peer: &PeerId, cycle: u32, t: u64) -> u64 {
    let hash = [cycle as u8; 32];
    for _ in 0..5 {
        guard.admit(peer, hash, t);
    }
    t + duration_for_strike(cycle, &ban_config()).as_millis() as u64
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, ..ProptestConfig::default() })]

    #[test]
    fn ban_staging_follows_first_first_final(strike_count in 1u32..12) {
        let mut guard = RateGuard::new(rate_config(), ban_config(), 1024);
        let peer = PeerId::new("flooder");
        let mut t = 0u64;

        for strike in 1..=strike_count {
            let until = trigger_ban(&mut guard, &peer, strike, t);

            prop_assert!(guard.is_banned(&peer, t));
            prop_assert!(guard.is_banned(&peer, until - 1));
            prop_assert!(!guard.is_banned(&peer, until));

            let stats = guard.stats(t);
            if strike >= ban_config().final_strike {
                prop_assert_eq!(stats.strike_final, 1);
            } else if strike == 1 {
                prop_assert_eq!(stats.strike_1, 1);
            } else {
                prop_assert_eq!(stats.strike_2, 1);
            }

            t = until;
        }
    }
}
