//! Risk indicators over a finished address profile.
//!
//! Four independent boolean heuristics; the risk score is their sum and
//! the level is a fixed map over the score. Evaluation is deterministic
//! for a given profile.

use rust_decimal::prelude::ToPrimitive;

use chainlake_common::types::{AddressProfile, RiskIndicators};

/// Share of activity in the night bucket that flags an address.
const NIGHT_RATIO: f64 = 0.80;
/// Sent-amount variance below this fraction of the mean reads as a
/// scripted fixed-amount pattern.
const FIXED_AMOUNT_RATIO: f64 = 0.05;
const FIXED_AMOUNT_MIN_TX: u64 = 20;
const SINGLE_RECIPIENT_MIN_TX: u64 = 50;
const LARGE_INFREQUENT_MAX_TX: u64 = 5;

pub fn evaluate(profile: &AddressProfile) -> RiskIndicators {
    RiskIndicators {
        night_heavy: night_heavy(profile),
        fixed_amount: fixed_amount(profile),
        single_recipient: profile.unique_recipients == 1
            && profile.sent_count >= SINGLE_RECIPIENT_MIN_TX,
        large_infrequent: profile.bins.has_top_bin_activity()
            && profile.total_count() <= LARGE_INFREQUENT_MAX_TX,
    }
}

fn night_heavy(profile: &AddressProfile) -> bool {
    let total = profile.total_count();
    if total == 0 {
        return false;
    }
    profile.temporal_distribution[0] as f64 / total as f64 >= NIGHT_RATIO
}

fn fixed_amount(profile: &AddressProfile) -> bool {
    if profile.sent_count < FIXED_AMOUNT_MIN_TX {
        return false;
    }
    let mean = profile.sent_mean.to_f64().unwrap_or(0.0);
    if mean <= 0.0 {
        return false;
    }
    profile.sent_variance < FIXED_AMOUNT_RATIO * mean
}
