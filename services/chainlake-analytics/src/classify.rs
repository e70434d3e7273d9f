//! Behavioral classification: an ordered decision table over volume,
//! transaction count and counterparty count. The first matching row
//! wins; thresholds are configured per deployment with an optional
//! per-asset overlay.

use rust_decimal::Decimal;

use chainlake_common::config::ClassifierThresholds;
use chainlake_common::types::AddressClass;

pub fn classify(
    tx_count: u64,
    total_volume: Decimal,
    counterparties: u64,
    thresholds: &ClassifierThresholds,
) -> AddressClass {
    if tx_count >= thresholds.exchange_min_tx
        && counterparties >= thresholds.exchange_min_counterparties
    {
        return AddressClass::Exchange;
    }
    if total_volume >= thresholds.whale_min_volume && tx_count <= thresholds.whale_max_tx {
        return AddressClass::Whale;
    }
    if counterparties >= thresholds.hub_min_counterparties {
        return AddressClass::Hub;
    }
    if total_volume < thresholds.retail_max_volume {
        return AddressClass::Retail;
    }
    AddressClass::Regular
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainlake_common::config::ClassifierConfig;
    use rust_decimal_macros::dec;

    fn thresholds() -> ClassifierThresholds {
        ClassifierThresholds::default()
    }

    #[test]
    fn test_exchange_outranks_whale() {
        // Huge volume AND huge fan-out reads as an exchange, not a whale.
        let t = thresholds();
        assert_eq!(
            classify(5000, dec!(1000000), 500, &t),
            AddressClass::Exchange
        );
    }

    #[test]
    fn test_whale_needs_concentration() {
        let t = thresholds();
        assert_eq!(classify(10, dec!(500000), 3, &t), AddressClass::Whale);
        // The same volume spread over many transactions is not a whale.
        assert_eq!(classify(5000, dec!(500000), 3, &t), AddressClass::Regular);
    }

    #[test]
    fn test_hub_by_counterparties() {
        let t = thresholds();
        assert_eq!(classify(300, dec!(5000), 80, &t), AddressClass::Hub);
    }

    #[test]
    fn test_retail_and_regular() {
        let t = thresholds();
        assert_eq!(classify(3, dec!(12), 2, &t), AddressClass::Retail);
        assert_eq!(classify(3, dec!(5000), 2, &t), AddressClass::Regular);
    }

    #[test]
    fn test_per_asset_overlay_wins() {
        let mut config = ClassifierConfig::default();
        config.per_asset_overrides.insert(
            "USDC".to_string(),
            ClassifierThresholds {
                whale_min_volume: dec!(1000000),
                ..ClassifierThresholds::default()
            },
        );

        // A 200k position is a whale in the base table but not under
        // the USDC overlay.
        let base = config.thresholds_for("ETH");
        assert_eq!(classify(10, dec!(200000), 3, base), AddressClass::Whale);
        let usdc = config.thresholds_for("USDC");
        assert_eq!(classify(10, dec!(200000), 3, usdc), AddressClass::Regular);
    }
}
