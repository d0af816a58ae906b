use crate::fixed_point::{FixedPoint, RoundingMode};
use crossbeam_skiplist::SkipMap;
use std::ops::Bound;
use thiserror::Error;

/// Decimal places a fee rate may carry.
pub const FEE_RATE_DECIMALS: u8 = 4;

/// Errors raised by fee tier administration.
#[derive(Debug, Error, PartialEq, Eq, Copy, Clone)]
pub enum FeeError {
    /// A fee rate at or above 100%.
    #[error("fee rate must be below one")]
    RateTooLarge,
    /// A fee rate carrying more than 4 decimal places.
    #[error("fee rate must have at most 4 decimal places")]
    RateTooPrecise,
    /// The base tier at threshold zero must always exist.
    #[error("the base tier at threshold zero cannot be removed")]
    BaseTierProtected,
}

/// One fee tier: maker, taker, and protocol rates, each a fixed point with
/// at most 4 decimal places and below one.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct FeeTier {
    pub maker: FixedPoint,
    pub taker: FixedPoint,
    pub protocol: FixedPoint,
}

impl FeeTier {
    pub fn new(
        maker: FixedPoint,
        taker: FixedPoint,
        protocol: FixedPoint,
    ) -> Result<Self, FeeError> {
        for rate in [maker, taker, protocol] {
            if rate >= FixedPoint::ONE {
                return Err(FeeError::RateTooLarge);
            }
            rate.round_to_decimals(FEE_RATE_DECIMALS, RoundingMode::ErrorOnLoss)
                .map_err(|_| FeeError::RateTooPrecise)?;
        }
        Ok(FeeTier {
            maker,
            taker,
            protocol,
        })
    }

    /// Build a tier from basis points (one bp = 0.0001, the smallest
    /// representable rate step).
    pub fn from_bps(maker_bps: u64, taker_bps: u64, protocol_bps: u64) -> Result<Self, FeeError> {
        let rate = |bps| {
            FixedPoint::from_u64(bps, FEE_RATE_DECIMALS).map_err(|_| FeeError::RateTooLarge)
        };
        FeeTier::new(rate(maker_bps)?, rate(taker_bps)?, rate(protocol_bps)?)
    }
}

/// FeeSchedule maps holding thresholds to fee tiers.
///
/// Lookup uses strict predecessor semantics: a holding resolves to the tier
/// with the greatest threshold not exceeding it. The schedule is seeded with
/// a base tier at threshold zero, which cannot be removed, so every lookup
/// resolves. Setting an existing threshold updates the tier in place;
/// setting a new one inserts it in sorted position.
pub struct FeeSchedule {
    tiers: SkipMap<u64, FeeTier>,
}

impl FeeSchedule {
    pub fn new(base: FeeTier) -> Self {
        let tiers = SkipMap::new();
        tiers.insert(0, base);
        FeeSchedule { tiers }
    }

    /// Install or replace the tier at `threshold`.
    pub fn set_tier(&mut self, threshold: u64, tier: FeeTier) {
        self.tiers.insert(threshold, tier);
    }

    /// Remove the tier at `threshold`, returning it if present. The base
    /// tier is protected.
    pub fn remove_tier(&mut self, threshold: u64) -> Result<Option<FeeTier>, FeeError> {
        if threshold == 0 {
            return Err(FeeError::BaseTierProtected);
        }
        Ok(self.tiers.remove(&threshold).map(|entry| *entry.value()))
    }

    /// The tier applying to `holding`: greatest threshold `<= holding`.
    pub fn tier_for(&self, holding: u64) -> FeeTier {
        match self.tiers.upper_bound(Bound::Included(&holding)) {
            Some(entry) => *entry.value(),
            None => unreachable!("schedule always holds a base tier"),
        }
    }

    /// All tiers in ascending threshold order.
    pub fn tiers(&self) -> Vec<(u64, FeeTier)> {
        self.tiers
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(taker_bps: u64) -> FeeTier {
        FeeTier::from_bps(0, taker_bps, 0).unwrap()
    }

    #[test]
    fn test_tier_validation() {
        assert!(FeeTier::from_bps(2, 5, 1).is_ok());
        assert_eq!(FeeTier::from_bps(0, 10_000, 0), Err(FeeError::RateTooLarge));

        let sub_bp = FixedPoint::from_u64(5, 5).unwrap();
        assert_eq!(
            FeeTier::new(sub_bp, FixedPoint::ZERO, FixedPoint::ZERO),
            Err(FeeError::RateTooPrecise)
        );
    }

    #[test]
    fn test_predecessor_lookup() {
        let mut schedule = FeeSchedule::new(tier(10));
        schedule.set_tier(100, tier(5));
        schedule.set_tier(1_000, tier(2));

        assert_eq!(schedule.tier_for(0), tier(10));
        assert_eq!(schedule.tier_for(99), tier(10));
        assert_eq!(schedule.tier_for(100), tier(5), "thresholds are inclusive");
        assert_eq!(schedule.tier_for(999), tier(5));
        assert_eq!(schedule.tier_for(1_000), tier(2));
        assert_eq!(schedule.tier_for(u64::MAX), tier(2));
    }

    #[test]
    fn test_set_tier_updates_in_place() {
        let mut schedule = FeeSchedule::new(tier(10));
        schedule.set_tier(100, tier(5));
        schedule.set_tier(100, tier(3));

        assert_eq!(schedule.tier_for(100), tier(3));
        assert_eq!(
            schedule.tiers().len(),
            2,
            "updating an existing threshold must not add a tier"
        );
    }

    #[test]
    fn test_base_tier_protected() {
        let mut schedule = FeeSchedule::new(tier(10));
        assert_eq!(schedule.remove_tier(0), Err(FeeError::BaseTierProtected));

        schedule.set_tier(100, tier(5));
        assert_eq!(schedule.remove_tier(100), Ok(Some(tier(5))));
        assert_eq!(schedule.remove_tier(100), Ok(None));
        assert_eq!(schedule.tier_for(u64::MAX), tier(10));
    }
}
