//! Tier ladder
//!
//! Ordered thresholds with exclusive upper bounds. A balance equal to a
//! bound belongs to the next tier up.

use std::collections::HashSet;

use num_bigint::BigUint;
use tiergate_core::LadderError;

pub use tiergate_core::TierConfig as Tier;

/// Validated tier ladder: non-empty, strictly increasing bounds, unbounded last tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierLadder {
    tiers: Vec<Tier>,
}

impl TierLadder {
    pub fn new(tiers: Vec<Tier>) -> Result<Self, LadderError> {
        if tiers.is_empty() {
            return Err(LadderError::Empty);
        }

        let mut labels = HashSet::new();
        let mut previous: Option<u64> = None;
        let last = tiers.len() - 1;

        for (index, tier) in tiers.iter().enumerate() {
            if tier.label.trim().is_empty() {
                return Err(LadderError::EmptyLabel);
            }
            if !labels.insert(tier.label.as_str()) {
                return Err(LadderError::DuplicateLabel {
                    label: tier.label.clone(),
                });
            }

            match tier.upper_bound {
                Some(bound) => {
                    if index == last {
                        return Err(LadderError::MissingUnbounded);
                    }
                    if previous.is_some_and(|p| bound <= p) {
                        return Err(LadderError::NotIncreasing {
                            label: tier.label.clone(),
                        });
                    }
                    previous = Some(bound);
                }
                None if index != last => {
                    return Err(LadderError::UnboundedNotLast {
                        label: tier.label.clone(),
                    });
                }
                None => {}
            }
        }

        Ok(Self { tiers })
    }

    /// The tier for `balance` (whole token units)
    pub fn resolve(&self, balance: &BigUint) -> &Tier {
        let index = self
            .tiers
            .iter()
            .position(|tier| match tier.upper_bound {
                Some(bound) => *balance < BigUint::from(bound),
                None => true,
            })
            .unwrap_or(self.tiers.len() - 1);
        &self.tiers[index]
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.tiers.iter().map(|t| t.label.as_str())
    }

    /// Whether `label` names a rung of this ladder
    pub fn contains(&self, label: &str) -> bool {
        self.tiers.iter().any(|t| t.label == label)
    }
}
