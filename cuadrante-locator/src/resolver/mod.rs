//! Ordered fallback chains
//!
//! Both resolvers are an ordered list of named tiers folded by [`run_chain`]:
//! tiers run strictly one after another, the first `Found` stops the chain,
//! and `SourceFailed` is logged and skipped. Tiers are never raced: an earlier
//! tier's answer must suppress later, lower-confidence ones.
//!
//! - [`cai`] - CAI/station correlation (gold standard → WebMap → directory → nearest)
//! - [`quadrant`] - geometry lookup (official → alternative → offline)

pub mod cai;
pub mod quadrant;

use crate::sources::SourceError;
use crate::types::TierOutcome;
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, warn};

/// One named strategy in a fallback chain
#[async_trait]
pub trait Tier<Q, T>: Send + Sync
where
    Q: Sync,
    T: Send,
{
    fn name(&self) -> &'static str;

    async fn attempt(&self, query: &Q) -> TierOutcome<T>;
}

/// Boxed tier list, in priority order
pub type TierChain<Q, T> = Vec<Box<dyn Tier<Q, T>>>;

/// Result of folding a chain
#[derive(Debug)]
pub enum ChainOutcome<T> {
    Found { tier: &'static str, value: T },
    /// No tier found anything; `failures` lists the tiers that could not answer
    Exhausted { failures: Vec<(&'static str, SourceError)> },
}

impl<T> ChainOutcome<T> {
    pub fn found(self) -> Option<(&'static str, T)> {
        match self {
            Self::Found { tier, value } => Some((tier, value)),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Try each tier in order and stop at the first `Found`
pub async fn run_chain<Q, T>(chain: &'static str, tiers: &[Box<dyn Tier<Q, T>>], query: &Q) -> ChainOutcome<T>
where
    Q: Sync,
    T: Send,
{
    let mut failures = Vec::new();

    for tier in tiers {
        let started = Instant::now();
        let outcome = tier.attempt(query).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            TierOutcome::Found(value) => {
                debug!(chain, tier = tier.name(), elapsed_ms, "Tier found a match");
                return ChainOutcome::Found {
                    tier: tier.name(),
                    value,
                };
            }
            TierOutcome::NotFound => {
                debug!(chain, tier = tier.name(), elapsed_ms, "Tier has no match");
            }
            TierOutcome::SourceFailed(err) => {
                warn!(
                    chain,
                    tier = tier.name(),
                    kind = err.kind(),
                    error = %err,
                    elapsed_ms,
                    "Tier source failed, falling through"
                );
                failures.push((tier.name(), err));
            }
        }
    }

    ChainOutcome::Exhausted { failures }
}
