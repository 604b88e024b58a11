//! Recommendation scoring and ranking.
//!
//! Raw offers from every surviving platform come in; budget-busting offers
//! are excluded outright, the rest are scored by a pluggable strategy and
//! ranked deterministically: total score descending, ties by lower landed
//! cost, then by configured platform priority. Ranks are 1..N, no gaps.

mod strategy;

pub use strategy::{ScoreBreakdown, ScoreContext, ScoreWeights, ScoringStrategy, WeightedStrategy};

use std::sync::Arc;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use procpilot_core_types::{Platform, PurchaseDemand, RawOffer, Recommendation};

/// Ranking configuration. The weight values are a business decision; only
/// the mechanism is fixed here.
#[derive(Clone, Debug)]
pub struct ScorerConfig {
    /// Offers whose landed cost exceeds `budget * (1 + tolerance)` are
    /// excluded before ranking, not merely penalized.
    pub budget_tolerance: f64,
    /// Tie-break ordering; earlier platforms win. Defaults to
    /// 1688 > JD > Tmall.
    pub platform_priority: Vec<Platform>,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            budget_tolerance: 0.05,
            platform_priority: Platform::ALL.to_vec(),
        }
    }
}

pub struct RecommendationScorer {
    strategy: Arc<dyn ScoringStrategy>,
    config: ScorerConfig,
}

impl RecommendationScorer {
    pub fn new(strategy: Arc<dyn ScoringStrategy>, config: ScorerConfig) -> Self {
        Self { strategy, config }
    }

    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(WeightedStrategy::default()),
            ScorerConfig::default(),
        )
    }

    /// Score and rank offers for the demand. An empty result means no
    /// offer survived the budget filter; the caller decides whether that
    /// is terminal.
    pub fn rank(&self, demand: &PurchaseDemand, offers: &[RawOffer]) -> Vec<Recommendation> {
        let survivors: Vec<&RawOffer> = offers
            .iter()
            .filter(|offer| self.meets_minimum_batch(demand, offer))
            .filter(|offer| self.within_budget(demand, offer))
            .collect();
        if survivors.is_empty() {
            return Vec::new();
        }

        let cheapest_landed = survivors
            .iter()
            .map(|o| o.landed_cost(demand.quantity))
            .min()
            .unwrap_or(Decimal::ZERO);
        let ctx = ScoreContext {
            demand,
            cheapest_landed,
            platform_priority: &self.config.platform_priority,
        };

        let mut scored: Vec<(ScoreBreakdown, &RawOffer, Decimal)> = survivors
            .into_iter()
            .map(|offer| {
                let breakdown = self.strategy.score(&ctx, offer);
                let landed = offer.landed_cost(demand.quantity);
                (breakdown, offer, landed)
            })
            .collect();

        // Stable sort: score desc, landed asc, platform priority asc.
        scored.sort_by(|a, b| {
            b.0.total
                .partial_cmp(&a.0.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.2.cmp(&b.2))
                .then_with(|| {
                    self.priority_index(a.1.platform)
                        .cmp(&self.priority_index(b.1.platform))
                })
        });

        scored
            .into_iter()
            .enumerate()
            .map(|(idx, (breakdown, offer, landed))| Recommendation {
                rank: idx as u32 + 1,
                offer_id: offer.offer_id.clone(),
                platform: offer.platform,
                product_name: offer.title.clone(),
                detail_url: offer.detail_url.clone(),
                unit_price: offer.unit_price,
                freight: offer.freight,
                landed_cost: landed,
                total_score: breakdown.total,
                reason: breakdown.reason(offer.platform, landed),
            })
            .collect()
    }

    /// Wholesale listings carry a minimum order quantity; an offer that
    /// cannot be bought at the demanded quantity is not a candidate.
    fn meets_minimum_batch(&self, demand: &PurchaseDemand, offer: &RawOffer) -> bool {
        if offer.min_quantity > demand.quantity {
            debug!(
                target: "scorer",
                platform = offer.platform.as_str(),
                min_quantity = offer.min_quantity,
                demanded = demand.quantity,
                "offer excluded: below minimum order quantity"
            );
            return false;
        }
        true
    }

    fn within_budget(&self, demand: &PurchaseDemand, offer: &RawOffer) -> bool {
        let Some(budget) = demand.budget else {
            return true;
        };
        let tolerance = Decimal::from_f64(self.config.budget_tolerance).unwrap_or(Decimal::ZERO);
        let ceiling = budget + budget * tolerance;
        let landed = offer.landed_cost(demand.quantity);
        if landed > ceiling {
            debug!(
                target: "scorer",
                platform = offer.platform.as_str(),
                %landed,
                %ceiling,
                "offer excluded: over budget ceiling"
            );
            return false;
        }
        true
    }

    fn priority_index(&self, platform: Platform) -> usize {
        self.config
            .platform_priority
            .iter()
            .position(|p| *p == platform)
            .unwrap_or(self.config.platform_priority.len())
    }
}
