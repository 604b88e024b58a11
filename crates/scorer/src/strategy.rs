//! Pluggable scoring strategy.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use procpilot_core_types::{Platform, PurchaseDemand, RawOffer};

/// Relative weights for the score components. Values are configuration,
/// not contract; defaults exist only so the pipeline runs out of the box.
#[derive(Clone, Copy, Debug)]
pub struct ScoreWeights {
    pub price: f64,
    pub spec_match: f64,
    pub trust: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            price: 50.0,
            spec_match: 30.0,
            trust: 20.0,
        }
    }
}

/// Inputs shared by every offer scored in one ranking pass.
pub struct ScoreContext<'a> {
    pub demand: &'a PurchaseDemand,
    /// Cheapest landed cost among budget survivors; anchors the price
    /// competitiveness component.
    pub cheapest_landed: Decimal,
    pub platform_priority: &'a [Platform],
}

/// Per-component scores, each in 0.0..=100.0.
#[derive(Clone, Copy, Debug)]
pub struct ScoreBreakdown {
    pub price: f64,
    pub spec_match: f64,
    pub trust: f64,
    pub total: f64,
}

impl ScoreBreakdown {
    /// Human-readable explanation shown at the confirmation gate.
    pub fn reason(&self, platform: Platform, landed: Decimal) -> String {
        format!(
            "landed cost ¥{landed} on {platform}; price {:.0}/100, spec match {:.0}/100, trust {:.0}/100",
            self.price, self.spec_match, self.trust
        )
    }
}

pub trait ScoringStrategy: Send + Sync {
    fn score(&self, ctx: &ScoreContext<'_>, offer: &RawOffer) -> ScoreBreakdown;
}

/// Default strategy: weighted combination of price competitiveness
/// (relative to the cheapest surviving landed cost), token-overlap
/// specification match, and configured platform trust.
#[derive(Clone, Debug, Default)]
pub struct WeightedStrategy {
    weights: ScoreWeights,
}

impl WeightedStrategy {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }
}

impl ScoringStrategy for WeightedStrategy {
    fn score(&self, ctx: &ScoreContext<'_>, offer: &RawOffer) -> ScoreBreakdown {
        let price = price_competitiveness(ctx, offer);
        let spec_match = specification_match(ctx.demand, offer);
        let trust = platform_trust(ctx.platform_priority, offer.platform);

        let weight_sum = self.weights.price + self.weights.spec_match + self.weights.trust;
        let total = if weight_sum > 0.0 {
            (price * self.weights.price
                + spec_match * self.weights.spec_match
                + trust * self.weights.trust)
                / weight_sum
        } else {
            0.0
        };

        ScoreBreakdown {
            price,
            spec_match,
            trust,
            total,
        }
    }
}

fn price_competitiveness(ctx: &ScoreContext<'_>, offer: &RawOffer) -> f64 {
    let landed = offer.landed_cost(ctx.demand.quantity);
    let landed = landed.to_f64().unwrap_or(f64::MAX);
    let cheapest = ctx.cheapest_landed.to_f64().unwrap_or(0.0);
    if landed <= 0.0 || cheapest <= 0.0 {
        return 0.0;
    }
    (cheapest / landed * 100.0).clamp(0.0, 100.0)
}

/// Share of demand tokens (specification plus product name) found in the
/// offer title and variant labels.
fn specification_match(demand: &PurchaseDemand, offer: &RawOffer) -> f64 {
    let mut wanted: Vec<String> = tokens(&demand.product_name);
    if let Some(spec) = &demand.specification {
        wanted.extend(tokens(spec));
    }
    wanted.sort();
    wanted.dedup();
    if wanted.is_empty() {
        return 100.0;
    }

    let mut haystack = offer.title.to_lowercase();
    for variant in &offer.variants {
        haystack.push(' ');
        haystack.push_str(&variant.label.to_lowercase());
    }

    let matched = wanted.iter().filter(|t| haystack.contains(t.as_str())).count();
    matched as f64 / wanted.len() as f64 * 100.0
}

fn platform_trust(priority: &[Platform], platform: Platform) -> f64 {
    match priority.iter().position(|p| *p == platform) {
        Some(index) => (100.0 - index as f64 * 20.0).max(40.0),
        None => 40.0,
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || c == ',' || c == '/')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}
