//! Environment-driven settings for the CLI.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use procpilot_orchestrator::OrchestratorConfig;
use recommendation_scorer::{
    RecommendationScorer, ScoreWeights, ScorerConfig, WeightedStrategy,
};

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.trim().parse().ok()
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok()?.trim().parse().ok()
}

/// Runtime knobs. Every value has a default; the environment overrides.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Where parked workflow checkpoints live.
    pub state_dir: PathBuf,
    pub config: OrchestratorConfig,
    /// Landed cost above `budget * (1 + tolerance)` drops the offer.
    pub budget_tolerance: f64,
    pub weights: ScoreWeights,
}

impl Settings {
    pub fn from_env() -> Self {
        let state_dir = std::env::var("PROCPILOT_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".procpilot"));

        let mut config = OrchestratorConfig::default();
        if let Some(secs) = env_u64("PROCPILOT_CONFIRM_WINDOW_SECS") {
            config.confirmation_window = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("PROCPILOT_PLATFORM_TIMEOUT_SECS") {
            config.platform_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = env_u64("PROCPILOT_MAX_RECOMMENDATIONS") {
            config.max_recommendations = max as usize;
        }
        if let Some(tolerance) = env_f64("PROCPILOT_PRICE_TOLERANCE") {
            config.price_tolerance = tolerance;
        }

        let budget_tolerance = env_f64("PROCPILOT_BUDGET_TOLERANCE")
            .unwrap_or(ScorerConfig::default().budget_tolerance);

        let mut weights = ScoreWeights::default();
        if let Some(price) = env_f64("PROCPILOT_WEIGHT_PRICE") {
            weights.price = price;
        }
        if let Some(spec_match) = env_f64("PROCPILOT_WEIGHT_SPEC") {
            weights.spec_match = spec_match;
        }
        if let Some(trust) = env_f64("PROCPILOT_WEIGHT_TRUST") {
            weights.trust = trust;
        }

        Self {
            state_dir,
            config,
            budget_tolerance,
            weights,
        }
    }

    /// Build the ranking stage from these settings.
    pub fn scorer(&self) -> RecommendationScorer {
        RecommendationScorer::new(
            Arc::new(WeightedStrategy::new(self.weights)),
            ScorerConfig {
                budget_tolerance: self.budget_tolerance,
                ..ScorerConfig::default()
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_environment() {
        let settings = Settings::from_env();
        assert_eq!(settings.config.max_recommendations, 3);
        assert!(settings.config.confirmation_window >= Duration::from_secs(60));
    }

    #[test]
    fn environment_overrides_tolerances_and_weights() {
        std::env::set_var("PROCPILOT_PRICE_TOLERANCE", "0.10");
        std::env::set_var("PROCPILOT_BUDGET_TOLERANCE", "0.20");
        std::env::set_var("PROCPILOT_WEIGHT_PRICE", "70");
        let settings = Settings::from_env();
        std::env::remove_var("PROCPILOT_PRICE_TOLERANCE");
        std::env::remove_var("PROCPILOT_BUDGET_TOLERANCE");
        std::env::remove_var("PROCPILOT_WEIGHT_PRICE");

        assert_eq!(settings.config.price_tolerance, 0.10);
        assert_eq!(settings.budget_tolerance, 0.20);
        assert_eq!(settings.weights.price, 70.0);
        assert_eq!(settings.weights.trust, ScoreWeights::default().trust);
    }
}
