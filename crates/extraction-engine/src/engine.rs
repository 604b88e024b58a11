//! Selector-chain extraction over one snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use procpilot_core_types::{Platform, ProcureError};

use crate::selector::SelectorChain;
use crate::snapshot::PageSnapshot;

const MAX_SAMPLE_CHARS: usize = 80;

/// Confidence-tagged outcome of a successful chain extraction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SkuExtractionResult {
    /// The candidate that produced the match.
    pub selector: String,
    /// Position of the winning candidate in the chain (0 = most specific).
    pub chain_index: usize,
    pub match_count: usize,
    /// Sanitized, truncated text sampled from the first matches.
    pub samples: Vec<String>,
    /// Decays as the chain falls back to less specific candidates.
    pub confidence: f64,
}

/// Shared heuristic used by every platform adapter to locate SKU, variant
/// and price elements despite obfuscated class names.
#[derive(Clone, Debug)]
pub struct ExtractionEngine {
    max_samples: usize,
}

impl Default for ExtractionEngine {
    fn default() -> Self {
        Self { max_samples: 5 }
    }
}

impl ExtractionEngine {
    pub fn new(max_samples: usize) -> Self {
        Self {
            max_samples: max_samples.max(1),
        }
    }

    /// Try the chain in priority order against the snapshot. The first
    /// candidate with at least one match wins; an exhausted chain fails
    /// with `ExtractionFailed` scoped to the offer being extracted.
    pub fn extract(
        &self,
        platform: Platform,
        snapshot: &PageSnapshot,
        chain: &SelectorChain,
    ) -> Result<SkuExtractionResult, ProcureError> {
        for (index, selector) in chain.candidates().iter().enumerate() {
            let matches = snapshot.select(selector);
            if matches.is_empty() {
                debug!(
                    target: "extraction",
                    platform = platform.as_str(),
                    selector = selector.raw(),
                    "selector yielded no matches, falling back"
                );
                continue;
            }

            let samples = matches
                .iter()
                .take(self.max_samples)
                .map(|el| sanitize_sample(&el.text))
                .filter(|s| !s.is_empty())
                .collect();

            debug!(
                target: "extraction",
                platform = platform.as_str(),
                selector = selector.raw(),
                count = matches.len(),
                "selector matched"
            );

            return Ok(SkuExtractionResult {
                selector: selector.raw().to_string(),
                chain_index: index,
                match_count: matches.len(),
                samples,
                confidence: chain_confidence(index),
            });
        }

        warn!(
            target: "extraction",
            platform = platform.as_str(),
            url = %snapshot.url,
            candidates = chain.len(),
            "selector chain exhausted"
        );
        Err(ProcureError::ExtractionFailed {
            platform,
            reason: format!(
                "selector chain exhausted ({} candidates) on {}",
                chain.len(),
                snapshot.url
            ),
        })
    }

    /// Diagnostic survey: which class strings on the page contain any of
    /// the given keywords. Used to log page shape when a chain misses.
    pub fn survey_classes(
        &self,
        snapshot: &PageSnapshot,
        keywords: &[&str],
    ) -> BTreeMap<String, Vec<String>> {
        let mut survey: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for keyword in keywords {
            let lowered = keyword.to_lowercase();
            for el in &snapshot.elements {
                let class_string = el.class_string();
                if class_string.to_lowercase().contains(&lowered) {
                    let bucket = survey.entry(keyword.to_string()).or_default();
                    if bucket.len() < 3 {
                        bucket.push(class_string);
                    }
                }
            }
        }
        survey
    }
}

/// First line only, internal whitespace collapsed, truncated on a char
/// boundary.
fn sanitize_sample(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("");
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_SAMPLE_CHARS).collect()
}

fn chain_confidence(index: usize) -> f64 {
    (1.0 - index as f64 * 0.15).max(0.25)
}
