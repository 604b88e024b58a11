//! Shared listing/detail heuristics driven by per-platform profiles.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use extraction_engine::{
    parse_min_quantity, parse_price, ElementRecord, ExtractionEngine, PageSnapshot, SelectorChain,
    SkuExtractionResult,
};
use procpilot_core_types::{OfferId, Platform, ProcureError, PurchaseDemand, RawOffer, SkuVariant};

use crate::login::{login_wall_reason, CredentialResolver};
use crate::session::{settle, BrowserSession};

/// Markers in variant text that mean the option cannot be bought.
const SOLD_OUT_MARKERS: [&str; 4] = ["缺货", "无货", "售罄", "out of stock"];

/// Everything platform-specific the shared routines need: where to search
/// and which selector chains to try, most specific first.
#[derive(Clone, Debug)]
pub struct PlatformProfile {
    pub platform: Platform,
    /// `{query}` is replaced with the url-encoded product name.
    pub search_url_template: &'static str,
    pub result_chain: SelectorChain,
    pub sku_chain: SelectorChain,
    pub freight_chain: SelectorChain,
}

impl PlatformProfile {
    pub fn search_url(&self, demand: &PurchaseDemand) -> String {
        let mut query = demand.product_name.clone();
        if let Some(spec) = &demand.specification {
            query.push(' ');
            query.push_str(spec);
        }
        self.search_url_template
            .replace("{query}", &url_encode(&query))
    }
}

/// Minimal query-string encoding for the search keyword.
fn url_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(*byte as char)
            }
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

/// Probe the session for a login wall; on a wall, suspend up to
/// `login_wait` for external credential resolution and retry navigation
/// once. Still walled after the retry fails the platform, nothing else.
pub async fn ensure_session(
    session: &dyn BrowserSession,
    profile: &PlatformProfile,
    credentials: &dyn CredentialResolver,
    target_url: &str,
    settle_timeout: Duration,
    login_wait: Duration,
) -> Result<PageSnapshot, ProcureError> {
    session.navigate(target_url).await?;
    let snapshot = settle::snapshot_after_settle(session, settle_timeout).await?;
    let Some(reason) = login_wall_reason(&snapshot) else {
        return Ok(snapshot);
    };

    warn!(
        target: "platform",
        platform = profile.platform.as_str(),
        reason = %reason,
        "login wall detected, waiting for credential resolution"
    );
    credentials
        .wait_resolved(profile.platform, login_wait)
        .await?;

    session.navigate(target_url).await?;
    let retried = settle::snapshot_after_settle(session, settle_timeout).await?;
    match login_wall_reason(&retried) {
        None => Ok(retried),
        Some(reason) => Err(ProcureError::PlatformUnavailable {
            platform: profile.platform,
            reason: format!("still login-gated after retry: {reason}"),
        }),
    }
}

/// Search the platform and push offers into the sink as they are parsed,
/// so the orchestrator can move on before enumeration finishes. Finite and
/// not restartable.
pub async fn collect_offers(
    session: &dyn BrowserSession,
    profile: &PlatformProfile,
    engine: &Arc<ExtractionEngine>,
    credentials: &dyn CredentialResolver,
    demand: &PurchaseDemand,
    sink: &mpsc::Sender<RawOffer>,
    settle_timeout: Duration,
    login_wait: Duration,
) -> Result<usize, ProcureError> {
    let search_url = profile.search_url(demand);
    let snapshot = ensure_session(
        session,
        profile,
        credentials,
        &search_url,
        settle_timeout,
        login_wait,
    )
    .await?;

    let listing = engine.extract(profile.platform, &snapshot, &profile.result_chain)?;
    let matches: Vec<&ElementRecord> = profile
        .result_chain
        .candidates()
        .iter()
        .find(|sel| sel.raw() == listing.selector)
        .map(|sel| snapshot.select(sel))
        .unwrap_or_default();

    let mut yielded = 0usize;
    for element in matches {
        match offer_from_element(profile.platform, element, &listing) {
            Some(offer) => {
                if sink.send(offer).await.is_err() {
                    // Receiver dropped: the workflow moved on or was
                    // cancelled. Stop enumerating.
                    break;
                }
                yielded += 1;
            }
            None => debug!(
                target: "platform",
                platform = profile.platform.as_str(),
                text = %element.text.lines().next().unwrap_or(""),
                "skipping result without a parsable price or link"
            ),
        }
    }

    if yielded == 0 {
        let survey = engine.survey_classes(&snapshot, &["sku", "offer", "item", "price"]);
        debug!(
            target: "platform",
            platform = profile.platform.as_str(),
            ?survey,
            "search produced zero usable offers"
        );
    }
    Ok(yielded)
}

fn offer_from_element(
    platform: Platform,
    element: &ElementRecord,
    listing: &SkuExtractionResult,
) -> Option<RawOffer> {
    let title = element
        .text
        .lines()
        .next()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())?;
    let unit_price = parse_price(&element.text)?;
    let detail_url = element
        .attr("href")
        .or_else(|| element.attr("data-url"))?
        .to_string();

    Some(RawOffer {
        offer_id: OfferId::new(),
        platform,
        title,
        detail_url,
        unit_price,
        freight: Decimal::ZERO,
        min_quantity: parse_min_quantity(&element.text).unwrap_or(1),
        variants: Vec::new(),
        matched_selector: Some(listing.selector.clone()),
        confidence: listing.confidence,
    })
}

/// Variant/price extraction against one offer's detail page: navigate,
/// bounded settle, a single snapshot, then the SKU and freight chains run
/// against that snapshot. Failure is scoped to this offer.
pub async fn extract_variants(
    session: &dyn BrowserSession,
    profile: &PlatformProfile,
    engine: &Arc<ExtractionEngine>,
    offer: &mut RawOffer,
    settle_timeout: Duration,
) -> Result<SkuExtractionResult, ProcureError> {
    session.navigate(&offer.detail_url).await?;
    let snapshot = settle::snapshot_after_settle(session, settle_timeout).await?;

    let result = engine.extract(profile.platform, &snapshot, &profile.sku_chain)?;
    offer.variants = variants_from_samples(&result, offer.unit_price);
    offer.matched_selector = Some(result.selector.clone());
    offer.confidence = result.confidence;

    // Freight is optional; a missed chain leaves the listing freight.
    if let Ok(freight) = engine.extract(profile.platform, &snapshot, &profile.freight_chain) {
        if let Some(amount) = freight.samples.iter().find_map(|s| parse_price(s)) {
            offer.freight = amount;
        } else if freight
            .samples
            .iter()
            .any(|s| s.contains("包邮") || s.to_lowercase().contains("free"))
        {
            offer.freight = Decimal::ZERO;
        }
    }

    Ok(result)
}

fn variants_from_samples(result: &SkuExtractionResult, fallback_price: Decimal) -> Vec<SkuVariant> {
    result
        .samples
        .iter()
        .map(|sample| {
            let lowered = sample.to_lowercase();
            let in_stock = !SOLD_OUT_MARKERS
                .iter()
                .any(|marker| lowered.contains(marker));
            SkuVariant {
                label: sample.clone(),
                price: parse_price(sample).or(Some(fallback_price)),
                in_stock,
            }
        })
        .collect()
}
