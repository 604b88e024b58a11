//! Order execution with pre-commit revalidation.
//!
//! An order is placed at most once per workflow, only after explicit
//! approval, and only after the approved offer's price and stock have been
//! re-checked against the live detail page.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use platform_adapter::{BrowserSession, PlatformAdapter, SessionFactory};
use procpilot_core_types::{
    Order, Platform, ProcureError, PurchaseDemand, RawOffer, Recommendation, WorkflowId,
};

/// Live price/stock reading for one offer, taken just before commit.
#[derive(Clone, Debug)]
pub struct OfferQuote {
    pub unit_price: Decimal,
    pub freight: Decimal,
    pub in_stock: bool,
}

/// Re-reads an approved offer from its marketplace.
#[async_trait]
pub trait OfferRevalidator: Send + Sync {
    async fn revalidate(&self, recommendation: &Recommendation)
        -> Result<OfferQuote, ProcureError>;
}

/// Commits exactly one order for an approved recommendation.
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn execute(
        &self,
        workflow_id: &WorkflowId,
        demand: &PurchaseDemand,
        recommendation: &Recommendation,
    ) -> Result<Order, ProcureError>;
}

/// Default executor: revalidate, gate on drift and stock, then commit.
pub struct RevalidatingExecutor {
    revalidator: Arc<dyn OfferRevalidator>,
    /// Upward unit-price drift beyond this fraction of the approved price
    /// blocks the order. A price drop passes and the order is priced at
    /// the current quote.
    price_tolerance: f64,
}

impl RevalidatingExecutor {
    pub fn new(revalidator: Arc<dyn OfferRevalidator>, price_tolerance: f64) -> Self {
        Self {
            revalidator,
            price_tolerance,
        }
    }
}

#[async_trait]
impl OrderExecutor for RevalidatingExecutor {
    async fn execute(
        &self,
        workflow_id: &WorkflowId,
        demand: &PurchaseDemand,
        recommendation: &Recommendation,
    ) -> Result<Order, ProcureError> {
        let quote = self.revalidator.revalidate(recommendation).await?;

        if !quote.in_stock {
            return Err(ProcureError::OutOfStock {
                platform: recommendation.platform,
            });
        }

        let tolerance =
            Decimal::from_f64(self.price_tolerance).unwrap_or(Decimal::ZERO);
        let ceiling = recommendation.unit_price * (Decimal::ONE + tolerance);
        if quote.unit_price > ceiling {
            return Err(ProcureError::PriceChanged {
                platform: recommendation.platform,
                snapshot: recommendation.unit_price,
                current: quote.unit_price,
            });
        }

        let payment_amount =
            quote.unit_price * Decimal::from(demand.quantity) + quote.freight;
        let order = Order {
            order_id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.clone(),
            platform: recommendation.platform,
            payment_amount,
            placed_at: Utc::now(),
        };
        info!(
            target: "executor",
            workflow_id = %workflow_id,
            order_id = %order.order_id,
            platform = recommendation.platform.as_str(),
            amount = %payment_amount,
            "order placed"
        );
        Ok(order)
    }
}

/// Revalidator backed by the platform adapters: opens a fresh session,
/// re-runs variant extraction on the offer's detail page and quotes the
/// cheapest purchasable variant.
pub struct AdapterRevalidator {
    factory: Arc<dyn SessionFactory>,
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl AdapterRevalidator {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
    ) -> Self {
        Self { factory, adapters }
    }

    async fn probe(
        &self,
        session: &dyn BrowserSession,
        adapter: &dyn PlatformAdapter,
        recommendation: &Recommendation,
    ) -> Result<OfferQuote, ProcureError> {
        let mut offer = RawOffer {
            offer_id: recommendation.offer_id.clone(),
            platform: recommendation.platform,
            title: recommendation.product_name.clone(),
            detail_url: recommendation.detail_url.clone(),
            unit_price: recommendation.unit_price,
            freight: recommendation.freight,
            min_quantity: 1,
            variants: Vec::new(),
            matched_selector: None,
            confidence: 0.0,
        };
        adapter.extract_variants(session, &mut offer).await?;

        let purchasable: Vec<Decimal> = offer
            .variants
            .iter()
            .filter(|v| v.in_stock)
            .filter_map(|v| v.price)
            .collect();
        Ok(OfferQuote {
            unit_price: purchasable
                .iter()
                .min()
                .copied()
                .unwrap_or(offer.unit_price),
            freight: offer.freight,
            in_stock: !purchasable.is_empty()
                || offer.variants.iter().any(|v| v.in_stock),
        })
    }
}

#[async_trait]
impl OfferRevalidator for AdapterRevalidator {
    async fn revalidate(
        &self,
        recommendation: &Recommendation,
    ) -> Result<OfferQuote, ProcureError> {
        let adapter = self
            .adapters
            .get(&recommendation.platform)
            .cloned()
            .ok_or_else(|| ProcureError::Internal(format!(
                "no adapter for platform {}",
                recommendation.platform
            )))?;

        let session = self.factory.open(recommendation.platform).await?;
        let result = self
            .probe(session.as_ref(), adapter.as_ref(), recommendation)
            .await;
        if let Err(e) = session.close().await {
            warn!(
                target: "executor",
                platform = recommendation.platform.as_str(),
                error = %e,
                "session close failed after revalidation"
            );
        }
        result
    }
}
