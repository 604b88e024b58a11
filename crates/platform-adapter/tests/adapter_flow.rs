//! End-to-end adapter behaviour against scripted sessions.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::mpsc;

use extraction_engine::ExtractionEngine;
use platform_adapter::fixtures::{detail_page, search_page, ScriptedFactory, SessionScript};
use platform_adapter::{
    Alibaba1688Adapter, AdapterTuning, NoopCredentialResolver, PlatformAdapter, SessionFactory,
};
use procpilot_core_types::{Platform, ProcureError, PurchaseDemand};

fn tuning() -> AdapterTuning {
    AdapterTuning {
        settle_timeout: Duration::from_millis(50),
        login_wait: Duration::from_millis(50),
    }
}

fn adapter() -> Alibaba1688Adapter {
    Alibaba1688Adapter::new(
        Arc::new(ExtractionEngine::default()),
        Arc::new(NoopCredentialResolver),
        tuning(),
    )
}

fn demand() -> PurchaseDemand {
    PurchaseDemand::new("A4 paper", 10, vec![Platform::Alibaba1688]).unwrap()
}

fn factory_with_results(script: SessionScript) -> ScriptedFactory {
    let factory = ScriptedFactory::new();
    factory.register(Platform::Alibaba1688, script);
    factory
}

fn results_script() -> SessionScript {
    SessionScript::new()
        .page(
            "https://s.1688.com/",
            search_page(
                "https://s.1688.com/selloffer/offer_search.htm",
                "offer-card",
                &[
                    (
                        "A4 paper 500 sheets",
                        Decimal::new(40, 0),
                        "https://detail.1688.com/offer/1.html",
                    ),
                    (
                        "A4 paper premium",
                        Decimal::new(45, 0),
                        "https://detail.1688.com/offer/2.html",
                    ),
                ],
            ),
        )
        .page(
            "https://detail.1688.com/offer/1.html",
            detail_page(
                "https://detail.1688.com/offer/1.html",
                "obj-item",
                &["white ¥40.00", "ivory ¥41.00", "recycled 缺货"],
                Some(Decimal::new(10, 0)),
            ),
        )
}

#[tokio::test]
async fn search_streams_offers_from_listing() {
    let factory = factory_with_results(results_script());
    let session = factory.open(Platform::Alibaba1688).await.unwrap();
    let (tx, mut rx) = mpsc::channel(8);

    let yielded = adapter().search(session.as_ref(), &demand(), &tx).await.unwrap();
    assert_eq!(yielded, 2);

    let first = rx.recv().await.unwrap();
    assert_eq!(first.platform, Platform::Alibaba1688);
    assert_eq!(first.unit_price, Decimal::new(40, 0));
    assert_eq!(first.detail_url, "https://detail.1688.com/offer/1.html");
    assert_eq!(first.matched_selector.as_deref(), Some("[class*=\"offer-card\"]"));

    session.close().await.unwrap();
    assert!(factory.all_closed());
}

#[tokio::test]
async fn extract_variants_enriches_offer() {
    let factory = factory_with_results(results_script());
    let session = factory.open(Platform::Alibaba1688).await.unwrap();
    let (tx, mut rx) = mpsc::channel(8);
    let adapter = adapter();

    adapter.search(session.as_ref(), &demand(), &tx).await.unwrap();
    let mut offer = rx.recv().await.unwrap();

    let result = adapter
        .extract_variants(session.as_ref(), &mut offer)
        .await
        .unwrap();
    // ".sku-item" misses, "[class*=\"obj-item\"]" wins.
    assert_eq!(result.selector, "[class*=\"obj-item\"]:not([class*=\"disabled\"])");
    assert_eq!(result.match_count, 3);
    assert_eq!(offer.variants.len(), 3);
    assert!(!offer.variants[2].in_stock);
    assert_eq!(offer.freight, Decimal::new(10, 0));

    session.close().await.unwrap();
}

#[tokio::test]
async fn login_wall_resolved_after_single_retry() {
    let factory = factory_with_results(results_script().login_walls(1));
    let session = factory.open(Platform::Alibaba1688).await.unwrap();

    adapter()
        .ensure_session(session.as_ref(), &demand())
        .await
        .unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
async fn persistent_login_wall_fails_platform_only() {
    let factory = factory_with_results(results_script().login_walls(5));
    let session = factory.open(Platform::Alibaba1688).await.unwrap();

    let err = adapter()
        .ensure_session(session.as_ref(), &demand())
        .await
        .unwrap_err();
    assert!(matches!(err, ProcureError::PlatformUnavailable { .. }));
    assert!(err.is_local());
    session.close().await.unwrap();
}

#[tokio::test]
async fn navigation_failure_is_platform_unavailable() {
    let factory = factory_with_results(SessionScript::new().failing_navigation());
    let session = factory.open(Platform::Alibaba1688).await.unwrap();

    let (tx, _rx) = mpsc::channel(8);
    let err = adapter()
        .search(session.as_ref(), &demand(), &tx)
        .await
        .unwrap_err();
    assert!(matches!(err, ProcureError::PlatformUnavailable { .. }));
    session.close().await.unwrap();
}

#[tokio::test]
async fn empty_listing_is_extraction_failure() {
    // A page with no recognizable result elements exhausts the chain.
    let factory = factory_with_results(SessionScript::new().page(
        "https://s.1688.com/",
        search_page("https://s.1688.com/selloffer/offer_search.htm", "banner", &[]),
    ));
    let session = factory.open(Platform::Alibaba1688).await.unwrap();

    let (tx, _rx) = mpsc::channel(8);
    let err = adapter()
        .search(session.as_ref(), &demand(), &tx)
        .await
        .unwrap_err();
    assert!(matches!(err, ProcureError::ExtractionFailed { .. }));
    session.close().await.unwrap();
}
