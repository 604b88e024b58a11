//! Scripted demo marketplaces.
//!
//! The workspace ships no real browser driver; the CLI runs against
//! scripted sessions so the whole pipeline can be exercised end to end.
//! Wiring a real driver means implementing `SessionFactory` over it and
//! swapping it in here.

use std::sync::Arc;

use rust_decimal::Decimal;

use platform_adapter::fixtures::{detail_page, search_page, ScriptedFactory, SessionScript};
use platform_adapter::SessionFactory;
use procpilot_core_types::Platform;

/// A small three-marketplace world with offers for common office goods.
pub fn demo_factory() -> Arc<dyn SessionFactory> {
    let factory = ScriptedFactory::new();

    factory.register(
        Platform::Alibaba1688,
        SessionScript::new()
            .page(
                "https://s.1688.com/",
                search_page(
                    "https://s.1688.com/selloffer",
                    "offer-card",
                    &[
                        (
                            "A4 paper 80g 500 sheets wholesale",
                            Decimal::new(40, 0),
                            "https://detail.1688.com/offer/1001",
                        ),
                        (
                            "A4 paper 70g budget carton",
                            Decimal::new(34, 0),
                            "https://detail.1688.com/offer/1002",
                        ),
                    ],
                ),
            )
            .page(
                "https://detail.1688.com/offer/1001",
                detail_page(
                    "https://detail.1688.com/offer/1001",
                    "sku-item",
                    &["500张 ¥40.00", "1000张 ¥78.00"],
                    Some(Decimal::new(10, 0)),
                ),
            )
            .page(
                "https://detail.1688.com/offer/1002",
                detail_page(
                    "https://detail.1688.com/offer/1002",
                    "sku-item",
                    &["500张 ¥34.00", "整箱 缺货"],
                    Some(Decimal::new(12, 0)),
                ),
            ),
    );

    factory.register(
        Platform::JdEnterprise,
        SessionScript::new()
            .page(
                "https://search.jd.com/",
                search_page(
                    "https://search.jd.com/Search",
                    "gl-item",
                    &[(
                        "A4 paper 80g enterprise pack",
                        Decimal::new(45, 0),
                        "https://item.jd.com/100042.html",
                    )],
                ),
            )
            .page(
                "https://item.jd.com/",
                detail_page(
                    "https://item.jd.com/100042.html",
                    "sku-item",
                    &["500张 ¥45.00"],
                    Some(Decimal::ZERO),
                ),
            ),
    );

    factory.register(
        Platform::TmallSupermarket,
        SessionScript::new()
            .page(
                "https://list.tmall.com/",
                search_page(
                    "https://list.tmall.com/search_product",
                    "product-item",
                    &[(
                        "A4 paper 80g supermarket",
                        Decimal::new(48, 0),
                        "https://detail.tmall.com/item/2001",
                    )],
                ),
            )
            .page(
                "https://detail.tmall.com/",
                detail_page(
                    "https://detail.tmall.com/item/2001",
                    "sku-item",
                    &["500张 ¥48.00"],
                    Some(Decimal::new(8, 0)),
                ),
            ),
    );

    Arc::new(factory)
}
