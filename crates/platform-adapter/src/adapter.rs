//! The platform capability interface and its per-marketplace variants.
//!
//! Adding a marketplace means adding a profile and a variant here; nothing
//! upstream branches on platform type.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use extraction_engine::{ExtractionEngine, SkuExtractionResult};
use procpilot_core_types::{Platform, ProcureError, PurchaseDemand, RawOffer};

use crate::listing::{self, PlatformProfile};
use crate::login::CredentialResolver;
use crate::session::BrowserSession;

/// Timing knobs shared by all adapters.
#[derive(Clone, Copy, Debug)]
pub struct AdapterTuning {
    /// Bounded post-navigation settle wait before the single snapshot.
    pub settle_timeout: Duration,
    /// Bounded suspension for external credential resolution on a login
    /// wall.
    pub login_wait: Duration,
}

impl Default for AdapterTuning {
    fn default() -> Self {
        Self {
            settle_timeout: Duration::from_secs(8),
            login_wait: Duration::from_secs(20),
        }
    }
}

/// One capability interface over all marketplaces.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Detect and resolve a login wall for the demand's search page.
    /// Fails with `PlatformUnavailable` for this platform only.
    async fn ensure_session(
        &self,
        session: &dyn BrowserSession,
        demand: &PurchaseDemand,
    ) -> Result<(), ProcureError>;

    /// Search the marketplace and push offers into `sink` as discovered.
    /// Finite, not restartable; returns the number of offers yielded.
    async fn search(
        &self,
        session: &dyn BrowserSession,
        demand: &PurchaseDemand,
        sink: &mpsc::Sender<RawOffer>,
    ) -> Result<usize, ProcureError>;

    /// Run the extraction engine against the offer's live detail page.
    /// Enriches the offer with variants, freight and extraction confidence;
    /// fails with `ExtractionFailed` scoped to this one offer.
    async fn extract_variants(
        &self,
        session: &dyn BrowserSession,
        offer: &mut RawOffer,
    ) -> Result<SkuExtractionResult, ProcureError>;
}

/// Profile-driven adapter shared by all current marketplaces. Kept private;
/// each platform exposes a named variant type.
struct ProfileAdapter {
    profile: PlatformProfile,
    engine: Arc<ExtractionEngine>,
    credentials: Arc<dyn CredentialResolver>,
    tuning: AdapterTuning,
}

#[async_trait]
impl PlatformAdapter for ProfileAdapter {
    fn platform(&self) -> Platform {
        self.profile.platform
    }

    async fn ensure_session(
        &self,
        session: &dyn BrowserSession,
        demand: &PurchaseDemand,
    ) -> Result<(), ProcureError> {
        let url = self.profile.search_url(demand);
        listing::ensure_session(
            session,
            &self.profile,
            self.credentials.as_ref(),
            &url,
            self.tuning.settle_timeout,
            self.tuning.login_wait,
        )
        .await
        .map(|_| ())
    }

    async fn search(
        &self,
        session: &dyn BrowserSession,
        demand: &PurchaseDemand,
        sink: &mpsc::Sender<RawOffer>,
    ) -> Result<usize, ProcureError> {
        listing::collect_offers(
            session,
            &self.profile,
            &self.engine,
            self.credentials.as_ref(),
            demand,
            sink,
            self.tuning.settle_timeout,
            self.tuning.login_wait,
        )
        .await
    }

    async fn extract_variants(
        &self,
        session: &dyn BrowserSession,
        offer: &mut RawOffer,
    ) -> Result<SkuExtractionResult, ProcureError> {
        listing::extract_variants(
            session,
            &self.profile,
            &self.engine,
            offer,
            self.tuning.settle_timeout,
        )
        .await
    }
}

macro_rules! platform_adapter {
    ($(#[$doc:meta])* $name:ident, $profile:path) => {
        $(#[$doc])*
        pub struct $name {
            inner: ProfileAdapter,
        }

        impl $name {
            pub fn new(
                engine: Arc<ExtractionEngine>,
                credentials: Arc<dyn CredentialResolver>,
                tuning: AdapterTuning,
            ) -> Self {
                Self {
                    inner: ProfileAdapter {
                        profile: $profile(),
                        engine,
                        credentials,
                        tuning,
                    },
                }
            }
        }

        #[async_trait]
        impl PlatformAdapter for $name {
            fn platform(&self) -> Platform {
                self.inner.platform()
            }

            async fn ensure_session(
                &self,
                session: &dyn BrowserSession,
                demand: &PurchaseDemand,
            ) -> Result<(), ProcureError> {
                self.inner.ensure_session(session, demand).await
            }

            async fn search(
                &self,
                session: &dyn BrowserSession,
                demand: &PurchaseDemand,
                sink: &mpsc::Sender<RawOffer>,
            ) -> Result<usize, ProcureError> {
                self.inner.search(session, demand, sink).await
            }

            async fn extract_variants(
                &self,
                session: &dyn BrowserSession,
                offer: &mut RawOffer,
            ) -> Result<SkuExtractionResult, ProcureError> {
                self.inner.extract_variants(session, offer).await
            }
        }
    };
}

platform_adapter!(
    /// 1688 wholesale. Selector chains seeded from observed page dumps of
    /// detail.1688.com offers.
    Alibaba1688Adapter,
    profiles::alibaba_1688
);

platform_adapter!(
    /// JD enterprise procurement.
    JdEnterpriseAdapter,
    profiles::jd_enterprise
);

platform_adapter!(
    /// Tmall supermarket.
    TmallSupermarketAdapter,
    profiles::tmall_supermarket
);

pub(crate) mod profiles {
    use extraction_engine::SelectorChain;
    use procpilot_core_types::Platform;

    use crate::listing::PlatformProfile;

    fn chain(raw: &[&str]) -> SelectorChain {
        SelectorChain::parse(raw).expect("built-in selector chains are valid")
    }

    pub fn alibaba_1688() -> PlatformProfile {
        PlatformProfile {
            platform: Platform::Alibaba1688,
            search_url_template: "https://s.1688.com/selloffer/offer_search.htm?keywords={query}",
            result_chain: chain(&[
                "[class*=\"offer-card\"]",
                "[class*=\"offer-item\"]",
                "[class*=\"sm-offer\"]",
                "[class*=\"card-container\"]",
            ]),
            sku_chain: chain(&[
                "[class*=\"sku-item\"]:not([class*=\"disabled\"])",
                "[class*=\"obj-item\"]:not([class*=\"disabled\"])",
                "[class*=\"obj-content\"]",
                "[class*=\"prop-item\"]",
                "span[class*=\"item\"]",
            ]),
            freight_chain: chain(&["[class*=\"freight\"]", "[class*=\"delivery\"]"]),
        }
    }

    pub fn jd_enterprise() -> PlatformProfile {
        PlatformProfile {
            platform: Platform::JdEnterprise,
            search_url_template: "https://search.jd.com/Search?keyword={query}",
            result_chain: chain(&[
                "[class*=\"gl-item\"]",
                "[class*=\"goods-item\"]",
                "[class*=\"j-sku-item\"]",
            ]),
            sku_chain: chain(&[
                "[class*=\"sku-item\"]:not([class*=\"disabled\"])",
                "[class*=\"choose-attr\"]",
                "[class*=\"item-selected\"]",
                "[class*=\"prop-item\"]",
            ]),
            freight_chain: chain(&["[class*=\"freight\"]", "[class*=\"store-delivery\"]"]),
        }
    }

    pub fn tmall_supermarket() -> PlatformProfile {
        PlatformProfile {
            platform: Platform::TmallSupermarket,
            search_url_template: "https://list.tmall.com/search_product.htm?q={query}",
            result_chain: chain(&[
                "[class*=\"product-item\"]",
                "[class*=\"productItem\"]",
                "[class*=\"item-box\"]",
            ]),
            sku_chain: chain(&[
                "[class*=\"sku-item\"]:not([class*=\"disabled\"])",
                "[class*=\"tm-sku\"]",
                "[class*=\"prop-item\"]",
            ]),
            freight_chain: chain(&["[class*=\"postage\"]", "[class*=\"freight\"]"]),
        }
    }
}
