//! Scripted sessions for tests and the CLI demo mode.
//!
//! A scripted session serves pre-built snapshots keyed by URL prefix and
//! can simulate login walls and navigation failures. The factory keeps a
//! handle per opened session so tests can assert teardown on every path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use extraction_engine::{ElementRecord, PageSnapshot};
use procpilot_core_types::{Platform, ProcureError};

use crate::session::{BrowserSession, SessionFactory};

struct SessionState {
    platform: Platform,
    pages: Vec<(String, PageSnapshot)>,
    login_walls: AtomicUsize,
    fail_navigation: bool,
    navigation_delay: Option<Duration>,
    current_url: Mutex<String>,
    closed: AtomicBool,
}

/// One scripted browser context.
pub struct ScriptedSession {
    state: Arc<SessionState>,
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    fn platform(&self) -> Platform {
        self.state.platform
    }

    async fn navigate(&self, url: &str) -> Result<(), ProcureError> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(ProcureError::Internal("session already closed".into()));
        }
        if let Some(delay) = self.state.navigation_delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.fail_navigation {
            return Err(ProcureError::PlatformUnavailable {
                platform: self.state.platform,
                reason: "navigation timed out".into(),
            });
        }
        *self.state.current_url.lock() = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, ProcureError> {
        Ok(self.state.current_url.lock().clone())
    }

    async fn settled(&self) -> Result<bool, ProcureError> {
        Ok(true)
    }

    async fn snapshot(&self) -> Result<PageSnapshot, ProcureError> {
        let url = self.state.current_url.lock().clone();
        if self.state.login_walls.load(Ordering::SeqCst) > 0 {
            self.state.login_walls.fetch_sub(1, Ordering::SeqCst);
            return Ok(PageSnapshot::new(url, "sign in").with_body_text("请登录"));
        }
        let page = self
            .state
            .pages
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, page)| {
                let mut page = page.clone();
                page.url = url.clone();
                page
            })
            .unwrap_or_else(|| PageSnapshot::new(url, "empty"));
        Ok(page)
    }

    async fn close(&self) -> Result<(), ProcureError> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Recipe for sessions opened on one platform.
#[derive(Default)]
pub struct SessionScript {
    pages: Vec<(String, PageSnapshot)>,
    login_walls: usize,
    fail_navigation: bool,
    navigation_delay: Option<Duration>,
}

impl SessionScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `page` for any navigation whose URL starts with `prefix`.
    pub fn page(mut self, prefix: impl Into<String>, page: PageSnapshot) -> Self {
        self.pages.push((prefix.into(), page));
        self
    }

    /// Serve a login wall for the first `count` snapshots.
    pub fn login_walls(mut self, count: usize) -> Self {
        self.login_walls = count;
        self
    }

    /// Every navigation fails as a platform timeout.
    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    /// Every navigation stalls for `delay` before completing. Simulates a
    /// marketplace that is up but unusably slow.
    pub fn slow_navigation(mut self, delay: Duration) -> Self {
        self.navigation_delay = Some(delay);
        self
    }
}

/// Factory serving scripted sessions and tracking their teardown.
#[derive(Default)]
pub struct ScriptedFactory {
    scripts: Mutex<HashMap<Platform, Arc<SessionScript>>>,
    opened: Mutex<Vec<Arc<SessionState>>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, platform: Platform, script: SessionScript) {
        self.scripts.lock().insert(platform, Arc::new(script));
    }

    pub fn opened_count(&self, platform: Platform) -> usize {
        self.opened
            .lock()
            .iter()
            .filter(|s| s.platform == platform)
            .count()
    }

    /// True when every session ever opened has been closed.
    pub fn all_closed(&self) -> bool {
        self.opened
            .lock()
            .iter()
            .all(|s| s.closed.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn open(&self, platform: Platform) -> Result<Box<dyn BrowserSession>, ProcureError> {
        let script = self.scripts.lock().get(&platform).cloned().ok_or(
            ProcureError::PlatformUnavailable {
                platform,
                reason: "no session script registered".into(),
            },
        )?;
        let state = Arc::new(SessionState {
            platform,
            pages: script.pages.clone(),
            login_walls: AtomicUsize::new(script.login_walls),
            fail_navigation: script.fail_navigation,
            navigation_delay: script.navigation_delay,
            current_url: Mutex::new(String::from("about:blank")),
            closed: AtomicBool::new(false),
        });
        self.opened.lock().push(state.clone());
        Ok(Box::new(ScriptedSession { state }))
    }
}

/// Build a search-results page whose items match the given result class.
pub fn search_page(
    url: impl Into<String>,
    item_class: &str,
    offers: &[(&str, Decimal, &str)],
) -> PageSnapshot {
    let mut page = PageSnapshot::new(url, "search results").with_body_text("search results");
    for (title, price, href) in offers {
        page.push(
            ElementRecord::new("div", &[item_class], format!("{title}\n¥{price}"))
                .with_attr("href", *href),
        );
    }
    page
}

/// Build an offer detail page with SKU variants and an optional freight
/// line.
pub fn detail_page(
    url: impl Into<String>,
    sku_class: &str,
    variants: &[&str],
    freight: Option<Decimal>,
) -> PageSnapshot {
    let mut page = PageSnapshot::new(url, "offer detail").with_body_text("offer detail");
    for variant in variants {
        page.push(ElementRecord::new("div", &[sku_class], *variant));
    }
    match freight {
        Some(amount) if amount > Decimal::ZERO => {
            page.push(ElementRecord::new(
                "div",
                &["freight-info"],
                format!("运费 ¥{amount}"),
            ));
        }
        Some(_) => {
            page.push(ElementRecord::new("div", &["freight-info"], "包邮"));
        }
        None => {}
    }
    page
}
