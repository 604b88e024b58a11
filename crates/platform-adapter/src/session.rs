//! Browser session abstraction.
//!
//! The real driver (CDP, WebDriver, whatever operations provisions) lives
//! outside this workspace; adapters only see this trait. One session maps
//! to one browser context on one platform.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use extraction_engine::PageSnapshot;
use procpilot_core_types::{Platform, ProcureError};

/// A live browser context bound to one platform.
///
/// The owning platform task must call [`close`](BrowserSession::close) on
/// every exit path; the scripted fixtures assert this in tests.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    fn platform(&self) -> Platform;

    async fn navigate(&self, url: &str) -> Result<(), ProcureError>;

    async fn current_url(&self) -> Result<String, ProcureError>;

    /// Whether dynamically rendered content has settled (readyState plus
    /// platform-specific markers). Cheap; safe to poll.
    async fn settled(&self) -> Result<bool, ProcureError>;

    /// One synchronous capture of the current page.
    async fn snapshot(&self) -> Result<PageSnapshot, ProcureError>;

    async fn close(&self) -> Result<(), ProcureError>;
}

/// Scoped session acquisition. The orchestrator opens one session per
/// platform task and releases it on success, failure and cancellation.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, platform: Platform) -> Result<Box<dyn BrowserSession>, ProcureError>;
}

/// Bounded wait-for-settle, then exactly one snapshot.
///
/// Replaces the fixed "sleep and hope the page loaded" waits: polls
/// `settled()` until it reports true or the deadline passes, then captures
/// whatever is there. Never waits past `settle_timeout`.
pub mod settle {
    use super::*;

    const POLL_INTERVAL: Duration = Duration::from_millis(100);

    pub async fn snapshot_after_settle(
        session: &dyn BrowserSession,
        settle_timeout: Duration,
    ) -> Result<PageSnapshot, ProcureError> {
        let deadline = Instant::now() + settle_timeout;
        loop {
            if session.settled().await? {
                break;
            }
            if Instant::now() >= deadline {
                break;
            }
            sleep(POLL_INTERVAL.min(settle_timeout)).await;
        }
        session.snapshot().await
    }
}
