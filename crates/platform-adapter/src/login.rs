//! Login wall detection and external credential resolution.

use std::time::Duration;

use async_trait::async_trait;

use extraction_engine::PageSnapshot;
use procpilot_core_types::{Platform, ProcureError};

/// Body-text markers that signal a login-gated page.
const LOGIN_TEXT_MARKERS: [&str; 3] = ["请登录", "登录后查看", "please sign in"];

/// Returns the reason the page looks login-gated, or `None` for a usable
/// page. Markers: a `login` class anywhere in the DOM, one of the known
/// body-text phrases, or a login redirect in the URL.
pub fn login_wall_reason(snapshot: &PageSnapshot) -> Option<String> {
    if snapshot.url.to_lowercase().contains("login") {
        return Some(format!("redirected to login url {}", snapshot.url));
    }
    for marker in LOGIN_TEXT_MARKERS {
        if snapshot.body_contains(marker) {
            return Some(format!("body text contains '{marker}'"));
        }
    }
    let login_classes = snapshot
        .elements
        .iter()
        .filter(|el| el.class_string().to_lowercase().contains("login"))
        .count();
    if login_classes > 0 {
        return Some(format!("{login_classes} login-marked elements present"));
    }
    None
}

/// External collaborator that provisions credentials/session cookies when a
/// platform throws up a login wall. The adapter suspends up to `bound`
/// waiting for resolution, then retries navigation once.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn wait_resolved(&self, platform: Platform, bound: Duration)
        -> Result<(), ProcureError>;
}

/// Resolver for environments where sessions are pre-authenticated out of
/// band; reports resolution immediately and lets the retry decide.
pub struct NoopCredentialResolver;

#[async_trait]
impl CredentialResolver for NoopCredentialResolver {
    async fn wait_resolved(
        &self,
        _platform: Platform,
        _bound: Duration,
    ) -> Result<(), ProcureError> {
        Ok(())
    }
}
