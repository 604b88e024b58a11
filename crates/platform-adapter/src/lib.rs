//! Per-marketplace browser adapters.
//!
//! One adapter variant per platform behind a single capability interface:
//! search, variant extraction, session assurance. Each adapter owns exactly
//! one browser session for the duration of a platform task; sessions are
//! never shared across platforms.

mod adapter;
pub mod fixtures;
mod listing;
mod login;
mod session;

pub use adapter::{
    Alibaba1688Adapter, AdapterTuning, JdEnterpriseAdapter, PlatformAdapter,
    TmallSupermarketAdapter,
};
pub use listing::PlatformProfile;
pub use login::{login_wall_reason, CredentialResolver, NoopCredentialResolver};
pub use session::{settle, BrowserSession, SessionFactory};
