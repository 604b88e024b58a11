//! Heuristic extraction over page snapshots.
//!
//! Marketplace pages carry obfuscated, frequently-changing class names, so
//! nothing here trusts a single selector. An ordered [`SelectorChain`] is
//! tried against one synchronous [`PageSnapshot`]; the first candidate that
//! matches at least one element wins and the result records which selector
//! matched, how many elements it hit, and sanitized sample text.

mod engine;
mod price;
mod selector;
mod snapshot;

pub use engine::{ExtractionEngine, SkuExtractionResult};
pub use price::{parse_min_quantity, parse_price};
pub use selector::{Selector, SelectorChain};
pub use snapshot::{ElementRecord, PageSnapshot};
