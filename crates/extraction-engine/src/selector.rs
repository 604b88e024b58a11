//! Selector parsing and matching.
//!
//! The vocabulary covers what the marketplace heuristics actually use:
//! `.class`, `tag`, `[class*="needle"]`, `tag[class*="needle"]`, and an
//! optional `:not([class*="needle"])` exclusion suffix.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use procpilot_core_types::ProcureError;

use crate::snapshot::ElementRecord;

/// One parsed selector candidate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    raw: String,
    tag: Option<String>,
    /// Exact class token, from `.class` syntax.
    class_token: Option<String>,
    /// Substring of the full class string, from `[class*="..."]` syntax.
    class_contains: Option<String>,
    /// Exclusion substring, from `:not([class*="..."])`.
    class_excludes: Option<String>,
}

impl Selector {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether the element satisfies every component of the selector.
    pub fn matches(&self, el: &ElementRecord) -> bool {
        if let Some(tag) = &self.tag {
            if !el.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        let class_string = el.class_string().to_lowercase();
        if let Some(token) = &self.class_token {
            if !el.classes.iter().any(|c| c.eq_ignore_ascii_case(token)) {
                return false;
            }
        }
        if let Some(needle) = &self.class_contains {
            if !class_string.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(excluded) = &self.class_excludes {
            if class_string.contains(excluded.as_str()) {
                return false;
            }
        }
        true
    }
}

impl FromStr for Selector {
    type Err = ProcureError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let raw = input.trim().to_string();
        if raw.is_empty() {
            return Err(ProcureError::Internal("empty selector".into()));
        }

        let mut rest = raw.as_str();
        let mut class_excludes = None;
        if let Some(idx) = rest.find(":not(") {
            let suffix = &rest[idx + ":not(".len()..];
            let inner = suffix.strip_suffix(')').ok_or_else(|| {
                ProcureError::Internal(format!("unterminated :not() in selector '{raw}'"))
            })?;
            class_excludes = Some(parse_class_contains(inner).ok_or_else(|| {
                ProcureError::Internal(format!("unsupported :not() body in selector '{raw}'"))
            })?);
            rest = &rest[..idx];
        }

        let (head, bracket) = match rest.find('[') {
            Some(idx) => (&rest[..idx], Some(&rest[idx..])),
            None => (rest, None),
        };

        let class_contains = match bracket {
            Some(body) => Some(parse_class_contains(body).ok_or_else(|| {
                ProcureError::Internal(format!("unsupported attribute selector '{raw}'"))
            })?),
            None => None,
        };

        let (tag, class_token) = if let Some(token) = head.strip_prefix('.') {
            (None, Some(token.to_lowercase()))
        } else if head.is_empty() {
            (None, None)
        } else if let Some(dot) = head.find('.') {
            (
                Some(head[..dot].to_lowercase()),
                Some(head[dot + 1..].to_lowercase()),
            )
        } else {
            (Some(head.to_lowercase()), None)
        };

        if tag.is_none() && class_token.is_none() && class_contains.is_none() {
            return Err(ProcureError::Internal(format!(
                "selector '{raw}' matches nothing"
            )));
        }

        Ok(Selector {
            raw,
            tag,
            class_token,
            class_contains,
            class_excludes,
        })
    }
}

/// Parse a `[class*="needle"]` body (with or without surrounding brackets).
fn parse_class_contains(body: &str) -> Option<String> {
    let body = body.trim().trim_start_matches('[').trim_end_matches(']');
    let body = body.strip_prefix("class*=")?;
    let needle = body.trim_matches(|c| c == '"' || c == '\'');
    if needle.is_empty() {
        None
    } else {
        Some(needle.to_lowercase())
    }
}

/// Ordered list of selector candidates, most specific/likely first. The
/// first candidate yielding at least one match wins.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectorChain {
    candidates: Vec<Selector>,
}

impl SelectorChain {
    /// Parse every candidate up front so a malformed selector fails fast,
    /// not in the middle of a live extraction.
    pub fn parse(raw: &[&str]) -> Result<Self, ProcureError> {
        let mut candidates = Vec::with_capacity(raw.len());
        for entry in raw {
            candidates.push(entry.parse::<Selector>()?);
        }
        Ok(Self { candidates })
    }

    pub fn candidates(&self) -> &[Selector] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
