//! Page snapshot model.
//!
//! A snapshot is taken exactly once per extraction, after the session's
//! bounded settle wait. All queries against it are synchronous; nothing in
//! this module can block on the live page.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::selector::Selector;

/// One DOM element as captured into a snapshot: tag, class list, a few
/// attributes (href, data-*) and its visible text.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ElementRecord {
    pub tag: String,
    pub classes: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub visible: bool,
}

impl ElementRecord {
    pub fn new(tag: impl Into<String>, classes: &[&str], text: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            attributes: BTreeMap::new(),
            text: text.into(),
            visible: true,
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }

    /// Full class string, as `className` would read in the page.
    pub fn class_string(&self) -> String {
        self.classes.join(" ")
    }
}

/// Immutable capture of a rendered page.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub body_text: String,
    pub elements: Vec<ElementRecord>,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            body_text: String::new(),
            elements: Vec::new(),
        }
    }

    pub fn with_body_text(mut self, text: impl Into<String>) -> Self {
        self.body_text = text.into();
        self
    }

    pub fn push(&mut self, element: ElementRecord) {
        self.elements.push(element);
    }

    pub fn with_element(mut self, element: ElementRecord) -> Self {
        self.elements.push(element);
        self
    }

    /// All elements matching the selector, in document order.
    pub fn select<'a>(&'a self, selector: &Selector) -> Vec<&'a ElementRecord> {
        self.elements
            .iter()
            .filter(|el| selector.matches(el))
            .collect()
    }

    /// Case-insensitive search over the page body text.
    pub fn body_contains(&self, needle: &str) -> bool {
        self.body_text
            .to_lowercase()
            .contains(&needle.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_filters_by_selector() {
        let snapshot = PageSnapshot::new("https://example.com", "demo")
            .with_element(ElementRecord::new("div", &["obj-item"], "red"))
            .with_element(ElementRecord::new("div", &["obj-item"], "blue"))
            .with_element(ElementRecord::new("span", &["price"], "¥40"));

        let selector: Selector = ".obj-item".parse().unwrap();
        assert_eq!(snapshot.select(&selector).len(), 2);
    }

    #[test]
    fn body_contains_is_case_insensitive() {
        let snapshot =
            PageSnapshot::new("https://example.com", "demo").with_body_text("Please Sign In");
        assert!(snapshot.body_contains("please sign in"));
        assert!(!snapshot.body_contains("checkout"));
    }
}
