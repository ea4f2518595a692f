//! Live regions
//!
//! The two singleton regions screen readers listen to: a polite
//! `role=status` region and an assertive `role=alert` region, both visually
//! hidden and atomic.

use afb_dom::{Document, DomError, NodeId};

use crate::types::Politeness;

/// Marks region elements; the value is the politeness
pub const REGION_ATTR: &str = "data-a11y-feedback";

/// Keeps regions in the accessibility tree but off screen
pub const VISUALLY_HIDDEN_STYLES: &str = "position: absolute; width: 1px; height: 1px; padding: 0; \
    margin: -1px; overflow: hidden; clip: rect(0, 0, 0, 0); white-space: nowrap; border: 0";

/// Handles to the polite and assertive regions
#[derive(Debug, Clone)]
pub struct LiveRegions {
    prefix: String,
    polite: Option<NodeId>,
    assertive: Option<NodeId>,
}

impl LiveRegions {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), polite: None, assertive: None }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Element id of a region
    pub fn region_id(&self, politeness: Politeness) -> String {
        format!("{}-{}", self.prefix, politeness.as_str())
    }

    pub fn handle(&self, politeness: Politeness) -> Option<NodeId> {
        match politeness {
            Politeness::Polite => self.polite,
            Politeness::Assertive => self.assertive,
        }
    }

    fn slot(&mut self, politeness: Politeness) -> &mut Option<NodeId> {
        match politeness {
            Politeness::Polite => &mut self.polite,
            Politeness::Assertive => &mut self.assertive,
        }
    }

    /// Both regions exist and are attached
    pub fn is_initialized(&self, doc: &Document) -> bool {
        Politeness::ALL.iter()
            .all(|&p| self.handle(p).is_some_and(|n| doc.is_connected(n)))
    }

    /// Create the regions, or adopt elements that already carry their ids.
    /// Idempotent.
    pub fn ensure(&mut self, doc: &mut Document) -> Result<(), DomError> {
        for politeness in Politeness::ALL {
            if self.handle(politeness).is_some_and(|n| doc.is_connected(n)) {
                continue;
            }
            let id = self.region_id(politeness);
            let node = match doc.get_element_by_id(&id) {
                Some(existing) => {
                    tracing::debug!(region = %id, "adopting existing live region");
                    existing
                }
                None => {
                    let node = doc.create_element("div");
                    doc.set_attribute(node, "id", &id)?;
                    let body = doc.body();
                    doc.append_child(body, node)?;
                    tracing::debug!(region = %id, "created live region");
                    node
                }
            };
            doc.set_attribute(node, REGION_ATTR, politeness.as_str())?;
            doc.set_attribute(node, "aria-live", politeness.as_str())?;
            doc.set_attribute(node, "aria-atomic", "true")?;
            doc.set_attribute(node, "role", politeness.role().as_str())?;
            doc.set_attribute(node, "style", VISUALLY_HIDDEN_STYLES)?;
            *self.slot(politeness) = Some(node);
        }
        Ok(())
    }

    /// Set a region's text
    pub fn write(
        &self,
        doc: &mut Document,
        politeness: Politeness,
        content: &str,
    ) -> Result<bool, DomError> {
        match self.handle(politeness).filter(|&n| doc.contains(n)) {
            Some(node) => {
                doc.set_text_content(node, content)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn clear(&self, doc: &mut Document, politeness: Politeness) -> Result<bool, DomError> {
        self.write(doc, politeness, "")
    }

    pub fn clear_all(&self, doc: &mut Document) -> Result<(), DomError> {
        for politeness in Politeness::ALL {
            self.clear(doc, politeness)?;
        }
        Ok(())
    }

    /// Current text of a region
    pub fn content(&self, doc: &Document, politeness: Politeness) -> Option<String> {
        self.handle(politeness)
            .filter(|&n| doc.contains(n))
            .map(|n| doc.text_content(n))
    }

    /// Remove both regions from the document
    pub fn destroy(&mut self, doc: &mut Document) {
        for politeness in Politeness::ALL {
            if let Some(node) = self.slot(politeness).take() {
                // Already gone if the caller removed it
                let _ = doc.remove(node);
            }
        }
    }

    /// Forget the handles without touching a document (headless teardown)
    pub fn forget(&mut self) {
        self.polite = None;
        self.assertive = None;
    }

    /// Destroy and recreate, possibly under a new prefix
    pub fn reinitialize(&mut self, doc: &mut Document, prefix: &str) -> Result<(), DomError> {
        self.destroy(doc);
        self.prefix = prefix.to_string();
        self.ensure(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regions_created_once() {
        let mut doc = Document::new();
        let mut regions = LiveRegions::new("a11y-feedback");
        regions.ensure(&mut doc).unwrap();
        regions.ensure(&mut doc).unwrap();

        let polite = doc.get_element_by_id("a11y-feedback-polite").unwrap();
        let assertive = doc.get_element_by_id("a11y-feedback-assertive").unwrap();
        assert_eq!(doc.get_attribute(polite, "role"), Some("status"));
        assert_eq!(doc.get_attribute(polite, "aria-live"), Some("polite"));
        assert_eq!(doc.get_attribute(assertive, "role"), Some("alert"));
        assert_eq!(doc.get_attribute(assertive, "aria-atomic"), Some("true"));
        assert_eq!(doc.query_selector_all(doc.root(), "[data-a11y-feedback]").unwrap().len(), 2);
    }

    #[test]
    fn test_adopts_existing_region() {
        let mut doc = Document::new();
        let existing = doc.create_element("div");
        doc.set_attribute(existing, "id", "app-polite").unwrap();
        let body = doc.body();
        doc.append_child(body, existing).unwrap();

        let mut regions = LiveRegions::new("app");
        regions.ensure(&mut doc).unwrap();
        assert_eq!(regions.handle(Politeness::Polite), Some(existing));
        assert_eq!(doc.get_attribute(existing, "aria-live"), Some("polite"));
    }

    #[test]
    fn test_write_and_destroy() {
        let mut doc = Document::new();
        let mut regions = LiveRegions::new("a11y-feedback");
        regions.ensure(&mut doc).unwrap();
        assert!(regions.write(&mut doc, Politeness::Assertive, "Failed").unwrap());
        assert_eq!(regions.content(&doc, Politeness::Assertive).as_deref(), Some("Failed"));
        regions.write(&mut doc, Politeness::Polite, "Saved").unwrap();
        regions.clear_all(&mut doc).unwrap();
        assert_eq!(regions.content(&doc, Politeness::Polite).as_deref(), Some(""));
        assert_eq!(regions.content(&doc, Politeness::Assertive).as_deref(), Some(""));

        regions.destroy(&mut doc);
        assert!(!regions.is_initialized(&doc));
        assert!(!regions.write(&mut doc, Politeness::Assertive, "x").unwrap());
        assert!(doc.get_element_by_id("a11y-feedback-assertive").is_none());
    }

    #[test]
    fn test_reinitialize_with_new_prefix() {
        let mut doc = Document::new();
        let mut regions = LiveRegions::new("a11y-feedback");
        regions.ensure(&mut doc).unwrap();
        regions.reinitialize(&mut doc, "shop").unwrap();
        assert!(doc.get_element_by_id("a11y-feedback-polite").is_none());
        assert!(doc.get_element_by_id("shop-polite").is_some());
        assert!(regions.is_initialized(&doc));
    }
}
