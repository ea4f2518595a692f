//! Media preferences
//!
//! `prefers-reduced-motion` as seen by the document.

/// Motion preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionPreference {
    #[default]
    NoPreference,
    Reduce,
}

impl MotionPreference {
    pub fn should_reduce(self) -> bool {
        self == Self::Reduce
    }

    /// Evaluate a `(prefers-reduced-motion: ...)` media query
    pub fn matches_query(self, query: &str) -> bool {
        let query = query.to_ascii_lowercase();
        if !query.contains("prefers-reduced-motion") {
            return false;
        }
        // "no-preference" first: "reduce" is a substring of "reduced-motion"
        if query.contains("no-preference") {
            return !self.should_reduce();
        }
        query.contains(": reduce") || query.contains(":reduce")
    }
}
