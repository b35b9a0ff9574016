//! Cheap fingerprints for "have we been on this page already".

use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::extract::PageSnapshot;

/// URL, title, input count and a hash of the filtered HTML.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageSignature {
    url: String,
    title: String,
    inputs: usize,
    html_hash: u64,
    /// Platform step name, when a strategy knows it.
    step: Option<String>,
}

impl PageSignature {
    pub fn of(snapshot: &PageSnapshot) -> Self {
        let mut hasher = DefaultHasher::new();
        snapshot.filtered_html.hash(&mut hasher);
        Self {
            url: snapshot.url.clone(),
            title: snapshot.title.clone(),
            inputs: snapshot.inputs.len(),
            html_hash: hasher.finish(),
            step: None,
        }
    }

    pub fn with_step(mut self, step: &str) -> Self {
        self.step = Some(step.to_string());
        self
    }
}

/// Signatures seen during one run.
#[derive(Debug, Default)]
pub struct VisitedPages {
    seen: HashSet<PageSignature>,
}

impl VisitedPages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `signature`; false when it was already there.
    pub fn visit(&mut self, signature: PageSignature) -> bool {
        self.seen.insert(signature)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
