use std::collections::BTreeMap;

use crate::{JobId, Response};

/// Completed responses of the current round, keyed by job id.
#[derive(Debug, Default)]
pub struct ResponseCollector {
    items: BTreeMap<JobId, Response>,
}

impl ResponseCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `response` under its id, replacing any earlier response with that id.
    pub fn add(&mut self, response: Response) {
        self.items.insert(response.id, response);
    }

    /// Returns every stored response in id order and empties the collector.
    pub fn drain(&mut self) -> Vec<Response> {
        std::mem::take(&mut self.items).into_values().collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
