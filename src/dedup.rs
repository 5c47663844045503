//! Merging repeated scrape passes of a live, re-rendering list.

use crate::model::Event;
use std::collections::HashSet;
use tracing::debug;

/// Union of all passes in first-seen order, one entry per identity key.
pub fn merge(passes: &[Vec<Event>]) -> Vec<Event> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for (pass, events) in passes.iter().enumerate() {
        let before = merged.len();
        for event in events {
            if seen.insert(event.key()) {
                merged.push(event.clone());
            }
        }
        debug!(
            "pass {}: {} events, {} new",
            pass + 1,
            events.len(),
            merged.len() - before
        );
    }
    merged
}

/// Drop events whose every field is the sentinel.
pub fn filter(events: Vec<Event>, sentinel: &str) -> Vec<Event> {
    let total = events.len();
    let kept: Vec<Event> = events
        .into_iter()
        .filter(|e| !e.is_placeholder(sentinel))
        .collect();
    if kept.len() < total {
        debug!("dropped {} placeholder events", total - kept.len());
    }
    kept
}
