//! crates/review_core/src/registry.rs
//!
//! The permanent history of every link ever accepted into the system.
//! Entries are created on first sight and only ever updated afterwards;
//! nothing is evicted.

use crate::domain::LinkEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkRegistry {
    entries: HashMap<String, LinkEntry>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, link: &str) -> Option<&LinkEntry> {
        self.entries.get(link)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records one upload event for each link and returns how many entries
    /// were created.
    ///
    /// A link already present only has its count bumped and `last_*`
    /// refreshed. Repeats inside one call count once, so one upload event
    /// never increments a link twice.
    pub fn register<S: AsRef<str>>(
        &mut self,
        links: &[S],
        actor: &str,
        now: DateTime<Utc>,
    ) -> usize {
        let mut touched: HashSet<&str> = HashSet::with_capacity(links.len());
        let mut created = 0;

        for raw in links {
            let link = raw.as_ref().trim();
            if link.is_empty() || !touched.insert(link) {
                continue;
            }

            match self.entries.get_mut(link) {
                Some(entry) => {
                    entry.upload_count += 1;
                    entry.last_uploaded_by = actor.to_string();
                    entry.last_uploaded_at = now;
                }
                None => {
                    self.entries.insert(
                        link.to_string(),
                        LinkEntry {
                            link: link.to_string(),
                            first_uploaded_by: actor.to_string(),
                            first_uploaded_at: now,
                            last_uploaded_by: actor.to_string(),
                            last_uploaded_at: now,
                            upload_count: 1,
                        },
                    );
                    created += 1;
                }
            }
        }

        created
    }

    /// The `limit` most recently seen entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<LinkEntry> {
        let mut entries: Vec<&LinkEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| {
            b.last_uploaded_at
                .cmp(&a.last_uploaded_at)
                .then_with(|| a.link.cmp(&b.link))
        });
        entries.into_iter().take(limit).cloned().collect()
    }
}
