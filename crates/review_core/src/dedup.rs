//! crates/review_core/src/dedup.rs
//!
//! Classifies an uploaded batch against itself and against the link registry.

use crate::domain::{DedupReport, GlobalDuplicate, WithinFileDuplicate};
use crate::registry::LinkRegistry;
use std::collections::HashMap;

/// Splits `batch` into within-file duplicates, global duplicates and new links.
///
/// Links are trimmed; empty entries are dropped and only counted. The output
/// sequences follow first-occurrence order in `batch`, which the planner
/// relies on when slicing `new_links` by position. The registry is only read.
pub fn classify<S: AsRef<str>>(batch: &[S], registry: &LinkRegistry) -> DedupReport {
    let mut report = DedupReport {
        batch_length: batch.len(),
        ..DedupReport::default()
    };
    let mut first_seen: HashMap<&str, usize> = HashMap::with_capacity(batch.len());

    for (index, raw) in batch.iter().enumerate() {
        let link = raw.as_ref().trim();
        if link.is_empty() {
            report.empty_links_removed += 1;
            continue;
        }

        if let Some(&first_index) = first_seen.get(link) {
            report.within_file_duplicates.push(WithinFileDuplicate {
                link: link.to_string(),
                first_index,
            });
            continue;
        }
        first_seen.insert(link, index);

        match registry.get(link) {
            Some(entry) => report.global_duplicates.push(GlobalDuplicate {
                link: link.to_string(),
                provenance: entry.clone(),
            }),
            None => report.new_links.push(link.to_string()),
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn splits_batch_against_empty_registry() {
        let registry = LinkRegistry::new();
        let report = classify(&["http://a.pdf", "http://a.pdf", "http://b.pdf"], &registry);

        assert_eq!(
            report.within_file_duplicates,
            vec![WithinFileDuplicate {
                link: "http://a.pdf".to_string(),
                first_index: 0
            }]
        );
        assert!(report.global_duplicates.is_empty());
        assert_eq!(report.new_links, vec!["http://a.pdf", "http://b.pdf"]);
        assert_eq!(report.total_duplicates_removed(), 1);
    }

    #[test]
    fn identical_batch_after_registration_is_all_duplicates() {
        let mut registry = LinkRegistry::new();
        let batch = ["http://a.pdf", "http://a.pdf", "http://b.pdf"];

        let first = classify(&batch, &registry);
        registry.register(&first.new_links, "alice", Utc::now());
        assert_eq!(registry.len(), 2);

        let second = classify(&batch, &registry);
        assert!(second.new_links.is_empty());
        assert_eq!(second.global_duplicates.len(), 2);
        assert_eq!(second.within_file_duplicates.len(), 1);
        assert_eq!(second.total_duplicates_removed(), 3);
        assert_eq!(second.global_duplicates[0].provenance.upload_count, 1);
    }

    #[test]
    fn empty_links_are_counted_but_not_classified() {
        let registry = LinkRegistry::new();
        let report = classify(&["  ", "http://a.pdf", "", " http://a.pdf "], &registry);

        assert_eq!(report.batch_length, 4);
        assert_eq!(report.empty_links_removed, 2);
        assert_eq!(report.new_links, vec!["http://a.pdf"]);
        assert_eq!(report.within_file_duplicates[0].first_index, 1);
        assert_eq!(report.total_duplicates_removed(), 1);
    }

    #[test]
    fn sequences_partition_distinct_links() {
        let mut registry = LinkRegistry::new();
        registry.register(&["http://c.pdf", "http://e.pdf"], "bob", Utc::now());

        let batch = [
            "http://a.pdf",
            "http://c.pdf",
            "http://b.pdf",
            "http://a.pdf",
            "http://c.pdf",
            "http://d.pdf",
            "http://e.pdf",
        ];
        let report = classify(&batch, &registry);

        let distinct: std::collections::HashSet<_> = batch.iter().collect();
        assert_eq!(report.distinct_links(), distinct.len());
        assert_eq!(report.new_links, vec!["http://a.pdf", "http://b.pdf", "http://d.pdf"]);
        let globals: Vec<_> = report.global_duplicates.iter().map(|g| g.link.as_str()).collect();
        assert_eq!(globals, vec!["http://c.pdf", "http://e.pdf"]);
    }

    #[test]
    fn links_are_case_sensitive() {
        let mut registry = LinkRegistry::new();
        registry.register(&["http://A.pdf"], "bob", Utc::now());

        let report = classify(&["http://a.pdf"], &registry);
        assert_eq!(report.new_links, vec!["http://a.pdf"]);
    }

    #[test]
    fn classification_is_deterministic() {
        let registry = LinkRegistry::new();
        let batch: Vec<String> = (0..50).map(|i| format!("http://doc{}.pdf", i % 37)).collect();

        assert_eq!(classify(&batch, &registry), classify(&batch, &registry));
    }
}
