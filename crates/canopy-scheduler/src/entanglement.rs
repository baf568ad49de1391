//! Entanglement detection between requests submitted in the same batch
//!
//! Two requests are entangled when they share at least two of
//! {type, domain, signature}. Entanglement is reported, never filtered on.

use std::collections::BTreeSet;

use canopy_common::Request;

/// Minimum shared attributes for two requests to count as entangled
pub const MIN_SHARED_ATTRIBUTES: usize = 2;

/// Entangled request ids for every request in the batch, index-aligned
pub fn detect(batch: &[Request]) -> Vec<BTreeSet<String>> {
    let mut links: Vec<BTreeSet<String>> = vec![BTreeSet::new(); batch.len()];

    for (i, a) in batch.iter().enumerate() {
        for (j, b) in batch.iter().enumerate().skip(i + 1) {
            if a.id() != b.id() && a.shared_attributes(b) >= MIN_SHARED_ATTRIBUTES {
                links[i].insert(b.id().to_string());
                links[j].insert(a.id().to_string());
            }
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_common::CollaborationRequest;

    fn req(id: &str, requester: &str, kind: &str, domain: &str) -> Request {
        CollaborationRequest::new(id, requester, 0.5, 0.5, 0.0)
            .with_kind(kind, domain)
            .validate()
            .unwrap()
    }

    #[test]
    fn test_symmetric_links() {
        let batch = vec![
            req("a", "x", "analysis", "finance"),
            req("b", "y", "analysis", "finance"),
            req("c", "z", "review", "finance"),
        ];
        let links = detect(&batch);

        assert!(links[0].contains("b"));
        assert!(links[1].contains("a"));
        assert!(links[2].is_empty());
    }

    #[test]
    fn test_signature_counts_as_attribute() {
        let batch = vec![
            req("a", "shared", "analysis", "finance"),
            req("b", "shared", "analysis", "health"),
        ];
        let links = detect(&batch);
        assert_eq!(links[0].len(), 1);
    }
}
