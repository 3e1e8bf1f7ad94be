use crate::cache::EvidenceCache;
use crate::normalize::normalize;
use crate::search::Searcher;
use crate::types::EvidenceSnippet;

/// How many titles to request per surface form.
pub const RESULTS_PER_QUERY: usize = 2;

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Gather up to `k` evidence snippets for a (question, answer) pair.
///
/// Both surface forms are searched in order, summaries are fetched per title,
/// and snippets are deduplicated by normalized text within the call. The
/// result is written through the cache; a hit short-circuits everything.
/// Collaborator failures degrade to fewer (possibly zero) snippets — they
/// never fail the item.
pub async fn retrieve_evidence(
    searcher: &dyn Searcher,
    cache: &EvidenceCache,
    question: &str,
    answer: &str,
    k: usize,
) -> Vec<EvidenceSnippet> {
    if let Some(hit) = cache.get(question, answer, k) {
        return hit;
    }

    let mut out: Vec<EvidenceSnippet> = Vec::with_capacity(k);
    let mut seen = std::collections::HashSet::new();

    for query in [question, answer] {
        if out.len() >= k {
            break;
        }
        if query.trim().is_empty() {
            continue;
        }
        let titles = match searcher.search_titles(query, RESULTS_PER_QUERY).await {
            Ok(titles) => titles,
            Err(err) => {
                tracing::warn!(%err, query, "title search failed");
                continue;
            }
        };
        for title in titles {
            if out.len() >= k {
                break;
            }
            let text = match searcher.summary(&title).await {
                Ok(text) => collapse_ws(&text),
                Err(err) => {
                    tracing::warn!(%err, title, "summary fetch failed");
                    continue;
                }
            };
            if text.is_empty() {
                continue;
            }
            let key = normalize(&text);
            if !seen.insert(key) {
                continue;
            }
            out.push(EvidenceSnippet {
                source: "wikipedia".to_string(),
                title,
                text,
            });
        }
    }

    out.truncate(k);
    cache.put(question, answer, k, out.clone());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSearch {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Searcher for FakeSearch {
        async fn search_titles(&self, query: &str, _n: usize) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![format!("{query} A"), format!("{query} B")])
        }

        async fn summary(&self, title: &str) -> Result<String> {
            Ok(format!("Summary   of {title}."))
        }
    }

    struct DupSearch;

    #[async_trait::async_trait]
    impl Searcher for DupSearch {
        async fn search_titles(&self, _query: &str, _n: usize) -> Result<Vec<String>> {
            Ok(vec!["Same".into(), "Same (disambiguation)".into()])
        }

        async fn summary(&self, _title: &str) -> Result<String> {
            Ok("Identical text.".into())
        }
    }

    struct FailingSearch;

    #[async_trait::async_trait]
    impl Searcher for FailingSearch {
        async fn search_titles(&self, _query: &str, _n: usize) -> Result<Vec<String>> {
            anyhow::bail!("offline")
        }

        async fn summary(&self, _title: &str) -> Result<String> {
            anyhow::bail!("offline")
        }
    }

    #[tokio::test]
    async fn retrieves_dedupes_and_truncates() {
        let cache = EvidenceCache::new();
        let search = FakeSearch { calls: AtomicUsize::new(0) };
        let out = retrieve_evidence(&search, &cache, "q", "a", 3).await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].text, "Summary of q A.");
        assert_eq!(out[0].source, "wikipedia");
    }

    #[tokio::test]
    async fn duplicate_texts_collapse() {
        let cache = EvidenceCache::new();
        let out = retrieve_evidence(&DupSearch, &cache, "q", "a", 4).await;
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn cache_hit_skips_search() {
        let cache = EvidenceCache::new();
        let search = FakeSearch { calls: AtomicUsize::new(0) };
        let first = retrieve_evidence(&search, &cache, "q", "a", 2).await;
        let calls_after_first = search.calls.load(Ordering::SeqCst);
        let second = retrieve_evidence(&search, &cache, "q", "a", 2).await;
        assert_eq!(first, second);
        assert_eq!(search.calls.load(Ordering::SeqCst), calls_after_first);
    }

    #[tokio::test]
    async fn search_failure_degrades_to_empty() {
        let cache = EvidenceCache::new();
        let out = retrieve_evidence(&FailingSearch, &cache, "q", "a", 3).await;
        assert!(out.is_empty());
        // the empty result is memoized like any other
        assert_eq!(cache.get("q", "a", 3), Some(vec![]));
    }
}
