use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;

use crate::entail::{EntailScores, EntailmentScorer};
use crate::llm::Generator;
use crate::search::Searcher;

/// Closure-driven generator fake.
pub struct FakeGenerator {
    pub handler: Box<dyn Fn(&str) -> String + Send + Sync>,
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(&self, question: &str) -> Result<String> {
        Ok((self.handler)(question))
    }
}

/// Searcher fake backed by a fixed (title, summary) corpus; every query
/// matches every page, in order.
pub struct FakeSearcher {
    pub pages: Vec<(String, String)>,
}

impl FakeSearcher {
    pub fn single(title: &str, text: &str) -> Self {
        Self { pages: vec![(title.to_string(), text.to_string())] }
    }
}

#[async_trait]
impl Searcher for FakeSearcher {
    async fn search_titles(&self, _query: &str, n: usize) -> Result<Vec<String>> {
        Ok(self.pages.iter().take(n).map(|(t, _)| t.clone()).collect())
    }

    async fn summary(&self, title: &str) -> Result<String> {
        Ok(self
            .pages
            .iter()
            .find(|(t, _)| t == title)
            .map(|(_, text)| text.clone())
            .unwrap_or_default())
    }
}

/// Closure-driven scorer fake that also counts invocations, so tests can
/// assert the span fast path skipped it.
pub struct FakeScorer {
    pub handler: Box<dyn Fn(&str, &str) -> EntailScores + Send + Sync>,
    pub calls: AtomicUsize,
}

impl FakeScorer {
    pub fn new(handler: impl Fn(&str, &str) -> EntailScores + Send + Sync + 'static) -> Self {
        Self { handler: Box::new(handler), calls: AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntailmentScorer for FakeScorer {
    async fn score(&self, premise: &str, hypothesis: &str) -> Result<EntailScores> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.handler)(premise, hypothesis))
    }
}
