use std::{
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use color_eyre::eyre::{bail, Result};
use tracing::debug;

use crate::infrastructure::config::SourceConfig;

/// Numbered items served page by page, with optional latency and injected
/// failures
#[derive(Debug)]
pub struct InMemorySource {
    total_items: u32,
    page_size: u32,
    latency: Duration,
    fail_every: Option<u32>,
    calls: AtomicU32,
}

impl InMemorySource {
    pub fn new(config: &SourceConfig, page_size: usize) -> Self {
        Self {
            total_items: config.total_items,
            page_size: u32::try_from(page_size).unwrap_or(u32::MAX),
            latency: Duration::from_millis(config.latency_ms),
            fail_every: config.fail_every.filter(|n| *n > 0),
            calls: AtomicU32::new(0),
        }
    }

    /// Items of the zero-based `page`; past the end the page is empty
    pub async fn fetch(&self, page: u32) -> Result<Vec<u32>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail_every.is_some_and(|n| call % n == 0) {
            bail!("injected failure on call {call} (page {page})");
        }

        let start = page.saturating_mul(self.page_size);
        let end = start.saturating_add(self.page_size).min(self.total_items);
        let items: Vec<u32> = (start..end).map(|n| n + 1).collect();
        debug!(page, count = items.len(), "Served page");
        Ok(items)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::*;

    use super::*;

    fn source(total_items: u32, fail_every: Option<u32>) -> InMemorySource {
        let config = SourceConfig {
            total_items,
            latency_ms: 0,
            fail_every,
        };
        InMemorySource::new(&config, 3)
    }

    #[rstest]
    #[case(0, vec![1, 2, 3])]
    #[case(2, vec![7])]
    #[case(3, vec![])]
    #[tokio::test]
    async fn test_pages(#[case] page: u32, #[case] expected: Vec<u32>) -> Result<()> {
        assert_eq!(source(7, None).fetch(page).await?, expected);
        Ok(())
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let source = source(7, Some(2));
        assert!(source.fetch(0).await.is_ok());
        assert!(source.fetch(0).await.is_err());
        assert!(source.fetch(0).await.is_ok());
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_zero_fail_every_never_fails() {
        let source = source(7, Some(0));
        for _ in 0..5 {
            assert!(source.fetch(0).await.is_ok());
        }
    }
}
