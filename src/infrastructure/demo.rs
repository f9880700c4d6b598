use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use color_eyre::eyre::Result;
use futures::StreamExt;
use tracing::{info, warn};

use crate::{
    controller::PageableController,
    infrastructure::{config::Config, source::InMemorySource},
    model::{PageableStatus, PageableView},
};

/// Consecutive manual retries before the demo gives up on a failing page
pub const MAX_MANUAL_RETRIES: u32 = 3;

pub type DemoView = PageableView<u32, u32>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoSummary {
    pub status: PageableStatus,
    pub pages: usize,
    pub items: usize,
    pub fetch_calls: u32,
    pub retries: u32,
}

/// Page through the in-memory source until the list is complete or a page
/// keeps failing, handing every published view to `on_view`
pub async fn run<F>(config: &Config, mut on_view: F) -> Result<DemoSummary>
where
    F: FnMut(&DemoView) + Send + 'static,
{
    let source = Arc::new(InMemorySource::new(
        &config.source,
        config.controller.page_size,
    ));
    let retries = Arc::new(AtomicU32::new(0));

    let fetch_source = Arc::clone(&source);
    let retry_counter = Arc::clone(&retries);
    let controller: PageableController<u32, u32> = PageableController::builder()
        .options(&config.controller)
        .fetch_page(move |page| {
            let source = Arc::clone(&fetch_source);
            async move { source.fetch(page).await }
        })
        .first_page_key(0)
        .next_page_key_generator(|page, _, _| Some(page + 1))
        .on_retry(move |attempt, error, delay| {
            retry_counter.fetch_add(1, Ordering::SeqCst);
            warn!("Fetch attempt {attempt} failed, retrying in {delay:?}: {error}");
        })
        .build()?;

    let mut views = controller.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(view) = views.next().await {
            on_view(&view);
        }
    });

    controller.fetch_first_page().await;
    let mut manual_retries = 0;
    loop {
        let status = controller.status();
        match status {
            PageableStatus::LoadedPage => {
                manual_retries = 0;
                controller.fetch_next_page().await;
            }
            PageableStatus::FirstPageError | PageableStatus::NewPageError
                if manual_retries < MAX_MANUAL_RETRIES =>
            {
                manual_retries += 1;
                if let Some(error) = controller.error() {
                    warn!("{status}: {error}; retrying ({manual_retries}/{MAX_MANUAL_RETRIES})");
                }
                controller.retry().await;
            }
            // a trigger was swallowed by a fetch still settling
            status if status.is_loading() => tokio::time::sleep(Duration::from_millis(10)).await,
            _ => break,
        }
    }

    let view = controller.pageable();
    let summary = DemoSummary {
        status: view.status(),
        pages: view.pages().len(),
        items: view.item_count(),
        fetch_calls: source.calls(),
        retries: retries.load(Ordering::SeqCst),
    };
    info!(?summary, "Demo finished");

    controller.dispose();
    printer.await?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;

    fn config(total_items: u32, page_size: usize, fail_every: Option<u32>) -> Config {
        let mut config = Config::default();
        config.controller.page_size = page_size;
        config.controller.debounce_ms = 0;
        config.source.total_items = total_items;
        config.source.latency_ms = 5;
        config.source.fail_every = fail_every;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_pages_until_completed() -> Result<()> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let summary = run(&config(25, 10, None), move |view| {
            sink.lock().expect("sink").push(view.status());
        })
        .await?;

        assert_eq!(summary.status, PageableStatus::Completed);
        assert_eq!(summary.pages, 3);
        assert_eq!(summary.items, 25);
        assert_eq!(summary.fetch_calls, 3);

        let seen = seen.lock().expect("sink");
        assert_eq!(seen.first(), Some(&PageableStatus::Initial));
        assert_eq!(seen.last(), Some(&PageableStatus::Completed));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_exact_multiple_ends_on_empty_page() -> Result<()> {
        let summary = run(&config(20, 10, None), |_| {}).await?;
        assert_eq!(summary.status, PageableStatus::Completed);
        assert_eq!(summary.items, 20);
        assert_eq!(summary.fetch_calls, 3);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_source() -> Result<()> {
        let summary = run(&config(0, 10, None), |_| {}).await?;
        assert_eq!(summary.status, PageableStatus::NoItemsFound);
        assert_eq!(summary.items, 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_from_injected_failures() -> Result<()> {
        let summary = run(&config(25, 10, Some(2)), |_| {}).await?;
        assert_eq!(summary.status, PageableStatus::Completed);
        assert_eq!(summary.items, 25);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_retries_are_counted() -> Result<()> {
        let mut config = config(5, 10, Some(1));
        config.controller.max_retries = 1;
        let summary = run(&config, |_| {}).await?;

        assert_eq!(summary.status, PageableStatus::FirstPageError);
        // 1 initial fetch + MAX_MANUAL_RETRIES retries, each attempted twice
        assert_eq!(summary.fetch_calls, 2 * (1 + MAX_MANUAL_RETRIES));
        assert_eq!(summary.retries, 1 + MAX_MANUAL_RETRIES);
        Ok(())
    }
}
