use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;
pub const DEFAULT_INVISIBLE_ITEMS_THRESHOLD: usize = 3;

/// Plain-data controller settings, loadable from configuration files
///
/// Callbacks (fetcher, key generator, hooks, retry predicates) cannot live
/// here; they are passed to the builder directly.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ControllerOptions {
    pub page_size: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub debounce_ms: u64,
    pub invisible_items_threshold: usize,
    pub show_log: bool,
    pub auto_fetch_first_page: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_retries: 0,
            retry_delay_ms: 0,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            invisible_items_threshold: DEFAULT_INVISIBLE_ITEMS_THRESHOLD,
            show_log: false,
            auto_fetch_first_page: false,
        }
    }
}

impl ControllerOptions {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let options = ControllerOptions::default();
        assert_eq!(options.page_size, 20);
        assert_eq!(options.debounce(), Duration::from_millis(100));
        assert_eq!(options.retry_delay(), Duration::ZERO);
        assert_eq!(options.max_retries, 0);
    }

    #[test]
    fn test_partial_json5_keeps_defaults() -> Result<(), json5::Error> {
        let options: ControllerOptions = json5::from_str(
            r#"{
                // comments are allowed in json5
                page_size: 50,
                max_retries: 2,
                retry_delay_ms: 250,
            }"#,
        )?;
        assert_eq!(
            options,
            ControllerOptions {
                page_size: 50,
                max_retries: 2,
                retry_delay_ms: 250,
                ..ControllerOptions::default()
            }
        );
        Ok(())
    }
}
