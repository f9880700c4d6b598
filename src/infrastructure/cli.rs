use clap::Parser;

use crate::{infrastructure::config::Config, utils::version};

#[derive(Parser, Debug, Default)]
#[command(author, version = version(), about)]
pub struct Cli {
    #[arg(short, long, value_name = "INT", help = "Items per page")]
    pub page_size: Option<usize>,

    #[arg(short, long, value_name = "INT", help = "Items the demo source holds")]
    pub total: Option<u32>,

    #[arg(long, value_name = "INT", help = "Fail every n-th fetch")]
    pub fail_every: Option<u32>,

    #[arg(short = 'r', long, value_name = "INT", help = "Retries per fetch")]
    pub max_retries: Option<u32>,

    #[arg(long, value_name = "MS", help = "Simulated fetch latency")]
    pub latency_ms: Option<u64>,

    #[arg(long, help = "Log every published view")]
    pub show_log: bool,
}

impl Cli {
    /// Override file-based settings with the flags that were given
    pub fn apply(&self, config: &mut Config) {
        if let Some(page_size) = self.page_size {
            config.controller.page_size = page_size;
        }
        if let Some(total) = self.total {
            config.source.total_items = total;
        }
        if self.fail_every.is_some() {
            config.source.fail_every = self.fail_every;
        }
        if let Some(max_retries) = self.max_retries {
            config.controller.max_retries = max_retries;
        }
        if let Some(latency_ms) = self.latency_ms {
            config.source.latency_ms = latency_ms;
        }
        if self.show_log {
            config.controller.show_log = true;
        }
    }
}
