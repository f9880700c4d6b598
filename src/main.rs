use clap::Parser;
use color_eyre::eyre::Result;

use pageable::{
    infrastructure::{cli::Cli, config::Config, demo},
    utils::{initialize_logging, initialize_panic_handler},
};

async fn tokio_main() -> Result<()> {
    initialize_logging()?;

    initialize_panic_handler()?;

    let args = <Cli as Parser>::parse();

    // File-based configuration, overridden by CLI flags
    let mut config = Config::new()?;
    args.apply(&mut config);

    let summary = demo::run(&config, |view| {
        let error = view
            .error()
            .map(|error| format!(" error={error}"))
            .unwrap_or_default();
        println!(
            "{:<18} pages={:<3} items={:<4} next={:?}{error}",
            view.status(),
            view.pages().len(),
            view.item_count(),
            view.next_page_key(),
        );
    })
    .await?;

    println!(
        "finished: {} ({} items in {} pages, {} fetch calls, {} retries)",
        summary.status, summary.items, summary.pages, summary.fetch_calls, summary.retries
    );

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = tokio_main().await {
        eprintln!("{} error: Something went wrong", env!("CARGO_PKG_NAME"));
        Err(e)
    } else {
        Ok(())
    }
}
