//! Watch command handler

use anyhow::{Context, Result};

use zettel_core::DirectoryService;

use crate::output::Output;

/// Print index changes until Ctrl-C
pub async fn watch(directory: &DirectoryService, output: &Output) -> Result<()> {
    let printer = *output;
    directory.subscribe(move |change| printer.print_change(change));

    output.message(&format!(
        "Watching {} (Ctrl-C to stop)",
        directory.notes_dir().display()
    ));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    directory.stop();
    Ok(())
}
