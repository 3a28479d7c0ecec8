use anyhow::{Context, Result};
use pwkeep_core::{AppLayout, Bootstrap, Console};

use crate::output::metadata_table;

/// First run: choose the root password and create key, metadata and store.
pub fn execute<C: Console>(layout: &AppLayout, console: &mut C) -> Result<()> {
    let mut bootstrap = Bootstrap::new(layout.clone());
    let metadata = bootstrap
        .run(console)
        .with_context(|| format!("Failed to initialize pwkeep in {}", layout.home().display()))?;

    console.write_line("initialization complete")?;
    console.write_line(&metadata_table(&metadata).to_string())?;
    console.write_line(&format!(
        "keep a backup of {}, the store cannot be opened without it",
        metadata.key_location.display()
    ))?;
    Ok(())
}
