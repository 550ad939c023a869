//! Stale dump folder sweep command.

use anyhow::Result;
use serde::Serialize;
use swapbuf_core::storage::TempFolder;

use crate::output::{self, Format};
use crate::{FolderArgs, OutputFormat};

/// Sweep result output.
#[derive(Serialize)]
struct SweepOutput {
    dry_run: bool,
    folders: Vec<String>,
    reclaimed_bytes: u64,
}

/// Run the sweep command.
pub fn run(folders: &FolderArgs, dry_run: bool, format: OutputFormat, quiet: bool) -> Result<()> {
    let root = super::temp_root(folders.root.as_ref())?;
    let stale: Vec<_> = TempFolder::scan(&root, &folders.prefix)?
        .into_iter()
        .filter(|entry| entry.is_stale())
        .collect();
    let reclaimed_bytes = stale.iter().map(|e| e.total_bytes).sum();

    let removed = if dry_run {
        output::status("Dry run - no folders will be removed", quiet);
        stale.iter().map(|e| e.path.clone()).collect()
    } else {
        TempFolder::sweep_stale(&root, &folders.prefix)?
    };

    let output = SweepOutput {
        dry_run,
        folders: removed.iter().map(|p| p.display().to_string()).collect(),
        reclaimed_bytes,
    };

    let fmt: Format = format.into();
    match fmt {
        Format::Json => output::print_json(&output, quiet)?,
        Format::Table => {
            if output.folders.is_empty() {
                output::status("No stale dump folders found", quiet);
                return Ok(());
            }
            if !quiet {
                let mut table = output::create_table();
                output::add_header(&mut table, &["Folder"]);
                for folder in &output.folders {
                    table.add_row(vec![folder]);
                }
                println!("{table}");
            }
            let verb = if dry_run { "Would remove" } else { "Removed" };
            output::success(
                &format!(
                    "{} {} folders ({})",
                    verb,
                    output.folders.len(),
                    output::format_bytes(reclaimed_bytes)
                ),
                quiet,
            );
        }
    }

    Ok(())
}
