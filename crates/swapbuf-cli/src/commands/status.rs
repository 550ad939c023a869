//! Dump folder status command.

use anyhow::Result;
use comfy_table::{Cell, Color};
use serde::Serialize;
use swapbuf_core::storage::{TempFolder, TempFolderEntry};

use crate::output::{self, Format};
use crate::{FolderArgs, OutputFormat};

/// Dump folder listing output.
#[derive(Serialize)]
struct StatusOutput {
    root: String,
    folders: Vec<TempFolderEntry>,
    stale_count: usize,
    total_bytes: u64,
}

/// Short owner state for table display.
fn owner_state(entry: &TempFolderEntry) -> (&'static str, Color) {
    if entry.is_current {
        ("current", Color::Cyan)
    } else if entry.pid.is_none() {
        ("unknown", Color::Yellow)
    } else if entry.alive {
        ("alive", Color::Green)
    } else {
        ("stale", Color::Red)
    }
}

/// Run the status command.
pub fn run(folders: &FolderArgs, format: OutputFormat, quiet: bool) -> Result<()> {
    let root = super::temp_root(folders.root.as_ref())?;
    let entries = TempFolder::scan(&root, &folders.prefix)?;

    let output = StatusOutput {
        root: root.display().to_string(),
        stale_count: entries.iter().filter(|e| e.is_stale()).count(),
        total_bytes: entries.iter().map(|e| e.total_bytes).sum(),
        folders: entries,
    };

    let fmt: Format = format.into();
    match fmt {
        Format::Json => output::print_json(&output, quiet)?,
        Format::Table => {
            if quiet {
                return Ok(());
            }
            if output.folders.is_empty() {
                output::status(&format!("No dump folders under {}", output.root), quiet);
                return Ok(());
            }

            let mut table = output::create_table();
            output::add_header(&mut table, &["Folder", "PID", "Owner", "Files", "Size"]);
            for entry in &output.folders {
                let (state, color) = owner_state(entry);
                table.add_row(vec![
                    Cell::new(entry.path.display()),
                    Cell::new(entry.pid.map_or_else(|| "-".to_string(), |p| p.to_string())),
                    Cell::new(state).fg(color),
                    Cell::new(entry.file_count),
                    Cell::new(output::format_bytes(entry.total_bytes)),
                ]);
            }
            println!("{table}");
            println!(
                "\n{} folders, {} stale, {} on disk",
                output.folders.len(),
                output.stale_count,
                output::format_bytes(output.total_bytes)
            );
        }
    }

    Ok(())
}
