//! System memory command.

use anyhow::{Result, bail};
use swapbuf_core::monitor::MemInfo;

use crate::OutputFormat;
use crate::output::{self, Format};

/// Run the meminfo command.
pub fn run(format: OutputFormat, quiet: bool) -> Result<()> {
    let Some(info) = MemInfo::read_system() else {
        bail!("system memory figures are not available on this platform");
    };

    let fmt: Format = format.into();
    match fmt {
        Format::Json => output::print_json(&info, quiet)?,
        Format::Table => {
            let optional = |v: Option<u64>| v.map_or_else(|| "n/a".to_string(), output::format_bytes);
            let items = vec![
                ("Total", output::format_bytes(info.total)),
                ("Free", output::format_bytes(info.free)),
                ("Available", optional(info.available)),
                ("Usable by policies", output::format_bytes(info.usable())),
                ("Buffers", output::format_bytes(info.buffers)),
                ("Cached", output::format_bytes(info.cached)),
                ("Swap Total", output::format_bytes(info.swap_total)),
                ("Swap Free", output::format_bytes(info.swap_free)),
            ];
            output::print_key_value_table(&items, fmt, quiet)?;
        }
    }

    Ok(())
}
