//! Simulated workload command.
//!
//! Creates a fresh buffer manager, fills `--buffers` buffers of `--size`
//! bytes from a pool of worker threads, locks each one `--locks` times, and
//! then reports where every buffer ended up.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use swapbuf_core::buffer::{BufferManager, BufferManagerConfig, BufferObject, BufferStats};
use swapbuf_core::monitor::{FixedMemoryMonitor, MemoryMonitor, SystemMemoryMonitor};

use crate::output::{self, Format};
use crate::{OutputFormat, SimulateArgs};

/// Final state of one buffer.
#[derive(Serialize)]
struct BufferOutput {
    id: u64,
    size: usize,
    loaded: bool,
    lock_count: u32,
    file: Option<String>,
}

/// Simulation result output.
#[derive(Serialize)]
struct SimulationOutput {
    policy: String,
    params: Vec<(String, String)>,
    rejected_params: Vec<String>,
    threads: usize,
    elapsed_ms: u64,
    stats: BufferStats,
    buffers: Vec<BufferOutput>,
}

fn fill_byte(index: usize) -> u8 {
    (index % 251) as u8 + 1
}

/// Run the simulate command.
pub fn run(args: &SimulateArgs, format: OutputFormat, quiet: bool) -> Result<()> {
    let size = usize::try_from(args.size.as_u64()).context("buffer size does not fit in memory")?;

    let mut config = BufferManagerConfig::from_env()?.with_policy(args.policy.clone());
    if let Some(root) = &args.root {
        config = config.with_temp_root(root);
    }
    for (name, value) in &args.params {
        config = config.with_policy_param(name.clone(), value.clone());
    }

    let monitor: Arc<dyn MemoryMonitor> = match args.free_mem {
        Some(free) => Arc::new(FixedMemoryMonitor::new(free.as_u64(), u64::MAX)),
        None => Arc::new(SystemMemoryMonitor::new()),
    };

    // Apply parameters after startup so rejections can be reported
    let params = std::mem::take(&mut config.policy_params);
    let manager = Arc::new(BufferManager::with_monitor(config, monitor)?);
    let rejected = manager.configure_policy(&args.policy, &params)?;

    let mut pool = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = args.threads {
        pool = pool.num_threads(threads);
    }
    let pool = pool.build()?;

    output::status(
        &format!(
            "Simulating {} buffers of {} with policy '{}' on {} threads",
            args.buffers,
            output::format_bytes(args.size.as_u64()),
            manager.policy_name(),
            pool.current_num_threads()
        ),
        quiet,
    );

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new((args.buffers * (args.locks + 1)) as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")?
                .progress_chars("##-"),
        );
        bar
    };

    let objects: Vec<BufferObject> = (0..args.buffers)
        .map(|_| BufferObject::new(Arc::clone(&manager)))
        .collect();

    let started = Instant::now();
    pool.install(|| {
        objects
            .par_iter()
            .enumerate()
            .try_for_each(|(index, object)| -> swapbuf_common::Result<()> {
                let fill = fill_byte(index);
                object.set_buffer(vec![fill; size])?;
                progress.inc(1);

                for _ in 0..args.locks {
                    let lock = object.lock()?;
                    if let Some(first) = lock.bytes_mut().first_mut() {
                        *first = fill;
                    }
                    drop(lock);
                    progress.inc(1);
                }
                Ok(())
            })
    })?;
    let elapsed = started.elapsed();
    progress.finish_and_clear();

    // Every buffer must come back with the content it was given
    for (index, object) in objects.iter().enumerate() {
        let lock = object.lock()?;
        let fill = fill_byte(index);
        if lock.bytes().iter().any(|b| *b != fill) {
            bail!("buffer {} lost its content", object.id());
        }
    }

    let mut buffers: Vec<BufferOutput> = manager
        .buffer_infos()
        .into_iter()
        .map(|(id, info)| BufferOutput {
            id: id.as_u64(),
            size: info.size(),
            loaded: info.is_loaded(),
            lock_count: info.lock_count(),
            file: info.file_path().map(|p| p.display().to_string()),
        })
        .collect();
    buffers.sort_by_key(|b| b.id);

    let output = SimulationOutput {
        policy: manager.policy_name().to_string(),
        params: manager.policy_params(),
        rejected_params: rejected,
        threads: pool.current_num_threads(),
        elapsed_ms: elapsed.as_millis() as u64,
        stats: manager.buffer_stats(),
        buffers,
    };

    let fmt: Format = format.into();
    match fmt {
        Format::Json => output::print_json(&output, quiet)?,
        Format::Table => {
            if quiet {
                return Ok(());
            }
            let mut table = output::create_table();
            output::add_header(&mut table, &["Buffer", "Size", "State", "Locks", "Backing File"]);
            for buffer in &output.buffers {
                let state = if buffer.loaded {
                    Cell::new("loaded").fg(Color::Green)
                } else {
                    Cell::new("dumped").fg(Color::Yellow)
                };
                table.add_row(vec![
                    Cell::new(format!("#{}", buffer.id)),
                    Cell::new(output::format_bytes(buffer.size as u64)),
                    state,
                    Cell::new(buffer.lock_count),
                    Cell::new(buffer.file.as_deref().unwrap_or("-")),
                ]);
            }
            println!("{table}");

            let params = output
                .params
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut items = vec![
                ("Policy", output.policy.clone()),
                ("Parameters", if params.is_empty() { "-".to_string() } else { params }),
                ("Buffers", output.stats.buffer_count.to_string()),
                ("Loaded", output::format_bytes(output.stats.total_loaded)),
                ("Dumped", output::format_bytes(output.stats.total_dumped)),
                ("Dumped Share", format!("{:.1}%", output.stats.dumped_ratio() * 100.0)),
                ("Threads", output.threads.to_string()),
                ("Elapsed", format!("{} ms", output.elapsed_ms)),
            ];
            if !output.rejected_params.is_empty() {
                items.push(("Rejected", output.rejected_params.join(", ")));
            }
            output::print_key_value_table(&items, fmt, quiet)?;
        }
    }

    output::success("Simulation completed", quiet);
    Ok(())
}
