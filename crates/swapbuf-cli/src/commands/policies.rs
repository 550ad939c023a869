//! Dump policy listing command.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use swapbuf_core::monitor::SystemMemoryMonitor;
use swapbuf_core::policy::PolicyRegistry;

use crate::OutputFormat;
use crate::output::{self, Format};

/// Policy information output.
#[derive(Serialize)]
struct PolicyOutput {
    name: &'static str,
    description: &'static str,
    params: Vec<ParamOutput>,
}

/// Parameter with its default value.
#[derive(Serialize)]
struct ParamOutput {
    name: &'static str,
    default: String,
}

/// Run the policies command.
pub fn run(format: OutputFormat, quiet: bool) -> Result<()> {
    let registry = PolicyRegistry::new(Arc::new(SystemMemoryMonitor::new()));

    let policies: Vec<PolicyOutput> = registry
        .descriptors()
        .filter_map(|descriptor| {
            let policy = registry.create(descriptor.name)?;
            let params = policy
                .param_names()
                .iter()
                .map(|&name| ParamOutput {
                    name,
                    default: policy.param(name).unwrap_or_default(),
                })
                .collect();
            Some(PolicyOutput {
                name: descriptor.name,
                description: descriptor.description,
                params,
            })
        })
        .collect();

    let fmt: Format = format.into();
    match fmt {
        Format::Json => output::print_json(&policies, quiet)?,
        Format::Table => {
            if quiet {
                return Ok(());
            }
            let mut table = output::create_table();
            output::add_header(&mut table, &["Policy", "Description", "Parameters"]);
            for policy in &policies {
                let params = if policy.params.is_empty() {
                    "-".to_string()
                } else {
                    policy
                        .params
                        .iter()
                        .map(|p| format!("{}={}", p.name, p.default))
                        .collect::<Vec<_>>()
                        .join("\n")
                };
                table.add_row(vec![policy.name, policy.description, params.as_str()]);
            }
            println!("{table}");
        }
    }

    Ok(())
}
