use crate::output::{print_json, print_table};
use clap::Subcommand;
use std::path::Path;
use wxrelay_core::types::JobKind;

use super::with_relay;

#[derive(Subcommand)]
pub enum CacheSubcommand {
    /// Show the kill switch and every cached entry
    Show,

    /// Remove every cached entry of one job (the kill switch is kept)
    Clear { job: JobKind },
}

pub fn run(path: &Path, subcmd: CacheSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        CacheSubcommand::Show => show(path, json),
        CacheSubcommand::Clear { job } => clear(path, job, json),
    }
}

fn show(path: &Path, json: bool) -> anyhow::Result<()> {
    let snapshot = with_relay(path, |relay| async move { Ok(relay.cache_snapshot().await?) })?;

    if json {
        return print_json(&snapshot);
    }

    println!(
        "Execution: {}",
        if snapshot.execution_disabled {
            "disabled"
        } else {
            "enabled"
        }
    );
    if snapshot.entries.is_empty() {
        println!("No cache entries.");
    } else {
        let rows = snapshot
            .entries
            .iter()
            .map(|e| {
                vec![
                    e.job.to_string(),
                    e.key.clone(),
                    e.record.payload.title.clone(),
                    e.record.active_time.clone().unwrap_or_default(),
                ]
            })
            .collect();
        print_table(&["JOB", "KEY", "TITLE", "ACTIVE"], rows);
    }
    for key in &snapshot.unreadable {
        println!("[warning] unreadable entry: {key}");
    }
    Ok(())
}

fn clear(path: &Path, job: JobKind, json: bool) -> anyhow::Result<()> {
    let removed = with_relay(path, |relay| async move { Ok(relay.clear(job).await?) })?;

    if json {
        print_json(&serde_json::json!({ "job": job, "removed": removed }))?;
    } else {
        println!("Cleared {removed} {job} cache entries.");
    }
    Ok(())
}
