use crate::output::print_json;
use std::path::Path;
use wxrelay_core::types::JobKind;
use wxrelay_core::CycleStatus;

use super::with_relay;

pub fn run(path: &Path, job: JobKind, json: bool) -> anyhow::Result<()> {
    let report = with_relay(path, |relay| async move { Ok(relay.run(job).await?) })?;

    if json {
        print_json(&report)?;
    } else {
        println!("{}", report.message);
        if report.status != CycleStatus::Disabled {
            println!(
                "committed: {}  rollbacks: {}  skipped: {}  delivery failures: {}",
                report.committed, report.rollbacks, report.skipped, report.delivery_failures
            );
        }
    }

    if report.status == CycleStatus::Aborted {
        anyhow::bail!("{job} cycle aborted");
    }
    Ok(())
}
