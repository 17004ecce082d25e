use crate::output::print_json;
use std::path::Path;

use super::with_relay;

pub fn run(path: &Path, enable: bool, json: bool) -> anyhow::Result<()> {
    with_relay(path, |relay| async move { Ok(relay.set_enabled(enable).await?) })?;

    if json {
        print_json(&serde_json::json!({ "enabled": enable }))?;
    } else if enable {
        println!("Execution enabled");
    } else {
        println!("Execution disabled");
    }
    Ok(())
}
