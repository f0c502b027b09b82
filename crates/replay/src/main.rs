mod report;
mod script;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let json = args.iter().any(|arg| arg == "--json");
    let Some(path) = args.iter().skip(1).find(|arg| !arg.starts_with("--")) else {
        eprintln!("Usage: childtrack-replay <script.json> [--json]");
        std::process::exit(1);
    };

    let path = PathBuf::from(path);
    let data = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let script = script::Script::from_json(&data)
        .with_context(|| format!("invalid script {}", path.display()))?;

    log::info!(
        "replaying {} steps from {}",
        script.steps.len(),
        path.display()
    );
    let harness = script::run(&script)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    report::write_report(&mut out, &harness, json)?;
    out.flush()?;
    Ok(())
}
