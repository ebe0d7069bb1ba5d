// ==========================================================
//  netprint  - device fingerprinting engine
// ==========================================================

use netprint::model::HostDescriptor;
use netprint::table::print_report;
use netprint::{FingerprintConfig, FingerprintEngine, FingerprintError};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!("Usage: netprint [OPTIONS] HOSTS.json");
    println!("Options:");
    println!("  -j, --jobs <N>          hosts fingerprinted at once (default: 16)");
    println!("  -c, --config <FILE>     JSON configuration file");
    println!("  -s, --signatures <FILE> JSON signature definitions replacing the built-in set");
    println!("  -n, --cycles <N>        run the batch N times back to back (default: 1)");
    println!("  -h, --help              show this help message");
}

#[tokio::main]
async fn main() -> Result<(), FingerprintError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("netprint=info")),
        )
        .init();

    let raw_args: Vec<String> = std::env::args().collect();
    let mut args = raw_args.iter().skip(1);

    let mut jobs = None;
    let mut config_path = None;
    let mut signatures_path = None;
    let mut cycles = 1usize;
    let mut positional = None;

    // Parse command line arguments
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--jobs" | "-j" => jobs = args.next().and_then(|s| s.parse().ok()),
            "--config" | "-c" => config_path = args.next().map(PathBuf::from),
            "--signatures" | "-s" => signatures_path = args.next().map(PathBuf::from),
            "--cycles" | "-n" => {
                cycles = args.next().and_then(|s| s.parse().ok()).unwrap_or(1).max(1)
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            _ => positional = Some(PathBuf::from(arg)),
        }
    }

    let Some(hosts_path) = positional else {
        print_usage();
        return Err(FingerprintError::Other("No host batch specified".to_string()));
    };

    // File, then environment, then flags
    let mut config = match config_path {
        Some(ref path) => FingerprintConfig::from_file(path)?,
        None => FingerprintConfig::default(),
    }
    .apply_env();
    if let Some(path) = signatures_path {
        config.signatures_path = Some(path);
    }

    let raw = std::fs::read_to_string(&hosts_path)?;
    let hosts: Vec<HostDescriptor> = serde_json::from_str(&raw)
        .map_err(|e| FingerprintError::Other(format!("{}: {}", hosts_path.display(), e)))?;

    let mut engine = FingerprintEngine::new(config)?;
    if let Some(j) = jobs {
        engine.set_concurrency(j);
    }

    info!(
        hosts = hosts.len(),
        cycles,
        signatures = engine.store().len(),
        "starting fingerprint run"
    );

    for cycle in 1..=cycles {
        if cycles > 1 {
            println!("\nCycle {}/{}", cycle, cycles);
        }
        let report = engine.run_batch(hosts.clone()).await;
        print_report(&report);
    }

    Ok(())
}
