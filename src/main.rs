//! Grid health simulator entry point — CLI wiring and demo tick loop.

use std::path::Path;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use voltage_sim::config::ScenarioConfig;
use voltage_sim::grid::GridStore;
use voltage_sim::io::export::{SnapshotRow, export_csv};

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    seed_override: Option<u64>,
    city: String,
    ticks: u32,
    snapshots_out: Option<String>,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    port: u16,
}

fn print_help() {
    eprintln!("voltage-sim — Barangay-scale grid health simulator");
    eprintln!();
    eprintln!("Usage: voltage-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!("  --preset <name>          Use a built-in preset (baseline)");
    eprintln!("  --seed <u64>             Override random seed");
    eprintln!("  --city <name>            City to simulate (default: Quezon City)");
    eprintln!("  --ticks <u32>            Demo ticks to run (default: 10)");
    eprintln!("  --snapshots-out <path>   Export per-tick transformer snapshots to CSV");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Start REST API server after the demo run");
        eprintln!("  --port <u16>             API server port (default: 3000)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        seed_override: None,
        city: "Quezon City".to_string(),
        ticks: 10,
        snapshots_out: None,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        port: 3000,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --scenario requires a path argument");
                    process::exit(1);
                }
                cli.scenario_path = Some(args[i].clone());
            }
            "--preset" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --preset requires a name argument");
                    process::exit(1);
                }
                cli.preset = Some(args[i].clone());
            }
            "--seed" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --seed requires a u64 argument");
                    process::exit(1);
                }
                if let Ok(s) = args[i].parse::<u64>() {
                    cli.seed_override = Some(s);
                } else {
                    eprintln!("error: --seed value \"{}\" is not a valid u64", args[i]);
                    process::exit(1);
                }
            }
            "--city" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --city requires a name argument");
                    process::exit(1);
                }
                cli.city = args[i].clone();
            }
            "--ticks" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --ticks requires a u32 argument");
                    process::exit(1);
                }
                if let Ok(t) = args[i].parse::<u32>() {
                    cli.ticks = t;
                } else {
                    eprintln!("error: --ticks value \"{}\" is not a valid u32", args[i]);
                    process::exit(1);
                }
            }
            "--snapshots-out" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --snapshots-out requires a path argument");
                    process::exit(1);
                }
                cli.snapshots_out = Some(args[i].clone());
            }
            #[cfg(feature = "api")]
            "--serve" => {
                cli.serve = true;
            }
            #[cfg(feature = "api")]
            "--port" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --port requires a u16 argument");
                    process::exit(1);
                }
                if let Ok(p) = args[i].parse::<u16>() {
                    cli.port = p;
                } else {
                    eprintln!("error: --port value \"{}\" is not a valid u16", args[i]);
                    process::exit(1);
                }
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn main() {
    let cli = parse_args();

    // Load config: --scenario takes priority, then --preset, then baseline default
    let mut scenario = if let Some(ref path) = cli.scenario_path {
        match ScenarioConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else if let Some(ref name) = cli.preset {
        match ScenarioConfig::from_preset(name) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        ScenarioConfig::baseline()
    };

    // Apply seed override
    if let Some(seed) = cli.seed_override {
        scenario.simulation.seed = seed;
    }

    // Validate
    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let bucket = scenario.simulation.tick_bucket_seconds;
    let store = GridStore::new(scenario);

    // Demo run: one tick per bucket starting now
    let start = unix_now();
    let mut payloads = Vec::with_capacity(cli.ticks as usize);
    for tick in 0..cli.ticks {
        let now = start + i64::from(tick) * bucket;
        match store.tick_and_read(&cli.city, now) {
            Ok(data) => {
                println!("{}", data.summary);
                for alert in &data.alerts {
                    println!(
                        "  ALERT {}: {} (risk {:.2}, {}h ahead)",
                        alert.alert_type,
                        alert.recommended_action,
                        alert.risk_ratio,
                        alert.hours_ahead
                    );
                }
                payloads.push((now, data));
            }
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(1);
            }
        }
    }

    // Export CSV if requested
    if let Some(ref path) = cli.snapshots_out {
        let rows: Vec<SnapshotRow<'_>> = payloads
            .iter()
            .flat_map(|(ts, data)| data.transformers.iter().map(move |s| (*ts, s)))
            .collect();
        if let Err(e) = export_csv(&rows, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Snapshots written to {path}");
    }

    // Start API server if requested
    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let state = Arc::new(voltage_sim::api::AppState { store });
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
            eprintln!("error: failed to create tokio runtime: {e}");
            process::exit(1);
        });
        rt.block_on(voltage_sim::api::serve(state, addr));
    }
}
