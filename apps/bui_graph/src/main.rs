use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{debug, error, info, warn};

use bui_core::{PanelGroup, ShowModel};
use bui_log::{LogConfig, init_logging, parse_level};
use bui_schema::{PanelGroupConfig, Validatable};

const VERSION: &str = "0.1.0";

/// BridgeUI panel group tool
#[derive(Parser, Debug)]
#[command(name = "bui_graph")]
#[command(version = VERSION)]
#[command(about = "Inspect, validate and merge BridgeUI panel group files", long_about = None)]
struct Args {
    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Also write logs to bui_graph.log in the current directory
    #[arg(long, env = "BUI_LOG_FILE", global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a group file and open every route once
    Check {
        config: PathBuf,
        /// Fail on consistency findings, not only on load errors
        #[arg(long)]
        strict: bool,
    },
    /// List the routes of a group
    Routes {
        config: PathBuf,
        /// Only routes opened by this panel; an empty name lists system routes
        #[arg(long)]
        from: Option<String>,
    },
    /// Merge an exported graph into a group file
    Merge {
        config: PathBuf,
        /// Exported group to merge in
        #[arg(long = "from")]
        export: PathBuf,
        /// Where to write the result, defaults to overwriting `config`
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the JSON Schema of group files
    Schema,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Logging is not up yet, so early failures go to stderr
    let level = match parse_level(&args.log_level) {
        Some(level) => level,
        None => {
            eprintln!("Warning: Invalid log level '{}', using WARN", args.log_level);
            tracing::Level::WARN
        }
    };

    let log_config = if args.log_file {
        match std::fs::File::create("bui_graph.log") {
            Ok(file) => LogConfig::new("bui_graph::").with_level(level).with_log_file(file),
            Err(e) => {
                eprintln!("Unable to create bui_graph.log: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        LogConfig::<std::fs::File>::new("bui_graph::").with_level(level)
    };

    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    debug!("bui_graph v{}", VERSION);

    let ok = match args.command {
        Command::Check { config, strict } => check(&config, strict),
        Command::Routes { config, from } => routes(&config, from.as_deref()),
        Command::Merge { config, export, out } => merge(&config, &export, out.as_deref()),
        Command::Schema => schema(),
    };

    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn load(path: &Path) -> Option<PanelGroupConfig> {
    match PanelGroupConfig::from_json_file(path) {
        Ok(config) => {
            info!("Loaded '{}' from {}", config.name, path.display());
            Some(config)
        }
        Err(e) => {
            error!("Failed to load group from '{}': {}", path.display(), e);
            None
        }
    }
}

fn check(path: &Path, strict: bool) -> bool {
    let Some(config) = load(path) else {
        return false;
    };

    let issues = config.issues();
    for issue in &issues {
        println!("issue: {}", issue);
    }

    let failures = open_all_routes(&config);
    println!(
        "{}: {} panels, {} routes, {} issues, {} routes failed to open",
        config.name,
        config.nodes.len(),
        config.bridges.len(),
        issues.len(),
        failures
    );

    failures == 0 && !(strict && !issues.is_empty())
}

/// Open every configured route on a scratch group, then tear it down
fn open_all_routes(config: &PanelGroupConfig) -> usize {
    let mut group = PanelGroup::new(config.clone());
    let mut failures = 0;

    for route in &config.bridges {
        let from = if route.is_from_system() {
            None
        } else {
            match group.open(None, &route.in_node, None) {
                Ok((id, _)) => Some(id),
                Err(e) => {
                    warn!("Route {}: {}", route, e);
                    failures += 1;
                    continue;
                }
            }
        };

        match group.open(from, &route.out_node, None) {
            Ok((id, bridge)) if bridge.show_model() == route.show_model => {
                debug!("Route {} opened {}", route, id);
            }
            Ok((_, bridge)) => {
                warn!("Route {} resolved as {}", route, bridge.info());
                failures += 1;
            }
            Err(e) => {
                warn!("Route {}: {}", route, e);
                failures += 1;
            }
        }
    }

    let open: Vec<_> = group.registry().ids().collect();
    for id in open {
        group.destroy(id);
    }
    group.tick(Duration::ZERO);
    failures
}

fn routes(path: &Path, from: Option<&str>) -> bool {
    let Some(config) = load(path) else {
        return false;
    };

    let listed: Vec<_> = match from {
        Some(name) => config.routes_from(name).collect(),
        None => config.bridges.iter().collect(),
    };
    for route in &listed {
        let marker = if route.show_model == ShowModel::Replace { " *" } else { "" };
        println!("{}{}", route, marker);
    }
    info!("{} routes", listed.len());
    true
}

fn merge(path: &Path, export: &Path, out: Option<&Path>) -> bool {
    let (Some(mut config), Some(incoming)) = (load(path), load(export)) else {
        return false;
    };
    if incoming.name != config.name {
        warn!("Merging group '{}' into '{}'", incoming.name, config.name);
    }

    let (bridges, nodes) = config.merge(incoming);
    let target = out.unwrap_or(path);

    let json = match serde_json::to_string_pretty(&config) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize merged group: {}", e);
            return false;
        }
    };
    if let Err(e) = std::fs::write(target, json) {
        error!("Failed to write '{}': {}", target.display(), e);
        return false;
    }

    println!(
        "{}: {} routes and {} panels added, written to {}",
        config.name,
        bridges,
        nodes,
        target.display()
    );
    true
}

fn schema() -> bool {
    match PanelGroupConfig::schema_json() {
        Ok(json) => {
            println!("{}", json);
            true
        }
        Err(e) => {
            error!("Failed to generate schema: {}", e);
            false
        }
    }
}
