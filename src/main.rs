//! RuVector Scheduler - process profiling and advisory core placement daemon

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ruvector_sched::platform::{self, ComputeUnitSource, HostProbe};
use ruvector_sched::{Classifier, HostProbes, SchedulerConfig, SchedulerCore};

/// Pause between the two passes of `report`, so CPU usage has a window.
const REPORT_SAMPLE_GAP: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "ruvector-sched")]
#[command(about = "Process profiling, anomaly scoring and advisory core placement", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config dir when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler daemon until Ctrl-C / SIGTERM
    Run {
        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// Sample the host twice and print a report
    Report {
        #[arg(long)]
        json: bool,
    },

    /// Classify a process name
    Classify {
        name: String,

        #[arg(long, default_value = "100000")]
        pid: u32,
    },

    /// Show detected compute units
    Units,

    /// Show effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = SchedulerConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { duration } => {
            if !platform::is_elevated() {
                warn!("Not running as root; IO counters of other users' processes read as zero");
            }

            let core = SchedulerCore::new(config, &mut HostProbe::new())?;
            core.start(HostProbes::host()).await?;

            match duration {
                Some(secs) => {
                    info!("Running for {}s", secs);
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                        _ = shutdown_signal() => {}
                    }
                }
                None => shutdown_signal().await,
            }

            core.shutdown().await;
            println!("{}", core.report());
        }

        Commands::Report { json } => {
            let core = SchedulerCore::new(config, &mut HostProbe::new())?;
            let mut probes = HostProbes::host();
            core.scan_once(&mut probes);
            tokio::time::sleep(REPORT_SAMPLE_GAP).await;
            core.scan_once(&mut probes);

            let report = core.report();
            if json {
                println!("{}", report.to_json()?);
            } else {
                println!("{}", report);
            }
        }

        Commands::Classify { name, pid } => {
            let classifier = Classifier::new(config.classifier.clone());
            let class = classifier.classify(&name, pid);
            println!("{} (pid {}): {}", name, pid, class);
            if class.is_protected() {
                println!("  protected: yes");
            }
        }

        Commands::Units => {
            let mut probe = HostProbe::new();
            let categories = probe.enumerate_units()?;
            println!("Compute units: {}", categories.len());
            for (id, category) in categories.iter().enumerate() {
                println!("  unit {:>3}  {}", id, category);
            }
        }

        Commands::Config => {
            println!("Config file: {}", SchedulerConfig::default_path().display());
            println!("Env overrides: {}", SchedulerConfig::ENV_OVERRIDES.join(", "));
            println!();
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
                    _ = term.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl-C");
    }
}
