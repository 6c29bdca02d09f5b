use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use wirecheck_config::HarnessConfig;
use wirecheck_engine::Supervisor;
use wirecheck_scenarios::ScenarioLoader;
use wirecheck_telemetry::metrics::MetricsRecorder;

use crate::candidates::BuiltinCandidate;
use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(version, about = "Scripted packet-level conformance tests for network programs")]
pub struct Cli {
    /// Configuration file; replaces config/wirecheck.yaml and its overlays
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario against a built-in candidate
    Run(RunArgs),
    /// Compile scenario sources into cached artifacts
    Compile(CompileArgs),
    /// Load a scenario and list its expectations without running anything
    Check(CheckArgs),
    /// List the scenarios the loader can find
    List,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(short, long)]
    pub scenario: String,

    #[arg(short, long, value_enum, default_value_t = BuiltinCandidate::Idle)]
    pub candidate: BuiltinCandidate,

    /// Override the scenario's own deadline (milliseconds)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Parse the source even when a fresh compiled artifact exists
    #[arg(long)]
    pub no_compiled: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompileArgs {
    pub names: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    pub name: String,
}

pub fn load_config(cli: &Cli) -> Result<HarnessConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::load_from_path(path)?,
        None => HarnessConfig::load()?,
    };
    if let Some(level) = &cli.log_level {
        config.telemetry.log_level = level.clone();
    }
    Ok(config)
}

pub async fn run_command(cli: Cli, config: HarnessConfig) -> Result<(), CliError> {
    let loader = ScenarioLoader::from_config(&config.run);
    match cli.command {
        Commands::Run(args) => run_scenario(args, &config, loader).await,
        Commands::Compile(args) => {
            for path in loader.compile_all(&args.names[..])? {
                println!("compiled {}", path.display());
            }
            Ok(())
        }
        Commands::Check(args) => check_scenario(&args.name, &loader),
        Commands::List => {
            for name in loader.available()? {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

async fn run_scenario(args: RunArgs, config: &HarnessConfig, loader: ScenarioLoader) -> Result<(), CliError> {
    let loader = if args.no_compiled { loader.prefer_source() } else { loader };
    let scenario = loader.load(&args.scenario)?;
    let name = scenario.name().to_string();

    let mut supervisor = Supervisor::new(scenario);
    let deadline = args
        .timeout_ms
        .map(Duration::from_millis)
        .or_else(|| config.run.timeout_override());
    if let Some(deadline) = deadline {
        supervisor = supervisor.with_deadline(deadline);
    }
    let metrics = if config.telemetry.metrics {
        let metrics = MetricsRecorder::new().map_err(|e| CliError::Telemetry(e.to_string()))?;
        supervisor = supervisor.with_metrics(metrics.clone());
        Some(metrics)
    } else {
        None
    };

    info!(scenario = %name, candidate = ?args.candidate, "running scenario");
    let report = supervisor.run(args.candidate).await?;
    println!("{}", report);

    if let Some(metrics) = &metrics {
        let exposition = metrics.gather_metrics().map_err(|e| CliError::Telemetry(e.to_string()))?;
        println!("{}", exposition);
    }

    if report.all_passed() {
        Ok(())
    } else {
        Err(CliError::RunFailed {
            scenario: name,
            summary: report.summary(),
        })
    }
}

fn check_scenario(name: &str, loader: &ScenarioLoader) -> Result<(), CliError> {
    let scenario = loader.load(name)?;
    println!("Scenario {} (deadline {:.1}s)", scenario.name(), scenario.timeout().as_secs_f64());
    for iface in scenario.interfaces() {
        println!(
            "  interface {} {} {}/{} ({:?})",
            iface.name,
            iface.hwaddr,
            iface.ipaddr(),
            iface.netmask(),
            iface.kind
        );
    }
    for (i, event) in scenario.declared_events().enumerate() {
        println!("  {} {}", i + 1, event);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run() {
        let cli = Cli::try_parse_from([
            "wirecheck",
            "run",
            "--scenario",
            "arp_request",
            "--candidate",
            "arp-responder",
            "--timeout-ms",
            "2500",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.scenario, "arp_request");
                assert_eq!(args.candidate, BuiltinCandidate::ArpResponder);
                assert_eq!(args.timeout_ms, Some(2500));
                assert!(!args.no_compiled);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["wirecheck", "check", "udp_echo", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Commands::Check(CheckArgs { ref name }) if name == "udp_echo"));
    }

    #[test]
    fn unknown_candidate_is_rejected() {
        assert!(Cli::try_parse_from(["wirecheck", "run", "-s", "x", "-c", "router"]).is_err());
    }

    #[tokio::test]
    async fn compile_without_names_fails() {
        let cli = Cli::try_parse_from(["wirecheck", "compile"]).unwrap();
        let err = run_command(cli, HarnessConfig::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "no scenarios given");
    }

    fn shipped_scenarios() -> ScenarioLoader {
        ScenarioLoader::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../scenarios")).prefer_source()
    }

    fn run_args(candidate: BuiltinCandidate) -> RunArgs {
        RunArgs {
            scenario: "arp_request".to_string(),
            candidate,
            timeout_ms: None,
            no_compiled: true,
        }
    }

    #[tokio::test]
    async fn run_with_and_without_metrics() {
        let mut config = HarnessConfig::default();
        run_scenario(run_args(BuiltinCandidate::ArpResponder), &config, shipped_scenarios())
            .await
            .unwrap();
        config.telemetry.metrics = true;
        run_scenario(run_args(BuiltinCandidate::ArpResponder), &config, shipped_scenarios())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn idle_run_reports_the_first_event_failed() {
        let err = run_scenario(run_args(BuiltinCandidate::Idle), &HarnessConfig::default(), shipped_scenarios())
            .await
            .unwrap_err();
        match err {
            CliError::RunFailed { summary, .. } => assert_eq!(summary, "0 passed, 1 failed, 3 pending"),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
