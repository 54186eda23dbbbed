use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pathdiag::analysis::{
    MergedPath, ProbeSummary, TraceAnalysis, analyze_trace, build_hop_matrix, build_merged_hop_views,
    compare_probes,
};
use pathdiag::cli::Args;
use pathdiag::config::{Config, OutputFormat, RunMode};
use pathdiag::export::{
    SystemClock, TicketContext, export_hop_matrix_csv, export_json, export_merged_csv, write_catalog,
    write_comparison, write_merged_report, write_ticket_summary, write_trace_report,
};
use pathdiag::lookup::OwnershipRegistry;
use pathdiag::policy::{
    PolicyFindingsResult, ScenarioDefinition, ScenarioId, catalog, derive_findings, summarize_results,
};
use pathdiag::prefs::Prefs;
use pathdiag::probe::{ProbeExecutor, ReplayExecutor, run_probes, run_scenario, trace_all_modes};
use pathdiag::state::{ProbeKey, ProbeMode, ProbeResults, TracerouteResult};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SingleReport<'a> {
    target: &'a str,
    probe: ProbeKey,
    result: &'a TracerouteResult,
    analysis: &'a TraceAnalysis,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioReport<'a> {
    target: &'a str,
    scenario: &'a ScenarioDefinition,
    summaries: &'a BTreeMap<ProbeKey, ProbeSummary>,
    findings: &'a PolicyFindingsResult,
    results: &'a ProbeResults,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MergeReport<'a> {
    target: &'a str,
    merged: &'a MergedPath,
    analyses: &'a BTreeMap<ProbeMode, TraceAnalysis>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    init_tracing(args.verbose);

    let prefs = match args.registry {
        Some(ref path) => Prefs::load_from(Path::new(path))?,
        None => Prefs::load()?,
    };
    let config = Config::from(&args).with_prefs(&args, &prefs);

    if config.mode == RunMode::ListScenarios {
        write_catalog(&catalog(&config.rtp_ports), std::io::stdout())?;
        return Ok(());
    }

    let registry = prefs.registry();
    registry.warn_on_conflicts();

    // Cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        cancel_clone.cancel();
    });

    if let Some(ref replay_path) = args.replay {
        let replay = ReplayExecutor::load(replay_path)
            .with_context(|| format!("Failed to load replay file: {}", replay_path))?;
        let target = args.target.clone().unwrap_or_else(|| replay.target().to_string());
        tokio::select! {
            res = run(&replay, &target, &config, &registry) => res,
            _ = cancel.cancelled() => Err(anyhow::anyhow!("Interrupted")),
        }
    } else {
        let executor = prefs.command_executor(args.executor.as_deref());
        let target = args.target.clone().context("No target specified")?;
        // Dropping the run on cancel kills any executor child still running
        tokio::select! {
            res = run(&executor, &target, &config, &registry) => res,
            _ = cancel.cancelled() => Err(anyhow::anyhow!("Interrupted")),
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run<E: ProbeExecutor>(
    executor: &E,
    target: &str,
    config: &Config,
    registry: &OwnershipRegistry,
) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match config.mode {
        RunMode::ListScenarios => write_catalog(&catalog(&config.rtp_ports), &mut out)?,
        RunMode::Single(key) => run_single_mode(executor, target, key, config, registry, &mut out).await?,
        RunMode::Scenario(id) => run_scenario_mode(executor, target, id, config, registry, &mut out).await?,
        RunMode::Merge => run_merge_mode(executor, target, config, registry, &mut out).await?,
        RunMode::Compare(ref keys) => run_compare_mode(executor, target, keys, config, registry, &mut out).await?,
    }

    out.flush()?;
    Ok(())
}

async fn run_single_mode<E: ProbeExecutor, W: Write>(
    executor: &E,
    target: &str,
    key: ProbeKey,
    config: &Config,
    registry: &OwnershipRegistry,
    out: &mut W,
) -> Result<()> {
    let results = run_probes(executor, target, &[key]).await?;
    let result = results
        .get(&key)
        .context("Probe produced no result")?;
    let analysis = analyze_trace(&result.hops, &result.target, key.mode(), registry);

    match config.output {
        OutputFormat::Json => export_json(
            &SingleReport {
                target: &result.target,
                probe: key,
                result,
                analysis: &analysis,
            },
            out,
        )?,
        _ => write_trace_report(key, result, &analysis, registry, out)?,
    }
    Ok(())
}

async fn run_scenario_mode<E: ProbeExecutor, W: Write>(
    executor: &E,
    target: &str,
    id: ScenarioId,
    config: &Config,
    registry: &OwnershipRegistry,
    out: &mut W,
) -> Result<()> {
    let run = run_scenario(executor, target, id, &config.scenario_options()).await?;
    let summaries = summarize_results(&run.results, registry);
    let findings = derive_findings(&summaries);

    match config.output {
        OutputFormat::Json => export_json(
            &ScenarioReport {
                target: &run.target,
                scenario: &run.scenario,
                summaries: &summaries,
                findings: &findings,
                results: &run.results,
            },
            out,
        )?,
        OutputFormat::Csv => export_hop_matrix_csv(&build_hop_matrix(&run.results), out)?,
        OutputFormat::Text => {
            let ctx = TicketContext {
                target: &run.target,
                scenario: Some(&run.scenario),
            };
            write_ticket_summary(out, &ctx, &findings, &summaries, &SystemClock)?;
        }
    }
    Ok(())
}

async fn run_merge_mode<E: ProbeExecutor, W: Write>(
    executor: &E,
    target: &str,
    config: &Config,
    registry: &OwnershipRegistry,
    out: &mut W,
) -> Result<()> {
    let triple = trace_all_modes(executor, target, config.tcp_port, config.udp_port).await?;
    let target = triple
        .icmp
        .as_ref()
        .map(|r| r.target.clone())
        .unwrap_or_else(|| target.trim().to_string());

    let merged = build_merged_hop_views(&triple, &target, registry);
    let analyses: BTreeMap<ProbeMode, TraceAnalysis> = ProbeMode::ALL
        .iter()
        .filter_map(|mode| triple.get(*mode).map(|r| (*mode, r)))
        .map(|(mode, result)| (mode, analyze_trace(&result.hops, &target, mode, registry)))
        .collect();

    match config.output {
        OutputFormat::Json => export_json(
            &MergeReport {
                target: &target,
                merged: &merged,
                analyses: &analyses,
            },
            out,
        )?,
        OutputFormat::Csv => export_merged_csv(&merged, out)?,
        OutputFormat::Text => write_merged_report(&target, &merged, &analyses, out)?,
    }
    Ok(())
}

async fn run_compare_mode<E: ProbeExecutor, W: Write>(
    executor: &E,
    target: &str,
    keys: &[ProbeKey],
    config: &Config,
    registry: &OwnershipRegistry,
    out: &mut W,
) -> Result<()> {
    let results = run_probes(executor, target, keys).await?;
    let comparison = compare_probes(&results, registry);

    match config.output {
        OutputFormat::Json => export_json(&comparison, out)?,
        OutputFormat::Csv => export_hop_matrix_csv(&comparison.hop_matrix, out)?,
        OutputFormat::Text => write_comparison(target.trim(), &comparison, out)?,
    }
    Ok(())
}
