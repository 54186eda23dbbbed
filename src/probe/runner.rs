//! Dispatching probes to an executor
//!
//! Two patterns:
//!
//! - **Sequential** ([`run_scenario`], [`run_probes`]): probes run one after
//!   another so the remote executor only ever sees one of ours at a time.
//! - **Parallel** ([`trace_all_modes`]): the ICMP/TCP/UDP triple is dispatched
//!   at once and awaited together.
//!
//! In both, a failing probe becomes a result carrying `error` and never stops
//! the others. No timeouts are applied here; those belong to the executor.

use serde::{Deserialize, Serialize};

use super::{ProbeExecutor, ProbeRequest};
use crate::analysis::ProbeTriple;
use crate::policy::{
    DEFAULT_RTP_PORTS, PolicyError, ScenarioDefinition, ScenarioId, scenario, validate_target,
};
use crate::state::{ProbeKey, ProbeResults, TracerouteResult};

/// Default destination port for the TCP leg of the triple
pub const DEFAULT_TCP_PORT: u16 = 443;
/// Default destination port for the UDP leg of the triple
pub const DEFAULT_UDP_PORT: u16 = 33434;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOptions {
    /// UDP ports for `rtp-range`
    pub rtp_ports: Vec<u16>,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            rtp_ports: DEFAULT_RTP_PORTS.to_vec(),
        }
    }
}

/// Everything a scenario run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRun {
    pub target: String,
    pub scenario: ScenarioDefinition,
    pub results: ProbeResults,
}

/// Run one probe, folding executor failures into the result
async fn run_probe<E: ProbeExecutor>(executor: &E, target: &str, key: ProbeKey) -> TracerouteResult {
    tracing::debug!(%target, probe = %key, "dispatching probe");

    match executor.trace(&ProbeRequest::new(target, key)).await {
        Ok(result) => {
            if let Some(ref error) = result.error {
                tracing::warn!(probe = %key, %error, "probe reported an error");
            } else {
                tracing::debug!(probe = %key, hops = result.hops.len(), "probe finished");
            }
            result
        }
        Err(e) => {
            tracing::warn!(probe = %key, error = %e, "probe failed");
            TracerouteResult::failed(target, e.to_string())
        }
    }
}

async fn run_sequential<E: ProbeExecutor>(executor: &E, target: &str, keys: &[ProbeKey]) -> ProbeResults {
    let mut results = ProbeResults::new();
    for key in keys {
        if results.contains_key(key) {
            continue;
        }
        let result = run_probe(executor, target, *key).await;
        results.insert(*key, result);
    }
    results
}

/// Run an ad-hoc list of probes in order, one at a time. Repeated keys run once.
pub async fn run_probes<E: ProbeExecutor>(
    executor: &E,
    target: &str,
    keys: &[ProbeKey],
) -> Result<ProbeResults, PolicyError> {
    let target = validate_target(target)?;
    Ok(run_sequential(executor, &target, keys).await)
}

/// Run every probe of a scenario in order, one at a time
pub async fn run_scenario<E: ProbeExecutor>(
    executor: &E,
    target: &str,
    id: ScenarioId,
    options: &ScenarioOptions,
) -> Result<ScenarioRun, PolicyError> {
    let target = validate_target(target)?;
    let definition = scenario(id, &options.rtp_ports);
    tracing::info!(%target, scenario = %id, probes = definition.probes.len(), "running scenario");

    let keys: Vec<ProbeKey> = definition.probes.iter().map(|p| p.key).collect();
    let results = run_sequential(executor, &target, &keys).await;

    tracing::info!(%target, scenario = %id, "scenario finished");
    Ok(ScenarioRun {
        target,
        scenario: definition,
        results,
    })
}

/// Trace the target with ICMP, TCP and UDP concurrently
pub async fn trace_all_modes<E: ProbeExecutor>(
    executor: &E,
    target: &str,
    tcp_port: u16,
    udp_port: u16,
) -> Result<ProbeTriple, PolicyError> {
    let target = validate_target(target)?;

    let (icmp, tcp, udp) = tokio::join!(
        run_probe(executor, &target, ProbeKey::Icmp),
        run_probe(executor, &target, ProbeKey::Tcp(tcp_port)),
        run_probe(executor, &target, ProbeKey::Udp(udp_port)),
    );

    Ok(ProbeTriple {
        icmp: Some(icmp),
        tcp: Some(tcp),
        udp: Some(udp),
    })
}
