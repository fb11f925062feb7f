//! Sanity verification of candidate binaries.
//!
//! Each candidate is run with the probe arguments from the catalog. A candidate
//! passes when its combined stdout and stderr contain every required substring
//! and it exits successfully.
//!
//! ## Concurrency
//!
//! All candidate probes are launched at once and the first one to *complete*
//! successfully wins. When several candidates could pass, which one is chosen
//! depends on process scheduling and is not deterministic. Probes still running
//! when a winner is found are dropped, which kills their child processes.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;

use crate::catalog::SanityProbe;
use crate::logger::Logger;
use crate::record::{ClientRecord, FailReason};

/// Default upper bound for a single probe run.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Verifies `candidates` for `record` and returns the updated record.
///
/// - No probe configured: the first candidate passes unconditionally.
/// - No candidates, or every probe fails: `sanityCheckFail`.
/// - Otherwise the first probe to pass sets `fullPath`.
///
/// Spawn failures, non-zero exits and timeouts all count as failed probes.
pub async fn verify(
    mut record: ClientRecord,
    candidates: Vec<PathBuf>,
    timeout: Duration,
    logger: &dyn Logger,
) -> ClientRecord {
    let Some(probe) = record.config().sanity().cloned() else {
        match candidates.into_iter().next() {
            Some(path) => {
                logger.debug(format_args!(
                    "No sanity check for {}, accepting {}",
                    record.id(),
                    path.display()
                ));
                record.mark_available(path);
            }
            None => record.mark_unavailable(FailReason::SanityCheckFail),
        }
        return record;
    };

    let mut probes: FuturesUnordered<_> = candidates
        .into_iter()
        .map(|path| {
            let probe = &probe;
            async move {
                let outcome = run_probe(&path, probe, timeout).await;
                (path, outcome)
            }
        })
        .collect();

    while let Some((path, outcome)) = probes.next().await {
        match outcome {
            Ok(()) => {
                logger.info(format_args!(
                    "Sanity check passed for {}: {}",
                    record.id(),
                    path.display()
                ));
                record.mark_available(path);
                return record;
            }
            Err(err) => logger.debug(format_args!(
                "Sanity check failed for {} at {}: {err:#}",
                record.id(),
                path.display()
            )),
        }
    }

    logger.warn(format_args!("All sanity checks failed for {}", record.id()));
    record.mark_unavailable(FailReason::SanityCheckFail);
    record
}

/// Runs one probe against `binary`.
async fn run_probe(binary: &Path, probe: &SanityProbe, timeout: Duration) -> Result<()> {
    let run = tokio::process::Command::new(binary)
        .args(&probe.args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, run)
        .await
        .with_context(|| format!("Timed out after {}s", timeout.as_secs()))?
        .with_context(|| format!("Failed to execute {}", binary.display()))?;

    if !output.status.success() {
        bail!("Exited with {}", output.status);
    }

    let mut haystack = String::from_utf8_lossy(&output.stdout).into_owned();
    haystack.push_str(&String::from_utf8_lossy(&output.stderr));

    if let Some(needle) = missing_needle(&haystack, &probe.output) {
        bail!("Unable to find \"{needle}\" in output");
    }

    Ok(())
}

/// Returns the first required substring absent from `haystack`.
fn missing_needle<'a>(haystack: &str, needles: &'a [String]) -> Option<&'a str> {
    needles
        .iter()
        .map(String::as_str)
        .find(|needle| !haystack.contains(needle))
}
