//! Proposer binary
//!
//! Merges the proofs past the last settlement into the merged slot, settles
//! the merged proof when it starts at the settled roots, persists the
//! settlement contract state and restarts the merge window after it.

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use tidepool_contracts::SettlementContract;
use tidepool_core::{KeyRegistry, Proof};
use tidepool_host::{Config, FileProofStore, LocalProver, ProofMerger, ProofStore};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("===========================================");
    info!("        Tidepool Proposer");
    info!("===========================================");

    let config = Config::from_env();
    info!("Data dir:          {}", config.data_dir.display());
    info!("Prover mode:       {:?}", config.prover.mode);
    info!("Merge parallelism: {}", config.merge_parallelism);

    run(&config).await
}

async fn run(config: &Config) -> Result<()> {
    let store = Arc::new(
        FileProofStore::open(config.proofs_dir())
            .await
            .context("Failed to open proof store")?,
    );
    // Merging only checks proofs, never user signatures.
    let prover = Arc::new(LocalProver::new(&config.prover, Arc::new(KeyRegistry::new())));
    let merger = ProofMerger::new(prover.clone(), store.clone(), config.merge_parallelism);

    let Some(merged) = merger.merge_pending().await.context("Failed to merge proofs")? else {
        info!(
            "No proofs past step {}, nothing to settle",
            store.settled_until().await?
        );
        return Ok(());
    };
    let window = store.merged_range().await?;

    let path = config.settlement_path();
    let mut settlement = load_settlement(&path).await?;
    match settle(&mut settlement, prover.as_ref(), &merged)? {
        Settled::Advanced => save_settlement(&path, &settlement).await?,
        Settled::Current => {}
        Settled::Stale => return Ok(()),
    }

    store.set_settled_until(window.end).await?;
    merger.start_merge(window.end).await?;
    info!("Settled through proof {}", window.end);
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Settled {
    /// The merged proof moved the settlement forward
    Advanced,
    /// The settlement already holds the merged proof's output
    Current,
    /// The merged proof does not start at the settled roots
    Stale,
}

/// Settle `merged` if it advances the settled roots.
fn settle(
    settlement: &mut SettlementContract,
    prover: &LocalProver,
    merged: &Proof,
) -> Result<Settled> {
    if merged.public_output == *settlement.roots() {
        info!("Merged proof ends at the settled roots {}", settlement.roots().short());
        return Ok(Settled::Current);
    }
    if merged.public_input != *settlement.roots() {
        warn!(
            "Merged proof starts at {}, settled roots are {}",
            merged.public_input.short(),
            settlement.roots().short()
        );
        return Ok(Settled::Stale);
    }

    let roots = settlement
        .settle(prover, merged)
        .context("Settlement rejected merged proof")?;
    info!("Settlement advanced to {}", roots.short());
    Ok(Settled::Advanced)
}

async fn load_settlement(path: &Path) -> Result<SettlementContract> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No settlement state at {}, starting from genesis", path.display());
            Ok(SettlementContract::new())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

async fn save_settlement(path: &Path, settlement: &SettlementContract) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(settlement)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
