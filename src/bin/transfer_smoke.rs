//! Concurrency smoke run over the embedded store
//!
//! Spawns a storm of transfers, including opposing pairs over the same
//! accounts, then verifies that total value was conserved. Useful as a
//! quick sanity check after changes to the lock protocol.

use std::sync::Arc;

use futures::future::join_all;
use minledger::config::LedgerConfig;
use minledger::logging::init_logging;
use minledger::store::{AccountStore, MemoryStore};
use minledger::TransferEngine;
use tracing::info;

const ACCOUNTS: usize = 8;
const OPENING_BALANCE: i64 = 100_000;
const TRANSFERS: usize = 400;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = LedgerConfig::load("default").unwrap_or_default();
    let _guard = init_logging(&config);

    let store = Arc::new(MemoryStore::new(config.lock_wait()));
    let engine = Arc::new(TransferEngine::new(store.clone()));

    let mut ids = Vec::with_capacity(ACCOUNTS);
    for _ in 0..ACCOUNTS {
        ids.push(store.create_account(OPENING_BALANCE).await?.id);
    }
    let total_before = OPENING_BALANCE * ACCOUNTS as i64;

    let mut tasks = Vec::with_capacity(TRANSFERS);
    for i in 0..TRANSFERS {
        // Deterministic pattern that covers opposing directions over the
        // same pairs.
        let from = ids[i % ACCOUNTS];
        let to = ids[(i * 3 + 1) % ACCOUNTS];
        if from == to {
            continue;
        }
        let amount = ((i % 7) as i64 + 1) * 10;
        let engine = engine.clone();
        tasks.push(tokio::spawn(
            async move { engine.transfer(from, to, amount).await },
        ));
    }

    let results = join_all(tasks).await;
    let mut committed = 0usize;
    let mut aborted = 0usize;
    for result in results {
        match result? {
            Ok(_) => committed += 1,
            Err(_) => aborted += 1,
        }
    }

    let mut total_after = 0i64;
    for id in &ids {
        let balance = store.balance_of(*id).await?;
        anyhow::ensure!(balance >= 0, "account {id} went negative: {balance}");
        total_after += balance;
    }

    info!(
        committed,
        aborted,
        total_before,
        total_after,
        "smoke run finished"
    );
    anyhow::ensure!(
        total_before == total_after,
        "value not conserved: {total_before} -> {total_after}"
    );
    println!(
        "ok: {committed} committed, {aborted} aborted, {total_after} minor units conserved"
    );
    Ok(())
}
