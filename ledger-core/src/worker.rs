//! Background mining loop: coalesced start signals, cooperative
//! cancellation, and a clean shutdown path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use shared::{LedgerError, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::account::AccountId;
use crate::state::State;

/// Drives the mine-select-validate-persist cycle on a background task,
/// restarting whenever new work arrives and aborting in-flight work when
/// asked to.
pub struct Worker {
    start_tx: mpsc::Sender<()>,
    cancel_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Spawns the worker loop against `state`, mining blocks credited to
    /// `beneficiary`.
    pub fn spawn(state: Arc<State>, beneficiary: AccountId) -> Self {
        // Bounded to 1 and coalesced with `try_send`: a burst of "new tx
        // arrived" notifications collapses into a single pending mine
        // request instead of queuing one per transaction.
        let (start_tx, start_rx) = mpsc::channel(1);
        let (cancel_tx, cancel_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let handle = tokio::spawn(run(state, beneficiary, start_rx, cancel_rx, shutdown_rx));

        Self {
            start_tx,
            cancel_tx,
            shutdown_tx,
            handle,
        }
    }

    /// Signals that new work may be available. Safe to call freely — a
    /// pending signal that hasn't been consumed yet is not duplicated.
    pub fn start_mining(&self) {
        let _ = self.start_tx.try_send(());
    }

    /// A cheap, cloneable callback equivalent to [`Worker::start_mining`],
    /// for installing via [`crate::state::State::set_mining_trigger`]
    /// without handing the trigger a reference to the whole worker.
    pub fn mining_trigger(&self) -> Box<dyn Fn() + Send + Sync> {
        let tx = self.start_tx.clone();
        Box::new(move || {
            let _ = tx.try_send(());
        })
    }

    /// Cancels any mining currently in progress; a no-op if nothing is
    /// running.
    pub fn cancel_mining(&self) {
        let _ = self.cancel_tx.try_send(());
    }

    /// Requests the worker loop exit and waits for it to finish. Safe to
    /// call even if the loop has already exited on its own.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.handle.await;
    }

    /// Not yet implemented: pulling missing blocks from peers after
    /// falling behind. There is no peer-to-peer layer in this node.
    pub async fn sync(&self) -> Result<()> {
        Err(LedgerError::NotImplemented("worker::sync"))
    }

    /// Not yet implemented: announcing a newly received transaction to
    /// peers. There is no peer-to-peer layer in this node.
    pub async fn signal_share_tx(&self) -> Result<()> {
        Err(LedgerError::NotImplemented("worker::signal_share_tx"))
    }
}

async fn run(
    state: Arc<State>,
    beneficiary: AccountId,
    mut start_rx: mpsc::Receiver<()>,
    mut cancel_rx: mpsc::Receiver<()>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                info!("mining worker shutting down");
                return;
            }
            _ = cancel_rx.recv() => {
                // Nothing in progress yet — nothing to cancel.
            }
            Some(()) = start_rx.recv() => {
                mine_one_cycle(&state, &beneficiary, &mut cancel_rx, &mut shutdown_rx).await;
            }
        }
    }
}

/// Mines a single block, racing the shared cancellation flag against
/// explicit cancel/shutdown signals that arrive while the blocking PoW
/// search is running.
async fn mine_one_cycle(
    state: &Arc<State>,
    beneficiary: &AccountId,
    cancel_rx: &mut mpsc::Receiver<()>,
    shutdown_rx: &mut mpsc::Receiver<()>,
) {
    if state.mempool.count() == 0 {
        return;
    }

    let cancel_flag = Arc::new(AtomicBool::new(false));
    let mining_state = Arc::clone(state);
    let mining_beneficiary = beneficiary.clone();
    let mining_flag = Arc::clone(&cancel_flag);

    let mut mining_task = tokio::task::spawn_blocking(move || {
        mining_state.mine_next_block(mining_beneficiary, mining_flag)
    });

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                cancel_flag.store(true, Ordering::Relaxed);
                let _ = mining_task.await;
                return;
            }
            _ = cancel_rx.recv() => {
                cancel_flag.store(true, Ordering::Relaxed);
            }
            result = &mut mining_task => {
                match result {
                    Ok(Ok(block)) => {
                        info!(number = block.header.number, "mined block");
                    }
                    Ok(Err(LedgerError::MiningCancelled)) => {
                        warn!("mining cancelled before a solution was found");
                    }
                    Ok(Err(e)) => {
                        error!(error = %e, "mining cycle failed");
                    }
                    Err(e) => {
                        error!(error = %e, "mining task panicked");
                    }
                }
                return;
            }
        }
    }
}
