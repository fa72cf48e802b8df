//! Live proposal list.
//!
//! A poll ticker and the ledger's push notifications feed one trigger
//! channel. A single consumer re-fetches the whole list per trigger and
//! publishes it as the latest snapshot, so a slow response can never
//! overwrite a newer one with a partial merge.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::client::ProposalReader;
use crate::ledger::Ledger;
use crate::view::{ProposalView, SortOrder};

type Snapshot = Option<Arc<Vec<ProposalView>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Poll,
    Push(Pubkey),
}

/// Shared between a handle and its tasks. `delivering` is held while a
/// callback runs so `unsubscribe` can wait it out.
struct FeedState {
    active: AtomicBool,
    delivering: Mutex<()>,
}

impl FeedState {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            active: AtomicBool::new(true),
            delivering: Mutex::new(()),
        })
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn key(self: &Arc<Self>) -> usize {
        Arc::as_ptr(self) as usize
    }
}

thread_local! {
    // Feed whose callback is running on this thread, 0 when none.
    static IN_CALLBACK: Cell<usize> = const { Cell::new(0) };
}

/// Handle to background feed tasks. Dropping it cancels them; no callback
/// runs after `unsubscribe` returns. A callback may drop or unsubscribe its
/// own handle.
pub struct Subscription {
    state: Arc<FeedState>,
    tasks: Vec<JoinHandle<()>>,
}

impl Subscription {
    fn new(state: Arc<FeedState>, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { state, tasks }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn unsubscribe(&mut self) {
        self.state.active.store(false, Ordering::SeqCst);
        // Wait for a running callback, unless we are inside it.
        if IN_CALLBACK.with(Cell::get) != self.state.key() {
            drop(self.state.delivering.lock().unwrap_or_else(PoisonError::into_inner));
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

pub struct ProposalFeed {
    latest: watch::Receiver<Snapshot>,
    handle: Subscription,
}

impl ProposalFeed {
    pub fn spawn<L>(reader: ProposalReader<L>, order: SortOrder, poll_interval: Duration) -> Self
    where
        L: Ledger + ?Sized + 'static,
    {
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let state = FeedState::new();

        let tasks = vec![
            tokio::spawn(poll_source(trigger_tx.clone(), poll_interval)),
            tokio::spawn(push_source(reader.clone(), trigger_tx, Arc::clone(&state))),
            tokio::spawn(consume(reader, order, trigger_rx, snapshot_tx)),
        ];
        info!(?order, interval_secs = poll_interval.as_secs(), "proposal feed started");

        Self {
            latest: snapshot_rx,
            handle: Subscription::new(state, tasks),
        }
    }

    /// Most recent full snapshot, `None` before the first fetch completes.
    pub fn latest(&self) -> Snapshot {
        self.latest.borrow().clone()
    }

    /// Wait for the next snapshot. `None` once the feed has stopped.
    pub async fn changed(&mut self) -> Snapshot {
        self.latest.changed().await.ok()?;
        self.latest.borrow_and_update().clone()
    }

    /// Hand every new snapshot to `on_change` until the returned handle is
    /// cancelled.
    pub fn subscribe<F>(self, on_change: F) -> Subscription
    where
        F: Fn(Vec<ProposalView>) + Send + Sync + 'static,
    {
        let ProposalFeed { latest, mut handle } = self;
        let deliver = tokio::spawn(deliver(latest, Arc::clone(&handle.state), on_change));
        handle.tasks.push(deliver);
        handle
    }

    pub fn unsubscribe(&mut self) {
        self.handle.unsubscribe();
    }
}

async fn poll_source(triggers: mpsc::UnboundedSender<Trigger>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if triggers.send(Trigger::Poll).is_err() {
            break;
        }
    }
}

async fn push_source<L>(reader: ProposalReader<L>, triggers: mpsc::UnboundedSender<Trigger>, state: Arc<FeedState>)
where
    L: Ledger + ?Sized,
{
    let mut subscription = match reader.subscribe_changes().await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(error = %e, "push updates unavailable, falling back to polling");
            return;
        }
    };
    if !state.is_active() {
        debug!("feed closed before push subscription resolved");
        return;
    }
    while let Some(address) = subscription.events.recv().await {
        if triggers.send(Trigger::Push(address)).is_err() {
            break;
        }
    }
    debug!("push subscription ended");
}

async fn consume<L>(
    reader: ProposalReader<L>,
    order: SortOrder,
    mut triggers: mpsc::UnboundedReceiver<Trigger>,
    snapshot: watch::Sender<Snapshot>,
) where
    L: Ledger + ?Sized,
{
    while let Some(trigger) = triggers.recv().await {
        // Anything queued behind this trigger is answered by the same fetch.
        let mut coalesced = 0usize;
        while triggers.try_recv().is_ok() {
            coalesced += 1;
        }
        debug!(?trigger, coalesced, "refreshing proposals");

        match reader.snapshot(order).await {
            Ok(views) => {
                snapshot.send_replace(Some(Arc::new(views)));
            }
            Err(e) => warn!(error = %e, "proposal refresh failed, keeping last snapshot"),
        }
    }
}

async fn deliver<F>(mut latest: watch::Receiver<Snapshot>, state: Arc<FeedState>, on_change: F)
where
    F: Fn(Vec<ProposalView>) + Send + Sync + 'static,
{
    while latest.changed().await.is_ok() {
        let Some(views) = latest.borrow_and_update().clone() else {
            continue;
        };
        {
            let _delivering = state.delivering.lock().unwrap_or_else(PoisonError::into_inner);
            if !state.is_active() {
                break;
            }
            IN_CALLBACK.with(|current| current.set(state.key()));
            on_change(views.as_ref().clone());
            IN_CALLBACK.with(|current| current.set(0));
        }
        if !state.is_active() {
            break;
        }
    }
}
