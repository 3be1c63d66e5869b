//! Sync controller: owns one live, store-derived view for the current identity.
//!
//! The controller runs as a single task and reacts to four inputs:
//! - identity changes (start over for the new operator, or go idle)
//! - change-feed signals (refresh)
//! - manual `refetch` requests (refresh)
//! - completion of the in-flight fetch (publish)
//!
//! At most one fetch is in flight. A refresh requested while loading is queued
//! (at most one follow-up, however many requests arrive); when the in-flight
//! fetch settles with a follow-up queued its result is superseded and the
//! follow-up starts instead. Every fetch carries a generation number and only
//! the newest generation may publish, so a read issued before the latest
//! trigger never overwrites the view.
//!
//! Teardown (identity cleared, `shutdown`, or the handle dropped) releases the
//! feed subscription exactly once and drops any in-flight fetch, so nothing
//! settles afterwards.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt;
use std::future::pending;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use rota_api::{
    ApiError, ChangeFeed, ChangeSignal, ChannelSpec, FeedSubscription, OperatorId, Table,
};

use crate::config::SyncConfig;
use crate::sync::source::ViewSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// No identity; the view is empty
    Idle,
    /// A fetch is in flight
    Loading,
    /// The last fetch succeeded
    Ready,
    /// The last fetch failed; the previous view is kept
    Error,
}

/// Everything a consumer sees of a controller at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot<V> {
    pub status: SyncStatus,
    pub data: V,
    pub error: Option<String>,
    pub operator: Option<OperatorId>,
    /// Incremented on every publish
    pub revision: u64,
}

impl<V: Default> SyncSnapshot<V> {
    fn initial(operator: Option<&OperatorId>) -> Self {
        Self {
            status: if operator.is_some() {
                SyncStatus::Loading
            } else {
                SyncStatus::Idle
            },
            data: V::default(),
            error: None,
            operator: operator.cloned(),
            revision: 0,
        }
    }
}

impl<V> SyncSnapshot<V> {
    pub fn loading(&self) -> bool {
        self.status == SyncStatus::Loading
    }

    /// Not loading, and past `revision`.
    pub fn settled_after(&self, revision: u64) -> bool {
        self.revision > revision && !self.loading()
    }
}

/// Why a refresh was requested; only used for logging.
#[derive(Debug, Clone, Copy)]
enum RefreshCause {
    Manual,
    Feed(Table),
}

impl fmt::Display for RefreshCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshCause::Manual => f.write_str("manual refetch"),
            RefreshCause::Feed(table) => write!(f, "{} changed", table),
        }
    }
}

#[derive(Debug)]
enum Command {
    Refetch,
    Shutdown,
}

/// How a feed subscription attempt ended.
enum Subscribed {
    Done(Result<FeedSubscription, ApiError>),
    /// The identity changed to this value before the feed answered
    Superseded(Option<OperatorId>),
    /// Shutdown requested, or the handle or identity context went away
    Stop,
}

struct InFlight<V> {
    generation: u64,
    future: BoxFuture<'static, Result<V, ApiError>>,
}

pub struct SyncController<S: ViewSource> {
    source: Arc<S>,
    feed: Arc<dyn ChangeFeed>,
    config: Arc<SyncConfig>,
    identity: watch::Receiver<Option<OperatorId>>,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<SyncSnapshot<S::View>>,
    operator: Option<OperatorId>,
    subscription: Option<FeedSubscription>,
    /// Generation of the most recently started fetch
    generation: u64,
    in_flight: Option<InFlight<S::View>>,
    refresh_queued: bool,
}

impl<S: ViewSource> SyncController<S> {
    /// Start a controller task for `source`, following `identity`.
    pub fn spawn(
        source: S,
        identity: watch::Receiver<Option<OperatorId>>,
        feed: Arc<dyn ChangeFeed>,
        config: Arc<SyncConfig>,
    ) -> SyncHandle<S::View> {
        let initial = SyncSnapshot::initial(identity.borrow().as_ref());
        let (state, snapshots) = watch::channel(initial);
        let (commands_tx, commands) = mpsc::unbounded_channel();

        let controller = Self {
            source: Arc::new(source),
            feed,
            config,
            identity,
            commands,
            state,
            operator: None,
            subscription: None,
            generation: 0,
            in_flight: None,
            refresh_queued: false,
        };
        let task = tokio::spawn(controller.run());

        SyncHandle {
            commands: commands_tx,
            snapshots,
            task: Some(task),
        }
    }

    async fn run(mut self) {
        let initial = self.identity.borrow_and_update().clone();
        if self.apply_identity(initial).await.is_break() {
            self.teardown();
            return;
        }

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Refetch) => self.request_refresh(RefreshCause::Manual),
                    Some(Command::Shutdown) | None => break,
                },
                changed = self.identity.changed() => {
                    if changed.is_err() {
                        debug!("[SyncController:{}] identity context dropped", self.source.name());
                        break;
                    }
                    let next = self.identity.borrow_and_update().clone();
                    if self.apply_identity(next).await.is_break() {
                        break;
                    }
                }
                signal = next_signal(&mut self.subscription) => match signal {
                    Some(signal) => self.request_refresh(RefreshCause::Feed(signal.table)),
                    None => {
                        warn!(
                            "[SyncController:{}] change feed closed, live updates stopped",
                            self.source.name()
                        );
                        self.release_subscription();
                    }
                },
                (generation, result) = next_result(&mut self.in_flight) => {
                    self.settle(generation, result);
                }
            }
        }

        self.teardown();
    }

    async fn apply_identity(&mut self, mut next: Option<OperatorId>) -> ControlFlow<()> {
        loop {
            if next == self.operator {
                return ControlFlow::Continue(());
            }

            // Whatever belonged to the previous identity goes first.
            self.in_flight = None;
            self.refresh_queued = false;
            self.generation += 1;
            self.release_subscription();
            self.operator = next.clone();

            let Some(operator) = next.take() else {
                info!("[SyncController:{}] identity cleared, going idle", self.source.name());
                self.publish(|snapshot| {
                    snapshot.status = SyncStatus::Idle;
                    snapshot.data = Default::default();
                    snapshot.error = None;
                    snapshot.operator = None;
                });
                return ControlFlow::Continue(());
            };

            info!(
                "[SyncController:{}] loading view for operator {}",
                self.source.name(),
                operator
            );

            // Subscribe before the first read so no write between the two is missed.
            let spec = self.source.channel(&operator, &self.config);
            match self.subscribe(&operator, spec).await {
                Subscribed::Done(Ok(subscription)) => {
                    debug!(
                        "[SyncController:{}] listening on channel '{}'",
                        self.source.name(),
                        subscription.channel()
                    );
                    self.subscription = Some(subscription);
                }
                Subscribed::Done(Err(e)) => warn!(
                    "[SyncController:{}] live updates unavailable for {}: {}",
                    self.source.name(),
                    operator,
                    e
                ),
                Subscribed::Superseded(newer) => {
                    next = newer;
                    continue;
                }
                Subscribed::Stop => return ControlFlow::Break(()),
            }

            self.start_fetch(operator.clone());
            self.publish(|snapshot| {
                snapshot.status = SyncStatus::Loading;
                snapshot.data = Default::default();
                snapshot.error = None;
                snapshot.operator = Some(operator);
            });
            return ControlFlow::Continue(());
        }
    }

    /// Open the feed channel for `operator` while still answering commands and
    /// identity changes, so a feed that never answers cannot block teardown.
    async fn subscribe(&mut self, operator: &OperatorId, spec: ChannelSpec) -> Subscribed {
        let feed = Arc::clone(&self.feed);
        let mut subscribe = feed.subscribe(spec);

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    // The initial fetch follows the subscription anyway.
                    Some(Command::Refetch) => {}
                    Some(Command::Shutdown) | None => return Subscribed::Stop,
                },
                changed = self.identity.changed() => {
                    if changed.is_err() {
                        return Subscribed::Stop;
                    }
                    let newer = self.identity.borrow_and_update().clone();
                    if newer.as_ref() != Some(operator) {
                        debug!(
                            "[SyncController:{}] identity changed while subscribing for {}",
                            self.source.name(),
                            operator
                        );
                        return Subscribed::Superseded(newer);
                    }
                }
                result = &mut subscribe => return Subscribed::Done(result),
            }
        }
    }

    fn request_refresh(&mut self, cause: RefreshCause) {
        let Some(operator) = self.operator.clone() else {
            debug!(
                "[SyncController:{}] {} ignored while idle",
                self.source.name(),
                cause
            );
            return;
        };

        if self.in_flight.is_some() {
            if !self.refresh_queued {
                debug!(
                    "[SyncController:{}] {} while loading, follow-up queued",
                    self.source.name(),
                    cause
                );
            }
            self.refresh_queued = true;
            return;
        }

        debug!("[SyncController:{}] {}, refetching", self.source.name(), cause);
        self.start_fetch(operator);
        self.publish(|snapshot| snapshot.status = SyncStatus::Loading);
    }

    fn start_fetch(&mut self, operator: OperatorId) {
        self.generation += 1;
        self.refresh_queued = false;

        let source = Arc::clone(&self.source);
        let future = async move { source.load(&operator).await }.boxed();
        self.in_flight = Some(InFlight {
            generation: self.generation,
            future,
        });
    }

    fn settle(&mut self, generation: u64, result: Result<S::View, ApiError>) {
        self.in_flight = None;

        if generation != self.generation {
            debug!(
                "[SyncController:{}] discarding result of superseded fetch #{}",
                self.source.name(),
                generation
            );
            return;
        }

        if self.refresh_queued {
            if let Some(operator) = self.operator.clone() {
                debug!(
                    "[SyncController:{}] fetch #{} superseded by queued refresh",
                    self.source.name(),
                    generation
                );
                self.start_fetch(operator);
                return;
            }
        }

        match result {
            Ok(view) => {
                debug!(
                    "[SyncController:{}] fetch #{} settled",
                    self.source.name(),
                    generation
                );
                self.publish(|snapshot| {
                    snapshot.status = SyncStatus::Ready;
                    snapshot.data = view;
                    snapshot.error = None;
                });
            }
            Err(e) => {
                error!(
                    "[SyncController:{}] fetch #{} failed: {}",
                    self.source.name(),
                    generation,
                    e
                );
                let message = e
                    .store_message()
                    .map(str::to_string)
                    .unwrap_or_else(|| self.config.load_error_message.clone());
                self.publish(|snapshot| {
                    snapshot.status = SyncStatus::Error;
                    snapshot.error = Some(message);
                });
            }
        }
    }

    fn publish(&self, update: impl FnOnce(&mut SyncSnapshot<S::View>)) {
        self.state.send_modify(|snapshot| {
            update(snapshot);
            snapshot.revision += 1;
        });
    }

    fn release_subscription(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            debug!(
                "[SyncController:{}] releasing channel '{}'",
                self.source.name(),
                subscription.channel()
            );
            subscription.release();
        }
    }

    fn teardown(&mut self) {
        self.in_flight = None;
        self.release_subscription();
        info!("[SyncController:{}] stopped", self.source.name());
    }
}

async fn next_signal(subscription: &mut Option<FeedSubscription>) -> Option<ChangeSignal> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => pending().await,
    }
}

async fn next_result<V>(in_flight: &mut Option<InFlight<V>>) -> (u64, Result<V, ApiError>) {
    match in_flight {
        Some(fetch) => {
            let result = (&mut fetch.future).await;
            (fetch.generation, result)
        }
        None => pending().await,
    }
}

/// Consumer side of a running [`SyncController`].
///
/// Dropping the handle stops the controller; `shutdown` does the same and
/// waits for it.
pub struct SyncHandle<V> {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<SyncSnapshot<V>>,
    task: Option<JoinHandle<()>>,
}

impl<V: Clone> SyncHandle<V> {
    pub fn snapshot(&self) -> SyncSnapshot<V> {
        self.snapshots.borrow().clone()
    }

    pub fn data(&self) -> V {
        self.snapshots.borrow().data.clone()
    }

    pub fn loading(&self) -> bool {
        self.snapshots.borrow().loading()
    }

    pub fn error(&self) -> Option<String> {
        self.snapshots.borrow().error.clone()
    }

    /// Request a refresh, with the same semantics as a change-feed signal.
    pub fn refetch(&self) {
        if self.commands.send(Command::Refetch).is_err() {
            debug!("[SyncHandle] refetch after controller stopped");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot<V>> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    ///
    /// Returns `None` if the controller stops first.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SyncSnapshot<V>) -> bool,
    ) -> Option<SyncSnapshot<V>> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots.wait_for(predicate).await.ok()?.clone();
        Some(snapshot)
    }

    /// Stop the controller and wait until its subscription is released.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("[SyncHandle] controller task ended abnormally: {}", e);
            }
        }
    }
}

impl<V> fmt::Debug for SyncHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncHandle")
            .field("running", &self.task.as_ref().is_some_and(|t| !t.is_finished()))
            .finish()
    }
}
