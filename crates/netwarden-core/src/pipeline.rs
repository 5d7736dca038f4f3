// ── Event pipeline ──
//
// Wires the input streams to the rule engine and the delivery loop.
// Three background tasks: facts evaluation, syslog evaluation, and
// delivery. Listener fan-out is best effort and happens first; the
// durable insert is retried by requeueing the event until it lands.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::engine::rule::RuleDataSource;
use crate::engine::RuleEngine;
use crate::error::CoreError;
use crate::listeners::ListenerRegistry;
use crate::model::{AlertEvent, FactsBatch, SyslogMessage};
use crate::sources::{AlertSink, RuleSource};

/// The alert subsystem's runtime.
///
/// Cheaply cloneable via `Arc`. Construct, hand the
/// [`facts_sender`](Self::facts_sender) / [`syslog_sender`](Self::syslog_sender)
/// ends to the gathering backends, then [`start`](Self::start).
pub struct EventPipeline<S, K> {
    inner: Arc<PipelineInner<S, K>>,
}

impl<S, K> Clone for EventPipeline<S, K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PipelineInner<S, K> {
    engine: Arc<RuleEngine<S>>,
    sink: Arc<K>,
    listeners: Arc<ListenerRegistry>,
    cancel: CancellationToken,

    facts_tx: mpsc::Sender<FactsBatch>,
    facts_rx: Mutex<Option<mpsc::Receiver<FactsBatch>>>,
    syslog_tx: mpsc::Sender<SyslogMessage>,
    syslog_rx: Mutex<Option<mpsc::Receiver<SyslogMessage>>>,
    delivery_tx: mpsc::Sender<AlertEvent>,
    delivery_rx: Mutex<Option<mpsc::Receiver<AlertEvent>>>,

    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<S, K> EventPipeline<S, K>
where
    S: RuleSource + 'static,
    K: AlertSink + 'static,
{
    pub fn new(
        engine: Arc<RuleEngine<S>>,
        sink: Arc<K>,
        listeners: Arc<ListenerRegistry>,
        config: &EngineConfig,
    ) -> Self {
        let (facts_tx, facts_rx) = mpsc::channel(config.facts_channel_size);
        let (syslog_tx, syslog_rx) = mpsc::channel(config.syslog_channel_size);
        let (delivery_tx, delivery_rx) = mpsc::channel(config.delivery_channel_size);

        Self {
            inner: Arc::new(PipelineInner {
                engine,
                sink,
                listeners,
                cancel: CancellationToken::new(),
                facts_tx,
                facts_rx: Mutex::new(Some(facts_rx)),
                syslog_tx,
                syslog_rx: Mutex::new(Some(syslog_rx)),
                delivery_tx,
                delivery_rx: Mutex::new(Some(delivery_rx)),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Spawn the evaluation and delivery tasks. Idempotent only in the
    /// failing direction: a second call returns
    /// [`CoreError::AlreadyStarted`].
    pub async fn start(&self) -> Result<(), CoreError> {
        let facts_rx = self.inner.facts_rx.lock().await.take();
        let syslog_rx = self.inner.syslog_rx.lock().await.take();
        let delivery_rx = self.inner.delivery_rx.lock().await.take();

        let (Some(facts_rx), Some(syslog_rx), Some(delivery_rx)) =
            (facts_rx, syslog_rx, delivery_rx)
        else {
            return Err(CoreError::AlreadyStarted);
        };

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(facts_task(self.clone(), facts_rx)));
        handles.push(tokio::spawn(syslog_task(self.clone(), syslog_rx)));
        handles.push(tokio::spawn(delivery_task(self.clone(), delivery_rx)));

        info!("alert pipeline started");
        Ok(())
    }

    /// Cancel the background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("alert pipeline stopped");
    }

    /// Input for fact batches. Gathering backends on plain OS threads
    /// can use `blocking_send`.
    pub fn facts_sender(&self) -> mpsc::Sender<FactsBatch> {
        self.inner.facts_tx.clone()
    }

    /// Input for received syslog messages.
    pub fn syslog_sender(&self) -> mpsc::Sender<SyslogMessage> {
        self.inner.syslog_tx.clone()
    }

    pub fn engine(&self) -> &Arc<RuleEngine<S>> {
        &self.inner.engine
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.inner.listeners
    }
}

// ── Background tasks ───────────────────────────────────────────────────

/// Evaluate each incoming facts batch against the fact rules.
///
/// Every batch first refreshes the ruleset if its TTL expired (best
/// effort) and folds the observed values into the topology cache, so
/// later batches and inspection endpoints see current device state.
async fn facts_task<S, K>(pipeline: EventPipeline<S, K>, mut rx: mpsc::Receiver<FactsBatch>)
where
    S: RuleSource + 'static,
    K: AlertSink + 'static,
{
    let inner = &pipeline.inner;
    let cancel = inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            batch = rx.recv() => {
                let Some(batch) = batch else { break };

                if let Err(e) = inner.engine.reload(false).await {
                    warn!(error = %e, "ruleset refresh failed, evaluating with loaded rules");
                }
                inner.engine.topology().record_facts(&batch);

                let events = inner.engine.evaluate(RuleDataSource::Facts, &batch);
                enqueue(&inner.delivery_tx, events).await;
            }
        }
    }
}

/// Evaluate each incoming syslog message against the syslog rules.
async fn syslog_task<S, K>(pipeline: EventPipeline<S, K>, mut rx: mpsc::Receiver<SyslogMessage>)
where
    S: RuleSource + 'static,
    K: AlertSink + 'static,
{
    let inner = &pipeline.inner;
    let cancel = inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            message = rx.recv() => {
                let Some(message) = message else { break };

                let record = message.as_record();
                let events = inner.engine.evaluate(RuleDataSource::Syslog, &record);
                enqueue(&inner.delivery_tx, events).await;
            }
        }
    }
}

async fn enqueue(delivery_tx: &mpsc::Sender<AlertEvent>, events: Vec<AlertEvent>) {
    for event in events {
        debug!(rule_id = event.rule_id, target_id = event.target_id, "alert raised");
        if delivery_tx.send(event).await.is_err() {
            // Delivery task gone; only happens during shutdown.
            return;
        }
    }
}

/// Deliver raised events: listener fan-out once, durable insert until
/// it succeeds.
///
/// Fan-out happens before the insert so live consumers see the alert
/// even when the store is down. A failed insert requeues the event at
/// the back of the queue; the `ws_notified` flag keeps the retry from
/// broadcasting again.
async fn delivery_task<S, K>(pipeline: EventPipeline<S, K>, mut rx: mpsc::Receiver<AlertEvent>)
where
    S: RuleSource + 'static,
    K: AlertSink + 'static,
{
    let inner = &pipeline.inner;
    let cancel = inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = rx.recv() => {
                let Some(mut event) = event else { break };

                if !event.ws_notified {
                    inner.listeners.broadcast(&event);
                    event.ws_notified = true;
                }

                if !event.db_notified {
                    match inner.sink.insert_alert(&event).await {
                        Ok(id) => {
                            event.alert_id = id;
                            event.db_notified = true;
                            debug!(alert_id = id, rule_id = event.rule_id, "alert persisted");
                        }
                        Err(e) => {
                            warn!(error = %e, rule_id = event.rule_id, "alert insert failed, requeueing");
                            // try_send: awaiting on our own full queue
                            // would deadlock the delivery task.
                            if inner.delivery_tx.try_send(event).is_err() {
                                error!("delivery queue unavailable, dropping unpersisted alert");
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::sources::RuleRow;
    use crate::topology::TopologyCache;

    struct NoRules;

    impl RuleSource for NoRules {
        async fn fetch_rules(&self) -> Result<Vec<RuleRow>, CoreError> {
            Ok(Vec::new())
        }
    }

    struct NullSink;

    impl AlertSink for NullSink {
        async fn insert_alert(&self, _event: &AlertEvent) -> Result<i64, CoreError> {
            Ok(1)
        }
    }

    fn pipeline() -> EventPipeline<NoRules, NullSink> {
        let topology = Arc::new(TopologyCache::new());
        let engine = Arc::new(RuleEngine::new(NoRules, topology, Duration::from_secs(3600)));
        EventPipeline::new(
            engine,
            Arc::new(NullSink),
            Arc::new(ListenerRegistry::new()),
            &EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let pipeline = pipeline();
        pipeline.start().await.unwrap();
        assert!(matches!(
            pipeline.start().await,
            Err(CoreError::AlreadyStarted)
        ));
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_joins_all_tasks() {
        let pipeline = pipeline();
        pipeline.start().await.unwrap();
        pipeline.shutdown().await;
        assert!(pipeline.inner.task_handles.lock().await.is_empty());
    }
}
