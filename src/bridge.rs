//! Bridge runtime: wires the node monitor, the dispatcher and the bus
//! together and drives them from one loop.
//!
//! The MQTT event loop runs on its own task and hands messages over an mpsc
//! channel. Everything else (node state, reply correlation, the timeout
//! sweep) happens on the loop in [`Bridge::run`].

use crate::bus::{BusClient, BusEvent, TopicScheme};
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::matter::ProtocolSink;
use crate::node_state::{NodeStateEvent, NodeStateMonitor, UnifyNodeMonitor};
use crate::translator::{
    Dispatcher, GroupsTranslator, IdentifyTranslator, LevelControlTranslator, OnOffTranslator,
    ThermostatTranslator, TranslatorLinks,
};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub struct Bridge {
    monitor: Arc<UnifyNodeMonitor>,
    dispatcher: Dispatcher,
    bus: Arc<dyn BusClient>,
    sweep_interval: Duration,
}

impl Bridge {
    /// Build the bridge with a translator for every supported cluster.
    pub fn new(
        config: &BridgeConfig,
        bus: Arc<dyn BusClient>,
        sink: Arc<dyn ProtocolSink>,
    ) -> Result<Self> {
        let topics = TopicScheme::new(config.topic_prefix.clone());
        let monitor = Arc::new(UnifyNodeMonitor::new(
            topics.clone(),
            config.first_dynamic_endpoint,
        ));
        let links = TranslatorLinks::new(monitor.clone(), bus.clone(), topics.clone());

        let mut dispatcher = Dispatcher::new(topics, sink, config.reply_timeout());
        dispatcher.register(Arc::new(IdentifyTranslator::new(links.clone())))?;
        dispatcher.register(Arc::new(GroupsTranslator::new(links.clone())))?;
        dispatcher.register(Arc::new(OnOffTranslator::new(links.clone())))?;
        dispatcher.register(Arc::new(LevelControlTranslator::new(links.clone())))?;
        dispatcher.register(Arc::new(ThermostatTranslator::new(links)))?;

        Ok(Self {
            monitor,
            dispatcher,
            bus,
            sweep_interval: config.sweep_interval(),
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn monitor(&self) -> &Arc<UnifyNodeMonitor> {
        &self.monitor
    }

    /// (Re)subscribe to every topic the bridge listens on.
    pub fn subscribe_all(&self) {
        let patterns = self
            .monitor
            .subscriptions()
            .into_iter()
            .chain(self.dispatcher.subscriptions());
        for pattern in patterns {
            match self.bus.subscribe(&pattern) {
                Ok(()) => debug!("[Bridge] Subscribed to {}", pattern),
                Err(e) => warn!("[Bridge] Failed to subscribe to {}: {}", pattern, e),
            }
        }
    }

    /// Handle one event from the bus event loop.
    pub fn handle_bus_event(&self, event: BusEvent) {
        match event {
            BusEvent::Connected => self.subscribe_all(),
            BusEvent::Message(message) => {
                if !self.monitor.handle_message(&message) {
                    self.dispatcher.on_bus_message(&message);
                }
            }
        }
    }

    /// Run until `cancel` fires or the bus event channel closes.
    pub async fn run(&self, mut events: mpsc::Receiver<BusEvent>, cancel: CancellationToken) {
        let mut node_events = self.monitor.subscribe();
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("[Bridge] Running");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => {
                    let Some(event) = event else {
                        warn!("[Bridge] Bus event channel closed");
                        break;
                    };
                    self.handle_bus_event(event);
                    // Apply attach/detach before the next message is looked at
                    self.drain_node_events(&mut node_events);
                }
                event = node_events.recv() => match event {
                    Ok(event) => self.dispatcher.on_node_event(&event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => self.on_lag(missed),
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = sweep.tick() => {
                    let expired = self.dispatcher.expire_pending(Instant::now());
                    if expired > 0 {
                        debug!("[Bridge] Expired {} request(s)", expired);
                    }
                }
            }
        }
        info!("[Bridge] Stopped");
    }

    fn drain_node_events(&self, node_events: &mut broadcast::Receiver<NodeStateEvent>) {
        loop {
            match node_events.try_recv() {
                Ok(event) => self.dispatcher.on_node_event(&event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => self.on_lag(missed),
                Err(_) => break,
            }
        }
    }

    /// Missed notifications may include detaches: check what is still pending.
    fn on_lag(&self, missed: u64) {
        warn!("[Bridge] Missed {} node state event(s)", missed);
        self.dispatcher.reconcile(self.monitor.as_ref());
    }
}
