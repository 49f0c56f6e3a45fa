// src/engine.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::link::{ConnectionManager, LinkUpdate, Tagged, Transport, WsTransport};
use crate::simulator::SimTransport;
use crate::stream::apply_filter;
use crate::types::*;

type DynTransport = Box<dyn Transport + Send>;

// Longest the loop sleeps while waiting for socket traffic
const IDLE_WAIT: Duration = Duration::from_millis(20);

/// Caps how many samples sit in the channel to the GUI. The GUI releases a
/// slot for every sample it takes off; past the cap new samples are dropped.
#[derive(Clone, Debug)]
pub struct SampleBacklog {
    queued: Arc<AtomicUsize>,
    limit: usize,
}

impl SampleBacklog {
    pub const DEFAULT_LIMIT: usize = 64;

    pub fn new(limit: usize) -> Self {
        Self {
            queued: Arc::new(AtomicUsize::new(0)),
            limit,
        }
    }

    fn try_reserve(&self) -> bool {
        self.queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .is_ok()
    }

    pub fn release(&self) {
        self.queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .ok();
    }
}

impl Default for SampleBacklog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT)
    }
}

fn make_transport(mode: ConnectionMode, events: &Sender<Tagged>, config: &AppConfig) -> DynTransport {
    match mode {
        ConnectionMode::Live => Box::new(WsTransport::new(events.clone())),
        ConnectionMode::Simulation => {
            Box::new(SimTransport::new(events.clone(), &config.device_source))
        }
    }
}

fn forward(tx: &Sender<EngineMessage>, backlog: &SampleBacklog, updates: Vec<LinkUpdate>) {
    for update in updates {
        let msg = match update {
            LinkUpdate::State(state) => EngineMessage::State(state),
            LinkUpdate::ReconnectScheduled { attempt, delay } => {
                EngineMessage::ReconnectScheduled { attempt, delay }
            }
            LinkUpdate::PeerDevice(connected) => EngineMessage::PeerDevice(connected),
            LinkUpdate::Sample(sample) => {
                if !backlog.try_reserve() {
                    log::debug!("GUI is behind, dropping sample");
                    continue;
                }
                EngineMessage::Sample(sample)
            }
        };
        tx.send(msg).ok();
    }
}

/// Runs the connection on its own thread. The GUI talks to it only through
/// the two channels.
pub fn spawn_thread(
    tx: Sender<EngineMessage>,
    rx_cmd: Receiver<GuiCommand>,
    backlog: SampleBacklog,
    config: AppConfig,
) {
    thread::spawn(move || {
        let link = config.link_config();
        tx.send(EngineMessage::Log(format!("Engine ready. Server: {}", link.url)))
            .ok();

        let (events_tx, events_rx) = mpsc::channel::<Tagged>();
        let mut mode = config.start_mode;
        let mut manager: ConnectionManager<DynTransport> =
            ConnectionManager::new(make_transport(mode, &events_tx, &config), link);

        loop {
            // 1. GUI commands
            loop {
                let cmd = match rx_cmd.try_recv() {
                    Ok(cmd) => cmd,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        manager.shutdown();
                        return;
                    }
                };
                match cmd {
                    GuiCommand::Connect(requested) => {
                        if requested != mode {
                            mode = requested;
                            let transport = make_transport(mode, &events_tx, &config);
                            forward(&tx, &backlog, manager.replace_transport(transport));
                            tx.send(EngineMessage::Log(format!("Source: {}", mode.label())))
                                .ok();
                        }
                        forward(&tx, &backlog, manager.start(Instant::now()));
                    }
                    GuiCommand::Disconnect => forward(&tx, &backlog, manager.shutdown()),
                    GuiCommand::ApplyFilter(settings) => {
                        let outcome =
                            match apply_filter(&mut manager, &settings, &config.command_target) {
                                Ok(true) => FilterOutcome::Sent(settings),
                                Ok(false) => FilterOutcome::NotConnected,
                                Err(err) => FilterOutcome::Rejected(err.to_string()),
                            };
                        tx.send(EngineMessage::Filter(outcome)).ok();
                    }
                    GuiCommand::Shutdown => {
                        manager.shutdown();
                        log::info!("engine stopped");
                        return;
                    }
                }
            }

            // 2. Transport events, waiting no longer than the next timer
            let now = Instant::now();
            let wait = manager
                .next_deadline()
                .map_or(IDLE_WAIT, |d| d.saturating_duration_since(now).min(IDLE_WAIT));
            match events_rx.recv_timeout(wait) {
                Ok(tagged) => {
                    forward(&tx, &backlog, manager.handle(tagged, Instant::now()));
                    while let Ok(tagged) = events_rx.try_recv() {
                        forward(&tx, &backlog, manager.handle(tagged, Instant::now()));
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
            }

            // 3. Reconnect timer
            forward(&tx, &backlog, manager.poll(Instant::now()));
        }
    });
}
