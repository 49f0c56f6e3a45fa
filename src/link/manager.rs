use std::time::{Duration, Instant};

use crate::link::backoff::Backoff;
use crate::link::timer::{TimerId, TimerQueue};
use crate::link::transport::{Tagged, Transport, TransportEvent};
use crate::stream::message::{decode, Inbound};
use crate::stream::sample::Sample;
use crate::stream::settings::CommandSink;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Open => "Connected",
            ConnectionState::Closing => "Closing",
        }
    }
}

/// Observable changes produced by the manager, in the order they happened.
#[derive(Clone, Debug, PartialEq)]
pub enum LinkUpdate {
    State(ConnectionState),
    ReconnectScheduled { attempt: u32, delay: Duration },
    PeerDevice(bool),
    Sample(Sample),
}

#[derive(Clone, Debug)]
pub struct LinkConfig {
    pub url: String,
    pub device_source: String,
    pub backoff: Backoff,
}

/// Owns the single live connection, its state machine and the reconnect
/// policy. All inputs are explicit calls carrying `now`; the caller drives
/// `poll` from its own loop.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    config: LinkConfig,
    state: ConnectionState,
    attempts: u32,
    timers: TimerQueue,
    reconnect_timer: Option<TimerId>,
    suppress_reconnect: bool,
    peer_connected: bool,
    generation: u64,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, config: LinkConfig) -> Self {
        Self {
            transport,
            config,
            state: ConnectionState::Disconnected,
            attempts: 0,
            timers: TimerQueue::new(),
            reconnect_timer: None,
            suppress_reconnect: false,
            peer_connected: false,
            generation: 0,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[cfg(test)]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[cfg(test)]
    pub fn peer_connected(&self) -> bool {
        self.peer_connected
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// User-initiated connect: re-enables automatic reconnects.
    pub fn start(&mut self, now: Instant) -> Vec<LinkUpdate> {
        self.suppress_reconnect = false;
        self.connect(now)
    }

    /// No-op while a connection is being made or is already up.
    pub fn connect(&mut self, now: Instant) -> Vec<LinkUpdate> {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open
        ) {
            log::debug!("connect ignored while {:?}", self.state);
            return Vec::new();
        }
        self.cancel_reconnect();
        self.generation += 1;
        let mut updates = vec![self.transition(ConnectionState::Connecting)];
        if let Err(err) = self.transport.open(&self.config.url, self.generation) {
            log::warn!("failed to open connection: {err}");
            updates.extend(self.connection_lost(now));
        }
        updates
    }

    pub fn handle(&mut self, tagged: Tagged, now: Instant) -> Vec<LinkUpdate> {
        if tagged.generation != self.generation {
            log::debug!(
                "ignoring {:?} from stale connection {}",
                tagged.event,
                tagged.generation
            );
            return Vec::new();
        }
        match tagged.event {
            TransportEvent::Opened => {
                if self.state != ConnectionState::Connecting {
                    return Vec::new();
                }
                self.attempts = 0;
                self.cancel_reconnect();
                log::info!("connected to {}", self.config.url);
                vec![self.transition(ConnectionState::Open)]
            }
            TransportEvent::Text(text) => {
                if self.state != ConnectionState::Open {
                    return Vec::new();
                }
                self.inbound(&text)
            }
            TransportEvent::Error(err) => {
                log::warn!("connection error: {err}");
                self.connection_lost(now)
            }
            TransportEvent::Closed => self.connection_lost(now),
        }
    }

    /// Fires due timers. The only timer this manager arms is the reconnect.
    pub fn poll(&mut self, now: Instant) -> Vec<LinkUpdate> {
        let mut updates = Vec::new();
        for id in self.timers.pop_due(now) {
            if self.reconnect_timer != Some(id) {
                continue;
            }
            self.reconnect_timer = None;
            if !self.suppress_reconnect {
                updates.extend(self.connect(now));
            }
        }
        updates
    }

    /// Returns false without touching anything unless the link is open.
    pub fn send(&mut self, text: &str) -> bool {
        if self.state != ConnectionState::Open {
            return false;
        }
        match self.transport.send(text.to_owned()) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("send failed: {err}");
                false
            }
        }
    }

    /// Intentional close. The close notification that follows lands in
    /// `Disconnected` without re-arming a reconnect.
    pub fn shutdown(&mut self) -> Vec<LinkUpdate> {
        self.suppress_reconnect = true;
        self.cancel_reconnect();
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                self.transport.close();
                vec![self.transition(ConnectionState::Closing)]
            }
            ConnectionState::Disconnected | ConnectionState::Closing => Vec::new(),
        }
    }

    /// Swaps the transport. Anything still in flight from the old one is
    /// ignored from here on.
    pub fn replace_transport(&mut self, transport: T) -> Vec<LinkUpdate> {
        self.transport.close();
        self.transport = transport;
        self.cancel_reconnect();
        self.generation += 1;
        self.attempts = 0;
        if self.state == ConnectionState::Disconnected {
            return Vec::new();
        }
        vec![self.transition(ConnectionState::Disconnected)]
    }

    fn inbound(&mut self, text: &str) -> Vec<LinkUpdate> {
        match decode(text, &self.config.device_source) {
            Some(Inbound::Telemetry(sample)) | Some(Inbound::Backlog(Some(sample))) => {
                vec![LinkUpdate::Sample(sample)]
            }
            Some(Inbound::PeerStatus(connected)) => {
                if self.peer_connected != connected {
                    log::info!(
                        "sensor device {}",
                        if connected { "connected" } else { "disconnected" }
                    );
                }
                self.peer_connected = connected;
                vec![LinkUpdate::PeerDevice(connected)]
            }
            Some(Inbound::Backlog(None)) | Some(Inbound::Heartbeat) | None => Vec::new(),
        }
    }

    fn connection_lost(&mut self, now: Instant) -> Vec<LinkUpdate> {
        if self.state == ConnectionState::Disconnected {
            return Vec::new();
        }
        // Retire this generation so a trailing `Closed` after an `Error`
        // cannot schedule a second reconnect.
        self.transport.close();
        self.generation += 1;
        let mut updates = vec![self.transition(ConnectionState::Disconnected)];
        if self.suppress_reconnect {
            return updates;
        }
        updates.push(self.schedule_reconnect(now));
        updates
    }

    fn schedule_reconnect(&mut self, now: Instant) -> LinkUpdate {
        self.cancel_reconnect();
        let delay = self.config.backoff.delay(self.attempts);
        self.attempts = self.attempts.saturating_add(1);
        self.reconnect_timer = Some(self.timers.schedule(now, delay));
        log::info!(
            "reconnecting in {} ms (attempt {})",
            delay.as_millis(),
            self.attempts
        );
        LinkUpdate::ReconnectScheduled {
            attempt: self.attempts,
            delay,
        }
    }

    fn cancel_reconnect(&mut self) {
        if let Some(id) = self.reconnect_timer.take() {
            self.timers.cancel(id);
        }
    }

    fn transition(&mut self, next: ConnectionState) -> LinkUpdate {
        log::debug!("connection {:?} -> {:?}", self.state, next);
        self.state = next;
        LinkUpdate::State(next)
    }
}

impl<T: Transport> CommandSink for ConnectionManager<T> {
    fn send(&mut self, text: &str) -> bool {
        ConnectionManager::send(self, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MonitorError;

    #[derive(Default)]
    struct MockTransport {
        opened: Vec<u64>,
        sent: Vec<String>,
        closes: usize,
        fail_open: bool,
    }

    impl Transport for MockTransport {
        fn open(&mut self, _url: &str, generation: u64) -> Result<(), MonitorError> {
            if self.fail_open {
                return Err(MonitorError::Transport("refused".into()));
            }
            self.opened.push(generation);
            Ok(())
        }

        fn send(&mut self, text: String) -> Result<(), MonitorError> {
            self.sent.push(text);
            Ok(())
        }

        fn close(&mut self) {
            self.closes += 1;
        }
    }

    fn manager() -> ConnectionManager<MockTransport> {
        ConnectionManager::new(
            MockTransport::default(),
            LinkConfig {
                url: "ws://test/ws-dashboard".into(),
                device_source: "esp32".into(),
                backoff: Backoff::default(),
            },
        )
    }

    fn current(m: &ConnectionManager<MockTransport>, event: TransportEvent) -> Tagged {
        Tagged {
            generation: m.generation,
            event,
        }
    }

    fn scheduled_delay(updates: &[LinkUpdate]) -> Option<u128> {
        updates.iter().find_map(|u| match u {
            LinkUpdate::ReconnectScheduled { delay, .. } => Some(delay.as_millis()),
            _ => None,
        })
    }

    #[test]
    fn opens_and_resets_attempts() {
        let t0 = Instant::now();
        let mut m = manager();
        assert_eq!(
            m.start(t0),
            vec![LinkUpdate::State(ConnectionState::Connecting)]
        );
        let opened = current(&m, TransportEvent::Opened);
        assert_eq!(
            m.handle(opened, t0),
            vec![LinkUpdate::State(ConnectionState::Open)]
        );
        assert_eq!(m.attempts(), 0);
        assert_eq!(m.transport().opened, vec![1]);
    }

    #[test]
    fn second_connect_is_a_no_op() {
        let t0 = Instant::now();
        let mut m = manager();
        m.start(t0);
        assert!(m.connect(t0).is_empty());
        let opened = current(&m, TransportEvent::Opened);
        m.handle(opened, t0);
        assert!(m.start(t0).is_empty());
        assert_eq!(m.transport().opened.len(), 1);
    }

    #[test]
    fn send_requires_open() {
        let t0 = Instant::now();
        let mut m = manager();
        assert!(!m.send("x"));
        m.start(t0);
        assert!(!m.send("x"));
        assert!(m.transport().sent.is_empty());
        let opened = current(&m, TransportEvent::Opened);
        m.handle(opened, t0);
        assert!(m.send("x"));
        assert_eq!(m.transport().sent, vec!["x".to_owned()]);
    }

    #[test]
    fn backoff_grows_across_failed_attempts() {
        let mut now = Instant::now();
        let mut m = manager();
        m.start(now);
        let mut delays = Vec::new();
        for _ in 0..7 {
            let closed = current(&m, TransportEvent::Closed);
            let updates = m.handle(closed, now);
            assert_eq!(m.state(), ConnectionState::Disconnected);
            let delay = scheduled_delay(&updates).unwrap();
            delays.push(delay);
            // One millisecond short of the deadline nothing happens.
            now += Duration::from_millis(delay as u64 - 1);
            assert!(m.poll(now).is_empty());
            now += Duration::from_millis(1);
            assert_eq!(
                m.poll(now),
                vec![LinkUpdate::State(ConnectionState::Connecting)]
            );
        }
        assert_eq!(delays, vec![100, 200, 400, 800, 1600, 3200, 5000]);
    }

    #[test]
    fn successful_open_resets_backoff() {
        let mut now = Instant::now();
        let mut m = manager();
        m.start(now);
        for _ in 0..3 {
            let closed = current(&m, TransportEvent::Closed);
            m.handle(closed, now);
            now += Duration::from_secs(10);
            m.poll(now);
        }
        assert_eq!(m.attempts(), 3);
        let opened = current(&m, TransportEvent::Opened);
        m.handle(opened, now);
        let closed = current(&m, TransportEvent::Closed);
        assert_eq!(scheduled_delay(&m.handle(closed, now)), Some(100));
    }

    #[test]
    fn error_then_close_arms_one_timer() {
        let t0 = Instant::now();
        let mut m = manager();
        m.start(t0);
        let generation = m.generation;
        let first = m.handle(
            Tagged {
                generation,
                event: TransportEvent::Error("reset".into()),
            },
            t0,
        );
        assert_eq!(scheduled_delay(&first), Some(100));
        let second = m.handle(
            Tagged {
                generation,
                event: TransportEvent::Closed,
            },
            t0,
        );
        assert!(second.is_empty());
        assert_eq!(m.timers.len(), 1);
    }

    #[test]
    fn stale_events_are_ignored() {
        let t0 = Instant::now();
        let mut m = manager();
        m.start(t0);
        let stale = Tagged {
            generation: m.generation - 1,
            event: TransportEvent::Opened,
        };
        assert!(m.handle(stale, t0).is_empty());
        assert_eq!(m.state(), ConnectionState::Connecting);
    }

    #[test]
    fn shutdown_suppresses_reconnect() {
        let t0 = Instant::now();
        let mut m = manager();
        m.start(t0);
        let opened = current(&m, TransportEvent::Opened);
        m.handle(opened, t0);
        assert_eq!(
            m.shutdown(),
            vec![LinkUpdate::State(ConnectionState::Closing)]
        );
        assert_eq!(m.transport().closes, 1);
        let closed = current(&m, TransportEvent::Closed);
        assert_eq!(
            m.handle(closed, t0),
            vec![LinkUpdate::State(ConnectionState::Disconnected)]
        );
        assert_eq!(m.next_deadline(), None);
        assert!(m.poll(t0 + Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn shutdown_cancels_pending_reconnect() {
        let t0 = Instant::now();
        let mut m = manager();
        m.start(t0);
        let closed = current(&m, TransportEvent::Closed);
        m.handle(closed, t0);
        assert!(m.next_deadline().is_some());
        assert!(m.shutdown().is_empty());
        assert_eq!(m.next_deadline(), None);
        // An explicit connect afterwards works again.
        assert_eq!(
            m.start(t0),
            vec![LinkUpdate::State(ConnectionState::Connecting)]
        );
    }

    #[test]
    fn failed_open_schedules_reconnect() {
        let t0 = Instant::now();
        let mut m = manager();
        m.transport.fail_open = true;
        let updates = m.start(t0);
        assert_eq!(updates[0], LinkUpdate::State(ConnectionState::Connecting));
        assert_eq!(updates[1], LinkUpdate::State(ConnectionState::Disconnected));
        assert_eq!(scheduled_delay(&updates), Some(100));
    }

    #[test]
    fn routes_inbound_frames() {
        let t0 = Instant::now();
        let mut m = manager();
        m.start(t0);
        let early = current(
            &m,
            TransportEvent::Text(r#"{"source":"esp32","volume":10,"peakToPeak":1}"#.into()),
        );
        assert!(m.handle(early, t0).is_empty());
        let opened = current(&m, TransportEvent::Opened);
        m.handle(opened, t0);

        let status = current(
            &m,
            TransportEvent::Text(r#"{"type":"esp32_status","connected":true}"#.into()),
        );
        assert_eq!(m.handle(status, t0), vec![LinkUpdate::PeerDevice(true)]);
        assert!(m.peer_connected());

        let telemetry = current(
            &m,
            TransportEvent::Text(r#"{"source":"esp32","volume":-5,"peakToPeak":1}"#.into()),
        );
        match m.handle(telemetry, t0).as_slice() {
            [LinkUpdate::Sample(s)] => assert_eq!(s.volume, 0.0),
            other => panic!("unexpected {other:?}"),
        }

        let junk = current(&m, TransportEvent::Text("{{".into()));
        assert!(m.handle(junk, t0).is_empty());
        let beat = current(&m, TransportEvent::Text(r#"{"type":"heartbeat"}"#.into()));
        assert!(m.handle(beat, t0).is_empty());

        m.shutdown();
        assert_eq!(m.state(), ConnectionState::Closing);
        let late = current(
            &m,
            TransportEvent::Text(r#"{"source":"esp32","volume":10,"peakToPeak":1}"#.into()),
        );
        assert!(m.handle(late, t0).is_empty());
    }

    #[test]
    fn peer_flag_survives_transport_loss() {
        let t0 = Instant::now();
        let mut m = manager();
        m.start(t0);
        let opened = current(&m, TransportEvent::Opened);
        m.handle(opened, t0);
        let status = current(
            &m,
            TransportEvent::Text(r#"{"type":"esp32_status","connected":true}"#.into()),
        );
        m.handle(status, t0);
        let closed = current(&m, TransportEvent::Closed);
        m.handle(closed, t0);
        assert!(m.peer_connected());
    }
}
