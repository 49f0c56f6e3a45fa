use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::error::MonitorError;

/// What a transport worker reports back to the connection manager.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    Opened,
    Text(String),
    Error(String),
    Closed,
}

/// An event stamped with the connection generation that produced it, so the
/// manager can ignore leftovers from a connection it already gave up on.
#[derive(Clone, Debug, PartialEq)]
pub struct Tagged {
    pub generation: u64,
    pub event: TransportEvent,
}

pub trait Transport {
    /// Starts connecting. Completion is reported later as `Opened`, or as
    /// `Error`/`Closed`, on the event channel the transport was built with.
    fn open(&mut self, url: &str, generation: u64) -> Result<(), MonitorError>;
    fn send(&mut self, text: String) -> Result<(), MonitorError>;
    /// Requests a close. The worker still reports `Closed` once it is done.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, url: &str, generation: u64) -> Result<(), MonitorError> {
        (**self).open(url, generation)
    }

    fn send(&mut self, text: String) -> Result<(), MonitorError> {
        (**self).send(text)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

pub(crate) enum Outbound {
    Text(String),
    Close,
}

/// Sends one tagged event; a dropped receiver only means the engine is gone.
pub(crate) fn emit(events: &Sender<Tagged>, generation: u64, event: TransportEvent) {
    events.send(Tagged { generation, event }).ok();
}

const READ_POLL: Duration = Duration::from_millis(25);
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// WebSocket transport. Each `open` spawns one worker thread that owns the
/// socket; the transport keeps only the outbound channel.
pub struct WsTransport {
    events: Sender<Tagged>,
    outbound: Option<Sender<Outbound>>,
}

impl WsTransport {
    pub fn new(events: Sender<Tagged>) -> Self {
        Self {
            events,
            outbound: None,
        }
    }
}

impl Transport for WsTransport {
    fn open(&mut self, url: &str, generation: u64) -> Result<(), MonitorError> {
        self.close();
        let (tx, rx) = mpsc::channel();
        let events = self.events.clone();
        let url = url.to_owned();
        thread::Builder::new()
            .name(format!("ws-link-{generation}"))
            .spawn(move || run_socket(&url, generation, &events, rx))
            .map_err(|err| MonitorError::Transport(err.to_string()))?;
        self.outbound = Some(tx);
        Ok(())
    }

    fn send(&mut self, text: String) -> Result<(), MonitorError> {
        let tx = self.outbound.as_ref().ok_or(MonitorError::NotOpen)?;
        tx.send(Outbound::Text(text))
            .map_err(|_| MonitorError::Transport("socket worker has exited".into()))
    }

    fn close(&mut self) {
        if let Some(tx) = self.outbound.take() {
            tx.send(Outbound::Close).ok();
        }
    }
}

fn run_socket(url: &str, generation: u64, events: &Sender<Tagged>, outbound: Receiver<Outbound>) {
    log::info!("connecting to {url}");
    let mut socket = match tungstenite::connect(url) {
        Ok((socket, _response)) => socket,
        Err(err) => {
            emit(events, generation, TransportEvent::Error(err.to_string()));
            emit(events, generation, TransportEvent::Closed);
            return;
        }
    };
    if let Err(err) = set_read_timeout(&socket, Some(READ_POLL)) {
        log::warn!("could not set socket read timeout: {err}");
    }
    emit(events, generation, TransportEvent::Opened);

    let mut closing_since: Option<Instant> = None;
    loop {
        if closing_since.is_none() {
            if let Err(err) = pump_outbound(&mut socket, &outbound, &mut closing_since) {
                emit(events, generation, TransportEvent::Error(err.to_string()));
                break;
            }
        }
        if closing_since.map_or(false, |since| since.elapsed() > CLOSE_GRACE) {
            break;
        }
        match socket.read() {
            Ok(Message::Text(text)) => emit(events, generation, TransportEvent::Text(text)),
            Ok(Message::Close(_)) => {
                // tungstenite queues the close reply; flush it out.
                socket.flush().ok();
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(err))
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => break,
            Err(err) => {
                if closing_since.is_none() {
                    emit(events, generation, TransportEvent::Error(err.to_string()));
                }
                break;
            }
        }
    }
    log::info!("socket to {url} closed");
    emit(events, generation, TransportEvent::Closed);
}

fn pump_outbound(
    socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
    outbound: &Receiver<Outbound>,
    closing_since: &mut Option<Instant>,
) -> Result<(), tungstenite::Error> {
    loop {
        match outbound.try_recv() {
            Ok(Outbound::Text(text)) => socket.send(Message::Text(text))?,
            Ok(Outbound::Close) | Err(TryRecvError::Disconnected) => {
                socket.close(None)?;
                socket.flush().ok();
                *closing_since = Some(Instant::now());
                return Ok(());
            }
            Err(TryRecvError::Empty) => return Ok(()),
        }
    }
}

fn set_read_timeout(
    socket: &WebSocket<MaybeTlsStream<TcpStream>>,
    timeout: Option<Duration>,
) -> std::io::Result<()> {
    match socket.get_ref() {
        MaybeTlsStream::Plain(stream) => stream.set_read_timeout(timeout),
        MaybeTlsStream::Rustls(stream) => stream.sock.set_read_timeout(timeout),
        _ => Ok(()),
    }
}
