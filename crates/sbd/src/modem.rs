//! The modem driver: reader/writer tasks plus the command/response exchanges
//! built on them.
//!
//! One exchange is outstanding at a time. The inbound line receiver lives
//! behind a mutex that each operation holds for its full request/response
//! sequence, so concurrent callers (the broadcast loop, an ad-hoc device
//! time probe) serialize cleanly on the half-duplex line instead of stealing
//! each other's responses.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures_util::StreamExt;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

use crate::codec::AtCodec;
use crate::status::{self, SessionStatus, MO_STATUS_SENT};
use crate::{SbdConfig, SbdError};

const PING: &str = "AT";
const DISABLE_FLOW_CONTROL: &str = "AT&K0";
const CLEAR_BUFFERS: &str = "AT+SBDD0";
const WRITE_TEXT: &str = "AT+SBDWT=";
const WRITE_BINARY: &str = "AT+SBDWB=";
const START_SESSION: &str = "AT+SBDI";
const SIGNAL_QUALITY: &str = "AT+CSQ";
const SYSTEM_TIME: &str = "AT-MSSTM";

const SESSION_PREFIX: &str = "+SBDI:";
const SIGNAL_PREFIX: &str = "+CSQ:";
const TIME_PREFIX: &str = "-MSSTM:";

const CHANNEL_DEPTH: usize = 32;
const HISTORY_LIMIT: usize = 64;

/// What a wait is looking for in the inbound line stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Exact(&'static str),
    Prefix(&'static str),
}

impl Expect {
    fn matches(&self, line: &str) -> bool {
        match self {
            Expect::Exact(s) => line == *s,
            Expect::Prefix(p) => line.starts_with(p),
        }
    }
}

/// Snapshot of the values the reader task captures opportunistically from
/// any status frame it sees, solicited or not.
#[derive(Debug, Default)]
struct ModemState {
    session: Option<SessionStatus>,
    signal_quality: Option<i32>,
    system_time: Option<SystemTime>,
}

pub struct SbdModem {
    out_tx: mpsc::Sender<Vec<u8>>,
    /// Held across one full command/response exchange.
    exchange: Mutex<mpsc::Receiver<String>>,
    state: Arc<Mutex<ModemState>>,
    history: Mutex<VecDeque<String>>,
    response_timeout: Duration,
    shutdown: CancellationToken,
}

impl SbdModem {
    /// Open the configured serial port and attach a driver to it.
    pub fn open(config: &SbdConfig, shutdown: CancellationToken) -> Result<Self, SbdError> {
        let builder = tokio_serial::new(&config.device, config.baud);
        let port = tokio_serial::SerialStream::open(&builder)?;
        Ok(Self::attach(port, config, shutdown))
    }

    /// Attach a driver to an already-open byte stream and spawn its reader
    /// and writer tasks. The tasks run until the stream ends or the
    /// cancellation token fires.
    pub fn attach<S>(stream: S, config: &SbdConfig, shutdown: CancellationToken) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (line_tx, line_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (out_tx, out_rx) = mpsc::channel(CHANNEL_DEPTH);
        let state = Arc::new(Mutex::new(ModemState::default()));

        tokio::spawn(read_task(reader, line_tx, state.clone(), shutdown.clone()));
        tokio::spawn(write_task(writer, out_rx, shutdown.clone()));

        Self {
            out_tx,
            exchange: Mutex::new(line_rx),
            state,
            history: Mutex::new(VecDeque::with_capacity(HISTORY_LIMIT)),
            response_timeout: config.response_timeout,
            shutdown,
        }
    }

    /// Liveness check and flow control setup. Run once after attach.
    pub async fn init(&self) -> Result<(), SbdError> {
        let mut rx = self.exchange.lock().await;
        self.simple_command(&mut rx, PING).await?;
        self.simple_command(&mut rx, DISABLE_FLOW_CONTROL).await?;
        Ok(())
    }

    /// Clear the modem's message buffers.
    pub async fn clear_buffers(&self) -> Result<(), SbdError> {
        let mut rx = self.exchange.lock().await;
        self.simple_command(&mut rx, CLEAR_BUFFERS).await
    }

    /// Queue a text message and initiate a session.
    ///
    /// Succeeds only if the network reports the message delivered; any other
    /// disposition comes back as [`SbdError::SendFailed`] with the full
    /// session status.
    pub async fn send_text(&self, msg: &str) -> Result<(), SbdError> {
        let mut rx = self.exchange.lock().await;
        self.simple_command(&mut rx, CLEAR_BUFFERS).await?;
        self.simple_command(&mut rx, &format!("{WRITE_TEXT}{msg}")).await?;

        self.command(START_SESSION).await?;
        let frame = self.wait_for(&mut rx, Expect::Prefix(SESSION_PREFIX)).await?;
        let session = status::parse_session_status(&frame)?;
        self.wait_for(&mut rx, Expect::Exact("OK")).await?;

        if session.mo_status != MO_STATUS_SENT {
            return Err(SbdError::SendFailed(session));
        }
        Ok(())
    }

    /// Transfer a binary payload and initiate a session.
    ///
    /// The payload length is announced first; once the modem reports READY
    /// the payload is written followed by its 16-bit checksum, and the modem
    /// answers `0` when the checksum agrees.
    pub async fn send_binary(&self, payload: &[u8]) -> Result<(), SbdError> {
        let mut rx = self.exchange.lock().await;

        self.command(&format!("{WRITE_BINARY}{}", payload.len())).await?;
        self.wait_for(&mut rx, Expect::Exact("READY")).await?;

        let mut framed = payload.to_vec();
        framed.extend_from_slice(&status::binary_checksum(payload));
        self.write_raw(framed).await?;
        self.wait_for(&mut rx, Expect::Exact("0")).await?;

        self.command(START_SESSION).await?;
        let frame = self.wait_for(&mut rx, Expect::Prefix(SESSION_PREFIX)).await?;
        let session = status::parse_session_status(&frame)?;

        if session.mo_status != MO_STATUS_SENT {
            return Err(SbdError::SendFailed(session));
        }
        Ok(())
    }

    /// Query signal quality (0 = no signal, 5 = best).
    pub async fn signal_quality(&self) -> Result<i32, SbdError> {
        let mut rx = self.exchange.lock().await;
        self.command(SIGNAL_QUALITY).await?;
        let line = self.wait_for(&mut rx, Expect::Prefix(SIGNAL_PREFIX)).await?;
        status::parse_signal_quality(&line)
    }

    /// Query the device time, derived from the network's tick counter.
    pub async fn system_time(&self) -> Result<SystemTime, SbdError> {
        let mut rx = self.exchange.lock().await;
        self.command(SYSTEM_TIME).await?;
        let line = self.wait_for(&mut rx, Expect::Prefix(TIME_PREFIX)).await?;
        let time = status::parse_system_time(&line)?;
        self.wait_for(&mut rx, Expect::Exact("OK")).await?;
        Ok(time)
    }

    /// Poll signal quality every five seconds until it is nonzero, giving up
    /// after `limit`.
    pub async fn wait_for_network(&self, limit: Duration) -> Result<(), SbdError> {
        let deadline = tokio::time::sleep(limit);
        tokio::pin!(deadline);
        let mut check = tokio::time::interval(Duration::from_secs(5));
        check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(SbdError::Closed),
                _ = &mut deadline => return Err(SbdError::Timeout),
                _ = check.tick() => {
                    let signal = self.signal_quality().await?;
                    if signal != 0 {
                        debug!("network acquired, signal quality {signal}");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Session status captured from the most recent `+SBDI:`/`+SBDIX:`
    /// frame, solicited or not.
    pub async fn last_session_status(&self) -> Option<SessionStatus> {
        self.state.lock().await.session
    }

    /// Signal quality captured from the most recent `+CSQ:` frame.
    pub async fn last_signal_quality(&self) -> Option<i32> {
        self.state.lock().await.signal_quality
    }

    /// Device time captured from the most recent `-MSSTM:` frame.
    pub async fn last_system_time(&self) -> Option<SystemTime> {
        self.state.lock().await.system_time
    }

    /// The most recent lines seen by waits, oldest first.
    pub async fn history(&self) -> Vec<String> {
        self.history.lock().await.iter().cloned().collect()
    }

    /// Issue a command and wait for the plain `OK` acknowledgment.
    async fn simple_command(
        &self,
        rx: &mut mpsc::Receiver<String>,
        cmd: &str,
    ) -> Result<(), SbdError> {
        self.command(cmd).await?;
        self.wait_for(rx, Expect::Exact("OK")).await?;
        Ok(())
    }

    /// Queue a CR-terminated command line for the writer task.
    async fn command(&self, cmd: &str) -> Result<(), SbdError> {
        debug!("sent: {cmd}");
        let mut bytes = cmd.as_bytes().to_vec();
        bytes.push(b'\r');
        self.out_tx.send(bytes).await.map_err(|_| SbdError::Closed)
    }

    /// Queue raw bytes (binary payload, no terminator) for the writer task.
    async fn write_raw(&self, data: Vec<u8>) -> Result<(), SbdError> {
        self.out_tx.send(data).await.map_err(|_| SbdError::Closed)
    }

    /// Block on the inbound line stream until a line matches `expect`,
    /// returning the matched line. Every line seen meanwhile is recorded in
    /// the history buffer. Fails with [`SbdError::Timeout`] after the
    /// configured response timeout, or [`SbdError::Closed`] on cancellation
    /// or reader exit.
    async fn wait_for(
        &self,
        rx: &mut mpsc::Receiver<String>,
        expect: Expect,
    ) -> Result<String, SbdError> {
        let deadline = tokio::time::sleep(self.response_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(SbdError::Closed),
                _ = &mut deadline => return Err(SbdError::Timeout),
                line = rx.recv() => {
                    let Some(line) = line else { return Err(SbdError::Closed) };
                    debug!("received: {line}");
                    self.record(&line).await;
                    if expect.matches(&line) {
                        return Ok(line);
                    }
                }
            }
        }
    }

    async fn record(&self, line: &str) {
        let mut history = self.history.lock().await;
        if history.len() == HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(line.to_string());
    }
}

/// Reads lines off the device, captures known status frames into the shared
/// snapshot, and forwards every line to the waiting exchange.
async fn read_task<R>(
    reader: R,
    line_tx: mpsc::Sender<String>,
    state: Arc<Mutex<ModemState>>,
    shutdown: CancellationToken,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = FramedRead::new(reader, AtCodec::new());
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            next = lines.next() => match next {
                Some(Ok(line)) => {
                    capture_frame(&line, &state).await;
                    if line_tx.send(line).await.is_err() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!("serial read error: {e}");
                    break;
                }
                None => {
                    debug!("serial stream ended");
                    break;
                }
            }
        }
    }
}

/// Status frames update the snapshot whether or not anyone asked for them;
/// a frame that fails to parse leaves the previous snapshot intact.
async fn capture_frame(line: &str, state: &Mutex<ModemState>) {
    if line.starts_with("+SBDI") {
        match status::parse_session_status(line) {
            Ok(session) => state.lock().await.session = Some(session),
            Err(e) => warn!("{e}"),
        }
    } else if line.starts_with(SIGNAL_PREFIX) {
        match status::parse_signal_quality(line) {
            Ok(signal) => state.lock().await.signal_quality = Some(signal),
            Err(e) => warn!("{e}"),
        }
    } else if line.starts_with(TIME_PREFIX) {
        match status::parse_system_time(line) {
            Ok(time) => state.lock().await.system_time = Some(time),
            Err(e) => debug!("{e}"),
        }
    }
}

/// Drains the outbound queue onto the device in order. Write failures are
/// logged and the queue keeps draining; the caller's retry is the whole
/// send operation.
async fn write_task<W>(
    mut writer: W,
    mut out_rx: mpsc::Receiver<Vec<u8>>,
    shutdown: CancellationToken,
) where
    W: AsyncWrite + Unpin + Send + 'static,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            chunk = out_rx.recv() => {
                let Some(chunk) = chunk else { break };
                if let Err(e) = writer.write_all(&chunk).await {
                    warn!("serial write error: {e}");
                    continue;
                }
                if let Err(e) = writer.flush().await {
                    warn!("serial write error: {e}");
                }
            }
        }
    }
}
