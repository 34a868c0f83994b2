//! Call lifecycle.
//!
//! A [`CallDriver`] owns every resource of the call (microphone, speaker,
//! session, playback timeline) and reacts to one [`CallEvent`] at a time.
//! Captured chunks, connect results and session events share one bounded
//! queue; UI commands have their own unbounded channel that is always drained
//! first, so a full audio queue never swallows a hang-up. No two handlers ever
//! run concurrently and teardown can be triggered from any of them.
//!
//! ```text
//! Idle --start--> Connecting --connected--> Connected --stop/remote close--> Idle
//!                      |                        |
//!                      +--------failure---------+--> Error --start--> Connecting
//! ```
//!
//! Every start and every teardown bumps a generation counter. Connect results
//! and session events carry the generation they were created for; anything
//! older is ignored, and a session that shows up late is closed right away.

use std::sync::Arc;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audio::{AudioFrame, EncodedChunk, PlaybackScheduler};
use crate::io::{AudioDevices, DeviceGuard};
use crate::live::LiveConfig;
use crate::live::capture::CapturePipeline;
use crate::live::error::CallError;
use crate::live::transport::{EventSink, LiveSession, LiveTransport, SessionEvent};
use crate::pipeline::{Pullable, Pushable};
use crate::state::{CallState, CallStatus};

pub enum CallEvent {
    Start,
    Stop,
    SetMuted(bool),
    Shutdown,
    Connected {
        generation: u64,
        result: Result<Box<dyn LiveSession>, CallError>,
    },
    /// A captured and encoded frame, ready for the session.
    Outbound(EncodedChunk),
    Session {
        generation: u64,
        event: SessionEvent,
    },
}

/// Feeds encoded capture frames into the call queue without blocking the
/// audio thread.
struct OutboundSink {
    tx: mpsc::Sender<CallEvent>,
    state: Arc<CallState>,
}

impl Pushable<EncodedChunk> for OutboundSink {
    fn push(&self, chunk: EncodedChunk) {
        match self.tx.try_send(CallEvent::Outbound(chunk)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.state.record_frame_dropped();
                warn!("Call event queue full, dropping captured frame");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Call driver gone, dropping captured frame");
            }
        }
    }
}

/// Cloneable front end of a call, used by the UI.
#[derive(Clone)]
pub struct CallHandle {
    commands: mpsc::UnboundedSender<CallEvent>,
    state: Arc<CallState>,
}

impl CallHandle {
    pub fn start(&self) {
        self.send(CallEvent::Start);
    }

    pub fn stop(&self) {
        self.send(CallEvent::Stop);
    }

    pub fn set_muted(&self, muted: bool) {
        self.send(CallEvent::SetMuted(muted));
    }

    pub fn shutdown(&self) {
        self.send(CallEvent::Shutdown);
    }

    pub fn state(&self) -> &Arc<CallState> {
        &self.state
    }

    fn send(&self, event: CallEvent) {
        if self.commands.send(event).is_err() {
            warn!("Call driver gone, dropping command");
        }
    }
}

pub struct CallDriver {
    config: Arc<LiveConfig>,
    devices: Arc<dyn AudioDevices>,
    transport: Arc<dyn LiveTransport>,
    state: Arc<CallState>,
    capture: CapturePipeline,
    scheduler: PlaybackScheduler,
    tx: mpsc::Sender<CallEvent>,
    rx: mpsc::Receiver<CallEvent>,
    commands: mpsc::UnboundedReceiver<CallEvent>,
    generation: u64,
    call_id: Option<Uuid>,
    microphone: Option<DeviceGuard>,
    speaker: Option<DeviceGuard>,
    session: Option<Box<dyn LiveSession>>,
}

impl CallDriver {
    pub fn new(
        config: LiveConfig,
        devices: Arc<dyn AudioDevices>,
        transport: Arc<dyn LiveTransport>,
    ) -> (Self, CallHandle) {
        let (tx, rx) = mpsc::channel(config.event_queue_capacity.max(1));
        let (command_tx, commands) = mpsc::unbounded_channel();
        let state = Arc::new(CallState::new());
        let capture = CapturePipeline::new(&config, state.volume.clone(), state.muted.clone());
        let scheduler = PlaybackScheduler::new(config.inbound_sample_rate);

        let handle = CallHandle {
            commands: command_tx,
            state: state.clone(),
        };
        let driver = Self {
            config: Arc::new(config),
            devices,
            transport,
            state,
            capture,
            scheduler,
            tx,
            rx,
            commands,
            generation: 0,
            call_id: None,
            microphone: None,
            speaker: None,
            session: None,
        };
        (driver, handle)
    }

    pub fn state(&self) -> &Arc<CallState> {
        &self.state
    }

    /// Processes events until a shutdown command arrives.
    pub async fn run(mut self) {
        info!("Call driver started");
        loop {
            let event = tokio::select! {
                biased;
                Some(command) = self.commands.recv() => command,
                Some(event) = self.rx.recv() => event,
                else => break,
            };
            if !self.process(event) {
                break;
            }
        }
        self.teardown();
        info!("Call driver stopped");
    }

    /// Handles one event. Returns `false` on shutdown.
    pub fn process(&mut self, event: CallEvent) -> bool {
        match event {
            CallEvent::Start => self.start(),
            CallEvent::Stop => self.stop(),
            CallEvent::SetMuted(muted) => self.set_muted(muted),
            CallEvent::Shutdown => {
                self.stop();
                return false;
            }
            CallEvent::Connected { generation, result } => self.on_connected(generation, result),
            CallEvent::Outbound(chunk) => self.forward(chunk),
            CallEvent::Session { generation, event } => self.on_session_event(generation, event),
        }
        true
    }

    fn start(&mut self) {
        let status = self.state.status();
        if !matches!(status, CallStatus::Idle | CallStatus::Error) {
            warn!("Ignoring start while {:?}", status);
            return;
        }

        self.generation += 1;
        let call_id = Uuid::new_v4();
        self.call_id = Some(call_id);
        info!(%call_id, "Starting call");

        self.state.set_error_message(None);
        self.state.set_status(CallStatus::Connecting);

        if let Err(e) = blocking(|| self.open_devices()) {
            self.fail(e);
            return;
        }
        self.spawn_connect();
    }

    fn open_devices(&mut self) -> Result<(), CallError> {
        let source: Arc<dyn Pullable<AudioFrame>> = Arc::new(self.scheduler.clone());
        self.speaker = Some(
            self.devices
                .open_output(self.config.inbound_sample_rate, source)?,
        );

        let outbound: Arc<dyn Pushable<EncodedChunk>> = Arc::new(OutboundSink {
            tx: self.tx.clone(),
            state: self.state.clone(),
        });
        self.microphone = Some(self.capture.start(self.devices.as_ref(), outbound)?);
        Ok(())
    }

    fn spawn_connect(&self) {
        let transport = self.transport.clone();
        let config = self.config.clone();
        let tx = self.tx.clone();
        let generation = self.generation;

        tokio::spawn(async move {
            let events = EventSink::new(tx.clone(), generation);
            let connect = transport.connect(&config, events);
            let result = match config.connect_timeout {
                Some(limit) => match tokio::time::timeout(limit, connect).await {
                    Ok(result) => result,
                    Err(_) => Err(CallError::ConnectFailed(format!(
                        "timed out after {}s",
                        limit.as_secs_f32()
                    ))),
                },
                None => connect.await,
            };
            if tx
                .send(CallEvent::Connected { generation, result })
                .await
                .is_err()
            {
                debug!("Call driver gone before connect finished");
            }
        });
    }

    fn on_connected(
        &mut self,
        generation: u64,
        result: Result<Box<dyn LiveSession>, CallError>,
    ) {
        if generation != self.generation || self.state.status() != CallStatus::Connecting {
            if let Ok(mut session) = result {
                info!("Closing session that connected after the call ended");
                session.close();
            }
            return;
        }

        match result {
            Ok(session) => {
                self.session = Some(session);
                self.state.set_status(CallStatus::Connected);
                info!("Call connected");
            }
            Err(e) => self.fail(e),
        }
    }

    fn forward(&mut self, chunk: EncodedChunk) {
        match (self.state.status(), self.session.as_mut()) {
            (CallStatus::Connected, Some(session)) => {
                session.send(chunk);
                self.state.record_frame_sent();
            }
            (status, _) => {
                self.state.record_frame_dropped();
                debug!("Dropping captured frame while {:?}", status);
            }
        }
    }

    fn on_session_event(&mut self, generation: u64, event: SessionEvent) {
        if generation != self.generation {
            debug!("Ignoring event from an old session: {:?}", event);
            return;
        }

        match event {
            SessionEvent::Open => debug!("Session open"),
            SessionEvent::Audio(chunk) => match self.scheduler.enqueue(&chunk) {
                Ok(unit) => {
                    self.state.record_chunk_scheduled();
                    debug!(
                        "Scheduled {} frames at {}",
                        unit.duration, unit.start_at
                    );
                }
                Err(e) => warn!("Dropping inbound chunk: {}", e),
            },
            SessionEvent::Interrupted => {
                info!("Model interrupted, flushing playback");
                self.scheduler.reset();
            }
            SessionEvent::Closed => self.fail(CallError::RemoteClosed),
            SessionEvent::Error(message) => self.fail(CallError::RemoteError(message)),
        }
    }

    fn set_muted(&mut self, muted: bool) {
        self.capture.set_muted(muted);
        info!("Microphone {}", if muted { "muted" } else { "unmuted" });
    }

    fn stop(&mut self) {
        if self.state.status() != CallStatus::Idle {
            info!("Stopping call");
        }
        self.teardown();
        self.state.set_error_message(None);
        self.state.set_status(CallStatus::Idle);
    }

    /// Tears the call down after `error`. A remote close is a normal ending.
    fn fail(&mut self, error: CallError) {
        self.teardown();
        match error {
            CallError::RemoteClosed => {
                info!("Session closed by the remote side");
                self.state.set_error_message(None);
                self.state.set_status(CallStatus::Idle);
            }
            error => {
                error!("Call failed: {}", error);
                let message = error
                    .user_message()
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                self.state.set_error_message(Some(message));
                self.state.set_status(CallStatus::Error);
            }
        }
    }

    /// Releases everything the call holds. Safe to repeat.
    fn teardown(&mut self) {
        self.generation += 1;

        if let Some(mut session) = self.session.take() {
            session.close();
        }
        blocking(|| {
            CapturePipeline::stop(&mut self.microphone);
            if let Some(mut speaker) = self.speaker.take() {
                speaker.release();
            }
        });
        self.scheduler.teardown();
        self.capture.set_muted(false);
        self.state.reset_volume();

        if let Some(call_id) = self.call_id.take() {
            info!(%call_id, "Call resources released");
        }
    }
}

/// Runs device work that waits on audio threads (and possibly an OS
/// permission prompt) without stalling other tasks on a multi-thread runtime.
fn blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}
