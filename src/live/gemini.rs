//! Gemini Live transport over a websocket.
//!
//! The session speaks the BidiGenerateContent JSON protocol: one `setup`
//! message, then `realtimeInput` audio chunks out and `serverContent` in.
//! Reading and writing run in their own tasks so the call driver never
//! awaits the socket.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info, warn};

use crate::audio::EncodedChunk;
use crate::live::LiveConfig;
use crate::live::error::CallError;
use crate::live::transport::{EventSink, LiveSession, LiveTransport, SessionEvent};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Setup {
    model: String,
    generation_config: GenerationConfig,
    system_instruction: Content,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    speech_config: SpeechConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeInput {
    media_chunks: Vec<Blob>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

impl ClientMessage {
    fn setup(config: &LiveConfig) -> Self {
        ClientMessage::Setup(Setup {
            model: config.qualified_model(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: config.voice.clone(),
                        },
                    },
                },
            },
            system_instruction: Content {
                parts: vec![TextPart {
                    text: config.system_instruction.clone(),
                }],
            },
        })
    }

    fn realtime_input(chunk: EncodedChunk) -> Self {
        ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![Blob {
                mime_type: chunk.mime_type,
                data: chunk.data,
            }],
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    setup_complete: Option<serde_json::Value>,
    server_content: Option<ServerContent>,
    go_away: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    model_turn: Option<ModelTurn>,
    #[serde(default)]
    interrupted: bool,
    #[serde(default)]
    turn_complete: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ModelTurn {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<Blob>,
}

fn parse_server_message(text: &str) -> Option<ServerMessage> {
    match serde_json::from_str(text) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!("Skipping unparsable server message: {}", e);
            None
        }
    }
}

/// Audio parts first, then the interruption flag.
fn session_events(message: ServerMessage) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    if message.go_away.is_some() {
        warn!("Server announced it will close the session soon");
    }
    let Some(content) = message.server_content else {
        return events;
    };

    if let Some(turn) = content.model_turn {
        for blob in turn.parts.into_iter().filter_map(|p| p.inline_data) {
            events.push(SessionEvent::Audio(EncodedChunk {
                mime_type: blob.mime_type,
                data: blob.data,
            }));
        }
    }
    if content.interrupted {
        events.push(SessionEvent::Interrupted);
    }
    if content.turn_complete {
        debug!("Model turn complete");
    }
    events
}

fn message_text(message: Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text.to_string()),
        Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Some(text),
            Err(_) => {
                warn!("Skipping non-UTF-8 binary message");
                None
            }
        },
        _ => None,
    }
}

fn close_event(frame: Option<&CloseFrame<'_>>) -> SessionEvent {
    match frame {
        None => SessionEvent::Closed,
        Some(frame) if matches!(frame.code, CloseCode::Normal | CloseCode::Away) => {
            SessionEvent::Closed
        }
        Some(frame) => SessionEvent::Error(format!("closed with {} {}", frame.code, frame.reason)),
    }
}

/// Gemini Live over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiTransport;

#[async_trait]
impl LiveTransport for GeminiTransport {
    async fn connect(
        &self,
        config: &LiveConfig,
        events: EventSink,
    ) -> Result<Box<dyn LiveSession>, CallError> {
        let url = config
            .endpoint_url()
            .map_err(|e| CallError::ConnectFailed(e.to_string()))?;
        info!("Connecting to live model {}", config.model);

        let (ws, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| CallError::ConnectFailed(e.to_string()))?;
        let (mut write, mut read) = ws.split();

        let setup = serde_json::to_string(&ClientMessage::setup(config))
            .map_err(|e| CallError::ConnectFailed(e.to_string()))?;
        write
            .send(Message::text(setup))
            .await
            .map_err(|e| CallError::ConnectFailed(e.to_string()))?;

        wait_for_setup(&mut read).await?;
        info!("Live session open");
        events.emit(SessionEvent::Open).await;

        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        tokio::spawn(write_loop(write, rx));
        tokio::spawn(read_loop(read, events, closed.clone()));

        Ok(Box::new(GeminiSession::new(tx, closed)))
    }
}

async fn wait_for_setup<S>(read: &mut S) -> Result<(), CallError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(message) = read.next().await {
        let message = message.map_err(|e| CallError::ConnectFailed(e.to_string()))?;
        if let Message::Close(frame) = &message {
            let reason = frame
                .as_ref()
                .map(|f| format!("{} {}", f.code, f.reason))
                .unwrap_or_default();
            return Err(CallError::ConnectFailed(format!(
                "closed before setup completed: {reason}"
            )));
        }
        if let Some(parsed) = message_text(message).and_then(|t| parse_server_message(&t))
            && parsed.setup_complete.is_some()
        {
            return Ok(());
        }
    }
    Err(CallError::ConnectFailed(
        "connection ended before setup completed".to_string(),
    ))
}

async fn read_loop<S>(mut read: S, events: EventSink, closed: Arc<AtomicBool>)
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(message) = read.next().await {
        if closed.load(Ordering::Acquire) {
            return;
        }
        let batch = match message {
            Ok(Message::Close(frame)) => {
                if !closed.swap(true, Ordering::AcqRel) {
                    events.emit(close_event(frame.as_ref())).await;
                }
                return;
            }
            Ok(message) => message_text(message)
                .and_then(|t| parse_server_message(&t))
                .map(session_events)
                .unwrap_or_default(),
            Err(e) => {
                if !closed.swap(true, Ordering::AcqRel) {
                    events.emit(SessionEvent::Error(e.to_string())).await;
                }
                return;
            }
        };
        for event in batch {
            if !events.emit(event).await {
                return;
            }
        }
    }
    if !closed.swap(true, Ordering::AcqRel) {
        events.emit(SessionEvent::Closed).await;
    }
}

async fn write_loop<S>(mut write: S, mut rx: mpsc::UnboundedReceiver<EncodedChunk>)
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    while let Some(chunk) = rx.recv().await {
        let text = match serde_json::to_string(&ClientMessage::realtime_input(chunk)) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to serialize audio chunk: {}", e);
                continue;
            }
        };
        if let Err(e) = write.send(Message::text(text)).await {
            warn!("Failed to send audio chunk: {}", e);
            return;
        }
    }
    let _ = write.close().await;
    debug!("Live session writer stopped");
}

/// Handle to an open Gemini session.
pub struct GeminiSession {
    tx: Option<mpsc::UnboundedSender<EncodedChunk>>,
    closed: Arc<AtomicBool>,
}

impl GeminiSession {
    fn new(tx: mpsc::UnboundedSender<EncodedChunk>, closed: Arc<AtomicBool>) -> Self {
        Self {
            tx: Some(tx),
            closed,
        }
    }
}

impl LiveSession for GeminiSession {
    fn send(&mut self, chunk: EncodedChunk) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if let Some(tx) = &self.tx {
            let _ = tx.send(chunk);
        }
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
        // Dropping the sender lets the writer flush and send a close frame.
        if self.tx.take().is_some() {
            info!("Closing live session");
        }
    }
}

impl Drop for GeminiSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::call::CallEvent;
    use futures_util::stream;
    use serde_json::json;
    use std::borrow::Cow;

    #[test]
    fn test_setup_message_shape() {
        let config = LiveConfig {
            model: "test-model".to_string(),
            voice: "Kore".to_string(),
            system_instruction: "Be nice.".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(ClientMessage::setup(&config)).unwrap();

        assert_eq!(
            value,
            json!({
                "setup": {
                    "model": "models/test-model",
                    "generationConfig": {
                        "responseModalities": ["AUDIO"],
                        "speechConfig": {
                            "voiceConfig": {
                                "prebuiltVoiceConfig": { "voiceName": "Kore" }
                            }
                        }
                    },
                    "systemInstruction": { "parts": [{ "text": "Be nice." }] }
                }
            })
        );
    }

    #[test]
    fn test_realtime_input_shape() {
        let chunk = EncodedChunk::pcm(16_000, "AAA=".to_string());
        let value = serde_json::to_value(ClientMessage::realtime_input(chunk)).unwrap();

        assert_eq!(
            value,
            json!({
                "realtimeInput": {
                    "mediaChunks": [{ "mimeType": "audio/pcm;rate=16000", "data": "AAA=" }]
                }
            })
        );
    }

    #[test]
    fn test_audio_parts_come_before_interruption() {
        let text = json!({
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AQA=" } },
                        { "text": "ignored" },
                        { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AgA=" } }
                    ]
                },
                "interrupted": true
            }
        })
        .to_string();

        let events = session_events(parse_server_message(&text).unwrap());
        assert_eq!(
            events,
            vec![
                SessionEvent::Audio(EncodedChunk::pcm(24_000, "AQA=".to_string())),
                SessionEvent::Audio(EncodedChunk::pcm(24_000, "AgA=".to_string())),
                SessionEvent::Interrupted,
            ]
        );
    }

    #[test]
    fn test_setup_complete_and_garbage() {
        let parsed = parse_server_message(r#"{"setupComplete": {}}"#).unwrap();
        assert!(parsed.setup_complete.is_some());
        assert!(session_events(parsed).is_empty());

        assert!(parse_server_message("not json").is_none());
    }

    #[test]
    fn test_close_codes() {
        let frame = |code| CloseFrame {
            code,
            reason: Cow::Borrowed("bye"),
        };

        assert_eq!(close_event(None), SessionEvent::Closed);
        assert_eq!(close_event(Some(&frame(CloseCode::Normal))), SessionEvent::Closed);
        assert_eq!(close_event(Some(&frame(CloseCode::Away))), SessionEvent::Closed);
        assert!(matches!(
            close_event(Some(&frame(CloseCode::Policy))),
            SessionEvent::Error(_)
        ));
    }

    fn collect(rx: &mut mpsc::Receiver<CallEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(CallEvent::Session { generation, event }) = rx.try_recv() {
            assert_eq!(generation, 7);
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_read_loop_forwards_in_order_and_ends_closed() {
        let audio = json!({
            "serverContent": { "modelTurn": { "parts": [
                { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AQA=" } }
            ] } }
        })
        .to_string();
        let interrupted = json!({ "serverContent": { "interrupted": true } }).to_string();
        let messages: Vec<Result<Message, WsError>> = vec![
            Ok(Message::text(audio)),
            Ok(Message::text("garbage")),
            Ok(Message::binary(interrupted.into_bytes())),
        ];

        let (tx, mut rx) = mpsc::channel(16);
        let closed = Arc::new(AtomicBool::new(false));
        read_loop(stream::iter(messages), EventSink::new(tx, 7), closed.clone()).await;

        assert_eq!(
            collect(&mut rx),
            vec![
                SessionEvent::Audio(EncodedChunk::pcm(24_000, "AQA=".to_string())),
                SessionEvent::Interrupted,
                SessionEvent::Closed,
            ]
        );
        assert!(closed.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_read_loop_abnormal_close_is_error() {
        let messages: Vec<Result<Message, WsError>> = vec![Ok(Message::Close(Some(CloseFrame {
            code: CloseCode::Error,
            reason: Cow::Borrowed("internal"),
        })))];

        let (tx, mut rx) = mpsc::channel(16);
        read_loop(
            stream::iter(messages),
            EventSink::new(tx, 7),
            Arc::new(AtomicBool::new(false)),
        )
        .await;

        let events = collect(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SessionEvent::Error(_)));
    }

    #[tokio::test]
    async fn test_read_loop_is_silent_after_local_close() {
        let messages: Vec<Result<Message, WsError>> =
            vec![Ok(Message::text(r#"{"serverContent": {"interrupted": true}}"#))];

        let (tx, mut rx) = mpsc::channel(16);
        let closed = Arc::new(AtomicBool::new(true));
        read_loop(stream::iter(messages), EventSink::new(tx, 7), closed).await;

        assert!(collect(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_setup_fails_on_close() {
        let messages: Vec<Result<Message, WsError>> = vec![Ok(Message::Close(None))];
        let result = wait_for_setup(&mut stream::iter(messages)).await;
        assert!(matches!(result, Err(CallError::ConnectFailed(_))));

        let messages: Vec<Result<Message, WsError>> = vec![
            Ok(Message::text("{}")),
            Ok(Message::text(r#"{"setupComplete": {}}"#)),
        ];
        assert!(wait_for_setup(&mut stream::iter(messages)).await.is_ok());
    }

    #[test]
    fn test_session_send_is_noop_after_close() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = GeminiSession::new(tx, Arc::new(AtomicBool::new(false)));

        session.send(EncodedChunk::pcm(16_000, "AA==".to_string()));
        session.close();
        session.close();
        session.send(EncodedChunk::pcm(16_000, "AQ==".to_string()));

        assert_eq!(rx.try_recv().unwrap().data, "AA==");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_session_send_is_noop_after_terminal_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let mut session = GeminiSession::new(tx, closed.clone());

        closed.store(true, Ordering::Release);
        session.send(EncodedChunk::pcm(16_000, "AA==".to_string()));

        assert!(rx.try_recv().is_err());
    }
}
