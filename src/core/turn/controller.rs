//! Per-call turn controller
//!
//! One task per call owns the conversation state and is the only place that
//! mutates it. The task multiplexes three sources:
//!
//! 1. Inbound transport events (caller audio and control messages)
//! 2. Events from the live recognition session
//! 3. Output of the in-flight assistant turn (reply tokens, then audio chunks)
//!
//! Inbound and recognition events are polled first so a barge-in cancels
//! the in-flight stream before another token or chunk is forwarded.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::events::CallEvent;
use super::history::{ConversationHistory, DEFAULT_HISTORY_WINDOW};
use super::interruption::{INTERRUPTED_MARKER, InterruptionReport};
use super::state::TurnState;
use super::utterance::Utterance;
use crate::core::audio::{AudioChunk, ChunkSequencer, DEFAULT_SAMPLE_RATE};
use crate::core::llm::{LLMResult, ResponseGenerator, TokenStream};
use crate::core::stt::{SpeechEvent, SpeechRecognizer, SpeechSession};
use crate::core::transport::{ClientMessage, Inbound, ServerMessage, TransportHandle};
use crate::core::stt::STTError;
use crate::core::tts::{AudioStream, SpeechSynthesizer, TTSResult};

/// Reconnects after recognition errors before waiting for a fresh `start`
pub(crate) const MAX_RECOGNITION_RESTARTS: u32 = 3;

/// Backends a call talks to
#[derive(Clone)]
pub struct CallBackends {
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

/// Per-call knobs
#[derive(Debug, Clone)]
pub struct TurnSettings {
    /// Caller audio sample rate used when `start` does not name one
    pub sample_rate: u32,
    pub channels: u16,
    pub history_window: usize,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

enum TurnPhase {
    Generating(TokenStream),
    Synthesizing {
        stream: AudioStream,
        sequencer: ChunkSequencer,
    },
}

/// The assistant reply currently being produced
pub struct InFlightTurn {
    id: u64,
    /// Reply text received so far
    text: String,
    started_at: Instant,
    phase: TurnPhase,
}

enum TurnOutput {
    Token(Option<LLMResult<String>>),
    Audio(Option<TTSResult<AudioChunk>>),
}

impl InFlightTurn {
    fn new(id: u64, stream: TokenStream) -> Self {
        Self {
            id,
            text: String::new(),
            started_at: Instant::now(),
            phase: TurnPhase::Generating(stream),
        }
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self.phase, TurnPhase::Synthesizing { .. })
    }

    async fn next_output(&mut self) -> TurnOutput {
        match &mut self.phase {
            TurnPhase::Generating(stream) => TurnOutput::Token(stream.next().await),
            TurnPhase::Synthesizing { stream, .. } => TurnOutput::Audio(stream.next().await),
        }
    }

    fn cancel(&mut self) {
        match &mut self.phase {
            TurnPhase::Generating(stream) => stream.cancel(),
            TurnPhase::Synthesizing { stream, .. } => stream.cancel(),
        }
    }
}

async fn next_speech(session: &mut Option<SpeechSession>) -> Option<SpeechEvent> {
    match session {
        Some(session) => session.next_event().await,
        None => std::future::pending().await,
    }
}

async fn next_output(turn: &mut Option<InFlightTurn>) -> TurnOutput {
    match turn {
        Some(turn) => turn.next_output().await,
        None => std::future::pending().await,
    }
}

enum Step {
    Call(Option<CallEvent>),
    Speech(Option<SpeechEvent>),
    Output(TurnOutput),
}

pub struct TurnController {
    call_id: String,
    transport: TransportHandle,
    backends: CallBackends,
    settings: TurnSettings,
    state: TurnState,
    history: ConversationHistory,
    utterance: Utterance,
    session: Option<SpeechSession>,
    /// Sample rate and channels of the last successful `start`
    listen_params: Option<(u32, u16)>,
    /// Reconnects since the session last reported `Opened`
    recognition_restarts: u32,
    in_flight: Option<InFlightTurn>,
    turns_started: u64,
}

impl TurnController {
    pub fn new(
        call_id: impl Into<String>,
        transport: TransportHandle,
        backends: CallBackends,
        settings: TurnSettings,
    ) -> Self {
        let history = ConversationHistory::new(settings.history_window);
        Self {
            call_id: call_id.into(),
            transport,
            backends,
            settings,
            state: TurnState::Idle,
            history,
            utterance: Utterance::default(),
            session: None,
            listen_params: None,
            recognition_restarts: 0,
            in_flight: None,
            turns_started: 0,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Drive the call until hangup. Returns the final conversation history.
    pub async fn run(mut self, mut events: mpsc::Receiver<CallEvent>) -> ConversationHistory {
        info!(call_id = %self.call_id, "Turn controller started");

        loop {
            let step = tokio::select! {
                biased;
                event = events.recv() => Step::Call(event),
                speech = next_speech(&mut self.session) => Step::Speech(speech),
                output = next_output(&mut self.in_flight) => Step::Output(output),
            };

            match step {
                Step::Call(None) | Step::Call(Some(CallEvent::Hangup)) => break,
                Step::Call(Some(CallEvent::Inbound(inbound))) => self.handle_inbound(inbound).await,
                Step::Speech(event) => self.handle_speech(event).await,
                Step::Output(output) => self.handle_output(output).await,
            }
        }

        self.shutdown();
        info!(
            call_id = %self.call_id,
            turns = self.turns_started,
            "Turn controller stopped"
        );
        self.history
    }

    async fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Audio(audio) => self.feed_audio(audio),
            Inbound::Control(ClientMessage::Start {
                sample_rate,
                channels,
            }) => {
                self.start_listening(
                    sample_rate.unwrap_or(self.settings.sample_rate),
                    channels.unwrap_or(self.settings.channels),
                )
                .await
            }
            Inbound::Control(ClientMessage::Stop) => self.stop_listening(),
            Inbound::Control(ClientMessage::UserInterrupted {
                interrupted_at,
                total_duration,
                full_text,
            }) => {
                let report = InterruptionReport::new(interrupted_at, total_duration, full_text);
                self.apply_interruption(&report);
            }
        }
    }

    fn feed_audio(&mut self, audio: Bytes) {
        match &self.session {
            Some(session) => {
                if !session.feed(audio) {
                    debug!(call_id = %self.call_id, "Recognition session no longer accepts audio");
                }
            }
            None => warn!(
                call_id = %self.call_id,
                bytes = audio.len(),
                "Received audio without an open recognition session"
            ),
        }
    }

    async fn start_listening(&mut self, sample_rate: u32, channels: u16) {
        if self.session.is_some() {
            debug!(call_id = %self.call_id, "Recognition session already open");
            return;
        }

        match self.backends.recognizer.start(sample_rate, channels).await {
            Ok(session) => {
                info!(
                    call_id = %self.call_id,
                    provider = self.backends.recognizer.provider_info(),
                    sample_rate,
                    channels,
                    "Recognition session opened"
                );
                self.session = Some(session);
                self.listen_params = Some((sample_rate, channels));
                if self.state == TurnState::Idle {
                    self.state = TurnState::Listening;
                }
            }
            Err(e) => {
                error!(call_id = %self.call_id, "Failed to start speech recognition: {}", e);
                self.send(ServerMessage::error(format!(
                    "Failed to start speech recognition: {e}"
                )))
                .await;
            }
        }
    }

    fn stop_listening(&mut self) {
        self.listen_params = None;
        if let Some(mut session) = self.session.take() {
            session.stop();
            info!(call_id = %self.call_id, "Recognition session stopped");
        }
        self.drop_utterance();
    }

    fn drop_utterance(&mut self) {
        self.utterance.clear();
        if matches!(
            self.state,
            TurnState::Listening | TurnState::UtteranceCollecting
        ) {
            self.state = self.resting_state();
        }
    }

    /// State to return to when no turn is in flight
    fn resting_state(&self) -> TurnState {
        if self.session.is_some() {
            TurnState::Listening
        } else {
            TurnState::Idle
        }
    }

    async fn handle_speech(&mut self, event: Option<SpeechEvent>) {
        match event {
            Some(SpeechEvent::Opened) => {
                self.recognition_restarts = 0;
                self.send(ServerMessage::status("Connected to speech recognition"))
                    .await;
            }
            Some(SpeechEvent::ActivityDetected) => {
                // Not enough to barge in; wait for a transcript
                debug!(call_id = %self.call_id, state = %self.state, "Voice activity detected");
            }
            Some(SpeechEvent::Transcript { text, is_final }) => {
                self.on_transcript(text, is_final).await;
            }
            Some(SpeechEvent::UtteranceEnded) => self.on_utterance_end().await,
            Some(SpeechEvent::Error(e)) => self.on_recognition_error(e).await,
            Some(SpeechEvent::Closed) | None => {
                info!(call_id = %self.call_id, "Recognition session closed");
                self.session = None;
                self.drop_utterance();
            }
        }
    }

    /// Fatal for the current turn only: abort it, then listen again.
    async fn on_recognition_error(&mut self, e: STTError) {
        error!(call_id = %self.call_id, state = %self.state, "Speech recognition error: {}", e);
        self.send(ServerMessage::error(e.to_string())).await;

        if let Some(mut session) = self.session.take() {
            session.stop();
        }
        self.utterance.clear();

        if let Some(mut turn) = self.in_flight.take() {
            turn.cancel();
            info!(
                call_id = %self.call_id,
                turn_id = turn.id,
                "Aborted reply after recognition error"
            );
            if turn.is_speaking() {
                self.send(ServerMessage::AudioEnd).await;
            } else {
                self.send(ServerMessage::AiResponseEnd).await;
            }
        }
        self.state = TurnState::Idle;

        let Some((sample_rate, channels)) = self.listen_params else {
            return;
        };
        if self.recognition_restarts >= MAX_RECOGNITION_RESTARTS {
            warn!(
                call_id = %self.call_id,
                restarts = self.recognition_restarts,
                "Recognition keeps failing; waiting for a new start"
            );
            self.listen_params = None;
            return;
        }
        self.recognition_restarts += 1;
        self.start_listening(sample_rate, channels).await;
    }

    async fn on_transcript(&mut self, text: String, is_final: bool) {
        if text.trim().is_empty() {
            return;
        }

        if self.state != TurnState::UtteranceCollecting {
            self.confirm_speech().await;
        }

        if is_final {
            self.utterance.push_final(&text);
        }
        self.send(ServerMessage::Transcript { text, is_final }).await;
    }

    /// First transcript of a new utterance: barge in if needed, then collect.
    async fn confirm_speech(&mut self) {
        if let Some(mut turn) = self.in_flight.take() {
            turn.cancel();
            info!(
                call_id = %self.call_id,
                turn_id = turn.id,
                state = %self.state,
                elapsed_ms = turn.started_at.elapsed().as_millis() as u64,
                "Caller barged in"
            );
            self.send(ServerMessage::InterruptAi).await;
            if !turn.is_speaking() {
                self.history.push_assistant(INTERRUPTED_MARKER);
            }
        }

        self.utterance.clear();
        self.state = TurnState::UtteranceCollecting;
        self.send(ServerMessage::SpeechStarted).await;
    }

    async fn on_utterance_end(&mut self) {
        if self.state != TurnState::UtteranceCollecting {
            debug!(call_id = %self.call_id, state = %self.state, "Ignoring utterance end");
            return;
        }

        let transcript = self.utterance.take();
        if transcript.is_empty() {
            self.state = self.resting_state();
            return;
        }

        info!(call_id = %self.call_id, "Utterance complete: {}", transcript);
        self.send(ServerMessage::UtteranceEnd {
            transcript: transcript.clone(),
        })
        .await;
        self.send(ServerMessage::AiResponseStart).await;

        self.history.push_user(transcript);
        self.turns_started += 1;
        let stream = self
            .backends
            .generator
            .generate(self.history.to_chat_messages());
        self.in_flight = Some(InFlightTurn::new(self.turns_started, stream));
        self.state = TurnState::Responding;
    }

    async fn handle_output(&mut self, output: TurnOutput) {
        match output {
            TurnOutput::Token(Some(Ok(token))) => {
                if let Some(turn) = self.in_flight.as_mut() {
                    turn.text.push_str(&token);
                }
                self.send(ServerMessage::AiResponseChunk { text: token }).await;
            }
            TurnOutput::Token(Some(Err(e))) => {
                warn!(call_id = %self.call_id, "Reply generation failed: {}", e);
                self.in_flight = None;
                self.send(ServerMessage::error(e.to_string())).await;
                self.send(ServerMessage::AiResponseEnd).await;
                self.state = self.resting_state();
            }
            TurnOutput::Token(None) => self.finish_generation().await,
            TurnOutput::Audio(Some(Ok(chunk))) => self.forward_chunk(chunk).await,
            TurnOutput::Audio(Some(Err(e))) => {
                warn!(call_id = %self.call_id, "Speech synthesis failed: {}", e);
                self.finish_speaking().await;
            }
            TurnOutput::Audio(None) => self.finish_speaking().await,
        }
    }

    async fn finish_generation(&mut self) {
        self.send(ServerMessage::AiResponseEnd).await;

        let Some(mut turn) = self.in_flight.take() else {
            return;
        };
        let reply = turn.text.trim().to_string();
        debug!(
            call_id = %self.call_id,
            turn_id = turn.id,
            elapsed_ms = turn.started_at.elapsed().as_millis() as u64,
            "Reply generated"
        );

        if reply.is_empty() {
            self.send(ServerMessage::AudioEnd).await;
            self.state = self.resting_state();
            return;
        }

        self.history.push_assistant(reply.clone());
        turn.phase = TurnPhase::Synthesizing {
            stream: self.backends.synthesizer.synthesize(&reply),
            sequencer: ChunkSequencer::new(),
        };
        self.in_flight = Some(turn);
        self.state = TurnState::Speaking;
    }

    async fn forward_chunk(&mut self, chunk: AudioChunk) {
        let checked = match self.in_flight.as_mut().map(|turn| &mut turn.phase) {
            Some(TurnPhase::Synthesizing { sequencer, .. }) => sequencer.check(&chunk),
            _ => return,
        };

        match checked {
            Ok(()) => {
                if self.transport.send_audio(&chunk).await.is_err() {
                    debug!(call_id = %self.call_id, "Transport closed while sending audio");
                }
            }
            Err(e) => {
                error!(call_id = %self.call_id, "Audio protocol violation: {}", e);
                if let Some(turn) = self.in_flight.as_mut() {
                    turn.cancel();
                }
                self.finish_speaking().await;
            }
        }
    }

    async fn finish_speaking(&mut self) {
        if let Some(turn) = self.in_flight.take() {
            debug!(
                call_id = %self.call_id,
                turn_id = turn.id,
                elapsed_ms = turn.started_at.elapsed().as_millis() as u64,
                "Reply audio finished"
            );
        }
        self.send(ServerMessage::AudioEnd).await;
        self.state = self.resting_state();
    }

    fn apply_interruption(&mut self, report: &InterruptionReport) {
        info!(
            call_id = %self.call_id,
            heard = report.heard_fraction(),
            "Caller reported interrupted playback"
        );
        let rewritten = self
            .history
            .rewrite_last_assistant(|stored| report.rewrite(stored));
        if !rewritten {
            debug!(call_id = %self.call_id, "No assistant entry to rewrite");
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut turn) = self.in_flight.take() {
            turn.cancel();
        }
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
        self.utterance.clear();
        self.state = TurnState::Idle;
    }

    async fn send(&self, message: ServerMessage) {
        if self.transport.send_control(message).await.is_err() {
            debug!(call_id = %self.call_id, "Transport closed; dropping message");
        }
    }
}
