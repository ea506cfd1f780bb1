//! Chat controller: transcript ownership and the send lifecycle

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;

use futures::StreamExt;
use orchat_ai::{Completion, CompletionMode, CompletionOptions, Model, StreamEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, broadcast};

use crate::{
    conversation::{Conversation, Message},
    events::ChatEvent,
    handle::SessionHandle,
    transport::{RequestContext, Transport, build_context},
};

/// Replies used when no validated key is available
pub const DEMO_RESPONSES: [&str; 5] = [
    "Hello! I'm a demo AI assistant. This is a placeholder response while we build the OpenRouter integration.",
    "That's an interesting question! In the real implementation, I would connect to the selected LLM model to provide a proper response.",
    "I understand what you're asking. Once we integrate with OpenRouter, I'll be able to give you much better answers using the selected model.",
    "Thanks for your message! This is just a demo response. Soon you'll be able to chat with real AI models through OpenRouter.",
    "Great question! The actual AI model will provide much more detailed and accurate responses once the integration is complete.",
];

/// Assistant reply when a message is sent with no model selected
pub const NO_MODEL_MESSAGE: &str = "Please select a model first to start chatting.";

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Transcript entries sent as context before the new message
    pub context_window: usize,
    /// Stream replies; `false` waits for the whole body
    pub stream: bool,
    /// Sampling options for every request
    pub options: CompletionOptions,
    /// Prepended as a system message when set
    pub system_prompt: Option<String>,
    /// Lower bound of the demo-reply delay
    pub demo_delay_min: Duration,
    /// Upper bound of the demo-reply delay
    pub demo_delay_max: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            context_window: 10,
            stream: true,
            options: CompletionOptions::default(),
            system_prompt: None,
            demo_delay_min: Duration::from_millis(1000),
            demo_delay_max: Duration::from_millis(2000),
        }
    }
}

impl ChatConfig {
    pub fn mode(&self) -> CompletionMode {
        if self.stream {
            CompletionMode::Streaming
        } else {
            CompletionMode::Buffered
        }
    }

    fn demo_delay(&self) -> Duration {
        if self.demo_delay_max <= self.demo_delay_min {
            return self.demo_delay_min;
        }
        let span = (self.demo_delay_max - self.demo_delay_min).as_millis() as u64;
        self.demo_delay_min + Duration::from_millis(random_u64() % (span + 1))
    }
}

/// Lifecycle of the current send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    /// Request dispatched, nothing received yet
    Sending,
    /// At least one fragment applied
    Streaming,
}

/// Result of [`ChatController::set_selected_model`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChange {
    Applied,
    /// Conversation is non-empty; call `confirm_model_change` or `cancel_model_change`
    NeedsConfirmation,
}

/// How a call to [`ChatController::send_message`] ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input; nothing happened
    Ignored,
    /// No model selected; the prompt-to-select reply was added
    NoModel,
    /// No validated key; a demo reply was added
    Demo,
    Completed,
    /// The error text now in the transcript
    Failed(String),
    /// Superseded, cleared or cancelled before finishing
    Cancelled,
}

/// Point-in-time copy of the controller state
#[derive(Debug, Clone, Default)]
pub struct ChatSnapshot {
    pub messages: Vec<Message>,
    pub selected_model: Option<Model>,
    pub pending_model: Option<Model>,
    pub streaming_message_id: Option<String>,
    pub state: SessionState,
    pub is_loading: bool,
}

struct ActiveSession {
    handle: SessionHandle,
    state: SessionState,
    /// Placeholder receiving the reply; demo sends have none
    target: Option<String>,
}

#[derive(Default)]
struct ChatState {
    conversation: Conversation,
    credential: Option<String>,
    session: Option<ActiveSession>,
}

impl ChatState {
    fn is_current(&self, handle: &SessionHandle) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.handle.id() == handle.id())
    }
}

struct Inner {
    config: ChatConfig,
    transport: Arc<dyn Transport>,
    state: Mutex<ChatState>,
    event_tx: broadcast::Sender<ChatEvent>,
    idle_notify: Notify,
    next_session: AtomicU64,
}

impl Inner {
    fn emit(&self, event: ChatEvent) {
        let _ = self.event_tx.send(event);
    }

    fn set_loading(&self, state: &mut ChatState, is_loading: bool) {
        if state.conversation.is_loading != is_loading {
            state.conversation.is_loading = is_loading;
            self.emit(ChatEvent::LoadingChanged { is_loading });
        }
    }

    /// Cancel the active session, keeping whatever it already wrote.
    /// Leaves the loading flag to the caller.
    fn abandon_session(&self, state: &mut ChatState) -> bool {
        let Some(session) = state.session.take() else {
            return false;
        };
        session.handle.cancel();
        state.conversation.streaming_message_id = None;
        if let Some(message_id) = session.target {
            self.emit(ChatEvent::StreamEnd { message_id });
        }
        tracing::debug!("Abandoned session {}", session.handle.id());
        true
    }

    /// Finish `handle`'s session if it is still current
    fn end_session(&self, state: &mut ChatState, handle: &SessionHandle) -> bool {
        if !state.is_current(handle) {
            return false;
        }
        if let Some(message_id) = state.session.take().and_then(|s| s.target) {
            self.emit(ChatEvent::StreamEnd { message_id });
        }
        state.conversation.streaming_message_id = None;
        self.set_loading(state, false);
        self.idle_notify.notify_waiters();
        true
    }
}

/// Work decided under the lock, run after it is released
enum Dispatch {
    Remote {
        handle: SessionHandle,
        target: String,
        request: RequestContext,
    },
    Demo {
        handle: SessionHandle,
    },
}

/// Owns the conversation and runs sends against a [`Transport`].
///
/// Cloning is cheap and every clone drives the same conversation. State
/// changes are published as [`ChatEvent`]s; [`ChatController::snapshot`]
/// returns the full state at any time.
#[derive(Clone)]
pub struct ChatController {
    inner: Arc<Inner>,
}

impl ChatController {
    pub fn new(config: ChatConfig, transport: Arc<dyn Transport>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                state: Mutex::new(ChatState::default()),
                event_tx,
                idle_notify: Notify::new(),
                next_session: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe to controller events
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn config(&self) -> &ChatConfig {
        &self.inner.config
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        let state = self.inner.state.lock();
        let conversation = &state.conversation;
        ChatSnapshot {
            messages: conversation.messages.clone(),
            selected_model: conversation.selected_model.clone(),
            pending_model: conversation.pending_model.clone(),
            streaming_message_id: conversation.streaming_message_id.clone(),
            state: state.session.as_ref().map_or(SessionState::Idle, |s| s.state),
            is_loading: conversation.is_loading,
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.state.lock().conversation.messages.clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner
            .state
            .lock()
            .session
            .as_ref()
            .map_or(SessionState::Idle, |s| s.state)
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().conversation.is_loading
    }

    pub fn selected_model(&self) -> Option<Model> {
        self.inner.state.lock().conversation.selected_model.clone()
    }

    /// Set the validated key; `None` switches sends to demo replies
    pub fn set_credential(&self, credential: Option<String>) {
        let credential = credential
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self.inner.state.lock().credential = credential;
    }

    pub fn has_credential(&self) -> bool {
        self.inner.state.lock().credential.is_some()
    }

    /// Select a model.
    ///
    /// Applies immediately when the transcript is empty or the model is
    /// already selected; otherwise the model is held pending confirmation.
    pub fn set_selected_model(&self, model: Model) -> ModelChange {
        let mut state = self.inner.state.lock();
        let conversation = &mut state.conversation;
        let unchanged = conversation
            .selected_model
            .as_ref()
            .is_some_and(|m| m.id == model.id);

        if conversation.is_empty() || unchanged {
            conversation.pending_model = None;
            conversation.selected_model = Some(model.clone());
            self.inner.emit(ChatEvent::ModelChanged { model });
            ModelChange::Applied
        } else {
            conversation.pending_model = Some(model.clone());
            self.inner.emit(ChatEvent::ModelChangePending { model });
            ModelChange::NeedsConfirmation
        }
    }

    /// Apply the pending model; the conversation continues with it
    pub fn confirm_model_change(&self) -> Option<Model> {
        let mut state = self.inner.state.lock();
        let model = state.conversation.pending_model.take()?;
        state.conversation.selected_model = Some(model.clone());
        self.inner.emit(ChatEvent::ModelChanged {
            model: model.clone(),
        });
        Some(model)
    }

    /// Drop the pending model, keeping the current one
    pub fn cancel_model_change(&self) -> Option<Model> {
        self.inner.state.lock().conversation.pending_model.take()
    }

    /// Cancel any in-flight send and empty the transcript
    pub fn clear_chat(&self) {
        let mut state = self.inner.state.lock();
        let was_active = self.inner.abandon_session(&mut state);
        state.conversation.messages.clear();
        state.conversation.streaming_message_id = None;
        state.conversation.pending_model = None;
        self.inner.emit(ChatEvent::Cleared);
        self.inner.set_loading(&mut state, false);
        if was_active {
            self.inner.idle_notify.notify_waiters();
        }
    }

    /// Cancel the in-flight send, keeping partial content.
    /// Returns `false` when nothing was running.
    pub fn cancel(&self) -> bool {
        let mut state = self.inner.state.lock();
        if !self.inner.abandon_session(&mut state) {
            return false;
        }
        self.inner.set_loading(&mut state, false);
        self.inner.idle_notify.notify_waiters();
        true
    }

    /// Wait until no send is in flight
    pub async fn wait_for_idle(&self) {
        loop {
            let notified = self.inner.idle_notify.notified();
            if self.state() == SessionState::Idle {
                return;
            }
            notified.await;
        }
    }

    /// Send a user message and drive the reply to completion.
    ///
    /// Any send already in flight is cancelled first; its partial reply stays
    /// in the transcript. Failures end up in the transcript as the assistant's
    /// reply and are reported through the returned [`SendOutcome`].
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let content = text.trim();
        if content.is_empty() {
            return SendOutcome::Ignored;
        }

        let dispatch = {
            let mut state = self.inner.state.lock();
            let superseded = self.inner.abandon_session(&mut state);

            let history_len = state.conversation.len();
            let user = Message::user(content);
            state.conversation.push(user.clone());
            self.inner.emit(ChatEvent::MessageAdded { message: user });

            let Some(model) = state.conversation.selected_model.clone() else {
                let reply = Message::assistant(NO_MODEL_MESSAGE);
                state.conversation.push(reply.clone());
                self.inner.emit(ChatEvent::MessageAdded { message: reply });
                self.inner.set_loading(&mut state, false);
                if superseded {
                    self.inner.idle_notify.notify_waiters();
                }
                return SendOutcome::NoModel;
            };

            let handle =
                SessionHandle::new(self.inner.next_session.fetch_add(1, Ordering::Relaxed) + 1);

            match state.credential.clone() {
                Some(credential) => {
                    let config = &self.inner.config;
                    let messages = build_context(
                        &state.conversation.messages[..history_len],
                        content,
                        config.context_window,
                        config.system_prompt.as_deref(),
                    );

                    let placeholder = Message::assistant("");
                    let target = placeholder.id.clone();
                    state.conversation.push(placeholder.clone());
                    state.conversation.streaming_message_id = Some(target.clone());
                    state.session = Some(ActiveSession {
                        handle: handle.clone(),
                        state: SessionState::Sending,
                        target: Some(target.clone()),
                    });
                    self.inner.emit(ChatEvent::MessageAdded {
                        message: placeholder,
                    });
                    self.inner.emit(ChatEvent::StreamStart {
                        message_id: target.clone(),
                    });
                    self.inner.set_loading(&mut state, true);

                    Dispatch::Remote {
                        handle,
                        target,
                        request: RequestContext {
                            credential,
                            model_id: model.id,
                            messages,
                            options: config.options,
                        },
                    }
                }
                None => {
                    state.session = Some(ActiveSession {
                        handle: handle.clone(),
                        state: SessionState::Sending,
                        target: None,
                    });
                    self.inner.set_loading(&mut state, true);
                    Dispatch::Demo { handle }
                }
            }
        };

        match dispatch {
            Dispatch::Remote {
                handle,
                target,
                request,
            } => self.run_remote(handle, target, request).await,
            Dispatch::Demo { handle } => self.run_demo(handle).await,
        }
    }

    async fn run_remote(
        &self,
        handle: SessionHandle,
        target: String,
        request: RequestContext,
    ) -> SendOutcome {
        tracing::debug!("Session {} sending to {}", handle.id(), request.model_id);
        let mode = self.inner.config.mode();

        let sent = tokio::select! {
            biased;
            _ = handle.cancelled() => None,
            result = self.inner.transport.send(&request, mode, handle.token()) => Some(result),
        };

        let completion = match sent {
            None => return SendOutcome::Cancelled,
            Some(Ok(completion)) => completion,
            Some(Err(e)) => return self.fail(&handle, &target, e),
        };

        let mut fragments = match completion {
            Completion::Text(text) => return self.apply_text(&handle, &target, text),
            Completion::Stream(fragments) => fragments,
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = handle.cancelled() => None,
                next = fragments.next() => Some(next),
            };

            match next {
                None => return SendOutcome::Cancelled,
                Some(None) | Some(Some(Ok(StreamEvent::Done))) => break,
                Some(Some(Ok(StreamEvent::Fragment(delta)))) => {
                    if !self.apply_fragment(&handle, &target, delta) {
                        return SendOutcome::Cancelled;
                    }
                }
                Some(Some(Err(orchat_ai::Error::Aborted))) => {
                    let mut state = self.inner.state.lock();
                    self.inner.end_session(&mut state, &handle);
                    return SendOutcome::Cancelled;
                }
                Some(Some(Err(e))) => return self.fail(&handle, &target, e),
            }
        }

        let mut state = self.inner.state.lock();
        if self.inner.end_session(&mut state, &handle) {
            tracing::debug!("Session {} completed", handle.id());
            SendOutcome::Completed
        } else {
            SendOutcome::Cancelled
        }
    }

    async fn run_demo(&self, handle: SessionHandle) -> SendOutcome {
        let delay = self.inner.config.demo_delay();
        tokio::select! {
            biased;
            _ = handle.cancelled() => return SendOutcome::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }

        let mut state = self.inner.state.lock();
        if !state.is_current(&handle) {
            return SendOutcome::Cancelled;
        }
        let index = (random_u64() % DEMO_RESPONSES.len() as u64) as usize;
        let reply = Message::assistant(DEMO_RESPONSES[index]);
        state.conversation.push(reply.clone());
        self.inner.emit(ChatEvent::MessageAdded { message: reply });
        self.inner.end_session(&mut state, &handle);
        SendOutcome::Demo
    }

    /// Append a fragment to the target if `handle` is still current
    fn apply_fragment(&self, handle: &SessionHandle, target: &str, delta: String) -> bool {
        let mut state = self.inner.state.lock();
        let ChatState {
            conversation,
            session,
            ..
        } = &mut *state;

        let Some(session) = session
            .as_mut()
            .filter(|s| s.handle.id() == handle.id())
        else {
            tracing::debug!("Dropping fragment from superseded session {}", handle.id());
            return false;
        };
        let Some(message) = conversation.message_mut(target) else {
            return false;
        };

        session.state = SessionState::Streaming;
        message.content.push_str(&delta);
        self.inner.emit(ChatEvent::MessageDelta {
            id: target.to_string(),
            delta,
        });
        true
    }

    fn apply_text(&self, handle: &SessionHandle, target: &str, text: String) -> SendOutcome {
        let mut state = self.inner.state.lock();
        if !state.is_current(handle) {
            return SendOutcome::Cancelled;
        }
        if let Some(message) = state.conversation.message_mut(target) {
            message.content.push_str(&text);
            let message = message.clone();
            self.inner.emit(ChatEvent::MessageUpdated { message });
        }
        self.inner.end_session(&mut state, handle);
        SendOutcome::Completed
    }

    /// Write the error into the target as the assistant's reply
    fn fail(&self, handle: &SessionHandle, target: &str, error: orchat_ai::Error) -> SendOutcome {
        let text = error.to_string();
        let mut state = self.inner.state.lock();
        if !state.is_current(handle) {
            tracing::debug!("Ignoring error from superseded session {}: {}", handle.id(), text);
            return SendOutcome::Cancelled;
        }
        tracing::error!("Chat request failed: {:?}", error);

        if let Some(message) = state.conversation.message_mut(target) {
            if message.content.is_empty() {
                message.content = format!("Error: {}", text);
            } else {
                message.content.push_str(&format!("\n\nError: {}", text));
            }
            let message = message.clone();
            self.inner.emit(ChatEvent::MessageUpdated { message });
        }
        self.inner.emit(ChatEvent::Error {
            message: text.clone(),
        });
        self.inner.end_session(&mut state, handle);
        SendOutcome::Failed(text)
    }
}

fn random_u64() -> u64 {
    getrandom::u64().unwrap_or(0)
}
