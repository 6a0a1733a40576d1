//! Streaming client: drives one request/response exchange with the
//! assistant backend.
//!
//! ```text
//! Idle → Connecting → AwaitingFragments ⟲ fragment → Done
//!             └──────────────┴──→ Error (timeout, transport error, early close)
//! ```
//!
//! The same idle timeout guards the connect and every wait for the next
//! fragment. The channel is closed on every terminal transition.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::{select, Either};
use futures::StreamExt;

use billy_types::{
    BillyError, Result,
    event::{ChatEvent, FragmentKind, StreamFragment, StreamRequest},
    session::{ChatId, ChatSession},
};
use crate::event_bus::EventBus;
use crate::ports::{ChannelEvent, ExchangeChannel, StreamPort, TimerPort};
use crate::store::SharedStore;

/// Replaces the placeholder when an exchange ends without an answer.
pub const FAILED_ANSWER_NOTICE: &str = "Billy couldn't finish this answer. Try asking again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Connecting,
    AwaitingFragments,
    Done,
    Error(String),
}

/// What a fragment did to the exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentOutcome {
    /// Keep waiting for fragments
    Continue,
    /// Terminal answer applied; the snapshot is ready to persist
    Complete(ChatSession),
    /// Terminal answer with nothing left to update (the chat was dropped
    /// from the store mid-exchange)
    Orphaned,
}

pub struct StreamingClient {
    stream: Rc<dyn StreamPort>,
    timer: Rc<dyn TimerPort>,
    event_bus: EventBus,
    timeout_ms: u64,
    states: RefCell<HashMap<ChatId, ExchangeState>>,
}

impl StreamingClient {
    pub fn new(
        stream: Rc<dyn StreamPort>,
        timer: Rc<dyn TimerPort>,
        event_bus: EventBus,
        timeout_ms: u64,
    ) -> Self {
        Self {
            stream,
            timer,
            event_bus,
            timeout_ms,
            states: RefCell::new(HashMap::new()),
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Current state of the exchange for a chat. `Done` and `Error`
    /// stay visible until the next exchange on that chat starts.
    pub fn state(&self, chat_id: &str) -> ExchangeState {
        self.states
            .borrow()
            .get(chat_id)
            .cloned()
            .unwrap_or(ExchangeState::Idle)
    }

    fn set_state(&self, chat_id: &str, state: ExchangeState) {
        let mut states = self.states.borrow_mut();
        if state == ExchangeState::Idle {
            states.remove(chat_id);
        } else {
            states.insert(chat_id.to_string(), state);
        }
    }

    /// Run an exchange whose user message and placeholder are already in
    /// the store (see `SessionStore::begin_send`).
    ///
    /// Resolves to the final session snapshot once the terminal fragment
    /// has been applied. On timeout, transport failure, or early close
    /// the store's exchange is failed and the error is returned.
    pub async fn run(&self, store: &SharedStore, request: StreamRequest) -> Result<ChatSession> {
        let chat_id = request.session().to_string();
        self.set_state(&chat_id, ExchangeState::Connecting);
        self.event_bus.emit(ChatEvent::ExchangeStarted { chat_id: chat_id.clone() });
        log::info!("Exchange started for chat {}", chat_id);

        let opened = select(self.stream.open(&request), self.timer.sleep(self.timeout_ms)).await;
        let mut channel = match opened {
            Either::Left((Ok(channel), _)) => channel,
            Either::Left((Err(e), _)) => return Err(self.fail(store, &chat_id, None, e)),
            Either::Right(((), _)) => {
                let err = BillyError::Timeout(self.timeout_ms);
                return Err(self.fail(store, &chat_id, None, err));
            }
        };

        self.set_state(&chat_id, ExchangeState::AwaitingFragments);

        loop {
            let next = match select(channel.events.next(), self.timer.sleep(self.timeout_ms)).await {
                Either::Left((event, _)) => Some(event.unwrap_or(ChannelEvent::Closed)),
                Either::Right(_) => None,
            };
            let Some(event) = next else {
                let err = BillyError::Timeout(self.timeout_ms);
                return Err(self.fail(store, &chat_id, Some(&channel), err));
            };

            match event {
                ChannelEvent::Fragment(fragment) => {
                    match self.apply_fragment(store, &chat_id, &fragment) {
                        FragmentOutcome::Continue => {}
                        FragmentOutcome::Complete(snapshot) => {
                            store.borrow_mut().finish_exchange(&chat_id);
                            channel.handle.close();
                            self.set_state(&chat_id, ExchangeState::Done);
                            self.event_bus.emit(ChatEvent::ExchangeDone { chat_id: chat_id.clone() });
                            log::info!("Exchange done for chat {}", chat_id);
                            return Ok(snapshot);
                        }
                        FragmentOutcome::Orphaned => {
                            let err = BillyError::Other(format!("Chat {} is no longer open", chat_id));
                            return Err(self.fail(store, &chat_id, Some(&channel), err));
                        }
                    }
                }
                ChannelEvent::Closed => {
                    return Err(self.fail(store, &chat_id, Some(&channel), BillyError::ConnectionClosed));
                }
                ChannelEvent::Error(message) => {
                    return Err(self.fail(store, &chat_id, Some(&channel), BillyError::Socket(message)));
                }
            }
        }
    }

    /// Apply one fragment to the store.
    pub fn apply_fragment(
        &self,
        store: &SharedStore,
        chat_id: &str,
        fragment: &StreamFragment,
    ) -> FragmentOutcome {
        let mut store = store.borrow_mut();
        match fragment.kind {
            FragmentKind::Query => {
                store.set_query(chat_id, &fragment.response);
                self.event_bus.emit(ChatEvent::QueryUpdated { chat_id: chat_id.to_string() });
                FragmentOutcome::Continue
            }
            FragmentKind::Answer if fragment.is_done() => {
                match store.update_trailing_message(chat_id, &fragment.response, true) {
                    Some(snapshot) => FragmentOutcome::Complete(snapshot),
                    None => {
                        log::warn!("Terminal fragment for chat {} had nothing to update", chat_id);
                        FragmentOutcome::Orphaned
                    }
                }
            }
            FragmentKind::Answer => {
                store.update_trailing_message(chat_id, &fragment.response, false);
                self.event_bus.emit(ChatEvent::AnswerProgress { chat_id: chat_id.to_string() });
                FragmentOutcome::Continue
            }
            FragmentKind::Other => {
                log::debug!("Ignoring unrecognised fragment for chat {}", chat_id);
                FragmentOutcome::Continue
            }
        }
    }

    fn fail(
        &self,
        store: &SharedStore,
        chat_id: &str,
        channel: Option<&ExchangeChannel>,
        err: BillyError,
    ) -> BillyError {
        if let Some(channel) = channel {
            channel.handle.close();
        }
        store.borrow_mut().fail_exchange(chat_id, FAILED_ANSWER_NOTICE);
        log::error!("Exchange failed for chat {}: {}", chat_id, err);
        self.set_state(chat_id, ExchangeState::Error(err.to_string()));
        self.event_bus.emit(ChatEvent::ExchangeFailed {
            chat_id: chat_id.to_string(),
            message: err.to_string(),
        });
        err
    }
}
