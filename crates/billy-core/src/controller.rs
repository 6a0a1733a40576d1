//! Chat controller: what the UI calls.
//!
//! Composes the session store, the streaming client and the persistence
//! gateway. Backend failures are logged and reported on the event bus;
//! the UI never has to handle them.

use std::cell::RefCell;

use billy_types::{
    Result,
    event::{ChatEvent, StreamRequest},
    feedback::FeedbackStatus,
    session::{ChatId, ChatSession},
};
use crate::event_bus::EventBus;
use crate::exchange::StreamingClient;
use crate::gateway::PersistenceGateway;
use crate::store::SharedStore;

pub struct ChatController {
    store: SharedStore,
    client: StreamingClient,
    gateway: PersistenceGateway,
    event_bus: EventBus,
    user_id: RefCell<Option<String>>,
}

impl ChatController {
    pub fn new(
        store: SharedStore,
        client: StreamingClient,
        gateway: PersistenceGateway,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            client,
            gateway,
            event_bus,
            user_id: RefCell::new(None),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn client(&self) -> &StreamingClient {
        &self.client
    }

    /// Set (or clear, on sign-out) the user whose chats are persisted.
    pub fn set_user(&self, user_id: Option<String>) {
        *self.user_id.borrow_mut() = user_id;
    }

    pub fn user_id(&self) -> Option<String> {
        self.user_id.borrow().clone()
    }

    pub fn new_chat(&self) -> ChatId {
        let id = self.store.borrow_mut().new_chat();
        log::info!("New chat {}", id);
        id
    }

    /// Make a chat active and, when its messages have not been fetched
    /// yet, load them from the backend.
    pub async fn select_chat(&self, chat_id: &str) {
        let needs_load = {
            let mut store = self.store.borrow_mut();
            if !store.activate(chat_id) {
                log::warn!("Cannot select unknown chat {}", chat_id);
                return;
            }
            !store.is_answering(chat_id)
                && store.get(chat_id).is_some_and(|s| s.messages.is_empty())
        };
        if !needs_load {
            return;
        }
        let Some(user_id) = self.user_id() else {
            return;
        };

        match self.gateway.load_one(&user_id, chat_id).await {
            Ok(Some(loaded)) => {
                self.store
                    .borrow_mut()
                    .refresh_messages(chat_id, loaded.messages, loaded.sql_query);
            }
            Ok(None) => {}
            Err(e) => log::error!("Failed to load chat {}: {}", chat_id, e),
        }
    }

    /// Replace the store's sessions with the user's stored chats. Makes
    /// sure at least one chat exists afterwards.
    pub async fn load_history(&self) {
        let Some(user_id) = self.user_id() else {
            log::warn!("Skipping history load: no signed-in user");
            self.ensure_chat();
            return;
        };

        match self.gateway.load_all(&user_id).await {
            Ok(sessions) => {
                let count = sessions.len();
                self.store.borrow_mut().replace_all(sessions);
                log::info!("Loaded {} chats", count);
                self.event_bus.emit(ChatEvent::HistoryLoaded { count });
            }
            Err(e) => {
                log::error!("Error fetching chats: {}", e);
                self.event_bus.emit(ChatEvent::HistoryFailed { message: e.to_string() });
            }
        }
        self.ensure_chat();
    }

    fn ensure_chat(&self) {
        let empty = self.store.borrow().is_empty();
        if empty {
            self.new_chat();
        }
    }

    /// Send a message on the active chat and run the exchange to its end.
    ///
    /// Blank input, no active chat, or a chat that is already answering
    /// is a no-op. An exchange failure has already been applied to the
    /// store and reported when the error is returned.
    pub async fn send(&self, text: &str) -> Result<()> {
        let request = {
            let mut store = self.store.borrow_mut();
            if store.active_id().is_none() {
                store.new_chat();
            }
            let Some(chat_id) = store.active_id().map(str::to_string) else {
                return Ok(());
            };
            store.begin_send(&chat_id, text)
        };
        match request {
            Some(request) => self.run_exchange(request).await,
            None => {
                log::debug!("Send refused");
                Ok(())
            }
        }
    }

    /// Resend the question behind the assistant message at `index` of
    /// the active chat.
    pub async fn ask_again(&self, index: usize) -> Result<()> {
        let request = {
            let mut store = self.store.borrow_mut();
            let Some(chat_id) = store.active_id().map(str::to_string) else {
                return Ok(());
            };
            store.ask_again(&chat_id, index)
        };
        match request {
            Some(request) => self.run_exchange(request).await,
            None => Ok(()),
        }
    }

    async fn run_exchange(&self, request: StreamRequest) -> Result<()> {
        let snapshot = self.client.run(&self.store, request).await?;
        self.save(&snapshot).await;
        Ok(())
    }

    async fn save(&self, session: &ChatSession) {
        let Some(user_id) = self.user_id() else {
            log::warn!("Chat {} not saved: no signed-in user", session.id);
            return;
        };
        if self.gateway.save(&user_id, session).await {
            self.event_bus.emit(ChatEvent::ChatSaved { chat_id: session.id.clone() });
        } else {
            self.event_bus.emit(ChatEvent::SaveFailed {
                chat_id: session.id.clone(),
                message: "Failed to post chat".to_string(),
            });
        }
    }

    /// Judge the assistant message at `index` of the active chat.
    ///
    /// Returns true when the judgment was stored. The index is locked
    /// while the request is in flight and permanently once it succeeds.
    pub async fn record_feedback(&self, index: usize, approved: bool) -> bool {
        let Some(user_id) = self.user_id() else {
            log::warn!("Feedback ignored: no signed-in user");
            return false;
        };
        let claimed = {
            let mut store = self.store.borrow_mut();
            store
                .active_id()
                .map(str::to_string)
                .and_then(|id| store.begin_feedback(&id, index).map(|draft| (id, draft)))
        };
        let Some((chat_id, draft)) = claimed else {
            return false;
        };

        let status = FeedbackStatus::from_approved(approved);
        let stored = self
            .gateway
            .record_feedback(&draft.question, &draft.answer, approved, &draft.sql, &user_id)
            .await;

        self.store
            .borrow_mut()
            .finish_feedback(&chat_id, index, status, stored);
        if stored {
            self.event_bus.emit(ChatEvent::FeedbackRecorded { chat_id, index, status });
        } else {
            self.event_bus.emit(ChatEvent::FeedbackFailed { chat_id, index });
        }
        stored
    }
}
