#[cfg(test)]
mod tests {
    use crate::analytics::*;
    use crate::controller::ChatController;
    use crate::event_bus::EventBus;
    use crate::exchange::{ExchangeState, StreamingClient, FAILED_ANSWER_NOTICE};
    use crate::feedback::FeedbackLedger;
    use crate::gateway::{decode_messages, sessions_from_records, PersistenceGateway};
    use crate::ports::*;
    use crate::store::{SessionStore, SharedStore};
    use billy_types::analytics::{QueryRecord, SessionRecord};
    use billy_types::event::{ChatEvent, StreamFragment, StreamRequest};
    use billy_types::feedback::{FeedbackRecord, FeedbackStatus};
    use billy_types::message::*;
    use billy_types::session::*;
    use billy_types::BillyError;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::cell::{Cell, RefCell};
    use std::future::Future;
    use std::pin::Pin;
    use std::rc::Rc;

    // Simple executor for single-threaded tests; every mock below
    // resolves without a real waker.
    fn block_on<F: Future<Output = T>, T>(f: F) -> T {
        use std::task::{Context, Poll, Wake, Waker};
        use std::sync::Arc;

        struct NoopWaker;
        impl Wake for NoopWaker {
            fn wake(self: Arc<Self>) {}
        }

        let waker = Waker::from(Arc::new(NoopWaker));
        let mut cx = Context::from_waker(&waker);
        let mut f = std::pin::pin!(f);

        loop {
            match f.as_mut().poll(&mut cx) {
                Poll::Ready(val) => return val,
                Poll::Pending => std::thread::yield_now(),
            }
        }
    }

    // ─── Mocks ───────────────────────────────────────────────

    struct MockHandle {
        closes: Rc<Cell<usize>>,
    }

    impl ChannelHandle for MockHandle {
        fn close(&self) {
            self.closes.set(self.closes.get() + 1);
        }

        fn is_open(&self) -> bool {
            self.closes.get() == 0
        }
    }

    /// Replays scripted events; once they run out the stream either ends
    /// (server close) or goes quiet forever.
    struct MockStream {
        script: RefCell<Vec<ChannelEvent>>,
        hang_after: bool,
        fail_open: Option<BillyError>,
        hang_open: bool,
        opened: RefCell<Vec<StreamRequest>>,
        closes: Rc<Cell<usize>>,
    }

    impl MockStream {
        fn new(script: Vec<ChannelEvent>) -> Self {
            Self {
                script: RefCell::new(script),
                hang_after: false,
                fail_open: None,
                hang_open: false,
                opened: RefCell::new(Vec::new()),
                closes: Rc::new(Cell::new(0)),
            }
        }

        fn answering(fragments: Vec<StreamFragment>) -> Self {
            Self::new(fragments.into_iter().map(ChannelEvent::Fragment).collect())
        }

        fn hanging(mut self) -> Self {
            self.hang_after = true;
            self
        }
    }

    #[async_trait(?Send)]
    impl StreamPort for MockStream {
        async fn open(&self, request: &StreamRequest) -> billy_types::Result<ExchangeChannel> {
            if self.hang_open {
                futures::future::pending::<()>().await;
            }
            if let Some(err) = &self.fail_open {
                return Err(err.clone());
            }
            self.opened.borrow_mut().push(request.clone());
            let events = futures::stream::iter(self.script.borrow_mut().drain(..).collect::<Vec<_>>());
            let events: Pin<Box<dyn futures::Stream<Item = ChannelEvent>>> = if self.hang_after {
                Box::pin(futures::StreamExt::chain(events, futures::stream::pending()))
            } else {
                Box::pin(events)
            };
            Ok(ExchangeChannel {
                events,
                handle: Box::new(MockHandle { closes: self.closes.clone() }),
            })
        }
    }

    /// Timer that fires immediately. `select` polls the stream first, so
    /// ready fragments always win; an idle stream times out at once.
    struct InstantTimer;

    impl TimerPort for InstantTimer {
        fn sleep(&self, _ms: u64) -> Pin<Box<dyn Future<Output = ()>>> {
            Box::pin(futures::future::ready(()))
        }
    }

    #[derive(Default)]
    struct MockBackend {
        stored: RefCell<Vec<StoredChat>>,
        single: RefCell<RetrieveChatResponse>,
        posts: RefCell<Vec<PostChatRequest>>,
        feedback: RefCell<Vec<FeedbackRecord>>,
        fail_posts: Cell<bool>,
        fail_feedback: Cell<bool>,
        fail_fetch: Cell<bool>,
        single_fetches: Cell<usize>,
    }

    #[async_trait(?Send)]
    impl ChatBackendPort for MockBackend {
        async fn retrieve_all_chats(&self, _user_id: &str) -> billy_types::Result<Vec<StoredChat>> {
            if self.fail_fetch.get() {
                return Err(BillyError::Http { status: 500, body: "boom".to_string() });
            }
            Ok(self.stored.borrow().clone())
        }

        async fn retrieve_chat(&self, _user_id: &str, _chat_id: &str) -> billy_types::Result<RetrieveChatResponse> {
            self.single_fetches.set(self.single_fetches.get() + 1);
            Ok(self.single.borrow().clone())
        }

        async fn post_chat(&self, request: &PostChatRequest) -> billy_types::Result<()> {
            if self.fail_posts.get() {
                return Err(BillyError::Network("offline".to_string()));
            }
            self.posts.borrow_mut().push(request.clone());
            Ok(())
        }

        async fn store_feedback(&self, record: &FeedbackRecord) -> billy_types::Result<()> {
            if self.fail_feedback.get() {
                return Err(BillyError::Http { status: 400, body: "bad".to_string() });
            }
            self.feedback.borrow_mut().push(record.clone());
            Ok(())
        }
    }

    struct Harness {
        controller: ChatController,
        backend: Rc<MockBackend>,
        stream: Rc<MockStream>,
        bus: EventBus,
    }

    impl Harness {
        fn new(stream: MockStream) -> Self {
            let bus = EventBus::new();
            let backend = Rc::new(MockBackend::default());
            let stream = Rc::new(stream);
            let client = StreamingClient::new(stream.clone(), Rc::new(InstantTimer), bus.clone(), 60_000);
            let gateway = PersistenceGateway::new(backend.clone(), 10, "general");
            let controller = ChatController::new(SessionStore::shared(), client, gateway, bus.clone());
            controller.set_user(Some("user-1".to_string()));
            Self { controller, backend, stream, bus }
        }

        fn store(&self) -> &SharedStore {
            self.controller.store()
        }

        fn active(&self) -> ChatSession {
            self.store().borrow().active().cloned().unwrap()
        }

        fn has_event(&self, f: impl Fn(&ChatEvent) -> bool) -> bool {
            self.bus.drain().iter().any(f)
        }
    }

    fn stored_chat(id: &str, updated_at: &str) -> StoredChat {
        StoredChat {
            id: id.to_string(),
            name: Some(format!("chat {}", id)),
            updated_at: Some(updated_at.to_string()),
            messages: Some(r#"[{"role":"user","content":"q"}]"#.to_string()),
            ..Default::default()
        }
    }

    /// Store with one active chat holding a new user/assistant pair.
    fn store_with_answer() -> (SessionStore, ChatId) {
        let mut store = SessionStore::new();
        let id = store.new_chat();
        store.begin_send(&id, "Who won?").unwrap();
        store.update_trailing_message(&id, "The Lakers", true).unwrap();
        store.finish_exchange(&id);
        (store, id)
    }

    // ─── EventBus ────────────────────────────────────────────

    #[test]
    fn test_event_bus_emit_and_drain() {
        let bus = EventBus::new();
        assert!(!bus.has_pending());
        bus.emit(ChatEvent::HistoryLoaded { count: 3 });
        bus.emit(ChatEvent::ExchangeDone { chat_id: "a".to_string() });
        assert!(bus.has_pending());
        assert_eq!(bus.drain().len(), 2);
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn test_event_bus_clone_shares_state() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();
        bus1.emit(ChatEvent::HistoryLoaded { count: 1 });
        assert!(bus2.has_pending());
        assert_eq!(bus2.drain().len(), 1);
        assert!(!bus1.has_pending());
    }

    // ─── Session Store ───────────────────────────────────────

    #[test]
    fn test_new_chat_names_and_order() {
        let mut store = SessionStore::new();
        let first = store.new_chat();
        let second = store.new_chat();
        assert_eq!(store.len(), 2);
        assert_eq!(store.active_id(), Some(second.as_str()));
        let names: Vec<_> = store.sessions().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["Chat 2", "Chat 1"]);
        assert_ne!(first, second);
    }

    #[test]
    fn test_append_ignores_blank() {
        let mut store = SessionStore::new();
        let id = store.new_chat();
        assert!(!store.append_message(&id, Message::user("   \n")));
        assert!(store.get(&id).unwrap().messages.is_empty());
        assert!(store.append_message(&id, Message::assistant("hello")));
        assert!(store.get(&id).unwrap().messages[0].is_new);
    }

    #[test]
    fn test_begin_send_appends_user_then_placeholder() {
        let mut store = SessionStore::new();
        let id = store.new_chat();
        let request = store.begin_send(&id, "Best bet tonight?").unwrap();
        assert_eq!(request.session(), id);
        assert_eq!(request.text(), "Best bet tonight?");

        let session = store.get(&id).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, Role::User);
        assert_eq!(session.messages[0].content, "Best bet tonight?");
        assert!(session.messages[1].is_placeholder());
        assert!(store.is_answering(&id));
    }

    #[test]
    fn test_begin_send_blank_is_noop() {
        let mut store = SessionStore::new();
        let id = store.new_chat();
        for text in ["", "   ", "\t\n"] {
            assert!(store.begin_send(&id, text).is_none());
        }
        assert!(store.get(&id).unwrap().messages.is_empty());
        assert!(!store.is_answering(&id));
    }

    #[test]
    fn test_begin_send_refused_while_answering() {
        let mut store = SessionStore::new();
        let id = store.new_chat();
        assert!(store.begin_send(&id, "one").is_some());
        assert!(store.begin_send(&id, "two").is_none());
        assert_eq!(store.get(&id).unwrap().messages.len(), 2);
    }

    #[test]
    fn test_begin_send_renames_placeholder_chat() {
        let mut store = SessionStore::new();
        let id = store.new_chat();
        store.begin_send(&id, "Who covers the spread?").unwrap();
        assert_eq!(store.get(&id).unwrap().name, "Who covers...");

        store.finish_exchange(&id);
        store.begin_send(&id, "Second question").unwrap();
        assert_eq!(store.get(&id).unwrap().name, "Who covers...");
    }

    #[test]
    fn test_begin_send_keeps_custom_name() {
        let mut store = SessionStore::new();
        store.insert(ChatSession::new("c1".to_string(), "Playoffs"));
        store.begin_send("c1", "hello there friend").unwrap();
        assert_eq!(store.get("c1").unwrap().name, "Playoffs");
    }

    #[test]
    fn test_trailing_update_ignored_when_idle() {
        let mut store = SessionStore::new();
        let id = store.new_chat();
        store.append_message(&id, Message::assistant("old"));
        assert!(store.update_trailing_message(&id, "new", true).is_none());
        assert_eq!(store.get(&id).unwrap().messages[0].content, "old");
    }

    #[test]
    fn test_trailing_update_final_returns_snapshot() {
        let mut store = SessionStore::new();
        let id = store.new_chat();
        store.begin_send(&id, "hi").unwrap();
        assert!(store.update_trailing_message(&id, "Hel", false).is_none());
        let snapshot = store.update_trailing_message(&id, "Hello!", true).unwrap();
        assert_eq!(snapshot.messages[1].content, "Hello!");
        assert!(snapshot.messages[1].is_new);
        assert!(snapshot.updated_at.is_some());
        // answering is only cleared by finish_exchange
        assert!(store.is_answering(&id));
    }

    #[test]
    fn test_fail_exchange_rewrites_placeholder_only() {
        let mut store = SessionStore::new();
        let id = store.new_chat();
        store.begin_send(&id, "hi").unwrap();
        store.fail_exchange(&id, "failed");
        assert_eq!(store.get(&id).unwrap().messages[1].content, "failed");
        assert!(!store.is_answering(&id));
        assert!(!store.feedback_eligible(&id, 1));
        assert!(store.begin_feedback(&id, 1).is_none());

        store.begin_send(&id, "again").unwrap();
        store.update_trailing_message(&id, "Partial answ", false);
        store.fail_exchange(&id, "failed");
        assert_eq!(store.get(&id).unwrap().messages[3].content, "Partial answ");
        assert!(!store.feedback_eligible(&id, 3));
    }

    #[test]
    fn test_ask_again_resends_preceding_question() {
        let (mut store, id) = store_with_answer();
        let request = store.ask_again(&id, 1).unwrap();
        assert_eq!(request.text(), "Who won?");
        assert_eq!(store.get(&id).unwrap().messages.len(), 4);
        // index 0 is a user message
        store.finish_exchange(&id);
        assert!(store.ask_again(&id, 0).is_none());
    }

    #[test]
    fn test_replace_all_keeps_active_and_answering() {
        let mut store = SessionStore::new();
        let busy = store.new_chat();
        store.begin_send(&busy, "live question").unwrap();

        let mut loaded = ChatSession::new(busy.clone(), "stale");
        loaded.messages.push(Message::user("old"));
        store.replace_all(vec![ChatSession::new("x".to_string(), "X"), loaded]);

        assert_eq!(store.len(), 2);
        assert_eq!(store.active_id(), Some(busy.as_str()));
        assert_eq!(store.get(&busy).unwrap().messages[0].content, "live question");
    }

    #[test]
    fn test_replace_all_activates_first_when_active_gone() {
        let mut store = SessionStore::new();
        store.new_chat();
        store.replace_all(vec![
            ChatSession::new("a".to_string(), "A"),
            ChatSession::new("b".to_string(), "B"),
        ]);
        assert_eq!(store.active_id(), Some("a"));
        let ids: Vec<_> = store.summaries().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_refresh_refused_while_answering() {
        let mut store = SessionStore::new();
        let id = store.new_chat();
        store.begin_send(&id, "q").unwrap();
        assert!(!store.refresh_messages(&id, vec![], "sql".to_string()));
        store.finish_exchange(&id);
        assert!(store.refresh_messages(&id, vec![Message::user("x")], "sql".to_string()));
        assert_eq!(store.get(&id).unwrap().sql_query, "sql");
    }

    // ─── Feedback ledger ─────────────────────────────────────

    #[test]
    fn test_ledger_records_once() {
        let mut ledger = FeedbackLedger::new();
        assert!(ledger.begin(1));
        assert!(ledger.is_locked(1));
        assert!(!ledger.begin(1));
        ledger.finish(1, FeedbackStatus::Approved, true);
        assert_eq!(ledger.status(1), Some(FeedbackStatus::Approved));
        assert!(!ledger.begin(1));
        ledger.finish(1, FeedbackStatus::Disapproved, true);
        assert_eq!(ledger.status(1), Some(FeedbackStatus::Approved));
        assert_eq!(ledger.recorded_count(), 1);
    }

    #[test]
    fn test_ledger_failure_unlocks() {
        let mut ledger = FeedbackLedger::new();
        assert!(ledger.begin(3));
        ledger.finish(3, FeedbackStatus::Disapproved, false);
        assert!(!ledger.is_locked(3));
        assert_eq!(ledger.status(3), None);
        assert!(ledger.begin(3));
    }

    #[test]
    fn test_feedback_eligibility() {
        let (mut store, id) = store_with_answer();
        assert!(store.feedback_eligible(&id, 1));
        assert!(!store.feedback_eligible(&id, 0));

        let draft = store.begin_feedback(&id, 1).unwrap();
        assert_eq!(draft.question, "Who won?");
        assert_eq!(draft.answer, "The Lakers");
        assert!(store.feedback_locked(&id, 1));
        assert!(store.feedback_pending(&id, 1));
        assert!(store.begin_feedback(&id, 1).is_none());
    }

    #[test]
    fn test_history_messages_not_eligible() {
        let mut store = SessionStore::new();
        let mut session = ChatSession::new("h".to_string(), "Old");
        session.messages = decode_messages(r#"[{"role":"user","content":"q"},{"role":"assistant","content":"a"}]"#);
        store.insert(session);
        assert!(!store.feedback_eligible("h", 1));
    }

    // ─── Streaming client ────────────────────────────────────

    #[test]
    fn test_hi_hello_scenario() {
        let h = Harness::new(MockStream::answering(vec![
            StreamFragment::partial("Hel"),
            StreamFragment::done("Hello!"),
        ]));
        h.controller.new_chat();

        block_on(h.controller.send("hi")).unwrap();

        let session = h.active();
        let pairs: Vec<_> = session.messages.iter().map(|m| (m.role, m.content.as_str())).collect();
        assert_eq!(pairs, vec![(Role::User, "hi"), (Role::Assistant, "Hello!")]);
        assert!(!h.store().borrow().is_answering(&session.id));
        assert_eq!(h.stream.closes.get(), 1);

        let posts = h.backend.posts.borrow();
        assert_eq!(posts.len(), 1);
        assert_eq!(
            posts[0].messages,
            r#"[{"role":"user","content":"hi"},{"role":"assistant","content":"Hello!"}]"#
        );
        assert_eq!(posts[0].chat_id, session.id);
        assert_eq!(posts[0].user_id, "user-1");
        assert_eq!(posts[0].name, "hi");
    }

    #[test]
    fn test_answering_cleared_only_after_terminal() {
        let bus = EventBus::new();
        let store = SessionStore::shared();
        let id = store.borrow_mut().new_chat();
        store.borrow_mut().begin_send(&id, "q").unwrap();
        let client = StreamingClient::new(
            Rc::new(MockStream::new(vec![])),
            Rc::new(InstantTimer),
            bus,
            1000,
        );

        for text in ["a", "ab", "abc"] {
            client.apply_fragment(&store, &id, &StreamFragment::partial(text));
            assert!(store.borrow().is_answering(&id));
        }
        client.apply_fragment(&store, &id, &StreamFragment::query("SELECT 1"));
        assert_eq!(store.borrow().get(&id).unwrap().sql_query, "SELECT 1");
        assert_eq!(store.borrow().get(&id).unwrap().messages[1].content, "abc");
    }

    #[test]
    fn test_query_fragment_sets_sql() {
        let h = Harness::new(MockStream::answering(vec![
            StreamFragment::query("SELECT * FROM games"),
            StreamFragment::done("Here you go"),
        ]));
        block_on(h.controller.send("games?")).unwrap();
        assert_eq!(h.active().sql_query, "SELECT * FROM games");
        assert_eq!(h.backend.posts.borrow()[0].sql_query, "SELECT * FROM games");
    }

    #[test]
    fn test_send_blank_starts_nothing() {
        let h = Harness::new(MockStream::answering(vec![StreamFragment::done("x")]));
        h.controller.new_chat();
        block_on(h.controller.send("   ")).unwrap();
        assert!(h.active().messages.is_empty());
        assert!(h.stream.opened.borrow().is_empty());
    }

    #[test]
    fn test_timeout_fails_exchange() {
        let h = Harness::new(MockStream::answering(vec![StreamFragment::partial("Hel")]).hanging());
        h.controller.new_chat();

        let result = block_on(h.controller.send("hi"));
        assert_eq!(result, Err(BillyError::Timeout(60_000)));

        let session = h.active();
        assert!(!h.store().borrow().is_answering(&session.id));
        assert_eq!(session.messages[1].content, "Hel");
        assert_eq!(h.stream.closes.get(), 1);
        assert!(h.backend.posts.borrow().is_empty());
        assert!(matches!(
            h.controller.client().state(&session.id),
            ExchangeState::Error(_)
        ));
    }

    #[test]
    fn test_early_close_replaces_placeholder() {
        let h = Harness::new(MockStream::new(vec![]));
        h.controller.new_chat();

        let result = block_on(h.controller.send("hi"));
        assert_eq!(result, Err(BillyError::ConnectionClosed));

        let session = h.active();
        assert_eq!(session.messages[1].content, FAILED_ANSWER_NOTICE);
        assert_eq!(h.stream.closes.get(), 1);
        assert!(h.backend.posts.borrow().is_empty());
        assert!(h.has_event(|e| matches!(e, ChatEvent::ExchangeFailed { .. })));
    }

    #[test]
    fn test_transport_error_fails_exchange() {
        let h = Harness::new(MockStream::new(vec![ChannelEvent::Error("reset".to_string())]));
        let result = block_on(h.controller.send("hi"));
        assert_eq!(result, Err(BillyError::Socket("reset".to_string())));
        assert_eq!(h.stream.closes.get(), 1);
    }

    #[test]
    fn test_open_failure_fails_exchange() {
        let mut stream = MockStream::new(vec![]);
        stream.fail_open = Some(BillyError::Socket("refused".to_string()));
        let h = Harness::new(stream);
        let result = block_on(h.controller.send("hi"));
        assert!(result.is_err());
        let session = h.active();
        assert_eq!(session.messages[1].content, FAILED_ANSWER_NOTICE);
        assert!(!h.store().borrow().is_answering(&session.id));
        assert_eq!(h.stream.closes.get(), 0);
    }

    #[test]
    fn test_connect_timeout() {
        let mut stream = MockStream::new(vec![]);
        stream.hang_open = true;
        let h = Harness::new(stream);
        let result = block_on(h.controller.send("hi"));
        assert_eq!(result, Err(BillyError::Timeout(60_000)));
        assert!(!h.store().borrow().is_answering(&h.active().id));
    }

    #[test]
    fn test_client_reports_done_after_answer() {
        let h = Harness::new(MockStream::answering(vec![StreamFragment::done("ok")]));
        block_on(h.controller.send("hi")).unwrap();
        let id = h.active().id;
        assert_eq!(h.controller.client().state(&id), ExchangeState::Done);
        assert!(h.has_event(|e| matches!(e, ChatEvent::ChatSaved { .. })));

        // the next exchange on the same chat replaces Done
        h.stream.script.borrow_mut().push(ChannelEvent::Closed);
        assert!(block_on(h.controller.send("again")).is_err());
        assert!(matches!(h.controller.client().state(&id), ExchangeState::Error(_)));
    }

    #[test]
    fn test_terminal_fragment_for_dropped_chat_ends_exchange() {
        let bus = EventBus::new();
        let store = SessionStore::shared();
        let stream = Rc::new(MockStream::answering(vec![StreamFragment::done("late")]).hanging());
        let client = StreamingClient::new(stream.clone(), Rc::new(InstantTimer), bus.clone(), 1000);

        let result = block_on(client.run(&store, StreamRequest::new("gone", "hi")));
        assert!(matches!(result, Err(BillyError::Other(_))));
        assert_eq!(stream.closes.get(), 1);
        assert!(matches!(client.state("gone"), ExchangeState::Error(_)));
        assert!(bus.drain().iter().any(|e| matches!(e, ChatEvent::ExchangeFailed { .. })));
        assert!(store.borrow().is_empty());
    }

    #[test]
    fn test_feedback_refused_after_failed_exchange() {
        let h = Harness::new(MockStream::new(vec![]));
        h.controller.new_chat();
        assert_eq!(block_on(h.controller.send("hi")), Err(BillyError::ConnectionClosed));
        assert_eq!(h.active().messages[1].content, FAILED_ANSWER_NOTICE);
        assert!(!block_on(h.controller.record_feedback(1, true)));
        assert!(h.backend.feedback.borrow().is_empty());
    }

    #[test]
    fn test_feedback_refused_after_partial_answer_times_out() {
        let h = Harness::new(MockStream::answering(vec![StreamFragment::partial("Half an")]).hanging());
        assert_eq!(block_on(h.controller.send("hi")), Err(BillyError::Timeout(60_000)));
        assert_eq!(h.active().messages[1].content, "Half an");
        assert!(!block_on(h.controller.record_feedback(1, false)));
        assert!(h.backend.feedback.borrow().is_empty());
    }

    #[test]
    fn test_save_failure_keeps_local_state() {
        let h = Harness::new(MockStream::answering(vec![StreamFragment::done("kept")]));
        h.backend.fail_posts.set(true);
        block_on(h.controller.send("hi")).unwrap();
        assert_eq!(h.active().messages[1].content, "kept");
        assert!(h.has_event(|e| matches!(e, ChatEvent::SaveFailed { .. })));
    }

    #[test]
    fn test_ask_again_runs_new_exchange() {
        let h = Harness::new(MockStream::answering(vec![]));
        h.controller.new_chat();
        {
            let mut store = h.store().borrow_mut();
            let id = store.active_id().unwrap().to_string();
            store.begin_send(&id, "Odds?").unwrap();
            store.update_trailing_message(&id, "2:1", true);
            store.finish_exchange(&id);
        }
        h.stream.script.borrow_mut().push(ChannelEvent::Fragment(StreamFragment::done("3:1")));

        block_on(h.controller.ask_again(1)).unwrap();
        let session = h.active();
        assert_eq!(session.messages.len(), 4);
        assert_eq!(session.messages[2].content, "Odds?");
        assert_eq!(session.messages[3].content, "3:1");
        assert_eq!(h.stream.opened.borrow()[0].text(), "Odds?");
    }

    // ─── Persistence gateway ─────────────────────────────────

    #[test]
    fn test_decode_malformed_is_empty() {
        assert!(decode_messages("{not json").is_empty());
        assert!(decode_messages("").is_empty());
        assert!(decode_messages(r#"[{"role":"robot","content":"x"}]"#).is_empty());
        let ok = decode_messages(r#"[{"role":"assistant","content":"x"}]"#);
        assert_eq!(ok, vec![Message::assistant("x")]);
        assert!(!ok[0].is_new);
    }

    #[test]
    fn test_load_all_keeps_ten_most_recent() {
        let records: Vec<_> = (0..15)
            .map(|i| stored_chat(&format!("c{:02}", i), &format!("2024-09-{:02}T10:00:00Z", i + 1)))
            .collect();
        let sessions = sessions_from_records(records, 10);
        assert_eq!(sessions.len(), 10);
        let ids: Vec<_> = sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids[0], "c14");
        assert_eq!(ids[9], "c05");
        let stamps: Vec<_> = sessions.iter().map(|s| s.updated_at.clone().unwrap()).collect();
        let mut sorted = stamps.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(stamps, sorted);
    }

    #[test]
    fn test_load_all_orders_rfc2822_stamps() {
        let records: Vec<_> = (0..12)
            .map(|i| {
                let stamp = Utc.with_ymd_and_hms(2024, 9, i + 1, 10, 0, 0).unwrap().to_rfc2822();
                stored_chat(&format!("c{}", i), &stamp)
            })
            .collect();
        let sessions = sessions_from_records(records, 10);
        let ids: Vec<_> = sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), 10);
        assert_eq!(ids[0], "c11");
        assert_eq!(ids[9], "c2");
        assert!(!ids.contains(&"c0") && !ids.contains(&"c1"));
    }

    #[test]
    fn test_load_all_decodes_inline_message_list() {
        let resp: RetrieveAllChatsResponse = serde_json::from_str(
            r#"{"chats":[
                {"id":"a","updated_at":"2024-09-01T00:00:00Z","messages":"[]"},
                {"id":"b","updated_at":"2024-09-02T00:00:00Z","messages":[{"role":"user","content":"hi"}]}
            ]}"#,
        )
        .unwrap();
        let sessions = sessions_from_records(resp.chats, 10);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, "b");
        assert_eq!(sessions[0].messages, vec![Message::user("hi")]);
        assert!(sessions[1].messages.is_empty());
    }

    #[test]
    fn test_load_all_defaults() {
        let records = vec![
            StoredChat {
                id: "nameless".to_string(),
                created_at: Some("2024-01-02T00:00:00Z".to_string()),
                messages: Some("garbage".to_string()),
                ..Default::default()
            },
            StoredChat {
                id: "undated".to_string(),
                name: Some("Undated".to_string()),
                ..Default::default()
            },
            stored_chat("fresh", "2024-05-01 08:00:00"),
        ];
        let sessions = sessions_from_records(records, 10);
        let ids: Vec<_> = sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["fresh", "nameless", "undated"]);
        assert_eq!(sessions[1].name, UNTITLED_CHAT);
        assert!(sessions[1].messages.is_empty());
        assert_eq!(sessions[1].updated_at.as_deref(), Some("2024-01-02T00:00:00Z"));
    }

    #[test]
    fn test_load_history_fills_store() {
        let h = Harness::new(MockStream::new(vec![]));
        *h.backend.stored.borrow_mut() = (0..15)
            .map(|i| stored_chat(&format!("c{:02}", i), &format!("2024-09-{:02}T10:00:00Z", i + 1)))
            .collect();
        block_on(h.controller.load_history());
        assert_eq!(h.store().borrow().len(), 10);
        assert_eq!(h.active().id, "c14");
        assert!(h.has_event(|e| *e == ChatEvent::HistoryLoaded { count: 10 }));
    }

    #[test]
    fn test_load_history_failure_creates_chat() {
        let h = Harness::new(MockStream::new(vec![]));
        h.backend.fail_fetch.set(true);
        block_on(h.controller.load_history());
        assert_eq!(h.store().borrow().len(), 1);
        assert_eq!(h.active().name, "Chat 1");
        assert!(h.has_event(|e| matches!(e, ChatEvent::HistoryFailed { .. })));
    }

    #[test]
    fn test_select_chat_loads_empty_session() {
        let h = Harness::new(MockStream::new(vec![]));
        h.store().borrow_mut().insert(ChatSession::new("s1".to_string(), "Stored"));
        *h.backend.single.borrow_mut() = RetrieveChatResponse {
            chat: Some(r#"[{"role":"user","content":"q"},{"role":"assistant","content":"a"}]"#.to_string()),
            sql_query: Some("SELECT 2".to_string()),
        };

        block_on(h.controller.select_chat("s1"));
        let session = h.active();
        assert_eq!(session.id, "s1");
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.sql_query, "SELECT 2");

        block_on(h.controller.select_chat("s1"));
        assert_eq!(h.backend.single_fetches.get(), 1);
    }

    #[test]
    fn test_select_chat_malformed_is_empty() {
        let h = Harness::new(MockStream::new(vec![]));
        h.store().borrow_mut().insert(ChatSession::new("s1".to_string(), "Stored"));
        *h.backend.single.borrow_mut() = RetrieveChatResponse {
            chat: Some("[{broken".to_string()),
            sql_query: None,
        };
        block_on(h.controller.select_chat("s1"));
        assert!(h.active().messages.is_empty());
    }

    // ─── Feedback through the controller ─────────────────────

    #[test]
    fn test_record_feedback_once() {
        let h = Harness::new(MockStream::answering(vec![
            StreamFragment::query("SELECT odds"),
            StreamFragment::done("Even"),
        ]));
        block_on(h.controller.send("Odds?")).unwrap();

        assert!(block_on(h.controller.record_feedback(1, true)));
        assert!(!block_on(h.controller.record_feedback(1, false)));

        let records = h.backend.feedback.borrow();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].question, "Odds?");
        assert_eq!(records[0].answer, "Even");
        assert_eq!(records[0].correct, "true");
        assert_eq!(records[0].category, "general");
        assert_eq!(records[0].sql, "SELECT odds");
        assert_eq!(records[0].user_id, "user-1");

        let id = h.active().id;
        assert_eq!(h.store().borrow().feedback_status(&id, 1), Some(FeedbackStatus::Approved));
    }

    #[test]
    fn test_record_feedback_failure_unlocks() {
        let h = Harness::new(MockStream::answering(vec![StreamFragment::done("Even")]));
        block_on(h.controller.send("Odds?")).unwrap();
        h.backend.fail_feedback.set(true);

        assert!(!block_on(h.controller.record_feedback(1, false)));
        let id = h.active().id;
        assert!(!h.store().borrow().feedback_locked(&id, 1));
        assert!(h.has_event(|e| matches!(e, ChatEvent::FeedbackFailed { index: 1, .. })));

        h.backend.fail_feedback.set(false);
        assert!(block_on(h.controller.record_feedback(1, false)));
        assert_eq!(h.backend.feedback.borrow()[0].correct, "false");
    }

    #[test]
    fn test_record_feedback_without_user() {
        let h = Harness::new(MockStream::answering(vec![StreamFragment::done("Even")]));
        block_on(h.controller.send("Odds?")).unwrap();
        h.controller.set_user(None);
        assert!(!block_on(h.controller.record_feedback(1, true)));
    }

    // ─── Analytics ───────────────────────────────────────────

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 20, 12, 0, 0).unwrap()
    }

    fn query(created_at: &str, correct: bool, bucket: &str, user: &str) -> QueryRecord {
        QueryRecord {
            created_at: created_at.to_string(),
            correct: correct.to_string(),
            bucket: Some(bucket.to_string()),
            user_id: Some(user.to_string()),
        }
    }

    fn session(start: &str, end: Option<&str>, duration: Option<&str>, user: &str) -> SessionRecord {
        SessionRecord {
            id: String::new(),
            session_start: start.to_string(),
            session_end: end.map(str::to_string),
            duration: duration.map(str::to_string),
            user_id: user.to_string(),
        }
    }

    #[test]
    fn test_accuracy_per_day_and_bucket() {
        let records = vec![
            query("2024-09-18T10:00:00Z", true, "nba", "u1"),
            query("2024-09-18T11:00:00Z", false, "nfl", "u1"),
            query("2024-09-19T09:00:00Z", true, "nba", "u2"),
            query("2024-09-01T09:00:00Z", false, "nba", "u2"),
        ];
        let points = accuracy_over_time(&records, now());
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date.to_string(), "2024-09-18");
        assert_eq!(points[0].total, 50.0);
        assert_eq!(points[0].buckets["nba"], 100.0);
        assert_eq!(points[0].buckets["nfl"], 0.0);
        assert_eq!(points[1].total, 100.0);
    }

    #[test]
    fn test_active_users_threshold() {
        let mut records = Vec::new();
        for i in 0..6 {
            records.push(query(&format!("2024-09-19T10:0{}:00Z", i), true, "nba", "heavy"));
        }
        for i in 0..5 {
            records.push(query(&format!("2024-09-19T11:0{}:00Z", i), true, "nba", "light"));
        }
        let points = active_users(&records, now());
        assert_eq!(points, vec![ActiveUsersPoint {
            date: chrono::NaiveDate::from_ymd_opt(2024, 9, 19).unwrap(),
            active_users: 1,
        }]);
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval_seconds("01:02:03"), Some(3723));
        assert_eq!(parse_interval_seconds("00:00:30.5"), Some(30));
        assert_eq!(parse_interval_seconds("1 day 00:00:01"), Some(86_401));
        assert_eq!(parse_interval_seconds("1 day 02:03:04"), Some(93_784));
        assert_eq!(parse_interval_seconds("2 days"), Some(172_800));
        assert_eq!(parse_interval_seconds("3 weeks"), None);
        assert_eq!(parse_interval_seconds(""), None);
        assert_eq!(parse_interval_seconds("soon"), None);
        assert_eq!(parse_interval_seconds("18446744073709551615 days"), None);
    }

    #[test]
    fn test_session_seconds_fallbacks() {
        let interval = session("2024-09-19T10:00:00Z", None, Some("00:10:00"), "u");
        assert_eq!(session_seconds(&interval, now()), Some(600.0));
        let ended = session("2024-09-19T10:00:00Z", Some("2024-09-19T10:05:00Z"), None, "u");
        assert_eq!(session_seconds(&ended, now()), Some(300.0));
        let running = session("2024-09-20T11:00:00Z", None, None, "u");
        assert_eq!(session_seconds(&running, now()), Some(3600.0));
    }

    #[test]
    fn test_session_durations_rolling() {
        let sessions = vec![
            session("2024-09-18T10:00:00Z", None, Some("00:10:00"), "a"),
            session("2024-09-19T10:00:00Z", None, Some("00:20:00"), "a"),
            session("2024-09-19T12:00:00Z", None, Some("00:40:00"), "b"),
            session("2024-07-01T10:00:00Z", None, Some("05:00:00"), "c"),
        ];
        let points = session_durations(&sessions, now());
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].average_minutes, 10.0);
        assert_eq!(points[1].average_minutes, 30.0);
        assert_eq!(points[1].last_week, 20.0);
        assert_eq!(points[0].last_month, 10.0);
    }

    #[test]
    fn test_trend() {
        assert_eq!(trend(&[]), None);
        assert_eq!(trend(&[5.0]), None);
        assert_eq!(trend(&[0.0, 5.0]), None);
        assert_eq!(trend(&[50.0, 75.0]), Some(50.0));
    }

    #[test]
    fn test_summary() {
        let sessions = vec![
            session("2024-09-19T10:00:00Z", Some("2024-09-19T10:10:00Z"), None, "a"),
            session("2024-09-19T11:00:00Z", Some("2024-09-19T11:20:00Z"), None, "a"),
            session("2024-09-19T12:00:00Z", None, None, "b"),
        ];
        let queries: Vec<_> = (0..14)
            .map(|i| query(&format!("2024-09-19T10:{:02}:00Z", i), true, "nba", "a"))
            .collect();
        let summary = summarize(&queries, &sessions, now());
        assert_eq!(summary.total_sessions, 3);
        assert_eq!(summary.total_users, 2);
        assert_eq!(summary.average_session_minutes, 15.0);
        assert_eq!(summary.prompts_last_week, 14);
        assert_eq!(summary.prompts_per_day, 2.0);
    }

    struct MockAnalytics {
        since: RefCell<Option<String>>,
    }

    #[async_trait(?Send)]
    impl AnalyticsPort for MockAnalytics {
        async fn query_records(&self, since: Option<&str>) -> billy_types::Result<Vec<QueryRecord>> {
            *self.since.borrow_mut() = since.map(str::to_string);
            Ok(vec![
                query("2024-09-18T10:00:00Z", true, "nba", "u1"),
                query("2024-09-19T10:00:00Z", false, "nba", "u1"),
            ])
        }

        async fn session_records(&self) -> billy_types::Result<Vec<SessionRecord>> {
            Ok(vec![session("2024-09-19T10:00:00Z", None, Some("00:01:00"), "u1")])
        }
    }

    #[test]
    fn test_load_dashboard() {
        let port = MockAnalytics { since: RefCell::new(None) };
        let data = block_on(load_dashboard(&port, now())).unwrap();
        assert_eq!(port.since.borrow().as_deref(), Some("2024-09-13T12:00:00+00:00"));
        assert_eq!(data.accuracy.len(), 2);
        assert_eq!(data.accuracy_trend, Some(-100.0));
        assert_eq!(data.summary.total_sessions, 1);
        assert_eq!(data.durations.len(), 1);
        assert_eq!(data.duration_trend, None);
    }
}
