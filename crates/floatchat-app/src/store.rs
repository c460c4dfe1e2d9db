// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::sync::mpsc::{self, Receiver, Sender};

use crate::ids::MessageId;
use crate::model::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    Reset,
    Appended { id: MessageId, index: usize },
}

/// Append-only transcript. Identities are minted by whoever builds the
/// message, never by the store.
#[derive(Debug, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
    subscribers: Vec<Sender<StoreEvent>>,
}

impl ConversationStore {
    pub fn with_greeting() -> Self {
        let mut store = Self::default();
        store.initialize();
        store
    }

    /// Starts from a custom opening assistant message.
    pub fn greeted(text: impl Into<String>) -> Self {
        let mut store = Self::default();
        store.reset_to(Message::assistant(text));
        store
    }

    pub fn initialize(&mut self) {
        self.reset_to(Message::greeting());
    }

    fn reset_to(&mut self, greeting: Message) {
        self.messages.clear();
        self.messages.push(greeting);
        self.notify(StoreEvent::Reset);
    }

    pub fn append(&mut self, message: Message) -> StoreEvent {
        let event = StoreEvent::Appended {
            id: message.id,
            index: self.messages.len(),
        };
        self.messages.push(message);
        self.notify(event);
        event
    }

    pub fn subscribe(&mut self) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn position(&self, id: MessageId) -> Option<usize> {
        self.messages.iter().position(|message| message.id == id)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    fn notify(&mut self, event: StoreEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}
