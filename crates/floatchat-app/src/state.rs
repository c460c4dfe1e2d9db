// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::{debug, info, warn};

use crate::ids::{MessageId, RequestId};
use crate::lifecycle::{OutboundRequest, RequestLifecycle, RequestOutcome, RequestPhase};
use crate::model::Message;
use crate::store::ConversationStore;

#[derive(Debug)]
pub struct ConversationState {
    pub store: ConversationStore,
    pub lifecycle: RequestLifecycle,
    pub input: String,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            store: ConversationStore::with_greeting(),
            lifecycle: RequestLifecycle::default(),
            input: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversationCommand {
    SetInput(String),
    Submit,
    Resolve {
        request_id: RequestId,
        outcome: RequestOutcome,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    InputChanged,
    InputCleared,
    MessageAppended { id: MessageId, is_error: bool },
    PendingChanged(bool),
    RequestStarted(OutboundRequest),
}

impl ConversationEvent {
    pub fn outbound(events: &[Self]) -> Option<&OutboundRequest> {
        events.iter().find_map(|event| match event {
            Self::RequestStarted(request) => Some(request),
            _ => None,
        })
    }
}

impl ConversationState {
    pub fn with_greeting(text: &str) -> Self {
        Self {
            store: ConversationStore::greeted(text),
            ..Self::default()
        }
    }

    pub fn pending_request(&self) -> bool {
        self.lifecycle.is_pending()
    }

    pub fn phase(&self) -> RequestPhase {
        self.lifecycle.phase()
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn dispatch(&mut self, command: ConversationCommand) -> Vec<ConversationEvent> {
        match command {
            ConversationCommand::SetInput(value) => {
                if self.pending_request() {
                    return Vec::new();
                }
                self.input = value;
                vec![ConversationEvent::InputChanged]
            }
            ConversationCommand::Submit => {
                let question = std::mem::take(&mut self.input);
                let events = self.submit(&question);
                if events.is_empty() {
                    self.input = question;
                }
                events
            }
            ConversationCommand::Resolve {
                request_id,
                outcome,
            } => self.resolve(request_id, outcome),
        }
    }

    /// Starts a round trip. Returns no events when the question is blank or a
    /// request is already in flight.
    pub fn submit(&mut self, question: &str) -> Vec<ConversationEvent> {
        let Some(request) = self.lifecycle.begin(question) else {
            debug!(
                pending = self.pending_request(),
                "submission ignored by gate"
            );
            return Vec::new();
        };

        let message = Message::user(request.question.clone());
        let id = message.id;
        self.store.append(message);
        self.input.clear();
        info!(request_id = request.request_id.get(), "question submitted");

        vec![
            ConversationEvent::MessageAppended {
                id,
                is_error: false,
            },
            ConversationEvent::PendingChanged(true),
            ConversationEvent::InputCleared,
            ConversationEvent::RequestStarted(request),
        ]
    }

    pub fn resolve(
        &mut self,
        request_id: RequestId,
        outcome: RequestOutcome,
    ) -> Vec<ConversationEvent> {
        let Some(message) = self.lifecycle.finish(request_id, outcome) else {
            warn!(request_id = request_id.get(), "stale outcome dropped");
            return Vec::new();
        };

        let id = message.id;
        let is_error = message.is_error;
        if is_error {
            warn!(request_id = request_id.get(), content = %message.content, "round trip failed");
        } else {
            info!(
                request_id = request_id.get(),
                rows = message.rows().len(),
                "round trip answered"
            );
        }
        self.store.append(message);

        vec![
            ConversationEvent::MessageAppended { id, is_error },
            ConversationEvent::PendingChanged(false),
        ]
    }
}
