// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::ids::RequestId;
use crate::model::{Answer, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestPhase {
    #[default]
    Idle,
    Pending {
        request_id: RequestId,
    },
    Resolved {
        request_id: RequestId,
    },
    Failed {
        request_id: RequestId,
    },
}

impl RequestPhase {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending { .. } => "pending",
            Self::Resolved { .. } => "resolved",
            Self::Failed { .. } => "failed",
        }
    }
}

/// The one request the runtime must send for an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub request_id: RequestId,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    Answered(Answer),
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct RequestLifecycle {
    phase: RequestPhase,
    last_request_id: u64,
}

impl RequestLifecycle {
    pub const fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub const fn is_pending(&self) -> bool {
        matches!(self.phase, RequestPhase::Pending { .. })
    }

    pub const fn in_flight(&self) -> Option<RequestId> {
        match self.phase {
            RequestPhase::Pending { request_id } => Some(request_id),
            _ => None,
        }
    }

    /// Accepts a question when it is non-blank and nothing is in flight.
    /// Anything else is dropped without a trace.
    pub fn begin(&mut self, question: &str) -> Option<OutboundRequest> {
        let question = question.trim();
        if question.is_empty() || self.is_pending() {
            return None;
        }

        self.last_request_id = self.last_request_id.saturating_add(1);
        let request_id = RequestId::new(self.last_request_id);
        self.phase = RequestPhase::Pending { request_id };
        Some(OutboundRequest {
            request_id,
            question: question.to_owned(),
        })
    }

    /// Settles the in-flight request. Outcomes for any other id are stale and
    /// ignored. The phase leaves `Pending` before the reply is built.
    pub fn finish(&mut self, request_id: RequestId, outcome: RequestOutcome) -> Option<Message> {
        if self.in_flight() != Some(request_id) {
            return None;
        }

        let message = match outcome {
            RequestOutcome::Answered(answer) => {
                self.phase = RequestPhase::Resolved { request_id };
                Message::answer(answer)
            }
            RequestOutcome::Failed(detail) => {
                self.phase = RequestPhase::Failed { request_id };
                Message::failure(&detail)
            }
        };
        Some(message)
    }
}
