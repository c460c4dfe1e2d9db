// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use floatchat_app::MessageId;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

use crate::view::MessageView;

pub const FALLBACK_TITLE: &str = "Something went wrong";
pub const FALLBACK_BODY: &str = "This component failed to render. Please try a different query.";

#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryState {
    Rendered(MessageView),
    /// Terminal until the boundary is forgotten.
    Failed { fault: String },
}

/// Contains a fault in one message's visuals.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderBoundary {
    id: MessageId,
    state: BoundaryState,
}

impl RenderBoundary {
    /// Runs `build` once. Both an `Err` and a panic leave the boundary failed.
    pub fn mount<F>(id: MessageId, build: F) -> Self
    where
        F: FnOnce() -> Result<MessageView>,
    {
        let state = match panic::catch_unwind(AssertUnwindSafe(build)) {
            Ok(Ok(view)) => BoundaryState::Rendered(view),
            Ok(Err(fault)) => Self::fail(id, format!("{fault:#}")),
            Err(payload) => Self::fail(id, panic_text(payload.as_ref())),
        };
        Self { id, state }
    }

    fn fail(id: MessageId, fault: String) -> BoundaryState {
        error!(message_id = %id, %fault, "message visuals failed to render");
        BoundaryState::Failed { fault }
    }

    pub const fn id(&self) -> MessageId {
        self.id
    }

    pub const fn state(&self) -> &BoundaryState {
        &self.state
    }

    pub const fn is_failed(&self) -> bool {
        matches!(self.state, BoundaryState::Failed { .. })
    }

    pub fn view(&self) -> Option<&MessageView> {
        match &self.state {
            BoundaryState::Rendered(view) => Some(view),
            BoundaryState::Failed { .. } => None,
        }
    }

    pub fn fault(&self) -> Option<&str> {
        match &self.state {
            BoundaryState::Rendered(_) => None,
            BoundaryState::Failed { fault } => Some(fault),
        }
    }
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        return (*text).to_owned();
    }
    if let Some(text) = payload.downcast_ref::<String>() {
        return text.clone();
    }
    "render panicked".to_owned()
}

/// One boundary per message, created on first sight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Boundaries {
    by_message: HashMap<MessageId, RenderBoundary>,
}

impl Boundaries {
    pub fn mount_with<F>(&mut self, id: MessageId, build: F) -> &RenderBoundary
    where
        F: FnOnce() -> Result<MessageView>,
    {
        self.by_message
            .entry(id)
            .or_insert_with(|| RenderBoundary::mount(id, build))
    }

    pub fn get(&self, id: MessageId) -> Option<&RenderBoundary> {
        self.by_message.get(&id)
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.by_message.contains_key(&id)
    }

    /// Drops the boundary so the next mount starts fresh.
    pub fn forget(&mut self, id: MessageId) -> bool {
        self.by_message.remove(&id).is_some()
    }

    pub fn failed_count(&self) -> usize {
        self.by_message
            .values()
            .filter(|boundary| boundary.is_failed())
            .count()
    }

    pub fn len(&self) -> usize {
        self.by_message.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_message.is_empty()
    }
}
