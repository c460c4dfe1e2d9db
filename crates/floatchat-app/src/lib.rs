// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod classify;
pub mod ids;
pub mod lifecycle;
pub mod model;
pub mod plan;
pub mod state;
pub mod store;

pub use classify::*;
pub use ids::*;
pub use lifecycle::*;
pub use model::*;
pub use plan::*;
pub use state::*;
pub use store::*;
