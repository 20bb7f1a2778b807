// Copyright 2026 Tierdesk contributors
// Licensed under the Apache License, Version 2.0

pub mod board;
pub mod error;
pub mod ids;
pub mod model;
pub mod pane;

pub use board::*;
pub use error::*;
pub use ids::*;
pub use model::*;
pub use pane::*;
