// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod model;
pub mod parser;
pub mod state;
pub mod view;

pub use model::*;
pub use parser::*;
pub use state::*;
pub use view::*;
