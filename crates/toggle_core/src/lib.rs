mod config;
mod core;
mod engine;
mod error;
mod host;
mod movement;
mod ops;
mod outline;
mod query;
mod render;
mod repair;
mod serde_value;
mod tracked;
mod visibility;

pub use crate::config::*;
pub use crate::core::*;
pub use crate::engine::*;
pub use crate::error::*;
pub use crate::host::*;
pub use crate::movement::*;
pub use crate::ops::*;
pub use crate::outline::*;
pub use crate::query::*;
pub use crate::render::*;
pub use crate::repair::*;
pub use crate::serde_value::*;
pub use crate::tracked::*;
pub use crate::visibility::*;
