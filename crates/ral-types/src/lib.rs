//! Type system for the RAL compiler.
//!
//! Types live in an arena owned by [`TypeSystem`] and are referred to by
//! [`TypeId`]. Agent types carry interfaces (fields, messages, scripts) and
//! unions are interned so that structurally equal unions share one id.

mod classifier;
mod constant;
mod error;
mod interface;
mod system;
mod ty;

pub use classifier::Classifier;
pub use constant::{ConstValue, Constant, escape_string, format_float};
pub use error::TypeError;
pub use interface::{AgentInterface, Field, InterfaceId};
pub use system::TypeSystem;
pub use ty::{Major, TypeId, TypeKind};

/// Number of per-agent variable slots (`ov00`..`ov99`, `mv00`..`mv99`).
pub const FIELD_SLOTS: u8 = 100;

#[cfg(test)]
mod tests;
