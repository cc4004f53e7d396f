use thiserror::Error;

/// Errors raised while declaring or checking types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypeError {
    #[error("type `{0}` already declared")]
    DuplicateType(String),

    #[error("unknown type `{0}`")]
    UnknownType(String),

    #[error("`{0}` is not an agent type")]
    NotAnAgent(String),

    #[error("field `{field}` already declared on `{interface}`")]
    DuplicateField { interface: String, field: String },

    #[error("field slot {slot} on `{interface}` is already used by `{field}`")]
    DuplicateFieldSlot {
        interface: String,
        slot: u8,
        field: String,
    },

    #[error("field slot {0} out of range (0..100)")]
    FieldSlotOutOfRange(u8),

    #[error("message `{name}` ({id}) collides with an existing message on `{interface}`")]
    DuplicateMessage {
        interface: String,
        name: String,
        id: u16,
    },

    #[error("script `{name}` ({id}) collides with an existing script on `{interface}`")]
    DuplicateScript {
        interface: String,
        name: String,
        id: u16,
    },

    #[error("constant `{0}` already declared")]
    DuplicateConstant(String),

    #[error("cannot implicitly cast {from} to {to}")]
    CannotCast { from: String, to: String },

    #[error("cannot remove null from non-union type {0}")]
    NotNullable(String),

    #[error("making {parent} a parent of {child} would create a cycle")]
    CyclicParent { child: String, parent: String },
}
