use std::collections::HashMap;

use crate::error::TypeError;
use crate::ty::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(pub(crate) u32);

/// A per-agent variable exposed by an interface.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
    pub slot: u8,
}

/// Fields, messages and scripts contributed by one agent type.
#[derive(Debug, Clone, Default)]
pub struct AgentInterface {
    pub name: String,
    fields: HashMap<String, Field>,
    slots: HashMap<u8, String>,
    messages: HashMap<String, u16>,
    message_names: HashMap<u16, String>,
    scripts: HashMap<String, u16>,
    script_names: HashMap<u16, String>,
}

impl AgentInterface {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn message_id(&self, name: &str) -> Option<u16> {
        self.messages.get(name).copied()
    }

    pub fn message_name(&self, id: u16) -> Option<&str> {
        self.message_names.get(&id).map(String::as_str)
    }

    pub fn script_id(&self, name: &str) -> Option<u16> {
        self.scripts.get(name).copied()
    }

    pub fn script_name(&self, id: u16) -> Option<&str> {
        self.script_names.get(&id).map(String::as_str)
    }

    pub(crate) fn declare_field(&mut self, field: Field) -> Result<(), TypeError> {
        if self.fields.contains_key(&field.name) {
            return Err(TypeError::DuplicateField {
                interface: self.name.clone(),
                field: field.name,
            });
        }
        if let Some(existing) = self.slots.get(&field.slot) {
            return Err(TypeError::DuplicateFieldSlot {
                interface: self.name.clone(),
                slot: field.slot,
                field: existing.clone(),
            });
        }
        self.slots.insert(field.slot, field.name.clone());
        self.fields.insert(field.name.clone(), field);
        Ok(())
    }

    pub(crate) fn declare_message(&mut self, name: &str, id: u16) -> Result<(), TypeError> {
        if self.messages.contains_key(name) || self.message_names.contains_key(&id) {
            return Err(TypeError::DuplicateMessage {
                interface: self.name.clone(),
                name: name.to_string(),
                id,
            });
        }
        self.messages.insert(name.to_string(), id);
        self.message_names.insert(id, name.to_string());
        Ok(())
    }

    pub(crate) fn declare_script(&mut self, name: &str, id: u16) -> Result<(), TypeError> {
        if self.scripts.contains_key(name) || self.script_names.contains_key(&id) {
            return Err(TypeError::DuplicateScript {
                interface: self.name.clone(),
                name: name.to_string(),
                id,
            });
        }
        self.scripts.insert(name.to_string(), id);
        self.script_names.insert(id, name.to_string());
        Ok(())
    }
}
