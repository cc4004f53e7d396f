use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::interface::InterfaceId;

/// Index of a type node inside a [`TypeSystem`](crate::TypeSystem).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The storage class of a value, which decides the CAOS store instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Major {
    Unknown,
    Agent,
    String,
    Value,
    ByteString,
}

impl Major {
    /// Common major type of a set of types. `Unknown` members are ignored and
    /// any disagreement yields `Unknown`.
    pub fn common(majors: impl IntoIterator<Item = Major>) -> Major {
        let mut found = Major::Unknown;
        for major in majors {
            if major == Major::Unknown {
                continue;
            }
            if found == Major::Unknown {
                found = major;
            } else if found != major {
                return Major::Unknown;
            }
        }
        found
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// A primitive type. The parent, if any, donates its interfaces and its
    /// cast targets.
    Opaque {
        name: String,
        parent: Option<TypeId>,
    },
    /// Interned set of at least two members, sorted by id.
    Union { members: Vec<TypeId> },
    /// A named interface type.
    Agent {
        name: String,
        interface: InterfaceId,
        parents: Vec<TypeId>,
    },
    /// The agent type of a classifier. `parents` starts with the classifier
    /// parent's type, when there is one.
    AgentClassifier {
        name: String,
        classifier: Classifier,
        interface: InterfaceId,
        parents: Vec<TypeId>,
    },
}

impl TypeKind {
    pub fn is_agent(&self) -> bool {
        matches!(self, TypeKind::Agent { .. } | TypeKind::AgentClassifier { .. })
    }

    pub(crate) fn own_interface(&self) -> Option<InterfaceId> {
        match self {
            TypeKind::Agent { interface, .. } | TypeKind::AgentClassifier { interface, .. } => {
                Some(*interface)
            }
            _ => None,
        }
    }

    pub(crate) fn parents(&self) -> &[TypeId] {
        match self {
            TypeKind::Opaque { parent, .. } => parent.as_slice(),
            TypeKind::Union { .. } => &[],
            TypeKind::Agent { parents, .. } | TypeKind::AgentClassifier { parents, .. } => parents,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TypeNode {
    pub(crate) kind: TypeKind,
    pub(crate) major: Major,
    /// Effective interfaces: own first, then each parent's, first one wins.
    pub(crate) interfaces: Vec<InterfaceId>,
}
