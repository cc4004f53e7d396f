use std::collections::{BTreeSet, HashMap};

use tracing::{debug, trace};

use crate::FIELD_SLOTS;
use crate::classifier::Classifier;
use crate::constant::Constant;
use crate::error::TypeError;
use crate::interface::{AgentInterface, Field, InterfaceId};
use crate::ty::{Major, TypeId, TypeKind, TypeNode};

#[derive(Debug, Clone, Copy)]
struct Builtins {
    any: TypeId,
    void: TypeId,
    null: TypeId,
    number: TypeId,
    integer: TypeId,
    float: TypeId,
    boolean: TypeId,
    string: TypeId,
    bytes: TypeId,
    agent: TypeId,
    agent_nullable: TypeId,
}

/// Arena of every type known to a compilation.
///
/// Nodes are never removed. Each node caches its effective interface list;
/// when a parent is added the cache of the node and of everything that
/// depends on it is recomputed through the `dependents` table.
#[derive(Debug, Clone)]
pub struct TypeSystem {
    nodes: Vec<TypeNode>,
    interfaces: Vec<AgentInterface>,
    dependents: Vec<Vec<TypeId>>,
    named: HashMap<String, TypeId>,
    classifiers: HashMap<Classifier, TypeId>,
    unions: HashMap<Vec<TypeId>, TypeId>,
    constants: HashMap<String, Constant>,
    builtins: Builtins,
}

impl Default for TypeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeSystem {
    pub fn new() -> Self {
        let unset = TypeId(0);
        let mut ts = Self {
            nodes: Vec::new(),
            interfaces: Vec::new(),
            dependents: Vec::new(),
            named: HashMap::new(),
            classifiers: HashMap::new(),
            unions: HashMap::new(),
            constants: HashMap::new(),
            builtins: Builtins {
                any: unset,
                void: unset,
                null: unset,
                number: unset,
                integer: unset,
                float: unset,
                boolean: unset,
                string: unset,
                bytes: unset,
                agent: unset,
                agent_nullable: unset,
            },
        };

        ts.builtins.any = ts.push_named_opaque("any", Major::Unknown, None);
        ts.builtins.void = ts.push_named_opaque("void", Major::Unknown, None);
        ts.builtins.null = ts.push_named_opaque("null", Major::Agent, None);
        let number = ts.push_named_opaque("number", Major::Value, None);
        ts.builtins.number = number;
        let integer = ts.push_named_opaque("integer", Major::Value, Some(number));
        ts.builtins.integer = integer;
        ts.builtins.float = ts.push_named_opaque("float", Major::Value, Some(number));
        ts.builtins.boolean = ts.push_named_opaque("boolean", Major::Value, Some(integer));
        ts.builtins.string = ts.push_named_opaque("string", Major::String, None);
        ts.builtins.bytes = ts.push_named_opaque("bytes", Major::ByteString, None);

        let agent = ts.by_classifier(Classifier::ROOT);
        ts.rename(agent, "Agent");
        ts.named.insert("Agent".to_string(), agent);
        ts.builtins.agent = agent;
        ts.builtins.agent_nullable = ts.by_nullable(agent);
        ts
    }

    pub fn any(&self) -> TypeId {
        self.builtins.any
    }

    pub fn void(&self) -> TypeId {
        self.builtins.void
    }

    pub fn null(&self) -> TypeId {
        self.builtins.null
    }

    pub fn number(&self) -> TypeId {
        self.builtins.number
    }

    pub fn integer(&self) -> TypeId {
        self.builtins.integer
    }

    pub fn float(&self) -> TypeId {
        self.builtins.float
    }

    pub fn boolean(&self) -> TypeId {
        self.builtins.boolean
    }

    pub fn string(&self) -> TypeId {
        self.builtins.string
    }

    pub fn bytes(&self) -> TypeId {
        self.builtins.bytes
    }

    pub fn agent(&self) -> TypeId {
        self.builtins.agent
    }

    pub fn agent_nullable(&self) -> TypeId {
        self.builtins.agent_nullable
    }

    // ========================================================================
    // Node access
    // ========================================================================

    pub fn kind(&self, t: TypeId) -> &TypeKind {
        &self.nodes[t.index()].kind
    }

    pub fn major(&self, t: TypeId) -> Major {
        self.nodes[t.index()].major
    }

    pub fn interface(&self, id: InterfaceId) -> &AgentInterface {
        &self.interfaces[id.0 as usize]
    }

    /// Effective interfaces of a type in lookup order.
    pub fn interfaces(&self, t: TypeId) -> impl Iterator<Item = &AgentInterface> {
        self.nodes[t.index()]
            .interfaces
            .iter()
            .map(|id| self.interface(*id))
    }

    pub fn classifier_of(&self, t: TypeId) -> Option<Classifier> {
        match self.kind(t) {
            TypeKind::AgentClassifier { classifier, .. } => Some(*classifier),
            _ => None,
        }
    }

    /// Display name. Union members are joined with `|`, `null` last.
    pub fn name(&self, t: TypeId) -> String {
        match self.kind(t) {
            TypeKind::Opaque { name, .. }
            | TypeKind::Agent { name, .. }
            | TypeKind::AgentClassifier { name, .. } => name.clone(),
            TypeKind::Union { members } => {
                let null = self.builtins.null;
                let mut names: Vec<String> = members
                    .iter()
                    .filter(|m| **m != null)
                    .map(|m| self.name(*m))
                    .collect();
                if members.contains(&null) {
                    names.push(self.name(null));
                }
                names.join("|")
            }
        }
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn find(&self, name: &str) -> Option<TypeId> {
        self.named.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Result<TypeId, TypeError> {
        self.find(name)
            .ok_or_else(|| TypeError::UnknownType(name.to_string()))
    }

    /// The agent type of a classifier, creating it and its ancestors on
    /// first use.
    pub fn by_classifier(&mut self, classifier: Classifier) -> TypeId {
        if let Some(t) = self.classifiers.get(&classifier) {
            return *t;
        }
        let parent = classifier.parent().map(|p| self.by_classifier(p));
        let name = classifier.to_string();
        let interface = self.push_interface(&name);
        let t = self.push(
            TypeKind::AgentClassifier {
                name,
                classifier,
                interface,
                parents: parent.into_iter().collect(),
            },
            Major::Agent,
        );
        self.classifiers.insert(classifier, t);
        t
    }

    /// Canonical union of the given types.
    ///
    /// Members are flattened, deduplicated and any member that implicitly
    /// casts to another member is dropped. An empty result is `void`, a
    /// single survivor is returned as is, anything else is interned.
    pub fn by_union(&mut self, types: impl IntoIterator<Item = TypeId>) -> TypeId {
        let mut flat = BTreeSet::new();
        for t in types {
            match self.kind(t) {
                TypeKind::Union { members } => flat.extend(members.iter().copied()),
                _ => {
                    flat.insert(t);
                }
            }
        }
        let candidates: Vec<TypeId> = flat.into_iter().collect();
        let members: Vec<TypeId> = candidates
            .iter()
            .copied()
            .filter(|m| {
                !candidates
                    .iter()
                    .any(|other| other != m && self.can_implicitly_cast(*m, *other))
            })
            .collect();

        match members.len() {
            0 => self.builtins.void,
            1 => members[0],
            _ => {
                if let Some(t) = self.unions.get(&members) {
                    return *t;
                }
                let major = Major::common(members.iter().map(|m| self.major(*m)));
                let t = self.push(
                    TypeKind::Union {
                        members: members.clone(),
                    },
                    major,
                );
                for m in &members {
                    self.dependents[m.index()].push(t);
                }
                trace!(union = %self.name(t), "interned union");
                self.unions.insert(members, t);
                t
            }
        }
    }

    pub fn by_nullable(&mut self, t: TypeId) -> TypeId {
        let null = self.builtins.null;
        self.by_union([t, null])
    }

    pub fn by_non_nullable(&mut self, t: TypeId) -> Result<TypeId, TypeError> {
        let null = self.builtins.null;
        match self.kind(t) {
            TypeKind::Union { members } => {
                let rest: Vec<TypeId> = members.iter().copied().filter(|m| *m != null).collect();
                Ok(self.by_union(rest))
            }
            _ => Err(TypeError::NotNullable(self.name(t))),
        }
    }

    // ========================================================================
    // Casting
    // ========================================================================

    /// `a` casts to `b` when `b` is `any`, they are equal, every member of a
    /// union `a` casts to `b`, `a` casts to some member of a union `b`, or a
    /// parent of `a` casts to `b`.
    pub fn can_implicitly_cast(&self, a: TypeId, b: TypeId) -> bool {
        if b == self.builtins.any || a == b {
            return true;
        }
        if let TypeKind::Union { members } = self.kind(a) {
            if members.iter().all(|m| self.can_implicitly_cast(*m, b)) {
                return true;
            }
        }
        if let TypeKind::Union { members } = self.kind(b) {
            if members.iter().any(|m| self.can_implicitly_cast(a, *m)) {
                return true;
            }
        }
        self.kind(a)
            .parents()
            .iter()
            .any(|p| self.can_implicitly_cast(*p, b))
    }

    pub fn assert_implicit_cast(&self, from: TypeId, to: TypeId) -> Result<(), TypeError> {
        if self.can_implicitly_cast(from, to) {
            Ok(())
        } else {
            Err(TypeError::CannotCast {
                from: self.name(from),
                to: self.name(to),
            })
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    pub fn declare_opaque(
        &mut self,
        name: &str,
        major: Major,
        parent: Option<TypeId>,
    ) -> Result<TypeId, TypeError> {
        if let Some(existing) = self.find(name) {
            let same = matches!(
                self.kind(existing),
                TypeKind::Opaque { parent: p, .. } if *p == parent
            ) && self.major(existing) == major;
            return if same {
                Ok(existing)
            } else {
                Err(TypeError::DuplicateType(name.to_string()))
            };
        }
        Ok(self.push_named_opaque(name, major, parent))
    }

    /// Registers `name` as another name for `t`.
    pub fn declare_typedef(&mut self, name: &str, t: TypeId) -> Result<(), TypeError> {
        match self.find(name) {
            Some(existing) if existing == t => Ok(()),
            Some(_) => Err(TypeError::DuplicateType(name.to_string())),
            None => {
                debug!(name, ty = %self.name(t), "declared typedef");
                self.named.insert(name.to_string(), t);
                Ok(())
            }
        }
    }

    /// Gives a classifier type a name. Redeclaring the same pair is a no-op.
    pub fn declare_class(&mut self, classifier: Classifier, name: &str) -> Result<TypeId, TypeError> {
        let t = self.by_classifier(classifier);
        match self.find(name) {
            Some(existing) if existing == t => return Ok(t),
            Some(_) => return Err(TypeError::DuplicateType(name.to_string())),
            None => {}
        }
        // Only the first name is used for display; later ones are aliases.
        if self.name(t) == classifier.to_string() {
            self.rename(t, name);
        }
        self.named.insert(name.to_string(), t);
        debug!(name, %classifier, "declared class");
        Ok(t)
    }

    /// Declares an interface type. Every interface is an agent.
    pub fn declare_interface(&mut self, name: &str) -> Result<TypeId, TypeError> {
        if let Some(existing) = self.find(name) {
            return match self.kind(existing) {
                TypeKind::Agent { .. } => Ok(existing),
                _ => Err(TypeError::DuplicateType(name.to_string())),
            };
        }
        let interface = self.push_interface(name);
        let agent = self.builtins.agent;
        let t = self.push(
            TypeKind::Agent {
                name: name.to_string(),
                interface,
                parents: vec![agent],
            },
            Major::Agent,
        );
        self.named.insert(name.to_string(), t);
        debug!(name, "declared interface");
        Ok(t)
    }

    /// Makes `child` implement `parent`.
    pub fn add_parent(&mut self, child: TypeId, parent: TypeId) -> Result<(), TypeError> {
        for t in [child, parent] {
            if !self.kind(t).is_agent() {
                return Err(TypeError::NotAnAgent(self.name(t)));
            }
        }
        if self.kind(child).parents().contains(&parent) {
            return Ok(());
        }
        if child == parent || self.can_implicitly_cast(parent, child) {
            return Err(TypeError::CyclicParent {
                child: self.name(child),
                parent: self.name(parent),
            });
        }
        if let TypeKind::Agent { parents, .. } | TypeKind::AgentClassifier { parents, .. } =
            &mut self.nodes[child.index()].kind
        {
            parents.push(parent);
        }
        self.dependents[parent.index()].push(child);
        self.regenerate(child);
        debug!(child = %self.name(child), parent = %self.name(parent), "added parent");
        Ok(())
    }

    pub fn declare_field(
        &mut self,
        owner: TypeId,
        name: &str,
        ty: TypeId,
        slot: u8,
    ) -> Result<(), TypeError> {
        if slot >= FIELD_SLOTS {
            return Err(TypeError::FieldSlotOutOfRange(slot));
        }
        let interface = self.own_interface(owner)?;
        self.interfaces[interface.0 as usize].declare_field(Field {
            name: name.to_string(),
            ty,
            slot,
        })
    }

    pub fn declare_message(&mut self, owner: TypeId, name: &str, id: u16) -> Result<(), TypeError> {
        let interface = self.own_interface(owner)?;
        self.interfaces[interface.0 as usize].declare_message(name, id)
    }

    pub fn declare_script(&mut self, owner: TypeId, name: &str, id: u16) -> Result<(), TypeError> {
        let interface = self.own_interface(owner)?;
        self.interfaces[interface.0 as usize].declare_script(name, id)
    }

    pub fn declare_const(&mut self, name: &str, constant: Constant) -> Result<(), TypeError> {
        if self.constants.contains_key(name) {
            return Err(TypeError::DuplicateConstant(name.to_string()));
        }
        self.constants.insert(name.to_string(), constant);
        Ok(())
    }

    pub fn lookup_const(&self, name: &str) -> Option<&Constant> {
        self.constants.get(name)
    }

    // ========================================================================
    // Interface queries
    // ========================================================================

    pub fn lookup_field(&self, t: TypeId, name: &str) -> Option<&Field> {
        self.interfaces(t).find_map(|i| i.field(name))
    }

    pub fn lookup_message_id(&self, t: TypeId, name: &str) -> Option<u16> {
        self.interfaces(t).find_map(|i| i.message_id(name))
    }

    pub fn lookup_message_name(&self, t: TypeId, id: u16) -> Option<&str> {
        self.interfaces(t).find_map(|i| i.message_name(id))
    }

    pub fn lookup_script_id(&self, t: TypeId, name: &str) -> Option<u16> {
        self.interfaces(t).find_map(|i| i.script_id(name))
    }

    pub fn lookup_script_name(&self, t: TypeId, id: u16) -> Option<&str> {
        self.interfaces(t).find_map(|i| i.script_name(id))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn push(&mut self, kind: TypeKind, major: Major) -> TypeId {
        let t = TypeId(self.nodes.len() as u32);
        let interfaces = self.compute_interfaces(&kind);
        for parent in kind.parents() {
            self.dependents[parent.index()].push(t);
        }
        self.nodes.push(TypeNode {
            kind,
            major,
            interfaces,
        });
        self.dependents.push(Vec::new());
        t
    }

    fn push_named_opaque(&mut self, name: &str, major: Major, parent: Option<TypeId>) -> TypeId {
        let t = self.push(
            TypeKind::Opaque {
                name: name.to_string(),
                parent,
            },
            major,
        );
        self.named.insert(name.to_string(), t);
        t
    }

    fn push_interface(&mut self, name: &str) -> InterfaceId {
        let id = InterfaceId(self.interfaces.len() as u32);
        self.interfaces.push(AgentInterface::new(name));
        id
    }

    fn own_interface(&self, t: TypeId) -> Result<InterfaceId, TypeError> {
        self.kind(t)
            .own_interface()
            .ok_or_else(|| TypeError::NotAnAgent(self.name(t)))
    }

    fn rename(&mut self, t: TypeId, new_name: &str) {
        let interface = match &mut self.nodes[t.index()].kind {
            TypeKind::Opaque { name, .. } => {
                *name = new_name.to_string();
                None
            }
            TypeKind::Agent { name, interface, .. }
            | TypeKind::AgentClassifier { name, interface, .. } => {
                *name = new_name.to_string();
                Some(*interface)
            }
            TypeKind::Union { .. } => None,
        };
        if let Some(interface) = interface {
            self.interfaces[interface.0 as usize].name = new_name.to_string();
        }
    }

    fn compute_interfaces(&self, kind: &TypeKind) -> Vec<InterfaceId> {
        match kind {
            TypeKind::Union { members } => {
                let Some((first, rest)) = members.split_first() else {
                    return Vec::new();
                };
                self.nodes[first.index()]
                    .interfaces
                    .iter()
                    .copied()
                    .filter(|i| {
                        rest.iter()
                            .all(|m| self.nodes[m.index()].interfaces.contains(i))
                    })
                    .collect()
            }
            other => {
                let mut list: Vec<InterfaceId> = other.own_interface().into_iter().collect();
                for parent in other.parents() {
                    for i in &self.nodes[parent.index()].interfaces {
                        if !list.contains(i) {
                            list.push(*i);
                        }
                    }
                }
                list
            }
        }
    }

    fn regenerate(&mut self, t: TypeId) {
        let interfaces = self.compute_interfaces(&self.nodes[t.index()].kind);
        self.nodes[t.index()].interfaces = interfaces;
        let dependents = self.dependents[t.index()].clone();
        for d in dependents {
            self.regenerate(d);
        }
    }
}
