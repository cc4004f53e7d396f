//! A compilation unit: declarations, macros and the scripts of one file.
//!
//! Each top-level script is resolved and compiled on its own. A script that
//! fails produces one [`Diagnostic`] and is left out of the output; the rest
//! of the unit still compiles.

use rhizome_ral_types::{Classifier, TypeId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{ExprUR, Stmt, TypeRef};
use crate::config::CompilerConfig;
use crate::context::LabelAllocator;
use crate::diagnostic::{Diagnostic, SrcPos};
use crate::error::CompileError;
use crate::macros::{Macro, MacroParam};
use crate::scope::{ScopeContext, ScriptContext};
use crate::slice::Perm;
use crate::stmt::Resolved;
use crate::world::World;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decl", rename_all = "snake_case")]
pub enum Declaration {
    /// `class Name f g s;`
    Class { name: String, classifier: Classifier },
    Interface { name: String },
    /// `Type implements Interface;`
    Implements { ty: TypeRef, interface: TypeRef },
    Field {
        owner: TypeRef,
        name: String,
        ty: TypeRef,
        slot: u8,
    },
    Message { owner: TypeRef, name: String, id: u16 },
    Script { owner: TypeRef, name: String, id: u16 },
    /// A named constant; `value` must fold at compile time.
    Const { name: String, value: ExprUR },
    Typedef { name: String, ty: TypeRef },
}

impl Declaration {
    fn subject(&self) -> &str {
        match self {
            Declaration::Class { name, .. }
            | Declaration::Interface { name }
            | Declaration::Field { name, .. }
            | Declaration::Message { name, .. }
            | Declaration::Script { name, .. }
            | Declaration::Const { name, .. }
            | Declaration::Typedef { name, .. } => name,
            Declaration::Implements { .. } => "implements",
        }
    }

    pub fn apply(&self, world: &mut World) -> Result<(), CompileError> {
        let types = &mut world.types;
        match self {
            Declaration::Class { name, classifier } => {
                types.declare_class(*classifier, name)?;
            }
            Declaration::Interface { name } => {
                types.declare_interface(name)?;
            }
            Declaration::Implements { ty, interface } => {
                let child = ty.resolve(types)?;
                let parent = interface.resolve(types)?;
                types.add_parent(child, parent)?;
            }
            Declaration::Field {
                owner,
                name,
                ty,
                slot,
            } => {
                let owner = owner.resolve(types)?;
                let ty = ty.resolve(types)?;
                types.declare_field(owner, name, ty, *slot)?;
            }
            Declaration::Message { owner, name, id } => {
                let owner = owner.resolve(types)?;
                types.declare_message(owner, name, *id)?;
            }
            Declaration::Script { owner, name, id } => {
                let owner = owner.resolve(types)?;
                types.declare_script(owner, name, *id)?;
            }
            Declaration::Const { name, value } => {
                let script = ScriptContext::new(&world.types, world.types.null());
                let scope = ScopeContext::root(&world.types, script);
                let mut rv = world.resolver();
                let constant = value
                    .resolve_const(&scope, &mut rv)?
                    .ok_or_else(|| CompileError::Invalid(format!("{name} is not a constant")))?;
                rv.types.declare_const(name, constant)?;
            }
            Declaration::Typedef { name, ty } => {
                let ty = ty.resolve(types)?;
                types.declare_typedef(name, ty)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroParamDef {
    pub name: String,
    pub ty: TypeRef,
    /// Set for inline parameters, which are substituted rather than copied.
    #[serde(default)]
    pub inline: Option<Perm>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroDef {
    pub name: String,
    #[serde(default)]
    pub params: Vec<MacroParamDef>,
    pub body: ExprUR,
    #[serde(default)]
    pub pos: SrcPos,
}

impl MacroDef {
    pub fn declare(&self, world: &mut World) -> Result<(), CompileError> {
        let params = self
            .params
            .iter()
            .map(|p| {
                Ok(MacroParam {
                    name: p.name.clone(),
                    ty: p.ty.resolve(&mut world.types)?,
                    inline: p.inline,
                })
            })
            .collect::<Result<Vec<_>, CompileError>>()?;
        world.macros.declare(Macro {
            name: self.name.clone(),
            params,
            body: self.body.clone(),
            pos: self.pos.clone(),
        })
    }
}

/// An event script number, given directly or by script name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptRef {
    Number(u16),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventScript {
    #[serde(default)]
    pub pos: SrcPos,
    pub classifier: Classifier,
    pub script: ScriptRef,
    pub body: Stmt,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Unit {
    pub declarations: Vec<Declaration>,
    pub macros: Vec<MacroDef>,
    pub install: Option<Stmt>,
    pub events: Vec<EventScript>,
    pub remove: Option<Stmt>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompileOutput {
    pub code: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

enum ScriptKind {
    Install,
    Event { comment: String, header: String },
    Remove,
}

struct PendingScript {
    kind: ScriptKind,
    body: Resolved,
    label: String,
}

impl Unit {
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn compile(&self, config: &CompilerConfig) -> CompileOutput {
        let mut world = World::new();
        let mut diagnostics = Vec::new();

        for decl in &self.declarations {
            if let Err(e) = decl.apply(&mut world) {
                diagnostics.push(Diagnostic::error_in(decl.subject(), &e));
            }
        }
        for def in &self.macros {
            if let Err(e) = def.declare(&mut world) {
                let e = if def.pos.is_known() { e.at(&def.pos) } else { e };
                diagnostics.push(Diagnostic::error_in(&format!("macro {}", def.name), &e));
            }
        }

        // Every script is resolved before any is compiled so that compile
        // time handles never collide with resolve time ones.
        let mut pending = Vec::new();
        if let Some(body) = &self.install {
            let null = world.types.null();
            match resolve_script(&mut world, null, body) {
                Ok(body) => pending.push(PendingScript {
                    kind: ScriptKind::Install,
                    body,
                    label: "install script".to_string(),
                }),
                Err(e) => diagnostics.push(Diagnostic::error_in("install script", &e)),
            }
        }
        for event in &self.events {
            match resolve_event(&mut world, event) {
                Ok(script) => pending.push(script),
                Err(e) => {
                    let e = if event.pos.is_known() { e.at(&event.pos) } else { e };
                    diagnostics.push(Diagnostic::error_in(&format!("script {}", event.classifier), &e));
                }
            }
        }
        if let Some(body) = &self.remove {
            let null = world.types.null();
            match resolve_script(&mut world, null, body) {
                Ok(body) => pending.push(PendingScript {
                    kind: ScriptKind::Remove,
                    body,
                    label: "remove script".to_string(),
                }),
                Err(e) => diagnostics.push(Diagnostic::error_in("remove script", &e)),
            }
        }

        let labels = LabelAllocator::new(config.label_prefix.clone());
        let mut code = String::new();
        for script in &pending {
            debug!(script = %script.label, "compiling");
            match compile_script(&world, config, &labels, script) {
                Ok(text) => code.push_str(&text),
                Err(e) => diagnostics.push(Diagnostic::error_in(&script.label, &e)),
            }
        }
        debug!(scripts = pending.len(), errors = diagnostics.len(), "compiled unit");
        CompileOutput { code, diagnostics }
    }
}

fn resolve_script(world: &mut World, ownr: TypeId, body: &Stmt) -> Result<Resolved, CompileError> {
    let script = ScriptContext::new(&world.types, ownr);
    let mut scope = ScopeContext::root(&world.types, script);
    let mut rv = world.resolver();
    body.resolve(&mut scope, &mut rv)
}

fn resolve_event(world: &mut World, event: &EventScript) -> Result<PendingScript, CompileError> {
    let ownr = world.types.by_classifier(event.classifier);
    let types = &world.types;
    let (number, name) = match &event.script {
        ScriptRef::Number(n) => (*n, types.lookup_script_name(ownr, *n).map(str::to_string)),
        ScriptRef::Name(name) => {
            let n = types.lookup_script_id(ownr, name).ok_or_else(|| CompileError::UnknownScript {
                ty: types.name(ownr),
                name: name.clone(),
            })?;
            (n, Some(name.clone()))
        }
    };
    let comment = match &name {
        Some(name) => format!("{}:{name} {number}", types.name(ownr)),
        None => format!("{} {number}", types.name(ownr)),
    };
    let header = format!("scrp {} {number}", event.classifier.to_caos());
    let label = format!("script {} {number}", event.classifier);
    debug!(%label, "resolving");
    let body = resolve_script(world, ownr, &event.body)?;
    Ok(PendingScript {
        kind: ScriptKind::Event { comment, header },
        body,
        label,
    })
}

/// Compiles one script into a scratch writer, returning its text.
fn compile_script(
    world: &World,
    config: &CompilerConfig,
    labels: &LabelAllocator,
    script: &PendingScript,
) -> Result<String, CompileError> {
    let mut ctx = world.compile_context(config, labels);
    match &script.kind {
        ScriptKind::Install => {}
        ScriptKind::Event { comment, header } => {
            ctx.writer.write_comment(comment);
            ctx.writer.write_code(0, header, 1);
        }
        ScriptKind::Remove => ctx.writer.write_code(0, "rscr", 1),
    }
    script.body.compile(&mut ctx)?;
    if let ScriptKind::Event { .. } = script.kind {
        ctx.writer.write_code(-1, "endm", 0);
    }
    Ok(ctx.finish())
}
