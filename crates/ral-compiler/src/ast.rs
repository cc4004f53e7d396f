//! The unresolved tree handed over by the parser.
//!
//! Everything here is plain data (serde-serializable) and carries no type
//! information. [`Stmt::resolve`] and [`ExprUR::resolve`] turn it into
//! resolved statements and expression slices.

use rhizome_ral_types::Classifier;
use serde::{Deserialize, Serialize};

use crate::diagnostic::SrcPos;
use crate::slice::{ChainOp, CompareOp, LogicOp};

/// A type as written in source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    Named(String),
    Classifier(Classifier),
    Nullable(Box<TypeRef>),
    Union(Vec<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn nullable(self) -> Self {
        TypeRef::Nullable(Box::new(self))
    }
}

/// Raw CAOS text with embedded expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InlinePart {
    Text(String),
    Expr(ExprUR),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprUR {
    Int(i32),
    Float(f32),
    Str(String),
    Bytes(Vec<u8>),
    /// A variable, built-in or named constant.
    Id(String),
    /// `(a, b, c)`: the slots of each element in order.
    Group(Vec<ExprUR>),
    /// `a op b op c`, folded left to right.
    Chain { op: ChainOp, operands: Vec<ExprUR> },
    Call {
        name: String,
        #[serde(default)]
        args: Vec<ExprUR>,
    },
    Field { base: Box<ExprUR>, field: String },
    Cast { base: Box<ExprUR>, ty: TypeRef },
    /// `expr!`: the value with `null` removed from its type.
    Denull(Box<ExprUR>),
    Compare {
        op: CompareOp,
        left: Box<ExprUR>,
        right: Box<ExprUR>,
    },
    Logic {
        op: LogicOp,
        left: Box<ExprUR>,
        right: Box<ExprUR>,
    },
    Not(Box<ExprUR>),
    Inline { parts: Vec<InlinePart>, ty: TypeRef },
    /// `Type->message` or `Type:script`, the number as an integer constant.
    MessageId {
        ty: TypeRef,
        name: String,
        #[serde(default)]
        script: bool,
    },
    /// Whether an agent matches a classifier. Zero components are wildcards.
    Instanceof { base: Box<ExprUR>, class: Classifier },
    /// Statements followed by a result, in a scope of their own.
    Seq { body: Vec<Stmt>, result: Box<ExprUR> },
}

impl ExprUR {
    pub fn id(name: impl Into<String>) -> Self {
        ExprUR::Id(name.into())
    }

    pub fn str(value: impl Into<String>) -> Self {
        ExprUR::Str(value.into())
    }

    pub fn chain(op: ChainOp, operands: Vec<ExprUR>) -> Self {
        ExprUR::Chain { op, operands }
    }

    pub fn call(name: impl Into<String>, args: Vec<ExprUR>) -> Self {
        ExprUR::Call {
            name: name.into(),
            args,
        }
    }

    pub fn field(base: ExprUR, field: impl Into<String>) -> Self {
        ExprUR::Field {
            base: Box::new(base),
            field: field.into(),
        }
    }

    pub fn compare(op: CompareOp, left: ExprUR, right: ExprUR) -> Self {
        ExprUR::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn logic(op: LogicOp, left: ExprUR, right: ExprUR) -> Self {
        ExprUR::Logic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn message_id(ty: TypeRef, name: impl Into<String>) -> Self {
        ExprUR::MessageId {
            ty,
            name: name.into(),
            script: false,
        }
    }

    pub fn instanceof(base: ExprUR, class: Classifier) -> Self {
        ExprUR::Instanceof {
            base: Box::new(base),
            class,
        }
    }

    pub fn seq(body: Vec<Stmt>, result: ExprUR) -> Self {
        ExprUR::Seq {
            body,
            result: Box::new(result),
        }
    }

    /// The empty group, a zero-slot value.
    pub fn unit() -> Self {
        ExprUR::Group(Vec::new())
    }
}

/// The message of a send or the script of a call: a name looked up on the
/// receiving type, or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRef {
    Name(String),
    Id(ExprUR),
}

impl MessageRef {
    pub fn name(name: impl Into<String>) -> Self {
        MessageRef::Name(name.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumKind {
    Enum,
    Epas,
    Esee,
    Etch,
    Econ,
}

impl EnumKind {
    pub fn caos(self) -> &'static str {
        match self {
            EnumKind::Enum => "enum",
            EnumKind::Epas => "epas",
            EnumKind::Esee => "esee",
            EnumKind::Etch => "etch",
            EnumKind::Econ => "econ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(default)]
    pub pos: SrcPos,
    #[serde(flatten)]
    pub kind: StmtKind,
}

fn scoped_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum StmtKind {
    Block {
        body: Vec<Stmt>,
        #[serde(default = "scoped_default")]
        scoped: bool,
    },
    /// `let [T] a, [T] b = init;` with one optional type per name.
    Let {
        names: Vec<String>,
        #[serde(default)]
        types: Vec<Option<TypeRef>>,
        #[serde(default)]
        init: Option<ExprUR>,
    },
    /// `targets = source;`, or `source;` when there are no targets.
    Assign {
        #[serde(default)]
        targets: Option<ExprUR>,
        source: ExprUR,
    },
    /// `target op= source;`
    ModAssign {
        op: ChainOp,
        target: ExprUR,
        source: ExprUR,
    },
    /// Makes `name` another way to write `target` for the rest of the block.
    Alias {
        name: String,
        target: ExprUR,
    },
    If {
        cond: ExprUR,
        then: Box<Stmt>,
        #[serde(default, rename = "else")]
        otherwise: Option<Box<Stmt>>,
    },
    Loop {
        body: Box<Stmt>,
    },
    Break,
    Continue,
    /// Iterates agents, with `targ` set to each in turn.
    Enum {
        kind: EnumKind,
        agent: TypeRef,
        #[serde(default)]
        params: Vec<ExprUR>,
        body: Box<Stmt>,
    },
    Inline {
        parts: Vec<InlinePart>,
    },
    /// `agent->message(p1, p2) [after delay];`
    Send {
        agent: ExprUR,
        message: MessageRef,
        #[serde(default)]
        params: Vec<ExprUR>,
        #[serde(default)]
        after: Option<ExprUR>,
    },
    /// `call script(p1, p2);` on `ownr`.
    Call {
        script: MessageRef,
        #[serde(default)]
        params: Vec<ExprUR>,
    },
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            pos: SrcPos::default(),
            kind,
        }
    }

    pub fn at(mut self, pos: SrcPos) -> Self {
        self.pos = pos;
        self
    }

    pub fn block(body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::Block { body, scoped: true })
    }

    pub fn let_(name: impl Into<String>, init: ExprUR) -> Self {
        Self::new(StmtKind::Let {
            names: vec![name.into()],
            types: Vec::new(),
            init: Some(init),
        })
    }

    pub fn assign(targets: ExprUR, source: ExprUR) -> Self {
        Self::new(StmtKind::Assign {
            targets: Some(targets),
            source,
        })
    }

    /// An expression evaluated for its effects.
    pub fn expr(source: ExprUR) -> Self {
        Self::new(StmtKind::Assign {
            targets: None,
            source,
        })
    }

    pub fn mod_assign(op: ChainOp, target: ExprUR, source: ExprUR) -> Self {
        Self::new(StmtKind::ModAssign { op, target, source })
    }

    pub fn alias(name: impl Into<String>, target: ExprUR) -> Self {
        Self::new(StmtKind::Alias {
            name: name.into(),
            target,
        })
    }

    pub fn send(agent: ExprUR, message: MessageRef, params: Vec<ExprUR>) -> Self {
        Self::new(StmtKind::Send {
            agent,
            message,
            params,
            after: None,
        })
    }

    pub fn call(script: MessageRef, params: Vec<ExprUR>) -> Self {
        Self::new(StmtKind::Call { script, params })
    }

    pub fn if_(cond: ExprUR, then: Stmt, otherwise: Option<Stmt>) -> Self {
        Self::new(StmtKind::If {
            cond,
            then: Box::new(then),
            otherwise: otherwise.map(Box::new),
        })
    }

    pub fn loop_(body: Stmt) -> Self {
        Self::new(StmtKind::Loop {
            body: Box::new(body),
        })
    }

    pub fn break_() -> Self {
        Self::new(StmtKind::Break)
    }

    pub fn continue_() -> Self {
        Self::new(StmtKind::Continue)
    }

    pub fn inline(parts: Vec<InlinePart>) -> Self {
        Self::new(StmtKind::Inline { parts })
    }

    /// A line of raw CAOS.
    pub fn caos(text: impl Into<String>) -> Self {
        Self::inline(vec![InlinePart::Text(text.into())])
    }
}
