//! Whole-unit code generation: script framing, diagnostics and the JSON form.

use rhizome_ral_compiler::{
    CompilerConfig, Declaration, EventScript, ExprUR, ScriptRef, Severity, SrcPos, Stmt, TypeRef,
    Unit,
};
use rhizome_ral_types::Classifier;

const TOY: Classifier = Classifier::new(2, 15, 0);

// =============================================================================
// Test Helpers
// =============================================================================

fn quiet() -> CompilerConfig {
    CompilerConfig {
        var_comments: false,
        ..CompilerConfig::default()
    }
}

fn toy_declarations() -> Vec<Declaration> {
    vec![
        Declaration::Class {
            name: "Toy".into(),
            classifier: TOY,
        },
        Declaration::Field {
            owner: TypeRef::named("Toy"),
            name: "count".into(),
            ty: TypeRef::named("integer"),
            slot: 3,
        },
        Declaration::Script {
            owner: TypeRef::named("Toy"),
            name: "push".into(),
            id: 1,
        },
    ]
}

fn event(script: ScriptRef, body: Vec<Stmt>) -> EventScript {
    EventScript {
        pos: SrcPos::default(),
        classifier: TOY,
        script,
        body: Stmt::block(body),
    }
}

fn breaking_loop() -> Stmt {
    Stmt::loop_(Stmt::break_())
}

// =============================================================================
// Script framing
// =============================================================================

#[test]
fn test_install_event_and_remove_scripts() {
    let unit = Unit {
        declarations: toy_declarations(),
        install: Some(Stmt::block(vec![Stmt::caos("outs \"hi\"")])),
        events: vec![event(
            ScriptRef::Name("push".into()),
            vec![Stmt::assign(
                ExprUR::field(ExprUR::id("ownr"), "count"),
                ExprUR::Int(1),
            )],
        )],
        remove: Some(Stmt::block(vec![Stmt::caos("scrx 2 15 0 1")])),
        ..Unit::default()
    };
    let out = unit.compile(&quiet());
    assert!(out.is_ok(), "{:?}", out.diagnostics);
    assert_eq!(
        out.code,
        "outs \"hi\"\n\
         * Toy:push 1\nscrp 2 15 0 1\n\tsetv mv03 1\nendm\n\
         rscr\n\tscrx 2 15 0 1\n"
    );
}

#[test]
fn test_numbered_script_without_name() {
    let unit = Unit {
        declarations: toy_declarations(),
        events: vec![event(ScriptRef::Number(9), vec![Stmt::caos("stop")])],
        ..Unit::default()
    };
    let out = unit.compile(&quiet());
    assert_eq!(out.code, "* Toy 9\nscrp 2 15 0 9\n\tstop\nendm\n");
}

#[test]
fn test_unknown_script_name() {
    let unit = Unit {
        declarations: toy_declarations(),
        events: vec![event(ScriptRef::Name("pull".into()), Vec::new())],
        ..Unit::default()
    };
    let out = unit.compile(&quiet());
    assert!(out.code.is_empty());
    assert_eq!(
        out.diagnostics[0].message,
        "script [2 15 0]: no script `pull` on Toy"
    );
}

#[test]
fn test_event_scripts_keep_declaration_order() {
    let unit = Unit {
        declarations: toy_declarations(),
        events: vec![
            event(ScriptRef::Number(9), Vec::new()),
            event(ScriptRef::Number(1), Vec::new()),
        ],
        ..Unit::default()
    };
    let out = unit.compile(&quiet());
    let headers: Vec<&str> = out
        .code
        .lines()
        .filter(|l| l.starts_with("scrp"))
        .collect();
    assert_eq!(headers, ["scrp 2 15 0 9", "scrp 2 15 0 1"]);
}

#[test]
fn test_labels_are_unique_across_scripts() {
    let unit = Unit {
        declarations: toy_declarations(),
        events: vec![
            event(ScriptRef::Number(1), vec![breaking_loop()]),
            event(ScriptRef::Number(2), vec![breaking_loop()]),
        ],
        ..Unit::default()
    };
    let out = unit.compile(&quiet());
    assert!(out.is_ok());
    assert!(out.code.contains("subr _RAL_1\nendm\n"), "{}", out.code);
    assert!(out.code.contains("subr _RAL_3\nendm\n"), "{}", out.code);
}

#[test]
fn test_label_prefix_from_config() {
    let config = CompilerConfig::from_toml_str("label_prefix = \"lbl\"\nvar_comments = false").unwrap();
    let unit = Unit {
        install: Some(breaking_loop()),
        ..Unit::default()
    };
    let out = unit.compile(&config);
    assert_eq!(out.code, "goto lbl0\nsubr lbl0\n\tgoto lbl1\ngoto lbl0\nsubr lbl1\n");
}

#[test]
fn test_source_comments() {
    let config = CompilerConfig {
        source_comments: true,
        ..quiet()
    };
    let unit = Unit {
        install: Some(
            Stmt::block(vec![
                Stmt::let_("a", ExprUR::Int(1)).at(SrcPos::new("a.ral", 2, 5)),
                Stmt::let_("b", ExprUR::Int(2)),
            ])
            .at(SrcPos::new("a.ral", 1, 1)),
        ),
        ..Unit::default()
    };
    let out = unit.compile(&config);
    assert_eq!(out.code, "* @ a.ral:2:5\nsetv va00 1\nsetv va01 2\n");
}

// =============================================================================
// Diagnostics
// =============================================================================

#[test]
fn test_failed_script_is_dropped() {
    let mut bad = event(
        ScriptRef::Number(1),
        vec![Stmt::let_("a", ExprUR::id("nope"))],
    );
    bad.pos = SrcPos::new("toy.ral", 4, 1);
    let unit = Unit {
        declarations: toy_declarations(),
        events: vec![bad, event(ScriptRef::Number(2), vec![Stmt::caos("stop")])],
        ..Unit::default()
    };
    let out = unit.compile(&quiet());
    assert_eq!(out.code, "* Toy 2\nscrp 2 15 0 2\n\tstop\nendm\n");
    assert_eq!(out.diagnostics.len(), 1);
    let diag = &out.diagnostics[0];
    assert_eq!(diag.severity, Severity::Error);
    assert_eq!(diag.pos, Some(SrcPos::new("toy.ral", 4, 1)));
    assert_eq!(diag.message, "script [2 15 0]: unknown identifier `nope`");
    assert_eq!(
        diag.to_string(),
        "toy.ral:4:1: error: script [2 15 0]: unknown identifier `nope`"
    );
}

#[test]
fn test_innermost_position_wins() {
    let mut bad = event(
        ScriptRef::Number(1),
        vec![Stmt::block(vec![
            Stmt::let_("a", ExprUR::id("nope")).at(SrcPos::new("toy.ral", 7, 3)),
        ])
        .at(SrcPos::new("toy.ral", 6, 1))],
    );
    bad.pos = SrcPos::new("toy.ral", 4, 1);
    let unit = Unit {
        declarations: toy_declarations(),
        events: vec![bad],
        ..Unit::default()
    };
    let out = unit.compile(&quiet());
    assert_eq!(out.diagnostics[0].pos, Some(SrcPos::new("toy.ral", 7, 3)));
}

#[test]
fn test_declaration_errors_do_not_stop_the_unit() {
    let mut declarations = toy_declarations();
    declarations.push(Declaration::Field {
        owner: TypeRef::named("Toy"),
        name: "other".into(),
        ty: TypeRef::named("integer"),
        slot: 3,
    });
    declarations.push(Declaration::Const {
        name: "bad".into(),
        value: ExprUR::id("ownr"),
    });
    let unit = Unit {
        declarations,
        install: Some(Stmt::caos("stop")),
        ..Unit::default()
    };
    let out = unit.compile(&quiet());
    assert_eq!(out.diagnostics.len(), 2);
    assert!(out.diagnostics[0].message.starts_with("other: "));
    assert!(out.diagnostics[1].message.starts_with("bad: "));
    assert_eq!(out.code, "stop\n");
}

#[test]
fn test_interfaces_and_implements() {
    let mut declarations = toy_declarations();
    declarations.extend([
        Declaration::Interface {
            name: "Countable".into(),
        },
        Declaration::Field {
            owner: TypeRef::named("Countable"),
            name: "total".into(),
            ty: TypeRef::named("integer"),
            slot: 10,
        },
        Declaration::Implements {
            ty: TypeRef::named("Toy"),
            interface: TypeRef::named("Countable"),
        },
    ]);
    let unit = Unit {
        declarations,
        events: vec![event(
            ScriptRef::Number(1),
            vec![Stmt::assign(
                ExprUR::field(ExprUR::id("ownr"), "total"),
                ExprUR::field(ExprUR::id("ownr"), "count"),
            )],
        )],
        ..Unit::default()
    };
    let out = unit.compile(&quiet());
    assert!(out.is_ok(), "{:?}", out.diagnostics);
    assert!(out.code.contains("\tsetv mv10 mv03\n"), "{}", out.code);
}

// =============================================================================
// JSON form
// =============================================================================

#[test]
fn test_unit_from_json() {
    let json = r#"{
        "declarations": [
            {"decl": "class", "name": "Toy", "classifier": {"family": 2, "genus": 15, "species": 0}},
            {"decl": "const", "name": "speed", "value": {"int": 5}}
        ],
        "events": [
            {
                "classifier": {"family": 2, "genus": 15, "species": 0},
                "script": 9,
                "body": {"stmt": "block", "body": [
                    {"stmt": "let", "names": ["v"],
                     "init": {"chain": {"op": "mul", "operands": [{"id": "speed"}, {"int": 2}]}}}
                ]}
            }
        ]
    }"#;
    let unit = Unit::from_json(json).unwrap();
    let out = unit.compile(&CompilerConfig::default());
    assert!(out.is_ok(), "{:?}", out.diagnostics);
    assert_eq!(
        out.code,
        "* Toy 9\nscrp 2 15 0 9\n\t* va00: integer v\n\tsetv va00 10\nendm\n"
    );

    let again = Unit::from_json(&unit.to_json().unwrap()).unwrap();
    assert_eq!(again, unit);
}

#[test]
fn test_unit_json_rejects_unknown_statement() {
    let json = r#"{"install": {"stmt": "goto", "label": "x"}}"#;
    assert!(Unit::from_json(json).is_err());
}
