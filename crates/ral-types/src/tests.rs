use crate::*;

fn world() -> (TypeSystem, TypeId, TypeId, TypeId) {
    let mut ts = TypeSystem::new();
    let critter = ts.declare_class(Classifier::new(2, 15, 0), "Critter").unwrap();
    let norn = ts.declare_class(Classifier::new(2, 15, 1), "Norn").unwrap();
    let vehicle = ts.declare_class(Classifier::new(3, 1, 0), "Vehicle").unwrap();
    (ts, critter, norn, vehicle)
}

// =============================================================================
// Unions
// =============================================================================

#[test]
fn test_union_is_order_and_nesting_independent() {
    let (mut ts, _, norn, vehicle) = world();
    let s = ts.string();
    let inner = ts.by_union([vehicle, s]);
    let nested = ts.by_union([norn, inner]);
    let flat = ts.by_union([s, vehicle, norn]);
    assert_eq!(nested, flat);
    assert_eq!(ts.by_union([flat, flat]), flat);
}

#[test]
fn test_union_subsumes_castable_members() {
    let (mut ts, critter, norn, _) = world();
    assert_eq!(ts.by_union([norn, critter]), critter);
    let (integer, number) = (ts.integer(), ts.number());
    assert_eq!(ts.by_union([integer, number]), number);
    let any = ts.any();
    assert_eq!(ts.by_union([integer, any]), any);
}

#[test]
fn test_union_degenerate_sizes() {
    let (mut ts, _, norn, _) = world();
    assert_eq!(ts.by_union([]), ts.void());
    assert_eq!(ts.by_union([norn]), norn);
    assert_eq!(ts.by_union([norn, norn]), norn);
}

#[test]
fn test_union_major_and_name() {
    let (mut ts, _, norn, vehicle) = world();
    let u = ts.by_union([norn, vehicle]);
    assert_eq!(ts.major(u), Major::Agent);
    let nullable = ts.by_nullable(norn);
    assert_eq!(ts.name(nullable), "Norn|null");
    let s = ts.string();
    let mixed = ts.by_union([s, norn]);
    assert_eq!(ts.major(mixed), Major::Unknown);
}

#[test]
fn test_nullable_round_trip() {
    let (mut ts, _, norn, _) = world();
    let nullable = ts.by_nullable(norn);
    assert_ne!(nullable, norn);
    assert_eq!(ts.by_non_nullable(nullable).unwrap(), norn);
    assert!(matches!(
        ts.by_non_nullable(norn),
        Err(TypeError::NotNullable(_))
    ));
    assert_eq!(ts.name(ts.agent_nullable()), "Agent|null");
}

// =============================================================================
// Casting
// =============================================================================

#[test]
fn test_cast_is_reflexive() {
    let (mut ts, critter, norn, vehicle) = world();
    let u = ts.by_union([norn, vehicle]);
    for t in [critter, norn, vehicle, u, ts.any(), ts.null(), ts.integer()] {
        assert!(ts.can_implicitly_cast(t, t), "{}", ts.name(t));
    }
}

#[test]
fn test_cast_is_transitive() {
    let (ts, critter, norn, _) = world();
    let genus = ts.classifier_of(critter).unwrap();
    assert_eq!(genus, Classifier::new(2, 15, 0));
    assert!(ts.can_implicitly_cast(norn, critter));
    assert!(ts.can_implicitly_cast(critter, ts.agent()));
    assert!(ts.can_implicitly_cast(norn, ts.agent()));
    assert!(!ts.can_implicitly_cast(critter, norn));

    assert!(ts.can_implicitly_cast(ts.boolean(), ts.integer()));
    assert!(ts.can_implicitly_cast(ts.integer(), ts.number()));
    assert!(ts.can_implicitly_cast(ts.boolean(), ts.number()));
    assert!(!ts.can_implicitly_cast(ts.float(), ts.integer()));
}

#[test]
fn test_cast_with_unions() {
    let (mut ts, critter, norn, vehicle) = world();
    let u = ts.by_union([norn, vehicle]);
    assert!(ts.can_implicitly_cast(norn, u));
    assert!(ts.can_implicitly_cast(u, ts.agent()));
    assert!(!ts.can_implicitly_cast(u, critter));
    let wider = ts.by_union([critter, vehicle]);
    assert!(ts.can_implicitly_cast(u, wider));
    assert!(ts.assert_implicit_cast(ts.agent_nullable(), ts.agent()).is_err());
    assert!(ts.can_implicitly_cast(ts.null(), ts.agent_nullable()));
}

// =============================================================================
// Interfaces
// =============================================================================

#[test]
fn test_fields_inherit_down_classifier_chain() {
    let (mut ts, critter, norn, _) = world();
    let s = ts.string();
    let i = ts.integer();
    ts.declare_field(critter, "name", s, 0).unwrap();
    ts.declare_field(norn, "age", i, 1).unwrap();

    assert_eq!(ts.lookup_field(norn, "name").unwrap().slot, 0);
    assert_eq!(ts.lookup_field(norn, "age").unwrap().ty, i);
    assert!(ts.lookup_field(critter, "age").is_none());
}

#[test]
fn test_interfaces_first_declared_wins() {
    let (mut ts, _, norn, _) = world();
    let talker = ts.declare_interface("Talker").unwrap();
    let i = ts.integer();
    let s = ts.string();
    ts.declare_field(talker, "voice", i, 10).unwrap();
    ts.declare_field(norn, "voice", s, 11).unwrap();
    ts.add_parent(norn, talker).unwrap();

    assert_eq!(ts.lookup_field(norn, "voice").unwrap().slot, 11);
    let names: Vec<_> = ts.interfaces(norn).map(|i| i.name.clone()).collect();
    assert_eq!(names[0], "Norn");
    assert_eq!(names.iter().filter(|n| n.as_str() == "Agent").count(), 1);
    assert!(names.contains(&"Talker".to_string()));
}

#[test]
fn test_add_parent_recomputes_dependents() {
    let (mut ts, critter, norn, vehicle) = world();
    let u = ts.by_union([norn, vehicle]);
    let talker = ts.declare_interface("Talker").unwrap();
    ts.declare_message(talker, "speak", 1000).unwrap();

    ts.add_parent(critter, talker).unwrap();
    assert_eq!(ts.lookup_message_id(norn, "speak"), Some(1000));
    assert!(ts.can_implicitly_cast(norn, talker));
    // Vehicle does not talk, so the union does not either.
    assert_eq!(ts.lookup_message_id(u, "speak"), None);

    ts.add_parent(vehicle, talker).unwrap();
    assert_eq!(ts.lookup_message_id(u, "speak"), Some(1000));
    assert_eq!(ts.lookup_message_name(u, 1000), Some("speak"));
}

#[test]
fn test_cyclic_parent_rejected() {
    let (mut ts, _, _, _) = world();
    let a = ts.declare_interface("A").unwrap();
    let b = ts.declare_interface("B").unwrap();
    ts.add_parent(a, b).unwrap();
    assert!(matches!(
        ts.add_parent(b, a),
        Err(TypeError::CyclicParent { .. })
    ));
    let agent = ts.agent();
    assert!(ts.add_parent(agent, a).is_err());
}

// =============================================================================
// Declarations
// =============================================================================

#[test]
fn test_declaration_collisions() {
    let (mut ts, critter, norn, _) = world();
    let i = ts.integer();
    ts.declare_field(critter, "hp", i, 3).unwrap();
    assert!(matches!(
        ts.declare_field(critter, "hp", i, 4),
        Err(TypeError::DuplicateField { .. })
    ));
    assert!(matches!(
        ts.declare_field(critter, "mp", i, 3),
        Err(TypeError::DuplicateFieldSlot { slot: 3, .. })
    ));
    assert!(matches!(
        ts.declare_field(critter, "mp", i, 100),
        Err(TypeError::FieldSlotOutOfRange(100))
    ));

    ts.declare_script(norn, "hatch", 1).unwrap();
    assert!(ts.declare_script(norn, "hatch", 2).is_err());
    assert!(ts.declare_script(norn, "grow", 1).is_err());
    assert_eq!(ts.lookup_script_name(norn, 1), Some("hatch"));
    assert_eq!(ts.lookup_script_id(norn, "hatch"), Some(1));

    assert!(ts.declare_field(i, "x", i, 0).is_err());
}

#[test]
fn test_class_and_interface_names() {
    let (mut ts, _, norn, _) = world();
    assert_eq!(ts.declare_class(Classifier::new(2, 15, 1), "Norn").unwrap(), norn);
    assert!(ts.declare_class(Classifier::new(2, 15, 2), "Norn").is_err());
    assert!(ts.declare_interface("integer").is_err());
    let t = ts.declare_interface("Talker").unwrap();
    assert_eq!(ts.declare_interface("Talker").unwrap(), t);
    assert_eq!(ts.by_name("Norn").unwrap(), norn);
    assert!(matches!(ts.by_name("Dragon"), Err(TypeError::UnknownType(_))));

    ts.declare_typedef("Creature", norn).unwrap();
    assert_eq!(ts.by_name("Creature").unwrap(), norn);
    assert!(ts.declare_typedef("Creature", ts.integer()).is_err());
}

#[test]
fn test_constants() {
    let mut ts = TypeSystem::new();
    let i = ts.integer();
    ts.declare_const("MAX", Constant::new(ConstValue::Int(7), i)).unwrap();
    assert!(ts.declare_const("MAX", Constant::new(ConstValue::Int(8), i)).is_err());
    assert_eq!(ts.lookup_const("MAX").unwrap().to_caos(), "7");

    assert_eq!(ConstValue::Float(3.0).to_string(), "3.0");
    assert_eq!(ConstValue::Float(0.25).to_string(), "0.25");
    assert_eq!(ConstValue::Str("a\"b\n".into()).to_string(), "\"a\\\"b\\n\"");
    assert_eq!(ConstValue::Bytes(vec![1, 2, 3]).to_string(), "[1 2 3]");
}

#[test]
fn test_const_value_json_shape() {
    let v: ConstValue = serde_json::from_str(r#"{"float": 1.5}"#).unwrap();
    assert_eq!(v, ConstValue::Float(1.5));
    let c: Classifier = serde_json::from_str(r#"{"family": 2, "genus": 15, "species": 1}"#).unwrap();
    assert_eq!(c, Classifier::new(2, 15, 1));
}
