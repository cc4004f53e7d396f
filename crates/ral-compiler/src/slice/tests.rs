use rhizome_ral_types::{ConstValue, Constant, TypeId};

use super::*;
use crate::config::CompilerConfig;
use crate::context::LabelAllocator;
use crate::world::World;

fn int(world: &World, v: i32) -> Expr {
    ConstSlice::expr(Constant::new(ConstValue::Int(v), world.types.integer()))
}

fn var(world: &World, code: &str, writable: bool) -> Expr {
    Expr::leaf(FixedVar::new(code, world.types.integer(), writable))
}

fn quiet() -> CompilerConfig {
    CompilerConfig {
        var_comments: false,
        ..CompilerConfig::default()
    }
}

/// Two slots; reading it always runs `doit` first.
#[derive(Debug)]
struct Effect {
    ty: TypeId,
}

impl SliceImpl for Effect {
    fn len(&self) -> usize {
        2
    }

    fn read_type(&self, _index: usize) -> Option<TypeId> {
        Some(self.ty)
    }

    fn read_compile(&self, out: &Expr, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        ctx.writer.write_line("doit");
        out.write_compile(0, "1", self.ty, ctx)?;
        out.write_compile(1, "2", self.ty, ctx)
    }
}

#[test]
fn test_adjacent_views_merge() {
    let world = World::new();
    let sink = Expr::leaf(Discard::new(4, world.types.any()));
    let head = sink.slice(0, 2).unwrap();
    let tail = sink.slice(2, 2).unwrap();
    let merged = Expr::concat(head, tail);
    assert_eq!(merged.len(), 4);
    assert!(!format!("{merged:?}").contains("Concat"));
}

#[test]
fn test_non_adjacent_views_do_not_merge() {
    let world = World::new();
    let sink = Expr::leaf(Discard::new(4, world.types.any()));
    let a = sink.slice(0, 1).unwrap();
    let b = sink.slice(2, 1).unwrap();
    let joined = Expr::concat(a, b);
    assert_eq!(joined.len(), 2);
    assert!(format!("{joined:?}").contains("Concat"));
}

#[test]
fn test_slice_across_group() {
    let world = World::new();
    let config = quiet();
    let labels = LabelAllocator::new("_T_");
    let ctx = world.compile_context(&config, &labels);
    let group = Expr::group([var(&world, "a", true), var(&world, "b", true), var(&world, "c", true)]);
    let middle = group.slice(1, 2).unwrap();
    assert_eq!(
        middle.inline_all(&ctx).unwrap(),
        Some(vec!["b".to_string(), "c".to_string()])
    );
    let slots = group.slots().unwrap();
    assert_eq!(slots.len(), 3);
    assert_eq!(slots[2].inline_code(0, false, &ctx).unwrap().as_deref(), Some("c"));
}

#[test]
fn test_slice_across_concat_boundary() {
    let world = World::new();
    let types = &world.types;
    let a = Expr::group([int(&world, 1), var(&world, "a", false)]);
    let b = Expr::group([
        ConstSlice::expr(Constant::new(ConstValue::Str("s".into()), types.string())),
        ConstSlice::expr(Constant::new(ConstValue::Float(1.5), types.float())),
        int(&world, 2),
    ]);
    let joined = Expr::concat(a, b);
    assert_eq!(joined.len(), 5);
    let view = joined.slice(1, 3).unwrap();
    assert_eq!(
        view.read_types().unwrap(),
        vec![types.integer(), types.string(), types.float()]
    );
}

#[test]
fn test_empty_parts_vanish_from_groups() {
    let world = World::new();
    let group = Expr::group([Expr::empty(), var(&world, "a", true), Expr::empty()]);
    assert_eq!(group.len(), 1);
    assert!(Expr::group([]).is_empty());
}

#[test]
fn test_out_of_range_access() {
    let world = World::new();
    let group = Expr::group([var(&world, "a", true), int(&world, 1)]);
    assert_eq!(
        group.read_type(5),
        Err(CompileError::SlotOutOfRange { index: 5, len: 2 })
    );
    assert_eq!(
        group.slice(1, 2).err(),
        Some(CompileError::InvalidSlice {
            base: 1,
            len: 2,
            total: 2
        })
    );
}

#[test]
fn test_permissions() {
    let world = World::new();
    let group = Expr::group([var(&world, "a", false), var(&world, "b", true), int(&world, 1)]);
    assert_eq!(group.perm(0).unwrap(), Some(Perm::R));
    assert_eq!(group.perm(1).unwrap(), Some(Perm::RW));
    assert!(matches!(group.write_type(2), Err(CompileError::NotWritable(_))));
    let sink = Expr::leaf(Discard::new(1, world.types.any()));
    assert_eq!(sink.perm(0).unwrap(), Some(Perm::W));
}

#[test]
fn test_read_into_group() {
    let world = World::new();
    let config = quiet();
    let labels = LabelAllocator::new("_T_");
    let mut ctx = world.compile_context(&config, &labels);
    let source = Expr::group([int(&world, 1), var(&world, "b", false)]);
    let out = Expr::group([var(&world, "x", true), var(&world, "y", true)]);
    source.read_compile(&out, &mut ctx).unwrap();
    assert_eq!(ctx.finish(), "setv x 1\nsetv y b\n");
}

#[test]
fn test_read_arity_mismatch() {
    let world = World::new();
    let config = quiet();
    let labels = LabelAllocator::new("_T_");
    let mut ctx = world.compile_context(&config, &labels);
    let source = Expr::group([int(&world, 1), int(&world, 2)]);
    let out = var(&world, "x", true);
    assert_eq!(
        source.read_compile(&out, &mut ctx),
        Err(CompileError::Arity {
            expected: 1,
            got: 2
        })
    );
}

#[test]
fn test_sub_slice_read_keeps_side_effects() {
    let world = World::new();
    let config = quiet();
    let labels = LabelAllocator::new("_T_");
    let mut ctx = world.compile_context(&config, &labels);
    let effect = Expr::leaf(Effect {
        ty: world.types.integer(),
    });
    let second = effect.slice(1, 1).unwrap();
    second.read_compile(&var(&world, "x", true), &mut ctx).unwrap();
    let code = ctx.finish();
    let lines: Vec<&str> = code.lines().collect();
    assert_eq!(lines.first(), Some(&"doit"));
    assert_eq!(lines.last(), Some(&"setv x 2"));
}

#[test]
fn test_discard_skips_plain_reads() {
    let world = World::new();
    let config = quiet();
    let labels = LabelAllocator::new("_T_");
    let mut ctx = world.compile_context(&config, &labels);
    let sink = Expr::leaf(Discard::new(2, world.types.any()));
    Expr::group([int(&world, 1), var(&world, "a", false)])
        .read_compile(&sink, &mut ctx)
        .unwrap();
    assert_eq!(ctx.finish(), "");
}

#[test]
fn test_deferred_routes_to_binding() {
    let mut world = World::new();
    let int_ty = world.types.integer();
    let id = world.resolver().deferred.reserve();
    let placeholder = Expr::leaf(DeferredSlice::new(
        id,
        vec![int_ty, int_ty],
        vec![Perm::R, Perm::RW],
    ));
    assert_eq!(placeholder.perm(0).unwrap(), Some(Perm::R));
    assert_eq!(placeholder.write_type(1).unwrap(), int_ty);

    let real = Expr::group([var(&world, "a", true), var(&world, "b", true)]);
    world.resolver().deferred.bind(id, real);
    assert_eq!(world.deferred().unbound(), 0);

    let config = quiet();
    let labels = LabelAllocator::new("_T_");
    let mut ctx = world.compile_context(&config, &labels);
    let second = placeholder.slice(1, 1).unwrap();
    assert_eq!(second.inline_code(0, false, &ctx).unwrap().as_deref(), Some("b"));
    // Read-only through the placeholder even though the binding is writable.
    assert_eq!(placeholder.inline_code(0, true, &ctx).unwrap(), None);

    second.read_compile(&var(&world, "x", true), &mut ctx).unwrap();
    assert_eq!(ctx.finish(), "setv x b\n");
}

#[test]
fn test_unbound_deferred_is_an_error() {
    let mut world = World::new();
    let int_ty = world.types.integer();
    let id = world.resolver().deferred.reserve();
    let placeholder = Expr::leaf(DeferredSlice::new(id, vec![int_ty], vec![Perm::R]));
    let config = quiet();
    let labels = LabelAllocator::new("_T_");
    let ctx = world.compile_context(&config, &labels);
    assert!(matches!(
        placeholder.inline_code(0, false, &ctx),
        Err(CompileError::UnboundDeferred(_))
    ));
}

#[test]
fn test_store_by_major() {
    let world = World::new();
    let types = &world.types;
    assert_eq!(
        store(types, types.string(), "va00", "\"hi\"").unwrap(),
        "sets va00 \"hi\""
    );
    assert_eq!(
        store(types, types.agent_nullable(), "va00", "null").unwrap(),
        "seta va00 null"
    );
    assert_eq!(store(types, types.float(), "va00", "1.5").unwrap(), "setv va00 1.5");
    assert_eq!(
        store(types, types.bytes(), "va00", "[1]"),
        Err(CompileError::ByteStringStore)
    );
    assert!(matches!(
        store(types, types.any(), "va00", "x"),
        Err(CompileError::UnknownMajor { .. })
    ));
}

#[test]
fn test_cacher_copies_runs_in_order() {
    let world = World::new();
    let config = quiet();
    let labels = LabelAllocator::new("_T_");
    let mut ctx = world.compile_context(&config, &labels);
    let input = Expr::group([int(&world, 1), var(&world, "a", false), int(&world, 2)]);
    let cacher = VarCacher::new(&input, |i| i != 1, |i| format!("arg{i}"), || ctx.fresh_handle())
        .unwrap();
    assert!(!cacher.is_passthrough());
    assert_eq!(cacher.output().len(), 3);
    cacher.write_cache_code(&mut ctx).unwrap();
    assert_eq!(
        cacher.output().inline_all(&ctx).unwrap(),
        Some(vec!["va00".to_string(), "a".to_string(), "va01".to_string()])
    );
    assert_eq!(ctx.live_va_count(), 2);
    assert_eq!(ctx.finish(), "setv va00 1\nsetv va01 2\n");
}

#[test]
fn test_cacher_passthrough() {
    let world = World::new();
    let config = quiet();
    let labels = LabelAllocator::new("_T_");
    let mut ctx = world.compile_context(&config, &labels);
    let input = Expr::group([var(&world, "a", false), var(&world, "b", false)]);
    let cacher = VarCacher::new(&input, |_| false, |_| String::new(), || ctx.fresh_handle())
        .unwrap();
    assert!(cacher.is_passthrough());
    cacher.write_cache_code(&mut ctx).unwrap();
    assert_eq!(ctx.finish(), "");
}

#[test]
fn test_chain_uses_va_target_in_place() {
    let world = World::new();
    let config = quiet();
    let labels = LabelAllocator::new("_T_");
    let mut ctx = world.compile_context(&config, &labels);
    let chain = ChainSlice::new(
        &world.types,
        ChainOp::Add,
        vec![var(&world, "a", false), int(&world, 2)],
    )
    .unwrap();
    assert_eq!(chain.result_type(), world.types.integer());
    let out = ctx.temp(world.types.integer()).unwrap();
    Expr::leaf(chain).read_compile(&out, &mut ctx).unwrap();
    assert_eq!(ctx.finish(), "setv va00 a\naddv va00 2\n");
}

#[test]
fn test_chain_into_fixed_target_uses_temp() {
    let world = World::new();
    let config = quiet();
    let labels = LabelAllocator::new("_T_");
    let mut ctx = world.compile_context(&config, &labels);
    let chain = ChainSlice::new(
        &world.types,
        ChainOp::Mul,
        vec![var(&world, "a", false), var(&world, "b", false)],
    )
    .unwrap();
    Expr::leaf(chain)
        .read_compile(&var(&world, "x", true), &mut ctx)
        .unwrap();
    assert_eq!(ctx.live_va_count(), 0);
    assert_eq!(ctx.finish(), "setv va00 a\nmulv va00 b\nsetv x va00\n");
}
