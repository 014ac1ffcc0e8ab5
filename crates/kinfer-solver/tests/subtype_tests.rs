use super::*;
use crate::env::{VariableAnnotations, VariableOrigin};

struct RecordingSink {
    mine: Vec<TypeVarId>,
    bounds: Vec<(TypeVarId, TypeId, BoundKind)>,
}

impl RecordingSink {
    fn new(mine: Vec<TypeVarId>) -> Self {
        RecordingSink {
            mine,
            bounds: Vec::new(),
        }
    }
}

impl ConstraintSink for RecordingSink {
    fn is_my_type_variable(&self, var: TypeVarId) -> bool {
        self.mine.contains(&var)
    }

    fn add_bound(&mut self, var: TypeVarId, ty: TypeId, kind: BoundKind) {
        self.bounds.push((var, ty, kind));
    }
}

fn var(env: &TypeEnvironment, name: &str) -> TypeVarId {
    env.new_type_variable(name, VariableOrigin::Synthetic, VariableAnnotations::empty())
}

#[test]
fn test_nominal_subtyping() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    assert!(is_subtype_of(&env, b.int_type, b.number_type));
    assert!(is_subtype_of(&env, b.string_type, b.char_sequence_type));
    assert!(is_subtype_of(&env, b.int_type, env.comparable_of(b.int_type)));
    assert!(!is_subtype_of(&env, b.number_type, b.int_type));
    assert!(!is_subtype_of(&env, b.string_type, b.number_type));
    assert!(is_subtype_of(&env, TypeId::NOTHING, b.string_type));
    assert!(is_subtype_of(&env, b.string_type, TypeId::ANY));
    assert!(is_subtype_of(&env, TypeId::ERROR, b.string_type));
}

#[test]
fn test_declaration_site_variance() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    // List<out E>
    assert!(is_subtype_of(&env, env.list_of(b.int_type), env.list_of(b.number_type)));
    // MutableList<E> is invariant
    assert!(!is_subtype_of(
        &env,
        env.mutable_list_of(b.int_type),
        env.mutable_list_of(b.number_type)
    ));
    assert!(is_subtype_of(&env, env.mutable_list_of(b.int_type), env.list_of(b.number_type)));
    // Comparable<in T>
    assert!(is_subtype_of(
        &env,
        env.comparable_of(b.number_type),
        env.comparable_of(b.int_type)
    ));
    assert!(!is_subtype_of(
        &env,
        env.comparable_of(b.int_type),
        env.comparable_of(b.number_type)
    ));
}

#[test]
fn test_use_site_projections() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let out_number = env
        .interner
        .class_type(b.mutable_list, vec![TypeArg::out(b.number_type)]);
    let out_int = env.interner.class_type(b.mutable_list, vec![TypeArg::out(b.int_type)]);
    let star = env.interner.class_type(b.mutable_list, vec![TypeArg::STAR]);

    assert!(is_subtype_of(&env, env.mutable_list_of(b.int_type), out_number));
    assert!(is_subtype_of(&env, out_int, out_number));
    assert!(!is_subtype_of(&env, out_number, env.mutable_list_of(b.number_type)));
    assert!(is_subtype_of(&env, out_int, star));
    assert!(!is_subtype_of(&env, star, out_int));
}

#[test]
fn test_captured_types() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let captured_out = env.interner.captured(ProjectionKind::Out, b.int_type);
    let captured_in = env.interner.captured(ProjectionKind::In, b.int_type);
    assert!(is_subtype_of(&env, captured_out, b.number_type));
    assert!(!is_subtype_of(&env, b.int_type, captured_out));
    assert!(is_subtype_of(&env, b.int_type, captured_in));
    assert!(!is_subtype_of(&env, captured_in, b.int_type));
}

#[test]
fn test_integer_literals_and_intersections() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let small = env.interner.integer_literal(5);
    let big = env.interner.integer_literal(i64::from(i32::MAX) + 1);
    assert!(is_subtype_of(&env, small, b.int_type));
    assert!(is_subtype_of(&env, small, b.byte_type));
    assert!(!is_subtype_of(&env, big, b.int_type));
    assert!(is_subtype_of(&env, big, b.long_type));
    assert!(is_subtype_of(&env, small, b.number_type));
    assert!(!is_subtype_of(&env, small, b.string_type));

    let both = env
        .interner
        .intersection(vec![b.number_type, env.comparable_of(b.int_type)]);
    assert!(is_subtype_of(&env, b.int_type, both));
    assert!(is_subtype_of(&env, both, b.number_type));
    assert!(!is_subtype_of(&env, b.long_type, both));
}

#[test]
fn test_stub_types_are_compatible_both_ways() {
    let env = TypeEnvironment::default();
    let e = var(&env, "E");
    let stub = env.stub_type(e);
    assert!(is_subtype_of(&env, stub, env.builtins.int_type));
    assert!(is_subtype_of(&env, env.builtins.string_type, stub));
    assert!(is_subtype_of(
        &env,
        env.mutable_list_of(stub),
        env.mutable_list_of(env.builtins.int_type)
    ));
}

#[test]
fn test_constraint_mode_records_bounds() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let t = var(&env, "T");
    let t_ty = env.variable_type(t);
    let mut sink = RecordingSink::new(vec![t]);
    let mut checker = SubtypeChecker::new(&env);

    assert!(checker.is_subtype(env.list_of(b.int_type), env.list_of(t_ty), &mut sink));
    assert_eq!(sink.bounds, vec![(t, b.int_type, BoundKind::Lower)]);

    sink.bounds.clear();
    assert!(checker.is_subtype(env.mutable_list_of(t_ty), env.mutable_list_of(b.string_type), &mut sink));
    assert_eq!(sink.bounds, vec![(t, b.string_type, BoundKind::Exact)]);

    sink.bounds.clear();
    assert!(checker.is_subtype(env.mutable_list_of(b.int_type), env.mutable_list_of(t_ty), &mut sink));
    assert_eq!(sink.bounds, vec![(t, b.int_type, BoundKind::Exact)]);

    sink.bounds.clear();
    assert!(checker.is_subtype(env.comparable_of(t_ty), env.comparable_of(b.int_type), &mut sink));
    assert_eq!(sink.bounds, vec![(t, b.int_type, BoundKind::Lower)]);
}

#[test]
fn test_foreign_variables_are_rigid() {
    let env = TypeEnvironment::default();
    let t = var(&env, "T");
    let t_ty = env.variable_type(t);
    let mut sink = RecordingSink::new(Vec::new());
    let mut checker = SubtypeChecker::new(&env);
    assert!(!checker.is_subtype(t_ty, env.builtins.int_type, &mut sink));
    assert!(checker.is_subtype(t_ty, t_ty, &mut sink));
    assert!(sink.bounds.is_empty());
}

#[test]
fn test_equal_types() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    assert!(are_equal_types(&env, env.list_of(b.int_type), env.list_of(b.int_type)));
    assert!(!are_equal_types(&env, env.list_of(b.int_type), env.list_of(b.number_type)));
}
