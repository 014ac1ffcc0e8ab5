use super::*;
use crate::env::VariableOrigin;

fn var(env: &TypeEnvironment, name: &str) -> TypeVarId {
    env.new_type_variable(name, VariableOrigin::Synthetic, VariableAnnotations::empty())
}

fn strong(var: TypeVarId, ty: TypeId, kind: BoundKind) -> Bound {
    Bound::new(var, ty, kind, ConstraintPosition::Argument { call: CallId(0) }, true)
}

#[test]
fn test_chain_rank_and_reverse() {
    assert!(BoundKind::Lower.chain_rank() < BoundKind::Exact.chain_rank());
    assert!(BoundKind::Exact.chain_rank() < BoundKind::Upper.chain_rank());
    assert_eq!(BoundKind::Lower.reverse(), BoundKind::Upper);
    assert_eq!(BoundKind::Exact.reverse(), BoundKind::Exact);
}

#[test]
fn test_position_strength() {
    let t = TypeVarId(0);
    let weak = ConstraintPosition::DeclaredUpperBound { var: t };
    assert!(!weak.is_strong());
    assert!(ConstraintPosition::ExpectedType.is_strong());
    assert!(ConstraintPosition::Compound(Box::new(weak.clone()), Box::new(ConstraintPosition::ExpectedType)).is_strong());
    let substituted = ConstraintPosition::BuilderInferenceSubstitution {
        initial: Box::new(weak),
        is_from_not_substituted_declared_upper_bound: true,
    };
    assert!(!substituted.is_strong());
    assert!(substituted.is_from_builder_inference());
    assert_eq!(
        ConstraintPosition::Compound(
            Box::new(ConstraintPosition::ExpectedType),
            Box::new(ConstraintPosition::Argument { call: CallId(7) })
        )
        .call(),
        Some(CallId(7))
    );
}

#[test]
fn test_exact_bound_wins_over_upper() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let t = var(&env, "T");
    let mut bounds = TypeBounds::new(t);
    bounds.add_bound(strong(t, b.int_type, BoundKind::Exact));
    bounds.add_bound(strong(t, b.number_type, BoundKind::Upper));
    assert_eq!(bounds.values(&env), &[b.int_type]);
    assert_eq!(bounds.value(&env), Some(b.int_type));
}

#[test]
fn test_integer_literal_defaults_to_int() {
    let env = TypeEnvironment::default();
    let t = var(&env, "T");
    let mut bounds = TypeBounds::new(t);
    bounds.add_bound(strong(t, env.interner.integer_literal(5), BoundKind::Lower));
    assert_eq!(bounds.values(&env), &[env.builtins.int_type]);
}

#[test]
fn test_large_literal_defaults_to_long() {
    let env = TypeEnvironment::default();
    let t = var(&env, "T");
    let mut bounds = TypeBounds::new(t);
    let big = env.interner.integer_literal(i64::from(i32::MAX) + 1);
    bounds.add_bound(strong(t, big, BoundKind::Lower));
    assert_eq!(bounds.values(&env), &[env.builtins.long_type]);
}

#[test]
fn test_lower_bounds_use_common_supertype() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let t = var(&env, "T");
    let mut bounds = TypeBounds::new(t);
    bounds.add_bound(strong(t, b.int_type, BoundKind::Lower));
    bounds.add_bound(strong(t, b.long_type, BoundKind::Lower));
    let expected = common_supertype(&env, &[b.int_type, b.long_type]);
    // Number & Comparable<*> is not denotable: it is reported, not accepted.
    assert!(!env.is_denotable(expected));
    assert_eq!(bounds.values(&env), &[expected]);

    let mut bounds = TypeBounds::new(t);
    bounds.add_bound(strong(t, b.int_type, BoundKind::Lower));
    bounds.add_bound(strong(t, b.number_type, BoundKind::Lower));
    assert_eq!(bounds.values(&env), &[b.number_type]);
}

#[test]
fn test_general_and_numeric_lower_bounds_combine() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let t = var(&env, "T");
    let mut bounds = TypeBounds::new(t);
    bounds.add_bound(strong(t, b.number_type, BoundKind::Lower));
    bounds.add_bound(strong(t, env.interner.integer_literal(1), BoundKind::Lower));
    assert_eq!(bounds.values(&env), &[b.number_type]);
}

#[test]
fn test_upper_bound_alone_solves() {
    let env = TypeEnvironment::default();
    let t = var(&env, "T");
    let mut bounds = TypeBounds::new(t);
    bounds.add_bound(strong(t, env.builtins.char_sequence_type, BoundKind::Upper));
    assert_eq!(bounds.values(&env), &[env.builtins.char_sequence_type]);
}

#[test]
fn test_weak_bounds_alone_give_nothing() {
    let env = TypeEnvironment::default();
    let t = var(&env, "T");
    let mut bounds = TypeBounds::new(t);
    bounds.add_bound(Bound::new(
        t,
        env.builtins.number_type,
        BoundKind::Upper,
        ConstraintPosition::DeclaredUpperBound { var: t },
        true,
    ));
    assert!(bounds.values(&env).is_empty());
}

#[test]
fn test_improper_bounds_are_ignored() {
    let env = TypeEnvironment::default();
    let t = var(&env, "T");
    let u = var(&env, "U");
    let mut bounds = TypeBounds::new(t);
    bounds.add_bound(Bound::new(
        t,
        env.list_of(env.variable_type(u)),
        BoundKind::Lower,
        ConstraintPosition::ExpectedType,
        false,
    ));
    assert!(bounds.values(&env).is_empty());

    bounds.add_bound(strong(t, env.builtins.string_type, BoundKind::Lower));
    assert_eq!(bounds.values(&env), &[env.builtins.string_type]);
}

#[test]
fn test_conflicting_bounds_report_every_candidate() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let t = var(&env, "T");
    let mut bounds = TypeBounds::new(t);
    bounds.add_bound(strong(t, b.string_type, BoundKind::Lower));
    bounds.add_bound(strong(t, b.int_type, BoundKind::Upper));
    assert_eq!(bounds.values(&env), &[b.string_type, b.int_type]);
    assert_eq!(bounds.value(&env), None);
}

#[test]
fn test_only_input_types_rejects_unmentioned_supertype() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let t = env.new_type_variable("T", VariableOrigin::Synthetic, VariableAnnotations::ONLY_INPUT_TYPES);
    let mut bounds = TypeBounds::new(t);
    bounds.add_bound(strong(t, b.int_type, BoundKind::Lower));
    bounds.add_bound(strong(t, b.string_type, BoundKind::Lower));
    assert!(bounds.values(&env).is_empty());

    let mut bounds = TypeBounds::new(t);
    bounds.add_bound(strong(t, b.int_type, BoundKind::Lower));
    bounds.add_bound(strong(t, b.number_type, BoundKind::Lower));
    assert_eq!(bounds.values(&env), &[b.number_type]);
}

#[test]
fn test_only_input_types_accepts_literal_default() {
    let env = TypeEnvironment::default();
    let t = env.new_type_variable("T", VariableOrigin::Synthetic, VariableAnnotations::ONLY_INPUT_TYPES);
    let mut bounds = TypeBounds::new(t);
    bounds.add_bound(strong(t, env.interner.integer_literal(3), BoundKind::Lower));
    assert_eq!(bounds.values(&env), &[env.builtins.int_type]);
}

#[test]
fn test_duplicate_evidence_is_not_appended() {
    let env = TypeEnvironment::default();
    let t = var(&env, "T");
    let mut bounds = TypeBounds::new(t);
    assert!(bounds.add_bound(strong(t, env.builtins.int_type, BoundKind::Lower)));
    let other_call = Bound::new(
        t,
        env.builtins.int_type,
        BoundKind::Lower,
        ConstraintPosition::Receiver { call: CallId(3) },
        true,
    );
    assert!(!bounds.add_bound(other_call));
    assert_eq!(bounds.len(), 1);
}

#[test]
fn test_values_are_recomputed_after_append() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let t = var(&env, "T");
    let mut bounds = TypeBounds::new(t);
    bounds.add_bound(strong(t, b.int_type, BoundKind::Lower));
    assert_eq!(bounds.values(&env), &[b.int_type]);
    bounds.add_bound(strong(t, b.number_type, BoundKind::Lower));
    assert_eq!(bounds.values(&env), &[b.number_type]);
}

#[test]
fn test_values_are_deterministic() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let t = var(&env, "T");
    let mut first = TypeBounds::new(t);
    for ty in [b.string_type, b.int_type, b.long_type] {
        first.add_bound(strong(t, ty, BoundKind::Lower));
    }
    let mut second = first.clone();
    assert_eq!(first.values(&env), second.values(&env));
    assert_eq!(first.compute_values(&env), first.compute_values(&env));
}

#[test]
fn test_filter_keeps_matching_positions() {
    let env = TypeEnvironment::default();
    let t = var(&env, "T");
    let mut bounds = TypeBounds::new(t);
    bounds.add_bound(strong(t, env.builtins.int_type, BoundKind::Lower));
    bounds.add_bound(Bound::new(
        t,
        env.builtins.string_type,
        BoundKind::Lower,
        ConstraintPosition::BuilderInference,
        true,
    ));
    let filtered = bounds.filter(|position| !position.is_from_builder_inference());
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered.bounds()[0].constraining_type, env.builtins.int_type);
}

#[test]
#[should_panic(expected = "added to the bounds of")]
fn test_bound_for_another_variable_panics() {
    let env = TypeEnvironment::default();
    let t = var(&env, "T");
    let u = var(&env, "U");
    let mut bounds = TypeBounds::new(t);
    bounds.add_bound(strong(u, env.builtins.int_type, BoundKind::Lower));
}

#[test]
#[should_panic(expected = "fixed type variable")]
fn test_bound_on_fixed_variable_panics() {
    let env = TypeEnvironment::default();
    let t = var(&env, "T");
    let mut bounds = TypeBounds::new(t);
    bounds.mark_fixed();
    bounds.add_bound(strong(t, env.builtins.int_type, BoundKind::Lower));
}
