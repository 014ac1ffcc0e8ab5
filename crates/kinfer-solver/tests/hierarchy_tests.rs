use super::*;
use crate::env::ClassKind;
use crate::types::Variance;

#[test]
fn test_corresponding_supertype_instantiates_through_chain() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let args = [TypeArg::invariant(b.string_type)];
    let found = corresponding_supertype(&env, b.mutable_list, &args, b.collection);
    assert_eq!(found, Some(vec![TypeArg::invariant(b.string_type)]));
    assert_eq!(corresponding_supertype(&env, b.list, &args, b.mutable_list), None);
}

#[test]
fn test_supertype_classes_are_reflexive_and_transitive() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let classes = supertype_classes(&env, b.int);
    assert_eq!(classes.first(), Some(&b.int));
    assert!(classes.contains(&b.number));
    assert!(classes.contains(&b.comparable));
    assert!(is_subclass(&env, b.mutable_list, b.collection));
    assert!(!is_subclass(&env, b.collection, b.list));
}

#[test]
fn test_integer_literal_supertypes_cover_all_candidates() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let literal = env.interner.integer_literal(5);
    let classes = supertype_classes_of_type(&env, literal);
    for class in [b.int, b.long, b.byte, b.short, b.number] {
        assert!(classes.contains(&class));
    }
    let comparable = supertype_instance(&env, literal, b.comparable);
    assert_eq!(comparable, Some(vec![TypeArg::invariant(b.int_type)]));
}

#[test]
fn test_cyclic_declarations_terminate() {
    let env = TypeEnvironment::default();
    let a = env.declare_class("A", ClassKind::Interface, &[]).unwrap();
    let c = env
        .declare_class("C", ClassKind::Interface, &[("T", Variance::Invariant)])
        .unwrap();
    let a_ty = env.class_type(a, Vec::new()).unwrap();
    let c_of_a = env.class_type(c, vec![TypeArg::invariant(a_ty)]).unwrap();
    env.add_supertype(a, c_of_a).unwrap();
    let c_of_param = env
        .class_type(c, vec![TypeArg::invariant(env.param(c, 0))])
        .unwrap();
    env.add_supertype(c, c_of_param).unwrap();

    assert_eq!(corresponding_supertype(&env, a, &[], env.builtins.list), None);
    assert!(supertype_classes(&env, a).contains(&c));
}
