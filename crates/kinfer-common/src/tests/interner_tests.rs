use super::*;

#[test]
fn test_intern_deduplicates() {
    let interner = Interner::new();
    let a = interner.intern("MutableList");
    let b = interner.intern("MutableList");
    assert_eq!(a, b);
    assert_eq!(&*interner.resolve(a), "MutableList");
}

#[test]
fn test_empty_string_is_none_atom() {
    let interner = Interner::new();
    assert_eq!(interner.intern(""), Atom::NONE);
    assert!(interner.is_empty());
}

#[test]
fn test_resolve_out_of_range_is_empty() {
    let interner = Interner::new();
    assert_eq!(&*interner.resolve(Atom(999)), "");
    assert!(interner.try_resolve(Atom(999)).is_none());
}

#[test]
fn test_intern_common_is_idempotent() {
    let interner = Interner::new();
    interner.intern_common();
    let len = interner.len();
    interner.intern_common();
    assert_eq!(interner.len(), len);
    assert!(!interner.is_empty());
}
