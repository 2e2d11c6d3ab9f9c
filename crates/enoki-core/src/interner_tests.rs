use super::interner::Interner;

#[test]
fn intern_dedupes() {
    let mut interner = Interner::new();
    let a = interner.intern("counter");
    let b = interner.intern("counter");
    let c = interner.intern("total");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(interner.len(), 2);
}

#[test]
fn resolve_round_trips() {
    let mut interner = Interner::new();
    let sym = interner.intern_owned("make_closure".to_string());
    assert_eq!(interner.resolve(sym), "make_closure");
}

#[test]
fn symbols_are_insertion_ordered() {
    let mut interner = Interner::new();
    let first = interner.intern("a");
    let second = interner.intern("b");
    assert!(first < second);

    let names: Vec<&str> = interner.iter().map(|(_, s)| s).collect();
    assert_eq!(names, ["a", "b"]);
}
