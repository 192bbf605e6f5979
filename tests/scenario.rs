use gcptr::{Extent, GcError, Handle, Registry};

#[test]
fn test_scalar_reassignment_frees_old_value() {
    let registry = Registry::new();
    let mut p = Handle::new_in(&registry, 19);
    assert_eq!(*p.get().unwrap(), 19);
    let first = p.as_ptr();

    p.assign_box(Box::new(21));
    assert_eq!(*p.get().unwrap(), 21);

    // The 19-storage was swept as soon as its count dropped to zero
    let dump = registry.dump();
    assert!(!dump.contains(first));
    assert_eq!(dump.len(), 1);
    assert!(!registry.sweep());

    p.assign_box(Box::new(28));
    assert_eq!(*p.get().unwrap(), 28);
    assert_eq!(registry.size(), 1);
}

#[test]
fn test_scripted_handle_sequence() {
    let ints = Registry::new();

    let mut p = Handle::new_in(&ints, 19);
    p.assign_box(Box::new(21));
    p.assign_box(Box::new(28));

    let q = Handle::new_in(&ints, 13);
    assert_eq!(*q.get().unwrap(), 13);
    p.assign(&q);
    assert!(p == q);
    assert_eq!(p.get().unwrap(), q.get().unwrap());
    assert_eq!(ints.size(), 1);

    let mut r = Handle::null_in(&ints);
    p.assign(&r);
    assert!(p.as_ptr().is_null());

    r.assign(&q);
    assert_eq!(*r.get().unwrap(), 13);

    r.clear();
    assert!(r.as_ptr().is_null());

    r.assign_box(Box::new(129));
    assert_eq!(*r.get().unwrap(), 129);
    r.assign_box(Box::new(225));
    assert_eq!(*r.get().unwrap(), 225);
    assert_eq!(ints.size(), 2);

    let unsigned = Registry::new();
    let x: Handle<u32> = Handle::null_in(&unsigned);
    assert!(x.as_ptr().is_null());

    let mut z = Handle::new_in(&unsigned, 33u32);
    assert_eq!(*z.get().unwrap(), 33);
    z.assign(&x);
    assert!(z.as_ptr().is_null());
    assert!(unsigned.is_empty());

    let mut array = Handle::null_in(&unsigned);
    assert!(array.as_ptr().is_null());
    array.assign_vec((1..=13).collect());
    assert!(!array.as_ptr().is_null());

    let values: Vec<u32> = array.begin().copied().collect();
    assert_eq!(values, (1..=13).collect::<Vec<_>>());

    for i in 0..13 {
        assert_eq!(unsafe { *array.get_unchecked(i) }, i as u32 + 1);
    }

    let cursor = array.begin();
    for i in 0..13 {
        assert_eq!(*cursor.at(i).unwrap(), i as u32 + 1);
    }
    assert!(matches!(cursor.at(13), Err(GcError::OutOfBounds { .. })));
}

#[test]
fn test_array_extent_and_bounds() {
    let registry = Registry::new();
    let handle = Handle::from_vec_in(&registry, (1..=13u32).collect());

    assert_eq!(handle.extent(), Extent::Array(13));
    assert_eq!(unsafe { *handle.get_unchecked(12) }, 13);

    let mut end = handle.end();
    assert_eq!(end.offset(), 13);
    assert!(end.advance().is_err());
    assert_eq!(handle.begin().at(12).ok(), Some(&13));
    assert!(handle.begin().at(13).is_err());
}

#[test]
fn test_peer_reassignment_to_held_address() {
    let registry = Registry::new();
    let a = Handle::new_in(&registry, 7i64);
    let mut b = a.clone();
    assert_eq!(a.refcount(), Some(2));

    b.assign(&a);
    assert_eq!(a.refcount(), Some(3));
}

#[test]
fn test_last_release_is_swept() {
    let registry = Registry::new();
    let mut handle = Handle::new_in(&registry, String::from("a"));
    let address = handle.as_ptr();

    let ptr = Box::into_raw(Box::new(String::from("b")));
    unsafe { handle.assign_raw(ptr, Extent::Scalar) };

    assert!(registry.find(address).is_none());
    assert_eq!(handle.get().unwrap(), "b");
}

#[test]
fn test_global_registry_lifecycle() {
    #[derive(Debug, PartialEq)]
    struct Sample(u32);

    let p = Handle::new(Sample(1));
    let q = p.clone();
    assert_eq!(Registry::<Sample>::global().size(), 1);
    assert_eq!(p.refcount(), Some(2));

    drop(p);
    assert_eq!(q.get().unwrap(), &Sample(1));
    drop(q);
    assert!(Registry::<Sample>::global().is_empty());

    let empty: Handle<Sample> = Handle::default();
    assert_eq!(empty.get().unwrap_err(), GcError::InvalidDereference);
}
