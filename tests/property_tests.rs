//! Property tests for conversion round-trips and resolution order.

use bindery::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Vec2 {
    x: f64,
    y: f64,
}

fn numeric_runtime() -> Runtime {
    let mut rt = Runtime::new();
    rt.register_native(Native::function("id_i8", |v: i8| v)).unwrap();
    rt.register_native(Native::function("id_u8", |v: u8| v)).unwrap();
    rt.register_native(Native::function("id_i32", |v: i32| v)).unwrap();
    rt.register_native(Native::function("id_i64", |v: i64| v)).unwrap();
    rt.register_native(Native::function("id_u16", |v: u16| v)).unwrap();
    rt.register_native(Native::function("id_u32", |v: u32| v)).unwrap();
    // u64 has no host form above i64::MAX, so it comes back as i64.
    rt.register_native(Native::function("id_u64", |v: u64| v as i64)).unwrap();
    rt.register_native(Native::function("id_f32", |v: f32| v)).unwrap();
    rt.register_native(Native::function("id_f64", |v: f64| v)).unwrap();
    rt
}

proptest! {
    #[test]
    fn signed_integers_round_trip(a in any::<i8>(), b in any::<i32>(), c in any::<i64>()) {
        let mut rt = numeric_runtime();
        prop_assert_eq!(rt.call_function("id_i8", &[Dynamic::from(a as i64)]).unwrap(), Dynamic::Int(a as i64));
        prop_assert_eq!(rt.call_function("id_i32", &[Dynamic::from(b)]).unwrap(), Dynamic::Int(b as i64));
        prop_assert_eq!(rt.call_function("id_i64", &[Dynamic::from(c)]).unwrap(), Dynamic::Int(c));
    }

    #[test]
    fn unsigned_integers_round_trip(
        a in any::<u16>(),
        b in any::<u32>(),
        c in any::<u8>(),
        d in 0u64..=i64::MAX as u64,
    ) {
        let mut rt = numeric_runtime();
        prop_assert_eq!(rt.call_function("id_u8", &[Dynamic::Int(c as i64)]).unwrap(), Dynamic::Int(c as i64));
        prop_assert_eq!(rt.call_function("id_u64", &[Dynamic::Int(d as i64)]).unwrap(), Dynamic::Int(d as i64));
        prop_assert_eq!(rt.call_function("id_u16", &[Dynamic::Int(a as i64)]).unwrap(), Dynamic::Int(a as i64));
        prop_assert_eq!(rt.call_function("id_u32", &[Dynamic::Int(b as i64)]).unwrap(), Dynamic::Int(b as i64));
    }

    #[test]
    fn out_of_range_integers_are_rejected(v in 128i64..=i64::MAX) {
        let mut rt = numeric_runtime();
        let err = rt.call_function("id_i8", &[Dynamic::Int(v)]).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn floats_round_trip(a in any::<f32>().prop_filter("finite", |f| f.is_finite()), b in any::<f64>()) {
        let mut rt = numeric_runtime();
        prop_assert_eq!(rt.call_function("id_f32", &[Dynamic::Float(a as f64)]).unwrap(), Dynamic::Float(a as f64));
        let back = rt.call_function("id_f64", &[Dynamic::Float(b)]).unwrap();
        match back {
            Dynamic::Float(f) => prop_assert!(f == b || (f.is_nan() && b.is_nan())),
            other => prop_assert!(false, "expected float, got {:?}", other),
        }
    }

    #[test]
    fn objects_round_trip_by_value(x in -1e9f64..1e9, y in -1e9f64..1e9) {
        let mut rt = Runtime::new();
        rt.bind_type::<Vec2>("Vec2").unwrap();
        rt.register_native(Native::function("copy", |v: Val<Vec2>| Owned(v.into_inner()))).unwrap();

        let original = Vec2 { x, y };
        let handle = rt.wrap_owned(original.clone(), false).unwrap();
        let copied = rt.call_function("copy", &[Dynamic::Object(handle)]).unwrap();
        let copied = copied.as_object().unwrap();

        prop_assert_ne!(copied, handle);
        prop_assert_eq!(rt.get::<Vec2>(copied).unwrap(), &original);
    }

    #[test]
    fn ties_follow_registration_order(s in ".*", any_first in any::<bool>()) {
        let mut rt = Runtime::new();
        let any = Native::function("pick", |_v: Dynamic| "any");
        let string = Native::function("pick", |_v: String| "string");
        let expected = if any_first {
            rt.register_native(any).unwrap();
            rt.register_native(string).unwrap();
            "any"
        } else {
            rt.register_native(string).unwrap();
            rt.register_native(any).unwrap();
            "string"
        };
        let picked = rt.call_function("pick", &[Dynamic::from(s)]).unwrap();
        prop_assert_eq!(picked.as_str(), Some(expected));
    }

    #[test]
    fn exact_overload_always_beats_lossy(v in any::<i64>(), int_first in any::<bool>()) {
        let mut rt = Runtime::new();
        let int = Native::function("f", |_x: i64| "int");
        let float = Native::function("f", |_x: f64| "float");
        if int_first {
            rt.register_native(int).unwrap();
            rt.register_native(float).unwrap();
        } else {
            rt.register_native(float).unwrap();
            rt.register_native(int).unwrap();
        }
        let picked = rt.call_function("f", &[Dynamic::Int(v)]).unwrap();
        prop_assert_eq!(picked.as_str(), Some("int"));
    }
}
