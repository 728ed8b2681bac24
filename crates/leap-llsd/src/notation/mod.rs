//! LLSD notation, the text-like serialization carried inside each frame.
//!
//! Output is deterministic: map keys are written in insertion order and
//! strings always use single quotes. The parser accepts every spelling the
//! host may produce (double-quoted and sized strings, `b16`/`b(N)` binary,
//! alternate boolean spellings, whitespace between tokens).

mod format;
mod parse;

pub use format::{to_notation, write_notation};
pub use parse::{from_notation, MAX_DEPTH};

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use uuid::Uuid;

    use super::*;
    use crate::value::{Map, Value};

    fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Undefined),
            any::<bool>().prop_map(Value::Boolean),
            any::<i64>().prop_map(Value::Integer),
            any::<f64>()
                .prop_filter("NaN never compares equal", |r| !r.is_nan())
                .prop_map(Value::Real),
            any::<String>().prop_map(Value::String),
            any::<u128>().prop_map(|n| Value::Uuid(Uuid::from_u128(n))),
            (0i64..4_102_444_800, 0u32..1_000_000)
                .prop_map(|(secs, micros)| Value::Date(
                    Utc.timestamp_opt(secs, micros * 1_000).unwrap()
                )),
            "[a-z:/.?=&\"'\\\\]{0,24}".prop_map(Value::Uri),
            proptest::collection::vec(any::<u8>(), 0..48).prop_map(Value::Binary),
        ]
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        arb_scalar().prop_recursive(4, 48, 6, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                proptest::collection::vec((any::<String>(), inner), 0..6)
                    .prop_map(|pairs| Value::Map(pairs.into_iter().collect::<Map>())),
            ]
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn decode_inverts_encode(value in arb_value()) {
            let encoded = to_notation(&value);
            let decoded = from_notation(&encoded).unwrap();
            prop_assert_eq!(decoded, value);
        }

        #[test]
        fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
            let _ = from_notation(&bytes);
        }
    }

    #[test]
    fn encode_is_deterministic() {
        let value: Value = [
            ("command", Value::from("set")),
            ("args", [("x", Value::from(1.25))].into_iter().collect()),
        ]
        .into_iter()
        .collect();
        assert_eq!(to_notation(&value), to_notation(&value.clone()));
        assert_eq!(
            to_notation(&value),
            b"{'command':'set','args':{'x':r1.25}}".to_vec()
        );
    }
}
