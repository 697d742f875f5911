use chrono::NaiveDate;
use proptest::prelude::*;
use tessera_sql::caster::cast;
use tessera_sql::{SqlType, SqlValue};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_integer_round_trip(n in any::<i32>()) {
        prop_assert_eq!(cast(Some(&n.to_string()), &SqlType::Integer).unwrap(), SqlValue::Int(n));
    }

    #[test]
    fn test_bigint_round_trip(n in any::<i64>()) {
        prop_assert_eq!(cast(Some(&n.to_string()), &SqlType::BigInt).unwrap(), SqlValue::BigInt(n));
    }

    #[test]
    fn test_date_round_trip(days in 0i64..80_000) {
        let date = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap() + chrono::Duration::days(days);
        let text = date.format("%Y-%m-%d").to_string();
        prop_assert_eq!(cast(Some(&text), &SqlType::Date).unwrap(), SqlValue::Date(date));
    }

    #[test]
    fn test_alphabetic_text_never_casts_to_integer(s in "[a-zA-Z]{1,12}") {
        let err = cast(Some(&s), &SqlType::Integer).unwrap_err();
        prop_assert_eq!(err.code, tessera_error::ErrorCode::CastError);
    }

    #[test]
    fn test_text_passthrough_is_trimmed(s in "[a-z0-9 ]{0,16}") {
        let padded = format!("  {}  ", s);
        let expected = if s.trim().is_empty() {
            SqlValue::Null
        } else {
            SqlValue::Text(s.trim().to_string())
        };
        prop_assert_eq!(cast(Some(&padded), &SqlType::Text).unwrap(), expected);
    }
}

#[test]
fn test_documented_round_trips() {
    assert_eq!(
        cast(Some("2024-04-09"), &SqlType::Date).unwrap(),
        SqlValue::Date("2024-04-09".parse().unwrap())
    );
    assert_eq!(cast(Some("true"), &SqlType::Boolean).unwrap(), SqlValue::Bool(true));
    assert_eq!(cast(Some("1"), &SqlType::Boolean).unwrap(), SqlValue::Bool(true));
    assert!(cast(Some("abc"), &SqlType::Integer).is_err());
}
