use serde_json::Value;
use tessera_error::{ErrorCode, ErrorContext, TesseraError};

#[test]
fn test_json_serialization() {
    let error = TesseraError::invalid_column(
        "totl",
        "orders",
        "GROUP BY",
        vec!["total".to_string(), "status".to_string()],
    );

    let json = error.to_json();
    println!("JSON: {}", json);

    let v: Value = serde_json::from_str(&json).expect("valid json");

    assert_eq!(v["code"], "TESSERA-2002");
    assert_eq!(v["hint"], "Did you mean 'total'?");
    assert_eq!(v["context"]["type"], "invalid_column");
    assert_eq!(v["context"]["column"], "totl");
    assert_eq!(v["context"]["clause"], "GROUP BY");
}

#[test]
fn test_cast_context_serialization() {
    let error = TesseraError::cast("2024-13-45", "DATE", "input is out of range");
    let v: Value = serde_json::from_str(&error.to_json()).expect("valid json");

    assert_eq!(v["code"], "TESSERA-2003");
    assert_eq!(v["context"]["type"], "cast");
    assert_eq!(v["context"]["sql_type"], "DATE");
}

#[test]
fn test_shard_context_roundtrip() {
    let error = TesseraError::new(ErrorCode::ShardUnavailable, "connection refused")
        .with_context(ErrorContext::Shard {
            host: "127.0.0.1".to_string(),
            port: 9091,
        });

    let back = TesseraError::from_json(&error.to_json()).expect("parses");
    assert!(back.is_transport());
    match back.context {
        Some(ErrorContext::Shard { port, .. }) => assert_eq!(port, 9091),
        other => panic!("unexpected context: {:?}", other),
    }
}

#[test]
fn test_error_code_parsing() {
    let code: ErrorCode = "TESSERA-1004".to_string().try_into().unwrap();
    assert_eq!(code, ErrorCode::PoolExhausted);
}
