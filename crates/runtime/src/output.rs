use serde_json::{json, Value};
use tessera_connectors::Row;

/// What one strategy execution produced.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Rows(Vec<Row>),
    Inserted(u64),
    /// Rows read back by RETURNING or its emulation.
    Returning(Vec<Row>),
    Updated(u64),
    Deleted(u64),
    DdlExecuted,
}

impl QueryOutput {
    /// The JSON shape callers see: a bare array for row results, otherwise a
    /// single-key object such as `{"rowsUpdated": 3}`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Rows(rows) => Value::Array(rows.iter().cloned().map(Value::Object).collect()),
            Self::Inserted(n) => json!({ "rowsInserted": n }),
            Self::Returning(rows) => json!({ "returning": rows }),
            Self::Updated(n) => json!({ "rowsUpdated": n }),
            Self::Deleted(n) => json!({ "rowsDeleted": n }),
            Self::DdlExecuted => json!({ "ddlExecuted": true }),
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            Self::Rows(rows) | Self::Returning(rows) => rows.len(),
            Self::Inserted(n) | Self::Updated(n) | Self::Deleted(n) => *n as usize,
            Self::DdlExecuted => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shapes() {
        let mut row = Row::new();
        row.insert("id".into(), json!(7));

        assert_eq!(QueryOutput::Rows(vec![row.clone()]).to_json(), json!([{"id": 7}]));
        assert_eq!(
            QueryOutput::Returning(vec![row]).to_json(),
            json!({"returning": [{"id": 7}]})
        );
        assert_eq!(QueryOutput::Updated(3).to_json(), json!({"rowsUpdated": 3}));
        assert_eq!(QueryOutput::DdlExecuted.to_json(), json!({"ddlExecuted": true}));
    }
}
