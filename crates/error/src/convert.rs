use crate::{ErrorCode, ErrorContext, TesseraError};

impl From<std::io::Error> for TesseraError {
    fn from(err: std::io::Error) -> Self {
        TesseraError::new(ErrorCode::InternalPanic, err.to_string())
    }
}

impl From<serde_json::Error> for TesseraError {
    fn from(err: serde_json::Error) -> Self {
        TesseraError::new(ErrorCode::SerializationFailed, err.to_string())
    }
}

impl From<serde_yaml::Error> for TesseraError {
    fn from(err: serde_yaml::Error) -> Self {
        TesseraError::new(ErrorCode::InvalidYaml, err.to_string())
    }
}

impl TesseraError {
    /// A column referenced by the template is not part of the table metadata.
    ///
    /// Attaches the known columns and, when one is close enough, a "Did you mean" hint.
    pub fn invalid_column(
        column: &str,
        table: &str,
        clause: &str,
        available: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut available: Vec<String> = available.into_iter().collect();
        available.sort();
        let hint = find_closest_match(&column.to_lowercase(), &available);

        let mut error = TesseraError::new(
            ErrorCode::InvalidColumn,
            format!(
                "Invalid column in {} clause: '{}' not found in table '{}'",
                clause, column, table
            ),
        )
        .with_context(ErrorContext::InvalidColumn {
            column: column.to_string(),
            table: table.to_string(),
            clause: clause.to_string(),
            available_columns: available,
        });

        if let Some(closest) = hint {
            error = error.with_hint(format!("Did you mean '{}'?", closest));
        }
        error
    }

    /// A text value could not be coerced to the target SQL type.
    pub fn cast(value: &str, sql_type: &str, reason: impl std::fmt::Display) -> Self {
        TesseraError::new(
            ErrorCode::CastError,
            format!(
                "Failed to cast value '{}' for SQL type {}: {}",
                value, sql_type, reason
            ),
        )
        .with_context(ErrorContext::Cast {
            value: value.to_string(),
            sql_type: sql_type.to_string(),
        })
    }

    pub fn template(message: impl Into<String>) -> Self {
        TesseraError::new(ErrorCode::TemplateError, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        TesseraError::new(ErrorCode::UnsupportedOperation, message)
    }

    pub fn config_not_found(config_id: &str) -> Self {
        TesseraError::new(
            ErrorCode::ConfigNotFound,
            format!("Database config not found: {}", config_id),
        )
        .with_context(ErrorContext::Connection {
            config_id: config_id.to_string(),
            provider: None,
            host: None,
        })
    }

    pub fn template_not_found(template_id: &str) -> Self {
        TesseraError::new(
            ErrorCode::TemplateNotFound,
            format!("Query template not found: {}", template_id),
        )
        .with_context(ErrorContext::Template {
            template_id: Some(template_id.to_string()),
            field: None,
        })
    }
}

fn find_closest_match(target: &str, options: &[String]) -> Option<String> {
    let mut best_match: Option<&str> = None;
    let mut min_distance = usize::MAX;

    for option in options {
        let distance = levenshtein(target, option);
        if distance < min_distance && distance <= 3 {
            min_distance = distance;
            best_match = Some(option.as_str());
        }
    }

    best_match.map(|s| s.to_string())
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
