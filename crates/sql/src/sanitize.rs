use tessera_error::{ErrorContext, Result, TesseraError};

/// Checks an identifier taken from template structure before it is interpolated.
/// Dotted names (`schema.table`, `alias.column`) are allowed.
pub fn validate_identifier(name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TesseraError::template("Identifier must not be empty."));
    }
    if name.len() > 128 {
        return Err(TesseraError::template(format!(
            "Identifier too long ({} characters): {}",
            name.len(),
            name
        )));
    }
    let forbidden = name
        .chars()
        .any(|c| matches!(c, '\'' | '"' | ';' | '`' | '\\' | '\0') || c.is_whitespace());
    if forbidden || name.contains("--") || name.contains("/*") {
        return Err(
            TesseraError::template(format!("Forbidden characters in identifier: {}", name))
                .with_context(ErrorContext::Template {
                    template_id: None,
                    field: Some(name.to_string()),
                }),
        );
    }
    Ok(())
}

/// Checks a condition field: a plain column or `alias.column`, each part a bare identifier.
pub fn validate_column_reference(field: &str) -> Result<()> {
    validate_identifier(field)?;
    let field = field.trim();
    let parts: Vec<&str> = field.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|part| is_bare_identifier(part)) {
        return Err(not_a_column(field));
    }
    Ok(())
}

/// Checks a HAVING field: a column reference, or one aggregate call over a column
/// reference or `*`, such as `COUNT(*)` or `sum(o.total)`.
pub fn validate_having_expression(field: &str) -> Result<()> {
    validate_identifier(field)?;
    let field = field.trim();
    let Some((function, rest)) = field.split_once('(') else {
        return validate_column_reference(field);
    };
    let argument = rest.strip_suffix(')').ok_or_else(|| not_a_column(field))?;
    if !is_bare_identifier(function) {
        return Err(not_a_column(field));
    }
    if argument == "*" {
        return Ok(());
    }
    validate_column_reference(argument).map_err(|_| not_a_column(field))
}

fn is_bare_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn not_a_column(field: &str) -> TesseraError {
    TesseraError::template(format!("Not a column reference: {}", field)).with_context(
        ErrorContext::Template {
            template_id: None,
            field: Some(field.to_string()),
        },
    )
}

/// Lower-cased column name with any table qualifier removed, as used for metadata lookups.
pub fn column_key(field: &str) -> String {
    let field = field.trim();
    field
        .rsplit('.')
        .next()
        .unwrap_or(field)
        .to_lowercase()
}
