//! SQL assembly for Tessera.
//!
//! Turns a [`QueryTemplate`](tessera_common::models::QueryTemplate) plus live column types
//! into a parameter-bound statement for one provider:
//! - **Dialects**: per-provider clause support, placeholders and pagination (`dialect`).
//! - **Casting**: text and JSON values to typed bind values (`caster`, `types`).
//! - **Statements**: named parameters with positional rendering (`statement`).
//! - **Builders**: SELECT, INSERT, UPDATE, DELETE and CREATE assembly (`builder`).
pub mod builder;
pub mod caster;
pub mod dialect;
pub mod sanitize;
pub mod statement;
pub mod types;

pub use builder::SqlBuilder;
pub use statement::BoundStatement;
pub use types::{ColumnTypeMap, SchemaSnapshot, SqlType, SqlValue};
