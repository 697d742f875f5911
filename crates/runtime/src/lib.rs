//! Tessera runtime: everything an execution shard runs.
//!
//! - **Templates**: read-only template cache over the template store (`templates`).
//! - **Strategies**: one execution path per statement kind (`strategy`).
//! - **Shard**: pools, metadata and strategies behind `RunQuery` / `GetTableSchema` (`shard`).
//! - **Consumer**: cache maintenance driven by store change events (`consumer`).
pub mod consumer;
pub mod output;
pub mod shard;
pub mod strategy;
pub mod templates;

pub use consumer::{ChangeConsumer, ConsumerHandle};
pub use output::QueryOutput;
pub use shard::ShardEngine;
pub use strategy::{tables_for, Strategy, StrategySet};
pub use templates::TemplateCache;
