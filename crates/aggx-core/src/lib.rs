//! # aggx-core: Physical Aggregation Planning
//!
//! This crate implements the physical-aggregation layer of a Cascades-style cost-based
//! optimizer: the streaming aggregate plan node, the properties it requires and
//! provides, its cost, and its conversion into an executable operator description.
//!
//! ## Module Overview
//!
//! - **`expr`**: Schemas, group sets, aggregate calls and operator phases.
//! - **`properties`**: Physical properties (collation, distribution, row encoding).
//! - **`plan`**: The physical plan node enum and the scan / sort nodes.
//! - **`stream_agg`**: The streaming aggregate node.
//! - **`cost`**: Cost value, cost model trait and the default cost model.
//! - **`stats`**: Statistics and row-count estimation.
//! - **`settings`**: Cost unit constants and costing switches.
//! - **`visitor`**: Double-dispatch visitor protocol and the generic passes built on it.
//! - **`operator`**: Executable operator descriptors and the build context.
//! - **`rule`**: Logical aggregate input, rule trait and rule registry.
//! - **`search`**: Picking the cheapest alternative that satisfies a requirement.
//! - **`error`**: Construction and pass errors.

pub mod cost;
pub mod error;
pub mod expr;
pub mod operator;
pub mod plan;
pub mod properties;
pub mod rule;
pub mod search;
pub mod settings;
pub mod stats;
pub mod stream_agg;
pub mod visitor;
