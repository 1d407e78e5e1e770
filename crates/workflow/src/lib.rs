// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hive-workflow: workflow definitions and everything needed to read them.
//!
//! Definitions arrive as JSON payloads or HCL files; both deserialize into
//! the same types. Loading always validates: structure (sentinels,
//! acyclicity, node rules) and every edge condition's syntax. A definition
//! that loads is safe for the conductor to walk.

pub mod condition;
pub mod error;
pub mod load;
pub mod template;
pub mod types;
pub mod validate;

pub use condition::{eval_condition, parse_condition, Condition};
pub use error::WorkflowError;
pub use load::{from_hcl_str, from_value, load_file};
pub use template::render;
pub use types::{EdgeDef, NodeConfig, NodeDef, RoleDef, WorkflowDef, END, START};
pub use validate::validate_workflow;
