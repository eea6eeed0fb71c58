//! CLI functionality for the onto tool
//!
//! This module contains the command implementations behind the `onto`
//! binary:
//! - Chain resolution
//! - Mapping generation
//! - Hierarchy building
//! - Output formatting

pub mod map;
pub mod output;
pub mod resolve;
pub mod tree;
