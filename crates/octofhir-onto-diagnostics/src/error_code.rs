//! Error codes following a structured numbering system
//!
//! Error code ranges:
//! - ONTO0001-ONTO0099: Chain parse errors
//! - ONTO0100-ONTO0199: Element resolution errors
//! - ONTO0200-ONTO0299: Cardinality, emission and mapping errors
//! - ONTO0300-ONTO0399: Hierarchy and terminology errors
//! - ONTO0400-ONTO0499: System errors (I/O, configuration)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Error code identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(u16);

impl ErrorCode {
    /// Create a new error code
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Get the numeric code
    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Get error information for this code
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_INFO.get(&self.0).unwrap_or(&UNKNOWN_ERROR)
    }

    /// Check if this is a chain parse error (0001-0099)
    pub const fn is_chain_error(&self) -> bool {
        self.0 >= 1 && self.0 < 100
    }

    /// Check if this is a resolution error (0100-0199)
    pub const fn is_resolution_error(&self) -> bool {
        self.0 >= 100 && self.0 < 200
    }

    /// Check if this is a mapping error (0200-0299)
    pub const fn is_mapping_error(&self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Check if this is a hierarchy error (0300-0399)
    pub const fn is_hierarchy_error(&self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Check if this is a system error (0400-0499)
    pub const fn is_system_error(&self) -> bool {
        self.0 >= 400 && self.0 < 500
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ONTO{:04}", self.0)
    }
}

/// Information about an error code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Short description of the error
    pub description: &'static str,
    /// Detailed help text
    pub help: Option<&'static str>,
}

impl ErrorInfo {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            help: None,
        }
    }

    const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

static UNKNOWN_ERROR: ErrorInfo = ErrorInfo::new("Unknown error");

static ERROR_INFO: LazyLock<HashMap<u16, ErrorInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Chain parse errors (0001-0099)
    map.insert(1, ErrorInfo::new("Empty element chain"));
    map.insert(2, ErrorInfo::new("Missing closing parenthesis"));
    map.insert(3, ErrorInfo::new("Unexpected closing parenthesis"));

    // Resolution errors (0100-0199)
    map.insert(100, ErrorInfo::new("Unresolvable element")
        .with_help("Element ids must match the snapshot element id exactly, including slice names"));
    map.insert(101, ErrorInfo::new("Ambiguous reference profile")
        .with_help("Restrict the reference to a single target profile"));
    map.insert(102, ErrorInfo::new("Missing extension definition")
        .with_help("Add the extension snapshot to the module or to a dependency module"));
    map.insert(103, ErrorInfo::new("Resolution depth exceeded")
        .with_help("Check for extensions or references that point back to themselves"));
    map.insert(104, ErrorInfo::new("No matching profile for reference target"));
    map.insert(105, ErrorInfo::new("Invalid element id"));
    map.insert(106, ErrorInfo::new("Extension must declare exactly one profile"));

    // Cardinality, emission and mapping errors (0200-0299)
    map.insert(200, ErrorInfo::new("Orphan element"));
    map.insert(201, ErrorInfo::new("Unsupported type overlap"));
    map.insert(202, ErrorInfo::new("Unsupported element type"));
    map.insert(203, ErrorInfo::new("Missing base path"));
    map.insert(204, ErrorInfo::new("Composite attribute arity"));
    map.insert(205, ErrorInfo::new("Search parameter not found"));
    map.insert(206, ErrorInfo::new("Search parameters not chainable"));
    map.insert(207, ErrorInfo::new("Invalid querying metadata"));
    map.insert(208, ErrorInfo::new("Missing term codes")
        .with_help("Provide term_codes explicitly or fix a pattern/binding on the defining element"));

    // Hierarchy errors (0300-0399)
    map.insert(300, ErrorInfo::new("Unsupported multi-group closure"));
    map.insert(301, ErrorInfo::new("Multiple code system versions in closure"));
    map.insert(302, ErrorInfo::new("Terminology lookup failed"));

    // System errors (0400-0499)
    map.insert(400, ErrorInfo::new("I/O error"));
    map.insert(401, ErrorInfo::new("Malformed input document"));
    map.insert(402, ErrorInfo::new("Configuration error"));

    map
});

// Chain parse errors
pub const ONTO0001: ErrorCode = ErrorCode::new(1);
pub const ONTO0002: ErrorCode = ErrorCode::new(2);
pub const ONTO0003: ErrorCode = ErrorCode::new(3);

// Resolution errors
pub const ONTO0100: ErrorCode = ErrorCode::new(100);
pub const ONTO0101: ErrorCode = ErrorCode::new(101);
pub const ONTO0102: ErrorCode = ErrorCode::new(102);
pub const ONTO0103: ErrorCode = ErrorCode::new(103);
pub const ONTO0104: ErrorCode = ErrorCode::new(104);
pub const ONTO0105: ErrorCode = ErrorCode::new(105);
pub const ONTO0106: ErrorCode = ErrorCode::new(106);

// Cardinality, emission and mapping errors
pub const ONTO0200: ErrorCode = ErrorCode::new(200);
pub const ONTO0201: ErrorCode = ErrorCode::new(201);
pub const ONTO0202: ErrorCode = ErrorCode::new(202);
pub const ONTO0203: ErrorCode = ErrorCode::new(203);
pub const ONTO0204: ErrorCode = ErrorCode::new(204);
pub const ONTO0205: ErrorCode = ErrorCode::new(205);
pub const ONTO0206: ErrorCode = ErrorCode::new(206);
pub const ONTO0207: ErrorCode = ErrorCode::new(207);
pub const ONTO0208: ErrorCode = ErrorCode::new(208);

// Hierarchy errors
pub const ONTO0300: ErrorCode = ErrorCode::new(300);
pub const ONTO0301: ErrorCode = ErrorCode::new(301);
pub const ONTO0302: ErrorCode = ErrorCode::new(302);

// System errors
pub const ONTO0400: ErrorCode = ErrorCode::new(400);
pub const ONTO0401: ErrorCode = ErrorCode::new(401);
pub const ONTO0402: ErrorCode = ErrorCode::new(402);
