//! Error types

use crate::{ElementLocation, ErrorCode, ONTO0101, ONTO0400};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Error - the element chain or mapping cannot be produced
    Error,
    /// Warning - recovered, but the result may not be what the author intended
    Warning,
    /// Information - informational message
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A diagnostic message with location and context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity level
    pub severity: Severity,
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Element location
    pub location: Option<ElementLocation>,
    /// Additional context or help
    pub help: Option<String>,
    /// Related diagnostics (e.g. the members of a batch failure)
    pub related: Vec<RelatedInfo>,
}

impl Diagnostic {
    /// Create a new error diagnostic
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            location: None,
            help: None,
            related: Vec::new(),
        }
    }

    /// Create a new warning diagnostic
    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: ElementLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Set help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add related information
    pub fn with_related(mut self, info: RelatedInfo) -> Self {
        self.related.push(info);
        self
    }

    /// Render the diagnostic for a terminal, one line per part.
    pub fn render(&self) -> String {
        let mut out = self.headline();
        if let Some(help) = self.help.as_deref().or(self.code.info().help) {
            out.push_str(&format!("\n  help: {help}"));
        }
        for related in &self.related {
            out.push_str(&format!("\n  - {related}"));
        }
        out
    }

    #[cfg(feature = "colored")]
    fn headline(&self) -> String {
        use colored::Colorize;

        let severity = match self.severity {
            Severity::Error => self.severity.to_string().red().bold(),
            Severity::Warning => self.severity.to_string().yellow().bold(),
            Severity::Info => self.severity.to_string().blue().bold(),
        };
        let mut line = format!("{}[{}]: {}", severity, self.code, self.message);
        if let Some(loc) = &self.location {
            line.push_str(&format!(" {}", loc.to_string().dimmed()));
        }
        line
    }

    #[cfg(not(feature = "colored"))]
    fn headline(&self) -> String {
        let mut line = format!("{}[{}]: {}", self.severity, self.code, self.message);
        if let Some(loc) = &self.location {
            line.push_str(&format!(" {loc}"));
        }
        line
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.severity, self.code, self.message)?;
        if let Some(loc) = &self.location {
            write!(f, " {}", loc)?;
        }
        Ok(())
    }
}

/// Related diagnostic information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedInfo {
    /// Location of the related failure
    pub location: Option<ElementLocation>,
    /// Message explaining the relationship
    pub message: String,
}

impl RelatedInfo {
    /// Create new related info
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            location: None,
            message: message.into(),
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: ElementLocation) -> Self {
        self.location = Some(location);
        self
    }
}

impl fmt::Display for RelatedInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(loc) = &self.location {
            write!(f, " {}", loc)?;
        }
        Ok(())
    }
}

fn location_suffix(location: &Option<ElementLocation>) -> String {
    match location {
        Some(loc) if !loc.is_empty() => format!(" {loc}"),
        _ => String::new(),
    }
}

/// Main error type
#[derive(Debug, Clone, Error)]
pub enum OntoError {
    /// Malformed element chain
    #[error("{code}: {message}")]
    Chain {
        code: ErrorCode,
        message: String,
        expression: String,
        context: Option<String>,
    },

    /// Element chain could not be resolved against the profile registry
    #[error("{code}: {message}{}", location_suffix(.location))]
    Resolution {
        code: ErrorCode,
        message: String,
        location: Option<ElementLocation>,
        context: Option<String>,
    },

    /// Cardinality, path emission or mapping generation failure
    #[error("{code}: {message}{}", location_suffix(.location))]
    Mapping {
        code: ErrorCode,
        message: String,
        location: Option<ElementLocation>,
        context: Option<String>,
    },

    /// Terminology or hierarchy construction failure
    #[error("{code}: {message}")]
    Hierarchy {
        code: ErrorCode,
        message: String,
        system: Option<String>,
        context: Option<String>,
    },

    /// System error
    #[error("{code}: {message}")]
    System {
        code: ErrorCode,
        message: String,
        context: Option<String>,
    },

    /// Multiple errors collected
    #[error("Multiple errors: {}", .0.len())]
    Multiple(Vec<OntoError>),
}

impl OntoError {
    /// Create a chain parse error
    pub fn chain(code: ErrorCode, message: impl Into<String>, expression: impl Into<String>) -> Self {
        Self::Chain {
            code,
            message: message.into(),
            expression: expression.into(),
            context: None,
        }
    }

    /// Create a resolution error
    pub fn resolution(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Resolution {
            code,
            message: message.into(),
            location: None,
            context: None,
        }
    }

    /// Create a mapping error
    pub fn mapping(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Mapping {
            code,
            message: message.into(),
            location: None,
            context: None,
        }
    }

    /// Create a hierarchy error
    pub fn hierarchy(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Hierarchy {
            code,
            message: message.into(),
            system: None,
            context: None,
        }
    }

    /// Create a system error
    pub fn system(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::System {
            code,
            message: message.into(),
            context: None,
        }
    }

    /// Attach an element location. Only resolution and mapping errors carry one.
    pub fn with_location(mut self, loc: ElementLocation) -> Self {
        match &mut self {
            Self::Resolution { location, .. } | Self::Mapping { location, .. } => {
                *location = Some(loc);
            }
            _ => {}
        }
        self
    }

    /// Attach the code system a hierarchy error refers to
    pub fn with_system(mut self, url: impl Into<String>) -> Self {
        if let Self::Hierarchy { system, .. } = &mut self {
            *system = Some(url.into());
        }
        self
    }

    /// Attach free-form context
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        match &mut self {
            Self::Chain { context, .. }
            | Self::Resolution { context, .. }
            | Self::Mapping { context, .. }
            | Self::Hierarchy { context, .. }
            | Self::System { context, .. } => *context = Some(ctx.into()),
            Self::Multiple(_) => {}
        }
        self
    }

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Chain { code, .. } => *code,
            Self::Resolution { code, .. } => *code,
            Self::Mapping { code, .. } => *code,
            Self::Hierarchy { code, .. } => *code,
            Self::System { code, .. } => *code,
            Self::Multiple(errors) => errors.first().map(|e| e.code()).unwrap_or(ErrorCode::new(0)),
        }
    }

    /// Get the element location if available
    pub fn location(&self) -> Option<&ElementLocation> {
        match self {
            Self::Resolution { location, .. } | Self::Mapping { location, .. } => location.as_ref(),
            _ => None,
        }
    }

    /// Get the message without code or location
    pub fn message(&self) -> String {
        match self {
            Self::Chain { message, .. }
            | Self::Resolution { message, .. }
            | Self::Mapping { message, .. }
            | Self::Hierarchy { message, .. }
            | Self::System { message, .. } => message.clone(),
            Self::Multiple(errors) => format!("{} errors", errors.len()),
        }
    }

    /// Recoverable errors are logged and processing continues with a fallback.
    pub fn is_recoverable(&self) -> bool {
        self.code() == ONTO0101
    }

    /// Convert to a diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Chain { code, message, expression, context } => {
                let diag = Diagnostic::error(*code, format!("{message} in '{expression}'"));
                match context {
                    Some(ctx) => diag.with_help(ctx.clone()),
                    None => diag,
                }
            }
            Self::Resolution { code, message, location, context }
            | Self::Mapping { code, message, location, context } => {
                let mut diag = if self.is_recoverable() {
                    Diagnostic::warning(*code, message.clone())
                } else {
                    Diagnostic::error(*code, message.clone())
                };
                if let Some(loc) = location {
                    diag = diag.with_location(loc.clone());
                }
                if let Some(ctx) = context {
                    diag = diag.with_help(ctx.clone());
                }
                diag
            }
            Self::Hierarchy { code, message, system, context } => {
                let message = match system {
                    Some(system) => format!("{message} (system {system})"),
                    None => message.clone(),
                };
                let diag = Diagnostic::error(*code, message);
                match context {
                    Some(ctx) => diag.with_help(ctx.clone()),
                    None => diag,
                }
            }
            Self::System { code, message, context } => {
                let diag = Diagnostic::error(*code, message.clone());
                match context {
                    Some(ctx) => diag.with_help(ctx.clone()),
                    None => diag,
                }
            }
            Self::Multiple(errors) => {
                let Some(first) = errors.first() else {
                    return Diagnostic::error(ErrorCode::new(0), "Unknown error");
                };
                errors.iter().skip(1).fold(first.to_diagnostic(), |diag, err| {
                    let mut info = RelatedInfo::new(err.to_string());
                    if let Some(loc) = err.location() {
                        info = info.with_location(loc.clone());
                    }
                    diag.with_related(info)
                })
            }
        }
    }
}

impl From<std::io::Error> for OntoError {
    fn from(err: std::io::Error) -> Self {
        Self::system(ONTO0400, err.to_string())
    }
}

/// Builder for creating located errors with a fluent API
pub struct ErrorBuilder {
    code: ErrorCode,
    message: String,
    location: ElementLocation,
    context: Option<String>,
}

impl ErrorBuilder {
    /// Create a new error builder
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: ElementLocation::default(),
            context: None,
        }
    }

    /// Set the offending element id
    pub fn element(mut self, element_id: impl Into<String>) -> Self {
        self.location.element_id = Some(element_id.into());
        self
    }

    /// Set the profile URL
    pub fn profile(mut self, url: impl Into<String>) -> Self {
        self.location.profile_url = Some(url.into());
        self
    }

    /// Set the module
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.location.module = Some(module.into());
        self
    }

    /// Add context information
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn location(&self) -> Option<ElementLocation> {
        (!self.location.is_empty()).then(|| self.location.clone())
    }

    /// Build a resolution error
    pub fn resolution(self) -> OntoError {
        OntoError::Resolution {
            code: self.code,
            location: self.location(),
            message: self.message,
            context: self.context,
        }
    }

    /// Build a mapping error
    pub fn mapping(self) -> OntoError {
        OntoError::Mapping {
            code: self.code,
            location: self.location(),
            message: self.message,
            context: self.context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ONTO0001, ONTO0100, ONTO0200, ONTO0300};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_builder() {
        let err = ErrorBuilder::new(ONTO0100, "Element not found in snapshot")
            .element("Specimen.foo")
            .profile("https://example.org/Specimen")
            .module("bbmri")
            .resolution();

        assert!(matches!(err, OntoError::Resolution { .. }));
        assert_eq!(err.code(), ONTO0100);
        assert_eq!(
            err.to_string(),
            "ONTO0100: Element not found in snapshot [element=Specimen.foo, profile=https://example.org/Specimen, module=bbmri]"
        );
    }

    #[test]
    fn test_error_without_location() {
        let err = ErrorBuilder::new(ONTO0200, "No parent").mapping();
        assert_eq!(err.location(), None);
        assert_eq!(err.to_string(), "ONTO0200: No parent");
    }

    #[test]
    fn test_chain_error_diagnostic() {
        let err = OntoError::chain(ONTO0001, "Empty chain", "");
        let diag = err.to_diagnostic();
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.code, ONTO0001);
    }

    #[test]
    fn test_ambiguous_profile_is_warning() {
        let err = OntoError::resolution(ONTO0101, "Several target profiles")
            .with_location(ElementLocation::element("Specimen.subject"));
        assert!(err.is_recoverable());
        assert_eq!(err.to_diagnostic().severity, Severity::Warning);
    }

    #[test]
    fn test_multiple_errors_collect_related() {
        let err = OntoError::Multiple(vec![
            OntoError::hierarchy(ONTO0300, "Two groups").with_system("http://snomed.info/sct"),
            OntoError::resolution(ONTO0100, "Missing").with_location(ElementLocation::element("A.b")),
        ]);
        let diag = err.to_diagnostic();
        assert_eq!(diag.code, ONTO0300);
        assert_eq!(diag.related.len(), 1);
        assert!(diag.render().contains("A.b"));
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::error(ONTO0100, "Unresolvable")
            .with_location(ElementLocation::element("Observation.value[x]"));

        assert!(diag.to_string().contains("ONTO0100"));
        assert!(diag.to_string().contains("Observation.value[x]"));
    }
}
