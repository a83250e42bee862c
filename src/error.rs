use crate::source::SourceLocation;
use miette::Diagnostic;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TycoError>;

/// Every failure mode of a parse session. All variants are fatal: the first
/// error aborts the whole load, there is no recovery or collection.
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum TycoError {
    #[error("{0}")]
    #[diagnostic(
        code(tyco::syntax),
        help("The source text does not match the Tyco grammar at this point.")
    )]
    Syntax(ErrorInfo),

    #[error("{0}")]
    #[diagnostic(
        code(tyco::schema),
        help("A struct schema declaration conflicts with an earlier one.")
    )]
    Schema(ErrorInfo),

    #[error("{0}")]
    #[diagnostic(
        code(tyco::binding),
        help("A value does not fit the schema slot it was bound to.")
    )]
    Binding(ErrorInfo),

    #[error("{0}")]
    #[diagnostic(
        code(tyco::reference),
        help("A Type(...) reference could not be resolved against declared instances.")
    )]
    Reference(ErrorInfo),

    #[error("{0}")]
    #[diagnostic(
        code(tyco::template),
        help("A {{path}} placeholder could not be substituted.")
    )]
    Template(ErrorInfo),

    #[error("{0}")]
    #[diagnostic(code(tyco::io), help("The source path could not be read."))]
    Io(ErrorInfo),
}

impl TycoError {
    pub fn syntax(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        TycoError::Syntax(ErrorInfo::new(message, location))
    }

    pub fn schema(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        TycoError::Schema(ErrorInfo::new(message, location))
    }

    pub fn binding(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        TycoError::Binding(ErrorInfo::new(message, location))
    }

    pub fn reference(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        TycoError::Reference(ErrorInfo::new(message, location))
    }

    pub fn template(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        TycoError::Template(ErrorInfo::new(message, location))
    }

    pub fn io(message: impl Into<String>) -> Self {
        TycoError::Io(ErrorInfo::new(message, None))
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.info().location.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.info().message
    }

    fn info(&self) -> &ErrorInfo {
        match self {
            TycoError::Syntax(info)
            | TycoError::Schema(info)
            | TycoError::Binding(info)
            | TycoError::Reference(info)
            | TycoError::Template(info)
            | TycoError::Io(info) => info,
        }
    }
}

/// Message plus optional origin. Rendered as
/// `<file>:<line>:<column> - <message>` with the offending line indented
/// underneath when a location is known.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        ErrorInfo {
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => {
                write!(f, "{} - {}", location, self.message)?;
                if !location.raw_line.is_empty() {
                    write!(f, "\n    {}", location.raw_line)?;
                }
                Ok(())
            }
            None => write!(f, "{}", self.message),
        }
    }
}
