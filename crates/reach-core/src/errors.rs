use std::fmt;

/// Failures raised by the in-memory registries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    NotFound(String),
    InvalidState(String),
}

impl RegistryError {
    /// Stable machine-readable code surfaced to tool callers.
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::NotFound(_) => "E_NOT_FOUND",
            RegistryError::InvalidState(_) => "E_INVALID_STATE",
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NotFound(m) => write!(f, "not found: {m}"),
            RegistryError::InvalidState(m) => write!(f, "invalid state: {m}"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Raised when a tool needs a provider whose credentials are absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotConfigured(pub &'static str);

impl fmt::Display for NotConfigured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is not configured (missing credentials)", self.0)
    }
}

impl std::error::Error for NotConfigured {}

/// Maps an error chain to the code reported in tool results.
pub fn error_code(err: &anyhow::Error) -> &'static str {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<RegistryError>() {
            return e.code();
        }
        if cause.is::<NotConfigured>() {
            return "E_NOT_CONFIGURED";
        }
        if let Some(e) = cause.downcast_ref::<reqwest::Error>() {
            return if e.is_timeout() { "E_TIMEOUT" } else { "E_PROVIDER" };
        }
        if cause.to_string().contains("API error") {
            return "E_PROVIDER";
        }
    }
    "E_INTERNAL"
}
