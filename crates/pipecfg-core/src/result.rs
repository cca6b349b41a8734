//! Command outcomes

use std::fmt::{self, Display, Formatter};

use pipecfg_artifact::ErrorReport;
use serde::{Deserialize, Serialize};

/// Outcome class of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusClass {
    Ok,
    /// Invalid request or configuration errors
    BadRequest,
    Unauthorized,
    /// Conflicting state, or the document changed underneath the command
    Conflict,
    /// The caller's version token no longer matches the entity
    Stale,
    NotFound,
    ServerError,
}

impl StatusClass {
    /// HTTP-style status code, for surfaces that want one
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 422,
            Self::Unauthorized => 403,
            Self::Conflict => 409,
            Self::Stale => 412,
            Self::NotFound => 404,
            Self::ServerError => 500,
        }
    }
}

impl Display for StatusClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "ok",
            Self::BadRequest => "bad request",
            Self::Unauthorized => "unauthorized",
            Self::Conflict => "conflict",
            Self::Stale => "stale",
            Self::NotFound => "not found",
            Self::ServerError => "server error",
        };
        f.write_str(name)
    }
}

/// What a command did, or why it did nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub status: StatusClass,
    pub message: String,
    /// Validation errors filed under the touched entities
    #[serde(default, skip_serializing_if = "ErrorReport::is_empty")]
    pub errors: ErrorReport,
}

impl CommandResult {
    fn new(status: StatusClass, message: impl Into<String>) -> Self {
        Self {
            success: status == StatusClass::Ok,
            status,
            message: message.into(),
            errors: ErrorReport::new(),
        }
    }

    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(StatusClass::Ok, message)
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusClass::BadRequest, message)
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusClass::Unauthorized, message)
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusClass::Conflict, message)
    }

    #[must_use]
    pub fn stale(message: impl Into<String>) -> Self {
        Self::new(StatusClass::Stale, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusClass::NotFound, message)
    }

    #[must_use]
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(StatusClass::ServerError, message)
    }

    /// Validation failure carrying the errors found
    #[must_use]
    pub fn invalid(message: impl Into<String>, errors: ErrorReport) -> Self {
        Self {
            errors,
            ..Self::bad_request(message)
        }
    }

    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.success
    }
}

impl Display for CommandResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipecfg_artifact::EntityPath;

    #[test]
    fn only_ok_succeeds() {
        assert!(CommandResult::ok("done").is_ok());
        assert!(!CommandResult::stale("old").success);
        assert_eq!(CommandResult::conflict("x").status.code(), 409);
    }

    #[test]
    fn invalid_keeps_errors() {
        let mut errors = ErrorReport::new();
        errors.add(&EntityPath::of("environments", "uat"), "name", "bad");
        let result = CommandResult::invalid("Validations failed", errors);
        assert_eq!(result.status, StatusClass::BadRequest);
        assert_eq!(result.errors.error_count(), 1);
        assert_eq!(result.to_string(), "bad request: Validations failed");
    }
}
