use thiserror::Error;

use crate::domain::rule::RuleStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("no fx rate available for {sale_currency} against ledger currency {ledger_currency}")]
    MissingFxRate { ledger_currency: String, sale_currency: String },
    #[error("invalid rule transition from {from:?} to {to:?}")]
    InvalidRuleTransition { from: RuleStatus, to: RuleStatus },
    #[error("{resource} belongs to a different organization")]
    TenantScopeViolation { resource: String },
    #[error("{resource} not found")]
    NotFound { resource: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("unprocessable: {message}")]
    Unprocessable { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "The requested resource is not available to this account.",
            Self::NotFound { .. } => "The requested resource does not exist.",
            Self::Unprocessable { .. } => {
                "The booking could not be confirmed with the current reference data."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Unprocessable { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Unprocessable { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::Validation(message)) => {
                Self::BadRequest { message, correlation_id: unassigned }
            }
            ApplicationError::Domain(error @ DomainError::InvalidRuleTransition { .. }) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned }
            }
            ApplicationError::Domain(error @ DomainError::MissingFxRate { .. }) => {
                Self::Unprocessable { message: error.to_string(), correlation_id: unassigned }
            }
            ApplicationError::Domain(error @ DomainError::TenantScopeViolation { .. }) => {
                Self::Forbidden { message: error.to_string(), correlation_id: unassigned }
            }
            ApplicationError::Domain(error @ DomainError::NotFound { .. }) => {
                Self::NotFound { message: error.to_string(), correlation_id: unassigned }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn validation_error_maps_to_bad_request_with_correlation_id() {
        let interface = ApplicationError::from(DomainError::Validation(
            "net_amount must be positive".to_owned(),
        ))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, .. } if correlation_id == "req-1"
        ));
    }

    #[test]
    fn missing_fx_rate_maps_to_unprocessable() {
        let interface = ApplicationError::from(DomainError::MissingFxRate {
            ledger_currency: "EUR".to_owned(),
            sale_currency: "TRY".to_owned(),
        })
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::Unprocessable { .. }));
        assert_eq!(
            interface.user_message(),
            "The booking could not be confirmed with the current reference data."
        );
    }

    #[test]
    fn tenant_scope_violation_maps_to_forbidden() {
        let interface = ApplicationError::from(DomainError::TenantScopeViolation {
            resource: "settlement entry".to_owned(),
        })
        .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::Forbidden { .. }));
        assert_eq!(interface.correlation_id(), "req-3");
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface =
            ApplicationError::Persistence("database lock timeout".to_owned()).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }
}
