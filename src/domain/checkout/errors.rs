use crate::clients::ClientError;
use crate::domain::money::MoneyError;

use super::preparer::PreparationError;
use super::price_guard::PriceViolation;

// ============================================================================
// Checkout Errors
// ============================================================================

/// Failure class of a fatal pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    IdentityGenerationFailure,
    PreparationFailure,
    PriceViolation,
    ContractViolation,
    PaymentFailure,
    FulfillmentFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::IdentityGenerationFailure => "identity_generation",
            ErrorKind::PreparationFailure => "preparation",
            ErrorKind::PriceViolation => "price_violation",
            ErrorKind::ContractViolation => "contract_violation",
            ErrorKind::PaymentFailure => "payment",
            ErrorKind::FulfillmentFailure => "fulfillment",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("failed to generate order uuid: {0}")]
    IdentityGeneration(String),

    #[error(transparent)]
    Preparation(#[from] PreparationError),

    #[error("Order contains expensive items: {violation}")]
    PriceViolation {
        violation: PriceViolation,
        /// Diagnostic report for support tickets
        report: String,
    },

    #[error("failed to compute order total: {0}")]
    TotalComputation(#[from] MoneyError),

    #[error("failed to charge card: {0}")]
    Payment(#[source] ClientError),

    #[error("shipping error: {0}")]
    Fulfillment(#[source] ClientError),
}

impl CheckoutError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::IdentityGeneration(_) => ErrorKind::IdentityGenerationFailure,
            CheckoutError::Preparation(_) => ErrorKind::PreparationFailure,
            CheckoutError::PriceViolation { .. } => ErrorKind::PriceViolation,
            CheckoutError::TotalComputation(_) => ErrorKind::ContractViolation,
            CheckoutError::Payment(_) => ErrorKind::PaymentFailure,
            CheckoutError::Fulfillment(_) => ErrorKind::FulfillmentFailure,
        }
    }
}

impl From<CheckoutError> for tonic::Status {
    fn from(err: CheckoutError) -> Self {
        match &err {
            CheckoutError::PriceViolation { report, .. } => {
                tonic::Status::failed_precondition(format!("{}\n\nTECHNICAL_DETAILS:{}", err, report))
            }
            CheckoutError::Fulfillment(_) => tonic::Status::unavailable(err.to_string()),
            _ => tonic::Status::internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let status: tonic::Status = CheckoutError::Payment(ClientError::UnexpectedStatus(503)).into();
        assert_eq!(status.code(), tonic::Code::Internal);
        assert_eq!(status.message(), "failed to charge card: expected 200, got 503");

        let status: tonic::Status = CheckoutError::Fulfillment(ClientError::MissingField("tracking_id")).into();
        assert_eq!(status.code(), tonic::Code::Unavailable);
        assert!(status.message().starts_with("shipping error:"));

        let status: tonic::Status = CheckoutError::IdentityGeneration("clock".into()).into();
        assert_eq!(status.code(), tonic::Code::Internal);

        let status: tonic::Status = CheckoutError::TotalComputation(MoneyError::Overflow).into();
        assert_eq!(status.code(), tonic::Code::Internal);
    }

    #[test]
    fn test_price_violation_status_carries_report() {
        let err = CheckoutError::PriceViolation {
            violation: PriceViolation {
                product_id: "66VCHSJNUP".to_string(),
                price_usd: 600.0,
                threshold: 500,
            },
            report: "\nthreshold: $500\n".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::PriceViolation);

        let status: tonic::Status = err.into();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);
        assert_eq!(
            status.message(),
            "Order contains expensive items: item 66VCHSJNUP costs $600.00 which exceeds the threshold of $500\n\nTECHNICAL_DETAILS:\nthreshold: $500\n"
        );
    }
}
