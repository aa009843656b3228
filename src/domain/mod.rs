// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Exact money arithmetic and the checkout stages built on it. Nothing in here
// knows about protobuf, gRPC or Kafka; collaborators arrive as traits.
//
// ============================================================================

pub mod checkout;
pub mod money;
