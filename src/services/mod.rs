// Service layer: request-level entry points wrapping the reconciliation
// pipeline with validation, the transaction boundary, and logging.

pub mod identify;
