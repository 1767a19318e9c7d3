//! Reconciliation core: value model, field comparator, and the engine
//! that walks the schema registry to produce typed discrepancies.

pub mod compare;
pub mod engine;
pub mod value;

pub use engine::{CheckOutcome, Discrepancy, MissingSide, ReconcileEngine, SourceRecordGraph};
pub use value::{Record, SourceValue};
