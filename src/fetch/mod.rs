//! Record fetchers: thin adapters retrieving one entity's full relational
//! graph and its document projection, each normalized into the generic
//! shapes the reconciliation engine consumes.

pub mod document;
pub mod source;

pub use document::DocumentFetcher;
pub use source::SourceFetcher;
