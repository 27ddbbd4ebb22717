//! The ingest pipeline: type inference, provisioning, sanitization, bulk
//! loading, and the run controller that orders them.

pub mod frame;
pub mod loader;
pub mod provision;
pub mod run;
pub mod sanitize;
pub mod typemap;

pub use provision::parse_table;
pub use run::{run_ingest, IngestJob};
pub use sanitize::sanitize_row;
pub use typemap::ColumnDef;
