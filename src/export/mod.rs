pub mod json;

pub use json::{ImportReport, ProgressSnapshot, export_progress, import_progress, read_snapshot};
