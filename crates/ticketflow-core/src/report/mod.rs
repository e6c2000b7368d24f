pub mod console;
pub mod export;
pub mod reply;

pub use export::{export_completed, write_export, ExportEntry};
