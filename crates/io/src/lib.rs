// File I/O operations

pub mod csv;
pub mod error;
pub mod report;
pub mod xlsx;

pub use error::IoError;
pub use report::ReportAssembler;
