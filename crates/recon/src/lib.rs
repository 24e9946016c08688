//! `settlegrid-recon`: order/catalog settlement engine.
//!
//! Pure engine crate: receives decoded grids and row-sets, returns settled
//! rows and a finance summary. No spreadsheet or CLI dependencies.

pub mod config;
pub mod error;
pub mod extract;
pub mod finance;
pub mod ingest;
pub mod keys;
pub mod model;
pub mod naming;
pub mod registry;
pub mod session;
pub mod settlement;
pub mod suggest;

pub use config::{ReconConfig, SettleOptions};
pub use error::ReconError;
pub use model::{CellValue, FinanceRow, Grid, Outcome, RowSet, SettledRowSet};
pub use naming::OrderFileName;
pub use registry::{Mapping, MatchRegistry};
pub use session::ReconSession;
