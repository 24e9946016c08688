//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3       | Universal        | File read/write error                    |
//! | 60-69   | settle           | Settlement pipeline codes                |

use settlegrid_io::IoError;
use settlegrid_recon::ReconError;

// =============================================================================
// Universal (0-3)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments (e.g. malformed `--date`).
pub const EXIT_USAGE: u8 = 2;

/// A file could not be read, decoded or written.
pub const EXIT_IO: u8 = 3;

// =============================================================================
// Settle (60-69)
// =============================================================================

/// Config file does not parse or fails validation.
pub const EXIT_SETTLE_INVALID_CONFIG: u8 = 60;

/// Input does not fit the config: missing column, bad order file name,
/// unknown catalog key, no order rows.
pub const EXIT_SETTLE_INPUT: u8 = 61;

/// The mapping selects one catalog key for several order keys.
pub const EXIT_SETTLE_DUPLICATE_TARGET: u8 = 62;

/// The catalog sheet has no extractable table.
pub const EXIT_SETTLE_NO_TABLE: u8 = 63;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_SETTLE_INVALID_CONFIG,
        ReconError::MissingColumn { .. }
        | ReconError::UnknownCatalogKey(_)
        | ReconError::FileNaming { .. }
        | ReconError::NoOrderData => EXIT_SETTLE_INPUT,
        ReconError::DuplicateMatchTarget { .. } => EXIT_SETTLE_DUPLICATE_TARGET,
    }
}

/// Map an I/O error to its exit code.
pub fn io_exit_code(err: &IoError) -> u8 {
    match err {
        // A mapping file without the expected columns is bad input, not a failed read
        IoError::Csv(_) => EXIT_SETTLE_INPUT,
        IoError::Open { .. } | IoError::Sheet { .. } | IoError::Write(_) => EXIT_IO,
    }
}
