use std::fmt;

#[derive(Debug)]
pub enum IoError {
    /// The file could not be opened or is not a readable workbook.
    Open { path: String, message: String },
    /// The requested sheet is missing or unreadable.
    Sheet { sheet: String, message: String },
    /// Writing a workbook or file failed.
    Write(String),
    /// CSV read/write error, or a malformed mapping file.
    Csv(String),
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, message } => write!(f, "cannot open '{path}': {message}"),
            Self::Sheet { sheet, message } => write!(f, "sheet {sheet}: {message}"),
            Self::Write(msg) => write!(f, "write error: {msg}"),
            Self::Csv(msg) => write!(f, "CSV error: {msg}"),
        }
    }
}

impl std::error::Error for IoError {}

impl From<rust_xlsxwriter::XlsxError> for IoError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        Self::Write(e.to_string())
    }
}

impl From<csv::Error> for IoError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e.to_string())
    }
}
