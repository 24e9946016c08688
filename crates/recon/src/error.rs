use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty column name, missing flag text, etc.).
    ConfigValidation(String),
    /// Missing required column in input data.
    MissingColumn { role: String, column: String },
    /// Two or more order keys point at the same catalog key.
    DuplicateMatchTarget { target: String, order_keys: Vec<String> },
    /// A mapping target that is not a key of the loaded catalog.
    UnknownCatalogKey(String),
    /// Order file name does not follow `prefix_date_seller_item.ext`.
    FileNaming { file_name: String },
    /// Every order source was skipped or empty.
    NoOrderData,
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { role, column } => {
                write!(f, "{role}: missing column '{column}'")
            }
            Self::DuplicateMatchTarget { target, order_keys } => {
                write!(
                    f,
                    "catalog key '{target}' is selected by {} order keys: {}",
                    order_keys.len(),
                    order_keys.join(", ")
                )
            }
            Self::UnknownCatalogKey(key) => write!(f, "unknown catalog key: '{key}'"),
            Self::FileNaming { file_name } => write!(
                f,
                "file name '{file_name}' does not match the order file convention (발주서_date_seller_item.xlsx)"
            ),
            Self::NoOrderData => write!(f, "no order rows could be loaded"),
        }
    }
}

impl std::error::Error for ReconError {}
