use serde::Deserialize;

use crate::error::ReconError;
use crate::model::RowSet;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    #[serde(default)]
    pub name: String,
    pub orders: OrdersConfig,
    pub catalog: CatalogConfig,
    #[serde(flatten)]
    pub settle: SettleOptions,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrdersConfig {
    /// Order spreadsheets, relative to the config file. The first one names the report.
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub file: String,
    /// Zero-based sheet index.
    #[serde(default)]
    pub sheet: usize,
}

// ---------------------------------------------------------------------------
// Settlement options
// ---------------------------------------------------------------------------

/// Everything the settlement and finance steps need, independent of files.
#[derive(Debug, Clone, Deserialize)]
pub struct SettleOptions {
    pub columns: ColumnRoles,
    /// Percentage of shipping and remote-area fees charged to the seller.
    #[serde(default = "default_seller_ratio")]
    pub seller_ratio: i64,
    #[serde(default)]
    pub shipping: Option<ShippingConfig>,
    #[serde(default)]
    pub remote_area: Option<RemoteAreaConfig>,
}

fn default_seller_ratio() -> i64 {
    100
}

impl SettleOptions {
    pub fn new(columns: ColumnRoles) -> Self {
        Self {
            columns,
            seller_ratio: default_seller_ratio(),
            shipping: None,
            remote_area: None,
        }
    }

    /// Seller ratio clamped to `[0, 100]`.
    pub fn ratio(&self) -> i64 {
        self.seller_ratio.clamp(0, 100)
    }

    /// Check that every configured order column exists in `orders`.
    pub fn ensure_columns(&self, orders: &RowSet) -> Result<(), ReconError> {
        let c = &self.columns;
        let mut required = vec![c.product.as_str(), c.quantity.as_str(), c.order_id.as_str()];
        if let Some(ref option) = c.option {
            required.push(option);
        }
        if let Some(ref remote) = self.remote_area {
            required.push(&remote.column);
        }

        for column in required {
            if !orders.has_column(column) {
                return Err(ReconError::MissingColumn {
                    role: "orders".into(),
                    column: column.into(),
                });
            }
        }
        Ok(())
    }
}

/// User-designated order columns.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnRoles {
    pub product: String,
    #[serde(default)]
    pub option: Option<String>,
    pub quantity: String,
    pub order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingConfig {
    /// Shipping fee charged once per qualifying order, before seller proration.
    pub fee: i64,
    /// Orders whose summed sale price is strictly below this pay shipping.
    pub condition_amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAreaConfig {
    pub column: String,
    pub mode: RemoteAreaMode,
    /// Marker substring that flags a row (flag mode).
    #[serde(default)]
    pub flag_text: Option<String>,
    /// Fee per flagged order (flag mode); sale-side override in the summary.
    #[serde(default)]
    pub fee: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteAreaMode {
    /// The column holds the fee amount itself.
    Raw,
    /// The column holds a text indicator.
    Flag,
}

impl std::fmt::Display for RemoteAreaMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Flag => write!(f, "flag"),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default = "default_notes")]
    pub notes: Vec<String>,
}

fn default_prefix() -> String {
    "정산서".into()
}

fn default_title() -> String {
    "정산 리포트".into()
}

fn default_sheet_name() -> String {
    "정산".into()
}

fn default_notes() -> Vec<String> {
    vec![
        "*위 금액을 확인하여 주시길 바랍니다.".into(),
        "*이상이 없을 경우 계산서 발행 요청드립니다".into(),
    ]
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            title: default_title(),
            sheet_name: default_sheet_name(),
            brand: None,
            notes: default_notes(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.orders.files.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least one order file is required".into(),
            ));
        }
        if self.catalog.file.trim().is_empty() {
            return Err(ReconError::ConfigValidation("catalog file is empty".into()));
        }
        if self.report.prefix.trim().is_empty() {
            return Err(ReconError::ConfigValidation("report prefix is empty".into()));
        }
        self.settle.validate()
    }
}

impl SettleOptions {
    pub fn validate(&self) -> Result<(), ReconError> {
        let c = &self.columns;
        for (role, name) in [
            ("product", &c.product),
            ("quantity", &c.quantity),
            ("order_id", &c.order_id),
        ] {
            if name.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "column '{role}' is empty"
                )));
            }
        }

        if !(0..=100).contains(&self.seller_ratio) {
            log::warn!("seller_ratio {} clamped to {}", self.seller_ratio, self.ratio());
        }

        if let Some(ref shipping) = self.shipping {
            if shipping.fee < 0 || shipping.condition_amount < 0 {
                return Err(ReconError::ConfigValidation(
                    "shipping fee and condition_amount must be >= 0".into(),
                ));
            }
        }

        if let Some(ref remote) = self.remote_area {
            if remote.column.trim().is_empty() {
                return Err(ReconError::ConfigValidation(
                    "remote_area column is empty".into(),
                ));
            }
            if remote.fee.is_some_and(|f| f < 0) {
                return Err(ReconError::ConfigValidation(
                    "remote_area fee must be >= 0".into(),
                ));
            }
            let has_flag = remote
                .flag_text
                .as_deref()
                .is_some_and(|t| !t.trim().is_empty());
            if remote.mode == RemoteAreaMode::Flag && !has_flag {
                return Err(ReconError::ConfigValidation(
                    "remote_area mode = \"flag\" requires flag_text".into(),
                ));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
