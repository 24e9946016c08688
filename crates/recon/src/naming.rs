//! Order file naming convention: `발주서_{date}_{seller}_{item}.xlsx`.
//!
//! The seller and item segments label the finance summary and name the
//! generated report.

use chrono::NaiveDate;

use crate::error::ReconError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFileName {
    pub prefix: String,
    pub date: String,
    pub seller: String,
    pub item: String,
}

impl OrderFileName {
    /// Parse a file name (directories and extension are ignored).
    ///
    /// Fewer than four `_`-separated segments is an error.
    pub fn parse(file_name: &str) -> Result<Self, ReconError> {
        let base = file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(file_name);
        let stem = base.rsplit_once('.').map_or(base, |(stem, _)| stem);

        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() < 4 {
            return Err(ReconError::FileNaming {
                file_name: file_name.to_string(),
            });
        }
        Ok(Self {
            prefix: parts[0].to_string(),
            date: parts[1].to_string(),
            seller: parts[2].to_string(),
            item: parts[3].to_string(),
        })
    }

    /// Product label of the finance summary: `{seller}X{item}`.
    pub fn product_label(&self) -> String {
        format!("{}X{}", self.seller, self.item)
    }

    /// `{prefix}_{YYMMDD}_{seller}_{item}.xlsx`
    pub fn report_file_name(&self, report_prefix: &str, date: NaiveDate) -> String {
        format!(
            "{report_prefix}_{}_{}_{}.xlsx",
            date.format("%y%m%d"),
            self.seller,
            self.item
        )
    }
}
