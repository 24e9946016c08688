//! Join keys: `name` or `name(option)`, built the same way on both sides.

use std::collections::BTreeSet;

use crate::model::{CellValue, RowSet, CATALOG_COMPOSITION_FIELD, CATALOG_PRODUCT_FIELD};

/// Which columns of a row-set feed the join key.
#[derive(Debug, Clone, Copy)]
pub struct KeyColumns {
    pub name: usize,
    pub option: Option<usize>,
}

impl KeyColumns {
    /// Resolve column names against a row-set. `None` when the name column is absent.
    ///
    /// An option column that is designated but not present is ignored.
    pub fn resolve(rows: &RowSet, name_field: &str, option_field: Option<&str>) -> Option<Self> {
        let name = rows.column_index(name_field)?;
        let option = option_field.and_then(|f| rows.column_index(f));
        Some(Self { name, option })
    }

    /// Key columns of a catalog row-set (`상품명` + `구성`).
    pub fn catalog(rows: &RowSet) -> Option<Self> {
        let name = rows.column_index(CATALOG_PRODUCT_FIELD)?;
        let option = rows.column_index(CATALOG_COMPOSITION_FIELD)?;
        Some(Self {
            name,
            option: Some(option),
        })
    }

    pub fn key_of(&self, row: &[CellValue]) -> String {
        let cell = |idx: usize| row.get(idx).map(CellValue::trimmed).unwrap_or_default();
        build_key(&cell(self.name), self.option.map(cell).as_deref())
    }
}

/// `trim(name)` or `trim(name)(trim(option))`. Missing parts are empty strings.
pub fn build_key(name: &str, option: Option<&str>) -> String {
    match option {
        Some(option) => format!("{}({})", name.trim(), option.trim()),
        None => name.trim().to_string(),
    }
}

/// Sorted distinct keys of a row-set.
pub fn unique_keys(rows: &RowSet, columns: KeyColumns) -> Vec<String> {
    rows.rows
        .iter()
        .map(|r| columns.key_of(r))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted distinct catalog keys, skipping rows whose key would be blank.
pub fn catalog_keys(catalog: &RowSet) -> Vec<String> {
    let Some(columns) = KeyColumns::catalog(catalog) else {
        return Vec::new();
    };
    unique_keys(catalog, columns)
        .into_iter()
        .filter(|k| k != "()")
        .collect()
}
