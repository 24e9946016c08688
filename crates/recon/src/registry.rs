//! User-confirmed mapping from order keys to catalog keys.
//!
//! The mapping corrects the naive key-equality join: catalogs and order
//! exports name the same product differently. A saved mapping never points
//! two order keys at one catalog key.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ReconError;

/// Order key -> catalog key, or `None` for "not matched".
pub type Mapping = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchPair {
    pub order_key: String,
    pub catalog_key: String,
}

#[derive(Debug, Clone, Default)]
pub struct MatchRegistry {
    mapping: Mapping,
    table: Vec<MatchPair>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store `mapping`, replacing any previous one wholesale.
    ///
    /// On rejection the registry keeps its previous state.
    pub fn save(&mut self, mapping: Mapping) -> Result<&[MatchPair], ReconError> {
        let mapping = normalize(mapping);
        validate(&mapping)?;

        self.table = mapping
            .iter()
            .filter_map(|(order_key, target)| {
                target.as_ref().map(|catalog_key| MatchPair {
                    order_key: order_key.clone(),
                    catalog_key: catalog_key.clone(),
                })
            })
            .collect();
        self.mapping = mapping;
        log::info!(
            "mapping saved: {} order keys, {} matched",
            self.mapping.len(),
            self.table.len()
        );
        Ok(&self.table)
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// `(order_key, catalog_key)` pairs of the saved mapping, null targets excluded.
    pub fn match_table(&self) -> &[MatchPair] {
        &self.table
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn clear(&mut self) {
        self.mapping.clear();
        self.table.clear();
    }
}

/// Trim every target; a blank target becomes `None`.
pub fn normalize(mapping: Mapping) -> Mapping {
    mapping
        .into_iter()
        .map(|(k, v)| {
            let target = v
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());
            (k, target)
        })
        .collect()
}

/// Reject a mapping in which any catalog key is the target of 2+ order keys.
pub fn validate(mapping: &Mapping) -> Result<(), ReconError> {
    let mut by_target: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (order_key, target) in mapping {
        if let Some(target) = target {
            by_target
                .entry(target.as_str())
                .or_default()
                .push(order_key.clone());
        }
    }

    let mut conflicts = by_target.into_iter().filter(|(_, keys)| keys.len() > 1);
    match conflicts.next() {
        None => Ok(()),
        Some((target, order_keys)) => {
            log::warn!("duplicate mapping target '{target}': {order_keys:?}");
            for (other, keys) in conflicts {
                log::warn!("duplicate mapping target '{other}': {keys:?}");
            }
            Err(ReconError::DuplicateMatchTarget {
                target: target.to_string(),
                order_keys,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, Option<&str>)]) -> Mapping {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn duplicate_target_is_rejected() {
        let mut reg = MatchRegistry::new();
        let err = reg
            .save(mapping(&[("X", Some("P1")), ("Y", Some("P1"))]))
            .unwrap_err();
        match err {
            ReconError::DuplicateMatchTarget { target, order_keys } => {
                assert_eq!(target, "P1");
                assert_eq!(order_keys, vec!["X", "Y"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejected_save_keeps_previous_state() {
        let mut reg = MatchRegistry::new();
        reg.save(mapping(&[("X", Some("P1"))])).unwrap();
        assert!(reg
            .save(mapping(&[("X", Some("P2")), ("Y", Some("P2"))]))
            .is_err());
        assert_eq!(reg.match_table().len(), 1);
        assert_eq!(reg.match_table()[0].catalog_key, "P1");
    }

    #[test]
    fn null_targets_are_excluded_from_table() {
        let mut reg = MatchRegistry::new();
        let table = reg
            .save(mapping(&[("X", Some("P1")), ("Y", None), ("Z", None)]))
            .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(reg.mapping().len(), 3);
    }

    #[test]
    fn repeated_null_targets_are_not_conflicts() {
        assert!(validate(&mapping(&[("X", None), ("Y", None)])).is_ok());
    }

    #[test]
    fn blank_target_counts_as_null() {
        let mut reg = MatchRegistry::new();
        reg.save(mapping(&[("X", Some(" ")), ("Y", Some(""))])).unwrap();
        assert!(reg.is_empty());
        assert_eq!(reg.mapping()["X"], None);
    }

    #[test]
    fn padded_duplicate_target_is_rejected() {
        let mut reg = MatchRegistry::new();
        let err = reg
            .save(mapping(&[("X", Some("P1")), ("Y", Some(" P1 "))]))
            .unwrap_err();
        assert!(matches!(err, ReconError::DuplicateMatchTarget { ref target, .. } if target == "P1"));
        assert!(reg.is_empty());
    }

    #[test]
    fn targets_are_stored_trimmed() {
        let mut reg = MatchRegistry::new();
        reg.save(mapping(&[("X", Some("  P1\t"))])).unwrap();
        assert_eq!(reg.match_table()[0].catalog_key, "P1");
        assert_eq!(reg.mapping()["X"].as_deref(), Some("P1"));
    }

    #[test]
    fn save_replaces_wholesale() {
        let mut reg = MatchRegistry::new();
        reg.save(mapping(&[("X", Some("P1")), ("Y", Some("P2"))])).unwrap();
        reg.save(mapping(&[("Z", Some("P3"))])).unwrap();
        assert_eq!(reg.mapping().len(), 1);
        assert_eq!(reg.match_table()[0].order_key, "Z");
    }
}
