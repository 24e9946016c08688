//! Prefill a mapping template before manual review.
//!
//! Exact key equality wins first; remaining order keys take the closest unused
//! catalog key by Jaro-Winkler similarity. No catalog key is proposed twice,
//! so a template saved unedited always passes registry validation.

use std::collections::HashSet;

use strsim::jaro_winkler;

use crate::registry::Mapping;

/// Minimum similarity for a fuzzy suggestion.
pub const SUGGEST_THRESHOLD: f64 = 0.85;

pub fn suggest_mapping(order_keys: &[String], catalog_keys: &[String]) -> Mapping {
    let mut used: HashSet<&str> = HashSet::new();
    let mut mapping = Mapping::new();

    let catalog: HashSet<&str> = catalog_keys.iter().map(String::as_str).collect();
    for key in order_keys {
        if catalog.contains(key.as_str()) && used.insert(key.as_str()) {
            mapping.insert(key.clone(), Some(key.clone()));
        }
    }

    for key in order_keys {
        if mapping.contains_key(key) {
            continue;
        }
        let best = catalog_keys
            .iter()
            .filter(|c| !used.contains(c.as_str()))
            .map(|c| (c, jaro_winkler(key, c)))
            .filter(|(_, score)| *score >= SUGGEST_THRESHOLD)
            .fold(None::<(&String, f64)>, |best, cand| match best {
                Some((_, s)) if s >= cand.1 => best,
                _ => Some(cand),
            });

        match best {
            Some((catalog_key, score)) => {
                log::debug!("suggest '{key}' -> '{catalog_key}' ({score:.3})");
                used.insert(catalog_key.as_str());
                mapping.insert(key.clone(), Some(catalog_key.clone()));
            }
            None => {
                mapping.insert(key.clone(), None);
            }
        }
    }

    mapping
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::validate;

    fn keys(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_matches_win() {
        let m = suggest_mapping(&keys(&["사과(1kg)"]), &keys(&["사과(1kg)", "사과(2kg)"]));
        assert_eq!(m["사과(1kg)"].as_deref(), Some("사과(1kg)"));
    }

    #[test]
    fn near_miss_is_suggested() {
        let m = suggest_mapping(
            &keys(&["유기농 사과(1kg)"]),
            &keys(&["유기농 사과 (1kg)", "바나나(1송이)"]),
        );
        assert_eq!(m["유기농 사과(1kg)"].as_deref(), Some("유기농 사과 (1kg)"));
    }

    #[test]
    fn unrelated_keys_stay_unmatched() {
        let m = suggest_mapping(&keys(&["tumbler"]), &keys(&["rice(10kg)"]));
        assert_eq!(m["tumbler"], None);
    }

    #[test]
    fn suggestions_never_share_a_target() {
        let m = suggest_mapping(
            &keys(&["apple pie(1)", "apple pie(2)", "apple pie(1)x"]),
            &keys(&["apple pie(1)"]),
        );
        assert!(validate(&m).is_ok());
        assert_eq!(m["apple pie(1)"].as_deref(), Some("apple pie(1)"));
        assert_eq!(m["apple pie(2)"], None);
    }
}
