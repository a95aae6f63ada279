use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::db::SharedDatabase;

/// Tag fragments that flag an address. Matched as substrings, so `tornado_cash_v2` counts.
pub const FLAG_MARKERS: &[&str] = &["sanctioned", "ofac", "mixer", "tornado_cash"];

pub const SANCTION_MARKERS: &[&str] = &["sanctioned", "ofac"];
pub const MIXER_MARKERS: &[&str] = &["mixer", "tornado_cash"];
pub const EXCHANGE_MARKERS: &[&str] = &["exchange", "hot_wallet"];
pub const DEFI_MARKERS: &[&str] = &["defi"];

/// True if any tag contains any of the markers.
pub fn has_any(tags: &[String], markers: &[&str]) -> bool {
    tags.iter().any(|tag| markers.iter().any(|m| tag.contains(m)))
}

/// The single "is this address flagged" predicate, used for self-checks and traversal alike.
pub fn is_flagged(tags: &[String]) -> bool {
    has_any(tags, FLAG_MARKERS)
}

/// The subset of tags that made the address flagged, in stored order.
pub fn flag_tags(tags: &[String]) -> Vec<&str> {
    tags.iter()
        .filter(|tag| FLAG_MARKERS.iter().any(|m| tag.contains(m)))
        .map(String::as_str)
        .collect()
}

/// Comma-joined flagging tags, or `None` when the address is not flagged.
pub fn sanction_type(tags: &[String]) -> Option<String> {
    if !is_flagged(tags) {
        return None;
    }
    Some(flag_tags(tags).join(", "))
}

/// Parse one `address;tag1,tag2` row of the tag table.
///
/// Address and tags are lowercased, tags trimmed, empty and duplicate tags dropped.
pub fn parse_tag_row(line: &str) -> Option<(String, Vec<String>)> {
    let (address, tags) = line.split_once(';')?;
    let address = address.trim().to_lowercase();
    if address.is_empty() {
        return None;
    }
    let tags = normalize_tags(tags.split(','));
    if tags.is_empty() {
        return None;
    }
    Some((address, tags))
}

pub fn normalize_tags<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Display label derived from an address's tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletLabel {
    pub label: String,
    pub category: String,
    pub confidence: String,
    pub source: String,
}

/// Read-only address → tags map, built once at startup and shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct TagStore {
    map: HashMap<String, Vec<String>>,
}

impl TagStore {
    /// Load all tags from the database into memory.
    ///
    /// A failing database yields an empty store; analysis then degrades to "Unknown Address".
    pub fn load_from_db(db: &SharedDatabase) -> Self {
        let rows = match db.all_tags() {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Failed to load address tags, continuing with empty tag store: {e}");
                Vec::new()
            }
        };
        let store = Self::from_rows(rows);
        tracing::info!("TagStore loaded {} tagged addresses into memory", store.len());
        store
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        let mut store = Self::empty();
        for (address, tags) in rows {
            store.insert(&address, tags.iter().map(String::as_str));
        }
        store
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Tags for an address in any capitalization; empty if unknown.
    pub fn tags_for(&self, address: &str) -> &[String] {
        self.map
            .get(&address.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn insert<'a>(&mut self, address: &str, tags: impl IntoIterator<Item = &'a str>) {
        self.map.insert(address.to_lowercase(), normalize_tags(tags));
    }

    pub fn label_for(&self, address: &str) -> Option<WalletLabel> {
        let tags = self.tags_for(address);
        if tags.is_empty() {
            return None;
        }

        let category = if has_any(tags, &["exchange"]) {
            "Exchange"
        } else if has_any(tags, DEFI_MARKERS) {
            "DeFi"
        } else if has_any(tags, &["sanctioned"]) {
            "Sanctioned"
        } else if has_any(tags, &["mixer"]) {
            "Mixer"
        } else {
            "Unknown"
        };

        Some(WalletLabel {
            label: tags.join(", "),
            category: category.to_string(),
            confidence: "High".to_string(),
            source: "Internal Database".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn predicate_matches_substrings() {
        assert!(is_flagged(&tags(&["tornado_cash_v2"])));
        assert!(is_flagged(&tags(&["ofac_sdn"])));
        assert!(is_flagged(&tags(&["exchange", "mixer"])));
        assert!(!is_flagged(&tags(&["exchange", "hot_wallet", "defi"])));
        assert!(!is_flagged(&[]));
    }

    #[test]
    fn sanction_type_joins_matching_tags_only() {
        let t = tags(&["sanctioned", "exchange", "ofac"]);
        assert_eq!(flag_tags(&t), vec!["sanctioned", "ofac"]);
        assert_eq!(sanction_type(&t).as_deref(), Some("sanctioned, ofac"));
        assert_eq!(sanction_type(&tags(&["defi"])), None);
    }

    #[test]
    fn sanction_type_agrees_with_predicate() {
        for list in [
            &["tornado_cash_v2"][..],
            &["exchange", "ofac_sdn"],
            &["hot_wallet", "defi"],
            &[],
        ] {
            let t = tags(list);
            assert_eq!(sanction_type(&t).is_some(), is_flagged(&t), "tags: {list:?}");
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut store = TagStore::empty();
        store.insert("0xD5ED34B52AC4AB84D8FA8A231A3218BBF01ED510", ["Sanctioned", "OFAC"]);
        assert_eq!(
            store.tags_for("0xd5ed34b52ac4ab84d8fa8a231a3218bbf01ed510"),
            &["sanctioned".to_string(), "ofac".to_string()]
        );
        assert_eq!(
            store.tags_for("0xd5ED34b52AC4ab84d8FA8A231a3218bbF01Ed510"),
            store.tags_for("0xD5ED34B52AC4AB84D8FA8A231A3218BBF01ED510")
        );
        assert!(store.tags_for("0x0000000000000000000000000000000000000001").is_empty());
    }

    #[test]
    fn parse_row_normalizes() {
        let (addr, t) = parse_tag_row("0xABC; Exchange , hot_wallet,,exchange").unwrap();
        assert_eq!(addr, "0xabc");
        assert_eq!(t, tags(&["exchange", "hot_wallet"]));
        assert!(parse_tag_row("0xabc").is_none());
        assert!(parse_tag_row("0xabc;").is_none());
        assert!(parse_tag_row(";mixer").is_none());
    }

    #[test]
    fn label_category_priority() {
        let mut store = TagStore::empty();
        store.insert("0x1", ["sanctioned", "exchange"]);
        store.insert("0x2", ["mixer"]);
        store.insert("0x3", ["whale"]);
        assert_eq!(store.label_for("0x1").unwrap().category, "Exchange");
        assert_eq!(store.label_for("0x1").unwrap().label, "sanctioned, exchange");
        assert_eq!(store.label_for("0x2").unwrap().category, "Mixer");
        assert_eq!(store.label_for("0x3").unwrap().category, "Unknown");
        assert!(store.label_for("0x4").is_none());
    }
}
