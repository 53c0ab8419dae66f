//! Document export

use std::collections::BTreeMap;

use serde::Serialize;
use sj_core::{BlacklistNode, PreferenceRoot, RuleNode};

use crate::document::DocumentError;
use crate::migrate::CURRENT_VERSION;

#[derive(Serialize)]
struct Document<'a> {
    version: u64,
    rule: u8,
    private: u8,
    ping: bool,
    urls: BTreeMap<&'a str, SiteEntry<'a>>,
    rules: ListRoot<'a>,
}

#[derive(Serialize)]
struct SiteEntry<'a> {
    rule: Option<u8>,
    rules: ListRoot<'a>,
    urls: BTreeMap<&'a str, SiteEntry<'a>>,
}

#[derive(Serialize)]
struct ListRoot<'a> {
    urls: BTreeMap<&'a str, ListEntry<'a>>,
}

#[derive(Serialize)]
struct ListEntry<'a> {
    rule: Option<bool>,
    urls: BTreeMap<&'a str, ListEntry<'a>>,
}

fn site_entries(node: &RuleNode) -> BTreeMap<&str, SiteEntry<'_>> {
    node.children
        .iter()
        .map(|(label, child)| {
            let entry = SiteEntry {
                rule: child.rule.map(u8::from),
                rules: list_root(&child.blacklist),
                urls: site_entries(child),
            };
            (label.as_str(), entry)
        })
        .collect()
}

fn list_root(node: &BlacklistNode) -> ListRoot<'_> {
    ListRoot {
        urls: list_entries(node),
    }
}

fn list_entries(node: &BlacklistNode) -> BTreeMap<&str, ListEntry<'_>> {
    node.children
        .iter()
        .map(|(label, child)| {
            let entry = ListEntry {
                rule: child.rule,
                urls: list_entries(child),
            };
            (label.as_str(), entry)
        })
        .collect()
}

/// Serialize preferences as a pretty-printed version 3 document.
pub fn export_document(prefs: &PreferenceRoot) -> Result<String, DocumentError> {
    let document = Document {
        version: CURRENT_VERSION,
        rule: u8::from(prefs.default_policy),
        private: u8::from(prefs.default_private_policy),
        ping: prefs.block_ping,
        urls: site_entries(&prefs.site_rules),
        rules: list_root(&prefs.global_blacklist),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_document;
    use sj_core::{Policy, SaveValue};

    #[test]
    fn test_export_shape() {
        let mut prefs = PreferenceRoot::default();
        prefs
            .site_rules
            .save(&["live.com"], SaveValue::Policy(Some(Policy::Filtered)))
            .unwrap();
        prefs.global_blacklist.save(&["google.com", "apis"], Some(true)).unwrap();

        let text = export_document(&prefs).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "version": 3,
                "rule": 1,
                "private": 1,
                "ping": false,
                "urls": {"live.com": {"rule": 2, "rules": {"urls": {}}, "urls": {}}},
                "rules": {"urls": {
                    "google.com": {"rule": null, "urls": {"apis": {"rule": true, "urls": {}}}}
                }}
            })
        );
    }

    #[test]
    fn test_export_then_import() {
        let mut prefs = PreferenceRoot::default();
        prefs.block_ping = true;
        prefs.default_private_policy = Policy::BlockAll;
        prefs
            .site_rules
            .save(&["a.com", "www", "/x"], SaveValue::Script(&["b.com", "cdn"], Some(false)))
            .unwrap();

        let text = export_document(&prefs).unwrap();
        let imported = parse_document(&text).unwrap();
        assert_eq!(imported.prefs, prefs);
        assert!(imported.warnings.is_empty());
    }

    #[test]
    fn test_export_sorted_keys() {
        let mut prefs = PreferenceRoot::default();
        for site in ["zeta.com", "alpha.com", "mid.org"] {
            prefs
                .site_rules
                .save(&[site], SaveValue::Policy(Some(Policy::AllowAll)))
                .unwrap();
        }
        let text = export_document(&prefs).unwrap();
        let alpha = text.find("alpha.com").unwrap();
        let mid = text.find("mid.org").unwrap();
        let zeta = text.find("zeta.com").unwrap();
        assert!(alpha < mid && mid < zeta);
    }
}
