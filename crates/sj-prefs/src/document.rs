//! Document import
//!
//! Builds a [`PreferenceRoot`] from a version 3 document. Shape errors are
//! fatal and carry the `/`-joined location of the offending member; unknown
//! members are dropped and reported as warnings.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};
use sj_core::{
    BlacklistNode, Policy, PreferenceRoot, RootSettings, RuleNode, MAX_LIST_DEPTH, MAX_SITE_DEPTH,
};

use crate::migrate::migrate;

/// Error type for document import.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{path}: expected {expected}")]
    WrongShape { path: String, expected: &'static str },
    #[error("{path}: invalid policy {value}, expected 0..=3 or null")]
    InvalidPolicy { path: String, value: String },
    #[error("{path}: nested deeper than {max} levels")]
    TooDeep { path: String, max: usize },
    #[error("unsupported document version {0}")]
    UnsupportedVersion(u64),
}

/// Non-fatal import finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    UnknownField { path: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnknownField { path } => write!(f, "{}: unknown field dropped", path),
        }
    }
}

/// Result of a successful import.
#[derive(Debug)]
pub struct Imported {
    pub prefs: PreferenceRoot,
    /// Top-level settings the document actually carries
    pub settings: RootSettings,
    pub warnings: Vec<Warning>,
    /// Version the document was written in before migration
    pub from_version: u64,
}

/// Parse a document in any supported version.
pub fn parse_document(text: &str) -> Result<Imported, DocumentError> {
    let value: Value = serde_json::from_str(text)?;
    parse_value(value)
}

/// Build preferences from an already parsed document.
pub fn parse_value(value: Value) -> Result<Imported, DocumentError> {
    let migrated = migrate(value)?;
    let mut reader = Reader {
        warnings: migrated.warnings,
    };
    let (prefs, settings) = reader.root(&migrated.document)?;

    for warning in &reader.warnings {
        log::warn!("{}", warning);
    }
    Ok(Imported {
        prefs,
        settings,
        warnings: reader.warnings,
        from_version: migrated.from_version,
    })
}

// =============================================================================
// Reader
// =============================================================================

const ROOT_FIELDS: &[&str] = &["version", "rule", "private", "ping", "urls", "rules"];
const SITE_FIELDS: &[&str] = &["rule", "rules", "urls"];
const LIST_FIELDS: &[&str] = &["rule", "urls"];
const LIST_ROOT_FIELDS: &[&str] = &["urls"];

struct Reader {
    warnings: Vec<Warning>,
}

fn join(path: &str, key: &str) -> String {
    format!("{}/{}", path, key)
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, DocumentError> {
    value.as_object().ok_or_else(|| DocumentError::WrongShape {
        path: path.to_string(),
        expected: "an object",
    })
}

impl Reader {
    fn check_fields(&mut self, object: &Map<String, Value>, known: &[&str], path: &str) {
        for key in object.keys() {
            if !known.contains(&key.as_str()) {
                self.warnings.push(Warning::UnknownField {
                    path: join(path, key),
                });
            }
        }
    }

    fn root(&mut self, value: &Value) -> Result<(PreferenceRoot, RootSettings), DocumentError> {
        let object = as_object(value, "")?;
        self.check_fields(object, ROOT_FIELDS, "");

        let default_policy = match object.get("rule") {
            Some(rule) => Some(required_policy(rule, "/rule")?),
            None => None,
        };
        let default_private_policy = match object.get("private") {
            Some(rule) => Some(required_policy(rule, "/private")?),
            None => None,
        };
        let block_ping = match object.get("ping") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(ping)) => Some(*ping),
            Some(_) => {
                return Err(DocumentError::WrongShape {
                    path: "/ping".to_string(),
                    expected: "a boolean",
                })
            }
        };

        let mut site_rules = RuleNode::new();
        if let Some(urls) = object.get("urls") {
            site_rules.children = self.site_children(urls, "/urls", 1)?;
        }
        let global_blacklist = match object.get("rules") {
            Some(rules) => self.list_root(rules, "/rules")?,
            None => BlacklistNode::new(),
        };

        let settings = RootSettings {
            default_policy,
            default_private_policy,
            block_ping,
        };
        let mut prefs = PreferenceRoot {
            site_rules,
            global_blacklist,
            ..PreferenceRoot::default()
        };
        prefs.apply_settings(&settings);
        Ok((prefs, settings))
    }

    fn site_children(
        &mut self,
        value: &Value,
        path: &str,
        depth: usize,
    ) -> Result<BTreeMap<String, RuleNode>, DocumentError> {
        let object = as_object(value, path)?;
        if depth > MAX_SITE_DEPTH {
            if object.is_empty() {
                return Ok(BTreeMap::new());
            }
            return Err(DocumentError::TooDeep {
                path: path.to_string(),
                max: MAX_SITE_DEPTH,
            });
        }

        let mut children = BTreeMap::new();
        for (label, child) in object {
            let child_path = join(path, label);
            if depth == 1 && label.is_empty() {
                return Err(DocumentError::WrongShape {
                    path: child_path,
                    expected: "a non-empty domain",
                });
            }
            children.insert(label.clone(), self.site_node(child, &child_path, depth)?);
        }
        Ok(children)
    }

    fn site_node(&mut self, value: &Value, path: &str, depth: usize) -> Result<RuleNode, DocumentError> {
        let object = as_object(value, path)?;
        self.check_fields(object, SITE_FIELDS, path);

        let rule = match object.get("rule") {
            Some(rule) => optional_policy(rule, &join(path, "rule"))?,
            None => None,
        };
        let blacklist = match object.get("rules") {
            Some(rules) => self.list_root(rules, &join(path, "rules"))?,
            None => BlacklistNode::new(),
        };
        let children = match object.get("urls") {
            Some(urls) => self.site_children(urls, &join(path, "urls"), depth + 1)?,
            None => BTreeMap::new(),
        };

        Ok(RuleNode {
            rule,
            blacklist,
            children,
        })
    }

    fn list_root(&mut self, value: &Value, path: &str) -> Result<BlacklistNode, DocumentError> {
        let object = as_object(value, path)?;
        self.check_fields(object, LIST_ROOT_FIELDS, path);

        let mut root = BlacklistNode::new();
        if let Some(urls) = object.get("urls") {
            root.children = self.list_children(urls, &join(path, "urls"), 1)?;
        }
        Ok(root)
    }

    fn list_children(
        &mut self,
        value: &Value,
        path: &str,
        depth: usize,
    ) -> Result<BTreeMap<String, BlacklistNode>, DocumentError> {
        let object = as_object(value, path)?;
        if depth > MAX_LIST_DEPTH {
            if object.is_empty() {
                return Ok(BTreeMap::new());
            }
            return Err(DocumentError::TooDeep {
                path: path.to_string(),
                max: MAX_LIST_DEPTH,
            });
        }

        let mut children = BTreeMap::new();
        for (label, child) in object {
            let child_path = join(path, label);
            if depth == 1 && label.is_empty() {
                return Err(DocumentError::WrongShape {
                    path: child_path,
                    expected: "a non-empty domain",
                });
            }

            let node = as_object(child, &child_path)?;
            self.check_fields(node, LIST_FIELDS, &child_path);
            let rule = match node.get("rule") {
                None | Some(Value::Null) => None,
                Some(Value::Bool(rule)) => Some(*rule),
                Some(_) => {
                    return Err(DocumentError::WrongShape {
                        path: join(&child_path, "rule"),
                        expected: "a boolean or null",
                    })
                }
            };
            let grandchildren = match node.get("urls") {
                Some(urls) => self.list_children(urls, &join(&child_path, "urls"), depth + 1)?,
                None => BTreeMap::new(),
            };

            children.insert(
                label.clone(),
                BlacklistNode {
                    rule,
                    children: grandchildren,
                },
            );
        }
        Ok(children)
    }
}

fn optional_policy(value: &Value, path: &str) -> Result<Option<Policy>, DocumentError> {
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_u64()
        .and_then(|n| u8::try_from(n).ok())
        .and_then(|n| Policy::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| DocumentError::InvalidPolicy {
            path: path.to_string(),
            value: value.to_string(),
        })
}

fn required_policy(value: &Value, path: &str) -> Result<Policy, DocumentError> {
    optional_policy(value, path)?.ok_or_else(|| DocumentError::InvalidPolicy {
        path: path.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let imported = parse_document("{}").unwrap();
        assert_eq!(imported.prefs, PreferenceRoot::default());
        assert!(imported.warnings.is_empty());
        assert_eq!(imported.from_version, 3);
        assert_eq!(imported.settings, RootSettings::default());
    }

    #[test]
    fn test_settings_record_presence() {
        let imported = parse_document(r#"{"private": 3, "ping": null}"#).unwrap();
        assert_eq!(
            imported.settings,
            RootSettings {
                default_policy: None,
                default_private_policy: Some(Policy::BlockAll),
                block_ping: None,
            }
        );
        assert_eq!(imported.prefs.default_policy, Policy::Relaxed);
        assert_eq!(imported.prefs.default_private_policy, Policy::BlockAll);
        assert!(!imported.prefs.block_ping);
    }

    #[test]
    fn test_parse_full_node() {
        let text = r#"{
            "version": 3, "rule": 2, "private": 3, "ping": true,
            "urls": {
                "live.com": {
                    "rule": 2,
                    "rules": {"urls": {"1drv.com": {"rule": false, "urls": {}}}},
                    "urls": {"onedrive": {"rule": null, "urls": {"/": {"rule": 0}}}}
                }
            },
            "rules": {"urls": {"google.com": {"rule": null, "urls": {"apis": {"rule": true}}}}}
        }"#;
        let prefs = parse_document(text).unwrap().prefs;

        assert_eq!(prefs.default_policy, Policy::Filtered);
        assert_eq!(prefs.default_private_policy, Policy::BlockAll);
        assert!(prefs.block_ping);

        let live = prefs.site_rules.get(&["live.com"]).unwrap();
        assert_eq!(live.rule, Some(Policy::Filtered));
        assert_eq!(live.blacklist.lookup("1drv.com", ""), Some(false));
        let page = prefs.site_rules.get(&["live.com", "onedrive", "/"]).unwrap();
        assert_eq!(page.rule, Some(Policy::AllowAll));
        assert_eq!(prefs.global_blacklist.lookup("google.com", "apis"), Some(true));
    }

    #[test]
    fn test_unknown_fields_are_reported_and_dropped() {
        let text = r#"{
            "rule": 1, "theme": "dark",
            "urls": {"a.com": {"rule": 1, "note": "x"}},
            "rules": {"urls": {"b.com": {"rule": true, "added": 1}}}
        }"#;
        let imported = parse_document(text).unwrap();
        assert_eq!(
            imported.warnings,
            vec![
                Warning::UnknownField { path: "/theme".to_string() },
                Warning::UnknownField { path: "/urls/a.com/note".to_string() },
                Warning::UnknownField { path: "/rules/urls/b.com/added".to_string() },
            ]
        );
        assert_eq!(imported.prefs.site_rules.rule_count(), 1);
    }

    #[test]
    fn test_invalid_policy_location() {
        let text = r#"{"urls": {"a.com": {"urls": {"www": {"rule": 7}}}}}"#;
        match parse_document(text) {
            Err(DocumentError::InvalidPolicy { path, value }) => {
                assert_eq!(path, "/urls/a.com/urls/www/rule");
                assert_eq!(value, "7");
            }
            other => panic!("unexpected: {:?}", other),
        }

        assert!(matches!(
            parse_document(r#"{"rule": null}"#),
            Err(DocumentError::InvalidPolicy { .. })
        ));
        assert!(matches!(
            parse_document(r#"{"rule": "1"}"#),
            Err(DocumentError::InvalidPolicy { .. })
        ));
    }

    #[test]
    fn test_wrong_shapes() {
        match parse_document(r#"{"urls": []}"#) {
            Err(DocumentError::WrongShape { path, .. }) => assert_eq!(path, "/urls"),
            other => panic!("unexpected: {:?}", other),
        }
        match parse_document(r#"{"rules": {"urls": {"a.com": {"rule": 1}}}}"#) {
            Err(DocumentError::WrongShape { path, .. }) => assert_eq!(path, "/rules/urls/a.com/rule"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            parse_document(r#"{"ping": "yes"}"#),
            Err(DocumentError::WrongShape { .. })
        ));
        assert!(matches!(
            parse_document(r#"{"urls": {"": {}}}"#),
            Err(DocumentError::WrongShape { .. })
        ));
        assert!(matches!(parse_document("[1, 2"), Err(DocumentError::Json(_))));
    }

    #[test]
    fn test_too_deep() {
        let text = r#"{"urls": {"a.com": {"urls": {"www": {"urls": {"p": {"urls": {"x": {}}}}}}}}}"#;
        match parse_document(text) {
            Err(DocumentError::TooDeep { path, max }) => {
                assert_eq!(path, "/urls/a.com/urls/www/urls/p/urls");
                assert_eq!(max, 3);
            }
            other => panic!("unexpected: {:?}", other),
        }

        let text = r#"{"rules": {"urls": {"a.com": {"urls": {"cdn": {"urls": {"x": {}}}}}}}}"#;
        assert!(matches!(
            parse_document(text),
            Err(DocumentError::TooDeep { max: 2, .. })
        ));

        // empty maps at the leaves are fine
        let text = r#"{"rules": {"urls": {"a.com": {"urls": {"cdn": {"rule": true, "urls": {}}}}}}}"#;
        assert!(parse_document(text).is_ok());
    }
}
