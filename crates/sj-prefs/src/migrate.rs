//! One-way migration of legacy document shapes
//!
//! Version 1 stored every level as an array of `{name, ...}` records
//! (`domains`, `sites`, `pages`). Version 2 switched the policy tree to maps
//! but kept the script lists as version 1 arrays under a separate
//! `blackwhitelist` member. Both are rewritten into the version 3 shape
//! before import; nothing past this module sees them.

use serde_json::{json, Map, Value};

use crate::document::{DocumentError, Warning};

/// Version written by this crate.
pub const CURRENT_VERSION: u64 = 3;

const LEVELS: [&str; 3] = ["domains", "sites", "pages"];

/// Detect the version of a document.
pub fn detect_version(value: &Value) -> Result<u64, DocumentError> {
    let object = value.as_object().ok_or_else(|| DocumentError::WrongShape {
        path: String::new(),
        expected: "an object",
    })?;

    if let Some(version) = object.get("version") {
        return version.as_u64().ok_or_else(|| DocumentError::WrongShape {
            path: "/version".to_string(),
            expected: "an unsigned integer",
        });
    }

    match object.get("policy").and_then(Value::as_object) {
        Some(policy) if policy.contains_key("domains") => Ok(1),
        Some(_) => Ok(2),
        None => Ok(CURRENT_VERSION),
    }
}

/// A document rewritten into the current shape.
#[derive(Debug)]
pub struct Migrated {
    pub document: Value,
    /// Version the document was written in
    pub from_version: u64,
    /// Unknown legacy members, dropped during the rewrite
    pub warnings: Vec<Warning>,
}

/// Rewrite `value` into the current shape.
pub fn migrate(value: Value) -> Result<Migrated, DocumentError> {
    let from_version = detect_version(&value)?;
    let mut legacy = Legacy::default();
    let document = match from_version {
        1 | 2 => {
            log::info!("migrating preferences from version {}", from_version);
            legacy.root(&value, from_version)?
        }
        CURRENT_VERSION => value,
        other => return Err(DocumentError::UnsupportedVersion(other)),
    };
    Ok(Migrated {
        document,
        from_version,
        warnings: legacy.warnings,
    })
}

fn wrong_shape(path: &str, expected: &'static str) -> DocumentError {
    DocumentError::WrongShape {
        path: path.to_string(),
        expected,
    }
}

/// `firstRun` is a storage flag written next to the preferences.
const LEGACY_ROOT_FIELDS: &[&str] = &["policy", "blackwhitelist", "firstRun"];
const LEGACY_POLICY_FIELDS: [&[&str]; 2] = [
    &["rule", "private", "ping", "domains"],
    &["rule", "private", "ping", "urls"],
];
const LEGACY_SITE_FIELDS: [&[&str]; 3] = [
    &["name", "rule", "rules", "sites"],
    &["name", "rule", "rules", "pages"],
    &["name", "rule", "rules"],
];
const LEGACY_MAP_SITE_FIELDS: &[&str] = &["rule", "rules", "urls"];
const LEGACY_LIST_ROOT_FIELDS: &[&str] = &["domains"];
const LEGACY_LIST_FIELDS: [&[&str]; 2] = [&["name", "rule", "sites"], &["name", "rule"]];

#[derive(Default)]
struct Legacy {
    warnings: Vec<Warning>,
}

impl Legacy {
    fn check_fields(&mut self, object: &Map<String, Value>, known: &[&str], path: &str) {
        for key in object.keys() {
            if !known.contains(&key.as_str()) {
                self.warnings.push(Warning::UnknownField {
                    path: format!("{}/{}", path, key),
                });
            }
        }
    }

    fn root(&mut self, value: &Value, version: u64) -> Result<Value, DocumentError> {
        if let Some(object) = value.as_object() {
            self.check_fields(object, LEGACY_ROOT_FIELDS, "");
        }

        let empty = Map::new();
        let policy = match value.get("policy") {
            Some(policy) => policy.as_object().ok_or_else(|| wrong_shape("/policy", "an object"))?,
            None => &empty,
        };
        let v1 = version == 1;
        self.check_fields(policy, LEGACY_POLICY_FIELDS[usize::from(!v1)], "/policy");

        let urls = match (v1, policy.get("domains"), policy.get("urls")) {
            (true, Some(domains), _) => self.sites_from_array(domains, "/policy/domains", 0)?,
            (false, _, Some(urls)) => self.sites_from_map(urls, "/policy/urls")?,
            _ => Value::Object(Map::new()),
        };

        let rules = match value.get("blackwhitelist") {
            Some(list) => self.list_root(list, "/blackwhitelist")?,
            None => json!({ "urls": {} }),
        };

        let mut out = Map::new();
        out.insert("version".to_string(), json!(CURRENT_VERSION));
        for key in ["rule", "private", "ping"] {
            if let Some(scalar) = policy.get(key) {
                out.insert(key.to_string(), scalar.clone());
            }
        }
        out.insert("urls".to_string(), urls);
        out.insert("rules".to_string(), rules);
        Ok(Value::Object(out))
    }

    /// `{"domains": [...]}` (a script list in either legacy version)
    fn list_root(&mut self, value: &Value, path: &str) -> Result<Value, DocumentError> {
        let object = value.as_object().ok_or_else(|| wrong_shape(path, "an object"))?;
        self.check_fields(object, LEGACY_LIST_ROOT_FIELDS, path);

        let urls = match object.get("domains") {
            Some(domains) => self.list_from_array(domains, &format!("{}/domains", path), 0)?,
            None => Value::Object(Map::new()),
        };
        Ok(json!({ "urls": urls }))
    }

    /// `[{name, rule?, sites?: [...]}]` into `{name: {rule, urls}}`
    fn list_from_array(&mut self, value: &Value, path: &str, level: usize) -> Result<Value, DocumentError> {
        let items = value.as_array().ok_or_else(|| wrong_shape(path, "an array"))?;

        let mut urls = Map::new();
        for (i, item) in items.iter().enumerate() {
            let item_path = format!("{}/{}", path, i);
            let (name, record) = named_record(item, &item_path)?;
            self.check_fields(record, LEGACY_LIST_FIELDS[level], &item_path);

            let children = match record.get(LEVELS[level + 1]) {
                Some(sub) if level == 0 => {
                    self.list_from_array(sub, &format!("{}/{}", item_path, LEVELS[level + 1]), level + 1)?
                }
                _ => Value::Object(Map::new()),
            };
            urls.insert(
                name,
                json!({
                    "rule": record.get("rule").cloned().unwrap_or(Value::Null),
                    "urls": children,
                }),
            );
        }
        Ok(Value::Object(urls))
    }

    /// Version 1 site levels (`domains` > `sites` > `pages`) into site nodes
    fn sites_from_array(&mut self, value: &Value, path: &str, level: usize) -> Result<Value, DocumentError> {
        let items = value.as_array().ok_or_else(|| wrong_shape(path, "an array"))?;

        let mut urls = Map::new();
        for (i, item) in items.iter().enumerate() {
            let item_path = format!("{}/{}", path, i);
            let (name, record) = named_record(item, &item_path)?;
            self.check_fields(record, LEGACY_SITE_FIELDS[level], &item_path);

            let children = match LEVELS.get(level + 1).and_then(|key| record.get(*key)) {
                Some(sub) => {
                    self.sites_from_array(sub, &format!("{}/{}", item_path, LEVELS[level + 1]), level + 1)?
                }
                None => Value::Object(Map::new()),
            };
            let rules = match record.get("rules") {
                Some(rules) => self.list_root(rules, &format!("{}/rules", item_path))?,
                None => json!({ "urls": {} }),
            };
            urls.insert(
                name,
                json!({
                    "rule": record.get("rule").cloned().unwrap_or(Value::Null),
                    "rules": rules,
                    "urls": children,
                }),
            );
        }
        Ok(Value::Object(urls))
    }

    /// Version 2 site maps, whose script lists are still version 1 arrays
    fn sites_from_map(&mut self, value: &Value, path: &str) -> Result<Value, DocumentError> {
        let object = value.as_object().ok_or_else(|| wrong_shape(path, "an object"))?;

        let mut urls = Map::new();
        for (label, node) in object {
            let node_path = format!("{}/{}", path, label);
            let record = node.as_object().ok_or_else(|| wrong_shape(&node_path, "an object"))?;
            self.check_fields(record, LEGACY_MAP_SITE_FIELDS, &node_path);

            let rules = match record.get("rules") {
                Some(rules) => self.list_root(rules, &format!("{}/rules", node_path))?,
                None => json!({ "urls": {} }),
            };
            let children = match record.get("urls") {
                Some(children) => self.sites_from_map(children, &format!("{}/urls", node_path))?,
                None => Value::Object(Map::new()),
            };
            urls.insert(
                label.clone(),
                json!({
                    "rule": record.get("rule").cloned().unwrap_or(Value::Null),
                    "rules": rules,
                    "urls": children,
                }),
            );
        }
        Ok(Value::Object(urls))
    }
}

fn named_record<'a>(item: &'a Value, path: &str) -> Result<(String, &'a Map<String, Value>), DocumentError> {
    let record = item.as_object().ok_or_else(|| wrong_shape(path, "an object"))?;
    let name = record
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| wrong_shape(&format!("{}/name", path), "a string"))?;
    Ok((name.to_string(), record))
}
