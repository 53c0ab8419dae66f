//! Layered rule tree
//!
//! Two node kinds make up the configuration:
//!
//! - [`RuleNode`]: one segment of a site address (domain, then subdomain,
//!   then page). Holds an optional [`Policy`], the script list contributed at
//!   that level, and child segments.
//! - [`BlacklistNode`]: one segment of a script origin (domain, then
//!   subdomain). Holds an optional block bit and child segments.
//!
//! `None` everywhere means "inherit from the enclosing level". Paths are
//! bounded: three labels for sites, two for script origins, so every walk
//! below is a fixed-size loop.

use std::collections::BTreeMap;

use crate::types::Policy;

/// Maximum labels in a site path (domain, subdomain, page).
pub const MAX_SITE_DEPTH: usize = 3;

/// Maximum labels in a script origin path (domain, subdomain).
pub const MAX_LIST_DEPTH: usize = 2;

/// Error type for rule edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("rule path is empty")]
    EmptyPath,
    #[error("rule path has {depth} labels, at most {max} allowed")]
    PathTooDeep { depth: usize, max: usize },
    #[error("rule path starts with an empty domain label")]
    EmptyLabel,
    #[error("no private window is open")]
    NoPrivateOverlay,
    #[error("the default policy cannot be cleared")]
    CannotClearDefault,
}

fn check_path(path: &[&str], max: usize) -> Result<(), RuleError> {
    match path.first() {
        None => Err(RuleError::EmptyPath),
        Some(_) if path.len() > max => Err(RuleError::PathTooDeep {
            depth: path.len(),
            max,
        }),
        Some(domain) if domain.is_empty() => Err(RuleError::EmptyLabel),
        Some(_) => Ok(()),
    }
}

// =============================================================================
// Script List Nodes
// =============================================================================

/// Script origin allow/block tree.
///
/// `rule = Some(true)` blocks, `Some(false)` allows.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BlacklistNode {
    pub rule: Option<bool>,
    pub children: BTreeMap<String, BlacklistNode>,
}

impl BlacklistNode {
    /// Create an empty node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a leaf holding `rule`.
    pub fn with_rule(rule: Option<bool>) -> Self {
        Self {
            rule,
            children: BTreeMap::new(),
        }
    }

    /// Build the minimal single-path tree that sets `rule` at `path`.
    pub fn fragment(path: &[&str], rule: Option<bool>) -> Result<Self, RuleError> {
        let mut root = Self::new();
        root.save(path, rule)?;
        Ok(root)
    }

    /// Check if the node carries nothing.
    pub fn is_empty(&self) -> bool {
        self.rule.is_none() && self.children.is_empty()
    }

    /// Get a child by label.
    #[inline]
    pub fn child(&self, label: &str) -> Option<&BlacklistNode> {
        self.children.get(label)
    }

    /// Set the rule at `path`, creating intermediate nodes.
    pub fn save(&mut self, path: &[&str], rule: Option<bool>) -> Result<(), RuleError> {
        check_path(path, MAX_LIST_DEPTH)?;

        let mut node = self;
        for label in path {
            node = node.children.entry((*label).to_string()).or_default();
        }
        node.rule = rule;
        Ok(())
    }

    /// Fold `from` into `self`.
    ///
    /// For every key of `from` the node is created if missing, its rule is
    /// taken from `from` when that is set, and children are merged the same
    /// way. Keys only present in `self` are left untouched.
    pub fn merge_from(&mut self, from: &BlacklistNode) {
        self.merge_at(from, 0);
    }

    fn merge_at(&mut self, from: &BlacklistNode, depth: usize) {
        if from.rule.is_some() {
            self.rule = from.rule;
        }
        if depth == MAX_LIST_DEPTH {
            return;
        }
        for (label, child) in &from.children {
            self.children
                .entry(label.clone())
                .or_default()
                .merge_at(child, depth + 1);
        }
    }

    /// Look up the effective rule for a script origin.
    ///
    /// The subdomain entry wins over the domain entry when both are set.
    pub fn lookup(&self, domain: &str, subdomain: &str) -> Option<bool> {
        let domain_node = self.children.get(domain)?;
        domain_node
            .children
            .get(subdomain)
            .and_then(|sub| sub.rule)
            .or(domain_node.rule)
    }

    /// Structurally independent copy.
    pub fn fork(&self) -> Self {
        Self {
            rule: self.rule,
            children: self
                .children
                .iter()
                .map(|(label, child)| (label.clone(), child.fork()))
                .collect(),
        }
    }

    /// Drop descendants that carry nothing. Returns `true` if `self` is empty
    /// afterwards.
    pub fn prune(&mut self) -> bool {
        self.children.retain(|_, child| !child.prune());
        self.is_empty()
    }

    /// Number of set rules in the tree (including `self`).
    pub fn rule_count(&self) -> usize {
        usize::from(self.rule.is_some())
            + self.children.values().map(BlacklistNode::rule_count).sum::<usize>()
    }
}

// =============================================================================
// Site Policy Nodes
// =============================================================================

/// Value written by [`RuleNode::save`].
#[derive(Debug, PartialEq, Eq)]
pub enum SaveValue<'a> {
    /// Assign (or clear) the node's policy.
    Policy(Option<Policy>),
    /// Merge a script list fragment into the node's script list.
    Fragment(BlacklistNode),
    /// Assign (or clear) one script origin rule in the node's script list.
    Script(&'a [&'a str], Option<bool>),
}

/// Site policy tree node.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RuleNode {
    pub rule: Option<Policy>,
    pub blacklist: BlacklistNode,
    pub children: BTreeMap<String, RuleNode>,
}

/// Effective policy and script list for an address.
#[derive(Debug, PartialEq, Eq)]
pub struct Resolved {
    pub policy: Policy,
    pub blacklist: BlacklistNode,
    /// Number of path labels that matched a node (0 = defaults only)
    pub depth: usize,
}

impl RuleNode {
    /// Create an empty node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the node carries nothing.
    pub fn is_empty(&self) -> bool {
        self.rule.is_none() && self.blacklist.is_empty() && self.children.is_empty()
    }

    /// Get the node at `path`, if every label exists.
    pub fn get(&self, path: &[&str]) -> Option<&RuleNode> {
        let mut node = self;
        for label in path.iter().take(MAX_SITE_DEPTH) {
            node = node.children.get(*label)?;
        }
        Some(node)
    }

    /// Write `value` at `path`, creating intermediate nodes.
    pub fn save(&mut self, path: &[&str], value: SaveValue<'_>) -> Result<(), RuleError> {
        check_path(path, MAX_SITE_DEPTH)?;
        if let SaveValue::Script(origin, _) = &value {
            check_path(origin, MAX_LIST_DEPTH)?;
        }

        let mut node = self;
        for label in path {
            node = node.children.entry((*label).to_string()).or_default();
        }

        match value {
            SaveValue::Policy(policy) => node.rule = policy,
            SaveValue::Fragment(fragment) => node.blacklist.merge_from(&fragment),
            SaveValue::Script(origin, rule) => node.blacklist.save(origin, rule)?,
        }
        Ok(())
    }

    /// Resolve the effective policy and merged script list for `path`.
    ///
    /// Starts from this node's rule (or `fallback`), then walks the path while
    /// children match. Every visited node's policy overrides the running one
    /// when set, and every visited script list is merged over the
    /// accumulated one, so deeper levels win on conflicting origins.
    pub fn resolve(&self, path: &[&str], fallback: Policy) -> Resolved {
        let mut policy = self.rule.unwrap_or(fallback);
        let mut blacklist = self.blacklist.fork();
        let mut depth = 0;

        let mut node = self;
        for label in path.iter().take(MAX_SITE_DEPTH) {
            let Some(child) = node.children.get(*label) else {
                break;
            };
            if let Some(rule) = child.rule {
                policy = rule;
            }
            blacklist.merge_from(&child.blacklist);
            node = child;
            depth += 1;
        }

        Resolved {
            policy,
            blacklist,
            depth,
        }
    }

    /// Fold `from` into `self`, preferring `from` on conflicting rules.
    pub fn merge_from(&mut self, from: &RuleNode) {
        self.merge_at(from, 0);
    }

    fn merge_at(&mut self, from: &RuleNode, depth: usize) {
        if from.rule.is_some() {
            self.rule = from.rule;
        }
        self.blacklist.merge_from(&from.blacklist);
        if depth == MAX_SITE_DEPTH {
            return;
        }
        for (label, child) in &from.children {
            self.children
                .entry(label.clone())
                .or_default()
                .merge_at(child, depth + 1);
        }
    }

    /// Structurally independent copy.
    pub fn fork(&self) -> Self {
        Self {
            rule: self.rule,
            blacklist: self.blacklist.fork(),
            children: self
                .children
                .iter()
                .map(|(label, child)| (label.clone(), child.fork()))
                .collect(),
        }
    }

    /// Drop descendants that carry nothing. Returns `true` if `self` is empty
    /// afterwards.
    pub fn prune(&mut self) -> bool {
        self.blacklist.prune();
        self.children.retain(|_, child| !child.prune());
        self.is_empty()
    }

    /// Number of set policies and script rules in the tree.
    pub fn rule_count(&self) -> usize {
        usize::from(self.rule.is_some())
            + self.blacklist.rule_count()
            + self.children.values().map(RuleNode::rule_count).sum::<usize>()
    }
}
