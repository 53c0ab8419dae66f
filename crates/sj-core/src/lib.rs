//! ScriptJaeger Core Library
//!
//! This crate provides the policy resolution and decision engine for the
//! ScriptJaeger script blocker.
//!
//! # Architecture
//!
//! User configuration is a layered rule tree: a default policy, per-site
//! policies keyed by domain, subdomain and page, and allow/block lists for
//! script origins contributed globally and at every site level. Resolving an
//! address folds those layers into one [`RequestContext`]; deciding a load
//! is then a handful of lookups against that context with no allocation.
//!
//! # Modules
//!
//! - `psl`: Second-level registry table for registrable-domain splitting
//! - `url`: URL decomposition into rule-addressable parts
//! - `rules`: Rule tree save/merge/resolve
//! - `engine`: Decision engine and relaxed-mode heuristics
//! - `store`: Preferences, private overlay and edit entry points
//! - `tabs`: Per-tab and per-frame context registry, allow-once
//! - `persist`: Debounced save tracking
//! - `config`: Engine options
//! - `types`: Shared type definitions

pub mod config;
pub mod engine;
pub mod persist;
pub mod psl;
pub mod rules;
pub mod store;
pub mod tabs;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use config::{EngineOptions, MissingContextPolicy};
pub use engine::{decide, decide_with_policy, RequestContext};
pub use persist::{SaveSections, SaveTracker};
pub use psl::{is_same_site, registrable_domain};
pub use rules::{BlacklistNode, Resolved, RuleError, RuleNode, SaveValue, MAX_LIST_DEPTH, MAX_SITE_DEPTH};
pub use store::{PolicyStore, PreferenceRoot, RootSettings};
pub use tabs::{AllowOnce, TabContexts, Tabs};
pub use types::{FrameId, Policy, Reason, RequestType, TabId, Verdict, WindowId, TOP_FRAME};
pub use url::{decompose, Address, AddressError};
