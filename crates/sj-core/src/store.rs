//! Policy store
//!
//! Owns the persisted [`PreferenceRoot`] and, while private windows are open,
//! an isolated overlay copy of it. All edit and query entry points take a
//! `private` flag that selects which of the two they act on.

use std::collections::HashSet;

use crate::config::{EngineOptions, MissingContextPolicy};
use crate::engine::{self, RequestContext};
use crate::persist::{SaveSections, SaveTracker};
use crate::rules::{BlacklistNode, Resolved, RuleError, RuleNode, SaveValue};
use crate::types::{Policy, Reason, RequestType, Verdict, WindowId};
use crate::url::Address;

// =============================================================================
// Preference Root
// =============================================================================

/// Complete user configuration.
#[derive(Debug, PartialEq, Eq)]
pub struct PreferenceRoot {
    pub default_policy: Policy,
    pub default_private_policy: Policy,
    /// Block ping/beacon requests regardless of policy
    pub block_ping: bool,
    pub site_rules: RuleNode,
    pub global_blacklist: BlacklistNode,
}

impl Default for PreferenceRoot {
    fn default() -> Self {
        Self {
            default_policy: Policy::Relaxed,
            default_private_policy: Policy::Relaxed,
            block_ping: false,
            site_rules: RuleNode::new(),
            global_blacklist: BlacklistNode::new(),
        }
    }
}

impl PreferenceRoot {
    /// Structurally independent copy.
    pub fn fork(&self) -> Self {
        Self {
            default_policy: self.default_policy,
            default_private_policy: self.default_private_policy,
            block_ping: self.block_ping,
            site_rules: self.site_rules.fork(),
            global_blacklist: self.global_blacklist.fork(),
        }
    }

    /// Default policy for the given browsing mode.
    #[inline]
    pub fn default_for(&self, private: bool) -> Policy {
        if private {
            self.default_private_policy
        } else {
            self.default_policy
        }
    }

    /// Resolve the effective policy and site script list for `address`.
    pub fn resolve(&self, address: &Address, private: bool) -> Resolved {
        self.site_rules
            .resolve(&address.site_path(), self.default_for(private))
    }

    /// Every top-level setting of `self`, all present.
    pub fn settings(&self) -> RootSettings {
        RootSettings {
            default_policy: Some(self.default_policy),
            default_private_policy: Some(self.default_private_policy),
            block_ping: Some(self.block_ping),
        }
    }

    /// Overwrite the top-level settings that `settings` carries.
    pub fn apply_settings(&mut self, settings: &RootSettings) {
        if let Some(policy) = settings.default_policy {
            self.default_policy = policy;
        }
        if let Some(policy) = settings.default_private_policy {
            self.default_private_policy = policy;
        }
        if let Some(block) = settings.block_ping {
            self.block_ping = block;
        }
    }

    /// Fold the rule trees of `from` into `self`; conflicting rules come from
    /// `from`. Top-level settings are untouched, see [`Self::apply_settings`].
    pub fn merge_from(&mut self, from: &PreferenceRoot) {
        self.site_rules.merge_from(&from.site_rules);
        self.global_blacklist.merge_from(&from.global_blacklist);
    }
}

/// Top-level settings of an incoming document. `None` where the document
/// leaves a setting out, so a merge keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RootSettings {
    pub default_policy: Option<Policy>,
    pub default_private_policy: Option<Policy>,
    pub block_ping: Option<bool>,
}

// =============================================================================
// Policy Store
// =============================================================================

/// Normal preferences plus the private overlay.
#[derive(Debug)]
pub struct PolicyStore {
    prefs: PreferenceRoot,
    overlay: Option<PreferenceRoot>,
    private_windows: HashSet<WindowId>,
    options: EngineOptions,
    saves: SaveTracker,
    /// Host time stamped on edits
    now_ms: u64,
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new(PreferenceRoot::default())
    }
}

impl PolicyStore {
    /// Create a store over loaded preferences with default options.
    pub fn new(prefs: PreferenceRoot) -> Self {
        Self::with_options(prefs, EngineOptions::default())
    }

    pub fn with_options(prefs: PreferenceRoot, options: EngineOptions) -> Self {
        Self {
            prefs,
            overlay: None,
            private_windows: HashSet::new(),
            options,
            saves: SaveTracker::new(options.save_debounce_ms),
            now_ms: 0,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// The persisted preferences.
    pub fn preferences(&self) -> &PreferenceRoot {
        &self.prefs
    }

    /// The private overlay, if any private window is open.
    pub fn private_overlay(&self) -> Option<&PreferenceRoot> {
        self.overlay.as_ref()
    }

    /// Preferences in force for a browsing mode.
    ///
    /// A private read with no overlay falls back to the normal preferences.
    pub fn preferences_for(&self, private: bool) -> &PreferenceRoot {
        match (private, &self.overlay) {
            (true, Some(overlay)) => overlay,
            (true, None) => {
                log::warn!("private lookup with no private window open, using normal preferences");
                &self.prefs
            }
            (false, _) => &self.prefs,
        }
    }

    fn preferences_for_mut(&mut self, private: bool) -> Result<&mut PreferenceRoot, RuleError> {
        if private {
            self.overlay.as_mut().ok_or(RuleError::NoPrivateOverlay)
        } else {
            Ok(&mut self.prefs)
        }
    }

    fn mark(&mut self, private: bool, sections: SaveSections) {
        // the overlay is never persisted
        if !private {
            self.saves.mark(sections, self.now_ms);
        }
    }

    /// Advance the host clock. Edits made afterwards are stamped with
    /// `now_ms`.
    pub fn tick(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Effective policy and script list for an address.
    pub fn resolve(&self, address: &Address, private: bool) -> Resolved {
        self.preferences_for(private).resolve(address, private)
    }

    /// Build the request context for a page or frame at `address`.
    pub fn context(&self, address: &Address, private: bool) -> RequestContext {
        RequestContext::new(address.clone(), self.resolve(address, private), private)
    }

    /// Decide a load of `target` requested by a document at `requester`.
    pub fn decide(
        &self,
        requester: &Address,
        target: &Address,
        private: bool,
        kind: RequestType,
    ) -> Verdict {
        let ctx = self.context(requester, private);
        self.decide_in(&ctx, target, kind)
    }

    /// Decide a load of `target` into an established context.
    pub fn decide_in(&self, ctx: &RequestContext, target: &Address, kind: RequestType) -> Verdict {
        let prefs = self.preferences_for(ctx.private);
        if kind.contains(RequestType::PING) && prefs.block_ping {
            return Verdict::block(Reason::Ping);
        }
        engine::decide(ctx, target, &prefs.global_blacklist)
    }

    /// Decide a load into `ctx` as if its policy were `policy`.
    pub fn decide_as(&self, ctx: &RequestContext, policy: Policy, target: &Address) -> Verdict {
        let prefs = self.preferences_for(ctx.private);
        engine::decide_with_policy(ctx, policy, target, &prefs.global_blacklist)
    }

    /// Verdict for a load whose page or frame has no context.
    pub fn missing_context(&self, target: &Address) -> Verdict {
        log::warn!("no request context for load of {}", target);
        match self.options.missing_context {
            MissingContextPolicy::Deny => Verdict::block(Reason::NoContext),
            MissingContextPolicy::Allow => Verdict::allow(Reason::NoContext),
        }
    }

    // -------------------------------------------------------------------------
    // Edits
    // -------------------------------------------------------------------------

    /// Set (or with `None`, clear) the policy at a site path.
    ///
    /// An empty path sets the browsing mode's default policy, which cannot be
    /// cleared.
    pub fn set_policy(
        &mut self,
        path: &[&str],
        policy: Option<Policy>,
        private: bool,
    ) -> Result<(), RuleError> {
        let prefs = self.preferences_for_mut(private)?;

        if path.is_empty() {
            let policy = policy.ok_or(RuleError::CannotClearDefault)?;
            if private {
                prefs.default_private_policy = policy;
            } else {
                prefs.default_policy = policy;
            }
        } else {
            prefs.site_rules.save(path, SaveValue::Policy(policy))?;
            if policy.is_none() {
                prefs.site_rules.prune();
            }
        }

        log::debug!("policy {:?} at {:?} (private={})", policy, path, private);
        self.mark(private, SaveSections::POLICY);
        Ok(())
    }

    /// Set the default policy used for private windows.
    pub fn set_private_default(&mut self, policy: Policy) {
        self.prefs.default_private_policy = policy;
        self.mark(false, SaveSections::POLICY);
    }

    /// Set (or with `None`, clear) the rule for a script origin.
    ///
    /// With an empty `site_path` the rule goes to the global list, otherwise
    /// to the script list of that site node.
    pub fn set_script_rule(
        &mut self,
        site_path: &[&str],
        origin: &[&str],
        rule: Option<bool>,
        private: bool,
    ) -> Result<(), RuleError> {
        let prefs = self.preferences_for_mut(private)?;

        let section = if site_path.is_empty() {
            prefs.global_blacklist.save(origin, rule)?;
            if rule.is_none() {
                prefs.global_blacklist.prune();
            }
            SaveSections::BLACKLIST
        } else {
            match rule {
                Some(_) => {
                    let fragment = BlacklistNode::fragment(origin, rule)?;
                    prefs.site_rules.save(site_path, SaveValue::Fragment(fragment))?;
                }
                None => {
                    prefs.site_rules.save(site_path, SaveValue::Script(origin, None))?;
                    prefs.site_rules.prune();
                }
            }
            SaveSections::POLICY
        };

        log::debug!("script rule {:?} for {:?} on {:?} (private={})", rule, origin, site_path, private);
        self.mark(private, section);
        Ok(())
    }

    /// Toggle ping blocking.
    pub fn set_block_ping(&mut self, block: bool, private: bool) -> Result<(), RuleError> {
        self.preferences_for_mut(private)?.block_ping = block;
        self.mark(private, SaveSections::POLICY);
        Ok(())
    }

    /// Replace the persisted preferences wholesale (import, reset).
    pub fn replace_preferences(&mut self, prefs: PreferenceRoot) {
        log::info!("preferences replaced ({} rules)", prefs.site_rules.rule_count());
        self.prefs = prefs;
        self.saves.mark(SaveSections::ALL, self.now_ms);
    }

    /// Merge rule trees into the persisted preferences and apply the
    /// top-level settings that are present.
    pub fn merge_preferences(&mut self, from: &PreferenceRoot, settings: &RootSettings) {
        log::info!("preferences merged ({} rules)", from.site_rules.rule_count());
        self.prefs.merge_from(from);
        self.prefs.apply_settings(settings);
        self.saves.mark(SaveSections::ALL, self.now_ms);
    }

    // -------------------------------------------------------------------------
    // Private Windows
    // -------------------------------------------------------------------------

    /// Register an opened window. The first private window creates the overlay.
    pub fn open_window(&mut self, id: WindowId, private: bool) {
        if !private || !self.private_windows.insert(id) {
            return;
        }
        if self.overlay.is_none() {
            log::info!("private overlay created");
            self.overlay = Some(self.prefs.fork());
        }
    }

    /// Unregister a closed window. Closing the last private window discards
    /// the overlay.
    pub fn close_window(&mut self, id: WindowId) {
        if !self.private_windows.remove(&id) {
            return;
        }
        if self.private_windows.is_empty() && self.overlay.take().is_some() {
            log::info!("private overlay discarded");
        }
    }

    pub fn private_window_count(&self) -> usize {
        self.private_windows.len()
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Sections to write now, if the debounce window has passed.
    pub fn take_due_save(&mut self, now_ms: u64) -> Option<SaveSections> {
        self.tick(now_ms);
        self.saves.take_due(self.now_ms)
    }

    /// Sections to write now, ignoring the debounce window.
    pub fn flush_save(&mut self) -> Option<SaveSections> {
        self.saves.flush()
    }

    pub fn is_save_pending(&self) -> bool {
        self.saves.is_pending()
    }
}
