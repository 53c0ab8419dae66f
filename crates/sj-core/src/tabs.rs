//! Tab and frame context registry
//!
//! Every open tab keeps the request context of its top document and of each
//! nested frame. Frames that were created without a navigation of their own
//! (`about:blank` placeholders) alias an ancestor's context until they
//! navigate for real. The registry also keeps the per-frame load records the
//! popup renders, and the tab's allow-once state.

use std::collections::{BTreeMap, HashMap};

use crate::engine::RequestContext;
use crate::store::PolicyStore;
use crate::types::{FrameId, Policy, Reason, RequestType, TabId, Verdict, TOP_FRAME};
use crate::url::Address;

/// One decided load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRecord {
    pub address: Address,
    pub kind: RequestType,
    pub verdict: Verdict,
}

/// Resolved state of a frame.
#[derive(Debug)]
pub struct FrameState {
    pub context: RequestContext,
    /// Loads grouped by script origin (domain, subdomain)
    pub loads: BTreeMap<(String, String), Vec<LoadRecord>>,
    pub blocked: usize,
}

impl FrameState {
    fn new(context: RequestContext) -> Self {
        Self {
            context,
            loads: BTreeMap::new(),
            blocked: 0,
        }
    }
}

/// A frame either owns its context or borrows an ancestor's.
#[derive(Debug)]
pub enum FrameSlot {
    Resolved(FrameState),
    Alias(FrameId),
}

/// Allow-once lifecycle of a tab.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AllowOnce {
    #[default]
    Idle,
    /// Requested for host `site`, takes effect on the next navigation there
    Armed { site: String },
    /// In force on host `site`; `path` is the page it was activated on
    Active { site: String, path: String },
}

impl AllowOnce {
    /// Advance the state for a top-level navigation to `address`.
    fn navigate(&mut self, address: &Address) {
        let host = address.host();
        let next = match std::mem::take(self) {
            AllowOnce::Armed { site } if site == host => AllowOnce::Active {
                site,
                path: address.path.clone(),
            },
            // reloading the page it was activated on ends it
            AllowOnce::Active { site, path } if site == host && path != address.path => {
                AllowOnce::Active {
                    site,
                    path: address.path.clone(),
                }
            }
            _ => AllowOnce::Idle,
        };
        *self = next;
    }

    pub fn is_active(&self) -> bool {
        matches!(self, AllowOnce::Active { .. })
    }
}

// =============================================================================
// Per-tab Contexts
// =============================================================================

/// Contexts of one tab.
#[derive(Debug, Default)]
pub struct TabContexts {
    pub private: bool,
    frames: HashMap<FrameId, FrameSlot>,
    allow_once: AllowOnce,
}

impl TabContexts {
    pub fn new(private: bool) -> Self {
        Self {
            private,
            ..Self::default()
        }
    }

    /// Top-level navigation: drops every frame and resolves the new page.
    pub fn navigate_top(&mut self, store: &PolicyStore, address: &Address) {
        self.allow_once.navigate(address);
        self.frames.clear();
        self.frame_navigated(store, TOP_FRAME, address);
    }

    /// Register a frame that has no navigation of its own yet.
    pub fn frame_placeholder(&mut self, frame: FrameId, parent: FrameId) {
        let target = self.owner_of(parent).unwrap_or(parent);
        self.frames.insert(frame, FrameSlot::Alias(target));
    }

    /// Give a frame its own context for `address`.
    pub fn frame_navigated(&mut self, store: &PolicyStore, frame: FrameId, address: &Address) {
        let mut context = store.context(address, self.private);
        context.allow_once = self.allow_once.is_active();
        log::debug!(
            "frame {} -> {} ({})",
            frame,
            address.host(),
            context.effective_policy()
        );
        self.frames.insert(frame, FrameSlot::Resolved(FrameState::new(context)));
    }

    /// Frame that owns the context used by `frame`.
    fn owner_of(&self, frame: FrameId) -> Option<FrameId> {
        match self.frames.get(&frame)? {
            FrameSlot::Resolved(_) => Some(frame),
            // aliases always point at a resolved frame
            FrameSlot::Alias(target) => Some(*target),
        }
    }

    fn state(&self, frame: FrameId) -> Option<&FrameState> {
        match self.frames.get(&self.owner_of(frame)?)? {
            FrameSlot::Resolved(state) => Some(state),
            FrameSlot::Alias(_) => None,
        }
    }

    fn state_mut(&mut self, frame: FrameId) -> Option<&mut FrameState> {
        let owner = self.owner_of(frame)?;
        match self.frames.get_mut(&owner)? {
            FrameSlot::Resolved(state) => Some(state),
            FrameSlot::Alias(_) => None,
        }
    }

    /// Context a load from `frame` is evaluated against.
    ///
    /// A sub-frame's own document load is evaluated in its parent's context,
    /// since the frame has none yet.
    pub fn context_for(
        &self,
        frame: FrameId,
        parent: FrameId,
        is_subframe: bool,
    ) -> Option<&RequestContext> {
        let frame = if is_subframe { parent } else { frame };
        self.state(frame).map(|state| &state.context)
    }

    /// Record a decided load against the frame that owns `frame`'s context.
    pub fn record(&mut self, frame: FrameId, target: &Address, kind: RequestType, verdict: Verdict) {
        let Some(state) = self.state_mut(frame) else {
            return;
        };
        if verdict.block {
            state.blocked += 1;
        }
        state
            .loads
            .entry((target.domain.clone(), target.subdomain.clone()))
            .or_default()
            .push(LoadRecord {
                address: target.clone(),
                kind,
                verdict,
            });
    }

    /// Loads recorded for a frame.
    pub fn loads(&self, frame: FrameId) -> Option<&BTreeMap<(String, String), Vec<LoadRecord>>> {
        self.state(frame).map(|state| &state.loads)
    }

    /// Blocked loads across every frame of the tab.
    pub fn blocked_count(&self) -> usize {
        self.frames
            .values()
            .map(|slot| match slot {
                FrameSlot::Resolved(state) => state.blocked,
                FrameSlot::Alias(_) => 0,
            })
            .sum()
    }

    /// Request allow-once for the current site. Takes effect on the next
    /// navigation (usually the reload the UI triggers).
    pub fn arm_allow_once(&mut self) -> bool {
        let Some(state) = self.state(TOP_FRAME) else {
            return false;
        };
        self.allow_once = AllowOnce::Armed {
            site: state.context.address.host(),
        };
        true
    }

    /// Leave allow-once immediately.
    pub fn disarm_allow_once(&mut self) {
        self.allow_once = AllowOnce::Idle;
        for slot in self.frames.values_mut() {
            if let FrameSlot::Resolved(state) = slot {
                state.context.allow_once = false;
            }
        }
    }

    pub fn allow_once(&self) -> &AllowOnce {
        &self.allow_once
    }

    /// Re-evaluate every origin recorded for `frame` under `policy`.
    ///
    /// Returns `(domain, subdomain, blocked)` per origin. Nothing is recorded.
    pub fn preview(
        &self,
        store: &PolicyStore,
        frame: FrameId,
        policy: Policy,
    ) -> Vec<(String, String, bool)> {
        let Some(state) = self.state(frame) else {
            return Vec::new();
        };
        state
            .loads
            .iter()
            .filter_map(|((domain, subdomain), records)| {
                let first = records.first()?;
                let verdict = store.decide_as(&state.context, policy, &first.address);
                Some((domain.clone(), subdomain.clone(), verdict.block))
            })
            .collect()
    }
}

// =============================================================================
// All Tabs
// =============================================================================

/// Contexts of every open tab.
#[derive(Debug, Default)]
pub struct Tabs {
    tabs: HashMap<TabId, TabContexts>,
}

impl Tabs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tab: TabId) -> Option<&TabContexts> {
        self.tabs.get(&tab)
    }

    pub fn get_mut(&mut self, tab: TabId) -> Option<&mut TabContexts> {
        self.tabs.get_mut(&tab)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Top-level navigation in `tab`, creating the tab on first sight.
    pub fn navigate(&mut self, store: &PolicyStore, tab: TabId, address: &Address, private: bool) {
        let contexts = self
            .tabs
            .entry(tab)
            .or_insert_with(|| TabContexts::new(private));
        contexts.private = private;
        contexts.navigate_top(store, address);
    }

    pub fn close(&mut self, tab: TabId) {
        self.tabs.remove(&tab);
    }

    /// The browser swapped `old` for a prerendered `new` tab.
    pub fn replace(&mut self, old: TabId, new: TabId) {
        if let Some(contexts) = self.tabs.remove(&old) {
            self.tabs.insert(new, contexts);
        }
    }

    pub fn frame_placeholder(&mut self, tab: TabId, frame: FrameId, parent: FrameId) {
        if let Some(contexts) = self.tabs.get_mut(&tab) {
            contexts.frame_placeholder(frame, parent);
        }
    }

    pub fn frame_navigated(&mut self, store: &PolicyStore, tab: TabId, frame: FrameId, address: &Address) {
        if let Some(contexts) = self.tabs.get_mut(&tab) {
            contexts.frame_navigated(store, frame, address);
        }
    }

    /// Decide a load of `target` from `frame` of `tab` and record it.
    ///
    /// An allowed sub-frame load gives that frame its own context.
    pub fn decide(
        &mut self,
        store: &PolicyStore,
        tab: TabId,
        frame: FrameId,
        parent: FrameId,
        kind: RequestType,
        target: &Address,
    ) -> Verdict {
        if !kind.intersects(RequestType::INTERCEPTED) {
            return Verdict::allow(Reason::Policy);
        }
        let is_subframe = kind.contains(RequestType::SUBDOCUMENT);

        let Some(contexts) = self.tabs.get_mut(&tab) else {
            return store.missing_context(target);
        };
        let verdict = match contexts.context_for(frame, parent, is_subframe) {
            Some(ctx) => store.decide_in(ctx, target, kind),
            None => return store.missing_context(target),
        };

        let owner = if is_subframe { parent } else { frame };
        contexts.record(owner, target, kind, verdict);
        if is_subframe && !verdict.block {
            contexts.frame_navigated(store, frame, target);
        }
        verdict
    }

    pub fn arm_allow_once(&mut self, tab: TabId) -> bool {
        self.tabs
            .get_mut(&tab)
            .is_some_and(TabContexts::arm_allow_once)
    }

    pub fn disarm_allow_once(&mut self, tab: TabId) {
        if let Some(contexts) = self.tabs.get_mut(&tab) {
            contexts.disarm_allow_once();
        }
    }

    pub fn preview(
        &self,
        store: &PolicyStore,
        tab: TabId,
        frame: FrameId,
        policy: Policy,
    ) -> Vec<(String, String, bool)> {
        self.tabs
            .get(&tab)
            .map(|contexts| contexts.preview(store, frame, policy))
            .unwrap_or_default()
    }
}
