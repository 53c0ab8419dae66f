//! Decision Engine
//!
//! This is the hot path - every intercepted script, frame and socket goes
//! through here while the host holds the request. Everything is a bounded
//! lookup over already-resolved data: no I/O, no allocation.

use crate::rules::{BlacklistNode, Resolved};
use crate::types::{Policy, Reason, Verdict};
use crate::url::Address;

// =============================================================================
// Request Context
// =============================================================================

/// Resolved state of a page or frame that resources are loaded into.
#[derive(Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub address: Address,
    pub policy: Policy,
    /// Site-specific script list merged from every matching level
    pub blacklist: BlacklistNode,
    pub private: bool,
    /// Tab is allowing everything until its next real navigation
    pub allow_once: bool,
}

impl RequestContext {
    /// Build a context from a resolution result.
    pub fn new(address: Address, resolved: Resolved, private: bool) -> Self {
        Self {
            address,
            policy: resolved.policy,
            blacklist: resolved.blacklist,
            private,
            allow_once: false,
        }
    }

    /// Policy actually in force, accounting for allow-once.
    #[inline]
    pub fn effective_policy(&self) -> Policy {
        if self.allow_once {
            Policy::AllowAll
        } else {
            self.policy
        }
    }
}

// =============================================================================
// Decisions
// =============================================================================

/// Decide whether `target` may load into `ctx`.
///
/// `global` is the global script list matching the context's browsing mode.
pub fn decide(ctx: &RequestContext, target: &Address, global: &BlacklistNode) -> Verdict {
    if ctx.allow_once {
        return Verdict::allow(Reason::AllowOnce);
    }
    decide_with_policy(ctx, ctx.policy, target, global)
}

/// Decide as if `policy` were the context's policy.
pub fn decide_with_policy(
    ctx: &RequestContext,
    policy: Policy,
    target: &Address,
    global: &BlacklistNode,
) -> Verdict {
    // A0: Absolute policies skip every list
    if !policy.is_filtering() {
        return Verdict {
            block: policy == Policy::BlockAll,
            reason: Reason::Policy,
        };
    }

    // A1: Same domain, then relaxed-mode heuristics
    let mut verdict = Verdict::block(Reason::Policy);
    if target.domain == ctx.address.domain {
        verdict = Verdict::allow(Reason::SameDomain);
    } else if policy == Policy::Relaxed {
        if is_common_helper(target) {
            verdict = Verdict::allow(Reason::CommonHelper);
        } else if is_related(&target.domain, &ctx.address.domain) {
            verdict = Verdict::allow(Reason::RelatedDomain);
        }
    }

    // A2: Global list overrides the policy outcome
    if let Some(block) = global.lookup(&target.domain, &target.subdomain) {
        verdict = Verdict {
            block,
            reason: Reason::GlobalList,
        };
    }

    // A3: Site list overrides the global list
    if let Some(block) = ctx.blacklist.lookup(&target.domain, &target.subdomain) {
        verdict = Verdict {
            block,
            reason: Reason::SiteList,
        };
    }

    log::trace!(
        "{}.{} on {} ({}) -> block={} ({})",
        target.subdomain,
        target.domain,
        ctx.address.domain,
        policy,
        verdict.block,
        verdict.reason
    );
    verdict
}

// =============================================================================
// Relaxed Mode Heuristics
// =============================================================================

/// Domain fragments that mark static/CDN/API hosts.
const HELPER_DOMAIN_MARKERS: &[&str] = &["apis", "cdn", "img", "static"];

/// Helper domain allowed wholesale in relaxed mode.
const HELPER_DOMAIN: &str = "google.com";

/// Single-label subdomain that is never treated as a helper.
const RESERVED_SUBDOMAIN: &str = "s";

/// Check if the resource looks like a common helper (CDN, API, login host).
pub fn is_common_helper(target: &Address) -> bool {
    let subdomain = target.subdomain.as_str();
    let domain = target.domain.as_str();

    if subdomain == RESERVED_SUBDOMAIN || subdomain.contains("tag") {
        return false;
    }

    HELPER_DOMAIN_MARKERS.iter().any(|marker| domain.contains(marker))
        || subdomain.contains("login")
        || subdomain.starts_with("code")
        || domain == HELPER_DOMAIN
}

/// Check if two registrable domains look related.
///
/// The leading label of the shorter domain must appear inside the longer
/// one, or both must share their first three characters.
pub fn is_related(script_domain: &str, page_domain: &str) -> bool {
    let (longer, shorter) = if page_domain.len() > script_domain.len() {
        (page_domain, script_domain)
    } else {
        (script_domain, page_domain)
    };

    let label = shorter.split('.').next().unwrap_or(shorter);
    if label.is_empty() {
        return false;
    }
    if longer.contains(label) {
        return true;
    }

    label.len() > 2 && longer.as_bytes().get(..3) == Some(&label.as_bytes()[..3])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::decompose;

    fn ctx(url: &str, policy: Policy) -> RequestContext {
        RequestContext {
            address: decompose(url).unwrap(),
            policy,
            blacklist: BlacklistNode::new(),
            private: false,
            allow_once: false,
        }
    }

    fn addr(url: &str) -> Address {
        decompose(url).unwrap()
    }

    #[test]
    fn test_allow_all_allows_everything() {
        let mut global = BlacklistNode::new();
        global.save(&["tracker.net"], Some(true)).unwrap();
        let page = ctx("https://www.example.com/", Policy::AllowAll);

        for url in ["https://tracker.net/t.js", "https://ads.other.org/a.js"] {
            let verdict = decide(&page, &addr(url), &global);
            assert_eq!(verdict, Verdict::allow(Reason::Policy));
        }
    }

    #[test]
    fn test_block_all_ignores_lists() {
        let mut global = BlacklistNode::new();
        global.save(&["example.com"], Some(false)).unwrap();
        let page = ctx("https://www.example.com/", Policy::BlockAll);
        let verdict = decide(&page, &addr("https://www.example.com/app.js"), &global);
        assert_eq!(verdict, Verdict::block(Reason::Policy));
    }

    #[test]
    fn test_filtered_same_and_cross_domain() {
        let global = BlacklistNode::new();
        let page = ctx("https://www.example.com/", Policy::Filtered);

        let same = decide(&page, &addr("https://static.example.com/a.js"), &global);
        assert_eq!(same, Verdict::allow(Reason::SameDomain));

        let cross = decide(&page, &addr("https://code.jquery.com/jquery.js"), &global);
        assert_eq!(cross, Verdict::block(Reason::Policy));
    }

    #[test]
    fn test_relaxed_helpers() {
        let global = BlacklistNode::new();
        let page = ctx("https://news.example.org/", Policy::Relaxed);

        let cdn = decide(&page, &addr("https://x.somecdn.net/lib.js"), &global);
        assert_eq!(cdn, Verdict::allow(Reason::CommonHelper));

        // the same host under filtered stays blocked
        let filtered = ctx("https://news.example.org/", Policy::Filtered);
        assert!(decide(&filtered, &addr("https://x.somecdn.net/lib.js"), &global).block);

        // reserved single-label subdomain is not a helper
        let reserved = decide(&page, &addr("https://s.somecdn.net/lib.js"), &global);
        assert!(reserved.block);

        // tag managers are never helpers
        let tags = decide(&page, &addr("https://tags.staticfiles.net/t.js"), &global);
        assert!(tags.block);
    }

    #[test]
    fn test_common_helper_markers() {
        assert!(is_common_helper(&addr("https://ajax.googleapis.com/a.js")));
        assert!(is_common_helper(&addr("https://login.live.net/a.js")));
        assert!(is_common_helper(&addr("https://code.jquery.com/a.js")));
        assert!(is_common_helper(&addr("https://www.google.com/a.js")));
        assert!(is_common_helper(&addr("https://i.imgur.com/a.js")));
        assert!(!is_common_helper(&addr("https://www.tracker.net/a.js")));
        assert!(!is_common_helper(&addr("https://mytag.static.net/a.js")));
    }

    #[test]
    fn test_is_related() {
        // leading label of the shorter domain inside the longer one
        assert!(is_related("wikiacdn.com", "wikia.com"));
        assert!(is_related("wikia.com", "wikiacdn.com"));
        assert!(is_related("netflximg.net", "netflix.com"));
        // shared three character prefix
        assert!(is_related("twimg.com", "twitter.com"));
        assert!(is_related("twitter.com", "twimg.com"));
        // unrelated
        assert!(!is_related("ytimg.com", "youtube.com"));
        assert!(!is_related("doubleclick.net", "example.com"));
        // short labels cannot match by prefix alone
        assert!(!is_related("xyz.com", "ab.org"));
    }

    #[test]
    fn test_relaxed_related_domain() {
        let global = BlacklistNode::new();
        let page = ctx("https://www.wikia.com/", Policy::Relaxed);
        let verdict = decide(&page, &addr("https://img.wikiastatic.org/x.js"), &global);
        // helper check comes first
        assert_eq!(verdict, Verdict::allow(Reason::CommonHelper));

        let verdict = decide(&page, &addr("https://www.wikiaservices.org/x.js"), &global);
        assert_eq!(verdict, Verdict::allow(Reason::RelatedDomain));
    }

    #[test]
    fn test_global_list_overrides_same_domain() {
        let mut global = BlacklistNode::new();
        global.save(&["example.com", "ads"], Some(true)).unwrap();
        let page = ctx("https://www.example.com/", Policy::Filtered);

        let verdict = decide(&page, &addr("https://ads.example.com/a.js"), &global);
        assert_eq!(verdict, Verdict::block(Reason::GlobalList));

        let other = decide(&page, &addr("https://cdn.example.com/a.js"), &global);
        assert_eq!(other, Verdict::allow(Reason::SameDomain));
    }

    #[test]
    fn test_site_list_overrides_global_list() {
        let mut global = BlacklistNode::new();
        global.save(&["fbcdn.net"], Some(true)).unwrap();
        let mut page = ctx("https://www.facebook.com/", Policy::Relaxed);
        page.blacklist.save(&["fbcdn.net"], Some(false)).unwrap();

        let verdict = decide(&page, &addr("https://static.xx.fbcdn.net/a.js"), &global);
        assert_eq!(verdict, Verdict::allow(Reason::SiteList));

        let elsewhere = ctx("https://news.example.org/", Policy::Relaxed);
        let verdict = decide(&elsewhere, &addr("https://static.xx.fbcdn.net/a.js"), &global);
        assert_eq!(verdict, Verdict::block(Reason::GlobalList));
    }

    #[test]
    fn test_allow_once_short_circuits() {
        let mut global = BlacklistNode::new();
        global.save(&["tracker.net"], Some(true)).unwrap();
        let mut page = ctx("https://www.example.com/", Policy::BlockAll);
        page.allow_once = true;

        assert_eq!(page.effective_policy(), Policy::AllowAll);
        let verdict = decide(&page, &addr("https://tracker.net/t.js"), &global);
        assert_eq!(verdict, Verdict::allow(Reason::AllowOnce));
    }
}
