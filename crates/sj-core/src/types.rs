//! Core type definitions for ScriptJaeger
//!
//! These types are shared by the rule tree, the decision engine and the
//! persisted document layer.

use std::fmt;

// =============================================================================
// Block Policy (matches the `rule` key of site nodes)
// =============================================================================

/// Coarse-grained verdict for a site.
///
/// The numbering is canonical and is what the persisted document stores:
/// `0` allows everything, `3` blocks everything, and the two filtering
/// policies sit in between ordered from most to least permissive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Policy {
    /// Every script is allowed, the script lists are not consulted
    AllowAll = 0,
    /// Same domain plus helper/related domains are allowed
    Relaxed = 1,
    /// Only the same domain is allowed
    Filtered = 2,
    /// Every script is blocked, the script lists are not consulted
    BlockAll = 3,
}

impl Policy {
    /// All policies in numeric order.
    pub const ALL: [Policy; 4] = [
        Policy::AllowAll,
        Policy::Relaxed,
        Policy::Filtered,
        Policy::BlockAll,
    ];

    /// Short lowercase name, used for icons and CLI output.
    pub const fn name(self) -> &'static str {
        match self {
            Self::AllowAll => "allowall",
            Self::Relaxed => "relaxed",
            Self::Filtered => "filtered",
            Self::BlockAll => "blockall",
        }
    }

    /// Parse a short name or a numeric value.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|policy| policy.name() == name)
            .or_else(|| name.parse::<u8>().ok().and_then(|n| Self::try_from(n).ok()))
    }

    /// Whether the script lists and same-domain checks take part in decisions.
    #[inline]
    pub const fn is_filtering(self) -> bool {
        matches!(self, Self::Relaxed | Self::Filtered)
    }
}

impl TryFrom<u8> for Policy {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AllowAll),
            1 => Ok(Self::Relaxed),
            2 => Ok(Self::Filtered),
            3 => Ok(Self::BlockAll),
            _ => Err(()),
        }
    }
}

impl From<Policy> for u8 {
    fn from(policy: Policy) -> u8 {
        policy as u8
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Request Types (bit mask of intercepted request kinds)
// =============================================================================

bitflags::bitflags! {
    /// Request type bit mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RequestType: u16 {
        const OTHER = 1 << 0;
        const SCRIPT = 1 << 1;
        const SUBDOCUMENT = 1 << 2;  // iframe/frame
        const MAIN_FRAME = 1 << 3;   // main document
        const WEBSOCKET = 1 << 4;
        const PING = 1 << 5;

        /// Kinds the host intercepts and asks about
        const INTERCEPTED = Self::SCRIPT.bits() | Self::SUBDOCUMENT.bits()
            | Self::WEBSOCKET.bits() | Self::PING.bits();
    }
}

impl RequestType {
    /// Parse from browser request type string.
    pub fn from_str(s: &str) -> Self {
        match s {
            "script" => Self::SCRIPT,
            "sub_frame" => Self::SUBDOCUMENT,
            "main_frame" => Self::MAIN_FRAME,
            "websocket" => Self::WEBSOCKET,
            "ping" | "beacon" => Self::PING,
            _ => Self::OTHER,
        }
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Browser tab id.
pub type TabId = i32;

/// Frame id inside a tab; `0` is the top document.
pub type FrameId = i32;

/// Browser window id.
pub type WindowId = i32;

/// Frame id of the top-level document.
pub const TOP_FRAME: FrameId = 0;

// =============================================================================
// Verdict
// =============================================================================

/// What settled a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// The context policy alone (allow all, block all, or the filtering default)
    Policy,
    /// Resource shares the requesting page's domain
    SameDomain,
    /// Relaxed mode: resource looks like a CDN/API/login helper
    CommonHelper,
    /// Relaxed mode: resource domain is related to the page domain
    RelatedDomain,
    /// Global script list entry
    GlobalList,
    /// Site-specific script list entry
    SiteList,
    /// Tab is in allow-once mode
    AllowOnce,
    /// Ping blocking preference
    Ping,
    /// No request context was established for the requester
    NoContext,
}

impl Reason {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Policy => "policy",
            Self::SameDomain => "same-domain",
            Self::CommonHelper => "common-helper",
            Self::RelatedDomain => "related-domain",
            Self::GlobalList => "global-list",
            Self::SiteList => "site-list",
            Self::AllowOnce => "allow-once",
            Self::Ping => "ping",
            Self::NoContext => "no-context",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of deciding a single load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// `true` cancels the load
    pub block: bool,
    pub reason: Reason,
}

impl Verdict {
    #[inline]
    pub const fn allow(reason: Reason) -> Self {
        Self { block: false, reason }
    }

    #[inline]
    pub const fn block(reason: Reason) -> Self {
        Self { block: true, reason }
    }
}
