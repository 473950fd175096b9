//! Reaction records and the per-post count projection.
//!
//! A post's `reactions` list is the source of truth; [`ReactionCounts`] is a
//! cached projection kept in lockstep through the two aggregator operations
//! ([`apply_add`](ReactionCounts::apply_add) /
//! [`apply_remove`](ReactionCounts::apply_remove)) instead of a full recount,
//! for O(1) update cost per action. Invariant after every call:
//! `total == Σ by_kind`.
//!
//! Callers resolve "does this user already have a reaction on this post"
//! first and pass the prior kind as `old_kind` when the user is switching.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::{PostId, ReactionId, UserId};

/// The closed set of reaction kinds.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(ascii_case_insensitive)]
pub enum ReactionKind {
    Like,
    Love,
    Care,
    Haha,
    Wow,
    Sad,
    Angry,
}

impl ReactionKind {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Wire representation (SCREAMING_SNAKE, matching the serde form).
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "LIKE",
            ReactionKind::Love => "LOVE",
            ReactionKind::Care => "CARE",
            ReactionKind::Haha => "HAHA",
            ReactionKind::Wow => "WOW",
            ReactionKind::Sad => "SAD",
            ReactionKind::Angry => "ANGRY",
        }
    }
}

/// A single reaction record. At most one exists per `(post_id, user_id)`
/// pair at any time — switching kinds replaces the record, never adds one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: ReactionId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub kind: ReactionKind,
    /// When this reaction was created (Unix millis).
    pub created_at: u64,
    /// Last kind switch (Unix millis).
    pub updated_at: u64,
}

impl Reaction {
    /// Create a fresh reaction record.
    pub fn new(post_id: PostId, user_id: UserId, kind: ReactionKind) -> Self {
        let now = crate::now_millis();
        Self {
            id: ReactionId::new(),
            post_id,
            user_id,
            kind,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-post reaction summary: per-kind counts plus a grand total.
///
/// Zero entries are pruned from the map, so iteration only yields kinds
/// that are actually present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCounts {
    pub by_kind: BTreeMap<ReactionKind, u32>,
    pub total: u32,
}

impl ReactionCounts {
    /// Empty counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Full recount from a reaction list — for restore paths and settle-point
    /// verification, not for per-action updates.
    pub fn from_reactions(reactions: &[Reaction]) -> Self {
        let mut counts = Self::new();
        for r in reactions {
            counts.apply_add(r.kind, None);
        }
        counts
    }

    /// Count for one kind (0 when absent).
    pub fn count(&self, kind: ReactionKind) -> u32 {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    /// Sum over all kinds. Equals `total` whenever the lockstep invariant
    /// holds; exposed so tests can assert it directly.
    pub fn kind_sum(&self) -> u32 {
        self.by_kind.values().sum()
    }

    /// Record a reaction being added or switched.
    ///
    /// When `old_kind` is given (the user is switching kinds), the old kind
    /// is decremented and `total` is left alone — the user still holds
    /// exactly one reaction. A fresh add increments `total`. The new kind is
    /// always incremented.
    pub fn apply_add(&mut self, new_kind: ReactionKind, old_kind: Option<ReactionKind>) {
        match old_kind {
            Some(old) => self.decrement_kind(old),
            None => self.total += 1,
        }
        *self.by_kind.entry(new_kind).or_insert(0) += 1;
    }

    /// Record a reaction being retracted. Both the kind count and `total`
    /// are floored at zero.
    pub fn apply_remove(&mut self, kind: ReactionKind) {
        self.decrement_kind(kind);
        self.total = self.total.saturating_sub(1);
    }

    fn decrement_kind(&mut self, kind: ReactionKind) {
        if let Some(n) = self.by_kind.get_mut(&kind) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.by_kind.remove(&kind);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
