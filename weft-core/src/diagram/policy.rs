//! Join and concurrency policies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rule determining when a node has enough incoming tokens to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Every qualifying incoming edge must hold an unconsumed token.
    All,
    /// At least one qualifying incoming edge must hold an unconsumed token.
    Any,
    /// At least `k` qualifying incoming edges must hold unconsumed tokens.
    KOfN {
        /// Required token count, 1 ≤ k ≤ incoming-edge count.
        k: u32,
    },
}

impl JoinPolicy {
    /// Whether `available` token-bearing edges satisfy the policy over a
    /// qualifying set of the given size.
    #[must_use]
    pub fn satisfied(&self, available: usize, qualifying: usize) -> bool {
        match self {
            Self::All => available >= qualifying,
            Self::Any => available >= 1,
            Self::KOfN { k } => available >= *k as usize,
        }
    }
}

impl fmt::Display for JoinPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Any => write!(f, "any"),
            Self::KOfN { k } => write!(f, "k_of_n({})", k),
        }
    }
}

/// Rule bounding simultaneous executions of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// At most one in-flight run at any instant.
    Singleton,
    /// One run per readiness signal, unbounded overlap.
    PerToken,
    /// At most `max_concurrent` overlapping runs.
    Bounded {
        /// The admission bound.
        max_concurrent: u32,
    },
}

impl ConcurrencyPolicy {
    /// Whether a new run may be admitted given the current in-flight count.
    #[must_use]
    pub fn admits(&self, in_flight: u32) -> bool {
        match self {
            Self::Singleton => in_flight == 0,
            Self::PerToken => true,
            Self::Bounded { max_concurrent } => in_flight < *max_concurrent,
        }
    }

    /// The hard bound, if the policy has one.
    #[must_use]
    pub fn bound(&self) -> Option<u32> {
        match self {
            Self::Singleton => Some(1),
            Self::PerToken => None,
            Self::Bounded { max_concurrent } => Some(*max_concurrent),
        }
    }
}

impl fmt::Display for ConcurrencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Singleton => write!(f, "singleton"),
            Self::PerToken => write!(f, "per_token"),
            Self::Bounded { max_concurrent } => write!(f, "bounded({})", max_concurrent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_policy_truth_table() {
        let p = JoinPolicy::All;
        assert!(p.satisfied(0, 0));
        assert!(p.satisfied(3, 3));
        assert!(!p.satisfied(2, 3));
    }

    #[test]
    fn any_policy_truth_table() {
        let p = JoinPolicy::Any;
        assert!(!p.satisfied(0, 3));
        assert!(p.satisfied(1, 3));
    }

    #[test]
    fn k_of_n_truth_table() {
        let p = JoinPolicy::KOfN { k: 2 };
        assert!(!p.satisfied(1, 3));
        assert!(p.satisfied(2, 3));
        assert!(p.satisfied(3, 3));
    }

    #[test]
    fn singleton_admits_one() {
        let p = ConcurrencyPolicy::Singleton;
        assert!(p.admits(0));
        assert!(!p.admits(1));
        assert_eq!(p.bound(), Some(1));
    }

    #[test]
    fn bounded_admits_up_to_max() {
        let p = ConcurrencyPolicy::Bounded { max_concurrent: 3 };
        assert!(p.admits(2));
        assert!(!p.admits(3));
    }

    #[test]
    fn per_token_is_unbounded() {
        assert!(ConcurrencyPolicy::PerToken.admits(1_000));
        assert_eq!(ConcurrencyPolicy::PerToken.bound(), None);
    }

    #[test]
    fn policy_serde_tagged() {
        let text = serde_json::to_string(&JoinPolicy::KOfN { k: 2 }).unwrap();
        assert!(text.contains("k_of_n"));
        let back: JoinPolicy = serde_json::from_str(&text).unwrap();
        assert_eq!(back, JoinPolicy::KOfN { k: 2 });
    }
}
