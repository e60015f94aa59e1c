//! Diff/prune core shared by the template-link and discovery-rule-link
//! reconcilers.
//!
//! A link resource declares which children (items, triggers, or their
//! prototypes) belong to a parent template or discovery rule. The server
//! also grows children of its own: some created out-of-band, some
//! materialized by template inheritance. Reconciling means deleting
//! children that dropped out of the declared set *without ever touching
//! the inherited ones*, which belong to the linked template, not to this
//! parent.
//!
//! The functions here are pure set logic over [`LinkedRef`]; the link
//! modules wire them to the API queries.

use std::collections::HashSet;

/// One child of a link, with the marker distinguishing a user-declared
/// child from one discovered on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedRef {
    /// Server-assigned child id.
    pub id: String,
    /// Whether the child was declared by the user (`true`) or surfaced
    /// from the server into state (`false`).
    pub local: bool,
}

impl LinkedRef {
    /// A user-declared child.
    pub fn local(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            local: true,
        }
    }

    /// A child discovered on the server.
    pub fn remote(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            local: false,
        }
    }
}

/// The plan-view child list: every declared child marked `local`, followed
/// by the server-side extras marked non-local so the user can see them.
pub fn merge_remote(declared: &[LinkedRef], remote_ids: Vec<String>) -> Vec<LinkedRef> {
    let known: HashSet<&str> = declared.iter().map(|c| c.id.as_str()).collect();

    let mut merged: Vec<LinkedRef> = declared.iter().map(|c| LinkedRef::local(&c.id)).collect();
    for id in remote_ids {
        if !known.contains(id.as_str()) {
            merged.push(LinkedRef::remote(id));
        }
    }
    merged
}

/// The trusted post-apply child list: everything currently on the server is
/// considered declared.
pub fn trusted(remote_ids: Vec<String>) -> Vec<LinkedRef> {
    remote_ids.into_iter().map(LinkedRef::local).collect()
}

/// Which children are safe to delete: present in `previous` but not in
/// `declared`, not user-declared (those are owned by their own resource),
/// and not in the `protected` inherited set.
pub fn prune_candidates(
    previous: &[LinkedRef],
    declared: &[LinkedRef],
    protected: &HashSet<String>,
) -> Vec<String> {
    let declared_ids: HashSet<&str> = declared.iter().map(|c| c.id.as_str()).collect();

    previous
        .iter()
        .filter(|child| !child.local)
        .filter(|child| !declared_ids.contains(child.id.as_str()))
        .filter(|child| !protected.contains(&child.id))
        .map(|child| child.id.clone())
        .collect()
}
