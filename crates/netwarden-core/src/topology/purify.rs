// ── Cycle purification ──
//
// Group membership is a directed graph group→member that must stay
// acyclic or group expansion would never terminate. The topology source
// is expected to forbid cycles; this is the last-resort guard that
// repairs the snapshot if it does not.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::model::{Group, GroupId};

/// Remove every back-edge from the membership graph, in place.
///
/// For each group, a depth-first walk carries the set of ancestor group
/// ids on the current path. A member id that reappears in its own
/// ancestor set is a back-edge; it is removed from its immediate
/// parent's member list before expansion continues into siblings. The
/// ancestor set is cloned per branch, so a group legally shared by two
/// unrelated branches is left alone; only genuine cycles are cut.
pub(super) fn purify_groups(groups: &mut HashMap<GroupId, Group>) {
    let roots: Vec<GroupId> = groups.keys().copied().collect();
    for root in roots {
        let mut ancestors = HashSet::new();
        ancestors.insert(root);
        walk(root, &ancestors, groups);
    }
}

fn walk(group_id: GroupId, ancestors: &HashSet<GroupId>, groups: &mut HashMap<GroupId, Group>) {
    let members = match groups.get(&group_id) {
        Some(g) => g.members.clone(),
        None => return,
    };

    for member_id in members {
        // Member ids referencing devices (or nothing) are leaves.
        if !groups.contains_key(&member_id) {
            continue;
        }

        if ancestors.contains(&member_id) {
            warn!(
                group_id,
                member_id, "cyclic group membership detected, dropping member edge"
            );
            if let Some(parent) = groups.get_mut(&group_id) {
                parent.members.retain(|&m| m != member_id);
            }
            continue;
        }

        let mut branch = ancestors.clone();
        branch.insert(member_id);
        walk(member_id, &branch, groups);
    }
}
