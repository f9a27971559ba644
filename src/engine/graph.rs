use std::collections::HashSet;

use anyhow::Result;

use crate::model::User;
use crate::model::rules::MAX_LEVELS;
use crate::store::Store;

/// The downstream team of one user, partitioned by referral depth.
/// `levels[0]` is level 1 (direct referrals), `levels[k]` is everyone
/// exactly `k + 1` hops away.
#[derive(Debug, Default)]
pub struct TeamLevels {
    pub levels: Vec<Vec<User>>,
    /// Count of repeated edges skipped during traversal. The referral
    /// relation is a forest by construction, so anything non-zero means
    /// corrupted data upstream.
    pub integrity_warnings: u32,
}

impl TeamLevels {
    /// Team at a 1-based level, empty if the tree is shallower.
    pub fn level(&self, level: usize) -> &[User] {
        if level == 0 {
            return &[];
        }
        self.levels.get(level - 1).map_or(&[], |v| v.as_slice())
    }

    pub fn total_size(&self) -> usize {
        self.levels.iter().map(|l| l.len()).sum()
    }
}

/// Breadth-first expansion of the referral tree: level 1 is the direct
/// referrals of `user_id`, level k the direct referrals of level k-1.
/// Stops at the first empty level or at `max_depth` (capped at 30).
///
/// A user reappearing across levels would mean a cycle; the repeated edge
/// is ignored and counted instead of looping.
pub async fn team_by_level(
    store: &dyn Store,
    user_id: &str,
    max_depth: usize,
) -> Result<TeamLevels> {
    let max_depth = max_depth.min(MAX_LEVELS);
    let mut team = TeamLevels::default();
    let mut seen: HashSet<String> = HashSet::from([user_id.to_string()]);
    let mut frontier: Vec<String> = vec![user_id.to_string()];

    for _ in 0..max_depth {
        let mut next = Vec::new();
        for id in &frontier {
            for member in store.direct_referrals(id).await? {
                if !seen.insert(member.id.clone()) {
                    eprintln!(
                        "[graph] repeated referral edge to '{}' under '{}', skipping",
                        member.id, user_id
                    );
                    team.integrity_warnings += 1;
                    continue;
                }
                next.push(member);
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next.iter().map(|u| u.id.clone()).collect();
        team.levels.push(next);
    }

    Ok(team)
}

/// The two-leg business split used for rank qualification: the strongest
/// direct branch vs the combined remainder.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct LegSplit {
    pub power_leg: f64,
    pub other_leg: f64,
}

impl LegSplit {
    pub fn total(&self) -> f64 {
        self.power_leg + self.other_leg
    }
}

/// Compute per-branch business for every direct branch of `user_id` and
/// split it into power leg (max branch) and other leg (sum of the rest).
/// Blocked users contribute zero, but traversal passes through them so
/// their downline still counts at its real depth.
pub async fn leg_split(store: &dyn Store, user_id: &str) -> Result<LegSplit> {
    let branches = store.direct_referrals(user_id).await?;
    if branches.is_empty() {
        return Ok(LegSplit::default());
    }

    let mut totals = Vec::with_capacity(branches.len());
    for branch in &branches {
        let mut business = branch_business(branch);
        let subtree = team_by_level(store, &branch.id, MAX_LEVELS).await?;
        for level in &subtree.levels {
            business += level.iter().map(|u| branch_business(u)).sum::<f64>();
        }
        totals.push(business);
    }

    let power_leg = totals.iter().cloned().fold(0.0, f64::max);
    let other_leg = totals.iter().sum::<f64>() - power_leg;
    Ok(LegSplit {
        power_leg,
        other_leg,
    })
}

fn branch_business(user: &User) -> f64 {
    if user.is_blocked { 0.0 } else { user.self_deposit }
}
