//! Scope resolution over the supervisor tree
//!
//! The scope set of an actor is the set of member ids it may see and act
//! upon. It is recomputed from the store on every call.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::auth::{Actor, ScopeStrategy};
use crate::network::store::MemberStore;
use crate::types::Result;

/// Member ids visible to an actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    strategy: ScopeStrategy,
    members: HashSet<String>,
}

impl Scope {
    pub fn new(strategy: ScopeStrategy, members: HashSet<String>) -> Self {
        Self { strategy, members }
    }

    pub fn strategy(&self) -> ScopeStrategy {
        self.strategy
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn ids(&self) -> &HashSet<String> {
        &self.members
    }

    /// Id restriction for a listing query; global scopes need none
    pub fn restriction(&self) -> Option<HashSet<String>> {
        match self.strategy {
            ScopeStrategy::Global => None,
            _ => Some(self.members.clone()),
        }
    }

    pub fn into_ids(self) -> HashSet<String> {
        self.members
    }
}

/// Computes scope sets from the supervisor relation
#[derive(Clone)]
pub struct HierarchyResolver {
    store: Arc<dyn MemberStore>,
}

impl HierarchyResolver {
    pub fn new(store: Arc<dyn MemberStore>) -> Self {
        Self { store }
    }

    /// Scope set for an actor, by its role's strategy
    ///
    /// The actor itself is always included. Callers must have checked that
    /// the actor is active.
    pub async fn resolve_scope(&self, actor: &Actor) -> Result<Scope> {
        let strategy = actor.role.scope_strategy();
        let members = match strategy {
            ScopeStrategy::Global => {
                let mut ids: HashSet<String> =
                    self.store.active_member_ids().await?.into_iter().collect();
                ids.insert(actor.id.clone());
                ids
            }
            ScopeStrategy::Network => self.network(&actor.id).await?,
            ScopeStrategy::Cell => self.cell(&actor.id).await?,
            ScopeStrategy::SelfOnly => HashSet::from([actor.id.clone()]),
        };

        debug!(
            "Resolved {:?} scope of {} ({}): {} member(s)",
            strategy,
            actor.id,
            actor.role,
            members.len()
        );

        Ok(Scope::new(strategy, members))
    }

    /// `root` plus every active member reachable below it
    ///
    /// Walks the child relation one level at a time. The visited set makes
    /// the walk terminate even if the stored relation contains a cycle.
    pub async fn network(&self, root: &str) -> Result<HashSet<String>> {
        let mut visited = HashSet::from([root.to_string()]);
        let mut frontier = vec![root.to_string()];

        while !frontier.is_empty() {
            let children = self.store.active_child_ids(&frontier).await?;
            frontier = children
                .into_iter()
                .filter(|id| visited.insert(id.clone()))
                .collect();
        }

        Ok(visited)
    }

    /// Whether `ancestor` sits above `member` in the stored supervisor chain
    ///
    /// Follows supervisor pointers upwards through deactivated members too,
    /// so a subtree hidden behind an inactive member still counts.
    pub async fn is_above(&self, ancestor: &str, member: &str) -> Result<bool> {
        let mut visited = HashSet::from([member.to_string()]);
        let mut current = self.store.supervisor_of(member).await?;

        while let Some(id) = current {
            if id == ancestor {
                return Ok(true);
            }
            if !visited.insert(id.clone()) {
                break;
            }
            current = self.store.supervisor_of(&id).await?;
        }

        Ok(false)
    }

    /// `leader` plus its active direct children
    pub async fn cell(&self, leader: &str) -> Result<HashSet<String>> {
        let mut members: HashSet<String> = self
            .store
            .active_child_ids(&[leader.to_string()])
            .await?
            .into_iter()
            .collect();
        members.insert(leader.to_string());
        Ok(members)
    }
}
