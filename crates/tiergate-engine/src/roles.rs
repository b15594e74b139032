//! Role reconciliation
//!
//! Brings a member's ladder roles in line with a target tier: every other
//! ladder role is removed, the target role is created when the registry
//! lacks it, then assigned. The sequence is not atomic. A failed step is
//! reported as such and earlier steps stay applied.

use tiergate_core::{MemberId, Role, RoleError, RoleStep, RoleStepError};
use tokio::sync::Mutex;

use crate::guild::RoleDirectory;
use crate::ladder::TierLadder;

/// How the target role reaches the member
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleAssignment {
    /// Registry already has the role
    Existing(Role),
    /// Role must be created first
    Create(String),
}

/// Operations needed to reach the target tier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePlan {
    pub remove: Vec<Role>,
    /// `None` when the member already holds the target
    pub assign: Option<RoleAssignment>,
}

impl RolePlan {
    pub fn is_noop(&self) -> bool {
        self.remove.is_empty() && self.assign.is_none()
    }
}

/// What a successful reconciliation changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleChanges {
    pub removed: Vec<String>,
    pub added: Option<String>,
    pub created: bool,
}

impl RoleChanges {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_none()
    }
}

/// Compute the plan. Pure.
pub fn plan(ladder: &TierLadder, current: &[Role], target: &str, registry: &[Role]) -> RolePlan {
    let remove = current
        .iter()
        .filter(|r| r.name != target && ladder.contains(&r.name))
        .cloned()
        .collect();

    let assign = if current.iter().any(|r| r.name == target) {
        None
    } else {
        Some(match registry.iter().find(|r| r.name == target) {
            Some(role) => RoleAssignment::Existing(role.clone()),
            None => RoleAssignment::Create(target.to_string()),
        })
    };

    RolePlan { remove, assign }
}

/// Execute `plan` against `directory`: removals, then creation, then assignment
pub async fn apply<D>(
    directory: &D,
    member: MemberId,
    plan: RolePlan,
) -> Result<RoleChanges, RoleStepError>
where
    D: RoleDirectory + ?Sized,
{
    let mut changes = RoleChanges::default();

    for role in plan.remove {
        directory
            .remove_role(member, &role)
            .await
            .map_err(step(RoleStep::Remove {
                role: role.name.clone(),
            }))?;
        tracing::debug!(member = %member, role = %role.name, "Removed tier role");
        changes.removed.push(role.name);
    }

    let role = match plan.assign {
        None => return Ok(changes),
        Some(RoleAssignment::Existing(role)) => role,
        Some(RoleAssignment::Create(name)) => {
            let role = directory
                .create_role(&name)
                .await
                .map_err(step(RoleStep::Create { role: name.clone() }))?;
            changes.created = true;
            role
        }
    };

    directory
        .add_role(member, &role)
        .await
        .map_err(step(RoleStep::Add {
            role: role.name.clone(),
        }))?;
    tracing::debug!(member = %member, role = %role.name, "Assigned tier role");
    changes.added = Some(role.name);

    Ok(changes)
}

/// Read the member's roles (and the registry when needed), plan, apply.
///
/// `registry` is held from the registry lookup until the plan is applied,
/// so concurrent reconciliations sharing it create a missing role once.
pub async fn reconcile<D>(
    directory: &D,
    member: MemberId,
    ladder: &TierLadder,
    target: &str,
    registry: &Mutex<()>,
) -> Result<RoleChanges, RoleStepError>
where
    D: RoleDirectory + ?Sized,
{
    let current = directory
        .member_roles(member)
        .await
        .map_err(step(RoleStep::ListMemberRoles))?;

    if current.iter().any(|r| r.name == target) {
        return apply(directory, member, plan(ladder, &current, target, &[])).await;
    }

    let _guard = registry.lock().await;
    let roles = directory
        .registry_roles()
        .await
        .map_err(step(RoleStep::ListRegistry))?;

    apply(directory, member, plan(ladder, &current, target, &roles)).await
}

fn step(step: RoleStep) -> impl FnOnce(RoleError) -> RoleStepError {
    move |source| RoleStepError { step, source }
}
