//! Chat platform capabilities
//!
//! The engine never talks to the platform directly. It consumes a role
//! directory (list/create/add/remove roles) and a member directory (lookups
//! for identity resolution). `MemoryGuild` implements both in process and
//! can be seeded from a JSON snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tiergate_core::{Error, MemberId, Role, RoleError, RoleId};
use tokio::sync::RwLock;

/// Role storage of the chat platform
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Roles currently held by `member`
    async fn member_roles(&self, member: MemberId) -> Result<Vec<Role>, RoleError>;

    /// Every role defined on the platform
    async fn registry_roles(&self) -> Result<Vec<Role>, RoleError>;

    /// Create a role named `name` and return it
    async fn create_role(&self, name: &str) -> Result<Role, RoleError>;

    async fn add_role(&self, member: MemberId, role: &Role) -> Result<(), RoleError>;

    async fn remove_role(&self, member: MemberId, role: &Role) -> Result<(), RoleError>;
}

/// A platform member as seen by identity resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
}

impl Member {
    pub fn new(id: u64, username: impl Into<String>) -> Self {
        Self {
            id: MemberId(id),
            username: username.into(),
            discriminator: None,
        }
    }

    pub fn with_discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = Some(discriminator.into());
        self
    }
}

/// Membership listing of the chat platform
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn member_exists(&self, member: MemberId) -> Result<bool, RoleError>;

    async fn members(&self) -> Result<Vec<Member>, RoleError>;
}

/// Both platform capabilities behind one handle
pub trait Guild: RoleDirectory + MemberDirectory {}

impl<T: RoleDirectory + MemberDirectory + ?Sized> Guild for T {}

/// Serialized guild state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuildSnapshot {
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub members: Vec<SnapshotMember>,
}

/// A member entry of [`GuildSnapshot`], roles given by name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMember {
    #[serde(flatten)]
    pub member: Member,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Default)]
struct GuildState {
    members: BTreeMap<MemberId, (Member, BTreeSet<RoleId>)>,
    roles: BTreeMap<RoleId, Role>,
    next_role_id: u64,
}

impl GuildState {
    fn insert_role(&mut self, name: &str) -> Role {
        self.next_role_id += 1;
        let role = Role::new(self.next_role_id, name);
        self.roles.insert(role.id, role.clone());
        role
    }

    fn held(&self, member: MemberId) -> Result<&BTreeSet<RoleId>, RoleError> {
        self.members
            .get(&member)
            .map(|(_, roles)| roles)
            .ok_or(RoleError::UnknownMember { member })
    }

    fn held_mut(&mut self, member: MemberId) -> Result<&mut BTreeSet<RoleId>, RoleError> {
        self.members
            .get_mut(&member)
            .map(|(_, roles)| roles)
            .ok_or(RoleError::UnknownMember { member })
    }
}

/// In-process guild
#[derive(Debug, Default)]
pub struct MemoryGuild {
    state: RwLock<GuildState>,
}

impl MemoryGuild {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a guild from a snapshot. Role names held by members but absent
    /// from `roles` are added to the registry.
    pub fn from_snapshot(snapshot: GuildSnapshot) -> Self {
        let mut state = GuildState::default();

        for role in snapshot.roles {
            state.next_role_id = state.next_role_id.max(role.id.0);
            state.roles.insert(role.id, role);
        }

        for entry in snapshot.members {
            let mut held = BTreeSet::new();
            for name in &entry.roles {
                let existing = state.roles.values().find(|r| &r.name == name).cloned();
                let role = match existing {
                    Some(role) => role,
                    None => state.insert_role(name),
                };
                held.insert(role.id);
            }
            state.members.insert(entry.member.id, (entry.member, held));
        }

        Self {
            state: RwLock::new(state),
        }
    }

    /// Load a snapshot file
    pub async fn load(path: impl AsRef<Path>) -> tiergate_core::Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        let snapshot: GuildSnapshot = serde_json::from_str(&text)
            .map_err(|e| Error::Serialization(format!("{}: {}", path.display(), e)))?;

        tracing::info!(
            path = %path.display(),
            members = snapshot.members.len(),
            roles = snapshot.roles.len(),
            "Loaded guild snapshot"
        );

        Ok(Self::from_snapshot(snapshot))
    }

    /// Current state as a snapshot
    pub async fn snapshot(&self) -> GuildSnapshot {
        let state = self.state.read().await;
        GuildSnapshot {
            roles: state.roles.values().cloned().collect(),
            members: state
                .members
                .values()
                .map(|(member, held)| SnapshotMember {
                    member: member.clone(),
                    roles: held
                        .iter()
                        .filter_map(|id| state.roles.get(id))
                        .map(|r| r.name.clone())
                        .collect(),
                })
                .collect(),
        }
    }

    pub async fn add_member(&self, member: Member) {
        let mut state = self.state.write().await;
        state.members.insert(member.id, (member, BTreeSet::new()));
    }

    /// Define a role in the registry without assigning it
    pub async fn add_registry_role(&self, name: &str) -> Role {
        self.state.write().await.insert_role(name)
    }

    /// Names of the roles `member` holds, sorted
    pub async fn role_names(&self, member: MemberId) -> Vec<String> {
        let state = self.state.read().await;
        let mut names: Vec<String> = match state.held(member) {
            Ok(held) => held
                .iter()
                .filter_map(|id| state.roles.get(id))
                .map(|r| r.name.clone())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}

#[async_trait]
impl RoleDirectory for MemoryGuild {
    async fn member_roles(&self, member: MemberId) -> Result<Vec<Role>, RoleError> {
        let state = self.state.read().await;
        let held = state.held(member)?;
        Ok(held
            .iter()
            .filter_map(|id| state.roles.get(id))
            .cloned()
            .collect())
    }

    async fn registry_roles(&self) -> Result<Vec<Role>, RoleError> {
        Ok(self.state.read().await.roles.values().cloned().collect())
    }

    async fn create_role(&self, name: &str) -> Result<Role, RoleError> {
        let role = self.state.write().await.insert_role(name);
        tracing::info!(role = %role.name, id = %role.id, "Created role");
        Ok(role)
    }

    async fn add_role(&self, member: MemberId, role: &Role) -> Result<(), RoleError> {
        let mut state = self.state.write().await;
        if !state.roles.contains_key(&role.id) {
            return Err(RoleError::UnknownRole {
                role: role.name.clone(),
            });
        }
        state.held_mut(member)?.insert(role.id);
        Ok(())
    }

    async fn remove_role(&self, member: MemberId, role: &Role) -> Result<(), RoleError> {
        self.state.write().await.held_mut(member)?.remove(&role.id);
        Ok(())
    }
}

#[async_trait]
impl MemberDirectory for MemoryGuild {
    async fn member_exists(&self, member: MemberId) -> Result<bool, RoleError> {
        Ok(self.state.read().await.members.contains_key(&member))
    }

    async fn members(&self) -> Result<Vec<Member>, RoleError> {
        Ok(self
            .state
            .read()
            .await
            .members
            .values()
            .map(|(member, _)| member.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_role_lifecycle() {
        let guild = MemoryGuild::new();
        guild.add_member(Member::new(1, "alice")).await;

        let gold = guild.create_role("Gold").await.unwrap();
        guild.add_role(MemberId(1), &gold).await.unwrap();
        assert_eq!(guild.role_names(MemberId(1)).await, ["Gold"]);

        // Adding twice keeps a single membership
        guild.add_role(MemberId(1), &gold).await.unwrap();
        assert_eq!(guild.member_roles(MemberId(1)).await.unwrap().len(), 1);

        guild.remove_role(MemberId(1), &gold).await.unwrap();
        assert!(guild.role_names(MemberId(1)).await.is_empty());
        assert_eq!(guild.registry_roles().await.unwrap(), vec![gold]);
    }

    #[tokio::test]
    async fn test_unknown_member_and_role() {
        let guild = MemoryGuild::new();
        let err = guild.member_roles(MemberId(9)).await.unwrap_err();
        assert_eq!(err, RoleError::UnknownMember { member: MemberId(9) });

        guild.add_member(Member::new(1, "alice")).await;
        let ghost = Role::new(42, "Ghost");
        let err = guild.add_role(MemberId(1), &ghost).await.unwrap_err();
        assert_eq!(err, RoleError::UnknownRole { role: "Ghost".into() });
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let json = r#"{
            "roles": [{"id": 10, "name": "Moderator"}],
            "members": [
                {"id": 1, "username": "alice", "discriminator": "0420", "roles": ["Moderator", "Gold"]},
                {"id": 2, "username": "bob"}
            ]
        }"#;
        let snapshot: GuildSnapshot = serde_json::from_str(json).unwrap();
        let guild = MemoryGuild::from_snapshot(snapshot);

        assert_eq!(guild.role_names(MemberId(1)).await, ["Gold", "Moderator"]);
        assert!(guild.member_exists(MemberId(2)).await.unwrap());
        assert!(!guild.member_exists(MemberId(3)).await.unwrap());

        // Implicit roles get ids above the explicit ones
        let registry = guild.registry_roles().await.unwrap();
        let gold = registry.iter().find(|r| r.name == "Gold").unwrap();
        assert_eq!(gold.id, RoleId(11));

        let members = guild.members().await.unwrap();
        assert_eq!(members[0].discriminator.as_deref(), Some("0420"));

        let again = guild.snapshot().await;
        assert_eq!(again.members.len(), 2);
        assert_eq!(again.roles.len(), 2);
    }
}
