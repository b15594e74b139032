//! Tiergate-engine: tier resolution and role reconciliation
//!
//! Maps token balances onto an ordered tier ladder and keeps each member's
//! tier role in sync with it, on demand or as a scheduled batch.

pub mod address_book;
pub mod driver;
pub mod guild;
pub mod identity;
pub mod ladder;
pub mod roles;

// Re-exports
pub use address_book::{AddressBook, JsonFileAddressBook, MemoryAddressBook};
pub use driver::{BalanceSource, BatchFailure, BatchSummary, TierDriver, TierReport};
pub use guild::{Guild, GuildSnapshot, Member, MemberDirectory, MemoryGuild, RoleDirectory};
pub use identity::resolve_identity;
pub use ladder::{Tier, TierLadder};
pub use roles::{RoleAssignment, RoleChanges, RolePlan};
