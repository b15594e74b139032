//! Free-form identity resolution
//!
//! Accepted forms, tried in order:
//! - a mention, `<@123>` or `<@!123>`
//! - a bare numeric id
//! - `name` or `name#discriminator`, case-insensitive
//!
//! Every form must resolve to exactly one existing member. Anything else is
//! "not found".

use tiergate_core::{MemberId, RoleError};

use crate::guild::MemberDirectory;

/// Resolve `input` to a member id. `Ok(None)` means not found or ambiguous.
pub async fn resolve_identity<D>(input: &str, members: &D) -> Result<Option<MemberId>, RoleError>
where
    D: MemberDirectory + ?Sized,
{
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }

    if let Some(inner) = input.strip_prefix("<@").and_then(|s| s.strip_suffix('>')) {
        let digits = inner.strip_prefix('!').unwrap_or(inner);
        return match parse_id(digits) {
            Some(id) => existing(id, members).await,
            None => Ok(None),
        };
    }

    if let Some(id) = parse_id(input) {
        return existing(id, members).await;
    }

    let (name, discriminator) = match input.rsplit_once('#') {
        Some((name, disc)) if !name.is_empty() && !disc.is_empty() => (name, Some(disc)),
        _ => (input, None),
    };

    let mut matches = members.members().await?.into_iter().filter(|m| {
        m.username.eq_ignore_ascii_case(name)
            && discriminator.map_or(true, |d| {
                m.discriminator
                    .as_deref()
                    .is_some_and(|own| own.eq_ignore_ascii_case(d))
            })
    });

    match (matches.next(), matches.next()) {
        (Some(member), None) => Ok(Some(member.id)),
        (Some(_), Some(_)) => {
            tracing::debug!(query = input, "Ambiguous member name");
            Ok(None)
        }
        _ => Ok(None),
    }
}

fn parse_id(digits: &str) -> Option<MemberId> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(MemberId)
}

async fn existing<D>(id: MemberId, members: &D) -> Result<Option<MemberId>, RoleError>
where
    D: MemberDirectory + ?Sized,
{
    Ok(members.member_exists(id).await?.then_some(id))
}
