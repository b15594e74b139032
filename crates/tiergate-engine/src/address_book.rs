//! Member → wallet registrations

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tiergate_core::{EvmAddress, MemberId, RegisteredHolder, StorageError};
use tokio::sync::RwLock;

/// Key-value store of registered wallets
#[async_trait]
pub trait AddressBook: Send + Sync {
    /// Insert or overwrite the address of `member`, returning the previous one
    async fn upsert(
        &self,
        member: MemberId,
        address: EvmAddress,
    ) -> Result<Option<EvmAddress>, StorageError>;

    async fn get(&self, member: MemberId) -> Result<Option<EvmAddress>, StorageError>;

    /// All registrations, ordered by member id
    async fn holders(&self) -> Result<Vec<RegisteredHolder>, StorageError>;
}

fn to_holders(entries: &BTreeMap<MemberId, EvmAddress>) -> Vec<RegisteredHolder> {
    entries
        .iter()
        .map(|(member, address)| RegisteredHolder {
            member: *member,
            address: address.clone(),
        })
        .collect()
}

/// Address book that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryAddressBook {
    entries: RwLock<BTreeMap<MemberId, EvmAddress>>,
}

impl MemoryAddressBook {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AddressBook for MemoryAddressBook {
    async fn upsert(
        &self,
        member: MemberId,
        address: EvmAddress,
    ) -> Result<Option<EvmAddress>, StorageError> {
        Ok(self.entries.write().await.insert(member, address))
    }

    async fn get(&self, member: MemberId) -> Result<Option<EvmAddress>, StorageError> {
        Ok(self.entries.read().await.get(&member).cloned())
    }

    async fn holders(&self) -> Result<Vec<RegisteredHolder>, StorageError> {
        Ok(to_holders(&*self.entries.read().await))
    }
}

/// Address book persisted as a JSON object `{"<member id>": "0x..."}`.
///
/// The whole file is rewritten on every upsert through a temporary file and
/// a rename, so readers never observe a half-written book.
#[derive(Debug)]
pub struct JsonFileAddressBook {
    path: PathBuf,
    entries: RwLock<BTreeMap<MemberId, EvmAddress>>,
}

impl JsonFileAddressBook {
    /// Open the book at `path`. A missing file is an empty book.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(text) => parse_entries(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(path = %path.display(), holders = entries.len(), "Opened address book");

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    async fn persist(&self, entries: &BTreeMap<MemberId, EvmAddress>) -> Result<(), StorageError> {
        let raw: BTreeMap<String, &str> = entries
            .iter()
            .map(|(member, address)| (member.to_string(), address.as_str()))
            .collect();
        let json = serde_json::to_string_pretty(&raw)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn parse_entries(text: &str) -> Result<BTreeMap<MemberId, EvmAddress>, StorageError> {
    let raw: BTreeMap<String, String> =
        serde_json::from_str(text).map_err(|e| StorageError::Corrupt(e.to_string()))?;

    raw.into_iter()
        .map(|(key, value)| {
            let member = key
                .parse()
                .map(MemberId)
                .map_err(|_| StorageError::Corrupt(format!("invalid member id '{}'", key)))?;
            let address = EvmAddress::parse(&value)
                .map_err(|e| StorageError::Corrupt(format!("member {}: {}", key, e)))?;
            Ok((member, address))
        })
        .collect()
}

#[async_trait]
impl AddressBook for JsonFileAddressBook {
    async fn upsert(
        &self,
        member: MemberId,
        address: EvmAddress,
    ) -> Result<Option<EvmAddress>, StorageError> {
        // Held across the write so concurrent upserts persist in order
        let mut entries = self.entries.write().await;
        let previous = entries.insert(member, address.clone());

        if let Err(e) = self.persist(&entries).await {
            match &previous {
                Some(old) => entries.insert(member, old.clone()),
                None => entries.remove(&member),
            };
            return Err(e);
        }

        tracing::info!(member = %member, address = %address, "Registered wallet");
        Ok(previous)
    }

    async fn get(&self, member: MemberId) -> Result<Option<EvmAddress>, StorageError> {
        Ok(self.entries.read().await.get(&member).cloned())
    }

    async fn holders(&self) -> Result<Vec<RegisteredHolder>, StorageError> {
        Ok(to_holders(&*self.entries.read().await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "0x8ba1f109551bd432803012645ac136ddd64dba72";
    const BOB: &str = "0x19ac2659599fd01c853de846919544276ad26f50";

    fn addr(s: &str) -> EvmAddress {
        EvmAddress::parse(s).unwrap()
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tiergate-{}-{}.json", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_memory_upsert_overwrites() {
        let book = MemoryAddressBook::new();
        assert_eq!(book.upsert(MemberId(1), addr(ALICE)).await.unwrap(), None);
        assert_eq!(
            book.upsert(MemberId(1), addr(BOB)).await.unwrap(),
            Some(addr(ALICE))
        );
        assert_eq!(book.get(MemberId(1)).await.unwrap(), Some(addr(BOB)));
        assert_eq!(book.get(MemberId(2)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_holders_ordered_by_member() {
        let book = MemoryAddressBook::new();
        book.upsert(MemberId(30), addr(BOB)).await.unwrap();
        book.upsert(MemberId(4), addr(ALICE)).await.unwrap();

        let holders = book.holders().await.unwrap();
        assert_eq!(
            holders.iter().map(|h| h.member.0).collect::<Vec<_>>(),
            [4, 30]
        );
    }

    #[tokio::test]
    async fn test_file_book_persists() {
        let path = temp_path("persist");
        let _ = tokio::fs::remove_file(&path).await;

        let book = JsonFileAddressBook::open(&path).await.unwrap();
        assert!(book.holders().await.unwrap().is_empty());
        book.upsert(MemberId(7), addr(ALICE)).await.unwrap();
        book.upsert(MemberId(7), addr(BOB)).await.unwrap();
        book.upsert(MemberId(8), addr(ALICE)).await.unwrap();

        let reopened = JsonFileAddressBook::open(&path).await.unwrap();
        assert_eq!(reopened.get(MemberId(7)).await.unwrap(), Some(addr(BOB)));
        assert_eq!(reopened.holders().await.unwrap().len(), 2);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_file_book_rejects_corrupt_file() {
        let path = temp_path("corrupt");
        tokio::fs::write(&path, r#"{"7": "0x1234"}"#).await.unwrap();
        assert!(matches!(
            JsonFileAddressBook::open(&path).await,
            Err(StorageError::Corrupt(_))
        ));

        tokio::fs::write(&path, "not json").await.unwrap();
        assert!(matches!(
            JsonFileAddressBook::open(&path).await,
            Err(StorageError::Corrupt(_))
        ));

        let _ = tokio::fs::remove_file(&path).await;
    }
}
