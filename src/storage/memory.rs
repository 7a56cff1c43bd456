use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::Result;
use crate::ring::Id;
use crate::ring::IdRange;
use crate::ring::RingOrder;
use crate::storage::ObjectStorage;

/// In-memory object store over a concurrent map.
#[derive(Debug, Default)]
pub struct MemStorage {
    table: DashMap<Id, Bytes>,
}

impl MemStorage {
    /// New empty store.
    pub fn new() -> Self {
        Self {
            table: DashMap::default(),
        }
    }
}

#[async_trait]
impl ObjectStorage for MemStorage {
    async fn get(&self, key: Id) -> Result<Option<Bytes>> {
        Ok(self.table.get(&key).map(|v| v.value().clone()))
    }

    async fn put(&self, key: Id, object: &Bytes) -> Result<()> {
        self.table.insert(key, object.clone());
        Ok(())
    }

    async fn scan(&self, range: &IdRange) -> Result<Vec<Id>> {
        let mut keys: Vec<Id> = self
            .table
            .iter()
            .map(|entry| *entry.key())
            .filter(|key| range.contains(*key))
            .collect();
        keys.sort_clockwise(range.ccw);
        Ok(keys)
    }

    async fn delete(&self, key: Id) -> Result<()> {
        self.table.remove(&key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.table.clear();
        Ok(())
    }

    async fn count(&self) -> Result<u32> {
        Ok(self.table.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memstorage_basic_interface_should_work() {
        let store = MemStorage::new();
        let key = Id::from(99u32);

        assert_eq!(store.get(key).await.unwrap(), None);

        store.put(key, &Bytes::from_static(b"value 1")).await.unwrap();
        assert_eq!(
            store.get(key).await.unwrap(),
            Some(Bytes::from_static(b"value 1"))
        );

        store.put(key, &Bytes::from_static(b"value 2")).await.unwrap();
        assert_eq!(
            store.get(key).await.unwrap(),
            Some(Bytes::from_static(b"value 2"))
        );

        assert_eq!(store.count().await.unwrap(), 1);
        store.delete(key).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn memstorage_scan_follows_the_arc() {
        let store = MemStorage::new();
        let body = Bytes::from_static(b"x");
        for slot in [5u32, 15, 25, 35] {
            store.put(Id::from(slot), &body).await.unwrap();
        }

        let keys = store
            .scan(&IdRange::new(Id::from(10u32), Id::from(30u32)))
            .await
            .unwrap();
        assert_eq!(keys, vec![Id::from(15u32), Id::from(25u32)]);

        // A wrapping arc picks up both ends, ccw edge first.
        let keys = store
            .scan(&IdRange::new(Id::from(30u32), Id::from(10u32)))
            .await
            .unwrap();
        assert_eq!(keys, vec![Id::from(35u32), Id::from(5u32)]);

        let keys = store.scan(&IdRange::full()).await.unwrap();
        assert_eq!(keys.len(), 4);

        let keys = store.scan(&IdRange::empty()).await.unwrap();
        assert!(keys.is_empty());
    }
}
