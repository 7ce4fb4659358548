//! In-process record store with the same update semantics as the MongoDB one

use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use serde_json::Value;
use std::sync::Mutex;

use super::{RecordStore, StoreError};
use crate::models::{Patch, Record, Resource};

pub struct MemoryStore<T> {
    records: Mutex<Vec<Record<T>>>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }
}

fn check_id(id: &str) -> Result<(), StoreError> {
    ObjectId::parse_str(id)
        .map(|_| ())
        .map_err(|_| StoreError::InvalidId(id.to_string()))
}

/// Shallow merge: top-level fields present in `patch` replace those in `base`,
/// unset fields are dropped
fn merge<T: Resource>(base: &T, patch: Patch<T>) -> Result<T, StoreError> {
    let invalid = |e: serde_json::Error| StoreError::InvalidDocument(e.to_string());

    let mut merged = serde_json::to_value(base).map_err(invalid)?;
    if let (Value::Object(target), Value::Object(fields)) =
        (&mut merged, serde_json::to_value(patch.set).map_err(invalid)?)
    {
        target.extend(fields);
        for field in &patch.unset {
            target.remove(field);
        }
    }
    serde_json::from_value(merged).map_err(invalid)
}

#[async_trait]
impl<T: Resource> RecordStore<T> for MemoryStore<T> {
    async fn create(&self, payload: T) -> Result<Record<T>, StoreError> {
        let now = T::TIMESTAMPS.then(Utc::now);
        let record = Record {
            id: ObjectId::new().to_hex(),
            fields: payload,
            created_at: now,
            updated_at: now,
        };
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<Record<T>>, StoreError> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn update_by_id(&self, id: &str, patch: Patch<T>) -> Result<Record<T>, StoreError> {
        check_id(id)?;
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        record.fields = merge(&record.fields, patch)?;
        if T::TIMESTAMPS {
            record.updated_at = Some(Utc::now());
        }
        Ok(record.clone())
    }

    async fn delete_by_id(&self, id: &str) -> Result<Record<T>, StoreError> {
        check_id(id)?;
        let mut records = self.records.lock().unwrap();
        let index = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(records.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InventoryItem, SelectedModel, Task};
    use serde_json::Number;

    fn item(part_code: &str, total: i64) -> InventoryItem {
        InventoryItem {
            part_code: Some(part_code.into()),
            total: Some(Number::from(total)),
            ..Default::default()
        }
    }

    fn set<T: Resource>(fields: T) -> Patch<T> {
        Patch {
            set: fields,
            unset: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let store = MemoryStore::<InventoryItem>::default();
        let created = store.create(item("X1", 15)).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, created.id);
        assert_eq!(all[0].fields, item("X1", 15));
        assert!(created.created_at.is_none());
    }

    #[tokio::test]
    async fn test_update_changes_only_given_fields() {
        let store = MemoryStore::<InventoryItem>::default();
        let created = store.create(item("X1", 15)).await.unwrap();

        let patch = InventoryItem {
            total: Some(Number::from(12)),
            ..Default::default()
        };
        let updated = store.update_by_id(&created.id, set(patch)).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.fields, item("X1", 12));
    }

    #[tokio::test]
    async fn test_update_clears_unset_fields() {
        let store = MemoryStore::<InventoryItem>::default();
        let created = store.create(item("X1", 15)).await.unwrap();

        let patch = Patch {
            set: InventoryItem::default(),
            unset: vec!["partCode".to_string()],
        };
        let updated = store.update_by_id(&created.id, patch).await.unwrap();

        assert_eq!(updated.fields.part_code, None);
        assert_eq!(updated.fields.total, Some(Number::from(15)));
    }

    #[tokio::test]
    async fn test_nested_objects_replaced_whole() {
        let store = MemoryStore::<Task>::default();
        let created = store
            .create(Task {
                selected_model: Some(SelectedModel {
                    model: Some("AX-1".into()),
                    capacity: Some("1.5T".into()),
                    warranty: Some(Number::from(1)),
                }),
                ..Default::default()
            })
            .await
            .unwrap();

        let patch = Task {
            selected_model: Some(SelectedModel {
                warranty: Some(Number::from(3)),
                ..Default::default()
            }),
            ..Default::default()
        };
        let updated = store.update_by_id(&created.id, set(patch)).await.unwrap();

        let model = updated.fields.selected_model.unwrap();
        assert_eq!(model.warranty, Some(Number::from(3)));
        assert_eq!(model.model, None);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_missing_and_invalid_ids() {
        let store = MemoryStore::<InventoryItem>::default();
        let missing = ObjectId::new().to_hex();

        assert!(matches!(
            store.delete_by_id(&missing).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.update_by_id("nope", Patch::default()).await,
            Err(StoreError::InvalidId(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let store = MemoryStore::<InventoryItem>::default();
        let created = store.create(item("X1", 15)).await.unwrap();

        store.delete_by_id(&created.id).await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
        assert!(matches!(
            store.delete_by_id(&created.id).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
