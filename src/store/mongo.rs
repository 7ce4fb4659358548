//! MongoDB-backed record store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, Bson, Document, doc, oid::ObjectId};
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection, Database};
use std::marker::PhantomData;

use super::{RecordStore, StoreError};
use crate::models::{Patch, Record, Resource};

/// Database used when neither the config nor the connection string names one
const DEFAULT_DATABASE: &str = "test";

/// One collection of `T` records in MongoDB
pub struct MongoStore<T> {
    collection: Collection<Document>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Resource> MongoStore<T> {
    /// Connect and ping the server, so an unreachable store fails here
    /// rather than on the first request
    pub async fn connect(uri: &str, database: Option<&str>) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await?;

        let db = match database {
            Some(name) => client.database(name),
            None => client
                .default_database()
                .unwrap_or_else(|| client.database(DEFAULT_DATABASE)),
        };

        db.run_command(doc! { "ping": 1 }).await?;

        Ok(Self::new(&db))
    }

    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection::<Document>(T::COLLECTION),
            _record: PhantomData,
        }
    }

    pub fn database_name(&self) -> String {
        self.collection.namespace().db
    }
}

#[async_trait]
impl<T: Resource> RecordStore<T> for MongoStore<T> {
    async fn create(&self, payload: T) -> Result<Record<T>, StoreError> {
        let mut document = bson::to_document(&payload)?;
        if T::TIMESTAMPS {
            let now = bson::DateTime::now();
            document.insert("createdAt", now);
            document.insert("updatedAt", now);
        }

        let result = self.collection.insert_one(&document).await?;
        document.insert("_id", result.inserted_id);

        decode(document)
    }

    async fn list_all(&self) -> Result<Vec<Record<T>>, StoreError> {
        let documents: Vec<Document> = self.collection.find(doc! {}).await?.try_collect().await?;

        documents.into_iter().map(decode::<T>).collect()
    }

    async fn update_by_id(&self, id: &str, patch: Patch<T>) -> Result<Record<T>, StoreError> {
        let filter = id_filter(id)?;

        let mut set = bson::to_document(&patch.set)?;
        for field in patch.unset {
            set.insert(field, Bson::Null);
        }
        if T::TIMESTAMPS {
            set.insert("updatedAt", bson::DateTime::now());
        }

        // `$set` rejects an empty document; nothing to change means a plain read
        let updated = if set.is_empty() {
            self.collection.find_one(filter).await?
        } else {
            self.collection
                .find_one_and_update(filter, doc! { "$set": set })
                .return_document(ReturnDocument::After)
                .await?
        };

        match updated {
            Some(document) => decode(document),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn delete_by_id(&self, id: &str) -> Result<Record<T>, StoreError> {
        let filter = id_filter(id)?;

        match self.collection.find_one_and_delete(filter).await? {
            Some(document) => decode(document),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }
}

fn id_filter(id: &str) -> Result<Document, StoreError> {
    let oid = ObjectId::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))?;
    Ok(doc! { "_id": oid })
}

/// Split a stored document into id, entity fields and timestamps
fn decode<T: Resource>(document: Document) -> Result<Record<T>, StoreError> {
    let id = match document.get("_id") {
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => return Err(StoreError::CorruptDocument("document has no _id".into())),
    };
    let created_at = timestamp(&document, "createdAt");
    let updated_at = timestamp(&document, "updatedAt");
    let fields = bson::from_document(document)?;

    Ok(Record {
        id,
        fields,
        created_at,
        updated_at,
    })
}

fn timestamp(document: &Document, key: &str) -> Option<DateTime<Utc>> {
    document
        .get_datetime(key)
        .ok()
        .and_then(|dt| DateTime::from_timestamp_millis(dt.timestamp_millis()))
}
