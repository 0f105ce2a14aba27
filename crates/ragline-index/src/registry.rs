//! Owner-scoped document record store.

use ragline_core::Document;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory registry of document records, scoped by owner.
///
/// Records are only reachable through their owner id, so one owner can
/// never observe or mutate another owner's documents.
#[derive(Default)]
pub struct DocumentRegistry {
    documents: RwLock<HashMap<Uuid, Document>>,
}

impl DocumentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document record.
    pub async fn upsert(&self, document: Document) {
        let mut documents = self.documents.write().await;
        documents.insert(document.id, document);
    }

    /// Fetch one of an owner's documents.
    pub async fn get(&self, owner_id: &str, document_id: Uuid) -> Option<Document> {
        let documents = self.documents.read().await;
        documents
            .get(&document_id)
            .filter(|doc| doc.owner_id == owner_id)
            .cloned()
    }

    /// List an owner's documents, oldest first.
    pub async fn list(&self, owner_id: &str) -> Vec<Document> {
        let documents = self.documents.read().await;
        let mut owned: Vec<Document> = documents
            .values()
            .filter(|doc| doc.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        owned
    }

    /// Find an owner's document with the given content hash, if any.
    pub async fn find_by_hash(&self, owner_id: &str, content_hash: &str) -> Option<Document> {
        let documents = self.documents.read().await;
        documents
            .values()
            .find(|doc| doc.owner_id == owner_id && doc.content_hash == content_hash)
            .cloned()
    }

    /// Apply a mutation to a stored document. Returns the updated record,
    /// or `None` when the document does not exist.
    pub async fn update<F>(&self, document_id: Uuid, mutate: F) -> Option<Document>
    where
        F: FnOnce(&mut Document),
    {
        let mut documents = self.documents.write().await;
        let doc = documents.get_mut(&document_id)?;
        mutate(doc);
        doc.updated_at = chrono::Utc::now();
        Some(doc.clone())
    }

    /// Remove one of an owner's documents. Returns the removed record.
    pub async fn remove(&self, owner_id: &str, document_id: Uuid) -> Option<Document> {
        let mut documents = self.documents.write().await;
        match documents.get(&document_id) {
            Some(doc) if doc.owner_id == owner_id => documents.remove(&document_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragline_core::{DocumentFormat, DocumentStatus};

    fn doc(owner: &str, name: &str) -> Document {
        Document::new(owner, name, DocumentFormat::PlainText, 10, "hash")
    }

    #[tokio::test]
    async fn get_is_owner_scoped() {
        let registry = DocumentRegistry::new();
        let d = doc("alice", "a.txt");
        let id = d.id;
        registry.upsert(d).await;

        assert!(registry.get("alice", id).await.is_some());
        assert!(registry.get("bob", id).await.is_none());
    }

    #[tokio::test]
    async fn list_returns_only_owned_documents() {
        let registry = DocumentRegistry::new();
        registry.upsert(doc("alice", "a.txt")).await;
        registry.upsert(doc("alice", "b.txt")).await;
        registry.upsert(doc("bob", "c.txt")).await;

        let alice = registry.list("alice").await;
        assert_eq!(alice.len(), 2);
        assert!(alice.iter().all(|d| d.owner_id == "alice"));
    }

    #[tokio::test]
    async fn update_touches_timestamp() {
        let registry = DocumentRegistry::new();
        let d = doc("alice", "a.txt");
        let id = d.id;
        let created = d.updated_at;
        registry.upsert(d).await;

        let updated = registry
            .update(id, |doc| doc.status = DocumentStatus::Extracted)
            .await
            .unwrap();
        assert_eq!(updated.status, DocumentStatus::Extracted);
        assert!(updated.updated_at >= created);
    }

    #[tokio::test]
    async fn remove_rejects_wrong_owner() {
        let registry = DocumentRegistry::new();
        let d = doc("alice", "a.txt");
        let id = d.id;
        registry.upsert(d).await;

        assert!(registry.remove("bob", id).await.is_none());
        assert!(registry.remove("alice", id).await.is_some());
        assert!(registry.get("alice", id).await.is_none());
    }

    #[tokio::test]
    async fn find_by_hash_matches_owner_and_digest() {
        let registry = DocumentRegistry::new();
        registry.upsert(doc("alice", "a.txt")).await;

        assert!(registry.find_by_hash("alice", "hash").await.is_some());
        assert!(registry.find_by_hash("alice", "other").await.is_none());
        assert!(registry.find_by_hash("bob", "hash").await.is_none());
    }
}
