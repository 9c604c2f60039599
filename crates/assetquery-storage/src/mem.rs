use crate::traits::{DocumentStore, Filter, GroupCount, Projection};
use assetquery_core::{Document, Result, Value, ID_FIELD};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use prometheus::{register_histogram_vec, HistogramVec};
use std::collections::HashMap;
use std::sync::Arc;
use ulid::Ulid;

static STORE_OP_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "assetquery_store_op_seconds",
        "In-memory store latency",
        &["op"]
    )
    .unwrap()
});

/// Documents held in load order behind a read-write lock. Reads never block each other.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    docs: Vec<Document>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(docs: impl IntoIterator<Item = Document>) -> Self {
        let store = Self::new();
        for d in docs {
            store.insert(d);
        }
        store
    }

    /// Adds a document, assigning an identity when it has none.
    pub fn insert(&self, mut doc: Document) {
        if !doc.contains_key(ID_FIELD) {
            doc.shift_insert(0, ID_FIELD.to_string(), Value::String(Ulid::new().to_string()));
        }
        self.inner.write().docs.push(doc);
    }

    pub fn len(&self) -> usize {
        self.inner.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all_documents(&self) -> Vec<Document> {
        self.inner.read().docs.clone()
    }
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryStore {
    async fn find(&self, filter: &Filter, projection: &Projection) -> Result<Vec<Document>> {
        let _timer = STORE_OP_SECONDS.with_label_values(&["find"]).start_timer();
        let compiled = filter.compile()?;
        let inner = self.inner.read();
        Ok(inner
            .docs
            .iter()
            .filter(|d| compiled.accepts(d))
            .map(|d| projection.apply(d))
            .collect())
    }

    async fn count(&self, filter: &Filter) -> Result<u64> {
        let _timer = STORE_OP_SECONDS.with_label_values(&["count"]).start_timer();
        let compiled = filter.compile()?;
        let inner = self.inner.read();
        Ok(inner.docs.iter().filter(|d| compiled.accepts(d)).count() as u64)
    }

    async fn group_count(&self, field: &str) -> Result<Vec<GroupCount>> {
        let _timer = STORE_OP_SECONDS
            .with_label_values(&["group_count"])
            .start_timer();
        let inner = self.inner.read();
        // groups in first-seen order; index keyed by the JSON form of the key
        let mut groups: Vec<GroupCount> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for d in inner.docs.iter() {
            let key = d.get(field).cloned().unwrap_or(Value::Null);
            let id = serde_json::to_string(&key).unwrap_or_default();
            match index.get(&id) {
                Some(&i) => groups[i].count += 1,
                None => {
                    index.insert(id, groups.len());
                    groups.push(GroupCount { key, count: 1 });
                }
            }
        }
        Ok(groups)
    }

    fn document_count(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetquery_core::Map;

    fn doc(pairs: &[(&str, Value)]) -> Document {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<Map>()
    }

    fn store() -> InMemoryStore {
        InMemoryStore::from_documents([
            doc(&[("Lab name", Value::from("Alpha")), ("Solution", Value::Null)]),
            doc(&[("Lab name", Value::from("Beta")), ("Solution", Value::from(""))]),
            doc(&[("Lab name", Value::from("Alpha")), ("Solution", Value::from("fixed"))]),
            doc(&[("Solution", Value::from("patch"))]),
        ])
    }

    #[tokio::test]
    async fn assigns_ids_first() {
        let s = store();
        let docs = s.scan().await.unwrap();
        assert_eq!(docs.len(), 4);
        assert!(docs
            .iter()
            .all(|d| d.get_index(0).map(|(k, _)| k.as_str()) == Some(ID_FIELD)));
    }

    #[tokio::test]
    async fn keeps_existing_ids() {
        let s = InMemoryStore::from_documents([doc(&[("_id", Value::from("abc"))])]);
        let docs = s.scan().await.unwrap();
        assert_eq!(docs[0][ID_FIELD], Value::from("abc"));
    }

    #[tokio::test]
    async fn counts_with_filter() {
        let s = store();
        assert_eq!(s.count(&Filter::new().blank("Solution")).await.unwrap(), 2);
        assert_eq!(s.count(&Filter::new()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn groups_in_first_seen_order() {
        let s = store();
        let groups = s.group_count("Lab name").await.unwrap();
        assert_eq!(
            groups,
            vec![
                GroupCount {
                    key: Value::from("Alpha"),
                    count: 2
                },
                GroupCount {
                    key: Value::from("Beta"),
                    count: 1
                },
                GroupCount {
                    key: Value::Null,
                    count: 1
                },
            ]
        );
    }

    #[tokio::test]
    async fn find_projects_matches() {
        let s = store();
        let docs = s
            .find(
                &Filter::new().equals("Lab name", "Alpha"),
                &Projection::include(["Solution"]).without_id(),
            )
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1], doc(&[("Solution", Value::from("fixed"))]));
    }
}
