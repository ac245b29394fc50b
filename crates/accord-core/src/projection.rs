//! Projection of accepted answers into the employee profile.

use crate::error::StoreResult;
use crate::storage::ProfileStore;
use crate::types::ProfileRecord;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Maps field values to profile attributes and writes them through a [`ProfileStore`].
///
/// Profile values are never rolled back; re-projecting a value is an idempotent upsert.
#[derive(Clone)]
pub struct ProfileProjector {
    store: Arc<dyn ProfileStore>,
}

impl ProfileProjector {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Profile attributes derived from one field value. Contract terms have none.
    pub fn attributes_for(field: &str, value: &str) -> BTreeMap<String, String> {
        let mut attributes = BTreeMap::new();
        match field {
            "full_name" => {
                let mut parts = value.split_whitespace();
                let first = parts.next().unwrap_or_default();
                let last = parts.collect::<Vec<_>>().join(" ");
                attributes.insert("first_name".to_string(), first.to_string());
                attributes.insert("last_name".to_string(), last);
            }
            "birth_date" => {
                attributes.insert("date_of_birth".to_string(), value.to_string());
            }
            "account_holder" => {
                attributes.insert("bank_account_holder".to_string(), value.to_string());
            }
            "account_number" => {
                attributes.insert("bank_account_number".to_string(), value.to_string());
            }
            "position" => {
                attributes.insert("job_title".to_string(), value.to_string());
            }
            "start_date" => {
                attributes.insert("employment_start_date".to_string(), value.to_string());
            }
            "national_id" | "nationality" | "bank_name" | "department" => {
                attributes.insert(field.to_string(), value.to_string());
            }
            _ => {}
        }
        attributes
    }

    pub async fn project(
        &self,
        subject_id: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<ProfileRecord>> {
        let attributes = Self::attributes_for(field, value);
        if attributes.is_empty() {
            return Ok(None);
        }
        debug!(subject_id = %subject_id, field = %field, attributes = attributes.len(), "projecting into profile");
        self.store
            .merge_attributes(subject_id, attributes)
            .await
            .map(Some)
    }

    /// Project every value at once; returns how many attributes were written.
    pub async fn project_all(
        &self,
        subject_id: &str,
        values: &BTreeMap<String, String>,
    ) -> StoreResult<usize> {
        let attributes: BTreeMap<String, String> = values
            .iter()
            .flat_map(|(field, value)| Self::attributes_for(field, value))
            .collect();
        if attributes.is_empty() {
            return Ok(0);
        }
        let count = attributes.len();
        self.store.merge_attributes(subject_id, attributes).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    #[test]
    fn full_name_splits_on_first_token() {
        let attributes = ProfileProjector::attributes_for("full_name", "Ana María López García");
        assert_eq!(attributes["first_name"], "Ana");
        assert_eq!(attributes["last_name"], "María López García");
    }

    #[test]
    fn terms_are_not_projected() {
        assert!(ProfileProjector::attributes_for("weekly_hours", "40").is_empty());
    }

    #[tokio::test]
    async fn project_all_merges_into_one_record() {
        let store = Arc::new(InMemoryStore::new());
        let projector = ProfileProjector::new(store.clone());
        let mut values = BTreeMap::new();
        values.insert("full_name".to_string(), "John Doe".to_string());
        values.insert("position".to_string(), "Engineer".to_string());

        assert_eq!(projector.project_all("emp-1", &values).await.unwrap(), 3);
        let profile = store.load_profile("emp-1").await.unwrap().unwrap();
        assert_eq!(profile.attributes["job_title"], "Engineer");
        assert_eq!(profile.attributes["last_name"], "Doe");
    }
}
