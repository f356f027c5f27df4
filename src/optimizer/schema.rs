use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ExplorerError, ExplorerResult};
use crate::executor::{GraphValue, QueryExecutor};
use crate::models::Params;
use crate::queries::{is_identifier, templates};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexInfo {
    pub label: String,
    pub properties: Vec<String>,
    pub index_type: String,
    pub state: String,
}

impl IndexInfo {
    pub fn covers(&self, label: &str, property: &str) -> bool {
        self.label == label && self.properties.iter().any(|p| p == property)
    }
}

/// Index inspection and creation on the connected graph.
#[async_trait]
pub trait SchemaInspector {
    async fn list_indexes(&self) -> ExplorerResult<Vec<IndexInfo>>;
    async fn create_index(&self, label: &str, property: &str) -> ExplorerResult<()>;
}

fn strings(value: Option<&GraphValue>) -> Vec<String> {
    match value {
        Some(GraphValue::String(s)) => vec![s.clone()],
        Some(GraphValue::List(items)) => items.iter().flat_map(|v| strings(Some(v))).collect(),
        Some(GraphValue::Map(entries)) => entries.values().flat_map(|v| strings(Some(v))).collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl<E: QueryExecutor + ?Sized> SchemaInspector for E {
    async fn list_indexes(&self) -> ExplorerResult<Vec<IndexInfo>> {
        let result = self.run(templates::LIST_INDEXES, &Params::new()).await?;

        Ok(result
            .records
            .iter()
            .filter_map(|record| {
                let label = record.get("label")?.as_str()?.to_string();
                let index_type = strings(record.get("types"))
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| "RANGE".to_string());
                let state = record
                    .get("status")
                    .and_then(GraphValue::as_str)
                    .unwrap_or("OPERATIONAL")
                    .to_string();
                Some(IndexInfo {
                    label,
                    properties: strings(record.get("properties")),
                    index_type,
                    state,
                })
            })
            .collect())
    }

    async fn create_index(&self, label: &str, property: &str) -> ExplorerResult<()> {
        if !is_identifier(label) || !is_identifier(property) {
            return Err(ExplorerError::invalid_query(format!(
                "Cannot index :{label}({property}), names must be plain identifiers"
            )));
        }
        self.run(&templates::create_index(label, property), &Params::new())
            .await?;
        info!("Created index on :{}({})", label, property);
        Ok(())
    }
}
