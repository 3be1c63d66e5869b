use async_trait::async_trait;
use rota_api::ApiError;

use super::query::SelectQuery;

/// A row as returned by the store: column name to JSON value, embeds nested as objects.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Read side of the backing store.
///
/// Implementations resolve every embed of the query in the same logical read,
/// so all rows of one result come from a single snapshot.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, ApiError>;
}
