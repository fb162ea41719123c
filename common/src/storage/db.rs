use surrealdb::{
    engine::any::{connect, Any},
    opt::auth::Root,
    Error, Surreal,
};

use super::types::StoredObject;

#[derive(Clone)]
pub struct SurrealDbClient {
    pub client: Surreal<Any>,
}

impl SurrealDbClient {
    /// Connects to the configured address. Credentials are optional so an
    /// embedded engine can be used without a signin round-trip.
    pub async fn new(
        address: &str,
        username: Option<&str>,
        password: Option<&str>,
        namespace: &str,
        database: &str,
    ) -> Result<Self, Error> {
        let db = connect(address).await?;

        if let (Some(username), Some(password)) = (username, password) {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }

    /// In-memory engine, used by tests.
    pub async fn memory(namespace: &str, database: &str) -> Result<Self, Error> {
        Self::new("mem://", None, None, namespace, database).await
    }

    /// Defines the artifact table indexes; idempotent.
    pub async fn ensure_initialized(&self) -> Result<(), Error> {
        self.client
            .query(
                "DEFINE INDEX IF NOT EXISTS idx_artifact_kind ON analysis_artifact FIELDS kind;
                 DEFINE INDEX IF NOT EXISTS idx_artifact_subject ON analysis_artifact FIELDS subject;
                 DEFINE INDEX IF NOT EXISTS idx_artifact_session ON analysis_artifact FIELDS session_id;
                 DEFINE INDEX IF NOT EXISTS idx_artifact_created ON analysis_artifact FIELDS created_at;",
            )
            .await?;
        Ok(())
    }

    pub async fn store_item<T>(&self, item: T) -> Result<Option<T>, Error>
    where
        T: StoredObject + Send + Sync + 'static,
    {
        self.client
            .create((T::table_name(), item.get_id()))
            .content(item)
            .await
    }

    pub async fn get_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: StoredObject + Send + Sync + 'static,
    {
        self.client.select((T::table_name(), id)).await
    }
}
