use surrealdb::engine::any::{connect, Any};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::info;

use crate::middleware::error::AppResult;

pub type Db = Surreal<Any>;

/// Connection settings for one deployment. Credentials are optional so
/// the embedded `mem://` engine used by tests can skip signin.
#[derive(Debug)]
pub struct DbConfig<'a> {
    pub url: &'a str,
    pub database: &'a str,
    pub namespace: &'a str,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
}

#[derive(Debug)]
pub struct Database {
    pub client: Db,
}

impl Database {
    pub async fn connect(config: DbConfig<'_>) -> AppResult<Self> {
        info!("connecting storage at {}", config.url);
        let client = connect(config.url).await?;

        if let (Some(username), Some(password)) = (config.username, config.password) {
            client.signin(Root { username, password }).await?;
        }

        client
            .use_ns(config.namespace)
            .use_db(config.database)
            .await?;

        let version = client.version().await?;
        info!("storage ready, SurrealDB {version}");
        Ok(Self { client })
    }
}
