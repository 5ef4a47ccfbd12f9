use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;

pub type Db = Surreal<Any>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("SURREALDB_URL").unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("SURREALDB_NAMESPACE").unwrap_or_else(|_| "sproxy".to_string()),
            database: env::var("SURREALDB_DATABASE").unwrap_or_else(|_| "identity".to_string()),
            username: env::var("SURREALDB_USERNAME").ok(),
            password: env::var("SURREALDB_PASSWORD").ok(),
        }
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = vec![
        // Accounts are keyed by a hash of the email, so a second CREATE for
        // the same email fails instead of producing a duplicate.
        "DEFINE TABLE IF NOT EXISTS account SCHEMALESS;
         DEFINE FIELD IF NOT EXISTS email ON TABLE account TYPE string;
         DEFINE FIELD IF NOT EXISTS display_name ON TABLE account TYPE string;
         DEFINE FIELD IF NOT EXISTS is_active ON TABLE account TYPE bool DEFAULT true;
         DEFINE FIELD IF NOT EXISTS remember_password ON TABLE account TYPE bool DEFAULT false;",

        "DEFINE INDEX IF NOT EXISTS account_email ON TABLE account COLUMNS email UNIQUE;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    Ok(())
}
