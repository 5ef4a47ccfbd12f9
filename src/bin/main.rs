use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use sproxy_identity::{DatabaseConfig, Email, UserStore, load_resolver_config};

#[derive(Parser)]
#[command(name = "sproxy-identity")]
#[command(about = "Trusted header identity resolver for the sproxy reverse proxy")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server with identity resolution on every request
    Server {
        /// Bind address, e.g. 0.0.0.0:8080
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
        /// Resolver config file (JSON)
        #[arg(long, env = "SPROXY_CONFIG")]
        config: Option<PathBuf>,
        /// Enable all e-mail notifications for new accounts
        #[arg(long, default_value_t = false)]
        notify: bool,
    },
    /// Initialize the database
    Init {
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// List all accounts
    ListAccounts {
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Deactivate an account by email
    Deactivate {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Reactivate a deactivated account by email
    Reactivate {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Change an account's display name
    SetDisplayName {
        #[arg(long)]
        email: String,
        display_name: String,
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
}

/// Log filter used when `RUST_LOG` is unset or empty.
const DEFAULT_LOG_FILTER: &str = "sproxy_identity=info";

fn env_filter(rust_log: Option<String>) -> EnvFilter {
    match rust_log.filter(|directives| !directives.trim().is_empty()) {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::new(DEFAULT_LOG_FILTER),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(std::env::var("RUST_LOG").ok()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server {
            bind,
            db_url,
            config,
            notify,
        } => {
            let mut resolver_config = load_resolver_config(config)?;
            if notify {
                resolver_config.notify_on_account_creation = true;
            }

            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            info!("Using database url for HTTP server: {}", db_config.url);

            sproxy_identity::server::start_http(&bind, db_config, resolver_config).await?;
        }
        Commands::Init { db_url } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            info!("Using database url for initialization: {}", db_config.url);

            info!("Initializing database...");
            let db = sproxy_identity::create_connection(db_config).await?;
            sproxy_identity::ensure_schema(&db).await?;
            info!("Database initialized successfully");
        }
        Commands::ListAccounts { db_url } => {
            let store = open_store(db_url).await?;
            let accounts = store.list_accounts().await?;

            if accounts.is_empty() {
                println!("No accounts found.");
                return Ok(());
            }

            println!(
                "{:<32} {:<24} {:<10} {:<25} {:<25}",
                "EMAIL", "DISPLAY NAME", "STATUS", "CREATED", "LAST SEEN"
            );
            println!("{}", "-".repeat(116));

            for account in accounts {
                let status = if account.is_active { "Active" } else { "Inactive" };
                let created = account
                    .created_at
                    .map(|dt| dt.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let last_seen = account
                    .last_seen_at
                    .map(|dt| dt.to_string())
                    .unwrap_or_else(|| "Never".to_string());

                println!(
                    "{:<32} {:<24} {:<10} {:<25} {:<25}",
                    account.email, account.display_name, status, created, last_seen
                );
            }
        }
        Commands::Deactivate { email, db_url } => {
            let store = open_store(db_url).await?;

            if store.deactivate(&Email::new(email.trim())).await? {
                println!("Account '{}' has been deactivated.", email);
            } else {
                println!("No account found with email '{}'.", email);
            }
        }
        Commands::Reactivate { email, db_url } => {
            let store = open_store(db_url).await?;

            if store.reactivate(&Email::new(email.trim())).await? {
                println!("Account '{}' has been reactivated.", email);
            } else {
                println!("No account found with email '{}'.", email);
            }
        }
        Commands::SetDisplayName {
            email,
            display_name,
            db_url,
        } => {
            let store = open_store(db_url).await?;

            if store
                .set_display_name(&Email::new(email.trim()), &display_name)
                .await?
            {
                println!("Display name of '{}' set to '{}'.", email, display_name);
            } else {
                println!("No account found with email '{}'.", email);
            }
        }
    }

    Ok(())
}

async fn open_store(db_url: String) -> Result<UserStore> {
    let db_config = DatabaseConfig {
        url: db_url,
        ..Default::default()
    };
    let db = sproxy_identity::create_connection(db_config).await?;
    sproxy_identity::ensure_schema(&db).await?;
    Ok(UserStore::new(db))
}
