use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Connection string for the external guiaseller database. The credential
    /// behind this URL should be a read-only role; the pool additionally forces
    /// read-only transactions on every connection.
    pub source_database_url: String,
    /// Connection string for the leads database (full CRUD).
    pub leads_database_url: String,
    pub port: u16,
}

fn validate_pg_url(var: &str, url: String) -> anyhow::Result<String> {
    if url.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", var);
    }
    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
        anyhow::bail!("{} must start with postgresql:// or postgres://", var);
    }
    Ok(url)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            source_database_url: std::env::var("SOURCE_DB_URL")
                .or_else(|_| std::env::var("GUIASELLER_DB_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("SOURCE_DB_URL or GUIASELLER_DB_URL environment variable required")
                })
                .and_then(|url| validate_pg_url("SOURCE_DB_URL", url))?,
            leads_database_url: std::env::var("LEADS_DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("LEADS_DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| validate_pg_url("LEADS_DB_URL", url))?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
        };

        // Log loaded values without credentials
        tracing::debug!(
            "Source DB URL: {}...",
            &config.source_database_url[..20.min(config.source_database_url.len())]
        );
        tracing::debug!(
            "Leads DB URL: {}...",
            &config.leads_database_url[..20.min(config.leads_database_url.len())]
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
