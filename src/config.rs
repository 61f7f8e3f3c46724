use std::{
    collections::HashMap,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;

pub const DEFAULT_ENV_PATH: &str = "./config/local.env";

/// Reads `path` as a dotenv file without touching the process environment.
pub fn load_env_map(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    tracing::info!(path = %path.display(), "using env config file");

    let mut map = HashMap::new();
    for entry in dotenvy::from_path_iter(path)
        .with_context(|| format!("reading env file {}", path.display()))?
    {
        let (key, value) = entry.with_context(|| format!("parsing env file {}", path.display()))?;
        map.insert(key, value);
    }

    tracing::info!(count = map.len(), "loaded environment variables");
    Ok(map)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub store: StoreKind,
    pub seed_path: Option<PathBuf>,
    pub database: DatabaseConfig,
    pub request_timeout: Duration,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode=disable",
            urlencoding::encode(&self.user),
            urlencoding::encode(&self.password),
            self.host,
            self.port,
            urlencoding::encode(&self.name),
        )
    }
}

impl Config {
    pub fn from_vars(vars: &HashMap<String, String>) -> anyhow::Result<Self> {
        let get = |key: &str| vars.get(key).map(|s| s.trim()).filter(|s| !s.is_empty());

        let host = get("HTTP_HOST").unwrap_or("0.0.0.0");
        let port: u16 = get("HTTP_PORT").unwrap_or("8080").parse().context("HTTP_PORT")?;

        let store = match get("FILM_STORE").map(str::to_ascii_lowercase).as_deref() {
            None | Some("postgres") => StoreKind::Postgres,
            Some("memory") => StoreKind::Memory,
            Some(other) => anyhow::bail!("FILM_STORE must be `postgres` or `memory`, got `{other}`"),
        };

        let seed_path = get("FILM_SEED").map(PathBuf::from);

        let require = |key: &str| match get(key) {
            Some(v) => Ok(v.to_string()),
            None if store == StoreKind::Postgres => Err(anyhow::anyhow!("{key} is required")),
            None => Ok(String::new()),
        };

        let database = DatabaseConfig {
            host: get("DB_HOST").unwrap_or("localhost").to_string(),
            port: get("DB_PORT").unwrap_or("5432").parse().context("DB_PORT")?,
            user: require("DB_USER")?,
            password: vars.get("DB_PASSWORD").cloned().unwrap_or_default(),
            name: require("DB_NAME")?,
            max_connections: get("DB_MAX_CONNECTIONS")
                .unwrap_or("10")
                .parse()
                .context("DB_MAX_CONNECTIONS")?,
        };

        let request_timeout_secs: u64 =
            get("REQUEST_TIMEOUT_SECS").unwrap_or("60").parse().context("REQUEST_TIMEOUT_SECS")?;

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HTTP_HOST/HTTP_PORT")?,
            store,
            seed_path,
            database,
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }
}
