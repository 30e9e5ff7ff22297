use anyhow::{anyhow, Result};
use config::Config;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Connection settings for the administrative database session.
#[derive(Clone)]
pub struct DatabaseSettings {
    /// Host of the cluster-local proxy (defaults to `$PRIVATE_IP`)
    pub host: String,

    /// Port of the cluster-local proxy
    pub port: u16,

    /// Administrative role used for catalog operations
    pub user: String,

    /// Password of the administrative role (defaults to `$SU_PASSWORD`)
    pub password: String,

    /// Database the administrative session connects to
    pub dbname: String,

    /// Upper bound for establishing a session
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("dbname", &self.dbname)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Address the HTTP facade binds to
    pub listen_address: String,

    /// Port the HTTP facade listens on
    pub listen_port: u16,

    /// Administrative database session settings
    pub database: DatabaseSettings,

    /// Timeout for a single peer role probe
    pub probe_timeout: Duration,

    /// How long to wait for the restart command before reporting failure
    pub restart_timeout: Duration,
}

pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_LISTEN_PORT: u16 = 5550;
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_USER: &str = "flypgadmin";
pub const DEFAULT_DB_NAME: &str = "postgres";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RESTART_TIMEOUT: Duration = Duration::from_secs(120);

const EMPTY_CONFIG: &str = r#"### clusteradm configuration file

### HTTP listener
# listen_address = "0.0.0.0"
# listen_port = 5550

### administrative database session (stolon proxy)
# db_host = "fdaa::3"               # defaults to $PRIVATE_IP
# db_port = 5432
# db_user = "flypgadmin"
# db_password = ""                  # defaults to $SU_PASSWORD
# db_name = "postgres"

### timeouts (humantime format, e.g. "500ms", "5s", "2m")
# connect_timeout = "5s"
# probe_timeout = "5s"
# restart_timeout = "2m"
"#;

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            listen_port: DEFAULT_LISTEN_PORT,
            database: DatabaseSettings {
                host: "localhost".to_string(),
                port: DEFAULT_DB_PORT,
                user: DEFAULT_DB_USER.to_string(),
                password: String::new(),
                dbname: DEFAULT_DB_NAME.to_string(),
                connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            },
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            restart_timeout: DEFAULT_RESTART_TIMEOUT,
        }
    }
}

impl AdminConfig {
    /// Load configuration from a TOML file (if any) and `CLUSTERADM_*` environment variables.
    ///
    /// An explicit `path` must exist. Without one, `$HOME/.clusteradm/clusteradm.toml`
    /// is read when present.
    pub fn new(path: &Option<String>) -> Result<AdminConfig> {
        let mut builder = Config::builder();

        match path {
            Some(p) => {
                if !Path::new(p.as_str()).exists() {
                    return Err(anyhow!("Configuration file {} does not exist", p));
                }
                builder = builder.add_source(config::File::with_name(p.as_str()));
            }
            None => {
                if let Some(p) = Self::default_config_path() {
                    if Path::new(p.as_str()).exists() {
                        builder = builder.add_source(config::File::with_name(p.as_str()));
                    }
                }
            }
        }

        // E.g., `CLUSTERADM_DB_HOST=fdaa::3 clusteradm serve` overrides the proxy host
        builder = builder.add_source(config::Environment::with_prefix("CLUSTERADM"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let map = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_settings(&map, |key| std::env::var(key).ok())
    }

    /// Build a configuration from flat key/value settings.
    ///
    /// `fallback` resolves the cluster-provided variables (`PRIVATE_IP`, `SU_PASSWORD`)
    /// used when the host or password are not configured explicitly.
    pub fn from_settings<F>(map: &HashMap<String, String>, fallback: F) -> Result<AdminConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AdminConfig::default();

        let listen_address = map
            .get("listen_address")
            .cloned()
            .unwrap_or(defaults.listen_address);
        let listen_port = parse_number(map, "listen_port")?.unwrap_or(defaults.listen_port);

        let host = map
            .get("db_host")
            .cloned()
            .or_else(|| fallback("PRIVATE_IP"))
            .unwrap_or(defaults.database.host);
        let password = map
            .get("db_password")
            .cloned()
            .or_else(|| fallback("SU_PASSWORD"))
            .unwrap_or_default();

        let database = DatabaseSettings {
            host,
            port: parse_number(map, "db_port")?.unwrap_or(defaults.database.port),
            user: map
                .get("db_user")
                .cloned()
                .unwrap_or(defaults.database.user),
            password,
            dbname: map
                .get("db_name")
                .cloned()
                .unwrap_or(defaults.database.dbname),
            connect_timeout: parse_duration(map, "connect_timeout")?
                .unwrap_or(defaults.database.connect_timeout),
        };

        Ok(AdminConfig {
            listen_address,
            listen_port,
            database,
            probe_timeout: parse_duration(map, "probe_timeout")?.unwrap_or(defaults.probe_timeout),
            restart_timeout: parse_duration(map, "restart_timeout")?
                .unwrap_or(defaults.restart_timeout),
        })
    }

    /// Get the full bind address
    pub fn bind_address(&self) -> String {
        if self.listen_address.contains(':') {
            format!("[{}]:{}", self.listen_address, self.listen_port)
        } else {
            format!("{}:{}", self.listen_address, self.listen_port)
        }
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let password = if self.database.password.is_empty() {
            "(not set)"
        } else {
            "<redacted>"
        };
        [
            format!("Listen Address:     {}", self.bind_address()),
            format!(
                "Database:           {}@{}:{}/{}",
                self.database.user, self.database.host, self.database.port, self.database.dbname
            ),
            format!("Database Password:  {}", password),
            format!(
                "Connect Timeout:    {}",
                humantime::format_duration(self.database.connect_timeout)
            ),
            format!(
                "Probe Timeout:      {}",
                humantime::format_duration(self.probe_timeout)
            ),
            format!(
                "Restart Timeout:    {}",
                humantime::format_duration(self.restart_timeout)
            ),
        ]
        .join("\n")
    }

    /// Get the default config file path, if a home directory is available
    pub fn default_config_path() -> Option<String> {
        dirs::home_dir().map(|h| format!("{}/.clusteradm/clusteradm.toml", h.to_string_lossy()))
    }

    /// Write a commented configuration template to `path`
    pub fn write_template(path: &str) -> Result<()> {
        if Path::new(path).exists() {
            return Err(anyhow!("Configuration file {} already exists", path));
        }
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| anyhow!("Unable to create config directory: {}", e))?;
        }
        std::fs::write(path, EMPTY_CONFIG)
            .map_err(|e| anyhow!("Unable to create config file {}: {}", path, e))
    }
}

fn parse_number<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    map.get(key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| anyhow!("Invalid value for {}: {} ({})", key, v, e))
        })
        .transpose()
}

fn parse_duration(map: &HashMap<String, String>, key: &str) -> Result<Option<Duration>> {
    map.get(key)
        .map(|v| {
            humantime::parse_duration(v.trim())
                .map_err(|e| anyhow!("Invalid duration for {}: {} ({})", key, v, e))
        })
        .transpose()
}
