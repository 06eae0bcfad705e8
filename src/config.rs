use std::path::PathBuf;

/// Server settings, read from `COTTAGEBOOK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub session_ttl_secs: i64,
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { var: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "{var} must be set"),
            ConfigError::Invalid { var, value } => write!(f, "{var}: invalid value {value:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Unset numeric variables take their
    /// defaults; set but unparseable ones are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let password = lookup("COTTAGEBOOK_PASSWORD")
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::Missing("COTTAGEBOOK_PASSWORD"))?;

        let session_ttl_secs = parse_or(&lookup, "COTTAGEBOOK_SESSION_TTL_SECS", 86_400)?;
        if session_ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                var: "COTTAGEBOOK_SESSION_TTL_SECS",
                value: session_ttl_secs.to_string(),
            });
        }

        Ok(Self {
            port: parse_or(&lookup, "COTTAGEBOOK_PORT", 5480)?,
            bind: lookup("COTTAGEBOOK_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            data_dir: lookup("COTTAGEBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            password,
            max_connections: parse_or(&lookup, "COTTAGEBOOK_MAX_CONNECTIONS", 256)?,
            compact_threshold: parse_or(&lookup, "COTTAGEBOOK_COMPACT_THRESHOLD", 1000)?,
            session_ttl_secs,
            metrics_port: lookup("COTTAGEBOOK_METRICS_PORT")
                .map(|v| parse(&v, "COTTAGEBOOK_METRICS_PORT"))
                .transpose()?,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("bookings.wal")
    }
}

fn parse<T: std::str::FromStr>(value: &str, var: &'static str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(v) => parse(&v, var),
        None => Ok(default),
    }
}
