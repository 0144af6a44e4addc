use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub upstream: UpstreamSettings,
    pub auth: AuthSettings,
    pub storage: StorageSettings,
    pub dashboard: DashboardSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: SocketAddr,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamSettings {
    pub host: String,
    pub token: String,
    pub timeout_secs: u64,
    pub frame_query: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    pub username: String,
    /// Bcrypt hash, see `lora-dashboard hash-password`
    pub password_hash: String,
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    /// Base64 of 32 bytes; encrypts stored server API keys
    pub encryption_key: String,
    pub login_max_attempts: usize,
    pub login_window_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub catalog_dir: String,
    pub dashboards_dir: String,
    pub servers_file: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardSettings {
    pub save_debounce_ms: u64,
}

const DEFAULT_FRAME_QUERY: &str = "SELECT uplink FROM device '${device}' WHERE LAST '${duration}'";

/// Defaults, then `config/dashboard.*` if present, then
/// `LORA_DASHBOARD__SECTION__KEY` environment variables.
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .set_default("server.bind", "0.0.0.0:8080")?
        .set_default("upstream.host", "http://localhost:8086")?
        .set_default("upstream.token", "")?
        .set_default("upstream.timeout_secs", 30)?
        .set_default("upstream.frame_query", DEFAULT_FRAME_QUERY)?
        .set_default("auth.username", "admin")?
        .set_default("auth.token_ttl_secs", 86_400)?
        .set_default("auth.login_max_attempts", 5)?
        .set_default("auth.login_window_secs", 60)?
        .set_default("storage.catalog_dir", "catalog")?
        .set_default("storage.dashboards_dir", "data/dashboards")?
        .set_default("storage.servers_file", "data/servers.json")?
        .set_default("dashboard.save_debounce_ms", 1000)?
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(
            config::Environment::with_prefix("LORA_DASHBOARD")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Replace template variables in a query string
pub fn prepare_query(query: &str, vars: &HashMap<String, String>) -> String {
    let mut result = query.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_query() {
        let mut vars = HashMap::new();
        vars.insert("device".to_string(), "a84041000181c061".to_string());
        vars.insert("duration".to_string(), "12h".to_string());

        let result = prepare_query(DEFAULT_FRAME_QUERY, &vars);

        assert_eq!(
            result,
            "SELECT uplink FROM device 'a84041000181c061' WHERE LAST '12h'"
        );
    }

    #[test]
    fn test_prepare_query_leaves_unknown_placeholders() {
        let vars = HashMap::from([("device".to_string(), "abc".to_string())]);
        assert_eq!(
            prepare_query("'${device}' '${other}'", &vars),
            "'abc' '${other}'"
        );
    }
}
