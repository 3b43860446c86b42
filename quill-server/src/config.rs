use std::path::PathBuf;

use anyhow::{anyhow, Result};
use quill_core::QuillConfig;
use tracing::{debug, warn};

pub const HTTP_HOST: &str = "http.host";
pub const HTTP_PORT: &str = "http.port";
pub const SITES_PATH: &str = "tenancy.sites_path";
pub const STRICT_WRITES: &str = "tenancy.strict_writes";
pub const ALLOWED_DOMAINS: &str = "cors.allowed_domains";
pub const PRODUCTION: &str = "app.production";
pub const VERSION_FILE: &str = "app.version_file";
pub const UPLOAD_DIR: &str = "uploads.dir";
pub const PUBLIC_SITE_URL: &str = "social.public_url";
pub const STORE_TIMEOUT: &str = "store.timeout";

/// Reads one environment variable.
pub type EnvSource<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Read `.env` (if any) into the process environment. Run this before the
/// log filter is built so a `RUST_LOG` set there applies.
pub fn load_dotenv() -> dotenvy::Result<PathBuf> {
    dotenvy::dotenv()
}

/// Report how `.env` loading went and map the process environment onto
/// config keys.
pub fn load(dotenv: dotenvy::Result<PathBuf>) -> Result<QuillConfig> {
    match dotenv {
        Ok(path) => debug!(path = %path.display(), "loaded .env"),
        Err(err) if err.not_found() => {}
        Err(err) => warn!(error = %err, "ignoring unreadable .env"),
    }
    let mut config = QuillConfig::new();
    configure(&mut config, &|name| std::env::var(name).ok())?;
    Ok(config)
}

/// Map environment variables from `env` onto `config`.
pub fn configure(config: &mut QuillConfig, env: EnvSource<'_>) -> Result<()> {
    configure_http(config, env)?;
    configure_tenancy(config, env);
    configure_app(config, env);
    Ok(())
}

fn var(env: EnvSource<'_>, name: &str) -> Option<String> {
    env(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn configure_http(config: &mut QuillConfig, env: EnvSource<'_>) -> Result<()> {
    let host = var(env, "HTTP_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
    let port = var(env, "API_PORT")
        .or_else(|| var(env, "PORT"))
        .unwrap_or_else(|| "3001".to_string());
    port.parse::<u16>()
        .map_err(|_| anyhow!("Invalid port '{port}'"))?;

    config.set(HTTP_HOST, host);
    config.set(HTTP_PORT, port);
    Ok(())
}

fn configure_tenancy(config: &mut QuillConfig, env: EnvSource<'_>) {
    config.set(
        SITES_PATH,
        var(env, "SITES_CONFIG_PATH").unwrap_or_else(|| "/app/sites-config.json".to_string()),
    );
    config.set(
        STRICT_WRITES,
        var(env, "TENANCY_STRICT_WRITES").unwrap_or_else(|| "false".to_string()),
    );
    config.set(ALLOWED_DOMAINS, var(env, "ALLOWED_DOMAINS").unwrap_or_default());
    config.set(
        STORE_TIMEOUT,
        var(env, "STORE_TIMEOUT").unwrap_or_else(|| "5s".to_string()),
    );
}

fn configure_app(config: &mut QuillConfig, env: EnvSource<'_>) {
    let production = var(env, "ENV")
        .or_else(|| var(env, "NODE_ENV"))
        .is_some_and(|v| v.eq_ignore_ascii_case("production"));
    config.set(PRODUCTION, production.to_string());

    config.set(
        VERSION_FILE,
        var(env, "VERSION_FILE").unwrap_or_else(|| "version.txt".to_string()),
    );
    config.set(
        UPLOAD_DIR,
        var(env, "UPLOAD_DIR").unwrap_or_else(|| "./uploads".to_string()),
    );
    if let Some(url) = var(env, "PUBLIC_SITE_URL") {
        config.set(PUBLIC_SITE_URL, url.trim_end_matches('/').to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn configured(vars: &[(&str, &str)]) -> Result<QuillConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = QuillConfig::new();
        configure(&mut config, &|name| vars.get(name).cloned())?;
        Ok(config)
    }

    #[test]
    fn defaults() {
        let snap = configured(&[]).unwrap().snapshot();
        assert_eq!(snap.get(HTTP_HOST), Some("0.0.0.0"));
        assert_eq!(snap.get(HTTP_PORT), Some("3001"));
        assert_eq!(snap.get(SITES_PATH), Some("/app/sites-config.json"));
        assert_eq!(snap.get_bool(STRICT_WRITES), Some(false));
        assert_eq!(snap.get_bool(PRODUCTION), Some(false));
        assert_eq!(snap.get(UPLOAD_DIR), Some("./uploads"));
        assert_eq!(snap.get(VERSION_FILE), Some("version.txt"));
        assert_eq!(snap.get_duration(STORE_TIMEOUT), Some(Duration::from_secs(5)));
        assert!(snap.get(PUBLIC_SITE_URL).is_none());
        assert!(snap.get_list(ALLOWED_DOMAINS).is_empty());
    }

    #[test]
    fn dotenv_problems_do_not_stop_startup() {
        use std::io::{Error, ErrorKind};
        let missing = dotenvy::Error::Io(Error::from(ErrorKind::NotFound));
        assert!(missing.not_found());
        assert!(load(Err(missing)).is_ok());
        assert!(load(Err(dotenvy::Error::Io(Error::from(ErrorKind::PermissionDenied)))).is_ok());
    }

    #[test]
    fn api_port_wins_over_port() {
        let snap = configured(&[("API_PORT", "4000"), ("PORT", "5000")]).unwrap().snapshot();
        assert_eq!(snap.get(HTTP_PORT), Some("4000"));

        let snap = configured(&[("API_PORT", " "), ("PORT", "5000")]).unwrap().snapshot();
        assert_eq!(snap.get(HTTP_PORT), Some("5000"));

        assert!(configured(&[("PORT", "http")]).is_err());
    }

    #[test]
    fn production_and_lists() {
        let snap = configured(&[
            ("NODE_ENV", "production"),
            ("ALLOWED_DOMAINS", "a.com, b.org,,"),
            ("PUBLIC_SITE_URL", "https://blog.test/"),
            ("TENANCY_STRICT_WRITES", "true"),
        ])
        .unwrap()
        .snapshot();
        assert_eq!(snap.get_bool(PRODUCTION), Some(true));
        assert_eq!(snap.get_list(ALLOWED_DOMAINS), vec!["a.com", "b.org"]);
        assert_eq!(snap.get(PUBLIC_SITE_URL), Some("https://blog.test"));
        assert_eq!(snap.get_bool(STRICT_WRITES), Some(true));
    }
}
