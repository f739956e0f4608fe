use std::env;

use rolegate_core::AppError;
use rolegate_infrastructure::StoreTables;
use tracing_subscriber::EnvFilter;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub audit_enabled: bool,
    pub tables: StoreTables,
}

impl CliConfig {
    pub fn load() -> Result<Self, AppError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AppError::Validation("DATABASE_URL is required".to_owned()))?;

        let max_connections = match lookup("ROLEGATE_DATABASE_MAX_CONNECTIONS") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|connections| *connections > 0)
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "ROLEGATE_DATABASE_MAX_CONNECTIONS must be a positive integer, got '{value}'"
                    ))
                })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let audit_enabled = lookup("ROLEGATE_AUDIT")
            .unwrap_or_else(|| "false".to_owned())
            .eq_ignore_ascii_case("true");

        let defaults = StoreTables::default();
        let table = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_owned());
        let tables = StoreTables::new(
            table("ROLEGATE_TABLE_PERMISSIONS", defaults.permissions()),
            table("ROLEGATE_TABLE_ROLES", defaults.roles()),
            table("ROLEGATE_TABLE_PERMISSION_USER", defaults.permission_user()),
            table("ROLEGATE_TABLE_PERMISSION_ROLE", defaults.permission_role()),
            table("ROLEGATE_TABLE_ROLE_USER", defaults.role_user()),
        )?;

        Ok(Self {
            database_url,
            max_connections,
            audit_enabled,
            tables,
        })
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();
}
