//! Rolegate command-line composition root.

#![forbid(unsafe_code)]

mod cli_command;
mod cli_config;

use std::env;
use std::sync::Arc;

use rolegate_application::{
    AuditPermissionEventListener, AuthorizationService, PermissionEventDispatcher,
    PermissionHolder,
};
use rolegate_core::AppError;
use rolegate_domain::{Permission, PermissionId};
use rolegate_infrastructure::{
    PostgresAuditRepository, PostgresPermissionStore, TracingPermissionEventListener,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::cli_command::CliCommand;
use crate::cli_config::{CliConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let command = CliCommand::parse(env::args().skip(1))?;
    let config = CliConfig::load()?;
    let pool = connect_pool(&config).await?;

    if command == CliCommand::Migrate {
        sqlx::migrate!("../../crates/infrastructure/migrations")
            .run(&pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;
        info!("database migrations applied successfully");
        return Ok(());
    }

    let service = build_authorization_service(pool, &config);
    run(command, &service).await
}

async fn connect_pool(config: &CliConfig) -> Result<PgPool, AppError> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_authorization_service(pool: PgPool, config: &CliConfig) -> AuthorizationService {
    let store = Arc::new(PostgresPermissionStore::with_tables(
        pool.clone(),
        config.tables.clone(),
    ));

    let mut dispatcher =
        PermissionEventDispatcher::new().with_listener(Arc::new(TracingPermissionEventListener));
    if config.audit_enabled {
        let audit_repository = Arc::new(PostgresAuditRepository::new(pool));
        dispatcher.subscribe(Arc::new(AuditPermissionEventListener::new(audit_repository)));
    }

    AuthorizationService::new(store.clone(), store, dispatcher)
}

async fn run(command: CliCommand, service: &AuthorizationService) -> Result<(), AppError> {
    match command {
        CliCommand::Migrate => {}
        CliCommand::Permissions { user_id } => {
            let permissions = service.user(user_id).get_permissions().await?;
            for permission in permissions {
                println!("{}", to_json(&permission)?);
            }
        }
        CliCommand::Check { user_id, reference } => {
            let allowed = service.user(user_id).has_permissions(reference).await?;
            println!("{}", if allowed { "allowed" } else { "denied" });
            if !allowed {
                return Err(AppError::Forbidden(format!(
                    "user '{user_id}' doesn't have a required permission"
                )));
            }
        }
        CliCommand::Attach {
            user_id,
            reference,
            touch,
        } => {
            service
                .user(user_id)
                .attach_permission(reference, touch)
                .await?;
        }
        CliCommand::Detach {
            user_id,
            reference,
            touch,
        } => {
            service
                .user(user_id)
                .detach_permission(reference, touch)
                .await?;
        }
        CliCommand::Sync {
            user_id,
            reference,
            detaching,
        } => {
            let changes = service
                .user(user_id)
                .sync_permissions(reference, detaching)
                .await?;
            let ids = |ids: &[PermissionId]| {
                ids.iter().map(|id| id.as_u64()).collect::<Vec<_>>()
            };
            println!(
                "{}",
                serde_json::json!({
                    "attached": ids(&changes.attached),
                    "detached": ids(&changes.detached),
                })
            );
        }
    }

    Ok(())
}

fn to_json(permission: &Permission) -> Result<String, AppError> {
    serde_json::to_string(permission)
        .map_err(|error| AppError::Internal(format!("failed to encode output: {error}")))
}
