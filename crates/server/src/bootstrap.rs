use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use selma_agent::llm::{CompletionError, HttpCompletionClient};
use selma_agent::pipeline::{ConversationPipeline, DeliveryError};
use selma_agent::prompt::{ContextAssembler, PromptError};
use selma_core::config::{AppConfig, ConfigError, LoadOptions};
use selma_db::repositories::{SqlMessageRepository, SqlUserRepository};
use selma_db::{connect, migrations, DbPool};
use selma_whatsapp::TwilioMessageSender;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub pipeline: Arc<ConversationPipeline>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("prompt template setup failed: {0}")]
    Templates(#[source] PromptError),
    #[error("completion client setup failed: {0}")]
    CompletionClient(#[source] CompletionError),
    #[error("outbound transport setup failed: {0}")]
    Transport(#[source] DeliveryError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let users = Arc::new(SqlUserRepository::new(db_pool.clone()));
    let messages = Arc::new(SqlMessageRepository::new(db_pool.clone()));
    let assembler = ContextAssembler::new(users.clone(), messages.clone())
        .map_err(BootstrapError::Templates)?;
    let completion = Arc::new(
        HttpCompletionClient::from_config(&config.llm).map_err(BootstrapError::CompletionClient)?,
    );
    let transport = Arc::new(
        TwilioMessageSender::from_config(&config.twilio).map_err(BootstrapError::Transport)?,
    );

    let pipeline =
        Arc::new(ConversationPipeline::new(users, messages, assembler, completion, transport));
    info!(event_name = "system.bootstrap.pipeline_ready", "conversation pipeline constructed");

    Ok(Application { config, db_pool, pipeline })
}
