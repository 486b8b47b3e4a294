//! HTTP surface: health, the generation-only preview endpoint, and the
//! administrative routes the gateway forwards into.
//!
//! The caller's rank arrives in the `x-caller-role` header, set by the
//! gateway from platform identity; absent means an ordinary member.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use forge_engine::{CommandRegistry, Invocation};
use forge_llm::TextGenerator;
use forge_store::RecordStore;
use forge_types::{CommandFault, GuildId, Permission};

use crate::admin::{AdminError, AdminService, FeatureSetting};

pub struct AppState<S, R, G> {
    pub admin: Arc<AdminService<S, R, G>>,
    pub start_time: Instant,
}

impl<S, R, G> Clone for AppState<S, R, G> {
    fn clone(&self) -> Self {
        Self {
            admin: Arc::clone(&self.admin),
            start_time: self.start_time,
        }
    }
}

impl<S, R, G> AppState<S, R, G> {
    pub fn new(admin: Arc<AdminService<S, R, G>>) -> Self {
        Self {
            admin,
            start_time: Instant::now(),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Denied(_) => StatusCode::FORBIDDEN,
            Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::Fault(fault) => match fault {
                CommandFault::ConfigurationMissing => StatusCode::CONFLICT,
                CommandFault::UnknownCommand { .. } => StatusCode::NOT_FOUND,
                CommandFault::UnsafeCode { .. }
                | CommandFault::BindingFailure { .. }
                | CommandFault::GenerationFailure { .. }
                | CommandFault::InvalidName { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                CommandFault::PersistenceFailure { .. } => StatusCode::BAD_GATEWAY,
                CommandFault::HandlerRuntime { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        };
        let body = Json(ErrorBody {
            error: self.user_message(),
        });
        (status, body).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DescribeRequest {
    pub guild_id: u64,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DescribeResponse {
    pub name: String,
    pub code: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetupRequest {
    pub record_key: String,
    pub master_key: String,
}

/// Create from uploaded source when `code` is present, otherwise synthesize
/// from `description`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCommandRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RenameRequest {
    pub new_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DescriptionRequest {
    pub description: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InvokeRequest {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub guild_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub replies: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

fn caller_from(headers: &HeaderMap) -> Permission {
    match headers
        .get("x-caller-role")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("member")
        .to_ascii_lowercase()
        .as_str()
    {
        "owner" => Permission::Owner,
        "administrator" | "admin" => Permission::Administrator,
        "moderator" => Permission::Moderator,
        _ => Permission::Member,
    }
}

async fn health<S, R, G>(State(state): State<AppState<S, R, G>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Generation-only preview: returns a draft without registering or
/// persisting anything.
async fn describe_command<S, R, G>(
    State(state): State<AppState<S, R, G>>,
    Json(request): Json<DescribeRequest>,
) -> Result<Json<DescribeResponse>, AdminError>
where
    S: RecordStore,
    R: CommandRegistry,
    G: TextGenerator,
{
    info!(guild = request.guild_id, "command preview requested");
    let draft = state
        .admin
        .registrar()
        .generator()
        .generate_command(&request.description)
        .await
        .map_err(AdminError::Fault)?;
    Ok(Json(DescribeResponse {
        name: draft.name,
        code: draft.code,
        description: draft.description,
    }))
}

async fn setup_storage<S, R, G>(
    State(state): State<AppState<S, R, G>>,
    Path(guild): Path<u64>,
    headers: HeaderMap,
    Json(request): Json<SetupRequest>,
) -> Result<Json<MessageBody>, AdminError>
where
    S: RecordStore,
    R: CommandRegistry,
    G: TextGenerator,
{
    let message = state
        .admin
        .setup_storage(
            caller_from(&headers),
            GuildId(guild),
            &request.record_key,
            &request.master_key,
        )
        .await?;
    Ok(Json(MessageBody { message }))
}

async fn create_command<S, R, G>(
    State(state): State<AppState<S, R, G>>,
    Path(guild): Path<u64>,
    headers: HeaderMap,
    Json(request): Json<CreateCommandRequest>,
) -> Result<Json<MessageBody>, AdminError>
where
    S: RecordStore,
    R: CommandRegistry,
    G: TextGenerator,
{
    let caller = caller_from(&headers);
    let guild = GuildId(guild);
    let message = match (request.code, request.description) {
        (Some(code), description) => {
            let name = request.name.ok_or_else(|| {
                AdminError::Rejected("uploading code requires a command name".to_string())
            })?;
            state
                .admin
                .create_command(caller, guild, &name, &code, description)
                .await?
        }
        (None, Some(description)) => {
            state
                .admin
                .generate_command(caller, guild, &description)
                .await?
        }
        (None, None) => {
            return Err(AdminError::Rejected(
                "provide either code or a description".to_string(),
            ))
        }
    };
    Ok(Json(MessageBody { message }))
}

async fn delete_command<S, R, G>(
    State(state): State<AppState<S, R, G>>,
    Path((guild, name)): Path<(u64, String)>,
    headers: HeaderMap,
) -> Result<Json<MessageBody>, AdminError>
where
    S: RecordStore,
    R: CommandRegistry,
    G: TextGenerator,
{
    let message = state
        .admin
        .delete_command(caller_from(&headers), GuildId(guild), &name)
        .await?;
    Ok(Json(MessageBody { message }))
}

async fn rename_command<S, R, G>(
    State(state): State<AppState<S, R, G>>,
    Path((guild, name)): Path<(u64, String)>,
    headers: HeaderMap,
    Json(request): Json<RenameRequest>,
) -> Result<Json<MessageBody>, AdminError>
where
    S: RecordStore,
    R: CommandRegistry,
    G: TextGenerator,
{
    let message = state
        .admin
        .rename_command(caller_from(&headers), GuildId(guild), &name, &request.new_name)
        .await?;
    Ok(Json(MessageBody { message }))
}

async fn set_description<S, R, G>(
    State(state): State<AppState<S, R, G>>,
    Path((guild, name)): Path<(u64, String)>,
    headers: HeaderMap,
    Json(request): Json<DescriptionRequest>,
) -> Result<Json<MessageBody>, AdminError>
where
    S: RecordStore,
    R: CommandRegistry,
    G: TextGenerator,
{
    let message = state
        .admin
        .set_description(
            caller_from(&headers),
            GuildId(guild),
            &name,
            &request.description,
        )
        .await?;
    Ok(Json(MessageBody { message }))
}

async fn list_commands<S, R, G>(
    State(state): State<AppState<S, R, G>>,
    Path(guild): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<MessageBody>, AdminError>
where
    S: RecordStore,
    R: CommandRegistry,
    G: TextGenerator,
{
    let message = state
        .admin
        .list_commands(caller_from(&headers), GuildId(guild))
        .await?;
    Ok(Json(MessageBody { message }))
}

async fn set_feature<S, R, G>(
    State(state): State<AppState<S, R, G>>,
    Path(guild): Path<u64>,
    headers: HeaderMap,
    Json(setting): Json<FeatureSetting>,
) -> Result<Json<MessageBody>, AdminError>
where
    S: RecordStore,
    R: CommandRegistry,
    G: TextGenerator,
{
    let message = state
        .admin
        .set_feature(caller_from(&headers), GuildId(guild), setting)
        .await?;
    Ok(Json(MessageBody { message }))
}

async fn invoke_command<S, R, G>(
    State(state): State<AppState<S, R, G>>,
    Path((guild, name)): Path<(u64, String)>,
    Json(request): Json<InvokeRequest>,
) -> Result<Json<InvokeResponse>, AdminError>
where
    S: RecordStore,
    R: CommandRegistry,
    G: TextGenerator,
{
    let invocation = Invocation {
        user_name: request.user_name,
        guild_name: request.guild_name,
    };
    let replies = state
        .admin
        .registrar()
        .invoke(GuildId(guild), &name, invocation)
        .await
        .map_err(AdminError::Fault)?;
    Ok(Json(InvokeResponse { replies }))
}

async fn chat<S, R, G>(
    State(state): State<AppState<S, R, G>>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<MessageBody>, AdminError>
where
    S: RecordStore,
    R: CommandRegistry,
    G: TextGenerator,
{
    let message = state
        .admin
        .chat(caller_from(&headers), &request.question)
        .await?;
    Ok(Json(MessageBody { message }))
}

async fn help<S, R, G>(State(state): State<AppState<S, R, G>>) -> Json<MessageBody>
where
    S: RecordStore,
    R: CommandRegistry,
    G: TextGenerator,
{
    Json(MessageBody {
        message: state.admin.help().to_string(),
    })
}

pub fn router<S, R, G>(state: AppState<S, R, G>) -> Router
where
    S: RecordStore + 'static,
    R: CommandRegistry,
    G: TextGenerator + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/help", get(help))
        .route("/describe_command", post(describe_command))
        .route("/chat", post(chat))
        .route("/guilds/{guild}/setup", post(setup_storage))
        .route(
            "/guilds/{guild}/commands",
            post(create_command).get(list_commands),
        )
        .route("/guilds/{guild}/commands/{name}", delete(delete_command))
        .route("/guilds/{guild}/commands/{name}/rename", post(rename_command))
        .route(
            "/guilds/{guild}/commands/{name}/description",
            put(set_description),
        )
        .route("/guilds/{guild}/commands/{name}/invoke", post(invoke_command))
        .route("/guilds/{guild}/settings", put(set_feature))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve<S, R, G>(state: AppState<S, R, G>, port: u16) -> anyhow::Result<()>
where
    S: RecordStore + 'static,
    R: CommandRegistry,
    G: TextGenerator + 'static,
{
    let app = router(state);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "HTTP server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;
