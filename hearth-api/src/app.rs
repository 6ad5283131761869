/// Application state and router builder
///
/// `AppState` is the composition root: it owns the pool, the session
/// registry and every service built on them, and is cloned into each
/// handler through axum's `State` extractor.
///
/// # Example
///
/// ```no_run
/// use hearth_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config, None);
///
/// let app = build_router(state);
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::auth::jwt_auth_layer, middleware::security::SecurityHeadersLayer};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, patch, post},
    Router,
};
use chrono::Duration;
use hearth_shared::directory::{MembershipDirectory, PgMembershipDirectory};
use hearth_shared::invitations::{InvitationService, InvitationSettings};
use hearth_shared::notify::{
    HttpMailer, HttpPushDispatcher, LogMailer, Mailer, NoopPushDispatcher, Notifier, PushDispatcher,
};
use hearth_shared::realtime::{ChangeBroadcaster, LocalTransport, RealtimeTransport, RedisRelay, SessionRegistry};
use hearth_shared::redis::RedisClient;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,

    /// Live WebSocket sessions of this instance
    pub registry: SessionRegistry,

    pub directory: Arc<dyn MembershipDirectory>,
    pub broadcaster: ChangeBroadcaster,
    pub notifier: Notifier,
    pub invitations: InvitationService,

    /// Present when `REDIS_URL` is configured
    pub relay: Option<RedisRelay>,
    pub redis: Option<RedisClient>,
}

impl AppState {
    /// Wires every service from the configuration
    ///
    /// With a Redis client, realtime events travel through the Redis relay
    /// so sessions on other instances receive them too.
    pub fn new(db: PgPool, config: Config, redis: Option<RedisClient>) -> Self {
        let registry = SessionRegistry::new(config.realtime.session_buffer);
        let directory: Arc<dyn MembershipDirectory> = Arc::new(PgMembershipDirectory::new(db.clone()));

        let relay = redis.clone().map(|client| RedisRelay::new(client, registry.clone()));
        let transport: Arc<dyn RealtimeTransport> = match &relay {
            Some(relay) => Arc::new(relay.clone()),
            None => Arc::new(LocalTransport::new(registry.clone())),
        };
        let broadcaster = ChangeBroadcaster::new(directory.clone(), transport);

        let notifier = Notifier::new(db.clone(), mailer(&config), push_dispatcher(&config), broadcaster.clone());

        let invitations = InvitationService::new(
            db.clone(),
            notifier.clone(),
            broadcaster.clone(),
            InvitationSettings {
                app_base_url: config.invitations.app_base_url.clone(),
                ttl: Duration::days(config.invitations.ttl_days),
            },
        );

        Self {
            db,
            config: Arc::new(config),
            registry,
            directory,
            broadcaster,
            notifier,
            invitations,
            relay,
            redis,
        }
    }
}

fn mailer(config: &Config) -> Arc<dyn Mailer> {
    match (&config.mail.api_url, &config.mail.api_key) {
        (Some(url), Some(key)) => {
            info!(url = %url, "Sending mail through the mail API");
            Arc::new(HttpMailer::new(url.clone(), key.clone(), config.mail.from.clone()))
        }
        _ => {
            info!("Mail API not configured, emails will be logged");
            Arc::new(LogMailer)
        }
    }
}

fn push_dispatcher(config: &Config) -> Arc<dyn PushDispatcher> {
    match &config.push.gateway_url {
        Some(url) => Arc::new(HttpPushDispatcher::new(url.clone(), config.push.gateway_key.clone())),
        None => Arc::new(NoopPushDispatcher),
    }
}

/// Builds the router with all routes and middleware
///
/// ```text
/// /
/// ├── GET /health                          # public
/// └── /v1
///     ├── GET /realtime                    # WebSocket, auth in first frame
///     ├── POST /auth/session
///     ├── /houses                          # list, primary, create, detail, rename, leave
///     │   └── /:house_id
///     │       ├── /members                 # list, change role, remove
///     │       ├── /tasks                   # CRUD, complete, reorder
///     │       ├── /shopping                # CRUD, commit
///     │       ├── /devices                 # CRUD
///     │       └── /invitations             # list, create, revoke
///     ├── /invitations                     # mine, fetch, accept, decline
///     ├── /notifications                   # list, read, read-all, delete
///     └── /push-subscriptions              # register, unregister
/// ```
///
/// Everything under `/v1` except `/realtime` passes through the identity
/// token layer.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let house_routes = Router::new()
        .route("/", get(routes::houses::list_houses).post(routes::houses::create_house))
        .route("/primary", get(routes::houses::primary_house))
        .route(
            "/:house_id",
            get(routes::houses::get_house).patch(routes::houses::rename_house),
        )
        .route("/:house_id/leave", post(routes::houses::leave_house))
        .route("/:house_id/members", get(routes::members::list_members))
        .route(
            "/:house_id/members/:user_id",
            axum::routing::put(routes::members::update_member).delete(routes::members::remove_member),
        )
        .route(
            "/:house_id/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route("/:house_id/tasks/reorder", post(routes::tasks::reorder_tasks))
        .route(
            "/:house_id/tasks/:task_id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/:house_id/tasks/:task_id/complete", post(routes::tasks::complete_task))
        .route(
            "/:house_id/shopping",
            get(routes::shopping::list_items).post(routes::shopping::add_item),
        )
        .route("/:house_id/shopping/commit", post(routes::shopping::commit_list))
        .route(
            "/:house_id/shopping/:item_id",
            patch(routes::shopping::update_item).delete(routes::shopping::delete_item),
        )
        .route(
            "/:house_id/devices",
            get(routes::devices::list_devices).post(routes::devices::add_device),
        )
        .route(
            "/:house_id/devices/:device_id",
            patch(routes::devices::update_device).delete(routes::devices::delete_device),
        )
        .route(
            "/:house_id/invitations",
            get(routes::invitations::list_house_invitations).post(routes::invitations::create_invitation),
        )
        .route(
            "/:house_id/invitations/:invitation_id",
            delete(routes::invitations::revoke_invitation),
        );

    let invitation_routes = Router::new()
        .route("/", get(routes::invitations::list_my_invitations))
        .route("/:token", get(routes::invitations::get_invitation))
        .route("/:token/accept", post(routes::invitations::accept_invitation))
        .route("/:token/decline", post(routes::invitations::decline_invitation));

    let notification_routes = Router::new()
        .route("/", get(routes::notifications::list_notifications))
        .route("/read-all", post(routes::notifications::mark_all_read))
        .route("/:id", delete(routes::notifications::delete_notification))
        .route("/:id/read", post(routes::notifications::mark_read));

    let push_routes = Router::new().route(
        "/",
        post(routes::push_subscriptions::register).delete(routes::push_subscriptions::unregister),
    );

    let authenticated = Router::new()
        .route("/auth/session", post(routes::session::create_session))
        .nest("/houses", house_routes)
        .nest("/invitations", invitation_routes)
        .nest("/notifications", notification_routes)
        .nest("/push-subscriptions", push_routes)
        .layer(axum::middleware::from_fn_with_state(state.clone(), jwt_auth_layer));

    let v1_routes = Router::new()
        .route("/realtime", get(routes::realtime::realtime_socket))
        .merge(authenticated);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
