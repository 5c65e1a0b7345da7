//! Command-line front end: argument parsing and the per-run application context.

pub mod commands;
pub mod output;

use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::PgPool;

use crate::config::Config;
use crate::db::{create_pool, AuthContext};
use crate::error::{AppError, AppResult};
use crate::http_client::HttpClient;
use crate::notify::{report, Notifier, TerminalNotifier};
use crate::queries::{EntityQueries, QueryCache};
use crate::services::{
    AuthService, CountService, InventoryService, MovementsService, NotificationsService,
    OrdersService, RequestsService, SparesService, WarrantiesService,
};
use crate::session::{Route, SessionStore};
use crate::storage::SupabaseStorage;

use commands::{
    auth::{LocationArgs, LoginArgs, PasswordCommands},
    cart::CartCommands,
    count::CountCommands,
    inventory::InventoryCommands,
    movements::MovementCommands,
    notifications::NotificationCommands,
    orders::OrderCommands,
    requests::RequestCommands,
    spares::SpareCommands,
    warranties::WarrantyCommands,
};

#[derive(Parser, Debug)]
#[command(name = "minca", version, about = "Minca spare-parts inventory")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in with email and password, or with Google
    Login(LoginArgs),
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user, role and location
    Whoami,
    /// List assigned locations or select one
    Location(LocationArgs),
    /// Password recovery and change
    #[command(subcommand)]
    Password(PasswordCommands),
    /// Spare-part catalogue
    #[command(subcommand)]
    Spares(SpareCommands),
    /// Stock of the selected location
    #[command(subcommand)]
    Inventory(InventoryCommands),
    /// Staged request items
    #[command(subcommand)]
    Cart(CartCommands),
    /// Transfer request history
    #[command(subcommand)]
    Requests(RequestCommands),
    /// Technical movements
    #[command(subcommand)]
    Movements(MovementCommands),
    /// Warranty dashboard
    #[command(subcommand)]
    Warranties(WarrantyCommands),
    /// Stock counts against spreadsheets
    #[command(subcommand)]
    Count(CountCommands),
    /// Notifications for the user and location
    #[command(subcommand)]
    Notifications(NotificationCommands),
    /// Follow-up of scooter service orders
    #[command(subcommand)]
    Orders(OrderCommands),
}

/// Everything a command needs for one run.
pub struct App {
    pub config: Config,
    pub pool: PgPool,
    pub http: HttpClient,
    pub session: SessionStore,
    pub auth: AuthService,
    pub queries: EntityQueries,
    pub notifier: Arc<dyn Notifier>,
}

impl App {
    pub async fn connect(config: Config) -> AppResult<Self> {
        let pool = create_pool(&config.database_url, config.db_max_connections).await?;
        tracing::debug!("Database pool ready: max_connections={}", config.db_max_connections);

        let http = HttpClient::new(&config.supabase_anon_key)?;
        let session = SessionStore::open(&config.state_dir)?;
        let auth = AuthService::new(&config, http.clone(), pool.clone());

        let mut storage = SupabaseStorage::new(http.clone(), config.storage_url(), &config.evidence_bucket);
        if let Some(token) = session.token() {
            storage = storage.with_access_token(&token.access_token);
        }

        let queries = EntityQueries::new(
            Arc::new(QueryCache::new(config.query_stale_after)),
            SparesService::new(pool.clone()),
            InventoryService::new(pool.clone()),
            MovementsService::new(pool.clone()),
            WarrantiesService::new(pool.clone(), Arc::new(storage)),
            CountService::new(pool.clone()),
            NotificationsService::new(pool.clone()),
            RequestsService::new(pool.clone()),
            OrdersService::new(pool.clone()),
        );

        Ok(Self {
            config,
            pool,
            http,
            session,
            auth,
            queries,
            notifier: Arc::new(TerminalNotifier),
        })
    }

    /// Database identity of the stored session, refreshing the token when it is about to expire.
    pub async fn context(&mut self) -> AppResult<AuthContext> {
        if !self.session.is_authenticated() {
            return Err(not_signed_in());
        }
        let token = self.session.token().cloned().ok_or_else(not_signed_in)?;

        let token = if token.needs_refresh(Utc::now().timestamp()) {
            tracing::debug!("Refreshing access token for user {}", token.user.id);
            let refreshed = self.auth.refresh(&token.refresh_token).await?;
            self.session.set_token(refreshed.clone())?;
            refreshed
        } else {
            token
        };
        self.auth.context(&token)
    }

    pub fn user_id(&self) -> AppResult<String> {
        self.session
            .user()
            .map(|u| u.id.clone())
            .ok_or_else(not_signed_in)
    }

    /// Selected location id; most screens need one.
    pub fn location(&self) -> AppResult<String> {
        self.session.location_id().ok_or_else(|| {
            AppError::InvalidInput(
                "No hay una ubicación seleccionada. Usa `minca location <id>`.".to_string(),
            )
        })
    }

    /// Fails unless the role may open `route`.
    pub fn require(&self, route: Route) -> AppResult<()> {
        if self.session.can_view_route(route) {
            return Ok(());
        }
        Err(AppError::Auth {
            code: Some("forbidden".to_string()),
            message: format!("No tienes permiso para ver {}", route.key()),
        })
    }

    /// Fails unless the role holds `permission` on `menu`.
    pub fn require_permission(&self, menu: &str, permission: &str) -> AppResult<()> {
        if self.session.check_menu_permission(menu, permission) {
            return Ok(());
        }
        Err(AppError::Auth {
            code: Some("forbidden".to_string()),
            message: format!("No tienes permiso para {} en {}", permission, menu),
        })
    }
}

fn not_signed_in() -> AppError {
    AppError::Auth {
        code: Some("session_not_found".to_string()),
        message: "No hay una sesión activa. Usa `minca login`.".to_string(),
    }
}

/// Runs one command. Every failure is shown through the notifier before it is returned.
pub async fn run(cli: Cli, config: Config) -> AppResult<()> {
    let notifier: Arc<dyn Notifier> = Arc::new(TerminalNotifier);
    let mut app = match App::connect(config).await {
        Ok(app) => app,
        Err(e) => {
            report(notifier.as_ref(), "Startup failed", &e);
            return Err(e);
        }
    };

    // The cart workflow and order creation report their own failures.
    let self_reporting = matches!(
        cli.command,
        Commands::Cart(_) | Commands::Orders(OrderCommands::Create(_))
    );
    let result = dispatch(&mut app, cli.command).await;
    if let Err(e) = &result {
        if !self_reporting {
            report(notifier.as_ref(), "Command failed", e);
        }
    }
    result
}

async fn dispatch(app: &mut App, command: Commands) -> AppResult<()> {
    match command {
        Commands::Login(args) => commands::auth::login(app, args).await,
        Commands::Logout => commands::auth::logout(app).await,
        Commands::Whoami => commands::auth::whoami(app),
        Commands::Location(args) => commands::auth::location(app, args),
        Commands::Password(cmd) => commands::auth::password(app, cmd).await,
        Commands::Spares(cmd) => commands::spares::run(app, cmd).await,
        Commands::Inventory(cmd) => commands::inventory::run(app, cmd).await,
        Commands::Cart(cmd) => commands::cart::run(app, cmd).await,
        Commands::Requests(cmd) => commands::requests::run(app, cmd).await,
        Commands::Movements(cmd) => commands::movements::run(app, cmd).await,
        Commands::Warranties(cmd) => commands::warranties::run(app, cmd).await,
        Commands::Count(cmd) => commands::count::run(app, cmd).await,
        Commands::Notifications(cmd) => commands::notifications::run(app, cmd).await,
        Commands::Orders(cmd) => commands::orders::run(app, cmd).await,
    }
}
