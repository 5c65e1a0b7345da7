//! `minca cart` - staged request items and request submission

use chrono::Local;
use clap::Subcommand;
use tabled::Tabled;

use crate::cli::output::{day, opt, print_table};
use crate::cli::App;
use crate::db::AuthContext;
use crate::error::AppResult;
use crate::messaging::send_request_summary;
use crate::models::{CartItem, RequestContext};
use crate::notify::report;
use crate::services::{CartWorkflow, PgCartRepository, SubmitRequest};
use crate::session::Route;

#[derive(Subcommand, Debug)]
pub enum CartCommands {
    /// Items staged at the selected location
    Show,
    /// Stage a part; staging it again changes nothing
    Add {
        id_repuesto: String,
        #[arg(long, default_value_t = 1)]
        cantidad: i32,
    },
    /// Remove staged items
    Remove {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Send the staged items as a transfer request
    Submit {
        /// Destination location id
        #[arg(long, short = 'd')]
        destino: Option<String>,
        #[arg(long, short = 'o', default_value = "")]
        observaciones: String,
        /// Skip the chat message to the destination
        #[arg(long)]
        no_message: bool,
    },
}

#[derive(Tabled)]
struct CartRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "REFERENCIA")]
    referencia: String,
    #[tabled(rename = "NOMBRE")]
    nombre: String,
    #[tabled(rename = "CANT.")]
    cantidad: i32,
    #[tabled(rename = "STOCK TALLER")]
    stock: i32,
    #[tabled(rename = "SOLICITANTE")]
    solicitante: String,
    #[tabled(rename = "FECHA")]
    fecha: String,
}

impl From<&CartItem> for CartRow {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.id_item_carrito.clone(),
            referencia: item.referencia.clone(),
            nombre: item.nombre_repuesto.clone(),
            cantidad: item.cantidad,
            stock: item.stock_actual_en_taller,
            solicitante: opt(&item.nombre_solicitante),
            fecha: day(&item.created_at),
        }
    }
}

struct CartScope {
    ctx: AuthContext,
    location: String,
    user_id: String,
}

async fn scope(app: &mut App) -> AppResult<CartScope> {
    app.require(Route::Solicitudes)?;
    let ctx = app.context().await?;
    Ok(CartScope {
        ctx,
        location: app.location()?,
        user_id: app.user_id()?,
    })
}

/// Workflow failures are shown by the workflow itself; only setup failures are reported here.
pub async fn run(app: &mut App, cmd: CartCommands) -> AppResult<()> {
    let scope = match scope(app).await {
        Ok(scope) => scope,
        Err(e) => {
            report(app.notifier.as_ref(), "Cart unavailable", &e);
            return Err(e);
        }
    };

    let repo = PgCartRepository::new(app.pool.clone(), scope.ctx.clone());
    let mut workflow = CartWorkflow::new(repo, app.notifier.clone(), app.queries.cache().clone());
    workflow.load(&scope.location).await?;

    match cmd {
        CartCommands::Show => {
            print_table(workflow.items().iter().map(CartRow::from).collect());
            println!("{} items en el carrito", workflow.items().len());
        }
        CartCommands::Add { id_repuesto, cantidad } => {
            let inserted = workflow
                .add(&scope.user_id, &scope.location, &id_repuesto, cantidad)
                .await?;
            if inserted {
                app.notifier.success("Repuesto agregado al carrito");
            } else {
                app.notifier.info("El repuesto ya está en el carrito");
            }
        }
        CartCommands::Remove { ids } => {
            if let [id] = ids.as_slice() {
                workflow.remove(id).await?;
            } else {
                match workflow.bulk_remove(&ids).await {
                    Ok(removed) => app
                        .notifier
                        .success(&format!("{} items eliminados del carrito", removed)),
                    Err(e) => {
                        report(app.notifier.as_ref(), "Bulk remove failed", &e);
                        return Err(e);
                    }
                }
            }
        }
        CartCommands::Submit {
            destino,
            observaciones,
            no_message,
        } => {
            let staged = workflow.items().to_vec();
            let id_solicitud = workflow
                .submit(SubmitRequest {
                    id_localizacion_origen: Some(scope.location.clone()),
                    id_localizacion_destino: destino.clone(),
                    id_usuario_solicitante: Some(scope.user_id.clone()),
                    observaciones_generales: observaciones,
                })
                .await?;
            println!("{}", id_solicitud);

            if let (false, Some(destino)) = (no_message, destino) {
                announce(app, &scope, &staged, &destino).await;
            }
        }
    }
    Ok(())
}

/// Hands the request summary to the chat application. Never fails the command.
async fn announce(app: &App, scope: &CartScope, items: &[CartItem], destino: &str) {
    let locations = match app.queries.locations(&scope.ctx).await {
        Ok(locations) => locations,
        Err(e) => {
            tracing::warn!("Could not load locations for the request message: {}", e);
            Vec::new()
        }
    };
    let name_of = |id: &str| {
        locations
            .iter()
            .find(|l| l.id_localizacion == id)
            .map(|l| l.nombre.clone())
            .unwrap_or_else(|| id.to_string())
    };
    let phone = locations
        .iter()
        .find(|l| l.id_localizacion == destino)
        .and_then(|l| l.telefono.clone())
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| app.config.warehouse_phone.clone());

    let context = RequestContext {
        origen: name_of(&scope.location),
        destino: name_of(destino),
        solicitante: app
            .session
            .user()
            .map(|u| u.nombre.clone().unwrap_or_else(|| u.email.clone()))
            .unwrap_or_default(),
    };

    match send_request_summary(&phone, items, &context, Local::now().date_naive()) {
        Ok(url) => app.notifier.info(&format!("Mensaje de la solicitud: {}", url)),
        Err(e) => {
            tracing::warn!("Request message not sent: {}", e);
            app.notifier
                .warning("No se pudo preparar el mensaje de la solicitud");
        }
    }
}
