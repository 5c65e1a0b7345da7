//! `minca movements` - technical movements

use chrono::Utc;
use clap::Subcommand;
use tabled::Tabled;

use crate::cli::output::{day, opt, print_page, print_table, yes_no};
use crate::cli::App;
use crate::error::AppResult;
use crate::models::{
    DownloadedFilter, MovementConcept, MovementFilters, MovementType, NewTechnicalMovement,
    PageRequest, TechnicalMovement,
};
use crate::session::{Route, EDIT_REGISTER};

#[derive(Subcommand, Debug)]
pub enum MovementCommands {
    /// Movements of the selected location, newest first
    List(ListArgs),
    /// Record a movement through the stock procedure
    Register(RegisterArgs),
    /// Mark a movement as downloaded
    Download { id: String },
    /// Technicians assigned to the selected location
    Technicians,
    /// Warranty exits of the selected location
    Warranty {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, short = 'n', default_value_t = 10)]
        limit: u32,
    },
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    #[arg(long, short = 'n', default_value_t = 10)]
    pub limit: u32,
    /// Assigned technician id
    #[arg(long)]
    pub tecnico: Option<String>,
    /// `YYYY-MM-DD`, inclusive
    #[arg(long)]
    pub desde: Option<String>,
    /// `YYYY-MM-DD`, inclusive
    #[arg(long)]
    pub hasta: Option<String>,
    #[arg(long)]
    pub orden: Option<String>,
    #[arg(long)]
    pub concepto: Option<MovementConcept>,
    /// `all`, `true` or `false`
    #[arg(long, default_value = "all")]
    pub descargada: DownloadedFilter,
}

#[derive(clap::Args, Debug)]
pub struct RegisterArgs {
    pub id_repuesto: String,
    #[arg(long)]
    pub concepto: MovementConcept,
    #[arg(long)]
    pub tipo: MovementType,
    #[arg(long)]
    pub cantidad: i32,
    /// Responsible user, the signed-in user when omitted
    #[arg(long)]
    pub responsable: Option<String>,
    #[arg(long)]
    pub orden: Option<String>,
    #[arg(long)]
    pub descargada: bool,
}

#[derive(Tabled)]
struct MovementRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "FECHA")]
    fecha: String,
    #[tabled(rename = "REFERENCIA")]
    referencia: String,
    #[tabled(rename = "CONCEPTO")]
    concepto: String,
    #[tabled(rename = "TIPO")]
    tipo: String,
    #[tabled(rename = "CANT.")]
    cantidad: i32,
    #[tabled(rename = "ORDEN")]
    orden: String,
    #[tabled(rename = "TÉCNICO")]
    tecnico: String,
    #[tabled(rename = "DESCARGADA")]
    descargada: String,
}

impl MovementRow {
    fn new(m: &TechnicalMovement, now: chrono::DateTime<Utc>) -> Self {
        let descargada = if m.is_overdue(now) {
            "no (vencida)".to_string()
        } else {
            yes_no(m.descargada).to_string()
        };
        Self {
            id: m.id_movimientos_tecnicos.clone(),
            fecha: day(&m.fecha),
            referencia: opt(&m.referencia),
            concepto: opt(&m.concepto),
            tipo: opt(&m.tipo),
            cantidad: m.cantidad,
            orden: opt(&m.numero_orden),
            tecnico: opt(&m.nombre_tecnico),
            descargada,
        }
    }
}

#[derive(Tabled)]
struct TechnicianRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NOMBRE")]
    nombre: String,
}

#[derive(Tabled)]
struct WarrantyExitRow {
    #[tabled(rename = "FECHA")]
    fecha: String,
    #[tabled(rename = "REFERENCIA")]
    referencia: String,
    #[tabled(rename = "ORDEN")]
    orden: String,
    #[tabled(rename = "TÉCNICO")]
    tecnico: String,
    #[tabled(rename = "CANT.")]
    cantidad: i32,
}

pub async fn run(app: &mut App, cmd: MovementCommands) -> AppResult<()> {
    app.require(Route::Registros)?;
    let ctx = app.context().await?;

    match cmd {
        MovementCommands::List(args) => {
            let filters = MovementFilters {
                page: PageRequest::new(args.page, args.limit),
                location_id: app.session.location_id(),
                technician_id: args.tecnico,
                start_date: args.desde,
                end_date: args.hasta,
                order_number: args.orden,
                concept: args.concepto,
                downloaded: args.descargada,
            };
            let page = app.queries.movements(&ctx, &filters).await?;
            let now = Utc::now();
            print_page(&page, |m| MovementRow::new(m, now));
        }
        MovementCommands::Register(args) => {
            let movement = NewTechnicalMovement {
                id_localizacion: app.location()?,
                id_repuesto: args.id_repuesto,
                id_usuario_responsable: match args.responsable {
                    Some(user) => user,
                    None => app.user_id()?,
                },
                concepto: args.concepto,
                tipo: args.tipo,
                cantidad: args.cantidad,
                numero_orden: args.orden,
                descargada: args.descargada,
            };
            let outcome = app.queries.register_movement(&ctx, &movement).await?;
            app.notifier.success(
                outcome
                    .message
                    .as_deref()
                    .unwrap_or("Movimiento registrado exitosamente"),
            );
        }
        MovementCommands::Download { id } => {
            app.require_permission(Route::Registros.key(), EDIT_REGISTER)?;
            app.queries.mark_movement_downloaded(&ctx, &id).await?;
            app.notifier.success("Movimiento marcado como descargado");
        }
        MovementCommands::Technicians => {
            let location = app.location()?;
            let technicians = app.queries.technicians(&ctx, &location).await?;
            print_table(
                technicians
                    .iter()
                    .map(|t| TechnicianRow {
                        id: t.id_usuario.clone(),
                        nombre: opt(&t.nombre_usuario),
                    })
                    .collect(),
            );
        }
        MovementCommands::Warranty { page, limit } => {
            let location = app.location()?;
            let page = app
                .queries
                .movements
                .warranty_movements(&ctx, &location, PageRequest::new(page, limit))
                .await?;
            print_page(&page, |w| WarrantyExitRow {
                fecha: day(&w.fecha_movimiento),
                referencia: opt(&w.referencia),
                orden: opt(&w.orden),
                tecnico: opt(&w.tecnico),
                cantidad: w.cantidad,
            });
        }
    }
    Ok(())
}

