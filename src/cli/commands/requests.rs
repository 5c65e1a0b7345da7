//! `minca requests` - transfer request history

use clap::Subcommand;
use tabled::Tabled;

use crate::cli::output::{day, opt, print_table};
use crate::cli::App;
use crate::error::AppResult;
use crate::models::RequestHistoryItem;
use crate::session::Route;

#[derive(Subcommand, Debug)]
pub enum RequestCommands {
    /// Requests visible to the user, newest first
    History,
    /// Locations a request can be sent to
    Locations,
}

#[derive(Tabled)]
struct RequestRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "FECHA")]
    fecha: String,
    #[tabled(rename = "ESTADO")]
    estado: String,
    #[tabled(rename = "ORIGEN")]
    origen: String,
    #[tabled(rename = "DESTINO")]
    destino: String,
    #[tabled(rename = "SOLICITANTE")]
    solicitante: String,
    #[tabled(rename = "OBSERVACIONES")]
    observaciones: String,
}

impl From<&RequestHistoryItem> for RequestRow {
    fn from(r: &RequestHistoryItem) -> Self {
        Self {
            id: r.id_solicitud.clone(),
            fecha: day(&r.fecha_creacion),
            estado: opt(&r.estado),
            origen: opt(&r.nombre_origen),
            destino: opt(&r.nombre_destino),
            solicitante: opt(&r.nombre_solicitante),
            observaciones: opt(&r.observaciones_generales),
        }
    }
}

#[derive(Tabled)]
struct LocationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NOMBRE")]
    nombre: String,
    #[tabled(rename = "TELÉFONO")]
    telefono: String,
}

pub async fn run(app: &mut App, cmd: RequestCommands) -> AppResult<()> {
    app.require(Route::Solicitudes)?;
    let ctx = app.context().await?;

    match cmd {
        RequestCommands::History => {
            let history = app.queries.request_history(&ctx).await?;
            print_table(history.iter().map(RequestRow::from).collect());
        }
        RequestCommands::Locations => {
            let locations = app.queries.locations(&ctx).await?;
            print_table(
                locations
                    .iter()
                    .map(|l| LocationRow {
                        id: l.id_localizacion.clone(),
                        nombre: l.nombre.clone(),
                        telefono: opt(&l.telefono),
                    })
                    .collect(),
            );
        }
    }
    Ok(())
}
