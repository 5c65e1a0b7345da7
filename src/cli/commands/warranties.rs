//! `minca warranties` - warranty dashboard of the selected location

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Subcommand;
use tabled::Tabled;

use crate::cli::output::{day, opt, print_table};
use crate::cli::App;
use crate::error::{AppError, AppResult};
use crate::models::{Warranty, WarrantyDetails, WarrantyFilter, WarrantyStatus};
use crate::session::{Route, EDIT_REGISTER};

#[derive(Subcommand, Debug)]
pub enum WarrantyCommands {
    /// Reported warranties, newest first
    List(ListArgs),
    /// Change the status of a warranty
    Status { id: String, status: WarrantyStatus },
    /// Edit the details of a warranty
    Update(UpdateArgs),
    /// Upload an evidence photo and print its URL
    Upload { file: PathBuf },
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Part name, part reference or origin workshop
    #[arg(long, short = 's', default_value = "")]
    pub search: String,
    #[arg(long)]
    pub estado: Option<WarrantyStatus>,
    /// `YYYY-MM-DD`, inclusive
    #[arg(long)]
    pub desde: Option<NaiveDate>,
    /// `YYYY-MM-DD`, inclusive
    #[arg(long)]
    pub hasta: Option<NaiveDate>,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    pub id: String,
    #[arg(long)]
    pub estado: Option<WarrantyStatus>,
    #[arg(long)]
    pub comentarios: Option<String>,
    /// Mileage, digits are kept ("12.500 km" is stored as 12500)
    #[arg(long)]
    pub kilometraje: Option<String>,
    #[arg(long)]
    pub motivo_falla: Option<String>,
    #[arg(long)]
    pub solicitante: Option<String>,
    /// Photo uploaded as the new evidence
    #[arg(long)]
    pub evidencia: Option<PathBuf>,
}

#[derive(Tabled)]
struct WarrantyRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "FECHA")]
    fecha: String,
    #[tabled(rename = "REFERENCIA")]
    referencia: String,
    #[tabled(rename = "REPUESTO")]
    repuesto: String,
    #[tabled(rename = "TALLER")]
    taller: String,
    #[tabled(rename = "ORDEN")]
    orden: String,
    #[tabled(rename = "ESTADO")]
    estado: &'static str,
}

impl From<&Warranty> for WarrantyRow {
    fn from(w: &Warranty) -> Self {
        Self {
            id: w.id_garantia.clone(),
            fecha: day(&w.fecha_reporte),
            referencia: opt(&w.referencia_repuesto),
            repuesto: opt(&w.nombre_repuesto),
            taller: opt(&w.taller_origen),
            orden: opt(&w.orden),
            estado: w.status().label(),
        }
    }
}

pub async fn run(app: &mut App, cmd: WarrantyCommands) -> AppResult<()> {
    app.require(Route::Registros)?;
    let ctx = app.context().await?;

    match cmd {
        WarrantyCommands::List(args) => {
            let location = app.location()?;
            let warranties = app.queries.warranties(&ctx, &location).await?;
            let filter = WarrantyFilter {
                search: args.search,
                status: args.estado,
                start_date: args.desde,
                end_date: args.hasta,
            };
            let shown = filter.apply(&warranties);
            print_table(shown.iter().map(|w| WarrantyRow::from(*w)).collect());
            println!("{} de {} garantías", shown.len(), warranties.len());
        }
        WarrantyCommands::Status { id, status } => {
            app.require_permission(Route::Registros.key(), EDIT_REGISTER)?;
            app.queries.update_warranty_status(&ctx, &id, status).await?;
            app.notifier
                .success(&format!("Garantía marcada como {}", status.label()));
        }
        WarrantyCommands::Update(args) => {
            app.require_permission(Route::Registros.key(), EDIT_REGISTER)?;
            let location = app.location()?;
            let current = app
                .queries
                .warranties(&ctx, &location)
                .await?
                .into_iter()
                .find(|w| w.id_garantia == args.id)
                .ok_or_else(|| AppError::NotFound(format!("Garantía {}", args.id)))?;

            let evidence_url = match &args.evidencia {
                Some(path) => Some(app.queries.warranties.upload_evidence(path).await?),
                None => None,
            };
            let id = args.id.clone();
            let details = merge_details(&current, args, evidence_url);
            app.queries.update_warranty_details(&ctx, &id, &details).await?;
            app.notifier.success("Garantía actualizada");
        }
        WarrantyCommands::Upload { file } => {
            app.require_permission(Route::Registros.key(), EDIT_REGISTER)?;
            let url = app.queries.warranties.upload_evidence(&file).await?;
            println!("{}", url);
        }
    }
    Ok(())
}

/// Fields not given on the command line keep their stored value.
fn merge_details(current: &Warranty, args: UpdateArgs, evidence_url: Option<String>) -> WarrantyDetails {
    WarrantyDetails {
        estado: args.estado.unwrap_or_else(|| current.status()),
        comentarios_resolucion: args
            .comentarios
            .or_else(|| current.comentarios_resolucion.clone()),
        kilometraje: args.kilometraje.or_else(|| current.kilometraje.clone()),
        motivo_falla: args.motivo_falla.or_else(|| current.motivo_falla.clone()),
        solicitante: args.solicitante.or_else(|| current.solicitante.clone()),
        url_evidencia_foto: evidence_url.or_else(|| current.url_evidencia_foto.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> Warranty {
        Warranty {
            id_garantia: "g-1".to_string(),
            fecha_reporte: Some("2024-05-02T10:00:00Z".to_string()),
            nombre_repuesto: Some("Pastilla de freno".to_string()),
            referencia_repuesto: Some("PF-100".to_string()),
            taller_origen: Some("Taller Norte".to_string()),
            estado: Some("pendiente".to_string()),
            solicitante: Some("Ana".to_string()),
            orden: None,
            reportado_por: None,
            tecnico_responsable: None,
            motivo_falla: Some("Desgaste".to_string()),
            kilometraje: Some("12000".to_string()),
            url_evidencia_foto: None,
            comentarios_resolucion: None,
        }
    }

    #[test]
    fn test_merge_details_keeps_stored_values() {
        let args = UpdateArgs {
            id: "g-1".to_string(),
            estado: Some(WarrantyStatus::Aprobado),
            comentarios: Some("Cambio aprobado".to_string()),
            kilometraje: None,
            motivo_falla: None,
            solicitante: None,
            evidencia: None,
        };
        let details = merge_details(&stored(), args, Some("https://cdn/x.jpg".to_string()));
        assert_eq!(details.estado, WarrantyStatus::Aprobado);
        assert_eq!(details.comentarios_resolucion.as_deref(), Some("Cambio aprobado"));
        assert_eq!(details.kilometraje.as_deref(), Some("12000"));
        assert_eq!(details.solicitante.as_deref(), Some("Ana"));
        assert_eq!(details.url_evidencia_foto.as_deref(), Some("https://cdn/x.jpg"));
    }
}
