//! `minca notifications`

use clap::Subcommand;
use tabled::Tabled;

use crate::cli::output::{day, opt, print_table};
use crate::cli::App;
use crate::error::AppResult;
use crate::models::{unread_count, Notification, TECHNICIAN_ROLE};

#[derive(Subcommand, Debug)]
pub enum NotificationCommands {
    /// Latest notifications, newest first
    List {
        /// Only unread notifications
        #[arg(long)]
        unread: bool,
    },
    /// Mark a notification as read
    Read { id: String },
}

#[derive(Tabled)]
struct NotificationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "")]
    leida: &'static str,
    #[tabled(rename = "FECHA")]
    fecha: String,
    #[tabled(rename = "PRIORIDAD")]
    prioridad: String,
    #[tabled(rename = "TÍTULO")]
    titulo: String,
    #[tabled(rename = "MENSAJE")]
    mensaje: String,
}

impl From<&Notification> for NotificationRow {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id_notificacion.clone(),
            leida: if n.leida { " " } else { "●" },
            fecha: day(&n.fecha_creacion),
            prioridad: opt(&n.prioridad),
            titulo: n.titulo.clone(),
            mensaje: opt(&n.mensaje),
        }
    }
}

pub async fn run(app: &mut App, cmd: NotificationCommands) -> AppResult<()> {
    let ctx = app.context().await?;

    match cmd {
        NotificationCommands::List { unread } => {
            let user_id = app.user_id()?;
            let location = app.session.location_id();
            let is_technician = app.session.has_role(TECHNICIAN_ROLE);
            let notifications = app
                .queries
                .notifications(&ctx, &user_id, location.as_deref(), is_technician)
                .await?;

            print_table(
                notifications
                    .iter()
                    .filter(|n| !unread || !n.leida)
                    .map(NotificationRow::from)
                    .collect(),
            );
            println!("{} sin leer", unread_count(&notifications));
        }
        NotificationCommands::Read { id } => {
            app.queries.mark_notification_read(&ctx, &id).await?;
            app.notifier.success("Notificación marcada como leída");
        }
    }
    Ok(())
}
