use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const NOTIFICATION_LIMIT: i64 = 50;

/// Row of `notificaciones`; addressed to a user, a location or both.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id_notificacion: String,
    pub id_usuario: Option<String>,
    pub id_localizacion: Option<String>,
    pub titulo: String,
    pub mensaje: Option<String>,
    pub tipo: Option<String>,
    pub prioridad: Option<String>,
    pub leida: bool,
    pub fecha_creacion: Option<String>,
    pub data: Option<String>,
}

pub(crate) const NOTIFICATION_COLUMNS: &str = "id_notificacion::text, id_usuario::text, \
     id_localizacion::text, titulo, mensaje, tipo, prioridad, COALESCE(leida, false) AS leida, \
     fecha_creacion::text, data::text";

pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.leida).count()
}
