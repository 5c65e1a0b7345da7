use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const REQUEST_STATUS_PENDING: &str = "pendiente";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLine {
    pub id_repuesto: String,
    pub cantidad: i32,
}

/// Header plus lines of a transfer request about to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDraft {
    pub id_localizacion_origen: String,
    pub id_localizacion_destino: String,
    pub id_usuario_solicitante: String,
    pub observaciones_generales: String,
    pub items: Vec<RequestLine>,
}

/// Row of `v_historial_solicitudes`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RequestHistoryItem {
    pub id_solicitud: String,
    pub fecha_creacion: Option<String>,
    pub estado: Option<String>,
    pub observaciones_generales: Option<String>,
    pub id_localizacion_destino: Option<String>,
    pub nombre_destino: Option<String>,
    pub id_localizacion_origen: Option<String>,
    pub nombre_origen: Option<String>,
    pub id_usuario_solicitante: Option<String>,
    pub nombre_solicitante: Option<String>,
}

pub(crate) const REQUEST_HISTORY_COLUMNS: &str = "id_solicitud::text, fecha_creacion::text, estado, \
     observaciones_generales, id_localizacion_destino::text, nombre_destino, \
     id_localizacion_origen::text, nombre_origen, id_usuario_solicitante::text, nombre_solicitante";

/// Names shown in the outgoing request message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub origen: String,
    pub destino: String,
    pub solicitante: String,
}
