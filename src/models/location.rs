use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row of `localizacion`. The phone is the messaging target for requests.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Location {
    pub id_localizacion: String,
    pub nombre: String,
    pub telefono: Option<String>,
}

/// A location the user is assigned to (`usuarios_localizacion`).
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct UserLocation {
    pub id_localizacion: String,
    pub nombre: String,
}

impl From<Location> for UserLocation {
    fn from(location: Location) -> Self {
        Self {
            id_localizacion: location.id_localizacion,
            nombre: location.nombre,
        }
    }
}

pub const TECHNICIAN_ROLE: &str = "tecnico";

/// Row of `v_tecnicos_por_localizacion`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Technician {
    pub id_usuario: String,
    pub nombre_usuario: Option<String>,
}
