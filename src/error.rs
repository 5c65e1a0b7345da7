use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Auth error: {message}")]
    Auth {
        code: Option<String>,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// Coarse error category used when reporting a failure to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    Database,
    Network,
    Validation,
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Auth => "AUTH",
            ErrorKind::Database => "DATABASE",
            ErrorKind::Network => "NETWORK",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

const AUTH_MESSAGES: &[(&str, &str)] = &[
    ("invalid_credentials", "Credenciales inválidas. Verifica tu email y contraseña."),
    ("email_not_confirmed", "Por favor confirma tu email antes de iniciar sesión."),
    ("user_not_found", "Usuario no encontrado."),
    ("invalid_grant", "Credenciales inválidas."),
    ("weak_password", "La contraseña es muy débil. Debe tener al menos 6 caracteres."),
    ("email_exists", "Este email ya está registrado."),
    ("session_not_found", "Sesión expirada. Por favor inicia sesión nuevamente."),
    ("refresh_token_not_found", "Sesión expirada. Por favor inicia sesión nuevamente."),
    ("oauth_provider_disabled", "El proveedor de Google no está habilitado. Contacta al administrador."),
    ("oauth_not_allowed", "El login con Google no está permitido."),
    ("request_timeout", "La conexión con Google ha expirado. Intenta nuevamente."),
];

const DATABASE_MESSAGES: &[(&str, &str)] = &[
    ("23505", "Este registro ya existe."),
    ("23503", "No se puede eliminar este registro porque está siendo usado."),
    ("23502", "Faltan campos requeridos."),
    ("42501", "No tienes permisos para realizar esta acción."),
    ("PGRST116", "No se encontró el registro."),
];

const NETWORK_MESSAGE: &str = "Error de conexión. Verifica tu conexión a internet.";
const UNKNOWN_MESSAGE: &str = "Ha ocurrido un error inesperado";

/// SQLSTATE-like code used for "no row returned where one was expected".
pub const NO_ROWS_CODE: &str = "PGRST116";

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Localized message for an auth error code (or raw message used as a code).
pub fn auth_message(code: Option<&str>, message: &str) -> String {
    code.and_then(|c| lookup(AUTH_MESSAGES, c))
        .or_else(|| lookup(AUTH_MESSAGES, message))
        .map(str::to_string)
        .unwrap_or_else(|| {
            if message.is_empty() {
                "Error de autenticación".to_string()
            } else {
                message.to_string()
            }
        })
}

/// Localized message for a database error code.
pub fn database_message(code: &str) -> Option<&'static str> {
    lookup(DATABASE_MESSAGES, code)
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Auth { .. } => ErrorKind::Auth,
            AppError::Database(e) => match e {
                sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed => ErrorKind::Network,
                _ => ErrorKind::Database,
            },
            AppError::NotFound(_) => ErrorKind::Database,
            AppError::Http(e) => {
                if e.is_connect() || e.is_timeout() || e.is_request() {
                    ErrorKind::Network
                } else {
                    ErrorKind::Unknown
                }
            }
            AppError::InvalidInput(_) | AppError::Import(_) => ErrorKind::Validation,
            AppError::Api { .. }
            | AppError::Storage(_)
            | AppError::Config(_)
            | AppError::Io(_)
            | AppError::Json(_)
            | AppError::Internal(_) => ErrorKind::Unknown,
        }
    }

    /// Backend error code, when the failure carries one.
    pub fn code(&self) -> Option<String> {
        match self {
            AppError::Auth { code, .. } | AppError::Api { code, .. } => code.clone(),
            AppError::Database(sqlx::Error::Database(db)) => db.code().map(|c| c.into_owned()),
            AppError::Database(sqlx::Error::RowNotFound) | AppError::NotFound(_) => {
                Some(NO_ROWS_CODE.to_string())
            }
            _ => None,
        }
    }

    /// Text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        if self.kind() == ErrorKind::Network {
            return NETWORK_MESSAGE.to_string();
        }
        match self {
            AppError::Auth { code, message } => auth_message(code.as_deref(), message),
            AppError::Database(e) => self
                .code()
                .and_then(|c| database_message(&c))
                .map(str::to_string)
                .unwrap_or_else(|| match e {
                    sqlx::Error::Database(db) => db.message().to_string(),
                    _ => "Error en la base de datos".to_string(),
                }),
            AppError::NotFound(_) => database_message(NO_ROWS_CODE)
                .unwrap_or(UNKNOWN_MESSAGE)
                .to_string(),
            AppError::InvalidInput(msg) | AppError::Import(msg) | AppError::Storage(msg) => {
                msg.clone()
            }
            AppError::Api { message, .. } if !message.is_empty() => message.clone(),
            AppError::Internal(msg) if !msg.is_empty() => msg.clone(),
            _ => UNKNOWN_MESSAGE.to_string(),
        }
    }
}

impl From<calamine::Error> for AppError {
    fn from(err: calamine::Error) -> Self {
        AppError::Import(format!("No se pudo leer el archivo: {}", err))
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Import(format!("No se pudo leer el archivo: {}", err))
    }
}
