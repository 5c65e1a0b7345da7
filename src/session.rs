use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{Role, SessionData, UserData, UserLocation};
use crate::services::auth_service::AuthSession;

pub const USER_STORAGE_FILE: &str = "user-storage.json";
pub const LOCATION_FILE: &str = "minca_location_id";
pub const AUTH_TOKEN_FILE: &str = "auth-token.json";

/// Menu permission that unlocks edits on the records screens.
pub const EDIT_REGISTER: &str = "edit_register";

/// Screens guarded by `permissions.menu[<key>].show_view`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Inventario,
    Repuestos,
    Registros,
    Ordenes,
    Solicitudes,
}

impl Route {
    pub fn key(&self) -> &'static str {
        match self {
            Route::Inventario => "inventario",
            Route::Repuestos => "repuestos",
            Route::Registros => "registros",
            Route::Ordenes => "ordenes",
            Route::Solicitudes => "solicitudes",
        }
    }
}

/// What is persisted in `user-storage.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserState {
    pub session_data: Option<SessionData>,
    pub current_location: Option<UserLocation>,
    #[serde(default)]
    pub is_authenticated: bool,
}

/// Logged-in user, role and selected location, kept on disk between runs.
///
/// Every write replaces the whole file. Two processes sharing a state
/// directory race and the last writer wins.
#[derive(Debug)]
pub struct SessionStore {
    dir: PathBuf,
    state: UserState,
    token: Option<AuthSession>,
}

impl SessionStore {
    pub fn open(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let state = read_json(&dir.join(USER_STORAGE_FILE)).unwrap_or_default();
        let token = read_json(&dir.join(AUTH_TOKEN_FILE));
        Ok(Self { dir, state, token })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stores a fresh sign-in. The previous location is kept when the user
    /// still has it, otherwise the first assigned location is selected.
    pub fn set_session(&mut self, data: SessionData, token: AuthSession) -> AppResult<()> {
        let keep_location = self
            .state
            .current_location
            .as_ref()
            .filter(|current| {
                data.locations
                    .iter()
                    .any(|l| l.id_localizacion == current.id_localizacion)
            })
            .cloned();
        let location = keep_location.or_else(|| data.locations.first().cloned());

        self.state = UserState {
            session_data: Some(data),
            current_location: None,
            is_authenticated: true,
        };
        self.token = Some(token);
        write_json(&self.dir.join(AUTH_TOKEN_FILE), &self.token)?;

        match location {
            Some(location) => self.store_location(location),
            None => self.save(),
        }
    }

    /// Replaces the stored token pair after a refresh.
    pub fn set_token(&mut self, token: AuthSession) -> AppResult<()> {
        self.token = Some(token);
        write_json(&self.dir.join(AUTH_TOKEN_FILE), &self.token)
    }

    /// Selects one of the user's assigned locations by id or name.
    pub fn set_location(&mut self, id_or_name: &str) -> AppResult<UserLocation> {
        let wanted = id_or_name.trim();
        let location = self
            .locations()
            .iter()
            .find(|l| l.id_localizacion == wanted || l.nombre.eq_ignore_ascii_case(wanted))
            .cloned()
            .ok_or_else(|| {
                AppError::InvalidInput(format!("No tienes asignada la ubicación {}", wanted))
            })?;
        self.store_location(location.clone())?;
        Ok(location)
    }

    fn store_location(&mut self, location: UserLocation) -> AppResult<()> {
        fs::write(self.dir.join(LOCATION_FILE), &location.id_localizacion)?;
        tracing::debug!("Selected location {} ({})", location.nombre, location.id_localizacion);
        self.state.current_location = Some(location);
        self.save()
    }

    /// Logout: drops the session, the selected location and the token.
    pub fn clear(&mut self) -> AppResult<()> {
        self.state = UserState::default();
        self.token = None;
        for file in [LOCATION_FILE, AUTH_TOKEN_FILE] {
            match fs::remove_file(self.dir.join(file)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.save()
    }

    fn save(&self) -> AppResult<()> {
        write_json(&self.dir.join(USER_STORAGE_FILE), &self.state)
    }

    pub fn state(&self) -> &UserState {
        &self.state
    }

    pub fn token(&self) -> Option<&AuthSession> {
        self.token.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated && self.state.session_data.is_some()
    }

    pub fn user(&self) -> Option<&UserData> {
        self.state.session_data.as_ref().map(|d| &d.user)
    }

    pub fn role(&self) -> Option<&Role> {
        self.user().and_then(|u| u.role.as_ref())
    }

    pub fn locations(&self) -> &[UserLocation] {
        self.state
            .session_data
            .as_ref()
            .map(|d| d.locations.as_slice())
            .unwrap_or(&[])
    }

    pub fn current_location(&self) -> Option<&UserLocation> {
        self.state.current_location.as_ref()
    }

    /// Selected location id as stored in the location file.
    pub fn location_id(&self) -> Option<String> {
        fs::read_to_string(self.dir.join(LOCATION_FILE))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && s != "null")
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.role()
            .map(|r| r.nombre.trim().to_lowercase() == name.trim().to_lowercase())
            .unwrap_or(false)
    }

    /// True only when `permissions.menu[menu][permission]` is `true`.
    pub fn check_menu_permission(&self, menu: &str, permission: &str) -> bool {
        self.role()
            .and_then(|r| r.permissions.menu.get(menu))
            .map(|m| m.allows(permission))
            .unwrap_or(false)
    }

    pub fn can_view_route(&self, route: Route) -> bool {
        self.check_menu_permission(route.key(), "show_view")
    }

    pub fn is_user_approved(&self) -> bool {
        self.user().map(|u| u.aprobado).unwrap_or(false)
    }

    pub fn is_user_active(&self) -> bool {
        self.user().map(|u| u.activo).unwrap_or(false)
    }
}

/// Missing or unreadable files read as empty.
fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let text = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring unreadable {}: {}", path.display(), e);
            None
        }
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> AppResult<()> {
    fs::write(path, serde_json::to_vec_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::AppPermissions;
    use crate::services::auth_service::AuthUser;

    fn token() -> AuthSession {
        AuthSession {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            token_type: Some("bearer".to_string()),
            expires_in: 3600,
            expires_at: Some(1_900_000_000),
            user: AuthUser {
                id: "u-1".to_string(),
                email: Some("ana@minca.co".to_string()),
            },
        }
    }

    fn session(role_name: &str) -> SessionData {
        let permissions: AppPermissions = serde_json::from_value(json!({
            "menu": {
                "inventario": {"show_view": true},
                "registros": {"show_view": true, "edit_register": false},
                "solicitudes": {"show_view": false}
            }
        }))
        .unwrap();
        SessionData {
            user: UserData {
                id: "u-1".to_string(),
                email: "ana@minca.co".to_string(),
                nombre: Some("Ana".to_string()),
                activo: true,
                aprobado: true,
                role: Some(Role {
                    id_rol: "2".to_string(),
                    nombre: role_name.to_string(),
                    descripcion: None,
                    permissions,
                }),
            },
            locations: vec![
                UserLocation {
                    id_localizacion: "1".to_string(),
                    nombre: "Bodega Central".to_string(),
                },
                UserLocation {
                    id_localizacion: "2".to_string(),
                    nombre: "Taller Norte".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_session_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = SessionStore::open(dir.path()).unwrap();
            store.set_session(session("Tecnico"), token()).unwrap();
            store.set_location("Taller Norte").unwrap();
        }

        let store = SessionStore::open(dir.path()).unwrap();
        assert!(store.is_authenticated());
        assert_eq!(store.location_id().as_deref(), Some("2"));
        assert_eq!(store.current_location().unwrap().nombre, "Taller Norte");
        assert_eq!(store.token().unwrap().refresh_token, "refresh");
    }

    #[test]
    fn test_first_location_is_selected_on_login() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::open(dir.path()).unwrap();
        store.set_session(session("admin"), token()).unwrap();
        assert_eq!(store.location_id().as_deref(), Some("1"));
    }

    #[test]
    fn test_unassigned_location_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::open(dir.path()).unwrap();
        store.set_session(session("admin"), token()).unwrap();
        assert!(store.set_location("99").is_err());
        assert_eq!(store.location_id().as_deref(), Some("1"));
    }

    #[test]
    fn test_clear_drops_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::open(dir.path()).unwrap();
        store.set_session(session("admin"), token()).unwrap();
        store.clear().unwrap();

        assert!(!store.is_authenticated());
        assert!(store.location_id().is_none());
        assert!(store.token().is_none());
        assert!(!dir.path().join(LOCATION_FILE).exists());

        let reopened = SessionStore::open(dir.path()).unwrap();
        assert!(!reopened.is_authenticated());
    }

    #[test]
    fn test_role_and_menu_predicates() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::open(dir.path()).unwrap();
        assert!(!store.has_role("tecnico"));
        assert!(!store.can_view_route(Route::Inventario));

        store.set_session(session(" Tecnico "), token()).unwrap();
        assert!(store.has_role("tecnico"));
        assert!(store.has_role("TECNICO  "));
        assert!(!store.has_role("admin"));

        assert!(store.can_view_route(Route::Inventario));
        assert!(store.can_view_route(Route::Registros));
        assert!(!store.can_view_route(Route::Solicitudes));
        assert!(!store.can_view_route(Route::Repuestos));
        assert!(!store.check_menu_permission("registros", EDIT_REGISTER));
        assert!(store.is_user_approved());
        assert!(store.is_user_active());
    }

    #[test]
    fn test_literal_null_location_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LOCATION_FILE), "null").unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        assert!(store.location_id().is_none());
    }

    #[test]
    fn test_corrupt_state_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(USER_STORAGE_FILE), "{not json").unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        assert!(!store.is_authenticated());
    }
}
