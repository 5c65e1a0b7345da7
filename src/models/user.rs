use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::UserLocation;

/// Per-screen permission flags inside a role's permissions document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuPermissions {
    #[serde(default)]
    pub show_view: bool,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl MenuPermissions {
    pub fn allows(&self, permission: &str) -> bool {
        if permission == "show_view" {
            return self.show_view;
        }
        self.extra
            .get(permission)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Permissions document of a role. Only `menu` is interpreted; the
/// remaining sections are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppPermissions {
    #[serde(default)]
    pub menu: HashMap<String, MenuPermissions>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id_rol: String,
    pub nombre: String,
    pub descripcion: Option<String>,
    #[serde(default)]
    pub permissions: AppPermissions,
}

/// `roles` row as stored; the permissions document is decoded separately.
#[derive(Debug, Clone, FromRow)]
pub struct RoleRow {
    pub id_rol: String,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub permissions: Option<String>,
}

impl RoleRow {
    /// A malformed permissions document grants nothing.
    pub fn into_role(self) -> Role {
        let permissions = self
            .permissions
            .as_deref()
            .and_then(|p| match serde_json::from_str(p) {
                Ok(perms) => Some(perms),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable permissions for role {}: {}", self.nombre, e);
                    None
                }
            })
            .unwrap_or_default();
        Role {
            id_rol: self.id_rol,
            nombre: self.nombre,
            descripcion: self.descripcion,
            permissions,
        }
    }
}

/// `usuarios` row.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id_usuario: String,
    pub email: Option<String>,
    pub nombre: Option<String>,
    pub activo: bool,
    pub aprobado: bool,
    pub id_rol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    pub id: String,
    pub email: String,
    pub nombre: Option<String>,
    #[serde(default)]
    pub activo: bool,
    #[serde(default)]
    pub aprobado: bool,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub user: UserData,
    #[serde(default)]
    pub locations: Vec<UserLocation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_permissions_document() {
        let perms: AppPermissions = serde_json::from_value(json!({
            "menu": {
                "registros": {"show_view": true, "edit_register": true},
                "repuestos": {"show_view": false}
            },
            "inventory": {"edit_product": true}
        }))
        .unwrap();

        assert!(perms.menu["registros"].allows("edit_register"));
        assert!(perms.menu["registros"].allows("show_view"));
        assert!(!perms.menu["repuestos"].allows("show_view"));
        assert!(!perms.menu["repuestos"].allows("create_register"));
        assert!(perms.extra.contains_key("inventory"));
    }

    #[test]
    fn test_role_row_with_bad_permissions() {
        let row = RoleRow {
            id_rol: "1".to_string(),
            nombre: "admin".to_string(),
            descripcion: None,
            permissions: Some("not json".to_string()),
        };
        let role = row.into_role();
        assert!(role.permissions.menu.is_empty());
    }
}
