use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::movement::parse_timestamp;

/// Row of `scooter_types`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScooterType {
    pub id: String,
    pub name: String,
    pub power: Option<String>,
    pub created_at: Option<String>,
}

/// Row of `view_order_follow`: a service order being followed up, with its scooter.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderFollow {
    pub id: i64,
    pub created_at: Option<String>,
    pub number: i64,
    pub id_scooter_type: Option<String>,
    pub nombre_scooter: Option<String>,
    pub potencia: Option<String>,
    /// Urgency, 1 (green) to 3 (red).
    pub level: i32,
    pub is_finish: bool,
    pub updated_at: Option<String>,
    pub status: Option<String>,
    pub phone: Option<String>,
    pub order_link: Option<String>,
    pub email: Option<String>,
    pub call_count: Option<i32>,
}

impl OrderFollow {
    pub fn level_label(&self) -> &'static str {
        match self.level {
            3 => "rojo",
            2 => "amarillo",
            _ => "verde",
        }
    }

    /// Time since the order was opened, in the largest whole unit.
    pub fn age(&self, now: DateTime<Utc>) -> String {
        let Some(created) = self.created_at.as_deref().and_then(parse_timestamp) else {
            return "-".to_string();
        };
        let elapsed = now - created;
        let (n, unit) = if elapsed.num_days() > 0 {
            (elapsed.num_days(), if elapsed.num_days() == 1 { "día" } else { "días" })
        } else if elapsed.num_hours() > 0 {
            (elapsed.num_hours(), if elapsed.num_hours() == 1 { "hora" } else { "horas" })
        } else {
            let minutes = elapsed.num_minutes().max(0);
            (minutes, if minutes == 1 { "minuto" } else { "minutos" })
        };
        format!("hace {} {}", n, unit)
    }
}

pub(crate) const ORDER_FOLLOW_COLUMNS: &str = "id::bigint, created_at::text, number::bigint, \
     id_scooter_type::text, nombre_scooter, potencia::text, COALESCE(level, 1)::int4 AS level, \
     COALESCE(is_finish, false) AS is_finish, updated_at::text, status, phone, order_link, email, \
     call_count::int4";

/// Insert into `order_follow`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderFollow {
    pub number: i64,
    pub id_scooter_type: String,
    pub status: String,
    pub phone: String,
    pub order_link: String,
    pub email: String,
}

impl NewOrderFollow {
    /// Every field is required; the scooter type must be a uuid.
    pub fn validate(&self) -> AppResult<()> {
        let invalid = |m: &str| Err(AppError::InvalidInput(m.to_string()));
        if self.number < 1 {
            return invalid("El número es requerido");
        }
        if Uuid::parse_str(self.id_scooter_type.trim()).is_err() {
            return invalid("Seleccione un tipo de scooter");
        }
        if self.status.trim().is_empty() {
            return invalid("El estado es requerido");
        }
        if self.phone.trim().is_empty() {
            return invalid("El teléfono es requerido");
        }
        if self.order_link.trim().is_empty() {
            return invalid("El link de orden es requerido");
        }
        if !is_email(self.email.trim()) {
            return invalid("Ingrese un email válido");
        }
        Ok(())
    }
}

fn is_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((user, domain)) => {
            !user.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

/// Client-side filters over the open orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
    /// Substring of the order number.
    pub order: Option<String>,
    pub scooter_type: Option<String>,
    pub level: Option<i32>,
}

impl OrderFilter {
    pub fn matches(&self, order: &OrderFollow) -> bool {
        if let Some(term) = self.order.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            if !order.number.to_string().contains(term) {
                return false;
            }
        }
        if let Some(kind) = self.scooter_type.as_deref().filter(|k| !k.is_empty()) {
            if order.id_scooter_type.as_deref() != Some(kind) {
                return false;
            }
        }
        // 0 means no level filter
        if let Some(level) = self.level.filter(|l| *l != 0) {
            if order.level != level {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, orders: &'a [OrderFollow]) -> Vec<&'a OrderFollow> {
        orders.iter().filter(|o| self.matches(o)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCOOTER: &str = "5f0c1c7e-9a43-4d7e-9a51-2b6f3f4f3a10";

    fn new_order() -> NewOrderFollow {
        NewOrderFollow {
            number: 1024,
            id_scooter_type: SCOOTER.to_string(),
            status: "En diagnóstico".to_string(),
            phone: "3001234567".to_string(),
            order_link: "https://ordenes.example/1024".to_string(),
            email: "cliente@example.com".to_string(),
        }
    }

    fn order(number: i64, level: i32, scooter: &str) -> OrderFollow {
        OrderFollow {
            id: number,
            created_at: Some("2024-05-01T08:00:00Z".to_string()),
            number,
            id_scooter_type: Some(scooter.to_string()),
            nombre_scooter: Some("Urban X".to_string()),
            potencia: Some("350W".to_string()),
            level,
            is_finish: false,
            updated_at: None,
            status: None,
            phone: None,
            order_link: None,
            email: None,
            call_count: None,
        }
    }

    #[test]
    fn test_validate_accepts_complete_order() {
        assert!(new_order().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let mut order = new_order();
        order.number = 0;
        assert_eq!(
            order.validate().unwrap_err().user_message(),
            "El número es requerido"
        );

        let mut order = new_order();
        order.id_scooter_type = "urban".to_string();
        assert_eq!(
            order.validate().unwrap_err().user_message(),
            "Seleccione un tipo de scooter"
        );

        let mut order = new_order();
        order.email = "cliente@".to_string();
        assert_eq!(
            order.validate().unwrap_err().user_message(),
            "Ingrese un email válido"
        );
    }

    #[test]
    fn test_age_and_level() {
        let now = parse_timestamp("2024-05-03T09:30:00Z").unwrap();
        let mut o = order(1024, 3, SCOOTER);
        assert_eq!(o.age(now), "hace 2 días");
        assert_eq!(o.level_label(), "rojo");

        o.created_at = Some("2024-05-03 08:00:00+00".to_string());
        assert_eq!(o.age(now), "hace 1 hora");

        o.created_at = None;
        assert_eq!(o.age(now), "-");
    }

    #[test]
    fn test_filter() {
        let orders = vec![order(1024, 1, SCOOTER), order(2048, 3, SCOOTER), order(1099, 3, "otro")];

        let by_number = OrderFilter {
            order: Some("10".to_string()),
            ..Default::default()
        };
        assert_eq!(by_number.apply(&orders).len(), 2);

        let urgent_of_type = OrderFilter {
            scooter_type: Some(SCOOTER.to_string()),
            level: Some(3),
            ..Default::default()
        };
        let shown = urgent_of_type.apply(&orders);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].number, 2048);

        let no_level = OrderFilter {
            level: Some(0),
            ..Default::default()
        };
        assert_eq!(no_level.apply(&orders).len(), 3);
    }
}
