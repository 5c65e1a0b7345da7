use sqlx::PgPool;

use crate::db::{acquire_as, AuthContext, WhereClause};
use crate::error::{AppError, AppResult};
use crate::models::notification::NOTIFICATION_COLUMNS;
use crate::models::{Notification, NOTIFICATION_LIMIT};

#[derive(Clone)]
pub struct NotificationsService {
    pool: PgPool,
}

impl NotificationsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Latest notifications addressed to the user; non-technicians also get
    /// the ones addressed to their location.
    pub async fn fetch(
        &self,
        ctx: &AuthContext,
        user_id: &str,
        location_id: Option<&str>,
        is_technician: bool,
    ) -> AppResult<Vec<Notification>> {
        let clause = audience_clause(user_id, location_id, is_technician);
        let sql = format!(
            "SELECT {} FROM notificaciones {} ORDER BY fecha_creacion DESC LIMIT {}",
            NOTIFICATION_COLUMNS,
            clause.sql(),
            NOTIFICATION_LIMIT
        );

        let mut conn = acquire_as(&self.pool, ctx).await?;
        let mut query = sqlx::query_as::<_, Notification>(&sql);
        for p in clause.params() {
            query = query.bind(p);
        }
        Ok(query.fetch_all(&mut *conn).await?)
    }

    pub async fn mark_as_read(&self, ctx: &AuthContext, id: &str) -> AppResult<()> {
        let mut conn = acquire_as(&self.pool, ctx).await?;
        let rows_affected = sqlx::query(
            "UPDATE notificaciones SET leida = true WHERE id_notificacion::text = $1",
        )
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("Notificación {}", id)));
        }
        tracing::info!("Marked notification as read: id={}", id);
        Ok(())
    }
}

fn audience_clause(user_id: &str, location_id: Option<&str>, is_technician: bool) -> WhereClause {
    let mut clause = WhereClause::new();
    match location_id.filter(|l| !l.is_empty() && !is_technician) {
        Some(location) => {
            clause.any_eq(&[
                ("id_usuario", "uuid", user_id.to_string()),
                ("id_localizacion", "bigint", location.to_string()),
            ]);
        }
        None => {
            clause.eq("id_usuario", "uuid", user_id);
        }
    }
    clause
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_technicians_only_see_their_own() {
        let clause = audience_clause("u-1", Some("3"), true);
        assert_eq!(clause.sql(), "WHERE id_usuario = $1::uuid");
    }

    #[test]
    fn test_others_see_user_or_location() {
        let clause = audience_clause("u-1", Some("3"), false);
        assert_eq!(
            clause.sql(),
            "WHERE (id_usuario = $1::uuid OR id_localizacion = $2::bigint)"
        );
        assert_eq!(clause.params(), &["u-1", "3"]);
    }

    #[test]
    fn test_without_location_falls_back_to_user() {
        let clause = audience_clause("u-1", None, false);
        assert_eq!(clause.sql(), "WHERE id_usuario = $1::uuid");
    }
}
