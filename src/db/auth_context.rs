use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::error::AppResult;

/// Database role that row-level security policies are written against.
pub const AUTHENTICATED_ROLE: &str = "authenticated";

/// Identity of the caller, applied to every connection before it runs queries.
///
/// `claims` is the decoded access-token payload; policies read it back through
/// `current_setting('request.jwt.claims')` (and `auth.uid()` on top of that).
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub user_id: String,
    pub claims: serde_json::Value,
}

impl AuthContext {
    pub fn new(user_id: impl Into<String>, claims: serde_json::Value) -> Self {
        Self {
            user_id: user_id.into(),
            claims,
        }
    }

    /// Role claimed by the token, `authenticated` when absent.
    pub fn role(&self) -> &str {
        self.claims
            .get("role")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(AUTHENTICATED_ROLE)
    }
}

/// Applies the caller's role and JWT claims to the session.
/// With `local = true` the settings only last until the end of the current transaction.
pub async fn set_request_claims(
    conn: &mut PgConnection,
    ctx: &AuthContext,
    local: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "SELECT set_config('role', $1, $4), \
         set_config('request.jwt.claims', $2, $4), \
         set_config('request.jwt.claim.sub', $3, $4)",
    )
    .bind(ctx.role())
    .bind(ctx.claims.to_string())
    .bind(&ctx.user_id)
    .bind(local)
    .execute(conn)
    .await?;
    Ok(())
}

/// Acquires a pooled connection already scoped to the caller.
pub async fn acquire_as(pool: &PgPool, ctx: &AuthContext) -> AppResult<PoolConnection<Postgres>> {
    let mut conn = pool.acquire().await?;
    set_request_claims(&mut conn, ctx, false).await?;
    Ok(conn)
}

/// Starts a transaction scoped to the caller; the claims are dropped on commit/rollback.
pub async fn begin_as(
    pool: &PgPool,
    ctx: &AuthContext,
) -> AppResult<Transaction<'static, Postgres>> {
    let mut tx = pool.begin().await?;
    set_request_claims(&mut tx, ctx, true).await?;
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_defaults_to_authenticated() {
        let ctx = AuthContext::new("user-uuid", json!({"sub": "user-uuid"}));
        assert_eq!(ctx.role(), AUTHENTICATED_ROLE);
    }

    #[test]
    fn test_role_from_claims() {
        let ctx = AuthContext::new("user-uuid", json!({"sub": "user-uuid", "role": "service_role"}));
        assert_eq!(ctx.role(), "service_role");
        assert_eq!(ctx.user_id, "user-uuid");
    }
}
