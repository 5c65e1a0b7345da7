use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{decode, errors::ErrorKind as JwtErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::db::{acquire_as, AuthContext, AUTHENTICATED_ROLE};
use crate::error::{AppError, AppResult};
use crate::http_client::HttpClient;
use crate::models::{RoleRow, SessionData, UserData, UserLocation, UserRow};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Seconds before expiry at which a stored session is refreshed.
const REFRESH_LEEWAY_SECS: i64 = 60;

pub const PENDING_APPROVAL_CODE: &str = "pending_approval";
pub const ACCOUNT_DISABLED_CODE: &str = "account_disabled";
pub const ACCOUNT_DISABLED_MESSAGE: &str =
    "Tu cuenta ha sido desactivada. Contacta al administrador.";
pub const PENDING_APPROVAL_MESSAGE: &str =
    "Tu cuenta está pendiente de aprobación por un administrador.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Token pair returned by the auth API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
    /// Unix seconds. Filled in from `expires_in` when the API omits it.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl AuthSession {
    fn normalized(mut self) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = Some(Utc::now().timestamp() + self.expires_in);
        }
        self
    }

    /// True once the access token is about to expire.
    pub fn needs_refresh(&self, now: i64) -> bool {
        self.expires_at
            .map(|exp| exp - REFRESH_LEEWAY_SECS <= now)
            .unwrap_or(false)
    }
}

/// Google sign-in started in the browser; finish with [`AuthService::exchange_code`].
#[derive(Debug, Clone)]
pub struct GoogleAuthorization {
    pub url: String,
    pub code_verifier: String,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct PkceGrant<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Serialize)]
struct RecoverRequest<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct PasswordUpdate<'a> {
    password: &'a str,
}

/// Session and profile established by a successful sign-in.
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub session: AuthSession,
    pub data: SessionData,
}

/// Client of the backend auth API plus the session profile lookup.
#[derive(Clone)]
pub struct AuthService {
    http: HttpClient,
    auth_url: String,
    jwt_secret: Option<String>,
    pool: PgPool,
}

impl AuthService {
    pub fn new(config: &Config, http: HttpClient, pool: PgPool) -> Self {
        Self {
            http,
            auth_url: config.auth_url(),
            jwt_secret: config.jwt_secret.clone(),
            pool,
        }
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        let url = format!("{}/token?grant_type=password", self.auth_url);
        let session: AuthSession = self
            .http
            .post_json(&url, &PasswordGrant { email: email.trim(), password }, None)
            .await
            .map_err(auth_error)?;
        tracing::info!("Signed in: user={}", session.user.id);
        Ok(session.normalized())
    }

    pub async fn refresh(&self, refresh_token: &str) -> AppResult<AuthSession> {
        let url = format!("{}/token?grant_type=refresh_token", self.auth_url);
        let session: AuthSession = self
            .http
            .post_json(&url, &RefreshGrant { refresh_token }, None)
            .await
            .map_err(auth_error)?;
        tracing::debug!("Refreshed session: user={}", session.user.id);
        Ok(session.normalized())
    }

    pub async fn sign_out(&self, access_token: &str) -> AppResult<()> {
        let url = format!("{}/logout", self.auth_url);
        self.http
            .post_json_no_content(&url, &serde_json::json!({}), Some(access_token))
            .await
            .map_err(auth_error)?;
        tracing::info!("Signed out");
        Ok(())
    }

    /// Sends the password recovery email; `redirect_to` is the page that sets the new password.
    pub async fn recover_password(&self, email: &str, redirect_to: Option<&str>) -> AppResult<()> {
        let mut url = format!("{}/recover", self.auth_url);
        if let Some(redirect) = redirect_to {
            url.push_str(&format!("?redirect_to={}", urlencoding::encode(redirect)));
        }
        self.http
            .post_json_no_content(&url, &RecoverRequest { email: email.trim() }, None)
            .await
            .map_err(auth_error)?;
        tracing::info!("Password recovery requested for {}", email.trim());
        Ok(())
    }

    pub async fn update_password(&self, access_token: &str, password: &str) -> AppResult<()> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Auth {
                code: Some("weak_password".to_string()),
                message: "Password should be at least 6 characters".to_string(),
            });
        }
        let url = format!("{}/user", self.auth_url);
        let _: serde_json::Value = self
            .http
            .put_json(&url, &PasswordUpdate { password }, Some(access_token))
            .await
            .map_err(auth_error)?;
        tracing::info!("Password updated");
        Ok(())
    }

    /// Builds the Google authorize URL with a fresh PKCE verifier.
    pub fn google_authorize(&self, redirect_to: &str) -> GoogleAuthorization {
        let code_verifier = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        GoogleAuthorization {
            url: google_authorize_url(&self.auth_url, redirect_to, &code_challenge(&code_verifier)),
            code_verifier,
        }
    }

    /// Trades the `code` returned to the redirect page for a session.
    pub async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> AppResult<AuthSession> {
        let url = format!("{}/token?grant_type=pkce", self.auth_url);
        let session: AuthSession = self
            .http
            .post_json(
                &url,
                &PkceGrant {
                    auth_code: auth_code.trim(),
                    code_verifier,
                },
                None,
            )
            .await
            .map_err(auth_error)?;
        tracing::info!("Signed in with Google: user={}", session.user.id);
        Ok(session.normalized())
    }

    /// Database identity of a session.
    pub fn context(&self, session: &AuthSession) -> AppResult<AuthContext> {
        let claims = decode_claims(&session.access_token, self.jwt_secret.as_deref())?;
        let user_id = claims
            .get("sub")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(&session.user.id)
            .to_string();
        Ok(AuthContext::new(user_id, claims))
    }

    /// User row, role and assigned locations of the signed-in user.
    pub async fn fetch_session_data(&self, ctx: &AuthContext, email: Option<&str>) -> AppResult<SessionData> {
        let mut conn = acquire_as(&self.pool, ctx).await?;

        let user = sqlx::query_as::<_, UserRow>(
            "SELECT id_usuario::text, email, nombre, COALESCE(activo, false) AS activo, \
             COALESCE(aprobado, false) AS aprobado, id_rol::text \
             FROM usuarios WHERE id_usuario = $1::uuid",
        )
        .bind(&ctx.user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Usuario {}", ctx.user_id)))?;

        let role = match user.id_rol.as_deref() {
            Some(id_rol) => sqlx::query_as::<_, RoleRow>(
                "SELECT id_rol::text, nombre, descripcion, permissions::text \
                 FROM roles WHERE id_rol::text = $1",
            )
            .bind(id_rol)
            .fetch_optional(&mut *conn)
            .await?
            .map(RoleRow::into_role),
            None => None,
        };

        let locations = sqlx::query_as::<_, UserLocation>(
            "SELECT l.id_localizacion::text, l.nombre \
             FROM usuarios_localizacion ul \
             JOIN localizacion l ON l.id_localizacion = ul.id_localizacion \
             WHERE ul.id_usuario = $1::uuid ORDER BY l.nombre",
        )
        .bind(&ctx.user_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(SessionData {
            user: UserData {
                id: user.id_usuario,
                email: user
                    .email
                    .or_else(|| email.map(str::to_string))
                    .unwrap_or_default(),
                nombre: user.nombre,
                activo: user.activo,
                aprobado: user.aprobado,
                role,
            },
            locations,
        })
    }

    /// Loads the profile of a fresh session and applies the account checks.
    /// A disabled account is signed out again.
    pub async fn establish(&self, session: AuthSession) -> AppResult<LoginResult> {
        let ctx = self.context(&session)?;
        let data = self
            .fetch_session_data(&ctx, session.user.email.as_deref())
            .await?;

        if let Err(e) = check_account(&data.user) {
            if data.user.aprobado && !data.user.activo {
                if let Err(sign_out_err) = self.sign_out(&session.access_token).await {
                    tracing::warn!("Sign-out of disabled account failed: {}", sign_out_err);
                }
            }
            tracing::warn!("Sign-in rejected for user {}: {}", data.user.id, e);
            return Err(e);
        }

        Ok(LoginResult { session, data })
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginResult> {
        let session = self.sign_in_with_password(email, password).await?;
        self.establish(session).await
    }
}

/// Unapproved accounts wait for an administrator; inactive ones are rejected.
pub fn check_account(user: &UserData) -> AppResult<()> {
    if !user.aprobado {
        return Err(AppError::Auth {
            code: Some(PENDING_APPROVAL_CODE.to_string()),
            message: PENDING_APPROVAL_MESSAGE.to_string(),
        });
    }
    if !user.activo {
        return Err(AppError::Auth {
            code: Some(ACCOUNT_DISABLED_CODE.to_string()),
            message: ACCOUNT_DISABLED_MESSAGE.to_string(),
        });
    }
    Ok(())
}

/// Decodes access-token claims. Without a secret the signature is not checked;
/// expiry and audience always are.
pub fn decode_claims(token: &str, secret: Option<&str>) -> AppResult<serde_json::Value> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[AUTHENTICATED_ROLE]);
    let key = match secret {
        Some(secret) => DecodingKey::from_secret(secret.as_bytes()),
        None => {
            validation.insecure_disable_signature_validation();
            DecodingKey::from_secret(&[])
        }
    };

    decode::<serde_json::Value>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            JwtErrorKind::ExpiredSignature => AppError::Auth {
                code: Some("session_not_found".to_string()),
                message: "Session expired".to_string(),
            },
            _ => AppError::Auth {
                code: None,
                message: format!("Token inválido: {}", e),
            },
        })
}

/// S256 PKCE challenge.
fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn google_authorize_url(auth_url: &str, redirect_to: &str, challenge: &str) -> String {
    format!(
        "{}/authorize?provider=google&redirect_to={}&code_challenge={}&code_challenge_method=s256&access_type=offline&prompt=consent",
        auth_url,
        urlencoding::encode(redirect_to),
        urlencoding::encode(challenge),
    )
}

/// Auth endpoints report failures as API errors; re-tag them so they get auth messages.
fn auth_error(err: AppError) -> AppError {
    match err {
        AppError::Api { code, message, .. } => AppError::Auth { code, message },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    use super::*;

    const SECRET: &str = "super-secret-jwt-token-with-at-least-32-characters";

    fn token(exp: i64, secret: &str) -> String {
        encode(
            &Header::default(),
            &json!({
                "sub": "6f1c2b7e-0000-4000-8000-000000000001",
                "aud": "authenticated",
                "role": "authenticated",
                "email": "ana@minca.co",
                "exp": exp,
            }),
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn user(aprobado: bool, activo: bool) -> UserData {
        UserData {
            id: "u-1".to_string(),
            email: "ana@minca.co".to_string(),
            nombre: Some("Ana".to_string()),
            activo,
            aprobado,
            role: None,
        }
    }

    #[test]
    fn test_decode_claims_with_secret() {
        let exp = Utc::now().timestamp() + 3600;
        let claims = decode_claims(&token(exp, SECRET), Some(SECRET)).unwrap();
        assert_eq!(claims["email"], json!("ana@minca.co"));
        assert_eq!(claims["role"], json!("authenticated"));
    }

    #[test]
    fn test_decode_claims_wrong_secret() {
        let exp = Utc::now().timestamp() + 3600;
        let err = decode_claims(&token(exp, SECRET), Some("another-secret-of-sufficient-length")).unwrap_err();
        assert!(matches!(err, AppError::Auth { code: None, .. }));
    }

    #[test]
    fn test_decode_claims_without_secret() {
        let exp = Utc::now().timestamp() + 3600;
        let claims = decode_claims(&token(exp, SECRET), None).unwrap();
        assert_eq!(claims["sub"], json!("6f1c2b7e-0000-4000-8000-000000000001"));
    }

    #[test]
    fn test_expired_token_maps_to_session_expired() {
        let exp = Utc::now().timestamp() - 3600;
        let err = decode_claims(&token(exp, SECRET), Some(SECRET)).unwrap_err();
        assert_eq!(
            err.user_message(),
            "Sesión expirada. Por favor inicia sesión nuevamente."
        );
    }

    #[test]
    fn test_check_account() {
        assert!(check_account(&user(true, true)).is_ok());

        let pending = check_account(&user(false, true)).unwrap_err();
        assert_eq!(pending.code().as_deref(), Some(PENDING_APPROVAL_CODE));

        let disabled = check_account(&user(true, false)).unwrap_err();
        assert_eq!(disabled.user_message(), ACCOUNT_DISABLED_MESSAGE);
    }

    #[test]
    fn test_code_challenge_is_rfc7636() {
        assert_eq!(
            code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_google_authorize_url() {
        let url = google_authorize_url(
            "https://proj.supabase.co/auth/v1",
            "http://localhost:5173/auth/callback",
            "abc",
        );
        assert!(url.starts_with("https://proj.supabase.co/auth/v1/authorize?provider=google"));
        assert!(url.contains("redirect_to=http%3A%2F%2Flocalhost%3A5173%2Fauth%2Fcallback"));
        assert!(url.contains("code_challenge=abc&code_challenge_method=s256"));
    }

    #[test]
    fn test_session_refresh_window() {
        let session = AuthSession {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            token_type: Some("bearer".to_string()),
            expires_in: 3600,
            expires_at: Some(10_000),
            user: AuthUser {
                id: "u-1".to_string(),
                email: None,
            },
        };
        assert!(!session.needs_refresh(9_000));
        assert!(session.needs_refresh(9_950));
    }

    #[test]
    fn test_api_errors_become_auth_errors() {
        let err = auth_error(AppError::Api {
            status: 400,
            code: Some("invalid_credentials".to_string()),
            message: "Invalid login credentials".to_string(),
        });
        assert_eq!(
            err.user_message(),
            "Credenciales inválidas. Verifica tu email y contraseña."
        );
    }
}
