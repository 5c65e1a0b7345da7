//! `minca login|logout|whoami|location|password`

use clap::Subcommand;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::App;
use crate::error::{AppError, AppResult};
use crate::services::auth_service::LoginResult;

/// Page the web app serves for OAuth redirects.
pub const DEFAULT_OAUTH_REDIRECT: &str = "http://localhost:5173/auth/callback";
/// Page the web app serves for setting a new password.
pub const DEFAULT_RESET_REDIRECT: &str = "http://localhost:5173/update-password";

#[derive(clap::Args, Debug)]
pub struct LoginArgs {
    /// Account email
    #[arg(long, short = 'e', env = "MINCA_EMAIL")]
    pub email: Option<String>,

    /// Account password
    #[arg(long, short = 'p', env = "MINCA_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Sign in with Google in the browser
    #[arg(long)]
    pub google: bool,

    /// Redirect page registered for the Google sign-in
    #[arg(long, default_value = DEFAULT_OAUTH_REDIRECT)]
    pub redirect_to: String,
}

#[derive(clap::Args, Debug)]
pub struct LocationArgs {
    /// Location id or name to select; lists the assigned locations when omitted
    pub location: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum PasswordCommands {
    /// Email a recovery link
    Recover {
        email: String,
        #[arg(long, default_value = DEFAULT_RESET_REDIRECT)]
        redirect_to: String,
    },
    /// Change the password of the signed-in user
    Update {
        #[arg(env = "MINCA_NEW_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

pub async fn login(app: &mut App, args: LoginArgs) -> AppResult<()> {
    let LoginResult { session, data } = if args.google {
        google_login(app, &args.redirect_to).await?
    } else {
        let email = args
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::InvalidInput("Ingresa tu email".to_string()))?;
        let password = args
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::InvalidInput("Ingresa tu contraseña".to_string()))?;
        app.auth.login(&email, &password).await?
    };

    app.session.set_session(data, session)?;
    app.notifier.success("Bienvenido de nuevo");
    match app.session.current_location() {
        Some(location) => app
            .notifier
            .info(&format!("Ubicación actual: {}", location.nombre)),
        None => app.notifier.warning("No tienes ubicaciones asignadas"),
    }
    Ok(())
}

async fn google_login(app: &App, redirect_to: &str) -> AppResult<LoginResult> {
    let authorization = app.auth.google_authorize(redirect_to);
    app.notifier.info("Redirigiendo a Google...");
    if let Err(e) = webbrowser::open(&authorization.url) {
        tracing::warn!("Could not open browser: {}", e);
    }
    eprintln!("{}", authorization.url);
    eprintln!("Pega la URL de retorno o el código de autorización:");

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let code = extract_code(&line)
        .ok_or_else(|| AppError::InvalidInput("No se recibió un código de autorización".to_string()))?;

    let session = app
        .auth
        .exchange_code(&code, &authorization.code_verifier)
        .await?;
    app.auth.establish(session).await
}

/// Accepts either the bare code or the full redirect URL carrying `code=`.
fn extract_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if !input.contains("code=") {
        return Some(input.to_string());
    }
    input
        .split(['?', '&', '#'])
        .find_map(|pair| pair.strip_prefix("code="))
        .filter(|code| !code.is_empty())
        .map(|code| {
            urlencoding::decode(code)
                .map(|c| c.into_owned())
                .unwrap_or_else(|_| code.to_string())
        })
}

pub async fn logout(app: &mut App) -> AppResult<()> {
    if let Some(token) = app.session.token().cloned() {
        if let Err(e) = app.auth.sign_out(&token.access_token).await {
            tracing::warn!("Remote sign-out failed: {}", e);
        }
    }
    app.session.clear()?;
    app.notifier.success("Sesión cerrada exitosamente");
    Ok(())
}

pub fn whoami(app: &App) -> AppResult<()> {
    let user = app.session.user().ok_or_else(|| AppError::Auth {
        code: Some("session_not_found".to_string()),
        message: "No hay una sesión activa".to_string(),
    })?;

    println!("Usuario:   {}", user.nombre.as_deref().unwrap_or(&user.email));
    println!("Email:     {}", user.email);
    println!(
        "Rol:       {}",
        app.session.role().map(|r| r.nombre.as_str()).unwrap_or("-")
    );
    println!(
        "Ubicación: {}",
        app.session
            .current_location()
            .map(|l| format!("{} ({})", l.nombre, l.id_localizacion))
            .unwrap_or_else(|| "-".to_string())
    );
    println!("Aprobado:  {}", crate::cli::output::yes_no(app.session.is_user_approved()));
    println!("Activo:    {}", crate::cli::output::yes_no(app.session.is_user_active()));
    Ok(())
}

pub fn location(app: &mut App, args: LocationArgs) -> AppResult<()> {
    match args.location {
        Some(wanted) => {
            let location = app.session.set_location(&wanted)?;
            app.notifier
                .success(&format!("Ubicación seleccionada: {}", location.nombre));
        }
        None => {
            let current = app.session.location_id();
            for location in app.session.locations() {
                let marker = if current.as_deref() == Some(location.id_localizacion.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{} {:>4}  {}", marker, location.id_localizacion, location.nombre);
            }
        }
    }
    Ok(())
}

pub async fn password(app: &mut App, cmd: PasswordCommands) -> AppResult<()> {
    match cmd {
        PasswordCommands::Recover { email, redirect_to } => {
            app.auth.recover_password(&email, Some(&redirect_to)).await?;
            app.notifier
                .success("Correo de recuperación enviado. Revisa tu bandeja de entrada.");
        }
        PasswordCommands::Update { password } => {
            app.context().await?;
            let token = app
                .session
                .token()
                .map(|t| t.access_token.clone())
                .ok_or_else(|| AppError::Auth {
                    code: Some("session_not_found".to_string()),
                    message: "No hay una sesión activa".to_string(),
                })?;
            app.auth.update_password(&token, &password).await?;
            app.notifier.success("Contraseña actualizada exitosamente");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_code_from_redirect_url() {
        assert_eq!(
            extract_code("http://localhost:5173/auth/callback?code=abc-123&state=x\n").as_deref(),
            Some("abc-123")
        );
        assert_eq!(extract_code("  abc-123 ").as_deref(), Some("abc-123"));
        assert_eq!(extract_code("   "), None);
        assert_eq!(extract_code("http://localhost/auth/callback?code="), None);
    }
}
