use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{AppError, AppResult};
use crate::models::{CartItem, RequestContext};

const CHAT_SEND_URL: &str = "https://api.whatsapp.com/send";
const SEPARATOR: &str = "--------------------------------";

/// Shortest digit string accepted as a phone number.
pub const MIN_PHONE_DIGITS: usize = 7;

static RE_NON_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\D+").unwrap());

/// International number without `+`, spaces or dashes. Fewer than
/// [`MIN_PHONE_DIGITS`] digits is an error.
pub fn normalize_phone(phone: &str) -> AppResult<String> {
    let digits = RE_NON_DIGITS.replace_all(phone, "").into_owned();
    if digits.len() < MIN_PHONE_DIGITS {
        return Err(AppError::InvalidInput(format!(
            "Número de teléfono inválido: {}",
            phone.trim()
        )));
    }
    Ok(digits)
}

/// Plain-text summary of a request, formatted for the chat application.
pub fn request_message(items: &[CartItem], context: &RequestContext, date: NaiveDate) -> String {
    let mut message = String::from("*NUEVA SOLICITUD DE REPUESTOS* 📦\n");
    message.push_str(SEPARATOR);
    message.push('\n');
    message.push_str(&format!("📅 *Fecha:* {}\n", date.format("%d/%m/%Y")));
    message.push_str(&format!("👤 *Solicita:* {}\n", context.solicitante));
    message.push_str(&format!("📍 *Origen:* {}\n", context.origen));
    message.push_str(&format!("🏭 *Destino:* {}\n", context.destino));
    message.push_str(SEPARATOR);
    message.push('\n');
    message.push_str("*LISTA DE ITEMS:*\n\n");

    let lines: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            format!(
                "{}. *{}*\n   Ref: {}",
                i + 1,
                item.nombre_repuesto,
                item.referencia
            )
        })
        .collect();
    message.push_str(&lines.join("\n"));

    message.push('\n');
    message.push_str(SEPARATOR);
    message.push('\n');
    message.push_str("🔗 _Generado desde App Minca Inventory System_");
    message
}

/// Deep link that opens a chat with `phone` and the message prefilled.
pub fn chat_link(phone: &str, message: &str) -> AppResult<String> {
    Ok(format!(
        "{}?phone={}&text={}",
        CHAT_SEND_URL,
        normalize_phone(phone)?,
        urlencoding::encode(message)
    ))
}

/// Opens the deep link in the default browser. Failures are logged only.
pub fn send_request_summary(
    phone: &str,
    items: &[CartItem],
    context: &RequestContext,
    date: NaiveDate,
) -> AppResult<String> {
    let url = chat_link(phone, &request_message(items, context, date))?;
    if let Err(e) = webbrowser::open(&url) {
        tracing::warn!("Could not open chat link: {}", e);
    }
    Ok(url)
}
