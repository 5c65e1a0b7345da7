//! `minca orders` - follow-up of scooter service orders

use chrono::{DateTime, Utc};
use clap::Subcommand;
use tabled::Tabled;

use crate::cli::output::{opt, print_table};
use crate::cli::App;
use crate::error::{AppError, AppResult};
use crate::models::{NewOrderFollow, OrderFilter, OrderFollow, ScooterType};
use crate::notify::report_with;
use crate::session::Route;

#[derive(Subcommand, Debug)]
pub enum OrderCommands {
    /// Open orders, oldest first
    List(ListArgs),
    /// Scooter types orders can be opened for
    Types,
    /// Open a follow-up for a service order
    Create(CreateArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Substring of the order number
    #[arg(long)]
    pub order: Option<String>,
    /// Scooter type id or name
    #[arg(long)]
    pub scooter: Option<String>,
    /// 1 (verde), 2 (amarillo) or 3 (rojo)
    #[arg(long, value_parser = clap::value_parser!(i32).range(1..=3))]
    pub level: Option<i32>,
}

#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    pub number: i64,
    /// Scooter type id or name
    #[arg(long)]
    pub scooter: String,
    #[arg(long)]
    pub status: String,
    #[arg(long)]
    pub phone: String,
    #[arg(long)]
    pub link: String,
    #[arg(long)]
    pub email: String,
}

#[derive(Tabled)]
struct OrderRow {
    #[tabled(rename = "TIEMPO")]
    tiempo: String,
    #[tabled(rename = "N° ORDEN")]
    numero: i64,
    #[tabled(rename = "SCOOTER")]
    scooter: String,
    #[tabled(rename = "NIVEL")]
    nivel: &'static str,
    #[tabled(rename = "ESTADO")]
    estado: String,
}

impl OrderRow {
    fn new(order: &OrderFollow, now: DateTime<Utc>) -> Self {
        let scooter = match (&order.nombre_scooter, &order.potencia) {
            (Some(name), Some(power)) => format!("{} ({})", name, power),
            (name, _) => opt(name),
        };
        Self {
            tiempo: order.age(now),
            numero: order.number,
            scooter,
            nivel: order.level_label(),
            estado: opt(&order.status),
        }
    }
}

#[derive(Tabled)]
struct ScooterRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NOMBRE")]
    nombre: String,
    #[tabled(rename = "POTENCIA")]
    potencia: String,
}

/// Shown before the backend message when an order cannot be created.
pub const CREATE_FAILED: &str = "Error al crear el registro";

pub async fn run(app: &mut App, cmd: OrderCommands) -> AppResult<()> {
    match cmd {
        OrderCommands::List(args) => list(app, args).await,
        OrderCommands::Types => scooter_types(app).await,
        OrderCommands::Create(args) => {
            let result = create(app, args).await;
            if let Err(e) = &result {
                report_with(app.notifier.as_ref(), CREATE_FAILED, e);
            }
            result
        }
    }
}

async fn list(app: &mut App, args: ListArgs) -> AppResult<()> {
    app.require(Route::Ordenes)?;
    let ctx = app.context().await?;

    let scooter_type = match args.scooter.as_deref() {
        Some(key) => {
            let types = app.queries.scooter_types(&ctx).await?;
            Some(resolve_scooter(&types, key)?.id.clone())
        }
        None => None,
    };
    let filter = OrderFilter {
        order: args.order,
        scooter_type,
        level: args.level,
    };
    let orders = app.queries.open_orders(&ctx).await?;
    let now = Utc::now();
    let shown = filter.apply(&orders);
    print_table(shown.iter().map(|o| OrderRow::new(*o, now)).collect());
    println!("{} de {} órdenes abiertas", shown.len(), orders.len());
    Ok(())
}

async fn scooter_types(app: &mut App) -> AppResult<()> {
    app.require(Route::Ordenes)?;
    let ctx = app.context().await?;

    let types = app.queries.scooter_types(&ctx).await?;
    print_table(
        types
            .iter()
            .map(|t| ScooterRow {
                id: t.id.clone(),
                nombre: t.name.clone(),
                potencia: opt(&t.power),
            })
            .collect(),
    );
    Ok(())
}

/// Failures are reported by [`run`] under [`CREATE_FAILED`].
async fn create(app: &mut App, args: CreateArgs) -> AppResult<()> {
    app.require(Route::Ordenes)?;
    let ctx = app.context().await?;

    let types = app.queries.scooter_types(&ctx).await?;
    let scooter = resolve_scooter(&types, &args.scooter)?;
    let order = NewOrderFollow {
        number: args.number,
        id_scooter_type: scooter.id.clone(),
        status: args.status,
        phone: args.phone,
        order_link: args.link,
        email: args.email,
    };
    app.queries.create_order(&ctx, &order).await?;
    app.notifier.success("Registro creado exitosamente");
    Ok(())
}

/// Scooter type whose id equals `key`, or whose name matches it ignoring case.
fn resolve_scooter<'a>(types: &'a [ScooterType], key: &str) -> AppResult<&'a ScooterType> {
    let key = key.trim();
    types
        .iter()
        .find(|t| t.id == key)
        .or_else(|| types.iter().find(|t| t.name.eq_ignore_ascii_case(key)))
        .ok_or_else(|| AppError::NotFound(format!("Tipo de scooter {}", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types() -> Vec<ScooterType> {
        vec![
            ScooterType {
                id: "5f0c1c7e-9a43-4d7e-9a51-2b6f3f4f3a10".to_string(),
                name: "Urban X".to_string(),
                power: Some("350W".to_string()),
                created_at: None,
            },
            ScooterType {
                id: "8b7e2d41-0c5a-4e8f-b1d2-3a4c5e6f7a80".to_string(),
                name: "Trail Pro".to_string(),
                power: Some("800W".to_string()),
                created_at: None,
            },
        ]
    }

    #[test]
    fn test_resolve_scooter_by_id_or_name() {
        let types = types();
        assert_eq!(
            resolve_scooter(&types, "8b7e2d41-0c5a-4e8f-b1d2-3a4c5e6f7a80").unwrap().name,
            "Trail Pro"
        );
        assert_eq!(resolve_scooter(&types, " urban x ").unwrap().power.as_deref(), Some("350W"));
        assert!(matches!(
            resolve_scooter(&types, "Cargo"),
            Err(AppError::NotFound(_))
        ));
    }
}
