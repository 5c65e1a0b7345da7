//! `minca inventory` - stock of the selected location

use clap::Subcommand;
use tabled::Tabled;

use crate::cli::output::{day, opt, print_page, print_table, yes_no};
use crate::cli::App;
use crate::db::Direction;
use crate::error::AppResult;
use crate::models::{
    InventoryItem, InventoryOrder, InventoryParams, InventoryUpdate, NewInventoryItem, PageRequest,
};
use crate::session::Route;

#[derive(Subcommand, Debug)]
pub enum InventoryCommands {
    /// Paginated stock of the selected location
    List(ListArgs),
    /// Whole stock of the selected location, by name
    All,
    /// Find stocked parts by name or reference
    Search { term: String },
    /// Movement timeline of a part reference
    History {
        referencia: String,
        /// 0-based page of ten entries
        #[arg(long, default_value_t = 0)]
        page: u32,
    },
    /// Stock a catalogue part at the selected location
    Add(AddArgs),
    /// Change stock, position or part attributes of an inventory row
    Update(UpdateArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(long, short = 'n', default_value_t = 10)]
    pub limit: u32,

    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Stock status, `all` for every status
    #[arg(long)]
    pub estado: Option<String>,

    #[arg(long)]
    pub descontinuado: Option<bool>,

    /// Only parts still flagged as new
    #[arg(long)]
    pub nuevos: bool,

    #[arg(long, value_parser = parse_order, default_value = "referencia")]
    pub order_by: InventoryOrder,

    /// Descending order
    #[arg(long)]
    pub desc: bool,
}

fn parse_order(value: &str) -> Result<InventoryOrder, String> {
    InventoryOrder::parse(value).ok_or_else(|| format!("columna no permitida: {}", value))
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Catalogue part id
    pub id_repuesto: String,
    #[arg(long, default_value_t = 0)]
    pub cantidad: i32,
    #[arg(long)]
    pub posicion: Option<String>,
    /// Timestamp until which the part is shown as new
    #[arg(long)]
    pub nuevo_hasta: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    pub id_inventario: String,
    #[arg(long)]
    pub stock: Option<i32>,
    #[arg(long)]
    pub posicion: Option<String>,
    #[arg(long)]
    pub cantidad_minima: Option<i32>,
    #[arg(long)]
    pub descontinuado: Option<bool>,
    #[arg(long)]
    pub tipo: Option<String>,
    #[arg(long)]
    pub fecha_estimada: Option<String>,
    #[arg(long)]
    pub nuevo_hasta: Option<String>,
}

#[derive(Tabled)]
struct InventoryRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "REFERENCIA")]
    referencia: String,
    #[tabled(rename = "NOMBRE")]
    nombre: String,
    #[tabled(rename = "STOCK")]
    stock: i32,
    #[tabled(rename = "MÍN.")]
    minimo: i32,
    #[tabled(rename = "POSICIÓN")]
    posicion: String,
    #[tabled(rename = "ESTADO")]
    estado: String,
    #[tabled(rename = "DESC.")]
    descontinuado: &'static str,
}

impl From<&InventoryItem> for InventoryRow {
    fn from(item: &InventoryItem) -> Self {
        Self {
            id: item.id_inventario.clone(),
            referencia: item.referencia.clone(),
            nombre: item.nombre.clone(),
            stock: item.stock_actual,
            minimo: item.cantidad_minima,
            posicion: opt(&item.posicion),
            estado: opt(&item.estado_stock),
            descontinuado: yes_no(item.descontinuado),
        }
    }
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "FECHA")]
    fecha: String,
    #[tabled(rename = "TIPO")]
    tipo: String,
    #[tabled(rename = "CANT.")]
    cantidad: i32,
    #[tabled(rename = "UBICACIÓN")]
    ubicacion: String,
    #[tabled(rename = "RESPONSABLE")]
    responsable: String,
    #[tabled(rename = "ACUMULADO")]
    acumulado: String,
}

pub async fn run(app: &mut App, cmd: InventoryCommands) -> AppResult<()> {
    app.require(Route::Inventario)?;
    let ctx = app.context().await?;

    match cmd {
        InventoryCommands::List(args) => {
            let params = InventoryParams {
                page: PageRequest::new(args.page, args.limit),
                order_by: args.order_by,
                direction: if args.desc { Direction::Desc } else { Direction::Asc },
                search: args.search,
                estado_stock: args.estado,
                descontinuado: args.descontinuado,
                is_new: args.nuevos,
            };
            let location = app.session.location_id();
            let page = app
                .queries
                .inventory(&ctx, location.as_deref(), &params)
                .await?;
            print_page(&page, |item| InventoryRow::from(item));
        }
        InventoryCommands::All => {
            let location = app.session.location_id();
            let items = app
                .queries
                .inventory
                .all_items(&ctx, location.as_deref())
                .await?;
            print_table(items.iter().map(InventoryRow::from).collect());
        }
        InventoryCommands::Search { term } => {
            let location = app.location()?;
            let items = app
                .queries
                .inventory
                .search(&ctx, Some(&location), &term)
                .await?;
            print_table(items.iter().map(InventoryRow::from).collect());
        }
        InventoryCommands::History { referencia, page } => {
            let history = app
                .queries
                .inventory
                .movement_history(&ctx, &referencia, page)
                .await?;
            print_table(
                history
                    .items
                    .iter()
                    .map(|h| HistoryRow {
                        fecha: day(&h.fecha_movimiento),
                        tipo: h.tipo_movimiento.clone(),
                        cantidad: h.cantidad,
                        ubicacion: opt(&h.nombre_localizacion),
                        responsable: opt(&h.usuario_responsable),
                        acumulado: h
                            .stock_acumulado
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    })
                    .collect(),
            );
            if let Some(next) = history.next_page {
                println!("Siguiente página: --page {}", next);
            }
        }
        InventoryCommands::Add(args) => {
            let item = NewInventoryItem {
                id_repuesto: args.id_repuesto,
                id_localizacion: app.location()?,
                cantidad: args.cantidad,
                posicion: args.posicion,
                nuevo_hasta: args.nuevo_hasta,
            };
            app.queries.create_inventory_item(&ctx, &item).await?;
            app.notifier.success("Repuesto agregado al inventario");
        }
        InventoryCommands::Update(args) => {
            let current = app.queries.inventory.get(&ctx, &args.id_inventario).await?;
            let update = apply_update(InventoryUpdate::from_item(&current), args);
            app.queries.update_inventory_item(&ctx, &update).await?;
            app.notifier.success("Inventario actualizado");
        }
    }
    Ok(())
}

fn apply_update(mut update: InventoryUpdate, args: UpdateArgs) -> InventoryUpdate {
    if let Some(stock) = args.stock {
        update.stock_actual = stock;
    }
    if let Some(posicion) = args.posicion {
        update.posicion = posicion;
    }
    if let Some(minimo) = args.cantidad_minima {
        update.cantidad_minima = minimo;
    }
    if let Some(descontinuado) = args.descontinuado {
        update.descontinuado = descontinuado;
    }
    if let Some(tipo) = args.tipo {
        update.tipo = tipo;
    }
    if args.fecha_estimada.is_some() {
        update.fecha_estimada = args.fecha_estimada.filter(|f| !f.is_empty());
    }
    if args.nuevo_hasta.is_some() {
        update.nuevo_hasta = args.nuevo_hasta.filter(|n| !n.is_empty());
    }
    update
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update() -> InventoryUpdate {
        InventoryUpdate {
            id_inventario: "i-1".to_string(),
            stock_actual: 4,
            posicion: "A1".to_string(),
            cantidad_minima: 2,
            descontinuado: false,
            tipo: "Frenos".to_string(),
            fecha_estimada: Some("2024-06-01".to_string()),
            nuevo_hasta: None,
        }
    }

    #[test]
    fn test_apply_update_overrides_given_fields_only() {
        let args = UpdateArgs {
            id_inventario: "i-1".to_string(),
            stock: Some(9),
            posicion: None,
            cantidad_minima: None,
            descontinuado: Some(true),
            tipo: None,
            fecha_estimada: Some(String::new()),
            nuevo_hasta: None,
        };
        let updated = apply_update(update(), args);
        assert_eq!(updated.stock_actual, 9);
        assert!(updated.descontinuado);
        assert_eq!(updated.posicion, "A1");
        assert_eq!(updated.tipo, "Frenos");
        assert_eq!(updated.fecha_estimada, None);
    }
}
