pub mod auth_service;
pub mod cart_service;
pub mod count_service;
pub mod import_service;
pub mod inventory_service;
pub mod movements_service;
pub mod notifications_service;
pub mod orders_service;
pub mod requests_service;
pub mod spares_service;
pub mod warranties_service;

pub use auth_service::AuthService;
pub use cart_service::{CartRepository, CartWorkflow, PgCartRepository, SubmitRequest};
pub use count_service::CountService;
pub use import_service::{run_import, ImportReport, RowImporter, SpareImporter};
pub use inventory_service::InventoryService;
pub use movements_service::MovementsService;
pub use notifications_service::NotificationsService;
pub use orders_service::OrdersService;
pub use requests_service::RequestsService;
pub use spares_service::{SparePartWriter, SparesService};
pub use warranties_service::WarrantiesService;
