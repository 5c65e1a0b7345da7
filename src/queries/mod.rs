pub mod cache;

pub use cache::{QueryCache, QueryFamily, DEFAULT_STALE_TIME};

use std::sync::Arc;

use serde_json::json;

use crate::db::AuthContext;
use crate::error::AppResult;
use crate::models::{
    CountClosure, CountHistoryItem, InventoryItem, InventoryParams, InventoryUpdate, Location,
    MovementFilters, MovementOutcome, NewInventoryItem, NewOrderFollow, NewTechnicalMovement,
    Notification, OrderFollow, Page, RequestHistoryItem, ScooterType, SparePart, SparePartChanges,
    SparePartInput, SparesParams, Technician, TechnicalMovement, Warranty, WarrantyDetails, WarrantyStatus,
};
use crate::services::{
    CountService, InventoryService, MovementsService, NotificationsService, OrdersService,
    RequestsService, SparePartWriter, SparesService, WarrantiesService,
};

/// Writes that make cached reads stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    SparePart,
    InventoryItem,
    TechnicalMovement,
    MovementDownloaded,
    Warranty,
    CountClosure,
    CartItem,
    RequestSubmitted,
    NotificationRead,
    OrderFollow,
}

impl Mutation {
    /// Families to drop after the mutation succeeds.
    pub fn invalidates(&self) -> &'static [QueryFamily] {
        match self {
            Mutation::SparePart => &[QueryFamily::Spares, QueryFamily::Inventory],
            Mutation::InventoryItem => &[QueryFamily::Inventory],
            Mutation::TechnicalMovement => &[QueryFamily::Movements, QueryFamily::Inventory],
            Mutation::MovementDownloaded => &[QueryFamily::Movements],
            Mutation::Warranty => &[QueryFamily::Warranties],
            Mutation::CountClosure => &[QueryFamily::Counts, QueryFamily::Inventory],
            Mutation::CartItem => &[QueryFamily::Cart],
            Mutation::RequestSubmitted => &[QueryFamily::Requests, QueryFamily::Cart],
            Mutation::NotificationRead => &[QueryFamily::Notifications],
            Mutation::OrderFollow => &[QueryFamily::Orders],
        }
    }
}

/// Cached reads over the entity services. Every write goes through here
/// so the families it touches are dropped afterwards.
#[derive(Clone)]
pub struct EntityQueries {
    cache: Arc<QueryCache>,
    pub spares: SparesService,
    pub inventory: InventoryService,
    pub movements: MovementsService,
    pub warranties: WarrantiesService,
    pub counts: CountService,
    pub notifications: NotificationsService,
    pub requests: RequestsService,
    pub orders: OrdersService,
}

impl EntityQueries {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cache: Arc<QueryCache>,
        spares: SparesService,
        inventory: InventoryService,
        movements: MovementsService,
        warranties: WarrantiesService,
        counts: CountService,
        notifications: NotificationsService,
        requests: RequestsService,
        orders: OrdersService,
    ) -> Self {
        Self {
            cache,
            spares,
            inventory,
            movements,
            warranties,
            counts,
            notifications,
            requests,
            orders,
        }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub async fn after(&self, mutation: Mutation) {
        self.cache.invalidate_all(mutation.invalidates()).await;
    }

    // Reads

    pub async fn spares(&self, ctx: &AuthContext, params: &SparesParams) -> AppResult<Page<SparePart>> {
        self.cache
            .fetch(QueryFamily::Spares, params, || self.spares.list(ctx, params))
            .await
    }

    pub async fn inventory(
        &self,
        ctx: &AuthContext,
        location_id: Option<&str>,
        params: &InventoryParams,
    ) -> AppResult<Page<InventoryItem>> {
        let key = json!({ "location": location_id, "params": params });
        self.cache
            .fetch(QueryFamily::Inventory, &key, || {
                self.inventory.list(ctx, location_id, params)
            })
            .await
    }

    pub async fn movements(
        &self,
        ctx: &AuthContext,
        filters: &MovementFilters,
    ) -> AppResult<Page<TechnicalMovement>> {
        self.cache
            .fetch(QueryFamily::Movements, filters, || self.movements.list(ctx, filters))
            .await
    }

    pub async fn warranties(&self, ctx: &AuthContext, location_id: &str) -> AppResult<Vec<Warranty>> {
        self.cache
            .fetch(QueryFamily::Warranties, location_id, || {
                self.warranties.dashboard(ctx, location_id)
            })
            .await
    }

    pub async fn count_history(
        &self,
        ctx: &AuthContext,
        location_id: &str,
    ) -> AppResult<Vec<CountHistoryItem>> {
        self.cache
            .fetch(QueryFamily::Counts, location_id, || self.counts.history(ctx, location_id))
            .await
    }

    pub async fn notifications(
        &self,
        ctx: &AuthContext,
        user_id: &str,
        location_id: Option<&str>,
        is_technician: bool,
    ) -> AppResult<Vec<Notification>> {
        let key = json!({
            "user": user_id,
            "location": location_id,
            "technician": is_technician,
        });
        self.cache
            .fetch(QueryFamily::Notifications, &key, || {
                self.notifications
                    .fetch(ctx, user_id, location_id, is_technician)
            })
            .await
    }

    pub async fn request_history(&self, ctx: &AuthContext) -> AppResult<Vec<RequestHistoryItem>> {
        self.cache
            .fetch(QueryFamily::Requests, &(), || self.requests.history(ctx))
            .await
    }

    pub async fn locations(&self, ctx: &AuthContext) -> AppResult<Vec<Location>> {
        self.cache
            .fetch(QueryFamily::Locations, &(), || self.requests.locations(ctx))
            .await
    }

    pub async fn technicians(&self, ctx: &AuthContext, location_id: &str) -> AppResult<Vec<Technician>> {
        self.cache
            .fetch(QueryFamily::Technicians, location_id, || {
                self.requests.technicians(ctx, location_id)
            })
            .await
    }

    pub async fn scooter_types(&self, ctx: &AuthContext) -> AppResult<Vec<ScooterType>> {
        self.cache
            .fetch(QueryFamily::ScooterTypes, &(), || self.orders.scooter_types(ctx))
            .await
    }

    pub async fn open_orders(&self, ctx: &AuthContext) -> AppResult<Vec<OrderFollow>> {
        self.cache
            .fetch(QueryFamily::Orders, &(), || self.orders.open_orders(ctx))
            .await
    }

    // Writes

    pub async fn create_spare(&self, ctx: &AuthContext, input: &SparePartInput) -> AppResult<SparePart> {
        let part = self.spares.create(ctx, input).await?;
        self.after(Mutation::SparePart).await;
        Ok(part)
    }

    pub async fn update_spare(
        &self,
        ctx: &AuthContext,
        id: &str,
        changes: &SparePartChanges,
    ) -> AppResult<SparePart> {
        let part = self.spares.update(ctx, id, changes).await?;
        self.after(Mutation::SparePart).await;
        Ok(part)
    }

    pub async fn delete_spare(&self, ctx: &AuthContext, id: &str) -> AppResult<()> {
        self.spares.delete(ctx, id).await?;
        self.after(Mutation::SparePart).await;
        Ok(())
    }

    pub async fn update_inventory_item(
        &self,
        ctx: &AuthContext,
        update: &InventoryUpdate,
    ) -> AppResult<serde_json::Value> {
        let result = self.inventory.update_item(ctx, update).await?;
        self.after(Mutation::InventoryItem).await;
        Ok(result)
    }

    pub async fn create_inventory_item(&self, ctx: &AuthContext, item: &NewInventoryItem) -> AppResult<()> {
        self.inventory.create_item(ctx, item).await?;
        self.after(Mutation::InventoryItem).await;
        Ok(())
    }

    pub async fn register_movement(
        &self,
        ctx: &AuthContext,
        movement: &NewTechnicalMovement,
    ) -> AppResult<MovementOutcome> {
        let outcome = self.movements.register(ctx, movement).await?;
        self.after(Mutation::TechnicalMovement).await;
        Ok(outcome)
    }

    pub async fn mark_movement_downloaded(&self, ctx: &AuthContext, id: &str) -> AppResult<()> {
        self.movements.mark_downloaded(ctx, id).await?;
        self.after(Mutation::MovementDownloaded).await;
        Ok(())
    }

    pub async fn update_warranty_status(
        &self,
        ctx: &AuthContext,
        id: &str,
        status: WarrantyStatus,
    ) -> AppResult<()> {
        self.warranties.update_status(ctx, id, status).await?;
        self.after(Mutation::Warranty).await;
        Ok(())
    }

    pub async fn update_warranty_details(
        &self,
        ctx: &AuthContext,
        id: &str,
        details: &WarrantyDetails,
    ) -> AppResult<()> {
        self.warranties.update_details(ctx, id, details).await?;
        self.after(Mutation::Warranty).await;
        Ok(())
    }

    pub async fn register_count_closure(
        &self,
        ctx: &AuthContext,
        closure: &CountClosure,
    ) -> AppResult<serde_json::Value> {
        let result = self.counts.register_closure(ctx, closure).await?;
        self.after(Mutation::CountClosure).await;
        Ok(result)
    }

    pub async fn mark_notification_read(&self, ctx: &AuthContext, id: &str) -> AppResult<()> {
        self.notifications.mark_as_read(ctx, id).await?;
        self.after(Mutation::NotificationRead).await;
        Ok(())
    }

    pub async fn create_order(&self, ctx: &AuthContext, order: &NewOrderFollow) -> AppResult<String> {
        let id = self.orders.create(ctx, order).await?;
        self.after(Mutation::OrderFollow).await;
        Ok(id)
    }
}
