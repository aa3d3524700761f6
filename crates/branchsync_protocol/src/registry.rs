//! The entity registry: the closed set of replicable entity kinds.
//!
//! Anything outside this registry is invisible to the sync engine on both
//! sides. Lookups go through [`EntityKind::parse`] so the allowlist is
//! enforced by the type system rather than by string comparison at call
//! sites.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A replicable entity kind.
///
/// Wire names are fixed and case-sensitive. The declaration order is the
/// scan order used by both push batching and collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Product catalog entries (`products`).
    Product,
    /// Product variants (`product_variants`).
    ProductVariant,
    /// Product batches (`product_batches`).
    ProductBatch,
    /// Categories (`categories`).
    Category,
    /// Suppliers (`suppliers`).
    Supplier,
    /// Stock locations (`stock_locations`).
    StockLocation,
    /// Inventory movements (`inventory_movements`).
    InventoryMovement,
    /// Sales (`sales`).
    Sale,
    /// Sale line items (`sale_items`).
    SaleItem,
    /// Sale payments (`sale_payments`).
    SalePayment,
    /// Users (`users`).
    User,
    /// Roles (`roles`).
    Role,
    /// Permissions (`permissions`).
    Permission,
    /// Settings (`settings`).
    Setting,
}

impl EntityKind {
    /// All replicable kinds, in scan order.
    pub const ALL: [EntityKind; 14] = [
        EntityKind::Product,
        EntityKind::ProductVariant,
        EntityKind::ProductBatch,
        EntityKind::Category,
        EntityKind::Supplier,
        EntityKind::StockLocation,
        EntityKind::InventoryMovement,
        EntityKind::Sale,
        EntityKind::SaleItem,
        EntityKind::SalePayment,
        EntityKind::User,
        EntityKind::Role,
        EntityKind::Permission,
        EntityKind::Setting,
    ];

    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        self.descriptor().name
    }

    /// Parses a wire name; `None` for anything outside the registry.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.descriptor().name == name)
    }

    /// Returns the descriptor for this kind.
    pub fn descriptor(&self) -> &'static EntityDescriptor {
        match self {
            EntityKind::Product => &EntityDescriptor { kind: EntityKind::Product, name: "products", id_field: "id" },
            EntityKind::ProductVariant => &EntityDescriptor { kind: EntityKind::ProductVariant, name: "product_variants", id_field: "id" },
            EntityKind::ProductBatch => &EntityDescriptor { kind: EntityKind::ProductBatch, name: "product_batches", id_field: "id" },
            EntityKind::Category => &EntityDescriptor { kind: EntityKind::Category, name: "categories", id_field: "id" },
            EntityKind::Supplier => &EntityDescriptor { kind: EntityKind::Supplier, name: "suppliers", id_field: "id" },
            EntityKind::StockLocation => &EntityDescriptor { kind: EntityKind::StockLocation, name: "stock_locations", id_field: "id" },
            EntityKind::InventoryMovement => &EntityDescriptor { kind: EntityKind::InventoryMovement, name: "inventory_movements", id_field: "id" },
            EntityKind::Sale => &EntityDescriptor { kind: EntityKind::Sale, name: "sales", id_field: "id" },
            EntityKind::SaleItem => &EntityDescriptor { kind: EntityKind::SaleItem, name: "sale_items", id_field: "id" },
            EntityKind::SalePayment => &EntityDescriptor { kind: EntityKind::SalePayment, name: "sale_payments", id_field: "id" },
            EntityKind::User => &EntityDescriptor { kind: EntityKind::User, name: "users", id_field: "id" },
            EntityKind::Role => &EntityDescriptor { kind: EntityKind::Role, name: "roles", id_field: "id" },
            EntityKind::Permission => &EntityDescriptor { kind: EntityKind::Permission, name: "permissions", id_field: "id" },
            EntityKind::Setting => &EntityDescriptor { kind: EntityKind::Setting, name: "settings", id_field: "id" },
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes how one entity kind is replicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// The kind this descriptor belongs to.
    pub kind: EntityKind,
    /// Wire name (and table name) of the kind.
    pub name: &'static str,
    /// Field carrying the row identifier.
    pub id_field: &'static str,
}
