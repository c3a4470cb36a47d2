//! Customer assignment entity - Which employee referred or manages which customer.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Customer assignment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customer_assignments")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Assigned employee
    pub employee_id: i64,
    /// Assigned customer
    pub customer_id: i64,
    /// When the assignment was made
    pub created_at: DateTimeUtc,
}

/// Each assignment belongs to one customer
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Assigned customer
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
