//! Chain link entity: records the successor spawned when a poll concluded.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "next_poll")]
pub struct Model {
    /// Source poll; a poll has at most one successor
    #[sea_orm(primary_key, auto_increment = false)]
    pub poll_id: String,

    /// Successor poll
    #[sea_orm(column_name = "next_poll", indexed)]
    pub next_poll_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::poll::Entity",
        from = "Column::PollId",
        to = "super::poll::Column::Id",
        on_delete = "Cascade"
    )]
    Source,

    #[sea_orm(
        belongs_to = "super::poll::Entity",
        from = "Column::NextPollId",
        to = "super::poll::Column::Id",
        on_delete = "Cascade"
    )]
    Successor,
}

impl Related<super::poll::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Source.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
