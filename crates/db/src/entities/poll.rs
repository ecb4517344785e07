//! Poll entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How many choices a single voting event may select.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum PollKind {
    /// Exactly one choice per voting event.
    #[sea_orm(string_value = "single")]
    Single,
    /// Any non-empty subset of the poll's choices.
    #[sea_orm(string_value = "multiple")]
    Multiple,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    #[sea_orm(column_name = "type")]
    pub kind: PollKind,

    /// Number of voters after which the poll closes
    pub target_votes: i32,

    /// Number of committed voting events (voters, not selections)
    pub cast_votes: i32,

    /// Whether reaching the target spawns a successor poll
    pub auto_create: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::choice::Entity")]
    Choice,

    #[sea_orm(has_many = "super::vote::Entity")]
    Vote,
}

impl Related<super::choice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Choice.def()
    }
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
