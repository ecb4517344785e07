//! Create poll, choice, vote and next_poll tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Poll::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Poll::Id)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Poll::Title).text().not_null())
                    .col(ColumnDef::new(Poll::Type).string_len(16).not_null())
                    .col(ColumnDef::new(Poll::TargetVotes).integer().not_null())
                    .col(
                        ColumnDef::new(Poll::CastVotes)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Poll::AutoCreate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Poll::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(Poll::TargetVotes).gte(1))
                    .check(Expr::col(Poll::CastVotes).gte(0))
                    .check(Expr::col(Poll::CastVotes).lte(Expr::col(Poll::TargetVotes)))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Choice::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Choice::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Choice::PollId).text().not_null())
                    .col(ColumnDef::new(Choice::Content).text().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_choice_poll")
                            .from(Choice::Table, Choice::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Target of the composite vote -> choice key
        manager
            .create_index(
                Index::create()
                    .name("idx_choice_poll_id_id")
                    .table(Choice::Table)
                    .col(Choice::PollId)
                    .col(Choice::Id)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Vote::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Vote::PollId).text().not_null())
                    .col(ColumnDef::new(Vote::Voter).text().not_null())
                    .col(ColumnDef::new(Vote::ChoiceId).integer().not_null())
                    .primary_key(
                        Index::create()
                            .col(Vote::PollId)
                            .col(Vote::Voter)
                            .col(Vote::ChoiceId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_poll")
                            .from(Vote::Table, Vote::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    // A vote may only reference a choice of its own poll
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_choice")
                            .from(Vote::Table, (Vote::PollId, Vote::ChoiceId))
                            .to(Choice::Table, (Choice::PollId, Choice::Id))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (poll_id, voter) for the already-voted check
        manager
            .create_index(
                Index::create()
                    .name("idx_vote_poll_id_voter")
                    .table(Vote::Table)
                    .col(Vote::PollId)
                    .col(Vote::Voter)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NextPoll::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NextPoll::PollId)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(NextPoll::NextPoll).text().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_next_poll_source")
                            .from(NextPoll::Table, NextPoll::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_next_poll_successor")
                            .from(NextPoll::Table, NextPoll::NextPoll)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique: a poll is the successor of at most one predecessor
        manager
            .create_index(
                Index::create()
                    .name("idx_next_poll_next_poll")
                    .table(NextPoll::Table)
                    .col(NextPoll::NextPoll)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NextPoll::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Vote::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Choice::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Poll::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
    Title,
    Type,
    TargetVotes,
    CastVotes,
    AutoCreate,
    CreatedAt,
}

#[derive(Iden)]
enum Choice {
    Table,
    Id,
    PollId,
    Content,
}

#[derive(Iden)]
enum Vote {
    Table,
    PollId,
    Voter,
    ChoiceId,
}

#[derive(Iden)]
enum NextPoll {
    Table,
    PollId,
    NextPoll,
}
