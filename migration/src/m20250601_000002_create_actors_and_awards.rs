use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Actors::Table)
                    .if_not_exists()
                    .col(uuid(Actors::Id).primary_key())
                    .col(string(Actors::Name))
                    .col(big_integer(Actors::CreatedAt))
                    .col(big_integer(Actors::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Removing a movie or actor row clears the link instead of cascading.
        manager
            .create_table(
                Table::create()
                    .table(MovieActors::Table)
                    .if_not_exists()
                    .col(pk_auto(MovieActors::Id))
                    .col(uuid_null(MovieActors::MovieId))
                    .col(uuid_null(MovieActors::ActorId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_actors_movie")
                            .from(MovieActors::Table, MovieActors::MovieId)
                            .to(Movies::Table, Movies::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_actors_actor")
                            .from(MovieActors::Table, MovieActors::ActorId)
                            .to(Actors::Table, Actors::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movie_actors_unique")
                    .table(MovieActors::Table)
                    .col(MovieActors::MovieId)
                    .col(MovieActors::ActorId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Awards::Table)
                    .if_not_exists()
                    .col(uuid(Awards::Id).primary_key())
                    .col(uuid_null(Awards::MovieId))
                    .col(string(Awards::Name))
                    .col(string_null(Awards::Category))
                    .col(integer_null(Awards::Year))
                    .col(big_integer(Awards::CreatedAt))
                    .col(big_integer(Awards::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_awards_movie")
                            .from(Awards::Table, Awards::MovieId)
                            .to(Movies::Table, Movies::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_awards_movie_id")
                    .table(Awards::Table)
                    .col(Awards::MovieId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Awards::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(MovieActors::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Actors::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movies {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Actors {
    Table,
    Id,
    Name,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MovieActors {
    Table,
    Id,
    MovieId,
    ActorId,
}

#[derive(DeriveIden)]
enum Awards {
    Table,
    Id,
    MovieId,
    Name,
    Category,
    Year,
    CreatedAt,
    UpdatedAt,
}
