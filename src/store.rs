use std::{collections::BTreeSet, sync::Arc};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    DbErr, ModelTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, SqlErr,
    TransactionTrait,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    entities::{actor, award, movie, movie_actor},
    error::{AppError, AppResult},
    id::{IdGenerator, assign_id},
    models::{
        ActorSummary, AwardSummary, MovieDetails, MovieUpdate, NewActor, NewAward, NewMovie, Page,
        Scope, required_text, validate_year,
    },
};

#[derive(Clone)]
pub struct MovieStore {
    db: DatabaseConnection,
    ids: Arc<dyn IdGenerator>,
}

impl MovieStore {
    pub fn new(db: DatabaseConnection, ids: Arc<dyn IdGenerator>) -> Self {
        Self { db, ids }
    }

    #[cfg(test)]
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Stores a new movie, assigning a time-ordered id first when the caller
    /// left it nil. Nothing is written if id generation fails.
    pub async fn create_movie(&self, mut new: NewMovie) -> AppResult<MovieDetails> {
        new.normalize()?;
        assign_id(&mut new, self.ids.as_ref()).inspect_err(|err| {
            warn!(title = %new.title, error = %err, "could not assign movie id");
        })?;

        let id = new.id;
        let actor_ids: BTreeSet<Uuid> = new.actor_ids.iter().copied().collect();
        let now = now_ms();

        let txn = self.db.begin().await?;

        if movie::Entity::find_by_id(id).one(&txn).await?.is_some() {
            return Err(AppError::Conflict(format!("movie {id} already exists")));
        }

        let model = movie::ActiveModel {
            id: Set(id),
            title: Set(new.title),
            year: Set(new.year),
            director: Set(new.director),
            genre: Set(new.genre),
            description: Set(new.description),
            rating: Set(new.rating),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        };
        movie::Entity::insert(model)
            .exec_without_returning(&txn)
            .await
            .map_err(|err| conflict_on_duplicate(err, || format!("movie {id} already exists")))?;

        for actor_id in actor_ids {
            if actor::Entity::find_by_id(actor_id).one(&txn).await?.is_none() {
                return Err(AppError::NotFound(format!("actor {actor_id}")));
            }
            insert_link(&txn, id, actor_id).await?;
        }

        txn.commit().await?;
        debug!(id = %id, "created movie");

        self.get_movie(id, Scope::WithDeleted).await
    }

    pub async fn get_movie(&self, id: Uuid, scope: Scope) -> AppResult<MovieDetails> {
        let movie = self.find_movie(id, scope).await?;
        self.details(movie).await
    }

    /// Movies in creation order. UUIDv7 keys sort by creation time, so the
    /// primary key doubles as the ordering column.
    pub async fn list_movies(&self, scope: Scope, page: Page) -> AppResult<Vec<MovieDetails>> {
        let movies = scoped(scope)
            .order_by_asc(movie::Column::Id)
            .limit(page.limit)
            .offset(page.offset.min(MAX_OFFSET))
            .all(&self.db)
            .await?;

        debug!(count = movies.len(), ?scope, "listed movies");

        let mut out = Vec::with_capacity(movies.len());
        for movie in movies {
            out.push(self.details(movie).await?);
        }
        Ok(out)
    }

    /// Updates descriptive fields. The id is never touched and no id is
    /// assigned here.
    pub async fn update_movie(&self, id: Uuid, mut update: MovieUpdate) -> AppResult<MovieDetails> {
        update.normalize()?;
        let existing = self.find_movie(id, Scope::Active).await?;

        let mut model = existing.into_active_model();
        if let Some(title) = update.title {
            model.title = Set(title);
        }
        if let Some(year) = update.year {
            model.year = Set(Some(year));
        }
        if let Some(director) = update.director {
            model.director = Set(Some(director));
        }
        if let Some(genre) = update.genre {
            model.genre = Set(Some(genre));
        }
        if let Some(description) = update.description {
            model.description = Set(Some(description));
        }
        if let Some(rating) = update.rating {
            model.rating = Set(Some(rating));
        }
        model.updated_at = Set(now_ms());

        let updated = model.update(&self.db).await?;
        debug!(id = %id, "updated movie");

        self.details(updated).await
    }

    /// Marks a live movie as deleted. The row and its links stay in place.
    pub async fn soft_delete_movie(&self, id: Uuid) -> AppResult<()> {
        let existing = self.find_movie(id, Scope::Active).await?;

        let mut model = existing.into_active_model();
        model.deleted_at = Set(Some(now_ms()));
        model.update(&self.db).await?;

        info!(id = %id, "soft-deleted movie");
        Ok(())
    }

    pub async fn restore_movie(&self, id: Uuid) -> AppResult<MovieDetails> {
        let existing = self.find_movie(id, Scope::WithDeleted).await?;
        if existing.deleted_at.is_none() {
            return self.details(existing).await;
        }

        let mut model = existing.into_active_model();
        model.deleted_at = Set(None);
        let restored = model.update(&self.db).await?;

        info!(id = %id, "restored movie");
        self.details(restored).await
    }

    pub async fn create_actor(&self, mut new: NewActor) -> AppResult<ActorSummary> {
        new.name = required_text("name", &new.name)?;
        assign_id(&mut new, self.ids.as_ref())?;

        if actor::Entity::find_by_id(new.id).one(&self.db).await?.is_some() {
            return Err(AppError::Conflict(format!("actor {} already exists", new.id)));
        }

        let new_id = new.id;
        let now = now_ms();
        let model = actor::ActiveModel {
            id: Set(new.id),
            name: Set(new.name),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let actor = model
            .insert(&self.db)
            .await
            .map_err(|err| conflict_on_duplicate(err, || format!("actor {new_id} already exists")))?;
        debug!(id = %actor.id, "created actor");

        Ok(actor.into())
    }

    /// Links an actor to a live movie. Linking twice is harmless.
    pub async fn link_actor(&self, movie_id: Uuid, actor_id: Uuid) -> AppResult<()> {
        self.find_movie(movie_id, Scope::Active).await?;
        if actor::Entity::find_by_id(actor_id).one(&self.db).await?.is_none() {
            return Err(AppError::NotFound(format!("actor {actor_id}")));
        }

        let existing = movie_actor::Entity::find()
            .filter(movie_actor::Column::MovieId.eq(movie_id))
            .filter(movie_actor::Column::ActorId.eq(actor_id))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Ok(());
        }

        insert_link(&self.db, movie_id, actor_id).await?;
        debug!(movie_id = %movie_id, actor_id = %actor_id, "linked actor");
        Ok(())
    }

    pub async fn create_award(&self, movie_id: Uuid, mut new: NewAward) -> AppResult<AwardSummary> {
        new.name = required_text("name", &new.name)?;
        validate_year(new.year)?;
        self.find_movie(movie_id, Scope::Active).await?;
        assign_id(&mut new, self.ids.as_ref())?;

        if award::Entity::find_by_id(new.id).one(&self.db).await?.is_some() {
            return Err(AppError::Conflict(format!("award {} already exists", new.id)));
        }

        let award_id = new.id;
        let now = now_ms();
        let model = award::ActiveModel {
            id: Set(new.id),
            movie_id: Set(Some(movie_id)),
            name: Set(new.name),
            category: Set(new.category),
            year: Set(new.year),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let award = model
            .insert(&self.db)
            .await
            .map_err(|err| conflict_on_duplicate(err, || format!("award {award_id} already exists")))?;
        debug!(id = %award.id, movie_id = %movie_id, "created award");

        Ok(award.into())
    }

    async fn find_movie(&self, id: Uuid, scope: Scope) -> AppResult<movie::Model> {
        scoped(scope)
            .filter(movie::Column::Id.eq(id))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("movie {id}")))
    }

    async fn details(&self, movie: movie::Model) -> AppResult<MovieDetails> {
        let actors = movie
            .find_related(actor::Entity)
            .order_by_asc(actor::Column::Name)
            .all(&self.db)
            .await?;
        let awards = movie
            .find_related(award::Entity)
            .order_by_asc(award::Column::Id)
            .all(&self.db)
            .await?;
        MovieDetails::from_parts(movie, actors, awards)
    }
}

/// Base query for movies. Every read goes through here so logically deleted
/// rows stay hidden unless the caller asks for them.
fn scoped(scope: Scope) -> Select<movie::Entity> {
    let query = movie::Entity::find();
    match scope {
        Scope::Active => query.filter(movie::Column::DeletedAt.is_null()),
        Scope::WithDeleted => query,
    }
}

/// Inserts a movie/actor link. A link that already exists counts as done.
async fn insert_link<C: ConnectionTrait>(db: &C, movie_id: Uuid, actor_id: Uuid) -> AppResult<()> {
    let link = movie_actor::ActiveModel {
        id: Default::default(),
        movie_id: Set(Some(movie_id)),
        actor_id: Set(Some(actor_id)),
    };
    match movie_actor::Entity::insert(link).exec(db).await {
        Ok(_) => Ok(()),
        Err(err) if is_unique_violation(&err) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Concurrent inserts can both pass the existence check; the key constraint
/// decides and the loser sees a conflict.
fn conflict_on_duplicate(err: DbErr, message: impl FnOnce() -> String) -> AppError {
    if is_unique_violation(&err) { AppError::Conflict(message()) } else { AppError::Db(err) }
}

/// Offsets are bound as signed 64-bit integers.
const MAX_OFFSET: u64 = i64::MAX as u64;

fn now_ms() -> i64 {
    jiff::Timestamp::now().as_millisecond()
}
