use jiff::Timestamp;
use sea_orm::prelude::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    entities::{actor, award, movie},
    error::{AppError, AppResult},
    id::Identified,
};

const MIN_YEAR: i32 = 1870;
const MAX_YEAR: i32 = 9999;

/// Which rows a read may see. Logically deleted movies are only visible with
/// `WithDeleted`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Scope {
    #[default]
    Active,
    WithDeleted,
}

impl Scope {
    pub fn from_flag(include_deleted: bool) -> Self {
        if include_deleted { Scope::WithDeleted } else { Scope::Active }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

/// A movie that has not been stored yet. `id` stays nil unless the caller
/// picks one.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewMovie {
    #[serde(default)]
    pub id: Uuid,
    pub title: String,
    pub year: Option<i32>,
    pub director: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub rating: Option<Decimal>,
    #[serde(default)]
    pub actor_ids: Vec<Uuid>,
}

impl NewMovie {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Default::default() }
    }

    pub(crate) fn normalize(&mut self) -> AppResult<()> {
        self.title = required_text("title", &self.title)?;
        validate_year(self.year)?;
        self.rating = normalize_rating(self.rating)?;
        Ok(())
    }
}

impl Identified for NewMovie {
    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

/// Partial update of a movie's descriptive fields. Absent fields are kept.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MovieUpdate {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub director: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub rating: Option<Decimal>,
}

impl MovieUpdate {
    pub(crate) fn normalize(&mut self) -> AppResult<()> {
        if let Some(title) = &self.title {
            self.title = Some(required_text("title", title)?);
        }
        validate_year(self.year)?;
        self.rating = normalize_rating(self.rating)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewActor {
    #[serde(default)]
    pub id: Uuid,
    pub name: String,
}

impl Identified for NewActor {
    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewAward {
    #[serde(default)]
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub year: Option<i32>,
}

impl Identified for NewAward {
    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActorSummary {
    pub id: Uuid,
    pub name: String,
}

impl From<actor::Model> for ActorSummary {
    fn from(m: actor::Model) -> Self {
        Self { id: m.id, name: m.name }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AwardSummary {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub year: Option<i32>,
}

impl From<award::Model> for AwardSummary {
    fn from(m: award::Model) -> Self {
        Self { id: m.id, name: m.name, category: m.category, year: m.year }
    }
}

/// A stored movie with its relationships, as exchanged with clients.
#[derive(Clone, Debug, Serialize)]
pub struct MovieDetails {
    pub id: Uuid,
    pub title: String,
    pub year: Option<i32>,
    pub director: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub rating: Option<Decimal>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
    pub actors: Vec<ActorSummary>,
    pub awards: Vec<AwardSummary>,
}

impl MovieDetails {
    pub fn from_parts(
        movie: movie::Model,
        actors: Vec<actor::Model>,
        awards: Vec<award::Model>,
    ) -> AppResult<Self> {
        Ok(Self {
            id: movie.id,
            title: movie.title,
            year: movie.year,
            director: movie.director,
            genre: movie.genre,
            description: movie.description,
            rating: movie.rating.map(one_digit),
            created_at: from_millis(movie.created_at)?,
            updated_at: from_millis(movie.updated_at)?,
            deleted_at: movie.deleted_at.map(from_millis).transpose()?,
            actors: actors.into_iter().map(ActorSummary::from).collect(),
            awards: awards.into_iter().map(AwardSummary::from).collect(),
        })
    }
}

pub(crate) fn required_text(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

pub(crate) fn validate_year(year: Option<i32>) -> AppResult<()> {
    match year {
        Some(y) if !(MIN_YEAR..=MAX_YEAR).contains(&y) => Err(AppError::Validation(format!(
            "year must be between {MIN_YEAR} and {MAX_YEAR}"
        ))),
        _ => Ok(()),
    }
}

/// Rounds to one fractional digit and enforces the `decimal(3,1)` range.
fn normalize_rating(rating: Option<Decimal>) -> AppResult<Option<Decimal>> {
    let Some(rating) = rating else {
        return Ok(None);
    };
    let rating = one_digit(rating);
    if rating.is_sign_negative() || rating > Decimal::new(999, 1) {
        return Err(AppError::Validation("rating must be between 0.0 and 99.9".to_string()));
    }
    Ok(Some(rating))
}

/// SQLite may hand back `8.0` as the integer `8`, so the scale is restored
/// along with the rounding.
fn one_digit(rating: Decimal) -> Decimal {
    let mut rating = rating.round_dp(1);
    rating.rescale(1);
    rating
}

fn from_millis(ms: i64) -> AppResult<Timestamp> {
    Timestamp::from_millisecond(ms).map_err(|e| AppError::Other(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_trimmed_and_required() {
        let mut movie = NewMovie::new("  Inception ");
        movie.normalize().unwrap();
        assert_eq!(movie.title, "Inception");

        let mut blank = NewMovie::new("   ");
        assert!(matches!(blank.normalize(), Err(AppError::Validation(_))));
    }

    #[test]
    fn rating_is_rounded_to_one_digit() {
        let mut movie = NewMovie { rating: Some(Decimal::new(876, 2)), ..NewMovie::new("Heat") };
        movie.normalize().unwrap();
        assert_eq!(movie.rating, Some(Decimal::new(88, 1)));
    }

    #[test]
    fn whole_rating_keeps_one_fractional_digit() {
        let mut movie = NewMovie { rating: Some(Decimal::from(8)), ..NewMovie::new("Heat") };
        movie.normalize().unwrap();
        assert_eq!(movie.rating.unwrap().to_string(), "8.0");
    }

    #[test]
    fn rating_out_of_range_is_rejected() {
        for bad in [Decimal::new(-1, 1), Decimal::new(1000, 1), Decimal::new(9996, 2)] {
            let mut movie = NewMovie { rating: Some(bad), ..NewMovie::new("Heat") };
            assert!(movie.normalize().is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn implausible_year_is_rejected() {
        let mut movie = NewMovie { year: Some(12), ..NewMovie::new("Heat") };
        assert!(movie.normalize().is_err());

        let mut update = MovieUpdate { year: Some(2010), ..Default::default() };
        assert!(update.normalize().is_ok());
    }

    #[test]
    fn missing_id_deserializes_as_nil() {
        let movie: NewMovie =
            serde_json::from_str(r#"{"title":"Inception","year":2010}"#).unwrap();
        assert!(movie.id.is_nil());
        assert!(movie.actor_ids.is_empty());
    }

    #[test]
    fn scope_from_flag() {
        assert_eq!(Scope::from_flag(false), Scope::Active);
        assert_eq!(Scope::from_flag(true), Scope::WithDeleted);
    }
}
