pub mod actor;
pub mod award;
pub mod movie;
pub mod movie_actor;
