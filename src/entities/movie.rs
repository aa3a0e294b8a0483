use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "movies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub movie_id: i32,
    pub title: String,
    pub genres: String,
    #[sea_orm(unique)]
    pub imdb_id: Option<i64>,
    pub is_adult: Option<bool>,
    pub runtime_min: Option<i32>,
    #[sea_orm(column_type = "Double", nullable)]
    pub avg_rating_imdb: Option<f64>,
    pub num_votes_imdb: Option<i64>,
    #[sea_orm(column_type = "Double", nullable)]
    pub avg_rating_users: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
