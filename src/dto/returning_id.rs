use sqlx::FromRow;

#[derive(Clone, Debug, FromRow, Copy)]
pub struct ReturningId {
    pub id: i64,
}
