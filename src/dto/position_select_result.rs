use sqlx::sqlite::SqliteRow;
use sqlx::FromRow;
use sqlx::Row;

use super::IssSample;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PositionSelectResult {
    pub id: i64,
    pub sample: IssSample,
    pub date: String,
    pub time: String,
    pub speed: Option<i64>,
}

impl FromRow<'_, SqliteRow> for PositionSelectResult {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(PositionSelectResult {
            id: row.try_get("id")?,
            sample: IssSample {
                latitude: row.try_get("latitude")?,
                longitude: row.try_get("longitude")?,
                timestamp: row.try_get("timestamp")?,
            },
            date: row.try_get("date")?,
            time: row.try_get("time")?,
            speed: row.try_get("speed")?,
        })
    }
}
