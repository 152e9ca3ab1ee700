// Coordinates keep the decimal text the source reported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssSample {
    pub latitude: String,
    pub longitude: String,
    pub timestamp: i64,
}
