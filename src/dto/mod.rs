mod iss_sample;
mod position_select_result;
mod returning_id;

pub use iss_sample::IssSample;
pub use position_select_result::PositionSelectResult;
pub use returning_id::ReturningId;
