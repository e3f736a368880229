pub mod enums;
pub mod error;
pub mod response;
pub mod schema;
pub mod state;
pub mod test_utils;
pub mod utils;

pub use enums::*;
pub use error::{CrmError, StoreError};
pub use response::ApiResponse;
pub use state::AppState;
