pub mod refresh;

pub use refresh::{RefreshTokenRecord, RefreshTokenStore};
