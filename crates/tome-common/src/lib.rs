pub mod errors;
pub mod events;
pub mod id;

pub use errors::{ConfigError, TomeError};
pub use events::{AppEvent, EventBus};
pub use id::{new_id, new_request_id};

pub type Result<T> = std::result::Result<T, TomeError>;
