pub mod app_state;
pub mod config;
pub mod error;
pub mod records;
pub mod retention;
pub mod scheduler;
pub mod server;
pub mod storage;

pub mod prelude {
    pub use crate::error::{Error, Result};
}
