pub mod backend;
pub mod error;
mod location;
mod progress;
mod upload;

pub use crate::backend::ObjectStore;
pub use crate::location::ObjectLocation;
pub use crate::progress::{byte_count_decimal, report};
pub use crate::upload::{CONTENT_TYPE, LINK_EXPIRY, UploadReceipt, Uploader};
use std::sync::Arc;

pub type StoreHandle = Arc<dyn ObjectStore>;
