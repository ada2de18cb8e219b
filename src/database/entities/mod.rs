pub mod common_types;
pub mod image_metadata;
pub mod images;
pub mod users;

pub use common_types::{AiProcessingStatus, StringList};
