pub mod analysis_service;
pub mod image_service;
pub mod search_service;
pub mod types;
pub mod user_service;
pub mod validation;

pub use analysis_service::{AnalysisMode, AnalysisService};
pub use image_service::{ImageService, NewUpload};
pub use search_service::SearchService;
pub use types::*;
pub use user_service::UserService;
pub use validation::Pagination;
