pub mod catalog;
pub mod classifier;
pub mod config;
pub mod credentials;
pub mod error;
pub mod history;
pub mod models;
pub mod normalize;
pub mod service;
pub mod tasks;
pub mod workflow;

pub use config::AppConfig;
pub use error::{RecommendError, RecommendResult};
pub use models::*;
pub use service::{AppState, build_router, create_app};
pub use workflow::{Recommender, Stage, build_recommendation_workflow};
