pub mod agent;
pub mod catalog;
pub mod error;
pub mod figure;
pub mod frame;
pub mod loader;
pub mod models;
pub mod profile;
pub mod sandbox;
pub mod schema;
pub mod store;
pub mod workbench;

pub use error::AnalysisError;
pub use store::CatalogStore;
pub use workbench::Workbench;
