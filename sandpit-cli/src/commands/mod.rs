//! CLI command implementations.

pub mod build;
pub mod export;
pub mod init;
pub mod serve;

pub use build::build_document;
pub use export::export_download;
pub use init::init_project;
pub use serve::serve;
