//! Data sources

mod static_web_app;

pub use static_web_app::StaticWebAppDataSource;
