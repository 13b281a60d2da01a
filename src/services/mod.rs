//! Application services sitting between the handlers and the repository.

pub mod category_service;
pub mod request_service;
pub mod user_provider;

pub use category_service::CategoryService;
pub use request_service::RequestService;
pub use user_provider::UserProviderService;
