mod account_service;
mod article_service;
mod auth_service;
mod comment_service;
mod media_service;
mod verification_service;

pub use account_service::*;
pub use article_service::*;
pub use auth_service::*;
pub use comment_service::*;
pub use media_service::*;
pub use verification_service::*;
