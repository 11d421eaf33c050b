mod account_service_impl;
mod article_service_impl;
mod auth_service_impl;
mod comment_service_impl;
mod jwt_codec;
mod media_service_impl;
mod password_hasher;
mod verification_service_impl;

pub use account_service_impl::*;
pub use article_service_impl::*;
pub use auth_service_impl::*;
pub use comment_service_impl::*;
pub use jwt_codec::*;
pub use media_service_impl::*;
pub use password_hasher::*;
pub use verification_service_impl::*;
