mod store_error;

pub use store_error::*;

// store

mod media_store;
mod token_store;
mod verification_store;

pub use media_store::*;
pub use token_store::*;
pub use verification_store::*;

// repo

mod article_repo;
mod comment_repo;
mod content_index;
mod user_repo;

pub use article_repo::*;
pub use comment_repo::*;
pub use content_index::*;
pub use user_repo::*;

// outbound

mod mail_sender;

pub use mail_sender::*;
