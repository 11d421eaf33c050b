mod article_repo_mysql;
mod comment_repo_mysql;
mod content_index_mysql;
mod user_repo_mysql;

pub use article_repo_mysql::*;
pub use comment_repo_mysql::*;
pub use content_index_mysql::*;
pub use user_repo_mysql::*;

mod util;
