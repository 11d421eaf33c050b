mod media_candidate_store_redis;
mod redis_client;
mod token_store_redis;
mod verification_store_redis;

pub use media_candidate_store_redis::*;
pub use redis_client::*;
pub use token_store_redis::*;
pub use verification_store_redis::*;
