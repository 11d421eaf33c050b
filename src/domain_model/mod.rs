mod article;
mod cursor;
mod media;
mod unit;
mod user;
mod verification;

pub use article::*;
pub use cursor::*;
pub use media::*;
pub use unit::*;
pub use user::*;
pub use verification::*;
