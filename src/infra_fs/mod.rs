mod local_media_files;

pub use local_media_files::*;
