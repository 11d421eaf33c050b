mod log_mail_sender;

pub use log_mail_sender::*;
