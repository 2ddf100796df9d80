pub mod attach;
pub mod audit;
pub mod dispatch;
pub mod init;
pub mod schema;
pub mod seq;
pub mod settings;
pub mod shared;
