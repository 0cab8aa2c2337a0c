pub mod analyze;
pub mod export;
pub mod frame;
pub mod info;
pub mod init;
pub mod validate;
