pub mod init;
pub mod open;
