pub mod clean;
pub mod init;
pub mod ps;
pub mod update;
