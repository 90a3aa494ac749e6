pub mod check;
pub mod export;
pub mod init_config;
pub mod inspect;
