pub mod logger;
pub mod packet;
