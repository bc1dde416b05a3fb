pub mod cli;
pub mod lifecycle;
pub mod relay;
pub mod request;
pub mod server;
pub mod worker;
