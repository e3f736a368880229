//! Server wiring: router assembly, health endpoint, shutdown handling and demo seeding

mod health;
pub mod seed;
mod server;
mod shutdown;

pub use health::*;
pub use server::*;
pub use shutdown::*;
