pub mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod memory;
    pub mod postgres;
    pub mod schema;
    pub mod store;
    #[cfg(test)]
    pub mod testing;
}
pub mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
pub mod queue {
    pub mod jobs;
    pub mod mailer;
    pub mod queue;
    pub mod redis_queue;
    pub mod schedule;
    pub mod tasks;
    pub mod worker;
}
pub mod api;
pub mod cli;
pub mod config;
pub mod constants;
pub mod state;

pub use authentication::*;
pub use constants::*;
pub use database::*;
