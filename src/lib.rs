// Library surface for the binary, headless integration tests and reuse.
pub mod app;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod controller;
pub mod corpus;
pub mod history;
pub mod metrics;
pub mod runtime;
pub mod session;
pub mod stats_worker;
pub mod storage;
pub mod ui;
