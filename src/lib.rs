pub mod absences;
pub mod aggregate;
pub mod allocator;
pub mod attendance;
pub mod callup;
pub mod canonical;
pub mod cli;
pub mod compose;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod prior;
pub mod reliability;
pub mod report;
pub mod responses;
pub mod signups;
pub mod synth;
pub mod tables;
