//! ETL job triggering

pub mod client;
pub mod params;

pub use client::{JobTrigger, RestJobClient, TriggerOutcome};
pub use params::{build, EtlParameterSet};
