//! # Integration Flows

pub mod e2e_runtime;
pub mod flows;
