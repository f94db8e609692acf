//! Background tasks

pub mod escalation_sweep;
