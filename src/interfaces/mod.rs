//! Adapters between the domain model and external representations.

pub mod nvp;
