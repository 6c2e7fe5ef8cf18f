//! Contract ABI bindings

pub mod bridge;
