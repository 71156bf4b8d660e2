//! Infrastructure implementations of domain traits

pub mod email;
