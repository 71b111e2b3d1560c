#[macro_use]
extern crate lazy_static;

pub mod element;
pub mod permutation;
pub mod quaternions;
pub mod strong;
pub mod system;
pub mod environment;
pub mod isomorphism;
pub mod alignment;
pub mod search;
pub mod groups;
pub mod config;
pub mod uniqueness;
