mod client;
mod fields;

pub use client::*;
pub use fields::*;
