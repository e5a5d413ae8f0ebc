#![no_std]
#[cfg(feature = "std")]
extern crate std;

mod mutex;
mod utils;

pub mod protocol;
pub mod frame;
pub mod ring;
pub mod link;
pub mod role;
pub mod slots;
pub mod config;
pub mod hooks;
pub mod station;
#[cfg(feature = "std")]
pub mod mock;

pub use config::Config;
pub use hooks::Hooks;
pub use link::{Port, Line, Word, Direction};
pub use station::{Station, Error};
