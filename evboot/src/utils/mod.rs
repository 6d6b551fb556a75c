// SPDX-License-Identifier: MIT

mod log;
pub mod progress;
pub mod string;

pub use log::*;
