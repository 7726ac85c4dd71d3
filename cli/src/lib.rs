//! mkdtboimg - pack and inspect DTBO/ACPIO images.

pub mod commands;
pub mod output;
