mod common;
mod import;
mod tiers;
mod trigger;
