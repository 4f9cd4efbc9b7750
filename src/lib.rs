//! Library crate for home-dash-rs exposing reusable modules.
pub mod docker;
pub mod events;
pub mod netdetect;
pub mod nmap;
pub mod push;
pub mod scan;
pub mod server;
pub mod subs;
pub mod types;
