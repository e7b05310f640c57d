//! Port traits separating the domain from data sources, configuration and
//! report rendering.

pub mod config_port;
pub mod data_port;
pub mod report_port;
