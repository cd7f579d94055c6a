//! Additional documentation

pub mod troubleshooting;
