//! Core business logic for Tollgate.
//!
//! This crate contains pure billing logic with ZERO database dependencies.
//! The charging rules live here; persistence lives in `tollgate-db`.
//!
//! # Modules
//!
//! - `billing` - Per-connection minute metering and the clock it reads

pub mod billing;
