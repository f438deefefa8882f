//! Einstein: the BMI disk image orchestrator.
//!
//! Einstein provisions bare-metal nodes from copy-on-write RBD clones of
//! golden images. It keeps image metadata in SQLite, exposes disks as iSCSI
//! targets through tgt, checks and changes node network isolation through
//! HIL, and writes PXE boot files so a node boots its disk.
//!
//! Every storage object and iSCSI target is named `{uid}img{id}` after the
//! metadata row it belongs to (see [`bmi_id::StorageName`]).

pub mod api;
pub mod authz;
pub mod backends;
pub mod config;
pub mod db;
pub mod dhcp;
pub mod error;
pub mod hil;
pub mod iscsi;
pub mod mock;
pub mod orchestrator;
pub mod registration;
pub mod response;
pub mod state;
pub mod storage;

pub use error::BmiError;
pub use orchestrator::{Orchestrator, Settings};
pub use response::Response;
