//! # bmi-id
//!
//! Row identifiers and derived storage names for BMI.
//!
//! ## Derived names
//!
//! Every image row owned by BMI is backed by a storage object (and, when
//! mounted, an iSCSI target) whose name is derived from the deployment uid
//! and the row id: `{uid}img{id}`.
//!
//! Examples:
//! - uid `4`, image id `12` -> `4img12`
//! - uid `0`, image id `7` -> `0img7`
//!
//! The uid segment is numeric, so the `img` marker occurs exactly once and
//! the id can be recovered from any storage or target name with
//! [`extract_id`].

mod error;
mod macros;
mod naming;
mod types;

pub use error::IdError;
pub use naming::{extract_id, StorageName, IMAGE_MARKER};
pub use types::*;
