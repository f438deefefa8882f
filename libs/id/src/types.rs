//! Typed row ids for metadata store records.

use crate::define_row_id;

define_row_id!(ProjectId);
define_row_id!(ImageId);
