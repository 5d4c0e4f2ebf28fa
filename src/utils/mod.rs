//! Internal utility helpers.

pub(crate) mod serde;
