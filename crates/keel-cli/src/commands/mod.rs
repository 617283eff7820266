//! CLI command implementations

pub(crate) mod common;
pub(crate) mod down;
pub(crate) mod force;
pub(crate) mod goto;
pub(crate) mod status;
pub(crate) mod steps;
pub(crate) mod unlock;
pub(crate) mod up;
pub(crate) mod verify;
pub(crate) mod version;
