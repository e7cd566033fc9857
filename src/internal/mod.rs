//! Implementation details shared by the public modules but not part of the API.

pub(crate) mod stack;
