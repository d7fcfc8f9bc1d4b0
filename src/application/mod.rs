//! Application-level contracts between the search subsystem and its
//! collaborators.

pub mod repos;
