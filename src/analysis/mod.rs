//! Passes over decoded kernels.

pub mod dependency;
