//! Index buffer generation and remapping

pub mod generator;
