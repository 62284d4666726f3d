//! Test Helper Utilities
//!
//! Shared fixtures for the boardsync-engine integration suites

#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::{
    card_with, plain_board, property_of, proposal, proposal_board, relation_property,
    rubric_step, step_property, test_env, TestEnv,
};
