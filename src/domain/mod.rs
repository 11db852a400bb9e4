//! Core value types and the recording state machine (§3 of the design).

pub mod asset;
pub mod events;
pub mod frame;
pub mod game_mode;
pub mod judgement;
pub mod match_kind;
pub mod metadata;
pub mod rate;
pub mod result;
pub mod rule;
pub mod stage;
pub mod state_machine;
