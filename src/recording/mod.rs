//! Recording (§4.E–§4.G): the state machine driven by captured frames, the
//! three-way metadata merge, and the per-session weapon detection window.
//! The use case (module F) is the only task that mutates a
//! [`context::RecordingContext`]; phase handlers and weapon detection only
//! ever see it by exclusive reference or by value.

pub mod commands;
pub mod context;
pub mod merger;
pub mod phase_handlers;
pub mod session_service;
pub mod use_case;
pub mod weapon_detection;
