//! Core abstractions shared by the acquisition and network units.
//!
//! - [`radio::RadioCollaborator`]: Trait to implement for new radio hardware
//! - [`power::PowerControl`]: OS reboot / power-off collaborator
//! - [`directive::DirectiveCell`]: Single-slot streaming instruction
//! - [`types`]: Sample batches, queue frames, control commands, quit signal

pub mod directive;
pub mod power;
pub mod radio;
pub mod types;
