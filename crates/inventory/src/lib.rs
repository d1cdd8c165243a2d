//! Cylinder inventory domain module (event-sourced).
//!
//! This crate contains business rules for gas cylinders, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod cylinder;
pub mod spec;

pub use cylinder::{
    ChangeCylinderStatus, Cylinder, CylinderCommand, CylinderDetailsUpdated, CylinderEvent,
    CylinderId, CylinderRegistered, CylinderRetired, CylinderStatusChanged, RegisterCylinder,
    RetireCylinder, UpdateCylinderDetails,
};
pub use spec::{CylinderSpec, CylinderStatus};
