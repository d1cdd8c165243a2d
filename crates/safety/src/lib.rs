//! Safety inspection domain module (event-sourced).
//!
//! Couriers file inspection records during delivery; records that found a hazard
//! carry a rectification workflow that staff close out with photo evidence.

pub mod record;

pub use record::{
    FileInspection, HazardLevel, InspectionFiled, RectificationUpdated, RectifyStatus,
    SafetyCommand, SafetyEvent, SafetyRecord, SafetyRecordId, UpdateRectification,
};
