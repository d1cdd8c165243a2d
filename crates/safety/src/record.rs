use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use gasline_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use gasline_events::Event;

/// Safety record identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SafetyRecordId(pub AggregateId);

impl SafetyRecordId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SafetyRecordId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardLevel {
    None,
    Low,
    Medium,
    High,
}

impl HazardLevel {
    pub const ALL: [HazardLevel; 4] = [
        HazardLevel::None,
        HazardLevel::Low,
        HazardLevel::Medium,
        HazardLevel::High,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HazardLevel::None => "none",
            HazardLevel::Low => "low",
            HazardLevel::Medium => "medium",
            HazardLevel::High => "high",
        }
    }

    pub fn needs_rectification(&self) -> bool {
        *self != HazardLevel::None
    }
}

impl core::fmt::Display for HazardLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for HazardLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HazardLevel::ALL
            .into_iter()
            .find(|h| h.as_str() == s.trim())
            .ok_or_else(|| DomainError::validation(format!("invalid hazard level: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RectifyStatus {
    Pending,
    Completed,
}

impl RectifyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RectifyStatus::Pending => "pending",
            RectifyStatus::Completed => "completed",
        }
    }
}

impl core::fmt::Display for RectifyStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for RectifyStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(RectifyStatus::Pending),
            "completed" => Ok(RectifyStatus::Completed),
            other => Err(DomainError::validation(format!(
                "invalid rectify status: {other}"
            ))),
        }
    }
}

/// Aggregate root: SafetyRecord.
///
/// # Invariants
/// - `rectify_status` is `Some` iff the hazard level is above `none`.
/// - `completed` is final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyRecord {
    id: SafetyRecordId,
    inspector_id: Option<UserId>,
    hazard_level: HazardLevel,
    rectify_status: Option<RectifyStatus>,
    rectify_photos: Vec<String>,
    version: u64,
    created: bool,
}

impl SafetyRecord {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SafetyRecordId) -> Self {
        Self {
            id,
            inspector_id: None,
            hazard_level: HazardLevel::None,
            rectify_status: None,
            rectify_photos: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn inspector_id(&self) -> Option<UserId> {
        self.inspector_id
    }

    pub fn hazard_level(&self) -> HazardLevel {
        self.hazard_level
    }

    pub fn rectify_status(&self) -> Option<RectifyStatus> {
        self.rectify_status
    }

    pub fn rectify_photos(&self) -> &[String] {
        &self.rectify_photos
    }
}

impl SafetyRecord {
    /// Stream type tag stored alongside every event of this aggregate.
    pub const AGGREGATE_TYPE: &'static str = "safety.record";
}

impl AggregateRoot for SafetyRecord {
    type Id = SafetyRecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: FileInspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInspection {
    pub record_id: SafetyRecordId,
    pub inspector_id: UserId,
    pub order_id: Option<AggregateId>,
    /// Free-form checklist as submitted by the courier's form.
    pub check_items: JsonValue,
    pub hazard_level: HazardLevel,
    pub hazard_description: Option<String>,
    pub photos: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateRectification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRectification {
    pub record_id: SafetyRecordId,
    pub status: Option<RectifyStatus>,
    /// Appended to the stored rectification photos.
    pub photos: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SafetyCommand {
    File(FileInspection),
    UpdateRectification(UpdateRectification),
}

/// Event: InspectionFiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionFiled {
    pub record_id: SafetyRecordId,
    pub inspector_id: UserId,
    pub order_id: Option<AggregateId>,
    pub check_items: JsonValue,
    pub hazard_level: HazardLevel,
    pub hazard_description: Option<String>,
    pub photos: Vec<String>,
    pub rectify_status: Option<RectifyStatus>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RectificationUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RectificationUpdated {
    pub record_id: SafetyRecordId,
    pub status: RectifyStatus,
    pub added_photos: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SafetyEvent {
    InspectionFiled(InspectionFiled),
    RectificationUpdated(RectificationUpdated),
}

impl Event for SafetyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SafetyEvent::InspectionFiled(_) => "safety.record.filed",
            SafetyEvent::RectificationUpdated(_) => "safety.record.rectification_updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SafetyEvent::InspectionFiled(e) => e.occurred_at,
            SafetyEvent::RectificationUpdated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SafetyRecord {
    type Command = SafetyCommand;
    type Event = SafetyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SafetyEvent::InspectionFiled(e) => {
                self.id = e.record_id;
                self.inspector_id = Some(e.inspector_id);
                self.hazard_level = e.hazard_level;
                self.rectify_status = e.rectify_status;
                self.created = true;
            }
            SafetyEvent::RectificationUpdated(e) => {
                self.rectify_status = Some(e.status);
                self.rectify_photos.extend(e.added_photos.iter().cloned());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SafetyCommand::File(cmd) => self.handle_file(cmd),
            SafetyCommand::UpdateRectification(cmd) => self.handle_rectification(cmd),
        }
    }
}

impl SafetyRecord {
    fn handle_file(&self, cmd: &FileInspection) -> Result<Vec<SafetyEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("safety record already exists"));
        }

        let hazard_description = cmd
            .hazard_description
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if cmd.hazard_level.needs_rectification() && hazard_description.is_none() {
            return Err(DomainError::validation(
                "hazard_description is required when a hazard is reported",
            ));
        }

        let rectify_status = cmd
            .hazard_level
            .needs_rectification()
            .then_some(RectifyStatus::Pending);

        Ok(vec![SafetyEvent::InspectionFiled(InspectionFiled {
            record_id: cmd.record_id,
            inspector_id: cmd.inspector_id,
            order_id: cmd.order_id,
            check_items: cmd.check_items.clone(),
            hazard_level: cmd.hazard_level,
            hazard_description,
            photos: clean_photos(&cmd.photos),
            rectify_status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_rectification(
        &self,
        cmd: &UpdateRectification,
    ) -> Result<Vec<SafetyEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != cmd.record_id {
            return Err(DomainError::invariant("record_id mismatch"));
        }

        let Some(current) = self.rectify_status else {
            return Err(DomainError::invariant(
                "record has no hazard and needs no rectification",
            ));
        };
        if current == RectifyStatus::Completed {
            return Err(DomainError::invariant("rectification is already completed"));
        }

        let added_photos = clean_photos(&cmd.photos);
        let status = cmd.status.unwrap_or(current);
        if status == RectifyStatus::Completed
            && self.rectify_photos.is_empty()
            && added_photos.is_empty()
        {
            return Err(DomainError::validation(
                "a rectification photo is required to complete rectification",
            ));
        }
        if status == current && added_photos.is_empty() {
            return Err(DomainError::validation("rectification update changes nothing"));
        }

        Ok(vec![SafetyEvent::RectificationUpdated(RectificationUpdated {
            record_id: cmd.record_id,
            status,
            added_photos,
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn clean_photos(photos: &[String]) -> Vec<String> {
    photos
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn file_cmd(level: HazardLevel, description: Option<&str>) -> FileInspection {
        FileInspection {
            record_id: SafetyRecordId::new(AggregateId::new()),
            inspector_id: UserId::new(),
            order_id: None,
            check_items: json!({"valve": true, "hose": false}),
            hazard_level: level,
            hazard_description: description.map(str::to_string),
            photos: vec!["/uploads/a.jpg".to_string()],
            occurred_at: Utc::now(),
        }
    }

    fn filed(level: HazardLevel) -> SafetyRecord {
        let cmd = file_cmd(level, Some("hose is cracked"));
        let mut record = SafetyRecord::empty(cmd.record_id);
        for ev in record.handle(&SafetyCommand::File(cmd)).unwrap() {
            record.apply(&ev);
        }
        record
    }

    fn rectify(
        record: &mut SafetyRecord,
        status: Option<RectifyStatus>,
        photos: &[&str],
    ) -> Result<(), DomainError> {
        let events = record.handle(&SafetyCommand::UpdateRectification(UpdateRectification {
            record_id: *record.id(),
            status,
            photos: photos.iter().map(|p| p.to_string()).collect(),
            occurred_at: Utc::now(),
        }))?;
        for ev in &events {
            record.apply(ev);
        }
        Ok(())
    }

    #[test]
    fn hazard_opens_rectification() {
        let record = filed(HazardLevel::High);
        assert_eq!(record.rectify_status(), Some(RectifyStatus::Pending));
        assert_eq!(record.version(), 1);

        let record = filed(HazardLevel::None);
        assert_eq!(record.rectify_status(), None);
    }

    #[test]
    fn hazard_requires_description() {
        let cmd = file_cmd(HazardLevel::Medium, Some("  "));
        let record = SafetyRecord::empty(cmd.record_id);
        assert!(matches!(
            record.handle(&SafetyCommand::File(cmd)),
            Err(DomainError::Validation(_))
        ));

        let cmd = file_cmd(HazardLevel::None, None);
        let record = SafetyRecord::empty(cmd.record_id);
        assert!(record.handle(&SafetyCommand::File(cmd)).is_ok());
    }

    #[test]
    fn completing_requires_a_photo() {
        let mut record = filed(HazardLevel::Low);
        assert!(matches!(
            rectify(&mut record, Some(RectifyStatus::Completed), &[]),
            Err(DomainError::Validation(_))
        ));

        rectify(&mut record, Some(RectifyStatus::Completed), &["/uploads/fixed.jpg"]).unwrap();
        assert_eq!(record.rectify_status(), Some(RectifyStatus::Completed));
        assert_eq!(record.rectify_photos(), ["/uploads/fixed.jpg".to_string()]);
    }

    #[test]
    fn photos_accumulate_while_pending() {
        let mut record = filed(HazardLevel::Low);
        rectify(&mut record, None, &["/uploads/1.jpg"]).unwrap();
        rectify(&mut record, None, &["/uploads/2.jpg"]).unwrap();
        assert_eq!(record.rectify_photos().len(), 2);
        assert_eq!(record.rectify_status(), Some(RectifyStatus::Pending));

        rectify(&mut record, Some(RectifyStatus::Completed), &[]).unwrap();
        assert_eq!(record.version(), 4);
    }

    #[test]
    fn completed_is_final() {
        let mut record = filed(HazardLevel::High);
        rectify(&mut record, Some(RectifyStatus::Completed), &["/uploads/x.jpg"]).unwrap();
        assert!(matches!(
            rectify(&mut record, Some(RectifyStatus::Pending), &[]),
            Err(DomainError::InvariantViolation(_))
        ));
        assert!(rectify(&mut record, None, &["/uploads/y.jpg"]).is_err());
    }

    #[test]
    fn no_hazard_means_no_rectification() {
        let mut record = filed(HazardLevel::None);
        assert!(matches!(
            rectify(&mut record, Some(RectifyStatus::Completed), &["/uploads/x.jpg"]),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn empty_update_is_rejected() {
        let mut record = filed(HazardLevel::Low);
        assert!(matches!(
            rectify(&mut record, Some(RectifyStatus::Pending), &[" "]),
            Err(DomainError::Validation(_))
        ));
    }
}
