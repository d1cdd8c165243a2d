use serde::{Deserialize, Serialize};

use gasline_core::{DomainError, ValueObject};

/// Cylinder capacity. The wire form is the label (`"15kg"`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CylinderSpec {
    #[serde(rename = "5kg")]
    Kg5,
    #[serde(rename = "15kg")]
    Kg15,
    #[serde(rename = "50kg")]
    Kg50,
}

impl ValueObject for CylinderSpec {}

impl CylinderSpec {
    pub const ALL: [CylinderSpec; 3] = [CylinderSpec::Kg5, CylinderSpec::Kg15, CylinderSpec::Kg50];

    pub fn as_str(&self) -> &'static str {
        match self {
            CylinderSpec::Kg5 => "5kg",
            CylinderSpec::Kg15 => "15kg",
            CylinderSpec::Kg50 => "50kg",
        }
    }
}

impl core::fmt::Display for CylinderSpec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for CylinderSpec {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CylinderSpec::ALL
            .into_iter()
            .find(|spec| spec.as_str() == s.trim())
            .ok_or_else(|| DomainError::validation("specs must be one of 5kg, 15kg, 50kg"))
    }
}

/// Physical whereabouts of a cylinder.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CylinderStatus {
    InStock,
    Delivering,
    InUse,
    Empty,
}

impl CylinderStatus {
    pub const ALL: [CylinderStatus; 4] = [
        CylinderStatus::InStock,
        CylinderStatus::Delivering,
        CylinderStatus::InUse,
        CylinderStatus::Empty,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CylinderStatus::InStock => "in_stock",
            CylinderStatus::Delivering => "delivering",
            CylinderStatus::InUse => "in_use",
            CylinderStatus::Empty => "empty",
        }
    }

    /// Allowed next states.
    pub fn successors(&self) -> &'static [CylinderStatus] {
        match self {
            CylinderStatus::InStock => &[CylinderStatus::Delivering],
            CylinderStatus::Delivering => &[CylinderStatus::InUse, CylinderStatus::InStock],
            CylinderStatus::InUse => &[CylinderStatus::Empty],
            CylinderStatus::Empty => &[CylinderStatus::InStock],
        }
    }

    pub fn can_move_to(&self, to: CylinderStatus) -> bool {
        self.successors().contains(&to)
    }

    /// Out with a customer or a courier; such cylinders cannot be retired.
    pub fn is_in_circulation(&self) -> bool {
        matches!(self, CylinderStatus::Delivering | CylinderStatus::InUse)
    }
}

impl core::fmt::Display for CylinderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for CylinderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CylinderStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s.trim())
            .ok_or_else(|| DomainError::validation(format!("invalid cylinder status: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_labels_round_trip_through_serde() {
        assert_eq!(serde_json::to_string(&CylinderSpec::Kg15).unwrap(), "\"15kg\"");
        let spec: CylinderSpec = serde_json::from_str("\"50kg\"").unwrap();
        assert_eq!(spec, CylinderSpec::Kg50);
    }

    #[test]
    fn unknown_spec_is_rejected_with_message() {
        let err = "20kg".parse::<CylinderSpec>().unwrap_err();
        assert_eq!(
            err,
            DomainError::validation("specs must be one of 5kg, 15kg, 50kg")
        );
    }

    #[test]
    fn transition_table() {
        use CylinderStatus::*;
        assert!(InStock.can_move_to(Delivering));
        assert!(Delivering.can_move_to(InUse));
        assert!(Delivering.can_move_to(InStock));
        assert!(InUse.can_move_to(Empty));
        assert!(Empty.can_move_to(InStock));

        assert!(!InStock.can_move_to(InStock));
        assert!(!InStock.can_move_to(InUse));
        assert!(!InUse.can_move_to(InStock));
        assert!(!Empty.can_move_to(Delivering));
    }

    #[test]
    fn status_parses_snake_case() {
        assert_eq!("in_use".parse::<CylinderStatus>().unwrap(), CylinderStatus::InUse);
        assert!("broken".parse::<CylinderStatus>().is_err());
    }
}
