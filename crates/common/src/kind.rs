//! Application message types carried in the envelope's `type` field.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

/// Things that go through an approval workflow in the portal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Lecturer,
    Institution,
    Partner,
    Course,
}

impl Entity {
    pub const ALL: [Entity; 4] = [
        Entity::Lecturer,
        Entity::Institution,
        Entity::Partner,
        Entity::Course,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Entity::Lecturer => "LECTURER",
            Entity::Institution => "INSTITUTION",
            Entity::Partner => "PARTNER",
            Entity::Course => "COURSE",
        }
    }

    fn from_wire(name: &str) -> Option<Self> {
        Entity::ALL.into_iter().find(|entity| entity.as_str() == name)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message types understood by the role routers.
///
/// Anything the server sends that is not listed here decodes to
/// [`MessageKind::Unknown`] so routers stay forward compatible.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    ApproveLecturer,
    RejectLecturer,
    ApproveInstitution,
    RejectInstitution,
    ApprovePartner,
    RejectPartner,
    ApproveCourse,
    RejectCourse,
    NewLecturerRequest,
    NewInstitutionRequest,
    NewPartnerRequest,
    NewCourseRequest,
    Unknown(String),
}

impl MessageKind {
    pub fn approve(entity: Entity) -> Self {
        match entity {
            Entity::Lecturer => MessageKind::ApproveLecturer,
            Entity::Institution => MessageKind::ApproveInstitution,
            Entity::Partner => MessageKind::ApprovePartner,
            Entity::Course => MessageKind::ApproveCourse,
        }
    }

    pub fn reject(entity: Entity) -> Self {
        match entity {
            Entity::Lecturer => MessageKind::RejectLecturer,
            Entity::Institution => MessageKind::RejectInstitution,
            Entity::Partner => MessageKind::RejectPartner,
            Entity::Course => MessageKind::RejectCourse,
        }
    }

    pub fn new_request(entity: Entity) -> Self {
        match entity {
            Entity::Lecturer => MessageKind::NewLecturerRequest,
            Entity::Institution => MessageKind::NewInstitutionRequest,
            Entity::Partner => MessageKind::NewPartnerRequest,
            Entity::Course => MessageKind::NewCourseRequest,
        }
    }

    /// Decode a wire type string. Never fails.
    pub fn from_wire(name: &str) -> Self {
        let decoded = if let Some(rest) = name.strip_prefix("APPROVE_") {
            Entity::from_wire(rest).map(MessageKind::approve)
        } else if let Some(rest) = name.strip_prefix("REJECT_") {
            Entity::from_wire(rest).map(MessageKind::reject)
        } else {
            name.strip_prefix("NEW_")
                .and_then(|rest| rest.strip_suffix("_REQUEST"))
                .and_then(Entity::from_wire)
                .map(MessageKind::new_request)
        };
        decoded.unwrap_or_else(|| MessageKind::Unknown(name.to_string()))
    }

    pub fn as_wire(&self) -> Cow<'_, str> {
        match self {
            MessageKind::ApproveLecturer => Cow::Borrowed("APPROVE_LECTURER"),
            MessageKind::RejectLecturer => Cow::Borrowed("REJECT_LECTURER"),
            MessageKind::ApproveInstitution => Cow::Borrowed("APPROVE_INSTITUTION"),
            MessageKind::RejectInstitution => Cow::Borrowed("REJECT_INSTITUTION"),
            MessageKind::ApprovePartner => Cow::Borrowed("APPROVE_PARTNER"),
            MessageKind::RejectPartner => Cow::Borrowed("REJECT_PARTNER"),
            MessageKind::ApproveCourse => Cow::Borrowed("APPROVE_COURSE"),
            MessageKind::RejectCourse => Cow::Borrowed("REJECT_COURSE"),
            MessageKind::NewLecturerRequest => Cow::Borrowed("NEW_LECTURER_REQUEST"),
            MessageKind::NewInstitutionRequest => Cow::Borrowed("NEW_INSTITUTION_REQUEST"),
            MessageKind::NewPartnerRequest => Cow::Borrowed("NEW_PARTNER_REQUEST"),
            MessageKind::NewCourseRequest => Cow::Borrowed("NEW_COURSE_REQUEST"),
            MessageKind::Unknown(name) => Cow::Borrowed(name.as_str()),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, MessageKind::Unknown(_))
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_wire())
    }
}

impl Serialize for MessageKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_wire())
    }
}

impl<'de> Deserialize<'de> for MessageKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(MessageKind::from_wire(&name))
    }
}
