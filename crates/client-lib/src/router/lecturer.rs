// ============================
// realtime-client/src/router/lecturer.rs
// ============================

use super::Action;
use realtime_common::{Entity, MessageKind};

/// Lecturer verification and course approval
pub(super) fn route(kind: &MessageKind) -> Option<Action> {
    match kind {
        MessageKind::ApproveLecturer => Some(Action::approved(Entity::Lecturer)),
        MessageKind::RejectLecturer => Some(Action::rejected(Entity::Lecturer)),
        MessageKind::ApproveCourse => Some(Action::approved(Entity::Course)),
        MessageKind::RejectCourse => Some(Action::rejected(Entity::Course)),
        MessageKind::ApproveInstitution
        | MessageKind::RejectInstitution
        | MessageKind::ApprovePartner
        | MessageKind::RejectPartner
        | MessageKind::NewLecturerRequest
        | MessageKind::NewInstitutionRequest
        | MessageKind::NewPartnerRequest
        | MessageKind::NewCourseRequest
        | MessageKind::Unknown(_) => None,
    }
}
