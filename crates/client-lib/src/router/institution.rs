// ============================
// realtime-client/src/router/institution.rs
// ============================

use super::Action;
use realtime_common::{Entity, MessageKind};

/// Institution verification and course approval
pub(super) fn route(kind: &MessageKind) -> Option<Action> {
    match kind {
        MessageKind::ApproveInstitution => Some(Action::approved(Entity::Institution)),
        MessageKind::RejectInstitution => Some(Action::rejected(Entity::Institution)),
        MessageKind::ApproveCourse => Some(Action::approved(Entity::Course)),
        MessageKind::RejectCourse => Some(Action::rejected(Entity::Course)),
        MessageKind::ApproveLecturer
        | MessageKind::RejectLecturer
        | MessageKind::ApprovePartner
        | MessageKind::RejectPartner
        | MessageKind::NewLecturerRequest
        | MessageKind::NewInstitutionRequest
        | MessageKind::NewPartnerRequest
        | MessageKind::NewCourseRequest
        | MessageKind::Unknown(_) => None,
    }
}
