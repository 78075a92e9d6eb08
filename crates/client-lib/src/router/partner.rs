// ============================
// realtime-client/src/router/partner.rs
// ============================

use super::Action;
use realtime_common::{Entity, MessageKind};

pub(super) fn route(kind: &MessageKind) -> Option<Action> {
    match kind {
        MessageKind::ApprovePartner => Some(Action::approved(Entity::Partner)),
        MessageKind::RejectPartner => Some(Action::rejected(Entity::Partner)),
        MessageKind::ApproveLecturer
        | MessageKind::RejectLecturer
        | MessageKind::ApproveInstitution
        | MessageKind::RejectInstitution
        | MessageKind::ApproveCourse
        | MessageKind::RejectCourse
        | MessageKind::NewLecturerRequest
        | MessageKind::NewInstitutionRequest
        | MessageKind::NewPartnerRequest
        | MessageKind::NewCourseRequest
        | MessageKind::Unknown(_) => None,
    }
}
