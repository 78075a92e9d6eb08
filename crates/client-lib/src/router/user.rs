// ============================
// realtime-client/src/router/user.rs
// ============================
//! Router for plain users: outcomes of their role-upgrade requests.

use super::Action;
use realtime_common::{Entity, MessageKind};

pub(super) fn route(kind: &MessageKind) -> Option<Action> {
    match kind {
        MessageKind::ApproveLecturer => Some(Action::approved(Entity::Lecturer)),
        MessageKind::RejectLecturer => Some(Action::rejected(Entity::Lecturer)),
        MessageKind::ApproveInstitution => Some(Action::approved(Entity::Institution)),
        MessageKind::RejectInstitution => Some(Action::rejected(Entity::Institution)),
        MessageKind::ApprovePartner => Some(Action::approved(Entity::Partner)),
        MessageKind::RejectPartner => Some(Action::rejected(Entity::Partner)),
        MessageKind::ApproveCourse
        | MessageKind::RejectCourse
        | MessageKind::NewLecturerRequest
        | MessageKind::NewInstitutionRequest
        | MessageKind::NewPartnerRequest
        | MessageKind::NewCourseRequest
        | MessageKind::Unknown(_) => None,
    }
}
