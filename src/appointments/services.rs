//! Booking, update and listing of appointments.
//!
//! Writes that change when an appointment happens run inside one transaction
//! that first locks the doctor's row, so the availability and overlap checks
//! see every committed booking of that doctor.

use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::{
    dto::{AppointmentPatch, CreateAppointmentRequest, ListQuery},
    repo::{self, ListFilter},
    repo_types::{Appointment, AppointmentStatus, NewAppointment},
};
use crate::{
    auth::{
        actor::Actor,
        repo_types::{Role, User},
    },
    doctors::repo_types::Doctor,
    error::{AppError, AppResult},
    integrations::ai::DiagnoseRequest,
    permissions::{filter_update, into_patch, Entity},
    scheduling::{check_slot, overlap_lookup_range, validate_duration},
    state::AppState,
};

const DEFAULT_CANCELLATION_REASON: &str = "No reason provided";

impl Actor {
    pub fn is_participant(&self, appt: &Appointment) -> bool {
        match self.user.role {
            Role::Admin => true,
            Role::Patient => self.patient_id == Some(appt.patient_id),
            Role::Doctor => self.doctor_id == Some(appt.doctor_id),
        }
    }

    pub fn ensure_participant(&self, appt: &Appointment) -> AppResult<()> {
        if self.is_participant(appt) {
            Ok(())
        } else {
            Err(AppError::forbidden("You are not a participant of this appointment"))
        }
    }

    /// Listing scope: patients and doctors see their own appointments only.
    fn list_filter(&self, q: &ListQuery) -> AppResult<ListFilter> {
        let mut filter = ListFilter {
            status: q.status,
            from: q.from,
            to: q.to,
            ..Default::default()
        };
        match self.user.role {
            Role::Admin => {}
            Role::Patient => {
                let id = self
                    .patient_id
                    .ok_or_else(|| AppError::not_found("Patient profile not found"))?;
                filter.patient_id = Some(id);
            }
            Role::Doctor => {
                let id = self
                    .doctor_id
                    .ok_or_else(|| AppError::not_found("Doctor profile not found"))?;
                filter.doctor_id = Some(id);
            }
        }
        Ok(filter)
    }
}

pub fn validate_request(req: &CreateAppointmentRequest) -> AppResult<()> {
    validate_duration(i64::from(req.duration))?;
    if req.reason.trim().is_empty() {
        return Err(AppError::validation("reason must not be empty"));
    }
    Ok(())
}

/// Creates a booking for the calling patient.
pub async fn book(
    st: &AppState,
    actor: &Actor,
    req: CreateAppointmentRequest,
) -> AppResult<Appointment> {
    if actor.user.role != Role::Patient {
        return Err(AppError::forbidden("Only patients can book appointments"));
    }
    let patient_id = actor
        .patient_id
        .ok_or_else(|| AppError::not_found("Patient profile not found"))?;
    validate_request(&req)?;

    let now = OffsetDateTime::now_utc();
    let start = req.appointment_date;
    let duration = i64::from(req.duration);
    let (from, to) = overlap_lookup_range(start, duration)?;

    let mut tx = st.db.begin().await?;
    let doctor = Doctor::lock_for_booking(&mut *tx, req.doctor_id)
        .await?
        .ok_or_else(|| AppError::not_found("Doctor not found"))?;
    if !doctor.is_accepting_new_patients {
        return Err(AppError::validation_code(
            "DOCTOR_NOT_ACCEPTING",
            "Doctor is not accepting new patients",
        ));
    }

    let booked = repo::booked_slots(&mut *tx, doctor.id, from, to).await?;
    check_slot(
        &doctor.availability,
        &booked,
        start,
        duration,
        None,
        now,
        st.config.clinic_offset,
    )?;

    let new = NewAppointment {
        patient_id,
        doctor_id: doctor.id,
        appointment_date: start,
        duration: req.duration,
        appointment_type: req.appointment_type,
        reason: req.reason.trim().to_string(),
        symptoms: req.symptoms,
        meeting_link: req.meeting_link,
        location: req.location,
        payment_amount: Some(doctor.consultation_fee),
    };
    let appt = repo::insert(&mut *tx, &new).await?;
    tx.commit().await?;

    info!(
        appointment = %appt.uid,
        doctor_id = %appt.doctor_id,
        patient_id = %appt.patient_id,
        "appointment booked"
    );

    if !appt.symptoms.is_empty() {
        tokio::spawn(attach_insights(st.clone(), appt.clone()));
    }
    Ok(appt)
}

/// Stores AI suggestions for the booking's symptoms. Never affects the booking.
async fn attach_insights(st: AppState, appt: Appointment) {
    if !st.ai.is_available().await {
        debug!(appointment = %appt.uid, "ai unavailable, skipping insights");
        return;
    }
    let req = DiagnoseRequest {
        symptoms: appt.symptoms.clone(),
        description: Some(appt.reason.clone()),
        patient_id: Some(appt.patient_id),
    };
    let result = async {
        let diagnosis = st.ai.diagnose(&req).await?;
        repo::set_ai_insights(&st.db, appt.id, &serde_json::to_value(&diagnosis)?).await
    }
    .await;
    if let Err(e) = result {
        warn!(appointment = %appt.uid, error = %format!("{e:#}"), "ai insights failed");
    }
}

/// Outcome of applying an update payload to an appointment, before any
/// database work.
#[derive(Debug)]
pub struct PlannedUpdate {
    pub next: Appointment,
    /// Start or duration changed; the new span must pass the slot checks.
    pub timing_changed: bool,
    pub rescheduled: bool,
}

/// Applies `payload` to `current` as `actor` would. Status writes by anyone
/// but a doctor or admin are refused outright; other unauthorized keys are
/// dropped by the field filter.
pub fn plan_update(
    current: &Appointment,
    actor: &User,
    payload: Map<String, Value>,
    now: OffsetDateTime,
) -> AppResult<PlannedUpdate> {
    if payload.contains_key("status") && !matches!(actor.role, Role::Doctor | Role::Admin) {
        return Err(AppError::forbidden(
            "Only doctors and admins can change appointment status",
        ));
    }
    let filtered = filter_update(Entity::Appointment, actor.role, payload);
    let patch: AppointmentPatch = into_patch(filtered)?;

    let mut next = current.clone();
    if let Some(d) = patch.duration {
        validate_duration(i64::from(d))?;
        next.duration = d;
    }
    if let Some(date) = patch.appointment_date {
        next.appointment_date = date;
    }
    if let Some(t) = patch.appointment_type {
        next.appointment_type = t;
    }
    if let Some(reason) = patch.reason {
        if reason.trim().is_empty() {
            return Err(AppError::validation("reason must not be empty"));
        }
        next.reason = reason.trim().to_string();
    }
    if let Some(v) = patch.symptoms {
        next.symptoms = v;
    }
    if let Some(v) = patch.notes {
        next.notes = Some(v);
    }
    if let Some(v) = patch.diagnosis {
        next.diagnosis = Some(v);
    }
    if let Some(v) = patch.prescription {
        next.prescription = Some(v);
    }
    if let Some(v) = patch.meeting_link {
        next.meeting_link = Some(v);
    }
    if let Some(v) = patch.location {
        next.location = Some(v);
    }
    if let Some(v) = patch.payment_status {
        next.payment_status = v;
    }
    if let Some(v) = patch.payment_amount {
        if !v.is_finite() || v < 0.0 {
            return Err(AppError::validation("paymentAmount must be a non-negative amount"));
        }
        next.payment_amount = Some(v);
    }
    if let Some(reason) = patch.cancellation_reason {
        next.cancellation_reason = Some(reason);
    }
    if let Some(status) = patch.status {
        let cancelling = status == AppointmentStatus::Cancelled
            && current.status != AppointmentStatus::Cancelled;
        if cancelling {
            next.cancelled_by = Some(actor.id);
            next.cancelled_at = Some(now);
            if next.cancellation_reason.is_none() {
                next.cancellation_reason = Some(DEFAULT_CANCELLATION_REASON.to_string());
            }
        }
        next.status = status;
    }

    let rescheduled = next.appointment_date != current.appointment_date;
    let timing_changed = rescheduled || next.duration != current.duration;
    if rescheduled {
        next.rescheduled_from = Some(current.uid.clone());
    }
    Ok(PlannedUpdate {
        next,
        timing_changed,
        rescheduled,
    })
}

/// Applies `payload` to the appointment `uid`. The doctor's row, then the
/// appointment's row, are locked and re-read before the payload is applied.
pub async fn update(
    st: &AppState,
    actor: &Actor,
    uid: &str,
    payload: Map<String, Value>,
) -> AppResult<Appointment> {
    let snapshot = load(st, uid).await?;
    actor.ensure_participant(&snapshot)?;
    let now = OffsetDateTime::now_utc();

    let mut tx = st.db.begin().await?;
    let doctor = Doctor::lock_for_booking(&mut *tx, snapshot.doctor_id)
        .await?
        .ok_or_else(|| AppError::not_found("Doctor not found"))?;
    let current = repo::lock_by_id(&mut *tx, snapshot.id)
        .await?
        .ok_or_else(appointment_not_found)?;
    actor.ensure_participant(&current)?;
    let plan = plan_update(&current, &actor.user, payload, now)?;

    if plan.timing_changed {
        let start = plan.next.appointment_date;
        let duration = i64::from(plan.next.duration);
        let (from, to) = overlap_lookup_range(start, duration)?;
        let booked = repo::booked_slots(&mut *tx, doctor.id, from, to).await?;
        check_slot(
            &doctor.availability,
            &booked,
            start,
            duration,
            Some(current.id),
            now,
            st.config.clinic_offset,
        )?;
    }

    let saved = repo::update(&mut *tx, &plan.next)
        .await?
        .ok_or_else(appointment_not_found)?;
    if plan.timing_changed {
        repo::insert_reschedule_log(
            &mut *tx,
            current.id,
            current.appointment_date,
            current.duration,
            saved.appointment_date,
            actor.user.id,
        )
        .await?;
    }
    tx.commit().await?;

    if plan.timing_changed {
        info!(
            appointment = %saved.uid,
            rescheduled = plan.rescheduled,
            by = %actor.user.id,
            "appointment rescheduled"
        );
    }
    if saved.status != current.status {
        info!(
            appointment = %saved.uid,
            from = current.status.as_str(),
            to = saved.status.as_str(),
            by = %actor.user.id,
            "appointment status changed"
        );
    }
    Ok(saved)
}

pub async fn list(st: &AppState, actor: &Actor, q: &ListQuery) -> AppResult<Vec<Appointment>> {
    let filter = actor.list_filter(q)?;
    Ok(repo::list(&st.db, &filter, q.limit.clamp(1, 100), q.offset.max(0)).await?)
}

fn appointment_not_found() -> AppError {
    AppError::not_found("Appointment not found")
}

pub async fn load(st: &AppState, uid: &str) -> AppResult<Appointment> {
    repo::find_by_uid(&st.db, uid)
        .await?
        .ok_or_else(appointment_not_found)
}

pub async fn delete(st: &AppState, actor: &User, uid: &str) -> AppResult<()> {
    if actor.role != Role::Admin {
        return Err(AppError::forbidden("Only admins can delete appointments"));
    }
    let appt = load(st, uid).await?;
    repo::delete(&st.db, appt.id).await?;
    info!(appointment = %appt.uid, by = %actor.id, "appointment deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointments::repo_types::{AppointmentType, PaymentStatus};
    use crate::auth::jwt::tests::sample_user;
    use serde_json::json;
    use time::{macros::datetime, Duration};
    use uuid::Uuid;

    const NOW: OffsetDateTime = datetime!(2030-01-01 12:00 UTC);

    fn appointment() -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            uid: "APT-TEST0001".into(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            appointment_date: datetime!(2030-01-07 10:00 UTC),
            duration: 30,
            appointment_type: AppointmentType::Consultation,
            status: AppointmentStatus::Scheduled,
            reason: "checkup".into(),
            symptoms: vec![],
            notes: None,
            diagnosis: None,
            prescription: None,
            payment_status: PaymentStatus::Pending,
            payment_amount: Some(50.0),
            meeting_link: None,
            location: None,
            cancelled_by: None,
            cancellation_reason: None,
            cancelled_at: None,
            rescheduled_from: None,
            ai_insights: None,
            created_at: NOW,
            updated_at: NOW,
        }
    }

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn patient_cannot_change_status() {
        let err = plan_update(
            &appointment(),
            &sample_user(Role::Patient),
            obj(json!({"status": "cancelled"})),
            NOW,
        )
        .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[test]
    fn first_cancellation_records_who_and_why() {
        let doctor = sample_user(Role::Doctor);
        let plan = plan_update(
            &appointment(),
            &doctor,
            obj(json!({"status": "cancelled"})),
            NOW,
        )
        .unwrap();
        assert_eq!(plan.next.status, AppointmentStatus::Cancelled);
        assert_eq!(plan.next.cancelled_by, Some(doctor.id));
        assert_eq!(plan.next.cancelled_at, Some(NOW));
        assert_eq!(
            plan.next.cancellation_reason.as_deref(),
            Some(DEFAULT_CANCELLATION_REASON)
        );
        assert!(!plan.timing_changed);
    }

    #[test]
    fn repeated_cancellation_keeps_original_metadata() {
        let mut current = appointment();
        let first = Uuid::new_v4();
        current.status = AppointmentStatus::Cancelled;
        current.cancelled_by = Some(first);
        current.cancelled_at = Some(NOW);
        let plan = plan_update(
            &current,
            &sample_user(Role::Admin),
            obj(json!({"status": "cancelled"})),
            NOW + Duration::hours(1),
        )
        .unwrap();
        assert_eq!(plan.next.cancelled_by, Some(first));
        assert_eq!(plan.next.cancelled_at, Some(NOW));
    }

    #[test]
    fn reschedule_applied_to_a_cancelled_row_keeps_the_cancellation() {
        let mut fresh = appointment();
        let canceller = Uuid::new_v4();
        fresh.status = AppointmentStatus::Cancelled;
        fresh.cancelled_by = Some(canceller);
        fresh.cancelled_at = Some(NOW);
        fresh.cancellation_reason = Some("doctor away".into());
        let plan = plan_update(
            &fresh,
            &sample_user(Role::Patient),
            obj(json!({"appointmentDate": "2030-01-07T14:00:00Z"})),
            NOW + Duration::minutes(5),
        )
        .unwrap();
        assert!(plan.timing_changed);
        assert_eq!(plan.next.status, AppointmentStatus::Cancelled);
        assert_eq!(plan.next.cancelled_by, Some(canceller));
        assert_eq!(plan.next.cancelled_at, Some(NOW));
        assert_eq!(plan.next.cancellation_reason.as_deref(), Some("doctor away"));
    }

    #[tokio::test]
    async fn far_future_booking_is_a_validation_error() {
        let st = AppState::fake();
        let actor = Actor {
            user: sample_user(Role::Patient),
            patient_id: Some(Uuid::new_v4()),
            doctor_id: None,
        };
        let req = CreateAppointmentRequest {
            doctor_id: Uuid::new_v4(),
            appointment_date: datetime!(9999-12-31 23:50 UTC),
            duration: 30,
            appointment_type: AppointmentType::Consultation,
            reason: "pain".into(),
            symptoms: vec![],
            meeting_link: None,
            location: None,
        };
        assert_eq!(book(&st, &actor, req).await.unwrap_err().code(), "VALIDATION_ERROR");
    }

    #[test]
    fn any_status_may_follow_any_other() {
        let mut current = appointment();
        current.status = AppointmentStatus::Completed;
        let plan = plan_update(
            &current,
            &sample_user(Role::Doctor),
            obj(json!({"status": "scheduled"})),
            NOW,
        )
        .unwrap();
        assert_eq!(plan.next.status, AppointmentStatus::Scheduled);
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        let err = plan_update(
            &appointment(),
            &sample_user(Role::Admin),
            obj(json!({"status": "archived"})),
            NOW,
        )
        .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn new_date_marks_a_reschedule() {
        let current = appointment();
        let plan = plan_update(
            &current,
            &sample_user(Role::Patient),
            obj(json!({"appointmentDate": "2030-01-07T14:00:00Z", "diagnosis": "x"})),
            NOW,
        )
        .unwrap();
        assert!(plan.rescheduled);
        assert!(plan.timing_changed);
        assert_eq!(plan.next.rescheduled_from.as_deref(), Some("APT-TEST0001"));
        assert_eq!(plan.next.appointment_date, datetime!(2030-01-07 14:00 UTC));
        // not writable by a patient
        assert!(plan.next.diagnosis.is_none());
    }

    #[test]
    fn same_date_is_not_a_reschedule() {
        let plan = plan_update(
            &appointment(),
            &sample_user(Role::Doctor),
            obj(json!({"appointmentDate": "2030-01-07T10:00:00Z", "notes": "bring labs"})),
            NOW,
        )
        .unwrap();
        assert!(!plan.rescheduled);
        assert!(!plan.timing_changed);
        assert!(plan.next.rescheduled_from.is_none());
        assert_eq!(plan.next.notes.as_deref(), Some("bring labs"));
    }

    #[test]
    fn duration_outside_bounds_is_rejected() {
        let err = plan_update(
            &appointment(),
            &sample_user(Role::Doctor),
            obj(json!({"duration": 5})),
            NOW,
        )
        .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn participants_are_scoped_by_profile() {
        let appt = appointment();
        let patient = Actor {
            user: sample_user(Role::Patient),
            patient_id: Some(appt.patient_id),
            doctor_id: None,
        };
        assert!(patient.is_participant(&appt));
        let stranger = Actor {
            user: sample_user(Role::Doctor),
            patient_id: None,
            doctor_id: Some(Uuid::new_v4()),
        };
        assert_eq!(stranger.ensure_participant(&appt).unwrap_err().code(), "FORBIDDEN");
        let admin = Actor {
            user: sample_user(Role::Admin),
            patient_id: None,
            doctor_id: None,
        };
        assert!(admin.is_participant(&appt));
    }

    #[test]
    fn listing_is_scoped_to_own_profile() {
        let doctor_id = Uuid::new_v4();
        let doctor = Actor {
            user: sample_user(Role::Doctor),
            patient_id: None,
            doctor_id: Some(doctor_id),
        };
        let filter = doctor.list_filter(&ListQuery::default()).unwrap();
        assert_eq!(filter.doctor_id, Some(doctor_id));
        assert!(filter.patient_id.is_none());

        let orphan = Actor {
            user: sample_user(Role::Patient),
            patient_id: None,
            doctor_id: None,
        };
        assert_eq!(
            orphan.list_filter(&ListQuery::default()).unwrap_err().code(),
            "NOT_FOUND"
        );
    }

    #[test]
    fn request_validation() {
        let mut req = CreateAppointmentRequest {
            doctor_id: Uuid::new_v4(),
            appointment_date: datetime!(2030-01-07 09:00 UTC),
            duration: 30,
            appointment_type: AppointmentType::Checkup,
            reason: "pain".into(),
            symptoms: vec![],
            meeting_link: None,
            location: None,
        };
        assert!(validate_request(&req).is_ok());
        req.duration = 600;
        assert!(validate_request(&req).is_err());
        req.duration = 30;
        req.reason = "  ".into();
        assert!(validate_request(&req).is_err());
    }

    #[tokio::test]
    async fn non_patients_cannot_book() {
        let st = AppState::fake();
        let actor = Actor {
            user: sample_user(Role::Doctor),
            patient_id: None,
            doctor_id: Some(Uuid::new_v4()),
        };
        let req = CreateAppointmentRequest {
            doctor_id: Uuid::new_v4(),
            appointment_date: datetime!(2030-01-07 09:00 UTC),
            duration: 30,
            appointment_type: AppointmentType::Consultation,
            reason: "pain".into(),
            symptoms: vec![],
            meeting_link: None,
            location: None,
        };
        assert_eq!(book(&st, &actor, req).await.unwrap_err().code(), "FORBIDDEN");
    }
}
