use anyhow::Context;
use sqlx::{PgExecutor, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Appointment, AppointmentRow, AppointmentStatus, NewAppointment};
use crate::ids::new_uid;
use crate::scheduling::conflict::BookedSlot;

const APPOINTMENT_COLUMNS: &str = "id, uid, patient_id, doctor_id, appointment_date, duration, \
     appointment_type, status, reason, symptoms, notes, diagnosis, prescription, payment_status, \
     payment_amount, meeting_link, location, cancelled_by, cancellation_reason, cancelled_at, \
     rescheduled_from, ai_insights, created_at, updated_at";

/// Optional filters for listings. `None` fields do not constrain.
#[derive(Debug, Default, Clone)]
pub struct ListFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
}

pub async fn insert<'e, E: PgExecutor<'e>>(
    db: E,
    new: &NewAppointment,
) -> anyhow::Result<Appointment> {
    let row = sqlx::query_as::<_, AppointmentRow>(&format!(
        r#"
        INSERT INTO appointments
            (uid, patient_id, doctor_id, appointment_date, duration, appointment_type, status,
             reason, symptoms, payment_status, payment_amount, meeting_link, location)
        VALUES ($1, $2, $3, $4, $5, $6, 'scheduled', $7, $8, 'pending', $9, $10, $11)
        RETURNING {APPOINTMENT_COLUMNS}
        "#
    ))
    .bind(new_uid("APT"))
    .bind(new.patient_id)
    .bind(new.doctor_id)
    .bind(new.appointment_date)
    .bind(new.duration)
    .bind(new.appointment_type.as_str())
    .bind(&new.reason)
    .bind(&new.symptoms)
    .bind(new.payment_amount)
    .bind(&new.meeting_link)
    .bind(&new.location)
    .fetch_one(db)
    .await
    .context("insert appointment")?;
    Appointment::try_from(row)
}

pub async fn find_by_uid<'e, E: PgExecutor<'e>>(
    db: E,
    uid: &str,
) -> anyhow::Result<Option<Appointment>> {
    let row = sqlx::query_as::<_, AppointmentRow>(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE uid = $1"
    ))
    .bind(uid)
    .fetch_optional(db)
    .await
    .context("find appointment by uid")?;
    row.map(Appointment::try_from).transpose()
}

/// Re-reads the row and holds its lock until the transaction ends.
pub async fn lock_by_id<'e, E: PgExecutor<'e>>(
    db: E,
    id: Uuid,
) -> anyhow::Result<Option<Appointment>> {
    let row = sqlx::query_as::<_, AppointmentRow>(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .context("lock appointment")?;
    row.map(Appointment::try_from).transpose()
}

pub async fn list(
    db: &PgPool,
    filter: &ListFilter,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Appointment>> {
    let rows = sqlx::query_as::<_, AppointmentRow>(&format!(
        r#"
        SELECT {APPOINTMENT_COLUMNS}
          FROM appointments
         WHERE ($1::uuid IS NULL OR patient_id = $1)
           AND ($2::uuid IS NULL OR doctor_id = $2)
           AND ($3::text IS NULL OR status = $3)
           AND ($4::timestamptz IS NULL OR appointment_date >= $4)
           AND ($5::timestamptz IS NULL OR appointment_date < $5)
         ORDER BY appointment_date ASC
         LIMIT $6 OFFSET $7
        "#
    ))
    .bind(filter.patient_id)
    .bind(filter.doctor_id)
    .bind(filter.status.map(|s| s.as_str()))
    .bind(filter.from)
    .bind(filter.to)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list appointments")?;
    rows.into_iter().map(Appointment::try_from).collect()
}

/// Active appointments of `doctor_id` starting in `[from, to)`.
pub async fn booked_slots<'e, E: PgExecutor<'e>>(
    db: E,
    doctor_id: Uuid,
    from: OffsetDateTime,
    to: OffsetDateTime,
) -> anyhow::Result<Vec<BookedSlot>> {
    let blocking: Vec<String> = AppointmentStatus::BLOCKING
        .iter()
        .map(|s| s.as_str().to_string())
        .collect();
    let rows = sqlx::query_as::<_, (Uuid, OffsetDateTime, i32, String)>(
        r#"
        SELECT id, appointment_date, duration, status
          FROM appointments
         WHERE doctor_id = $1
           AND status = ANY($2)
           AND appointment_date >= $3
           AND appointment_date < $4
         ORDER BY appointment_date ASC
        "#,
    )
    .bind(doctor_id)
    .bind(&blocking)
    .bind(from)
    .bind(to)
    .fetch_all(db)
    .await
    .context("load booked slots")?;

    rows.into_iter()
        .map(|(id, start, duration, status)| -> anyhow::Result<BookedSlot> {
            Ok(BookedSlot {
                appointment_id: id,
                start,
                duration_minutes: i64::from(duration),
                status: status.parse()?,
            })
        })
        .collect()
}

/// Writes every mutable column of `appt`. `None` when the row is gone.
pub async fn update<'e, E: PgExecutor<'e>>(
    db: E,
    appt: &Appointment,
) -> anyhow::Result<Option<Appointment>> {
    let row = sqlx::query_as::<_, AppointmentRow>(&format!(
        r#"
        UPDATE appointments
           SET appointment_date = $2, duration = $3, appointment_type = $4, status = $5,
               reason = $6, symptoms = $7, notes = $8, diagnosis = $9, prescription = $10,
               payment_status = $11, payment_amount = $12, meeting_link = $13, location = $14,
               cancelled_by = $15, cancellation_reason = $16, cancelled_at = $17,
               rescheduled_from = $18, updated_at = now()
         WHERE id = $1
        RETURNING {APPOINTMENT_COLUMNS}
        "#
    ))
    .bind(appt.id)
    .bind(appt.appointment_date)
    .bind(appt.duration)
    .bind(appt.appointment_type.as_str())
    .bind(appt.status.as_str())
    .bind(&appt.reason)
    .bind(&appt.symptoms)
    .bind(&appt.notes)
    .bind(&appt.diagnosis)
    .bind(&appt.prescription)
    .bind(appt.payment_status.as_str())
    .bind(appt.payment_amount)
    .bind(&appt.meeting_link)
    .bind(&appt.location)
    .bind(appt.cancelled_by)
    .bind(&appt.cancellation_reason)
    .bind(appt.cancelled_at)
    .bind(&appt.rescheduled_from)
    .fetch_optional(db)
    .await
    .context("update appointment")?;
    row.map(Appointment::try_from).transpose()
}

pub async fn insert_reschedule_log<'e, E: PgExecutor<'e>>(
    db: E,
    appointment_id: Uuid,
    previous_date: OffsetDateTime,
    previous_duration: i32,
    new_date: OffsetDateTime,
    rescheduled_by: Uuid,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO appointment_reschedules
            (appointment_id, previous_date, previous_duration, new_date, rescheduled_by)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(appointment_id)
    .bind(previous_date)
    .bind(previous_duration)
    .bind(new_date)
    .bind(rescheduled_by)
    .execute(db)
    .await
    .context("insert reschedule log")?;
    Ok(())
}

pub async fn set_ai_insights(
    db: &PgPool,
    id: Uuid,
    insights: &serde_json::Value,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE appointments SET ai_insights = $2 WHERE id = $1")
        .bind(id)
        .bind(insights)
        .execute(db)
        .await
        .context("store ai insights")?;
    Ok(())
}

pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM appointments WHERE id = $1")
        .bind(id)
        .execute(db)
        .await
        .context("delete appointment")?;
    Ok(res.rows_affected() > 0)
}
