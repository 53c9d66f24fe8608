use std::collections::HashMap;

use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::{info, warn};

use super::{
    dto::{ReportListQuery, ReportUpload},
    repo::{self, ReportScope},
    repo_types::{AiSummary, NewReport, Report},
};
use crate::{
    appointments,
    auth::{actor::Actor, repo_types::Role},
    error::{AppError, AppResult},
    ids::new_uid,
    images::services::{ext_from_mime, is_image},
    integrations::blockchain::ChainUpload,
    patients::repo_types::Patient,
    state::AppState,
    storage::StoredObject,
};

pub const MAX_REPORT_BYTES: usize = 20 * 1024 * 1024;

/// Doctors and admins see every report; a patient only their own.
pub fn ensure_can_access(actor: &Actor, report: &Report) -> AppResult<()> {
    match actor.role() {
        Role::Admin | Role::Doctor => Ok(()),
        Role::Patient if actor.patient_id == Some(report.patient_id) => Ok(()),
        Role::Patient => Err(AppError::forbidden("Access denied")),
    }
}

/// Trims the upload in place and rejects it before anything is stored.
pub fn validate_upload(upload: &mut ReportUpload) -> AppResult<()> {
    upload.title = upload.title.trim().to_string();
    if upload.title.is_empty() {
        return Err(AppError::validation("title is required"));
    }
    if upload.body.is_empty() {
        return Err(AppError::validation("file is required"));
    }
    if upload.body.len() > MAX_REPORT_BYTES {
        return Err(AppError::validation("file exceeds 20 MB"));
    }
    if ext_from_mime(&upload.content_type).is_none() {
        return Err(AppError::validation(format!(
            "unsupported file type {}",
            upload.content_type
        )));
    }
    upload.description = upload
        .description
        .take()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    Ok(())
}

/// The patient a new report is filed under.
async fn target_patient(
    st: &AppState,
    actor: &Actor,
    upload: &ReportUpload,
) -> AppResult<uuid::Uuid> {
    match actor.role() {
        Role::Patient => {
            let own = actor
                .patient_id
                .ok_or_else(|| AppError::not_found("Patient profile not found"))?;
            if upload.patient_id.is_some_and(|p| p != own) {
                return Err(AppError::forbidden("Patients can only upload their own reports"));
            }
            Ok(own)
        }
        Role::Doctor | Role::Admin => {
            let id = upload
                .patient_id
                .ok_or_else(|| AppError::validation("patientId is required"))?;
            Patient::find_by_id(&st.db, id)
                .await?
                .map(|p| p.id)
                .ok_or_else(|| AppError::not_found("Patient not found"))
        }
    }
}

pub async fn create(st: &AppState, actor: &Actor, mut upload: ReportUpload) -> AppResult<Report> {
    validate_upload(&mut upload)?;
    let patient_id = target_patient(st, actor, &upload).await?;

    let (appointment_id, appointment_doctor) = match upload.appointment_uid.as_deref() {
        Some(uid) => {
            let appt = appointments::services::load(st, uid).await?;
            if appt.patient_id != patient_id {
                return Err(AppError::validation(
                    "appointment does not belong to this patient",
                ));
            }
            (Some(appt.id), Some(appt.doctor_id))
        }
        None => (None, None),
    };

    let uid = new_uid("RPT");
    let ext = ext_from_mime(&upload.content_type).unwrap_or("bin");
    let file_key = format!("reports/{patient_id}/{uid}.{ext}");
    let metadata = HashMap::from([
        ("patient-id".to_string(), patient_id.to_string()),
        ("report-uid".to_string(), uid.clone()),
        ("uploaded-by".to_string(), actor.user.id.to_string()),
    ]);
    st.storage
        .put_object(&file_key, upload.body.clone(), &upload.content_type, &metadata)
        .await
        .map_err(|e| {
            warn!(error = %format!("{e:#}"), key = %file_key, "report upload failed");
            AppError::unavailable("File storage is currently unavailable")
        })?;

    let new = NewReport {
        uid,
        patient_id,
        doctor_id: appointment_doctor.or(actor.doctor_id),
        appointment_id,
        uploaded_by: actor.user.id,
        title: upload.title,
        report_type: upload.report_type,
        description: upload.description,
        file_key,
        file_name: upload.file_name,
        content_type: upload.content_type,
        file_size: upload.body.len() as i64,
    };
    let mut report = match repo::insert(&st.db, &new).await {
        Ok(report) => report,
        Err(e) => {
            if let Err(cleanup) = st.storage.delete_object(&new.file_key).await {
                warn!(error = %cleanup, key = %new.file_key, "orphaned report object");
            }
            return Err(e.into());
        }
    };
    info!(report_uid = %report.uid, patient_id = %patient_id, "report uploaded");

    if is_image(&report.content_type) {
        if let Some(summary) = analyze(st, &report, &upload.body).await {
            report.ai_analysis = Some(summary);
        }
    }
    if let Some(hash) = mirror_to_chain(st, &report, &upload.body).await {
        report.block_hash = Some(hash);
        report.chain_stored_at = Some(OffsetDateTime::now_utc());
    }
    Ok(report)
}

/// Best-effort AI read of an image report.
async fn analyze(st: &AppState, report: &Report, body: &[u8]) -> Option<AiSummary> {
    if !st.ai.is_available().await {
        return None;
    }
    let analysis = match st.ai.analyze_image(body, &report.content_type).await {
        Ok(a) => a,
        Err(e) => {
            warn!(error = %format!("{e:#}"), report_uid = %report.uid, "report analysis failed");
            return None;
        }
    };
    let summary = AiSummary {
        severity: analysis.severity().to_string(),
        confidence: analysis.confidence,
        findings: analysis.findings,
        conditions: analysis.conditions,
    };
    if let Err(e) = repo::set_ai_analysis(&st.db, report.id, &summary).await {
        warn!(error = %format!("{e:#}"), report_uid = %report.uid, "storing analysis failed");
        return None;
    }
    Some(summary)
}

/// Best-effort copy of the file to the record chain.
async fn mirror_to_chain(st: &AppState, report: &Report, body: &[u8]) -> Option<String> {
    let upload = ChainUpload {
        patient_id: report.patient_id,
        file_name: &report.file_name,
        content_type: &report.content_type,
        metadata: json!({
            "fileId": report.uid,
            "title": report.title,
            "type": report.report_type.as_str(),
        }),
        labels: vec![report.report_type.as_str().to_string()],
        tags: Vec::new(),
    };
    let block = match st.chain.store(&upload, body).await {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %format!("{e:#}"), report_uid = %report.uid, "chain store failed");
            return None;
        }
    };
    if let Err(e) = repo::set_chain_block(&st.db, report.id, &block.block_hash).await {
        warn!(error = %format!("{e:#}"), report_uid = %report.uid, "storing block hash failed");
        return None;
    }
    Some(block.block_hash)
}

/// Patients list their own reports, doctors the ones they uploaded or are
/// named on, admins everything.
pub fn list_scope(actor: &Actor, q: &ReportListQuery) -> Option<ReportScope> {
    match actor.role() {
        Role::Patient => actor.patient_id.map(|id| ReportScope {
            patient_id: Some(id),
            ..ReportScope::default()
        }),
        Role::Doctor => Some(ReportScope {
            patient_id: q.patient_id,
            uploaded_by: Some(actor.user.id),
            doctor_id: actor.doctor_id,
        }),
        Role::Admin => Some(ReportScope {
            patient_id: q.patient_id,
            ..ReportScope::default()
        }),
    }
}

pub async fn list(st: &AppState, actor: &Actor, q: &ReportListQuery) -> AppResult<Vec<Report>> {
    let Some(scope) = list_scope(actor, q) else {
        return Ok(Vec::new());
    };
    Ok(repo::list(&st.db, scope, q.limit.clamp(1, 100), q.offset.max(0)).await?)
}

pub async fn load(st: &AppState, uid: &str) -> AppResult<Report> {
    repo::find_by_uid(&st.db, uid)
        .await?
        .ok_or_else(|| AppError::not_found("Report not found"))
}

pub async fn fetch_file(st: &AppState, report: &Report) -> AppResult<StoredObject> {
    st.storage.get_object(&report.file_key).await.map_err(|e| {
        warn!(error = %format!("{e:#}"), report_uid = %report.uid, "report download failed");
        AppError::unavailable("File storage is currently unavailable")
    })
}

pub async fn verify(st: &AppState, report: &Report) -> AppResult<Value> {
    match st.chain.verify(&report.uid).await {
        Ok(Some(result)) => Ok(json!({
            "uid": report.uid,
            "verified": true,
            "blockHash": report.block_hash,
            "result": result,
        })),
        Ok(None) => Err(AppError::not_found("No blockchain record for this report")),
        Err(e) => {
            warn!(error = %format!("{e:#}"), report_uid = %report.uid, "chain verify failed");
            Err(AppError::unavailable(
                "Blockchain service is currently unavailable",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::jwt::tests::sample_user,
        integrations::blockchain::{tests::FakeChain, ChainClient},
        reports::repo_types::ReportType,
        storage::tests::FakeStorage,
    };
    use bytes::Bytes;
    use std::sync::Arc;
    use uuid::Uuid;

    fn actor(role: Role, patient_id: Option<Uuid>) -> Actor {
        Actor {
            user: sample_user(role),
            patient_id,
            doctor_id: None,
        }
    }

    fn upload() -> ReportUpload {
        ReportUpload {
            title: "  Blood panel ".into(),
            report_type: ReportType::Lab,
            description: Some("   ".into()),
            patient_id: None,
            appointment_uid: None,
            file_name: "panel.pdf".into(),
            content_type: "application/pdf".into(),
            body: Bytes::from_static(b"%PDF-1.7"),
        }
    }

    fn report(patient_id: Uuid) -> Report {
        Report {
            id: Uuid::new_v4(),
            uid: "RPT-ABCD1234".into(),
            patient_id,
            doctor_id: None,
            appointment_id: None,
            uploaded_by: Uuid::new_v4(),
            title: "Blood panel".into(),
            report_type: ReportType::Lab,
            description: None,
            file_key: format!("reports/{patient_id}/RPT-ABCD1234.pdf"),
            file_name: "panel.pdf".into(),
            content_type: "application/pdf".into(),
            file_size: 8,
            ai_analysis: None,
            block_hash: None,
            chain_stored_at: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn upload_is_trimmed_and_checked() {
        let mut u = upload();
        validate_upload(&mut u).unwrap();
        assert_eq!(u.title, "Blood panel");
        assert_eq!(u.description, None);

        let mut u = upload();
        u.content_type = "application/zip".into();
        assert!(validate_upload(&mut u).is_err());

        let mut u = upload();
        u.body = Bytes::new();
        assert!(validate_upload(&mut u).is_err());

        let mut u = upload();
        u.title = " ".into();
        assert!(validate_upload(&mut u).is_err());
    }

    #[test]
    fn oversized_files_are_rejected() {
        let mut u = upload();
        u.body = Bytes::from(vec![0u8; MAX_REPORT_BYTES + 1]);
        assert_eq!(validate_upload(&mut u).unwrap_err().code(), "VALIDATION_ERROR");
    }

    #[test]
    fn patients_only_reach_their_own_reports() {
        let mine = Uuid::new_v4();
        let r = report(mine);
        assert!(ensure_can_access(&actor(Role::Patient, Some(mine)), &r).is_ok());
        assert!(ensure_can_access(&actor(Role::Patient, Some(Uuid::new_v4())), &r).is_err());
        assert!(ensure_can_access(&actor(Role::Patient, None), &r).is_err());
        assert!(ensure_can_access(&actor(Role::Doctor, None), &r).is_ok());
        assert!(ensure_can_access(&actor(Role::Admin, None), &r).is_ok());
    }

    #[test]
    fn list_scope_follows_role() {
        let q = ReportListQuery {
            patient_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        let me = Uuid::new_v4();
        let scope = list_scope(&actor(Role::Patient, Some(me)), &q).unwrap();
        assert_eq!(scope.patient_id, Some(me));
        assert_eq!(scope.uploaded_by, None);

        assert!(list_scope(&actor(Role::Patient, None), &q).is_none());

        let doc = actor(Role::Doctor, None);
        let scope = list_scope(&doc, &q).unwrap();
        assert_eq!(scope.uploaded_by, Some(doc.user.id));
        assert_eq!(scope.patient_id, q.patient_id);

        let scope = list_scope(&actor(Role::Admin, None), &q).unwrap();
        assert_eq!(scope.uploaded_by, None);
        assert_eq!(scope.patient_id, q.patient_id);
    }

    #[tokio::test]
    async fn patients_cannot_file_for_someone_else() {
        let st = AppState::fake();
        let mut u = upload();
        u.patient_id = Some(Uuid::new_v4());
        let err = create(&st, &actor(Role::Patient, Some(Uuid::new_v4())), u)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[tokio::test]
    async fn doctors_must_name_a_patient() {
        let st = AppState::fake();
        let err = create(&st, &actor(Role::Doctor, None), upload())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn storage_outage_is_service_unavailable() {
        let st = AppState {
            storage: Arc::new(FakeStorage {
                fail_puts: true,
                ..Default::default()
            }),
            ..AppState::fake()
        };
        let err = create(&st, &actor(Role::Patient, Some(Uuid::new_v4())), upload())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn verify_distinguishes_missing_records() {
        let chain = Arc::new(FakeChain::default());
        let st = AppState {
            chain: chain.clone(),
            ..AppState::fake()
        };
        let r = report(Uuid::new_v4());
        assert_eq!(verify(&st, &r).await.unwrap_err().code(), "NOT_FOUND");

        let upload = ChainUpload {
            patient_id: r.patient_id,
            file_name: &r.file_name,
            content_type: &r.content_type,
            metadata: json!({"fileId": r.uid}),
            labels: vec![],
            tags: vec![],
        };
        chain.store(&upload, b"%PDF").await.unwrap();
        let v = verify(&st, &r).await.unwrap();
        assert_eq!(v["verified"], true);
        assert_eq!(v["uid"], "RPT-ABCD1234");
    }

    #[tokio::test]
    async fn missing_object_is_service_unavailable() {
        let st = AppState::fake();
        let err = fetch_file(&st, &report(Uuid::new_v4())).await.unwrap_err();
        assert_eq!(err.code(), "SERVICE_UNAVAILABLE");
    }
}
