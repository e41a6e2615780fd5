use super::common::*;
use std::sync::Arc;

use crate::portal::domain::{ApplicationStatus, JobId, JobStatus, StudentId};
use crate::portal::forms::{ApplicationForm, StudentProfileUpdate};
use crate::portal::resume::ResumeError;
use crate::portal::service::{ErrorKind, PortalError};
use crate::portal::store::{EntityStore, MemoryStore, SqliteStore, StoreError};
use crate::portal::workflow::InvalidTransition;

fn cover_note(text: &str) -> ApplicationForm {
    ApplicationForm {
        cover_note: Some(text.to_string()),
    }
}

#[test]
fn apply_records_the_application_and_queues_both_notifications() {
    let harness = build_service();
    let recruiter = signed_in_recruiter(&harness.service, "hr@acme.io", "Acme");
    let student = signed_in_student(&harness.service, "asha@campus.edu", "Asha");
    let job = harness
        .service
        .post_job(&recruiter, job_posting("Backend Engineer", Some(date(2026, 11, 20))))
        .expect("job posted");
    assert_eq!(job.details.company, "Acme");
    assert_eq!(job.status, JobStatus::Open);

    let application = harness
        .service
        .apply(&student, job.id, cover_note("Keen to join"))
        .expect("application accepted");
    assert_eq!(application.status, ApplicationStatus::Submitted);
    assert_eq!(application.cover_note.as_deref(), Some("Keen to join"));

    let messages = harness.notifier.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].to, "hr@acme.io");
    assert!(messages[0].body.contains("asha@campus.edu"));
    assert_eq!(messages[1].to, "asha@campus.edu");
    assert!(messages[1].body.contains("Interview date: 2026-11-20"));
    assert!(messages[1].body.contains("Interview place: Seminar Hall B"));
}

#[test]
fn second_application_to_the_same_job_is_a_duplicate() {
    let harness = build_service();
    let recruiter = signed_in_recruiter(&harness.service, "hr@acme.io", "Acme");
    let student = signed_in_student(&harness.service, "asha@campus.edu", "Asha");
    let job = harness
        .service
        .post_job(&recruiter, job_posting("Backend Engineer", None))
        .expect("job posted");

    harness
        .service
        .apply(&student, job.id, ApplicationForm::default())
        .expect("first application");
    match harness
        .service
        .apply(&student, job.id, ApplicationForm::default())
    {
        Err(PortalError::Store(StoreError::DuplicateKey { .. })) => {}
        other => panic!("expected duplicate key, got {other:?}"),
    }
    assert_eq!(harness.notifier.messages().len(), 2);
}

#[test]
fn concurrent_applications_yield_exactly_one_record() {
    for store in [
        Arc::new(MemoryStore::new()) as Arc<dyn EntityStore>,
        Arc::new(SqliteStore::open_in_memory().expect("sqlite opens")),
    ] {
        let harness = build_service_with(store, Arc::new(RecordingNotifier::default()));
        let recruiter = signed_in_recruiter(&harness.service, "hr@acme.io", "Acme");
        let student = signed_in_student(&harness.service, "asha@campus.edu", "Asha");
        let job = harness
            .service
            .post_job(&recruiter, job_posting("Backend Engineer", None))
            .expect("job posted");

        let outcomes: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let service = &harness.service;
                    scope.spawn(move || service.apply(&student, job.id, ApplicationForm::default()))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("thread completes"))
                .collect()
        });

        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
        assert!(outcomes.iter().any(|outcome| matches!(
            outcome,
            Err(err) if err.kind() == ErrorKind::DuplicateKey
        )));
        assert_eq!(
            harness
                .store
                .applications_for_job(job.id)
                .expect("list")
                .len(),
            1
        );
    }
}

#[test]
fn closed_jobs_reject_applications_and_second_close() {
    let harness = build_service();
    let recruiter = signed_in_recruiter(&harness.service, "hr@acme.io", "Acme");
    let student = signed_in_student(&harness.service, "asha@campus.edu", "Asha");
    let job = harness
        .service
        .post_job(&recruiter, job_posting("Backend Engineer", None))
        .expect("job posted");

    let closed = harness.service.close_job(&recruiter, job.id).expect("close");
    assert_eq!(closed.status, JobStatus::Closed);
    assert!(closed.closed_at.is_some());

    match harness
        .service
        .apply(&student, job.id, ApplicationForm::default())
    {
        Err(PortalError::Transition(InvalidTransition { entity, .. })) => {
            assert_eq!(entity, "application")
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }

    let err = harness
        .service
        .close_job(&recruiter, job.id)
        .expect_err("already closed");
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    assert!(harness.notifier.messages().is_empty());
    assert!(harness.service.open_jobs().expect("list").is_empty());
}

#[test]
fn recruiters_only_manage_their_own_postings() {
    let harness = build_service();
    let acme = signed_in_recruiter(&harness.service, "hr@acme.io", "Acme");
    let globex = signed_in_recruiter(&harness.service, "hr@globex.io", "Globex");
    let student = signed_in_student(&harness.service, "asha@campus.edu", "Asha");
    let job = harness
        .service
        .post_job(&acme, job_posting("Backend Engineer", None))
        .expect("job posted");
    let application = harness
        .service
        .apply(&student, job.id, ApplicationForm::default())
        .expect("applied");

    for result in [
        harness.service.close_job(&globex, job.id).map(|_| ()),
        harness.service.delete_job(&globex, job.id),
        harness
            .service
            .update_job(&globex, job.id, job_posting("Renamed", None))
            .map(|_| ()),
        harness
            .service
            .review_application(&globex, application.id)
            .map(|_| ()),
        harness.service.job_applications(&globex, job.id).map(|_| ()),
    ] {
        assert_eq!(result.expect_err("foreign recruiter").kind(), ErrorKind::Forbidden);
    }

    let err = harness
        .service
        .post_job(&student, job_posting("Student posting", None))
        .expect_err("students cannot post");
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let err = harness
        .service
        .apply(&acme, job.id, ApplicationForm::default())
        .expect_err("recruiters cannot apply");
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[test]
fn review_is_one_way_and_visible_to_both_sides() {
    let harness = build_service();
    let recruiter = signed_in_recruiter(&harness.service, "hr@acme.io", "Acme");
    let student = signed_in_student(&harness.service, "asha@campus.edu", "Asha");
    let job = harness
        .service
        .post_job(&recruiter, job_posting("Backend Engineer", None))
        .expect("job posted");
    let application = harness
        .service
        .apply(&student, job.id, ApplicationForm::default())
        .expect("applied");

    let applicants = harness
        .service
        .job_applications(&recruiter, job.id)
        .expect("applicants");
    assert_eq!(applicants.len(), 1);
    assert_eq!(applicants[0].student.email, "asha@campus.edu");

    let reviewed = harness
        .service
        .review_application(&recruiter, application.id)
        .expect("review");
    assert_eq!(reviewed.status, ApplicationStatus::Reviewed);
    assert!(reviewed.reviewed_at.is_some());

    let err = harness
        .service
        .review_application(&recruiter, application.id)
        .expect_err("already reviewed");
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    let mine = harness.service.my_applications(&student).expect("student view");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].status, ApplicationStatus::Reviewed);
    let theirs = harness
        .service
        .my_applications(&recruiter)
        .expect("recruiter view");
    assert_eq!(theirs, mine);
}

#[test]
fn reviewing_after_the_posting_closes_is_allowed() {
    let harness = build_service();
    let recruiter = signed_in_recruiter(&harness.service, "hr@acme.io", "Acme");
    let student = signed_in_student(&harness.service, "asha@campus.edu", "Asha");
    let job = harness
        .service
        .post_job(&recruiter, job_posting("Backend Engineer", None))
        .expect("job posted");
    let application = harness
        .service
        .apply(&student, job.id, ApplicationForm::default())
        .expect("applied");
    harness.service.close_job(&recruiter, job.id).expect("close");

    harness
        .service
        .review_application(&recruiter, application.id)
        .expect("review on a closed posting");
}

#[test]
fn deleting_a_job_drops_its_applications() {
    let harness = build_service();
    let recruiter = signed_in_recruiter(&harness.service, "hr@acme.io", "Acme");
    let student = signed_in_student(&harness.service, "asha@campus.edu", "Asha");
    let job = harness
        .service
        .post_job(&recruiter, job_posting("Backend Engineer", None))
        .expect("job posted");
    harness
        .service
        .apply(&student, job.id, ApplicationForm::default())
        .expect("applied");

    harness.service.delete_job(&recruiter, job.id).expect("delete");
    assert!(harness
        .service
        .my_applications(&student)
        .expect("list")
        .is_empty());
    assert_eq!(
        harness.service.job(job.id).expect_err("gone").kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn update_job_keeps_company_and_status() {
    let harness = build_service();
    let recruiter = signed_in_recruiter(&harness.service, "hr@acme.io", "Acme");
    let job = harness
        .service
        .post_job(&recruiter, job_posting("Backend Engineer", None))
        .expect("job posted");

    let mut posting = job_posting("Senior Backend Engineer", None);
    posting.location = "Remote".to_string();
    let updated = harness
        .service
        .update_job(&recruiter, job.id, posting)
        .expect("update");
    assert_eq!(updated.details.title, "Senior Backend Engineer");
    assert_eq!(updated.details.location, "Remote");
    assert_eq!(updated.details.company, "Acme");
    assert_eq!(updated.status, JobStatus::Open);
    assert_eq!(
        harness
            .service
            .recruiter_jobs(&recruiter)
            .expect("own jobs")
            .len(),
        1
    );
}

#[test]
fn expiry_closes_only_postings_whose_interview_has_passed() {
    let harness = build_service();
    let recruiter = signed_in_recruiter(&harness.service, "hr@acme.io", "Acme");
    let past = harness
        .service
        .post_job(&recruiter, job_posting("Past", Some(date(2026, 10, 1))))
        .expect("posted");
    let today = harness
        .service
        .post_job(&recruiter, job_posting("Today", Some(date(2026, 10, 16))))
        .expect("posted");
    let undated = harness
        .service
        .post_job(&recruiter, job_posting("Undated", None))
        .expect("posted");

    let expired = harness
        .service
        .expire_jobs(date(2026, 10, 16))
        .expect("expiry runs");
    assert_eq!(expired, vec![past.id]);
    assert_eq!(
        harness.service.job(past.id).expect("job").status,
        JobStatus::Closed
    );

    let open: Vec<JobId> = harness
        .service
        .open_jobs()
        .expect("list")
        .into_iter()
        .map(|job| job.id)
        .collect();
    assert_eq!(open, vec![today.id, undated.id]);

    assert!(harness
        .service
        .expire_jobs(date(2026, 10, 16))
        .expect("second run")
        .is_empty());
}

#[test]
fn failing_notifier_does_not_fail_the_application() {
    let harness = build_service_with(Arc::new(MemoryStore::new()), Arc::new(FailingNotifier));
    let recruiter = signed_in_recruiter(&harness.service, "hr@acme.io", "Acme");
    let student = signed_in_student(&harness.service, "asha@campus.edu", "Asha");
    let job = harness
        .service
        .post_job(&recruiter, job_posting("Backend Engineer", None))
        .expect("job posted");

    harness
        .service
        .apply(&student, job.id, ApplicationForm::default())
        .expect("application survives notifier failure");
    assert_eq!(
        harness
            .store
            .applications_for_job(job.id)
            .expect("list")
            .len(),
        1
    );
}

#[test]
fn export_renders_the_profile_for_permitted_callers() {
    let harness = build_service();
    let recruiter = signed_in_recruiter(&harness.service, "hr@acme.io", "Acme");
    let other_recruiter = signed_in_recruiter(&harness.service, "hr@globex.io", "Globex");
    let student = signed_in_student(&harness.service, "asha@campus.edu", "Asha");
    let student_id = student.student().expect("student capability");

    let document = harness
        .service
        .export_profile(&student, student_id)
        .expect("own export");
    assert_eq!(document.content_type, mime::APPLICATION_PDF);
    let text = lopdf::Document::load_mem(&document.bytes)
        .expect("valid pdf")
        .extract_text(&[1])
        .expect("page text");
    assert!(text.contains("Asha"));
    assert!(text.contains("Skills: Go"));

    let err = harness
        .service
        .export_profile(&recruiter, student_id)
        .expect_err("no application yet");
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let job = harness
        .service
        .post_job(&recruiter, job_posting("Backend Engineer", None))
        .expect("job posted");
    harness
        .service
        .apply(&student, job.id, ApplicationForm::default())
        .expect("applied");
    harness
        .service
        .export_profile(&recruiter, student_id)
        .expect("recruiter with an application");
    assert_eq!(
        harness
            .service
            .export_profile(&other_recruiter, student_id)
            .expect_err("unrelated recruiter")
            .kind(),
        ErrorKind::Forbidden
    );

    assert_eq!(
        harness
            .service
            .export_profile(&student, StudentId(9_999))
            .expect_err("missing student")
            .kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn profile_updates_preserve_the_uploaded_resume() {
    let harness = build_service();
    let student = signed_in_student(&harness.service, "asha@campus.edu", "Asha");

    let student_id = student.student().expect("student capability");
    assert!(matches!(
        harness.service.resume(&student, student_id),
        Err(PortalError::Resume(ResumeError::Missing(_)))
    ));

    let view = harness
        .service
        .upload_resume(&student, "Asha CV.pdf", b"%PDF-1.4 resume")
        .expect("upload");
    let key = view.profile.resume.clone().expect("resume key stored");
    assert!(key.ends_with("_Asha_CV.pdf"));

    let updated = harness
        .service
        .update_student_profile(
            &student,
            StudentProfileUpdate {
                email: "asha.rao@campus.edu".to_string(),
                name: "Asha Rao".to_string(),
                phone: None,
                city: Some("Pune".to_string()),
                state: None,
                country: Some("India".to_string()),
                university: Some("COEP".to_string()),
                degree: Some("B.Tech".to_string()),
                graduation_year: Some("2026".to_string()),
                job_preference: None,
                skills: vec!["Rust".to_string()],
                bio: None,
            },
        )
        .expect("update");
    assert_eq!(updated.email, "asha.rao@campus.edu");
    assert_eq!(updated.profile.resume.as_deref(), Some(key.as_str()));

    let document = harness
        .service
        .resume(&student, updated.id)
        .expect("resume download");
    assert_eq!(document.bytes, b"%PDF-1.4 resume");
    assert_eq!(document.content_type, mime::APPLICATION_PDF);

    let err = harness
        .service
        .upload_resume(&student, "payload.exe", b"MZ")
        .expect_err("unsupported type");
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn store_outage_surfaces_as_internal() {
    let harness = build_service_with(
        Arc::new(UnavailableStore),
        Arc::new(RecordingNotifier::default()),
    );
    let err = harness
        .service
        .register_student(student_registration("asha@campus.edu", "Asha"))
        .expect_err("store offline");
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(harness.service.open_jobs().is_err());
}
