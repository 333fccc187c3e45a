use std::collections::HashSet;
use std::sync::Arc;

use super::common::*;
use crate::diagnostics::catalog::{BandLevel, RspCode};
use crate::diagnostics::domain::{
    DiagnosticOutcome, FormulaSubmission, LeadStatusUpdate, Product, ResultFilter, ResultId,
    RspSubmission, TypologySubmission, UserId, LEAD_STATUS_NEW,
};
use chrono::{Duration, Utc};
use crate::diagnostics::notifications::MessageKind;
use crate::diagnostics::repository::RepositoryError;
use crate::diagnostics::service::{DiagnosticService, DiagnosticServiceError};

fn typology_submission(user_id: i64, pairs: &[(u32, i64)]) -> TypologySubmission {
    TypologySubmission {
        user_id: Some(UserId(user_id)),
        answers: typology_answers(pairs).into(),
    }
}

#[test]
fn typology_submission_is_scored_stored_and_reported() {
    let (service, repository, notifier) = build_service();

    let receipt = service
        .submit_typology(typology_submission(501, &[(1, 3), (2, 3), (3, 2)]))
        .expect("submission accepted");

    assert_eq!(receipt.id, Some(ResultId(1)));
    assert_eq!(receipt.product, Product::Typology);
    assert_eq!(receipt.outcome.primary_key(), "professional");
    assert!(receipt.notified);

    let stored = repository.stored_results();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].user_id, UserId(501));
    assert_eq!(stored[0].answers["1"], 3);

    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].kind, MessageKind::TestResult);
    assert!(messages[0].text.starts_with("🧩 <b>Прохождение теста (Теремок)</b>"));
    assert!(messages[0].text.contains("Профессионал"));
    assert!(messages[0].text.ends_with("🆔 ID: <code>501</code>"));
}

#[test]
fn submissions_without_user_id_are_rejected_before_scoring() {
    let (service, repository, notifier) = build_service();

    let err = service
        .submit_formula(FormulaSubmission {
            user_id: None,
            answers: likert(&[4; 10]),
        })
        .expect_err("user id required");

    assert!(matches!(err, DiagnosticServiceError::MissingUserId));
    assert!(repository.stored_results().is_empty());
    assert!(notifier.messages().is_empty());
}

#[test]
fn access_gate_blocks_users_outside_the_list() {
    let repository = Arc::new(MemoryRepository::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let subscribers = SubscriberList(HashSet::from([UserId(7)]));
    let service = DiagnosticService::new(catalogs(), repository.clone(), notifier)
        .with_access_gate(Arc::new(subscribers));

    assert!(service.can_start(UserId(7)));
    assert!(!service.can_start(UserId(8)));

    let err = service
        .submit_rsp(RspSubmission {
            user_id: Some(UserId(8)),
            answers: codes(&["result"]),
        })
        .expect_err("not subscribed");
    assert!(matches!(err, DiagnosticServiceError::AccessDenied(UserId(8))));

    service
        .submit_rsp(RspSubmission {
            user_id: Some(UserId(7)),
            answers: codes(&["result"]),
        })
        .expect("subscriber admitted");
    assert_eq!(repository.stored_results().len(), 1);
}

#[test]
fn formula_message_includes_total() {
    let (service, _repository, notifier) = build_service();

    let receipt = service
        .submit_formula(FormulaSubmission {
            user_id: Some(UserId(42)),
            answers: likert(&[3, 3, 3, 3, 3, 3, 3, 3, 2, 2]),
        })
        .expect("submission accepted");

    match &receipt.outcome {
        DiagnosticOutcome::Formula(outcome) => {
            assert_eq!(outcome.total, 28);
            assert_eq!(outcome.band, BandLevel::Yellow);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let text = &notifier.messages()[0].text;
    assert!(text.contains("Формула команды"));
    assert!(text.contains("📊 <b>Сумма баллов:</b> 28"));
}

#[test]
fn mixed_rsp_profile_is_spelled_out_for_the_operator() {
    let (service, _repository, notifier) = build_service();

    let receipt = service
        .submit_rsp(RspSubmission {
            user_id: Some(UserId(9)),
            answers: codes(&["status", "result", "status", "result", "process"]),
        })
        .expect("submission accepted");

    match &receipt.outcome {
        DiagnosticOutcome::Rsp(outcome) => {
            assert_eq!(outcome.primary, RspCode::Result);
            assert!(outcome.mixed);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(notifier.messages()[0].text.contains("смешанный профиль"));
}

#[test]
fn known_lead_details_are_attached_to_result_message() {
    let (service, _repository, notifier) = build_service();
    service.submit_lead(lead(77)).expect("lead stored");

    service
        .submit_typology(typology_submission(77, &[(1, 0)]))
        .expect("submission accepted");

    let messages = notifier.messages();
    let result_message = messages
        .iter()
        .find(|message| message.kind == MessageKind::TestResult)
        .expect("result message");
    assert!(result_message.text.contains("• Имя: Ирина"));
    assert!(result_message.text.contains("ООО Северный ветер"));
}

#[test]
fn notification_failure_does_not_lose_the_result() {
    let repository = Arc::new(MemoryRepository::default());
    let service = DiagnosticService::new(catalogs(), repository.clone(), Arc::new(OfflineNotifier));

    let receipt = service
        .submit_typology(typology_submission(3, &[(2, 1)]))
        .expect("stored despite notifier outage");

    assert!(!receipt.notified);
    assert_eq!(repository.stored_results().len(), 1);
}

#[test]
fn repository_outage_surfaces_as_error() {
    let service = DiagnosticService::new(
        catalogs(),
        Arc::new(UnavailableRepository),
        Arc::new(MemoryNotifier::default()),
    );

    let err = service
        .submit_typology(typology_submission(3, &[(2, 1)]))
        .expect_err("storage offline");
    assert!(matches!(
        err,
        DiagnosticServiceError::Repository(RepositoryError::Unavailable(_))
    ));
}

#[test]
fn latest_result_returns_newest_or_not_found() {
    let (service, _repository, _notifier) = build_service();

    let missing = service.latest_result(UserId(11)).expect_err("nothing yet");
    assert!(matches!(
        missing,
        DiagnosticServiceError::Repository(RepositoryError::NotFound)
    ));

    service
        .submit_typology(typology_submission(11, &[(1, 0)]))
        .expect("first");
    service
        .submit_formula(FormulaSubmission {
            user_id: Some(UserId(11)),
            answers: likert(&[4; 10]),
        })
        .expect("second");

    let latest = service.latest_result(UserId(11)).expect("result recorded");
    assert_eq!(latest.product(), Product::Formula);
    assert_eq!(latest.id, Some(ResultId(2)));
}

#[test]
fn results_can_be_filtered_by_product_and_primary() {
    let (service, _repository, _notifier) = build_service();
    service
        .submit_typology(typology_submission(1, &[(1, 0)]))
        .expect("bird");
    service
        .submit_typology(typology_submission(2, &[(1, 3)]))
        .expect("professional");
    service
        .submit_rsp(RspSubmission {
            user_id: Some(UserId(3)),
            answers: codes(&["process"]),
        })
        .expect("rsp");

    let typology = service
        .results(&ResultFilter {
            product: Some(Product::Typology),
            ..ResultFilter::default()
        })
        .expect("list");
    assert_eq!(typology.len(), 2);
    assert_eq!(typology[0].user_id, UserId(2));

    let professionals = service
        .results(&ResultFilter {
            primary: Some("professional".to_string()),
            ..ResultFilter::default()
        })
        .expect("list");
    assert_eq!(professionals.len(), 1);

    let limited = service
        .results(&ResultFilter {
            limit: Some(1),
            ..ResultFilter::default()
        })
        .expect("list");
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].product(), Product::Rsp);
}

#[test]
fn lead_is_normalized_and_forwarded_with_latest_result() {
    let (service, _repository, notifier) = build_service();
    service
        .submit_typology(typology_submission(55, &[(4, 0)]))
        .expect("hamster");

    let mut raw = lead(55);
    raw.name = "  Ирина ".to_string();
    raw.username = Some(" @irina_hr ".to_string());
    raw.company = Some("   ".to_string());
    raw.request = Some("<b>срочно</b>".to_string());

    let stored = service.submit_lead(raw).expect("lead stored");

    assert_eq!(stored.name, "Ирина");
    assert_eq!(stored.username.as_deref(), Some("irina_hr"));
    assert_eq!(stored.company, None);

    let messages = notifier.messages();
    let lead_message = messages.last().expect("lead message");
    assert_eq!(lead_message.kind, MessageKind::NewLead);
    assert!(lead_message.text.starts_with("📩 <b>Новая заявка (bot)</b>"));
    assert!(lead_message.text.contains("🎯 <b>Результат:</b> 🐹 Хомяк"));
    assert!(lead_message.text.contains("&lt;b&gt;срочно&lt;/b&gt;"));
    assert!(lead_message.text.contains("@irina_hr"));
    assert!(!lead_message.text.contains("🏢"));
}

#[test]
fn lead_without_contact_is_rejected() {
    let (service, _repository, notifier) = build_service();
    let mut raw = lead(5);
    raw.contact = " ".to_string();

    let err = service.submit_lead(raw).expect_err("contact required");

    assert!(matches!(err, DiagnosticServiceError::InvalidLead(_)));
    assert!(notifier.messages().is_empty());
    assert!(service.leads().expect("list").is_empty());
}

#[test]
fn resubmitted_lead_replaces_previous_details() {
    let (service, _repository, _notifier) = build_service();
    service.submit_lead(lead(5)).expect("first");
    let mut updated = lead(5);
    updated.contact = "irina@example.com".to_string();
    service.submit_lead(updated).expect("second");

    let leads = service.leads().expect("list");
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].contact, "irina@example.com");
}

#[test]
fn export_joins_results_with_lead_contacts() {
    let (service, _repository, _notifier) = build_service();
    service.submit_lead(lead(100)).expect("lead");
    service
        .submit_typology(typology_submission(100, &[(1, 3), (2, 3)]))
        .expect("typology");
    service
        .submit_formula(FormulaSubmission {
            user_id: Some(UserId(200)),
            answers: likert(&[1; 10]),
        })
        .expect("formula");

    let mut buffer = Vec::new();
    let rows = service
        .export_results(&ResultFilter::default(), &mut buffer)
        .expect("export");
    let csv = String::from_utf8(buffer).expect("utf-8");
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(rows, 2);
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("id,created_at,user_id,product,result_key"));
    assert!(lines[1].contains(",200,formula,red,"));
    assert!(lines[1].contains("total:10"));
    assert!(lines[2].contains(",100,typology,professional,"));
    assert!(lines[2].contains("professional:4"));
    assert!(lines[2].contains("Ирина"));
    assert!(lines[0].ends_with(",contact,lead_status"));
    assert!(lines[1].ends_with(','));
    assert!(lines[2].ends_with(",new"));
}

#[test]
fn lead_status_is_operator_owned_across_resubmissions() {
    let (service, _repository, _notifier) = build_service();
    let mut raw = lead(5);
    raw.status = "closed".to_string();
    raw.notes = Some("from the form".to_string());

    let stored = service.submit_lead(raw).expect("lead stored");
    assert_eq!(stored.status, LEAD_STATUS_NEW);
    assert_eq!(stored.notes, None);

    let updated = service
        .update_lead_status(
            UserId(5),
            LeadStatusUpdate {
                status: " in_progress ".to_string(),
                notes: Some("перезвонить в пятницу".to_string()),
            },
        )
        .expect("status updated");
    assert_eq!(updated.status, "in_progress");
    assert_eq!(updated.contact, "+7 900 000-00-00");

    let mut again = lead(5);
    again.contact = "irina@example.com".to_string();
    let resubmitted = service.submit_lead(again).expect("resubmitted");
    assert_eq!(resubmitted.status, "in_progress");
    assert_eq!(resubmitted.notes.as_deref(), Some("перезвонить в пятницу"));

    let status_only = service
        .update_lead_status(
            UserId(5),
            LeadStatusUpdate {
                status: "done".to_string(),
                notes: None,
            },
        )
        .expect("status updated");
    assert_eq!(status_only.notes.as_deref(), Some("перезвонить в пятницу"));
    assert_eq!(status_only.contact, "irina@example.com");
}

#[test]
fn lead_status_update_requires_a_lead_and_a_status() {
    let (service, _repository, _notifier) = build_service();

    let err = service
        .update_lead_status(
            UserId(77),
            LeadStatusUpdate {
                status: "done".to_string(),
                notes: None,
            },
        )
        .expect_err("no lead stored");
    assert!(matches!(
        err,
        DiagnosticServiceError::Repository(RepositoryError::NotFound)
    ));

    service.submit_lead(lead(77)).expect("lead");
    let err = service
        .update_lead_status(
            UserId(77),
            LeadStatusUpdate {
                status: "  ".to_string(),
                notes: None,
            },
        )
        .expect_err("blank status");
    assert!(matches!(err, DiagnosticServiceError::InvalidLead(_)));
}

#[test]
fn statistics_group_results_by_product_primary_and_day() {
    let (service, _repository, _notifier) = build_service();
    service.submit_lead(lead(1)).expect("lead");
    service
        .submit_typology(typology_submission(1, &[(1, 3)]))
        .expect("professional");
    service
        .submit_typology(typology_submission(2, &[(1, 3), (2, 3)]))
        .expect("professional");
    service
        .submit_typology(typology_submission(3, &[(4, 0)]))
        .expect("hamster");
    service
        .submit_rsp(RspSubmission {
            user_id: Some(UserId(4)),
            answers: codes(&["process"]),
        })
        .expect("rsp");

    let all = service
        .statistics(&ResultFilter::default())
        .expect("statistics");
    assert_eq!(all.total, 4);
    assert_eq!(all.leads, 1);
    assert_eq!(all.by_product.get(&Product::Typology), Some(&3));
    assert_eq!(all.by_product.get(&Product::Rsp), Some(&1));
    assert_eq!(all.by_product.get(&Product::Formula), None);
    let typology = &all.by_primary[&Product::Typology];
    assert_eq!(typology.get("professional"), Some(&2));
    assert_eq!(typology.get("hamster"), Some(&1));
    assert_eq!(all.daily.values().sum::<usize>(), 4);

    let rsp_only = service
        .statistics(&ResultFilter {
            product: Some(Product::Rsp),
            ..ResultFilter::default()
        })
        .expect("statistics");
    assert_eq!(rsp_only.total, 1);
    assert_eq!(rsp_only.by_primary[&Product::Rsp].get("process"), Some(&1));

    let future = service
        .statistics(&ResultFilter {
            since: Some(Utc::now() + Duration::hours(1)),
            ..ResultFilter::default()
        })
        .expect("statistics");
    assert_eq!(future.total, 0);
    assert!(future.daily.is_empty());
}

#[test]
fn export_with_unavailable_storage_fails() {
    let service = DiagnosticService::new(
        catalogs(),
        Arc::new(UnavailableRepository),
        Arc::new(MemoryNotifier::default()),
    );

    let err = service
        .export_results(&ResultFilter::default(), Vec::new())
        .expect_err("storage offline");
    assert!(matches!(err, DiagnosticServiceError::Repository(_)));
}
