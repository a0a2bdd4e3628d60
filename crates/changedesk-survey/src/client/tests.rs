#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use super::*;

#[test]
fn workspaces_follow_the_subtype_table() {
    assert_eq!(workspace_for(ObjectType::Change), "changes");
    assert_eq!(workspace_for(ObjectType::Announcement(AnnouncementSubtype::Cic)), "cic");
    assert_eq!(workspace_for(ObjectType::Announcement(AnnouncementSubtype::Finops)), "finops");
    assert_eq!(
        workspace_for(ObjectType::Announcement(AnnouncementSubtype::Innersource)),
        "innersource"
    );
    assert_eq!(workspace_for(ObjectType::Announcement(AnnouncementSubtype::General)), "general");
}

#[test]
fn question_sets_carry_the_three_shapes() {
    for object_type in [
        ObjectType::Change,
        ObjectType::Announcement(AnnouncementSubtype::Cic),
        ObjectType::Announcement(AnnouncementSubtype::General),
    ] {
        let questions = question_set(object_type);
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].kind, SurveyQuestionKind::YesNo);
        assert_eq!(questions[1].kind, SurveyQuestionKind::Nps);
        assert_eq!(questions[2].kind, SurveyQuestionKind::FreeText);
    }
    let cic = question_set(ObjectType::Announcement(AnnouncementSubtype::Cic));
    assert!(cic[0].prompt.contains("cic"));
    let change = question_set(ObjectType::Change);
    assert!(change[0].prompt.contains("change"));
}

#[test]
fn recording_service_is_idempotent_by_theme_name() {
    let service = RecordingSurveyService::new();
    assert_eq!(service.find_theme("changedesk-cic").expect("find"), None);
    let theme = SurveyTheme {
        name: "changedesk-cic".to_string(),
        color: "#2563eb".to_string(),
        logo_src: None,
    };
    let created = service.create_theme(&theme).expect("create");
    assert_eq!(service.find_theme("changedesk-cic").expect("find"), Some(created));
}

#[test]
fn typeform_client_rejects_missing_credentials() {
    assert!(matches!(TypeformClient::new("", "token"), Err(SurveyError::Invalid(_))));
    assert!(matches!(
        TypeformClient::new("https://api.example.com", "  "),
        Err(SurveyError::Invalid(_))
    ));
}
