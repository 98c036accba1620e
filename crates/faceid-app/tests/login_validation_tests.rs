//! Integration tests for the credential login path.

mod common;

use faceid_app::AppError;
use faceid_core::{Credentials, SessionState};
use faceid_ui::Notification;

#[test]
fn login_validation_tests_empty_password_sends_nothing() {
    let mut harness = common::harness();
    harness.connect(0);

    let result = harness.client.submit_login(&Credentials::new("maitri", ""));

    assert!(matches!(result, Err(AppError::Validation)));
    assert!(harness.wire.sent().is_empty());
    assert_eq!(harness.client.take_notifications(), vec![Notification::Validation]);
}

#[test]
fn login_validation_tests_disconnected_submit_sends_nothing() {
    let mut harness = common::harness();

    let result = harness.client.submit_login(&Credentials::new("maitri", "secret"));

    assert!(matches!(result, Err(AppError::Connectivity(_))));
    assert!(harness.wire.sent().is_empty());
}

#[test]
fn login_validation_tests_sends_credentials_as_login_event() {
    let mut harness = common::harness();
    harness.connect(0);

    harness
        .client
        .submit_login(&Credentials::new("maitri", "secret"))
        .expect("login should send");

    let sent = harness.wire.sent();
    assert_eq!(sent, vec![r#"42["login",{"username":"maitri","password":"secret"}]"#.to_string()]);
}

#[test]
fn login_validation_tests_results_become_notifications() {
    let mut harness = common::harness();
    harness.connect(0);

    harness.server(
        "login_result",
        serde_json::json!({"success": true, "username": "maitri", "requires_face_id": true}),
        10,
    );
    harness.server("login_result", serde_json::json!({"success": true, "username": "guest"}), 20);
    harness.server("login_result", serde_json::json!({"success": false}), 30);

    let messages: Vec<String> = harness
        .client
        .take_notifications()
        .iter()
        .map(Notification::message)
        .collect();
    assert_eq!(
        messages,
        vec![
            "User maitri found! Please use Face ID for authentication.".to_string(),
            "Welcome guest! Login successful!".to_string(),
            "Login failed".to_string(),
        ]
    );
    assert_eq!(harness.client.state(), SessionState::Idle);
}
