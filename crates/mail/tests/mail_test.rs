//! # Gmail Integration Tests

use anyhow::Result;
use gapi_helper::GapiError;
use gapi_helper_mail::MailService;
use gapi_helper_test_utils::TestSetup;
use httpmock::Method;
use serde_json::json;

const SENDER: &str = "robot@example.com";

#[tokio::test]
async fn test_send_and_trash_message() -> Result<()> {
    // --- Arrange ---
    let setup = TestSetup::new()?;
    let send_mock = setup.server.mock(|when, then| {
        when.method(Method::POST)
            .path("/users/robot@example.com/messages/send")
            .header("authorization", "Bearer test-token")
            .body_contains("\"raw\":");
        then.status(200)
            .json_body(json!({"id": "MSG1", "threadId": "T1", "labelIds": ["SENT"]}));
    });
    let trash_mock = setup.server.mock(|when, then| {
        when.method(Method::POST)
            .path("/users/robot@example.com/messages/MSG1/trash");
        then.status(200).json_body(json!({"id": "MSG1", "labelIds": ["TRASH"]}));
    });

    let mail = MailService::with_token_provider(&setup.config, setup.token_provider(), SENDER);
    let message = mail.build_message(
        "alice@example.com",
        "Report",
        "Hello",
        None,
        &["bob@example.com"],
        None,
        None,
    )?;

    // --- Act ---
    let id = mail.send_and_trash_message(&message).await?;

    // --- Assert ---
    assert_eq!(id, "MSG1");
    send_mock.assert();
    trash_mock.assert();
    Ok(())
}

#[tokio::test]
async fn test_force_test_email_redirects_and_drops_cc() -> Result<()> {
    let mut setup = TestSetup::new()?;
    setup.config.mail.force_test_email = true;
    setup.config.mail.to_test = Some("qa@example.com".to_string());

    let attachment = setup.temp_dir.path().join("export.csv");
    std::fs::write(&attachment, "a,b\n")?;

    let mail = MailService::with_token_provider(&setup.config, setup.token_provider(), SENDER);
    let message = mail.build_message(
        "alice@example.com",
        "Report",
        "Hello",
        Some("support@example.com"),
        &["bob@example.com"],
        Some(&attachment),
        None,
    )?;

    assert_eq!(message.to, "qa@example.com");
    assert!(message.cc.is_empty());
    assert_eq!(message.from, SENDER);
    assert_eq!(message.reply_to.as_deref(), Some("support@example.com"));
    let attachment = message.attachment.expect("attachment should be read");
    assert_eq!(attachment.filename, "export.csv");
    assert_eq!(attachment.content_type, "text/csv");
    assert_eq!(attachment.data, b"a,b\n");
    Ok(())
}

#[tokio::test]
async fn test_force_test_email_without_recipient_is_a_configuration_error() -> Result<()> {
    let mut setup = TestSetup::new()?;
    setup.config.mail.force_test_email = true;

    let mail = MailService::with_token_provider(&setup.config, setup.token_provider(), SENDER);
    let err = mail
        .build_message("alice@example.com", "Report", "Hello", None, &[], None, None)
        .unwrap_err();
    assert!(matches!(err, GapiError::Configuration(_)));
    Ok(())
}

#[tokio::test]
async fn test_response_without_id_is_a_write_error() -> Result<()> {
    let setup = TestSetup::new()?;
    setup.server.mock(|when, then| {
        when.method(Method::POST)
            .path("/users/robot@example.com/messages/send");
        then.status(200).json_body(json!({}));
    });

    let mail = MailService::with_token_provider(&setup.config, setup.token_provider(), SENDER);
    let message =
        mail.build_message("alice@example.com", "Report", "Hello", None, &[], None, None)?;
    let err = mail.send_message(&message).await.unwrap_err();

    assert!(matches!(err, GapiError::RemoteWrite { status: None, .. }));
    assert!(err.to_string().contains("Could not send email to alice@example.com"));
    Ok(())
}

#[tokio::test]
async fn test_line_breaks_in_headers_are_never_sent() -> Result<()> {
    // --- Arrange ---
    let setup = TestSetup::new()?;
    let send_mock = setup.server.mock(|when, then| {
        when.method(Method::POST)
            .path("/users/robot@example.com/messages/send");
        then.status(200).json_body(json!({"id": "m-1"}));
    });
    let mail = MailService::with_token_provider(&setup.config, setup.token_provider(), SENDER);

    // --- Act ---
    let built = mail.build_message(
        "alice@example.com",
        "Report\r\nBcc: attacker@example.com",
        "Hello",
        None,
        &[],
        None,
        None,
    );
    let mut message =
        mail.build_message("alice@example.com", "Report", "Hello", None, &[], None, None)?;
    message.reply_to = Some("support@example.com\nBcc: attacker@example.com".to_string());
    let sent = mail.send_message(&message).await;

    // --- Assert ---
    assert!(matches!(built, Err(GapiError::Addressing(_))));
    assert!(matches!(sent, Err(GapiError::Addressing(_))));
    send_mock.assert_hits(0);
    Ok(())
}
