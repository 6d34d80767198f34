#[cfg(test)]
mod tests {
    use crate::error::*;
    use crate::artifact::*;
    use crate::config::*;
    use crate::event::*;
    use crate::message::*;
    use crate::session::*;
    use chrono::Utc;

    // ─── Message Tests ───────────────────────────────────────

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").content.as_text(), "u");
        assert_eq!(Message::assistant("a").role, Role::Assistant);
    }

    #[test]
    fn test_message_with_image_serializes_parts() {
        let msg = Message::user_with_image("what is this?", "https://example.com/cat.png");
        assert_eq!(msg.content.as_text(), "what is this?");

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(json["content"][1]["image_url"]["url"], "https://example.com/cat.png");
    }

    // ─── Session Tests ───────────────────────────────────────

    #[test]
    fn test_session_new_is_active_and_empty() {
        let session = Session::new("abc".to_string(), Modality::Csv);
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.history.is_empty());
        assert!(session.artifact_metadata.is_none());
        assert_eq!(session.created_at, session.updated_at);
    }

    #[test]
    fn test_session_turn_count_and_summary() {
        let mut session = Session::new("abc".to_string(), Modality::Text);
        let now = Utc::now();
        session.history.push(Turn::user("hi", now));
        session.history.push(Turn::assistant("hello", now));
        session.history.push(Turn::user("again", now));

        assert_eq!(session.turn_count(), 1);
        let summary = session.summary();
        assert_eq!(summary.id, "abc");
        assert_eq!(summary.message_count, 3);
        assert_eq!(summary.modality, Modality::Text);
    }

    #[test]
    fn test_session_serialization_keeps_history_order() {
        let mut session = Session::new("s1".to_string(), Modality::Image);
        let now = Utc::now();
        session
            .history
            .push(Turn::user("first", now).with_attachment("https://example.com/a.png"));
        session.history.push(Turn::assistant("second", now));

        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.history, session.history);
        assert_eq!(
            back.history[0].attachment_ref.as_deref(),
            Some("https://example.com/a.png")
        );
    }

    #[test]
    fn test_modality_labels() {
        let labels: Vec<&str> = Modality::all().iter().map(|m| m.label()).collect();
        assert_eq!(labels, vec!["text", "image", "csv"]);
        assert_eq!(serde_json::to_string(&Modality::Csv).unwrap(), "\"csv\"");
    }

    // ─── Artifact Tests ──────────────────────────────────────

    #[test]
    fn test_artifact_metadata_tagged_by_kind() {
        let meta = ArtifactMetadata::Csv(CsvMetadata {
            row_count: 10,
            column_count: 2,
            column_names: vec!["a".into(), "a".into()],
            source_kind: CsvSourceKind::File,
            source_value: "data.csv".into(),
        });
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["kind"], "csv");
        assert_eq!(json["source_kind"], "file");
        assert_eq!(meta.modality(), Modality::Csv);
        assert_eq!(meta.reference(), "data.csv");
    }

    #[test]
    fn test_image_reference_prefers_url() {
        let mut img = ImageMetadata {
            filename: "cat.png".into(),
            width: 1,
            height: 1,
            format: ImageFormat::Png,
            size_kb: 0.1,
            source: None,
            data_url: None,
        };
        assert_eq!(ArtifactMetadata::Image(img.clone()).reference(), "cat.png");
        assert_eq!(img.image_url(), None);
        img.data_url = Some("data:image/png;base64,AAAA".into());
        assert_eq!(img.image_url(), Some("data:image/png;base64,AAAA"));
        assert_eq!(ArtifactMetadata::Image(img.clone()).reference(), "cat.png");
        img.source = Some("https://example.com/cat.png".into());
        assert_eq!(img.image_url(), Some("https://example.com/cat.png"));
        assert_eq!(
            ArtifactMetadata::Image(img).reference(),
            "https://example.com/cat.png"
        );
    }

    #[test]
    fn test_image_format_display() {
        assert_eq!(ImageFormat::Jpeg.to_string(), "JPEG");
        assert_eq!(ImageFormat::Webp.to_string(), "WEBP");
        assert_eq!(ImageFormat::Jpeg.mime_type(), "image/jpeg");
    }

    // ─── Event Tests ─────────────────────────────────────────

    #[test]
    fn test_turn_state_terminal() {
        assert!(TurnState::Done.is_terminal());
        assert!(TurnState::Failed { reason: "x".into() }.is_terminal());
        assert!(!TurnState::CallingModel.is_terminal());
    }

    // ─── Config Tests ────────────────────────────────────────

    #[test]
    fn test_config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.base_delay_ms, 1_000);
        assert_eq!(config.retry.max_delay_ms, 8_000);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.session.max_message_chars, 5_000);
        assert_eq!(config.storage.backend, StorageBackendType::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_partial_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            [llm]
            provider = "OpenAI"
            model = "gpt-4o-mini"

            [retry]
            max_attempts = 2

            [session]
            max_turns = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.provider, LlmProvider::OpenAI);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.max_delay_ms, 8_000);
        assert_eq!(config.session.max_turns, Some(10));
    }

    #[test]
    fn test_config_rejects_invalid_values() {
        let err = AppConfig::from_toml_str("[retry]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));

        let err = AppConfig::from_toml_str("[retry]\nbase_delay_ms = 9000\n").unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));

        let err = AppConfig::from_toml_str("[retrieval]\nchunk_overlap = 600\n").unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[test]
    fn test_config_bad_toml_is_config_error() {
        let err = AppConfig::from_toml_str("[llm\nmodel=").unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[test]
    fn test_config_overrides() {
        let config = AppConfig::default().with_overrides(|key| match key {
            "CHAT_API_KEY" => Some("sk-test".to_string()),
            "CHAT_STORAGE_DIR" => Some("/tmp/sessions".to_string()),
            _ => None,
        });
        assert_eq!(config.llm.api_key, "sk-test");
        assert_eq!(config.storage.dir.as_deref(), Some(std::path::Path::new("/tmp/sessions")));
        assert!(config.llm.api_base.is_none());
    }

    #[test]
    fn test_provider_base_urls() {
        assert!(LlmProvider::OpenAI.default_base_url().starts_with("https://"));
        assert_eq!(LlmProvider::Custom.default_base_url(), "");
        assert_eq!(LlmProvider::HuggingFace.label(), "HuggingFace");
    }

    // ─── Error Tests ─────────────────────────────────────────

    #[test]
    fn test_upstream_transient_classification() {
        assert!(ChatError::upstream(UpstreamKind::Overloaded, "busy").is_transient());
        assert!(ChatError::upstream(UpstreamKind::RateLimited, "slow down").is_transient());
        assert!(ChatError::upstream(UpstreamKind::Timeout, "late").is_transient());
        assert!(!ChatError::upstream(UpstreamKind::InvalidRequest, "bad").is_transient());
        assert!(!ChatError::upstream(UpstreamKind::Unknown, "?").is_transient());
        assert!(!ChatError::Cancelled.is_transient());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ChatError::upstream(UpstreamKind::InvalidRequest, "x").kind(),
            ErrorKind::TerminalUpstream
        );
        let exhausted = ChatError::UpstreamExhausted {
            attempts: 4,
            last: Box::new(ChatError::upstream(UpstreamKind::Overloaded, "x")),
        };
        assert_eq!(exhausted.kind(), ErrorKind::TransientUpstream);
        assert!(!exhausted.is_transient());
        assert_eq!(ChatError::MalformedCsv("x".into()).kind(), ErrorKind::Artifact);
        assert_eq!(ChatError::SessionExpired("x".into()).kind(), ErrorKind::Session);
        assert_eq!(ChatError::InvalidInput("x".into()).kind(), ErrorKind::Input);
        assert_eq!(ChatError::Storage("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_user_message_hides_provider_detail() {
        let err = ChatError::upstream(UpstreamKind::InvalidRequest, "secret org-1234 body");
        assert!(!err.user_message().contains("org-1234"));

        let err = ChatError::UpstreamExhausted {
            attempts: 3,
            last: Box::new(ChatError::upstream(UpstreamKind::Overloaded, "internal trace")),
        };
        let msg = err.user_message();
        assert!(msg.contains('3'));
        assert!(!msg.contains("internal trace"));
    }

    #[test]
    fn test_error_display() {
        let err = ChatError::upstream(UpstreamKind::RateLimited, "429");
        assert_eq!(err.to_string(), "Upstream rate limited: 429");
        assert_eq!(ChatError::Cancelled.to_string(), "Cancelled");
    }

    #[test]
    fn test_error_from_serde() {
        let e: std::result::Result<serde_json::Value, _> = serde_json::from_str("{{");
        let err: ChatError = e.unwrap_err().into();
        assert!(matches!(err, ChatError::Serialization(_)));
    }
}
