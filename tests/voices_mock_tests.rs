//! Voice catalog tests against a wiremock HTTP server.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use edge_tts_gateway::config::ClientConfig;
use edge_tts_gateway::core::edge::{
    EdgeTts, SEC_MS_GEC_VERSION, SystemClock, TRUSTED_CLIENT_TOKEN, VoiceFilter,
};
use edge_tts_gateway::errors::TtsError;

const VOICES_PATH: &str = "/consumer/speech/synthesize/readaloud/voices/list";

fn catalog() -> serde_json::Value {
    json!([
        {
            "Name": "Microsoft Server Speech Text to Speech Voice (en-US, AriaNeural)",
            "ShortName": "en-US-AriaNeural",
            "Gender": "Female",
            "Locale": "en-US",
            "SuggestedCodec": "audio-24khz-48kbitrate-mono-mp3",
            "FriendlyName": "Microsoft Aria Online (Natural) - English (United States)",
            "Status": "GA",
            "VoiceTag": {"ContentCategories": ["News ", "Novel"], "VoicePersonalities": [" Positive"]}
        },
        {
            "Name": "Microsoft Server Speech Text to Speech Voice (de-DE, KatjaNeural)",
            "ShortName": "de-DE-KatjaNeural",
            "Gender": "Female",
            "Locale": "de-DE",
            "SuggestedCodec": "audio-24khz-48kbitrate-mono-mp3",
            "FriendlyName": "Microsoft Katja Online (Natural) - German (Germany)",
            "Status": "GA",
            "VoiceTag": {"ContentCategories": ["General"], "VoicePersonalities": ["Friendly"]}
        }
    ])
}

fn client(server: &MockServer) -> EdgeTts {
    let config = ClientConfig {
        voice_list_url: format!("{}{}", server.uri(), VOICES_PATH),
        ..Default::default()
    };
    EdgeTts::with_clock(config, Arc::new(SystemClock::new()))
}

#[tokio::test]
async fn test_list_voices() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(VOICES_PATH))
        .and(query_param("trustedclienttoken", TRUSTED_CLIENT_TOKEN))
        .and(query_param("Sec-MS-GEC-Version", SEC_MS_GEC_VERSION))
        .and(header("sec-fetch-mode", "cors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog()))
        .expect(1)
        .mount(&server)
        .await;

    let voices = client(&server).list_voices().await.unwrap();
    assert_eq!(voices.len(), 2);
    assert_eq!(voices[0].short_name, "en-US-AriaNeural");
    assert_eq!(voices[0].voice_tag.content_categories, vec!["News", "Novel"]);
    assert_eq!(voices[0].voice_tag.voice_personalities, vec!["Positive"]);
}

#[tokio::test]
async fn test_voices_manager_find() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(VOICES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog()))
        .mount(&server)
        .await;

    let manager = client(&server).voices_manager().await.unwrap();
    let german = manager.find(&VoiceFilter::default().with_language("de"));
    assert_eq!(german.len(), 1);
    assert_eq!(german[0].locale, "de-DE");

    let female = manager.find(&VoiceFilter::default().with_gender("Female"));
    assert_eq!(female.len(), 2);
}

#[tokio::test]
async fn test_forbidden_then_success_retries_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(VOICES_PATH))
        .respond_with(
            ResponseTemplate::new(403).insert_header("Date", "Tue, 01 Jan 2036 00:00:00 GMT"),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(VOICES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog()))
        .expect(1)
        .mount(&server)
        .await;

    let tts = client(&server);
    let voices = tts.list_voices().await.unwrap();
    assert_eq!(voices.len(), 2);
}

#[tokio::test]
async fn test_repeated_forbidden_is_not_retried_twice() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(VOICES_PATH))
        .respond_with(
            ResponseTemplate::new(403).insert_header("Date", "Tue, 01 Jan 2036 00:00:00 GMT"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let err = client(&server).list_voices().await.unwrap_err();
    assert!(matches!(err, TtsError::Http { status: 403, .. }));
}

#[tokio::test]
async fn test_server_error_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(VOICES_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client(&server).list_voices().await.unwrap_err();
    assert_eq!(
        err,
        TtsError::Http {
            status: 503,
            message: "maintenance".to_string(),
        }
    );
}
