use chrono::{TimeZone, Utc};
use portfolio_advisor::error::AppError;
use portfolio_advisor::extraction::{ExtractionInput, Extractor, OpenAiExtractor};
use portfolio_advisor::market::{fetch_all, AlphaVantageClient, DateRange, Interval, MarketData};
use reqwest::Client;
use serde_json::json;
use wiremock::matchers::{
    body_partial_json, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn january_2020() -> DateRange {
    DateRange {
        start: Utc.with_ymd_and_hms(2019, 12, 31, 0, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2020, 1, 31, 0, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn alphavantage_daily_history_is_sorted_and_ranged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("function", "TIME_SERIES_DAILY"))
        .and(query_param("symbol", "BND"))
        .and(query_param("apikey", "demo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Meta Data": { "2. Symbol": "BND" },
            "Time Series (Daily)": {
                "2020-01-02": { "1. open": "80.0", "4. close": "80.5" },
                "2020-01-01": { "1. open": "79.0", "4. close": "80.0" },
                "2019-06-01": { "1. open": "70.0", "4. close": "70.0" }
            }
        })))
        .mount(&server)
        .await;

    let client = AlphaVantageClient::new(Client::new(), server.uri(), "demo");
    let series = client
        .history("BND", january_2020(), Interval::Daily)
        .await
        .unwrap();

    let closes: Vec<f64> = series.iter().map(|p| p.close).collect();
    assert_eq!(closes, vec![80.0, 80.5]);
    assert_eq!(series[0].day().to_string(), "2020-01-01");
}

#[tokio::test]
async fn alphavantage_weekly_and_unknown_symbols() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("function", "TIME_SERIES_WEEKLY"))
        .and(query_param("symbol", "VOO"))
        .and(query_param_is_missing("outputsize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Weekly Time Series": { "2020-01-03": { "4. close": "300.25" } }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("symbol", "NOPE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Error Message": "Invalid API call."
        })))
        .mount(&server)
        .await;

    let client = AlphaVantageClient::new(Client::new(), server.uri(), "demo");
    let weekly = client
        .history("VOO", january_2020(), Interval::Weekly)
        .await
        .unwrap();
    assert_eq!(weekly.len(), 1);
    assert_eq!(weekly[0].close, 300.25);

    let missing = client
        .history("NOPE", january_2020(), Interval::Weekly)
        .await
        .unwrap();
    assert!(missing.is_empty());
}

#[tokio::test]
async fn alphavantage_failures_are_upstream_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("symbol", "SLOW"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("symbol", "DOWN"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = AlphaVantageClient::new(Client::new(), server.uri(), "demo");
    for symbol in ["SLOW", "DOWN"] {
        let result = client.history(symbol, january_2020(), Interval::Daily).await;
        assert!(matches!(result, Err(AppError::Upstream(_))), "{}", symbol);
    }
}

#[tokio::test]
async fn alphavantage_premium_notice_means_no_data() {
    let server = MockServer::start().await;
    let year = DateRange::years_back(Utc::now(), 1);
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("symbol", "SPY"))
        .and(query_param("outputsize", "full"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Information": "The outputsize=full parameter value is a premium feature for the TIME_SERIES_DAILY endpoint."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AlphaVantageClient::new(Client::new(), server.uri(), "demo");
    let series = client.history("SPY", year, Interval::Daily).await.unwrap();
    assert!(series.is_empty());
}

#[tokio::test]
async fn fetch_all_requests_each_ticker_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Time Series (Daily)": { "2020-01-02": { "4. close": "1.0" } }
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = AlphaVantageClient::new(Client::new(), server.uri(), "demo");
    let series = fetch_all(
        &client,
        &["AAPL", "BND", "AAPL"],
        january_2020(),
        Interval::Daily,
    )
    .await
    .unwrap();

    assert_eq!(series.len(), 2);
    assert_eq!(series["AAPL"].len(), 1);
    assert_eq!(series["BND"].len(), 1);
}

#[tokio::test]
async fn openai_extractor_returns_message_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({ "model": "gpt-4o", "temperature": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [
                { "message": { "role": "assistant", "content": "[{\"ticker\":\"AAA\",\"shares\":2,\"price\":10}]" } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = OpenAiExtractor::new(
        Client::new(),
        server.uri(),
        Some("test-key".to_string()),
        "gpt-4o",
    );
    let content = extractor
        .extract(&ExtractionInput::Text("2 shares of AAA at $10".into()))
        .await
        .unwrap();
    assert_eq!(content, r#"[{"ticker":"AAA","shares":2,"price":10}]"#);
}

#[tokio::test]
async fn openai_extractor_sends_images_as_data_uri() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "[]" } }]
        })))
        .mount(&server)
        .await;

    let extractor = OpenAiExtractor::new(Client::new(), server.uri(), Some("k".into()), "gpt-4o");
    extractor
        .extract(&ExtractionInput::Image {
            data: "aGVsbG8=".into(),
            mime_type: "image/jpeg".into(),
        })
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        sent["messages"][1]["content"][1]["image_url"]["url"],
        "data:image/jpeg;base64,aGVsbG8="
    );
}

#[tokio::test]
async fn openai_extractor_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let input = ExtractionInput::Text("anything".into());

    let unconfigured = OpenAiExtractor::new(Client::new(), server.uri(), None, "gpt-4o");
    match unconfigured.extract(&input).await {
        Err(AppError::Upstream(message)) => assert!(message.contains("not configured")),
        other => panic!("unexpected {:?}", other),
    }

    let empty = OpenAiExtractor::new(Client::new(), server.uri(), Some("k".into()), "gpt-4o");
    match empty.extract(&input).await {
        Err(AppError::Upstream(message)) => assert_eq!(message, "No response from OpenAI"),
        other => panic!("unexpected {:?}", other),
    }
}
