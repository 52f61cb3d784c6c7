// std
use std::time::Instant;
// crates.io
use httpmock::{Mock, prelude::*};
use serde_json::json;
use tokio_util::sync::CancellationToken;
// self
use jamfpro_transport::{
	_preludet::*,
	context::RequestContext,
	error::{CancelReason, CancelStage},
	reqwest::header::{ACCEPT, HeaderValue},
	retry::RetryPolicy,
	transport::{CallOptions, Multipart, MultipartFile},
};

#[derive(Debug, Deserialize, PartialEq)]
struct Building {
	id: String,
	name: String,
}

#[derive(Debug, Serialize)]
struct NewBuilding<'a> {
	name: &'a str,
}

async fn mock_token(server: &MockServer) -> Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"tok\",\"token_type\":\"bearer\",\"expires_in\":3600}");
		})
		.await
}

#[tokio::test]
async fn get_sends_auth_and_global_headers() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let user_agent = format!("jamfpro-transport/{}", env!("CARGO_PKG_VERSION"));
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v1/buildings/1")
				.header("authorization", "Bearer tok")
				.header("accept", "application/json")
				.header("user-agent", user_agent.as_str())
				.header("x-team", "platform");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":\"1\",\"name\":\"HQ\"}");
		})
		.await;
	let transport = test_transport_builder(oauth2_test_config(&server.base_url()))
		.global_header("x-team", "platform")
		.connect()
		.await
		.expect("Transport should connect.");
	let response = transport
		.get::<Building>("api/v1/buildings/1", CallOptions::new())
		.await
		.expect("GET should succeed.");

	assert_eq!(response.status(), 200);
	assert_eq!(response.body, Building { id: "1".into(), name: "HQ".into() });

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn per_call_headers_and_query_are_applied() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/JSSResource/buildings")
				.header("accept", "application/xml")
				.query_param("section", "general");
			then.status(200).header("content-type", "application/xml").body("<buildings/>");
		})
		.await;
	let transport = connect_test_transport(oauth2_test_config(&server.base_url())).await;
	let opts = CallOptions::new()
		.query("section", "general")
		.header(ACCEPT, HeaderValue::from_static("application/xml"));
	let response =
		transport.get_bytes("/JSSResource/buildings", opts).await.expect("GET should succeed.");

	assert_eq!(response.body, b"<buildings/>");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn post_sends_a_json_body() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/v1/buildings")
				.header("content-type", "application/json")
				.body("{\"name\":\"Annex\"}");
			then.status(201)
				.header("content-type", "application/json")
				.body("{\"id\":\"7\",\"href\":\"/api/v1/buildings/7\"}");
		})
		.await;
	let transport = connect_test_transport(oauth2_test_config(&server.base_url())).await;
	let created: serde_json::Value = transport
		.post("api/v1/buildings", &NewBuilding { name: "Annex" }, CallOptions::new())
		.await
		.expect("POST should succeed.")
		.into_body();

	assert_eq!(created, json!({ "id": "7", "href": "/api/v1/buildings/7" }));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn post_with_query_keeps_body_and_query() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/v1/mdm/commands")
				.query_param("dry-run", "true")
				.body("{\"name\":\"Annex\"}");
			then.status(201).header("content-type", "application/json").body("{}");
		})
		.await;
	let transport = connect_test_transport(oauth2_test_config(&server.base_url())).await;

	transport
		.post_with_query::<_, serde_json::Value>(
			"api/v1/mdm/commands",
			vec![("dry-run".into(), "true".into())],
			&NewBuilding { name: "Annex" },
			CallOptions::new(),
		)
		.await
		.expect("POST with query should succeed.");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn empty_success_bodies_decode_as_unit() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let mock = server
		.mock_async(|when, then| {
			when.method(DELETE).path("/api/v1/buildings/7");
			then.status(204);
		})
		.await;
	let transport = connect_test_transport(oauth2_test_config(&server.base_url())).await;
	let response = transport
		.delete::<()>("api/v1/buildings/7", CallOptions::new())
		.await
		.expect("DELETE should succeed.");

	assert_eq!(response.status(), 204);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn form_and_multipart_share_the_pipeline() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let form = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/v1/form")
				.header("content-type", "application/x-www-form-urlencoded")
				.body("name=Annex&site=HQ");
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await;
	let upload = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/packages/1/upload");
			then.status(201).header("content-type", "application/json").body("{\"id\":\"1\"}");
		})
		.await;
	let transport = connect_test_transport(oauth2_test_config(&server.base_url())).await;

	transport
		.post_form::<serde_json::Value>(
			"api/v1/form",
			vec![("name".into(), "Annex".into()), ("site".into(), "HQ".into())],
			CallOptions::new(),
		)
		.await
		.expect("Form POST should succeed.");
	transport
		.post_multipart::<serde_json::Value>(
			"api/v1/packages/1/upload",
			Multipart::new().file(
				MultipartFile::new("file", "tool.pkg", vec![0, 1, 2])
					.content_type("application/octet-stream"),
			),
			CallOptions::new(),
		)
		.await
		.expect("Multipart POST should succeed.");

	form.assert_calls_async(1).await;
	upload.assert_calls_async(1).await;
}

#[tokio::test]
async fn not_found_maps_to_an_api_error() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/buildings/99");
			then.status(404).header("content-type", "application/json").body(
				"{\"httpStatus\":404,\"errors\":[{\"code\":\"INVALID_ID\",\"description\":\"Building not found\",\"id\":\"99\",\"field\":null}]}",
			);
		})
		.await;
	let transport = connect_test_transport(oauth2_test_config(&server.base_url())).await;
	let err = transport
		.get::<Building>("api/v1/buildings/99", CallOptions::new())
		.await
		.expect_err("Missing building should fail.");
	let api = err.as_api().expect("Error should carry the API failure.");

	assert!(err.is_not_found());
	assert_eq!(api.code(), Some("INVALID_ID"));
	assert_eq!(api.message.as_deref(), Some("Building not found"));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn deprecated_endpoints_still_succeed() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/legacy");
			then.status(200)
				.header("content-type", "application/json")
				.header("deprecation", "true")
				.header("sunset", "Wed, 01 Oct 2025 00:00:00 GMT")
				.body("[]");
		})
		.await;
	let transport = connect_test_transport(oauth2_test_config(&server.base_url())).await;
	let response = transport
		.get::<Vec<Building>>("api/v1/legacy", CallOptions::new())
		.await
		.expect("Deprecated endpoint should still succeed.");
	let notice = response.metadata.deprecation().expect("Deprecation should be exposed.");

	assert!(response.body.is_empty());
	assert_eq!(notice.sunset.as_deref(), Some("Wed, 01 Oct 2025 00:00:00 GMT"));
}

#[tokio::test]
async fn decode_failures_report_the_json_path() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/buildings/1");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":\"1\",\"name\":42}");
		})
		.await;
	let transport = connect_test_transport(oauth2_test_config(&server.base_url())).await;
	let err = transport
		.get::<Building>("api/v1/buildings/1", CallOptions::new())
		.await
		.expect_err("Wrong field type should fail decoding.");

	match err {
		Error::Decode { source, .. } => assert_eq!(source.path().to_string(), "name"),
		other => panic!("Unexpected error: {other:?}."),
	}
}

#[tokio::test]
async fn waiting_for_a_slot_honors_the_deadline() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let _slow = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/slow");
			then.status(200).delay(Duration::from_millis(600)).body("{}");
		})
		.await;
	let transport = test_transport_builder(oauth2_test_config(&server.base_url()))
		.max_concurrent_requests(1)
		.connect()
		.await
		.expect("Transport should connect.");
	let holder = {
		let transport = transport.clone();

		tokio::spawn(async move {
			transport.get::<serde_json::Value>("api/v1/slow", CallOptions::new()).await
		})
	};

	tokio::time::sleep(Duration::from_millis(100)).await;

	let ctx = RequestContext::new().with_timeout(Duration::from_millis(50));
	let err = transport
		.get::<serde_json::Value>("api/v1/slow", CallOptions::new().context(ctx))
		.await
		.expect_err("Second call should give up waiting for the slot.");

	assert!(matches!(
		err,
		Error::Cancelled { stage: CancelStage::ConcurrencySlot, reason: CancelReason::Deadline }
	));

	holder.await.expect("Holder task should finish.").expect("Holder call should succeed.");

	assert_eq!(transport.limiter().in_flight(), 0);
}

#[tokio::test]
async fn cancellation_stops_an_in_flight_call() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let _slow = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/slow");
			then.status(200).delay(Duration::from_secs(5)).body("{}");
		})
		.await;
	let transport = connect_test_transport(oauth2_test_config(&server.base_url())).await;
	let token = CancellationToken::new();
	let ctx = RequestContext::new().with_cancellation(token.clone());
	let canceller = tokio::spawn(async move {
		tokio::time::sleep(Duration::from_millis(50)).await;
		token.cancel();
	});
	let err = transport
		.get::<serde_json::Value>("api/v1/slow", CallOptions::new().context(ctx))
		.await
		.expect_err("Cancelled call should fail.");

	canceller.await.expect("Canceller task should finish.");

	assert!(matches!(
		err,
		Error::Cancelled { stage: CancelStage::InFlight, reason: CancelReason::Cancelled }
	));
	assert_eq!(transport.limiter().in_flight(), 0);
}

#[tokio::test]
async fn rsql_filters_travel_as_the_filter_query() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v1/computers-inventory")
				.query_param("filter", "general.name==\"Lab 1\";id>=10");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"totalCount\":0,\"results\":[]}");
		})
		.await;
	let transport = connect_test_transport(oauth2_test_config(&server.base_url())).await;
	let filter = transport.rsql().eq("general.name", "Lab 1").and().ge("id", 10);

	transport
		.get::<serde_json::Value>("api/v1/computers-inventory", CallOptions::new().filter(filter))
		.await
		.expect("Filtered GET should succeed.");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn mandatory_delay_follows_successes_only() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let _list = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/buildings");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let _missing = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/buildings/404");
			then.status(404);
		})
		.await;
	let delay = Duration::from_millis(300);
	let transport = test_transport_builder(oauth2_test_config(&server.base_url()))
		.mandatory_request_delay(delay)
		.connect()
		.await
		.expect("Transport should connect.");
	let started = Instant::now();

	transport
		.get::<Vec<Building>>("api/v1/buildings", CallOptions::new())
		.await
		.expect("GET should succeed.");

	assert!(started.elapsed() >= delay);

	let started = Instant::now();
	let err = transport
		.get::<Building>("api/v1/buildings/404", CallOptions::new())
		.await
		.expect_err("Missing building should fail.");

	assert!(err.is_not_found());
	assert!(started.elapsed() < delay);
}

#[tokio::test]
async fn throttle_learns_only_from_successful_responses() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let _missing = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/buildings/404");
			then.status(404);
		})
		.await;
	let _stalled = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/stalled");
			then.status(200).delay(Duration::from_secs(2)).body("{}");
		})
		.await;
	let _list = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/buildings");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let transport = test_transport_builder(oauth2_test_config(&server.base_url()))
		.retry_policy(RetryPolicy::disabled())
		.timeout(Some(Duration::from_millis(200)))
		.connect()
		.await
		.expect("Transport should connect.");

	transport
		.get::<Building>("api/v1/buildings/404", CallOptions::new())
		.await
		.expect_err("Missing building should fail.");

	assert_eq!(transport.throttle().estimate(), None);

	let err = transport
		.get::<serde_json::Value>("api/v1/stalled", CallOptions::new())
		.await
		.expect_err("Timed-out call should fail without a response.");

	assert!(matches!(err, Error::Transport(_)), "{err:?}");
	assert_eq!(transport.throttle().estimate(), None);

	transport
		.get::<Vec<Building>>("api/v1/buildings", CallOptions::new())
		.await
		.expect("GET should succeed.");

	assert!(transport.throttle().estimate().is_some());
}
