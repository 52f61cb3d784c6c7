// crates.io
use httpmock::{Mock, prelude::*};
// self
use jamfpro_transport::{
	_preludet::*,
	auth::FlowCounts,
	config::{AuthConfig, AuthMethod},
	error::AuthError,
	obs::AuthFlow,
};

const OAUTH_PATH: &str = "/api/oauth/token";
const BASIC_PATH: &str = "/api/v1/auth/token";
const KEEP_ALIVE_PATH: &str = "/api/v1/auth/keep-alive";
const INVALIDATE_PATH: &str = "/api/v1/auth/invalidate-token";
const BASIC_HEADER: &str = "Basic dGVzdC11c2VyOnRlc3QtcGFzc3dvcmQ=";

async fn mock_oauth_token<'a>(server: &'a MockServer, token: &str, expires_in: u64) -> Mock<'a> {
	let body = format!(
		"{{\"access_token\":\"{token}\",\"token_type\":\"bearer\",\"expires_in\":{expires_in}}}"
	);

	server
		.mock_async(|when, then| {
			when.method(POST)
				.path(OAUTH_PATH)
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

async fn mock_basic_token<'a>(server: &'a MockServer, token: &str) -> Mock<'a> {
	let body = format!("{{\"token\":\"{token}\",\"expires\":\"2099-01-01T00:00:00.000Z\"}}");

	server
		.mock_async(|when, then| {
			when.method(POST).path(BASIC_PATH).header("authorization", BASIC_HEADER);
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

#[tokio::test]
async fn oauth2_token_is_fetched_once_and_cached() {
	let server = MockServer::start_async().await;
	let mock = mock_oauth_token(&server, "tok", 3600).await;
	let transport = connect_test_transport(oauth2_test_config(&server.base_url())).await;
	let first = transport.token_manager().token().await.expect("Cached token should be served.");
	let second = transport.token_manager().token().await.expect("Cached token should be served.");

	assert_eq!(first.expose(), "tok");
	assert_eq!(second.expose(), "tok");
	assert!(transport.token_manager().expires_at().await.is_some());
	assert_eq!(transport.token_manager().metrics().fetches(), 1);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn concurrent_callers_share_one_fetch() {
	let server = MockServer::start_async().await;
	let mock = mock_oauth_token(&server, "shared", 3600).await;
	let transport =
		test_transport_builder(oauth2_test_config(&server.base_url())).build().expect("Build.");
	let manager = transport.token_manager();
	let (a, b, c) = tokio::join!(manager.token(), manager.token(), manager.token());

	for token in [a, b, c] {
		assert_eq!(token.expect("Concurrent token call should succeed.").expose(), "shared");
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn token_inside_the_refresh_buffer_is_refetched() {
	let server = MockServer::start_async().await;
	// Lifetime shorter than the five-minute buffer forces a refetch on every call.
	let mock = mock_oauth_token(&server, "short-lived", 60).await;
	let transport = connect_test_transport(oauth2_test_config(&server.base_url())).await;

	transport.token_manager().token().await.expect("Refetch should succeed.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn basic_exchange_uses_basic_credentials() {
	let server = MockServer::start_async().await;
	let mock = mock_basic_token(&server, "basic-tok").await;
	let transport = connect_test_transport(basic_test_config(&server.base_url())).await;
	let token = transport.token_manager().token().await.expect("Cached token should be served.");

	assert_eq!(token.expose(), "basic-tok");
	assert_eq!(transport.auth_config().auth_method(), AuthMethod::Basic);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn keep_alive_replaces_the_cached_token() {
	let server = MockServer::start_async().await;
	let _token = mock_basic_token(&server, "basic-tok").await;
	let keep_alive = server
		.mock_async(|when, then| {
			when.method(POST).path(KEEP_ALIVE_PATH).header("authorization", "Bearer basic-tok");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"token\":\"extended\",\"expires\":\"2099-06-01T00:00:00Z\"}");
		})
		.await;
	let transport = connect_test_transport(basic_test_config(&server.base_url())).await;

	transport.keep_alive_token().await.expect("Keep-alive should succeed.");

	let token = transport.token_manager().token().await.expect("Extended token should be served.");

	let metrics = transport.token_manager().metrics();

	assert_eq!(token.expose(), "extended");
	assert_eq!(metrics.fetches(), 1);
	assert_eq!(
		metrics.counts(AuthFlow::KeepAlive),
		FlowCounts { attempts: 1, successes: 1, failures: 0 }
	);

	keep_alive.assert_calls_async(1).await;
}

#[tokio::test]
async fn keep_alive_without_a_token_fails() {
	let server = MockServer::start_async().await;
	let transport =
		test_transport_builder(basic_test_config(&server.base_url())).build().expect("Build.");
	let err = transport.keep_alive_token().await.expect_err("Keep-alive needs a cached token.");

	assert!(matches!(err, Error::Auth(AuthError::NoActiveToken)));
}

#[tokio::test]
async fn invalidate_clears_local_state() {
	let server = MockServer::start_async().await;
	let token = mock_basic_token(&server, "basic-tok").await;
	let invalidate = server
		.mock_async(|when, then| {
			when.method(POST).path(INVALIDATE_PATH).header("authorization", "Bearer basic-tok");
			then.status(204);
		})
		.await;
	let transport = connect_test_transport(basic_test_config(&server.base_url())).await;

	transport.invalidate_token().await.expect("Invalidate should succeed.");

	assert!(transport.token_manager().expires_at().await.is_none());

	// Nothing cached: a second invalidate is a local no-op.
	transport.invalidate_token().await.expect("Second invalidate should be a no-op.");
	transport.token_manager().token().await.expect("Token should be refetched.");

	invalidate.assert_calls_async(1).await;
	token.assert_calls_async(2).await;
}

#[tokio::test]
async fn rejected_credentials_surface_at_connect() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(OAUTH_PATH);
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_client\",\"error_description\":\"bad secret\"}");
		})
		.await;
	let err = test_transport_builder(oauth2_test_config(&server.base_url()))
		.connect()
		.await
		.expect_err("Rejected credentials should fail the connect.");

	match err {
		Error::Auth(AuthError::Rejected { status, message, .. }) => {
			assert_eq!(status, Some(401));
			assert!(message.contains("invalid_client"), "{message}");
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn malformed_basic_body_is_reported() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path(BASIC_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"token\":\"t\",\"expires\":\"tomorrow\"}");
		})
		.await;
	let err = test_transport_builder(basic_test_config(&server.base_url()))
		.connect()
		.await
		.expect_err("Unparseable expiry should fail the connect.");

	assert!(matches!(err, Error::Auth(AuthError::MalformedResponse { .. })), "{err:?}");
}

#[tokio::test]
async fn failed_fetch_does_not_poison_later_calls() {
	let server = MockServer::start_async().await;
	let mut failing = server
		.mock_async(|when, then| {
			when.method(POST).path(BASIC_PATH);
			then.status(500);
		})
		.await;
	let config: AuthConfig = basic_test_config(&server.base_url());
	let transport = test_transport_builder(config).build().expect("Build.");

	assert!(transport.token_manager().token().await.is_err());

	failing.delete_async().await;

	let _ok = mock_basic_token(&server, "recovered").await;
	let token = transport.token_manager().token().await.expect("Recovery fetch should succeed.");

	assert_eq!(token.expose(), "recovered");
	assert_eq!(transport.token_manager().metrics().failures(), 1);
}
