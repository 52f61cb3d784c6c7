//! OAuth 2.0 client-credentials exchange built on the `oauth2` crate.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
	RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::{IssuedToken, TokenSecret},
	error::{AuthError, ConfigError},
	http::{InstrumentedHandle, ResponseMetadata, ResponseMetadataSlot},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Client-credentials facade bound to one token endpoint.
///
/// Credentials travel in the form body (`client_id`, `client_secret`,
/// `grant_type=client_credentials`) rather than an HTTP Basic header.
pub(crate) struct ClientCredentialsFacade {
	oauth_client: ConfiguredBasicClient,
	http_client: ReqwestClient,
	endpoint: Url,
}
impl ClientCredentialsFacade {
	pub(crate) fn new(
		endpoint: Url,
		client_id: &str,
		client_secret: &TokenSecret,
		http_client: ReqwestClient,
	) -> Result<Self, ConfigError> {
		let token_url = TokenUrl::new(endpoint.to_string())
			.map_err(|source| ConfigError::InvalidUrl { value: endpoint.to_string(), source })?;
		let oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_client_secret(ClientSecret::new(client_secret.expose().to_owned()))
			.set_auth_type(AuthType::RequestBody)
			.set_token_uri(token_url);

		Ok(Self { oauth_client, http_client, endpoint })
	}

	/// Performs the grant and converts `expires_in` into an absolute expiry.
	pub(crate) async fn exchange(&self) -> Result<IssuedToken, AuthError> {
		let meta = ResponseMetadataSlot::default();
		let handle = InstrumentedHandle::new(self.http_client.clone(), meta.clone());
		let response = self
			.oauth_client
			.exchange_client_credentials()
			.request_async(&handle)
			.await
			.map_err(|err| self.map_request_error(meta.take(), err))?;
		let expires_in = response.expires_in().ok_or_else(|| self.malformed("missing expires_in"))?;

		if expires_in.is_zero() {
			return Err(self.malformed("expires_in must be positive"));
		}

		let token = response.access_token().secret();

		if token.is_empty() {
			return Err(self.malformed("empty access_token"));
		}

		Ok(IssuedToken {
			token: TokenSecret::new(token.to_owned()),
			expires_at: OffsetDateTime::now_utc() + expires_in,
		})
	}

	fn malformed(&self, reason: &str) -> AuthError {
		AuthError::MalformedResponse { endpoint: self.endpoint.to_string(), reason: reason.into() }
	}

	fn map_request_error(
		&self,
		meta: Option<ResponseMetadata>,
		err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
	) -> AuthError {
		let endpoint = self.endpoint.to_string();
		let status = meta.as_ref().map(|value| value.status);

		match err {
			RequestTokenError::ServerResponse(response) =>
				AuthError::Rejected { endpoint, status, message: server_message(&response) },
			RequestTokenError::Request(HttpClientError::Reqwest(inner)) =>
				AuthError::Network { endpoint, source: inner },
			RequestTokenError::Request(other) =>
				AuthError::Network { endpoint, source: Box::new(other) },
			// Non-2xx bodies that are not OAuth error documents land here as parse failures.
			RequestTokenError::Parse(error, _body) => match status {
				Some(code) if !(200..300).contains(&code) => AuthError::Rejected {
					endpoint,
					status,
					message: "token endpoint returned a non-OAuth error body".into(),
				},
				_ => AuthError::MalformedResponse { endpoint, reason: error.to_string() },
			},
			RequestTokenError::Other(message) =>
				AuthError::Rejected { endpoint, status, message },
		}
	}
}

fn server_message(response: &BasicErrorResponse) -> String {
	match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_string(),
	}
}
