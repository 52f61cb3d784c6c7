//! Validated authentication configuration consumed by the transport.
//!
//! Loading values from files or the environment is left to the caller; this module only
//! validates them. [`AuthConfigSource`] mirrors the raw shape a loader typically produces
//! (every field optional, the method as free text) and converts into an [`AuthConfig`]
//! through the same checks as [`AuthConfigBuilder`].

// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Bearer-token acquisition flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
	/// OAuth 2.0 client-credentials grant.
	OAuth2,
	/// HTTP Basic token exchange.
	Basic,
}
impl AuthMethod {
	/// Returns a stable label suitable for logs and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::OAuth2 => "oauth2",
			Self::Basic => "basic",
		}
	}
}
impl Display for AuthMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for AuthMethod {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim();

		if trimmed.is_empty() {
			return Err(ConfigError::MissingAuthMethod);
		}
		if trimmed.eq_ignore_ascii_case("oauth2") {
			Ok(Self::OAuth2)
		} else if trimmed.eq_ignore_ascii_case("basic") {
			Ok(Self::Basic)
		} else {
			Err(ConfigError::UnknownAuthMethod(trimmed.to_owned()))
		}
	}
}

/// Credentials for the selected [`AuthMethod`].
#[derive(Clone)]
pub enum Credentials {
	/// OAuth 2.0 API client credentials.
	OAuth2 {
		/// API client identifier.
		client_id: String,
		/// API client secret.
		client_secret: TokenSecret,
	},
	/// Jamf Pro user account credentials.
	Basic {
		/// Account name.
		username: String,
		/// Account password.
		password: TokenSecret,
	},
}
impl Credentials {
	/// Returns the flow these credentials belong to.
	pub fn method(&self) -> AuthMethod {
		match self {
			Self::OAuth2 { .. } => AuthMethod::OAuth2,
			Self::Basic { .. } => AuthMethod::Basic,
		}
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::OAuth2 { client_id, .. } => f
				.debug_struct("Credentials::OAuth2")
				.field("client_id", client_id)
				.field("client_secret", &"<redacted>")
				.finish(),
			Self::Basic { username, .. } => f
				.debug_struct("Credentials::Basic")
				.field("username", username)
				.field("password", &"<redacted>")
				.finish(),
		}
	}
}

/// Token endpoint paths, relative to the instance base URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenEndpoints {
	/// OAuth 2.0 client-credentials token endpoint.
	pub oauth2: String,
	/// Basic-auth token exchange endpoint.
	pub basic: String,
	/// Bearer-token invalidation endpoint.
	pub invalidate: String,
	/// Bearer-token keep-alive endpoint.
	pub keep_alive: String,
}
impl Default for TokenEndpoints {
	fn default() -> Self {
		Self {
			oauth2: "api/oauth/token".into(),
			basic: "api/v1/auth/token".into(),
			invalidate: "api/v1/auth/invalidate-token".into(),
			keep_alive: "api/v1/auth/keep-alive".into(),
		}
	}
}

/// Immutable, validated authentication configuration.
#[derive(Clone, Debug)]
pub struct AuthConfig {
	/// Instance base URL, always ending with `/` so relative paths join underneath it.
	pub base_url: Url,
	/// Flow credentials.
	pub credentials: Credentials,
	/// Lead time before expiry at which a token is proactively refetched.
	pub refresh_buffer: Duration,
	/// Keeps token values out of logs when `true`.
	pub hide_sensitive_data: bool,
	/// Token endpoint paths.
	pub endpoints: TokenEndpoints,
}
impl AuthConfig {
	/// Default refresh buffer (five minutes).
	pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(5 * 60);

	/// Returns a builder seeded with the instance base URL.
	pub fn builder(base_url: impl Into<String>) -> AuthConfigBuilder {
		AuthConfigBuilder::new(base_url)
	}

	/// Returns the selected flow.
	pub fn auth_method(&self) -> AuthMethod {
		self.credentials.method()
	}

	/// Resolves a path relative to the instance base URL.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		let relative = path.trim_start_matches('/');

		self.base_url
			.join(relative)
			.map_err(|source| ConfigError::InvalidUrl { value: path.to_owned(), source })
	}
}

/// Builder for [`AuthConfig`] values.
///
/// Setters may be called in any order; a later call overrides an earlier one.
#[derive(Clone, Debug)]
pub struct AuthConfigBuilder {
	base_url: String,
	auth_method: Option<String>,
	client_id: Option<String>,
	client_secret: Option<String>,
	username: Option<String>,
	password: Option<String>,
	refresh_buffer: Duration,
	hide_sensitive_data: bool,
	endpoints: TokenEndpoints,
}
impl AuthConfigBuilder {
	/// Creates a new builder seeded with the instance base URL.
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into(),
			auth_method: None,
			client_id: None,
			client_secret: None,
			username: None,
			password: None,
			refresh_buffer: AuthConfig::DEFAULT_REFRESH_BUFFER,
			hide_sensitive_data: true,
			endpoints: TokenEndpoints::default(),
		}
	}

	/// Selects the flow.
	pub fn auth_method(mut self, method: AuthMethod) -> Self {
		self.auth_method = Some(method.as_str().into());

		self
	}

	/// Selects the flow from free text (`oauth2` or `basic`, case-insensitive).
	pub fn auth_method_str(mut self, method: impl Into<String>) -> Self {
		self.auth_method = Some(method.into());

		self
	}

	/// Sets the OAuth 2.0 client identifier.
	pub fn client_id(mut self, value: impl Into<String>) -> Self {
		self.client_id = Some(value.into());

		self
	}

	/// Sets the OAuth 2.0 client secret.
	pub fn client_secret(mut self, value: impl Into<String>) -> Self {
		self.client_secret = Some(value.into());

		self
	}

	/// Sets the Basic-auth account name.
	pub fn username(mut self, value: impl Into<String>) -> Self {
		self.username = Some(value.into());

		self
	}

	/// Sets the Basic-auth password.
	pub fn password(mut self, value: impl Into<String>) -> Self {
		self.password = Some(value.into());

		self
	}

	/// Overrides the refresh buffer (defaults to five minutes).
	pub fn refresh_buffer(mut self, buffer: Duration) -> Self {
		self.refresh_buffer = buffer;

		self
	}

	/// Controls whether token values are redacted from logs (defaults to `true`).
	pub fn hide_sensitive_data(mut self, hide: bool) -> Self {
		self.hide_sensitive_data = hide;

		self
	}

	/// Overrides the token endpoint paths.
	pub fn endpoints(mut self, endpoints: TokenEndpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Validates the inputs and produces an [`AuthConfig`].
	pub fn build(self) -> Result<AuthConfig, ConfigError> {
		let raw_base = self.base_url.trim();

		if raw_base.is_empty() {
			return Err(ConfigError::MissingBaseUrl);
		}

		let base_url = parse_base_url(raw_base)?;
		let method: AuthMethod =
			self.auth_method.as_deref().ok_or(ConfigError::MissingAuthMethod)?.parse()?;
		let credentials = match method {
			AuthMethod::OAuth2 => Credentials::OAuth2 {
				client_id: required(method, "client_id", self.client_id)?,
				client_secret: TokenSecret::new(required(
					method,
					"client_secret",
					self.client_secret,
				)?),
			},
			AuthMethod::Basic => Credentials::Basic {
				username: required(method, "username", self.username)?,
				password: TokenSecret::new(required(method, "password", self.password)?),
			},
		};

		Ok(AuthConfig {
			base_url,
			credentials,
			refresh_buffer: self.refresh_buffer,
			hide_sensitive_data: self.hide_sensitive_data,
			endpoints: self.endpoints,
		})
	}
}

/// Raw configuration values as produced by a file or environment loader.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfigSource {
	/// Instance base URL.
	pub instance_url: String,
	/// Flow label (`oauth2` or `basic`).
	pub auth_method: String,
	/// OAuth 2.0 client identifier.
	pub client_id: Option<String>,
	/// OAuth 2.0 client secret.
	pub client_secret: Option<String>,
	/// Basic-auth account name.
	pub basic_auth_username: Option<String>,
	/// Basic-auth password.
	pub basic_auth_password: Option<String>,
	/// Refresh buffer in seconds.
	pub token_refresh_buffer_secs: Option<u64>,
	/// Keeps token values out of logs.
	pub hide_sensitive_data: Option<bool>,
}
impl TryFrom<AuthConfigSource> for AuthConfig {
	type Error = ConfigError;

	fn try_from(source: AuthConfigSource) -> Result<Self, Self::Error> {
		let mut builder =
			AuthConfig::builder(source.instance_url).auth_method_str(source.auth_method);

		if let Some(value) = source.client_id {
			builder = builder.client_id(value);
		}
		if let Some(value) = source.client_secret {
			builder = builder.client_secret(value);
		}
		if let Some(value) = source.basic_auth_username {
			builder = builder.username(value);
		}
		if let Some(value) = source.basic_auth_password {
			builder = builder.password(value);
		}
		if let Some(secs) = source.token_refresh_buffer_secs {
			builder = builder.refresh_buffer(Duration::from_secs(secs));
		}
		if let Some(hide) = source.hide_sensitive_data {
			builder = builder.hide_sensitive_data(hide);
		}

		builder.build()
	}
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
	let normalized = if raw.ends_with('/') { raw.to_owned() } else { format!("{raw}/") };

	Url::parse(&normalized)
		.map_err(|source| ConfigError::InvalidUrl { value: raw.to_owned(), source })
}

fn required(
	method: AuthMethod,
	field: &'static str,
	value: Option<String>,
) -> Result<String, ConfigError> {
	match value {
		Some(v) if !v.trim().is_empty() => Ok(v),
		_ => Err(ConfigError::MissingCredential { method: method.as_str(), field }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn oauth2_config_requires_both_client_fields() {
		let err = AuthConfig::builder("https://example.jamfcloud.com")
			.auth_method(AuthMethod::OAuth2)
			.client_id("id")
			.build()
			.expect_err("Missing client secret should fail validation.");

		assert!(matches!(
			err,
			ConfigError::MissingCredential { method: "oauth2", field: "client_secret" }
		));

		let err = AuthConfig::builder("https://example.jamfcloud.com")
			.auth_method(AuthMethod::OAuth2)
			.client_id("   ")
			.client_secret("secret")
			.build()
			.expect_err("Blank client id should fail validation.");

		assert!(matches!(err, ConfigError::MissingCredential { field: "client_id", .. }));
	}

	#[test]
	fn method_must_be_set_and_known() {
		let err = AuthConfig::builder("https://example.jamfcloud.com")
			.username("u")
			.password("p")
			.build()
			.expect_err("Unset method should fail validation.");

		assert!(matches!(err, ConfigError::MissingAuthMethod));

		let err = AuthConfig::builder("https://example.jamfcloud.com")
			.auth_method_str("kerberos")
			.build()
			.expect_err("Unknown method should fail validation.");

		assert!(matches!(err, ConfigError::UnknownAuthMethod(ref m) if m == "kerberos"));
	}

	#[test]
	fn later_setters_override_earlier_ones() {
		let config = AuthConfig::builder("https://example.jamfcloud.com")
			.auth_method(AuthMethod::OAuth2)
			.auth_method_str("BASIC")
			.username("first")
			.username("admin")
			.password("p")
			.refresh_buffer(Duration::from_secs(30))
			.build()
			.expect("Basic configuration should validate.");

		assert_eq!(config.auth_method(), AuthMethod::Basic);
		assert!(matches!(
			config.credentials,
			Credentials::Basic { ref username, .. } if username == "admin"
		));
		assert_eq!(config.refresh_buffer, Duration::from_secs(30));
		assert!(config.hide_sensitive_data);
	}

	#[test]
	fn resolve_joins_under_the_base_path() {
		let config = AuthConfig::builder("https://example.com/jamf")
			.auth_method(AuthMethod::Basic)
			.username("u")
			.password("p")
			.build()
			.expect("Basic configuration should validate.");

		assert_eq!(
			config.resolve("/api/v1/auth/token").expect("Path should resolve.").as_str(),
			"https://example.com/jamf/api/v1/auth/token"
		);
	}

	#[test]
	fn source_converts_through_validation() {
		let source: AuthConfigSource = serde_json::from_str(
			r#"{"instance_url":"https://example.jamfcloud.com","auth_method":"oauth2","client_id":"id","client_secret":"secret","token_refresh_buffer_secs":120}"#,
		)
		.expect("Source fixture should deserialize.");
		let config = AuthConfig::try_from(source).expect("Source should validate.");

		assert_eq!(config.auth_method(), AuthMethod::OAuth2);
		assert_eq!(config.refresh_buffer, Duration::from_secs(120));
		let rendered = format!("{:?}", config.credentials);

		assert!(rendered.contains("<redacted>"));
		assert!(!rendered.contains("\"secret\""));
	}
}
