use crate::{store::ObjectKey, Error, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::{fmt, time::Duration};
use tracing::{debug, instrument};

pub static ADMIN_USER_KEY: &str = "admin-user";
pub static ADMIN_PASSWORD_KEY: &str = "admin-password";
static ORG_ID_HEADER: &str = "X-Grafana-Org-Id";

/// Remote operations the reconcilers need from Grafana.
pub trait GrafanaApi {
    /// Creates an organization and returns its id.
    async fn create_organization(&self, name: &str) -> Result<i64>;
    /// Creates a team inside `org_id` and returns the team id.
    async fn create_team(&self, name: &str, org_id: i64) -> Result<i64>;
}

#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}
impl Credentials {
    pub fn from_secret(secret: &Secret) -> Result<Self> {
        let field = |key: &str| -> Result<String> {
            let bytes = secret
                .data
                .as_ref()
                .and_then(|d| d.get(key))
                .ok_or_else(|| Error::Credentials(format!("secret is missing key {key}")))?;
            String::from_utf8(bytes.0.clone()).map_err(|_| Error::Credentials(format!("{key} is not valid UTF-8")))
        };
        Ok(Self {
            user: field(ADMIN_USER_KEY)?,
            password: field(ADMIN_PASSWORD_KEY)?,
        })
    }
}

/// Where the admin credentials come from. Read on every call so rotated secrets take effect.
pub trait CredentialSource {
    async fn credentials(&self) -> Result<Credentials>;
}

/// Credentials stored in a Kubernetes secret under `admin-user` and `admin-password`.
#[derive(Clone)]
pub struct SecretCredentials {
    secrets: Api<Secret>,
    key: ObjectKey,
}
impl SecretCredentials {
    pub fn new(client: Client, key: ObjectKey) -> Self {
        Self {
            secrets: Api::namespaced(client, &key.namespace),
            key,
        }
    }
}
impl CredentialSource for SecretCredentials {
    async fn credentials(&self) -> Result<Credentials> {
        let secret = self
            .secrets
            .get_opt(&self.key.name)
            .await?
            .ok_or_else(|| Error::Credentials(format!("secret {} not found", self.key)))?;
        Credentials::from_secret(&secret)
    }
}

#[cfg(test)]
impl CredentialSource for Credentials {
    async fn credentials(&self) -> Result<Credentials> {
        Ok(self.clone())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrganization<'a> {
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTeam<'a> {
    name: &'a str,
    org_id: i64,
}

/// HTTP client for the Grafana admin API. Built once and shared by all reconcilers.
#[derive(Clone)]
pub struct GrafanaClient<C> {
    http: reqwest::Client,
    base_url: String,
    credentials: C,
}
impl<C: CredentialSource> GrafanaClient<C> {
    pub fn new(base_url: &str, timeout: Duration, credentials: C) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    async fn post(
        &self,
        operation: &'static str,
        path: &str,
        org_id: Option<i64>,
        body: &impl Serialize,
    ) -> Result<Value> {
        let creds = self.credentials.credentials().await?;
        let mut req = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .basic_auth(&creds.user, Some(&creds.password))
            .json(body);
        if let Some(org_id) = org_id {
            req = req.header(ORG_ID_HEADER, org_id.to_string());
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::RemoteStatus { operation, status, body });
        }
        debug!(%status, "{operation} succeeded");

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| Error::ResponseDecode {
            operation,
            reason: e.to_string(),
        })
    }
}

fn numeric_field(body: &Value, field: &str, operation: &'static str) -> Result<i64> {
    let value = body.get(field).ok_or_else(|| Error::ResponseDecode {
        operation,
        reason: format!("missing field {field}"),
    })?;
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
    value
        .as_i64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        })
        .ok_or_else(|| Error::ResponseDecode {
            operation,
            reason: format!("field {field} is not an integer: {value}"),
        })
}

impl<C: CredentialSource> GrafanaApi for GrafanaClient<C> {
    #[instrument(skip(self))]
    async fn create_organization(&self, name: &str) -> Result<i64> {
        let operation = "create organization";
        let body = self.post(operation, "/api/orgs", None, &CreateOrganization { name }).await?;
        numeric_field(&body, "id", operation)
    }

    #[instrument(skip(self))]
    async fn create_team(&self, name: &str, org_id: i64) -> Result<i64> {
        let operation = "create team";
        let body = self
            .post(operation, "/api/teams", Some(org_id), &CreateTeam { name, org_id })
            .await?;
        numeric_field(&body, "teamId", operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;
    use serde_json::json;
    use std::collections::BTreeMap;
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    // base64("admin:secret")
    const BASIC_AUTH: &str = "Basic YWRtaW46c2VjcmV0";

    fn client(server: &MockServer) -> GrafanaClient<Credentials> {
        GrafanaClient::new(
            &server.uri(),
            Duration::from_secs(2),
            Credentials {
                user: "admin".to_string(),
                password: "secret".to_string(),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn creates_organization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/orgs"))
            .and(header("authorization", BASIC_AUTH))
            .and(body_json(json!({"name": "Acme"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42, "message": "Organization created"})))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(client(&server).create_organization("Acme").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn accepts_created_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/orgs"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7.0})))
            .mount(&server)
            .await;

        assert_eq!(client(&server).create_organization("Acme").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn creates_team_in_organization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/teams"))
            .and(header("authorization", BASIC_AUTH))
            .and(header("x-grafana-org-id", "42"))
            .and(body_json(json!({"name": "Platform", "orgId": 42})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"teamId": 9, "message": "Team created"})))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(client(&server).create_team("Platform", 42).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn server_error_is_a_remote_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/orgs"))
            .respond_with(ResponseTemplate::new(500).set_body_string("database is locked"))
            .mount(&server)
            .await;

        match client(&server).create_organization("Acme").await {
            Err(Error::RemoteStatus { status, body, .. }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "database is locked");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn conflict_is_a_remote_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/teams"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({"message": "Team name taken"})))
            .mount(&server)
            .await;

        assert!(matches!(
            client(&server).create_team("Platform", 1).await,
            Err(Error::RemoteStatus { status: StatusCode::CONFLICT, .. })
        ));
    }

    #[tokio::test]
    async fn missing_or_malformed_ids_fail_to_decode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/orgs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"orgId": 3})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/teams"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let grafana = client(&server);
        assert!(matches!(
            grafana.create_organization("Acme").await,
            Err(Error::ResponseDecode { .. })
        ));
        assert!(matches!(
            grafana.create_team("Platform", 3).await,
            Err(Error::ResponseDecode { .. })
        ));
    }

    #[test]
    fn ids_must_be_integers() {
        assert!(numeric_field(&json!({"id": "7"}), "id", "test").is_err());
        assert!(numeric_field(&json!({"id": 7.5}), "id", "test").is_err());
        assert!(numeric_field(&json!({"id": u64::MAX}), "id", "test").is_err());
        assert!(numeric_field(&json!({"id": 1e300}), "id", "test").is_err());
        assert!(numeric_field(&json!({"id": -1e300}), "id", "test").is_err());
        assert!(numeric_field(&json!({"id": 9.3e18}), "id", "test").is_err());
        assert_eq!(numeric_field(&json!({"id": i64::MAX}), "id", "test").unwrap(), i64::MAX);
        assert_eq!(numeric_field(&json!({"id": 1e15}), "id", "test").unwrap(), 1_000_000_000_000_000);
        assert_eq!(numeric_field(&json!({"id": 7}), "id", "test").unwrap(), 7);
    }

    #[tokio::test]
    async fn slow_responses_time_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/orgs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": 1}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let grafana = GrafanaClient::new(
            &server.uri(),
            Duration::from_millis(200),
            Credentials {
                user: "admin".to_string(),
                password: "secret".to_string(),
            },
        )
        .unwrap();
        match grafana.create_organization("Acme").await {
            Err(Error::Http(e)) => assert!(e.is_timeout()),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn reads_credentials_from_secret() {
        let mut secret = Secret {
            data: Some(BTreeMap::from([
                (ADMIN_USER_KEY.to_string(), ByteString(b"admin".to_vec())),
                (ADMIN_PASSWORD_KEY.to_string(), ByteString(b"secret".to_vec())),
            ])),
            ..Default::default()
        };
        let creds = Credentials::from_secret(&secret).unwrap();
        assert_eq!(creds.user, "admin");
        assert_eq!(creds.password, "secret");
        assert!(!format!("{creds:?}").contains("secret"));

        secret.data.as_mut().unwrap().remove(ADMIN_PASSWORD_KEY);
        assert!(matches!(Credentials::from_secret(&secret), Err(Error::Credentials(_))));
    }
}
