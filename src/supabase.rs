//! Client for the hosted backend: PostgREST rows under `/rest/v1` and the
//! auth service under `/auth/v1`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::session::{Authenticator, Session};
use crate::store::TaskStore;
use crate::task::{NewTask, Task, TaskId, TaskPatch};

const TASKS_TABLE: &str = "tasks";

#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    anon_key: String,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

// The services report failures under different keys depending on the endpoint.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
    }
}

impl SupabaseClient {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    fn rest_url(&self) -> String {
        format!("{}/rest/v1/{TASKS_TABLE}", self.base_url)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder, session: &Session) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
    }

    async fn send(request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| format!("HTTP {status}"));
        warn!(%status, %message, "backend rejected request");
        Err(Error::Store(message))
    }

    async fn json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let text = Self::send(request).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    // PostgREST answers `return=representation` writes with an array; an
    // empty one means the filter matched nothing the caller may see.
    async fn single_row(request: RequestBuilder) -> Result<Task> {
        let rows: Vec<Task> = Self::json(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::store("Task not found or not accessible"))
    }
}

#[async_trait]
impl TaskStore for SupabaseClient {
    async fn select_all(&self, session: &Session) -> Result<Vec<Task>> {
        debug!("GET {TASKS_TABLE}");
        let request = self
            .http
            .get(self.rest_url())
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        Self::json(self.authorized(request, session)).await
    }

    async fn insert(&self, session: &Session, task: &NewTask) -> Result<Task> {
        debug!("POST {TASKS_TABLE}");
        let body = json!([{
            "title": task.title,
            "priority": task.priority,
            "status": task.status,
            "user_id": session.user_id,
        }]);
        let request = self
            .http
            .post(self.rest_url())
            .header("Prefer", "return=representation")
            .json(&body);
        Self::single_row(self.authorized(request, session)).await
    }

    async fn update(&self, session: &Session, id: &TaskId, patch: &TaskPatch) -> Result<Task> {
        debug!(%id, "PATCH {TASKS_TABLE}");
        let request = self
            .http
            .patch(self.rest_url())
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(patch);
        Self::single_row(self.authorized(request, session)).await
    }

    async fn delete(&self, session: &Session, id: &TaskId) -> Result<()> {
        debug!(%id, "DELETE {TASKS_TABLE}");
        let request = self
            .http
            .delete(self.rest_url())
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation");
        Self::single_row(self.authorized(request, session)).await?;
        Ok(())
    }
}

#[async_trait]
impl Authenticator for SupabaseClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let request = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }));
        let token: TokenResponse = Self::json(request).await?;
        Ok(Session {
            user_id: token.user.id,
            email: token.user.email.unwrap_or_else(|| email.to_string()),
            name: token.user.user_metadata.name,
            access_token: token.access_token,
        })
    }

    async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<()> {
        let request = self
            .http
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "name": name },
            }));
        Self::send(request).await?;
        Ok(())
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        let request = self.http.post(self.auth_url("logout"));
        Self::send(self.authorized(request, session)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Priority, Status};
    use mockito::Matcher;

    const ROW: &str = r#"{
        "id": "t1", "title": "Buy milk", "priority": "medium", "status": "pending",
        "user_id": "u1",
        "created_at": "2024-05-01T10:00:00+00:00",
        "updated_at": "2024-05-01T10:00:00+00:00"
    }"#;

    fn session() -> Session {
        Session {
            user_id: "u1".into(),
            email: "ana@example.com".into(),
            name: None,
            access_token: "jwt".into(),
        }
    }

    #[tokio::test]
    async fn select_all_orders_newest_first_and_sends_credentials() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/tasks")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".into(), "*".into()),
                Matcher::UrlEncoded("order".into(), "created_at.desc".into()),
            ]))
            .match_header("apikey", "anon")
            .match_header("authorization", "Bearer jwt")
            .with_header("content-type", "application/json")
            .with_body(format!("[{ROW}]"))
            .create_async()
            .await;

        let client = SupabaseClient::new(server.url(), "anon");
        let rows = client.select_all(&session()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Buy milk");
    }

    #[tokio::test]
    async fn insert_sends_owner_from_session() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/tasks")
            .match_header("prefer", "return=representation")
            .match_body(Matcher::Json(serde_json::json!([{
                "title": "Buy milk",
                "priority": "medium",
                "status": "pending",
                "user_id": "u1"
            }])))
            .with_status(201)
            .with_body(format!("[{ROW}]"))
            .create_async()
            .await;

        let client = SupabaseClient::new(server.url(), "anon");
        let row = client
            .insert(
                &session(),
                &NewTask::new("Buy milk", Priority::Medium, Status::Pending),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(row.id, TaskId::new("t1"));
    }

    #[tokio::test]
    async fn update_with_no_visible_row_is_a_store_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PATCH", "/rest/v1/tasks")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.t9".into()))
            .match_body(Matcher::Json(serde_json::json!({ "status": "done" })))
            .with_body("[]")
            .create_async()
            .await;

        let client = SupabaseClient::new(server.url(), "anon");
        let err = client
            .update(&session(), &TaskId::new("t9"), &TaskPatch::status(Status::Done))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[tokio::test]
    async fn error_message_is_taken_from_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/rest/v1/tasks")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"message":"JWT expired"}"#)
            .create_async()
            .await;

        let client = SupabaseClient::new(server.url(), "anon");
        let err = client
            .delete(&session(), &TaskId::new("t1"))
            .await
            .unwrap_err();
        assert_eq!(err, Error::store("JWT expired"));
    }

    #[tokio::test]
    async fn delete_of_row_outside_caller_scope_is_a_store_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/rest/v1/tasks")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.someone-elses".into()))
            .match_header("prefer", "return=representation")
            .with_body("[]")
            .create_async()
            .await;

        let client = SupabaseClient::new(server.url(), "anon");
        let err = client
            .delete(&session(), &TaskId::new("someone-elses"))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, Error::Store(_)));
    }

    #[tokio::test]
    async fn delete_of_owned_row_succeeds() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/rest/v1/tasks")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.t1".into()))
            .with_body(format!("[{ROW}]"))
            .create_async()
            .await;

        let client = SupabaseClient::new(server.url(), "anon");
        client.delete(&session(), &TaskId::new("t1")).await.unwrap();
    }

    #[tokio::test]
    async fn sign_up_sends_name_as_metadata() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/v1/signup")
            .match_header("apikey", "anon")
            .match_body(Matcher::Json(serde_json::json!({
                "email": "ana@example.com",
                "password": "secret1",
                "data": { "name": "Ana" }
            })))
            .with_body(r#"{"id":"u1","email":"ana@example.com"}"#)
            .create_async()
            .await;

        let client = SupabaseClient::new(server.url(), "anon");
        client
            .sign_up("Ana", "ana@example.com", "secret1")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn sign_out_sends_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/v1/logout")
            .match_header("apikey", "anon")
            .match_header("authorization", "Bearer jwt")
            .with_status(204)
            .create_async()
            .await;

        let client = SupabaseClient::new(server.url(), "anon");
        client.sign_out(&session()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn sign_in_reads_name_from_metadata() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "password".into()))
            .with_body(
                r#"{"access_token":"jwt","token_type":"bearer",
                    "user":{"id":"u1","email":"ana@example.com","user_metadata":{"name":"Ana"}}}"#,
            )
            .create_async()
            .await;

        let client = SupabaseClient::new(server.url(), "anon");
        let session = client.sign_in("ana@example.com", "pw").await.unwrap();
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.display_name(), "Ana");
    }

    #[tokio::test]
    async fn bad_credentials_surface_service_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(
                r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
            )
            .create_async()
            .await;

        let client = SupabaseClient::new(server.url(), "anon");
        let err = client.sign_in("ana@example.com", "pw").await.unwrap_err();
        assert_eq!(err, Error::store("Invalid login credentials"));
    }
}
