//! REST client for the Huddle backend.
//!
//! Every response body is a `{data, msg}` envelope. Authentication rides on
//! the session cookie (kept in reqwest's cookie store) or, when configured,
//! a bearer token.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use huddle_shared::constants::endpoints;
use huddle_shared::models::{
    ActionableKind, AnyMessage, Chat, ChatMessage, ReplyTo, User,
};
use huddle_shared::{ChatId, MessageId, UserId};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    msg: Option<String>,
}

/// A file picked for upload.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    fn into_part(self) -> Result<Part> {
        Ok(Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(&self.mime)?)
    }
}

/// A plain text or attachment message ready to be posted.
#[derive(Debug, Clone)]
pub struct TextMessage {
    pub content: String,
    pub file: Option<FileUpload>,
    pub reply_to: Option<ReplyTo>,
}

/// A task or event ready to be posted.
#[derive(Debug, Clone)]
pub struct ActionableDraft {
    pub kind: ActionableKind,
    pub title: String,
    pub description: Option<String>,
    pub targeted_users: Vec<UserId>,
    pub files: Vec<FileUpload>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionableForm<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    targeted_users: &'a [UserId],
}

/// Group settings for [`ApiClient::create_chat`].
#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub name: String,
    pub image: Option<FileUpload>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| ClientError::InvalidConfig(format!("base URL: {e}")))?;

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ClientError::InvalidConfig(format!("auth token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.http_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { http, base })
    }

    // ------------------------------------------------------------------
    // User
    // ------------------------------------------------------------------

    pub async fn get_profile(&self) -> Result<User> {
        self.call(self.request(Method::GET, endpoints::GET_PROFILE)?)
            .await
    }

    pub async fn update_profile_image(&self, image: FileUpload) -> Result<User> {
        let form = Form::new().part("userImage", image.into_part()?);
        self.call(
            self.request(Method::PATCH, endpoints::UPDATE_PROFILE)?
                .multipart(form),
        )
        .await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.call(self.request(Method::GET, endpoints::GET_ALL_USERS)?)
            .await
    }

    pub async fn logout(&self) -> Result<()> {
        self.call_unit(self.request(Method::POST, endpoints::LOGOUT)?)
            .await
    }

    // ------------------------------------------------------------------
    // Chats
    // ------------------------------------------------------------------

    pub async fn list_chats(&self) -> Result<Vec<Chat>> {
        self.call(self.request(Method::GET, endpoints::GET_USER_CHATS)?)
            .await
    }

    /// Create a direct chat (`group: None`, one user) or a group.
    pub async fn create_chat(&self, users: &[User], group: Option<GroupSpec>) -> Result<Chat> {
        let mut form = Form::new().text("users", serde_json::to_string(users)?);
        if let Some(group) = group {
            form = form
                .text("isGroup", "true")
                .text("groupName", group.name);
            if let Some(image) = group.image {
                form = form.part("groupImage", image.into_part()?);
            }
        }
        self.call(
            self.request(Method::POST, endpoints::CREATE_CHAT)?
                .multipart(form),
        )
        .await
    }

    /// Full history of a chat. Plain and actionable messages come back in
    /// the same list.
    pub async fn get_messages(&self, chat_id: &ChatId) -> Result<Vec<AnyMessage>> {
        let raw: Vec<Value> = self
            .call(self.request_for(Method::GET, endpoints::GET_MESSAGES, chat_id.as_str())?)
            .await?;
        raw.into_iter()
            .map(|value| AnyMessage::from_value(value).map_err(ClientError::from))
            .collect()
    }

    pub async fn add_members(&self, chat_id: &ChatId, users: &[User]) -> Result<()> {
        self.call_unit(
            self.request_for(Method::PATCH, endpoints::ADD_USER, chat_id.as_str())?
                .json(&json!({ "users": users })),
        )
        .await
    }

    pub async fn remove_member(&self, chat_id: &ChatId, user_id: &UserId) -> Result<()> {
        self.call_unit(
            self.request_for(Method::PATCH, endpoints::REMOVE_USER, chat_id.as_str())?
                .json(&json!({ "userId": user_id })),
        )
        .await
    }

    /// The server flips the block state; the caller knows which way.
    pub async fn toggle_block(&self, chat_id: &ChatId) -> Result<()> {
        self.call_unit(self.request_for(Method::PATCH, endpoints::TOGGLE_BLOCK, chat_id.as_str())?)
            .await
    }

    pub async fn update_chat_image(&self, chat_id: &ChatId, image: FileUpload) -> Result<Chat> {
        let form = Form::new().part("groupImage", image.into_part()?);
        self.call(
            self.request_for(Method::PATCH, endpoints::UPDATE_CHAT_IMAGE, chat_id.as_str())?
                .multipart(form),
        )
        .await
    }

    pub async fn exit_chat(&self, chat_id: &ChatId) -> Result<()> {
        self.call_unit(self.request_for(Method::PATCH, endpoints::EXIT_CHAT, chat_id.as_str())?)
            .await
    }

    pub async fn delete_chat(&self, chat_id: &ChatId) -> Result<()> {
        self.call_unit(self.request_for(Method::DELETE, endpoints::DELETE_CHAT, chat_id.as_str())?)
            .await
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    pub async fn create_message(&self, chat_id: &ChatId, message: TextMessage) -> Result<AnyMessage> {
        let mut form = Form::new()
            .text("type", "text")
            .text("content", message.content);
        if let Some(file) = message.file {
            form = form.part("file", file.into_part()?);
        }
        if let Some(reply_to) = message.reply_to {
            form = form.text("replyTo", serde_json::to_string(&reply_to)?);
        }
        self.post_message(chat_id, form).await
    }

    pub async fn create_actionable(
        &self,
        chat_id: &ChatId,
        draft: ActionableDraft,
    ) -> Result<AnyMessage> {
        let payload = ActionableForm {
            title: &draft.title,
            description: draft.description.as_deref(),
            targeted_users: &draft.targeted_users,
        };
        let mut form = Form::new()
            .text("type", draft.kind.as_str())
            .text("payload", serde_json::to_string(&payload)?);
        for file in draft.files {
            form = form.part("files", file.into_part()?);
        }
        self.post_message(chat_id, form).await
    }

    pub async fn delete_message(&self, message_id: &MessageId) -> Result<()> {
        self.call_unit(self.request_for(
            Method::DELETE,
            endpoints::DELETE_MESSAGE,
            message_id.as_str(),
        )?)
        .await
    }

    /// Ask the assistant of a bot chat to answer `content`.
    pub async fn bot_reply(&self, chat_id: &ChatId, content: &str) -> Result<ChatMessage> {
        self.call(
            self.request_for(Method::POST, endpoints::BOT_REPLY, chat_id.as_str())?
                .json(&json!({ "content": content })),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    async fn post_message(&self, chat_id: &ChatId, form: Form) -> Result<AnyMessage> {
        let data: Value = self
            .call(
                self.request_for(Method::POST, endpoints::CREATE_MESSAGE, chat_id.as_str())?
                    .multipart(form),
            )
            .await?;
        Ok(AnyMessage::from_value(data)?)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self
            .base
            .join(path)
            .map_err(|e| ClientError::InvalidConfig(format!("{path}: {e}")))?;
        debug!(method = %method, url = %url, "Request");
        Ok(self.http.request(method, url))
    }

    fn request_for(&self, method: Method, path: &str, id: &str) -> Result<RequestBuilder> {
        self.request(method, &format!("{path}/{id}"))
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let data = self
            .execute(request)
            .await?
            .ok_or_else(|| ClientError::UnexpectedResponse("response has no data".into()))?;
        Ok(serde_json::from_value(data)?)
    }

    async fn call_unit(&self, request: RequestBuilder) -> Result<()> {
        self.execute(request).await.map(|_| ())
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Option<Value>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let msg = serde_json::from_slice::<Envelope>(&body)
                .ok()
                .and_then(|e| e.msg);
            warn!(status = status.as_u16(), msg = ?msg, "Request failed");
            return Err(ClientError::Server {
                status: status.as_u16(),
                msg,
            });
        }

        if body.is_empty() {
            return Ok(None);
        }
        let envelope: Envelope = serde_json::from_slice(&body)?;
        Ok(envelope.data.filter(|data| !data.is_null()))
    }
}
