use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{InboxApi, InteractiveRequest, MediaRequest, PageQuery};
use crate::errors::{InboxError, InboxResult};
use crate::model::{Conversation, Message, MessageTemplate, PriceInfo, Reaction, TemplateSend};
use crate::utils::http::{MAX_ERROR_BODY_BYTES, default_http_client, limited_text};
use crate::utils::truncate_for_log;

/// REST client for the inbox backend.
pub struct HttpInboxApi {
    base_url: String,
    token: String,
    client: Client,
}

#[derive(Deserialize)]
struct MessagesPage {
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct TemplatesPage {
    templates: Vec<MessageTemplate>,
}

#[derive(Deserialize)]
struct ReactionsPage {
    reactions: Vec<Reaction>,
}

impl HttpInboxApi {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client: default_http_client(),
        }
    }

    fn conversation_url(&self, conversation_id: &str, suffix: &str) -> String {
        format!(
            "{}/conversations/{}{}",
            self.base_url,
            urlencoding::encode(conversation_id),
            suffix
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        if self.token.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.token)
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> InboxResult<T> {
        let resp = self
            .authorized(self.client.get(url).query(query))
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json::<T>().await?)
    }

    async fn post_json(&self, url: &str, body: &Value) -> InboxResult<()> {
        let resp = self
            .authorized(self.client.post(url).json(body))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl InboxApi for HttpInboxApi {
    async fn get_conversation(&self, conversation_id: &str) -> InboxResult<Conversation> {
        self.get_json(&self.conversation_url(conversation_id, ""), &[])
            .await
    }

    async fn get_messages(
        &self,
        conversation_id: &str,
        query: PageQuery,
    ) -> InboxResult<Vec<Message>> {
        let mut params = vec![("limit", query.limit.to_string())];
        if let Some(before) = query.before {
            params.push((
                "before",
                before.to_rfc3339_opts(SecondsFormat::Millis, true),
            ));
        }
        let page: MessagesPage = self
            .get_json(&self.conversation_url(conversation_id, "/messages"), &params)
            .await?;
        debug!(
            "fetched {} messages for {}",
            page.messages.len(),
            conversation_id
        );
        Ok(page.messages)
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        client_temp_id: &str,
        text: &str,
    ) -> InboxResult<()> {
        let body = json!({"content": text, "clientTempId": client_temp_id});
        self.post_json(&self.conversation_url(conversation_id, "/messages"), &body)
            .await
    }

    async fn send_media_message(
        &self,
        client_temp_id: &str,
        request: &MediaRequest,
    ) -> InboxResult<()> {
        let mut body = serde_json::to_value(request).map_err(anyhow::Error::from)?;
        body["clientTempId"] = json!(client_temp_id);
        self.post_json(
            &self.conversation_url(&request.conversation_id, "/messages/media"),
            &body,
        )
        .await
    }

    async fn send_interactive_message(
        &self,
        client_temp_id: &str,
        request: &InteractiveRequest,
    ) -> InboxResult<()> {
        let mut body = serde_json::to_value(request).map_err(anyhow::Error::from)?;
        body["clientTempId"] = json!(client_temp_id);
        self.post_json(
            &self.conversation_url(&request.conversation_id, "/messages/interactive"),
            &body,
        )
        .await
    }

    async fn send_template_message(
        &self,
        conversation_id: &str,
        client_temp_id: &str,
        template: &TemplateSend,
    ) -> InboxResult<()> {
        // the rendered preview stays local
        let mut body = json!({
            "templateName": template.template_name,
            "languageCode": template.language_code,
            "clientTempId": client_temp_id,
        });
        if let Some(components) = &template.components {
            body["components"] = json!(components);
        }
        self.post_json(
            &self.conversation_url(conversation_id, "/messages/template"),
            &body,
        )
        .await
    }

    async fn get_message_price(&self, conversation_id: &str) -> InboxResult<PriceInfo> {
        self.get_json(&self.conversation_url(conversation_id, "/price"), &[])
            .await
    }

    async fn get_available_templates(
        &self,
        conversation_id: &str,
    ) -> InboxResult<Vec<MessageTemplate>> {
        let page: TemplatesPage = self
            .get_json(&self.conversation_url(conversation_id, "/templates"), &[])
            .await?;
        Ok(page.templates)
    }

    async fn get_reactions(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> InboxResult<Vec<Reaction>> {
        let page: ReactionsPage = self
            .get_json(
                &self.conversation_url(conversation_id, "/reactions"),
                &[("messageId", message_id.to_string())],
            )
            .await?;
        Ok(page.reactions)
    }
}

/// Map a non-success response to a typed error; success passes through.
pub(crate) async fn check_status(resp: Response) -> InboxResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let retry_after = resp
        .headers()
        .get("retry-after")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());
    let text = limited_text(resp, MAX_ERROR_BODY_BYTES)
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(classify_error(status, retry_after, &text))
}

pub(crate) fn classify_error(status: StatusCode, retry_after: Option<u64>, body: &str) -> InboxError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!("inbox backend rate limit hit (retry after {:?}s)", retry_after);
        return InboxError::RateLimit { retry_after };
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return InboxError::Auth(format!(
            "backend refused credentials ({}): {}",
            status.as_u16(),
            truncate_for_log(body, 200)
        ));
    }
    if status.is_server_error() {
        return InboxError::Network {
            message: format!("backend error {}: {}", status.as_u16(), truncate_for_log(body, 200)),
            retryable: true,
        };
    }

    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    let (message, code, details) = match error {
        Some(Value::Object(err)) => (
            err.get("message")
                .and_then(Value::as_str)
                .map_or_else(|| format!("request rejected ({})", status.as_u16()), str::to_string),
            err.get("code").map(|c| match c {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            err.get("details").cloned(),
        ),
        Some(Value::String(message)) => (message.clone(), None, None),
        _ => (
            format!("request rejected ({}): {}", status.as_u16(), truncate_for_log(body, 200)),
            None,
            None,
        ),
    };
    InboxError::Validation {
        message,
        code,
        details,
    }
}
