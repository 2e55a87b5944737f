//! A backend for Llama Stack servers.
//!
//! Catalog and lifecycle calls are plain JSON requests, turns are streamed
//! as server-sent events.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use insight_agent_backend::{
    AgentConfig, AgentId, Backend, BackendError, ErrorKind, ModelInfo,
    SessionId, ShieldInfo, ToolGroupInfo, ToolInfo, TurnRequest,
    VectorDbInfo,
};
use mime::Mime;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url, header};
use serde::de::DeserializeOwned;
use tracing::Instrument;

pub use config::{LlamaStackConfig, LlamaStackConfigBuilder};
use io::{Chunks, Sse};
pub use response::LlamaStackResponse;

const PROVIDER_DATA_HEADER: &str = "X-LlamaStack-Provider-Data";

/// Error type for [`LlamaStackBackend`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_connect() || err.is_timeout() {
            ErrorKind::Unavailable
        } else if err.status() == Some(StatusCode::NOT_FOUND) {
            ErrorKind::NotFound
        } else if err.is_decode() {
            ErrorKind::InvalidResponse
        } else {
            ErrorKind::Other
        };
        Self::new(format!("{err}"), kind)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl BackendError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Llama Stack backend.
#[derive(Clone, Debug)]
pub struct LlamaStackBackend {
    client: Client,
    config: Arc<LlamaStackConfig>,
}

impl LlamaStackBackend {
    /// Creates a new `LlamaStackBackend` with the given configuration.
    #[inline]
    pub fn new(config: LlamaStackConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.base_url, path)
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder;
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }
        if let Some(provider_data) = &self.config.provider_data {
            builder = builder.header(PROVIDER_DATA_HEADER, provider_data);
        }
        builder
    }

    fn get(&self, url: Url) -> RequestBuilder {
        debug!("GET {url}");
        self.request(self.client.get(url))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("POST {url}");
        self.request(self.client.post(url))
    }

    fn list<T: DeserializeOwned + Send + 'static>(
        &self,
        url: Result<Url, Error>,
    ) -> impl Future<Output = Result<Vec<T>, Error>> + Send + 'static + use<T>
    {
        let req = url.map(|url| self.get(url));
        async move {
            let resp: proto::ListResponse<T> = send_json(req?).await?;
            Ok(resp.data)
        }
        .instrument(debug_span!("backend list"))
    }
}

async fn send_json<T: DeserializeOwned>(
    req: RequestBuilder,
) -> Result<T, Error> {
    let resp = req
        .send()
        .await
        .and_then(Response::error_for_status)
        .map_err(Error::from_reqwest)?;
    resp.json::<T>().await.map_err(|err| {
        Error::new(format!("{err}"), ErrorKind::InvalidResponse)
    })
}

fn parse_url(url: &str, params: &[(&str, &str)]) -> Result<Url, Error> {
    let mut parsed = Url::parse(url).map_err(|err| {
        Error::new(format!("invalid url {url}: {err}"), ErrorKind::Other)
    })?;
    if !params.is_empty() {
        parsed.query_pairs_mut().extend_pairs(params);
    }
    Ok(parsed)
}

impl Backend for LlamaStackBackend {
    type Error = Error;
    type Response = LlamaStackResponse;

    fn list_models(
        &self,
    ) -> impl Future<Output = Result<Vec<ModelInfo>, Self::Error>> + Send + 'static
    {
        self.list(parse_url(&self.url("models"), &[]))
    }

    fn list_tool_groups(
        &self,
    ) -> impl Future<Output = Result<Vec<ToolGroupInfo>, Self::Error>>
    + Send
    + 'static {
        self.list(parse_url(&self.url("toolgroups"), &[]))
    }

    fn list_tools(
        &self,
        toolgroup_id: &str,
    ) -> impl Future<Output = Result<Vec<ToolInfo>, Self::Error>> + Send + 'static
    {
        self.list(parse_url(
            &self.url("tools"),
            &[("toolgroup_id", toolgroup_id)],
        ))
    }

    fn list_vector_dbs(
        &self,
    ) -> impl Future<Output = Result<Vec<VectorDbInfo>, Self::Error>>
    + Send
    + 'static {
        self.list(parse_url(&self.url("vector-dbs"), &[]))
    }

    fn list_shields(
        &self,
    ) -> impl Future<Output = Result<Vec<ShieldInfo>, Self::Error>> + Send + 'static
    {
        self.list(parse_url(&self.url("shields"), &[]))
    }

    fn create_agent(
        &self,
        config: &AgentConfig,
    ) -> impl Future<Output = Result<AgentId, Self::Error>> + Send + 'static
    {
        let req = self.post("agents").json(&proto::CreateAgentRequest {
            agent_config: config,
        });
        async move {
            let resp: proto::CreateAgentResponse = send_json(req).await?;
            debug!("created agent {}", resp.agent_id);
            Ok(AgentId(resp.agent_id))
        }
        .instrument(debug_span!("backend create agent"))
    }

    fn create_session(
        &self,
        agent_id: &AgentId,
        session_name: &str,
    ) -> impl Future<Output = Result<SessionId, Self::Error>> + Send + 'static
    {
        let req = self
            .post(&format!("agents/{agent_id}/session"))
            .json(&proto::CreateSessionRequest { session_name });
        async move {
            let resp: proto::CreateSessionResponse = send_json(req).await?;
            Ok(SessionId(resp.session_id))
        }
        .instrument(debug_span!("backend create session"))
    }

    fn create_turn(
        &self,
        req: &TurnRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let stream = req.stream;
        let mut builder = self
            .post(&format!(
                "agents/{}/session/{}/turn",
                req.agent_id, req.session_id
            ))
            .json(&proto::create_turn_request(&req.message, stream));
        if stream {
            builder = builder.header(header::ACCEPT, "text/event-stream");
        }

        async move {
            if !stream {
                let turn: proto::Turn = send_json(builder).await?;
                return Ok(LlamaStackResponse::from_events(proto::turn_events(
                    turn,
                )));
            }

            let resp = builder
                .send()
                .await
                .and_then(Response::error_for_status)
                .map_err(Error::from_reqwest)?;

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_event_stream = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.subtype().as_str() == "event-stream")
                .unwrap_or(false);
            if !is_event_stream {
                return Err(Error::new(
                    format!("Unexpected content type: {content_type:?}"),
                    ErrorKind::InvalidResponse,
                ));
            }

            // Here we got a successful response.
            let chunks = Chunks::from_response(resp);
            let sse = Sse::new(chunks);
            Ok(LlamaStackResponse::from_sse(sse))
        }
        .instrument(debug_span!("backend turn"))
    }
}
