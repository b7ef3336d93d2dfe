//! HTTP client for the submit / poll / fetch protocol.
//!
//! A submission returns `202 Accepted` with a `Location` pointing at the
//! ticket's poll address. Polling answers `200` while the ticket is pending
//! and `303 See Other` once it is ready; the redirect target serves the
//! stored outcome. Redirects are never followed automatically so the client
//! can tell the two apart.

use std::future::Future;

use appbus_core::{InvocationRequest, Outcome, ResultEnvelope, SubmissionReceipt, TicketId};
use reqwest::header::LOCATION;
use reqwest::{redirect, Response, StatusCode, Url};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;

/// A ticket issued by the server for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub ticket_id: TicketId,
    /// Absolute poll address taken from the `Location` header.
    pub poll_url: Url,
}

/// Answer of a single poll request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Pending,
    /// The outcome is recorded and can be fetched from this address.
    Ready(Url),
}

/// Submits invocations and drives the poll loop until an outcome arrives.
#[derive(Debug, Clone)]
pub struct InvocationClient {
    http: reqwest::Client,
    submit_url: Url,
    config: ClientConfig,
}

impl InvocationClient {
    /// Creates a client with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] when `server_url` + `base_path`
    /// is not a valid URL and [`ClientError::Transport`] if the HTTP client
    /// cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(config.request_timeout)
            .build()?;
        Self::with_client(http, config)
    }

    /// Creates a client reusing an existing [`reqwest::Client`].
    ///
    /// The supplied client must not follow redirects, otherwise a ready
    /// ticket is indistinguishable from a pending one.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] for an unusable server URL.
    pub fn with_client(http: reqwest::Client, config: ClientConfig) -> Result<Self, ClientError> {
        let server = parse_url(&config.server_url)?;
        let submit_url = join(&server, &config.base_path)?;
        Ok(Self {
            http,
            submit_url,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn submit_url(&self) -> &Url {
        &self.submit_url
    }

    /// Posts `request` and returns the issued ticket.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SubmissionRejected`] for any status other than
    /// `202 Accepted`, [`ClientError::Protocol`] when the acceptance lacks a
    /// usable `Location` or receipt, and [`ClientError::Transport`] on I/O
    /// failure.
    pub async fn submit(&self, request: &InvocationRequest) -> Result<Submission, ClientError> {
        let response = self
            .http
            .post(self.submit_url.clone())
            .json(&request.to_body())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let body = read_body(response).await;
            warn!(status = status.as_u16(), operation = %request.qualified_name(), "submission rejected");
            return Err(ClientError::SubmissionRejected {
                status: status.as_u16(),
                body,
            });
        }

        let poll_url = location(&response, &self.submit_url)?;
        let receipt: SubmissionReceipt = response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(format!("unreadable submission receipt: {e}")))?;

        info!(
            ticket_id = receipt.ticket_id.0,
            operation = %request.qualified_name(),
            target = %request.target,
            "invocation submitted"
        );
        Ok(Submission {
            ticket_id: receipt.ticket_id,
            poll_url,
        })
    }

    /// Issues one poll request against `poll_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] for any answer other than `200` or
    /// `303` with a `Location`, and [`ClientError::Transport`] on I/O failure.
    pub async fn poll(&self, poll_url: &Url) -> Result<PollState, ClientError> {
        let response = self.http.get(poll_url.clone()).send().await?;
        match response.status() {
            StatusCode::OK => Ok(PollState::Pending),
            StatusCode::SEE_OTHER => Ok(PollState::Ready(location(&response, poll_url)?)),
            other => Err(unexpected("poll", poll_url, other, response).await),
        }
    }

    /// Fetches the stored outcome from a ready ticket's result address.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] for a non-`200` answer or a body
    /// that is not a result envelope, and [`ClientError::Transport`] on I/O
    /// failure.
    pub async fn fetch(&self, result_url: &Url) -> Result<Outcome, ClientError> {
        let response = self.http.get(result_url.clone()).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(unexpected("fetch", result_url, status, response).await);
        }
        let envelope: ResultEnvelope = response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(format!("unreadable result envelope: {e}")))?;
        Ok(envelope.into())
    }

    /// Submits `request`, waits for it to complete and returns its result.
    ///
    /// # Errors
    ///
    /// See [`InvocationClient::invoke_with_cancel`].
    pub async fn invoke(&self, request: &InvocationRequest) -> Result<Value, ClientError> {
        self.invoke_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Like [`InvocationClient::invoke`], abandoning the wait when `cancel`
    /// fires. The server keeps the ticket; it simply goes unread.
    ///
    /// # Errors
    ///
    /// - [`ClientError::SubmissionRejected`] if the server refused the request
    /// - [`ClientError::PollTimeout`] once `max_polls` or `max_wait` is exhausted
    /// - [`ClientError::Cancelled`] if `cancel` fired first
    /// - [`ClientError::Invocation`] if the operation recorded a failure
    /// - [`ClientError::Transport`] / [`ClientError::Protocol`] on HTTP trouble
    pub async fn invoke_with_cancel(
        &self,
        request: &InvocationRequest,
        cancel: &CancellationToken,
    ) -> Result<Value, ClientError> {
        let submission = until_cancelled(cancel, self.submit(request)).await?;
        let result_url = self.await_ready(&submission, cancel).await?;

        match until_cancelled(cancel, self.fetch(&result_url)).await? {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(failure) => {
                debug!(ticket_id = submission.ticket_id.0, kind = %failure.kind, "invocation failed");
                Err(ClientError::Invocation(failure))
            }
        }
    }

    /// Polls until the ticket is ready and returns its result address.
    async fn await_ready(
        &self,
        submission: &Submission,
        cancel: &CancellationToken,
    ) -> Result<Url, ClientError> {
        let started = Instant::now();
        let max_polls = self.config.max_polls.max(1);
        let mut polls = 0u32;

        loop {
            polls += 1;
            if let PollState::Ready(result_url) =
                until_cancelled(cancel, self.poll(&submission.poll_url)).await?
            {
                debug!(ticket_id = submission.ticket_id.0, polls, "ticket ready");
                return Ok(result_url);
            }

            let delay = self.config.poll_policy.delay(polls);
            let out_of_time = self
                .config
                .max_wait
                .is_some_and(|max_wait| started.elapsed() + delay > max_wait);
            if polls >= max_polls || out_of_time {
                warn!(ticket_id = submission.ticket_id.0, polls, "gave up waiting for ticket");
                return Err(ClientError::PollTimeout {
                    ticket: submission.ticket_id.to_string(),
                    polls,
                });
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ClientError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ClientError::Cancelled),
        result = fut => result,
    }
}

fn parse_url(raw: &str) -> Result<Url, ClientError> {
    Url::parse(raw).map_err(|e| ClientError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

fn join(base: &Url, reference: &str) -> Result<Url, ClientError> {
    base.join(reference).map_err(|e| ClientError::InvalidUrl {
        url: reference.to_string(),
        reason: e.to_string(),
    })
}

/// Resolves the response's `Location` header against `base`.
fn location(response: &Response, base: &Url) -> Result<Url, ClientError> {
    let header = response
        .headers()
        .get(LOCATION)
        .ok_or_else(|| ClientError::Protocol(format!("{} answered without Location", response.status())))?;
    let raw = header
        .to_str()
        .map_err(|_| ClientError::Protocol("Location header is not ASCII".to_string()))?;
    join(base, raw)
}

async fn read_body(response: Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string())
}

async fn unexpected(step: &str, url: &Url, status: StatusCode, response: Response) -> ClientError {
    let body = read_body(response).await;
    ClientError::Protocol(format!("{step} {url} answered {status}: {body}"))
}
