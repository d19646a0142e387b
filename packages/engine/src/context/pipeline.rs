//! The request pipeline
//!
//! One attempt runs entry → body write → flush → content read → validation,
//! with every fault caught where it occurs and funneled into the single
//! completion path. Resubmission (hook-requested or redirect-follow) resets
//! the per-attempt state and loops.

use std::sync::Arc;

use http::{Method, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::config::CookieMode;
use crate::content::reader::{ContentReader, ReaderKind};
use crate::cookie;
use crate::engine::Shared;
use crate::error::{self, Result};
use crate::hooks::{Ending, EndCtx, HookAction, NegotiateCtx, SendCtx, ValidateCtx, WrapCtx};
use crate::http::decompress;
use crate::http::headers;
use crate::http::request::ResultKind;
use crate::http::response::{Redirection, Response};
use crate::io::{step, Gate};
use crate::progress::{Direction, Meter, Mirror, ProgressReader, ProgressWriter, SpeedMonitor};
use crate::redirect::{remove_sensitive_headers, ActionKind, Policy};
use crate::transport::{Outgoing, TransportError};

use super::{RequestContext, State};

type Body = Box<dyn AsyncRead + Send + Unpin>;

impl RequestContext {
    /// Drives attempts until the context completes without a pending
    /// resubmission.
    pub(crate) async fn run_to_completion(&mut self) {
        loop {
            if let Err(fault) = self.run_attempt().await {
                if self.fault.is_none() {
                    tracing::debug!(id = self.id, %fault, "attempt faulted");
                    self.fault = Some(fault);
                }
            }
            if self.complete_request() {
                continue;
            }
            break;
        }
    }

    async fn run_attempt(&mut self) -> Result<()> {
        if self.fault.is_some() {
            // a pre-recorded fault short-circuits straight to completion
            return Ok(());
        }
        if self.request.cancel.is_cancelled() {
            return Err(error::cancelled());
        }
        if !self.state.try_advance(State::NotSent, State::Init) {
            return Err(error::usage("this context was sent twice"));
        }
        tracing::debug!(id = self.id, url = %self.request.url(), "send entry");

        let shared = Arc::clone(&self.shared);

        match shared.hooks.run_before_send(&mut SendCtx {
            request: &mut self.request,
        }) {
            HookAction::Continue => {}
            HookAction::Cancel => {
                self.request.cancel.cancel();
                return Err(error::cancelled());
            }
            HookAction::Fault(e) => return Err(e),
            HookAction::Resubmit => self.resubmit = true,
        }

        self.normalize_and_open(&shared).await?;
        shared.hooks.run_request_created(&SendCtx {
            request: &mut self.request,
        });

        if !self.state.try_advance(State::Init, State::SendingHeaders) {
            return Err(error::cancelled());
        }

        if self.request.allows_body() && self.writer.is_some() {
            self.write_request_body(&shared).await?;
        }

        let body = self.flush_and_get_response(&shared).await?;

        if self.resubmit
            && self
                .response
                .as_ref()
                .is_some_and(|response| response.status().is_redirection())
        {
            // an auto-followed redirect drops the 3xx body unread
            drop(body);
            return Ok(());
        }

        self.read_response_content(&shared, body).await?;
        self.validate_and_finish(&shared)
    }

    /// Resolves the payload into a content writer, attaches stored cookies
    /// and the resume range, and opens the transport-level request.
    async fn normalize_and_open(&mut self, shared: &Shared) -> Result<()> {
        if let ResultKind::File { path, resume: true } = self.request.result_kind() {
            let path = path.clone();
            if self.resume_offset == 0 {
                if let Ok(meta) = tokio::fs::metadata(&path).await {
                    self.resume_offset = meta.len();
                }
            }
            if self.resume_offset > 0 {
                let value = format!("bytes={}-", self.resume_offset);
                if let Ok(value) = http::HeaderValue::from_str(&value) {
                    self.request.headers_mut().insert(http::header::RANGE, value);
                }
            }
        }

        if self.writer.is_none() {
            let payload = std::mem::take(&mut self.request.payload);
            let mut override_writer = None;
            match shared.hooks.run_before_wrap(&mut WrapCtx {
                request: &self.request,
                writer: &mut override_writer,
            }) {
                HookAction::Continue => {}
                HookAction::Cancel => {
                    self.request.cancel.cancel();
                    return Err(error::cancelled());
                }
                HookAction::Fault(e) => return Err(e),
                HookAction::Resubmit => self.resubmit = true,
            }
            self.writer = match override_writer {
                Some(writer) => Some(writer),
                None => shared
                    .negotiator
                    .wrap(payload, shared.config.default_content_type)?,
            };
        }

        if let Some(writer) = &self.writer {
            if !self
                .request
                .headers()
                .contains_key(http::header::CONTENT_TYPE)
            {
                if let Some(value) = writer
                    .content_type()
                    .and_then(|ct| http::HeaderValue::from_str(ct).ok())
                {
                    self.request
                        .headers_mut()
                        .insert(http::header::CONTENT_TYPE, value);
                }
            }
        }

        let cookie_mode = self.request.cookie_mode.unwrap_or(shared.config.cookie_mode);
        if cookie_mode != CookieMode::Ignore {
            let url = self.request.url().clone();
            cookie::add_cookie_header(self.request.headers_mut(), shared.cookies.as_ref(), &url);
        }

        let body_length = if self.request.allows_body() {
            self.writer.as_ref().map(crate::content::writer::ContentWriter::length)
        } else {
            None
        };
        let outgoing = Outgoing {
            method: self.request.method().clone(),
            url: self.request.url().clone(),
            headers: self.request.headers().clone(),
            body_length,
            proxy: self.request.proxy.clone(),
        };
        let handle = shared.transport.open(outgoing).map_err(error::transport)?;
        shared.registry.bind(handle, self.id);
        self.connection = shared.transport.connection_info(handle);
        self.handle = Some(handle);
        Ok(())
    }

    /// Streams the request body through a progress-counting writer.
    async fn write_request_body(&mut self, shared: &Shared) -> Result<()> {
        let cancel = self.request.cancel.clone();
        if cancel.is_cancelled() {
            return Err(error::cancelled());
        }
        let handle = self
            .handle
            .ok_or_else(|| error::usage("no transport handle bound"))?;
        let rw = shared.config.read_write_timeout;

        let stream = step(shared.transport.write_stream(handle), rw, &cancel).await?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| error::usage("no content writer bound"))?;

        let monitor = Arc::new(SpeedMonitor::new(shared.config.speed_sample_interval));
        let mut meter =
            Meter::new(Direction::Upload, writer.length()).with_monitor(Arc::clone(&monitor));
        if let Some(progress) = &self.progress {
            meter = meter.with_callback(Arc::clone(progress));
        }
        self.performance.bind_upload(meter.counter(), monitor);
        let mut sink = ProgressWriter::new(stream, meter);

        if !self
            .state
            .try_advance(State::SendingHeaders, State::WritingRequestBody)
        {
            return Err(error::cancelled());
        }

        let gate = Gate::new();
        writer
            .write_to(&mut sink, shared.config.chunk_size, rw, &cancel, &gate)
            .await?;
        step(sink.shutdown(), rw, &cancel).await?;
        Ok(())
    }

    /// Obtains the response under the watchdog, persists cookies, and
    /// records redirect state. Returns the raw body stream.
    async fn flush_and_get_response(&mut self, shared: &Shared) -> Result<Body> {
        let from = self.state.load();
        if !self.state.try_advance(from, State::WaitingResponseHeaders) {
            return Err(error::cancelled());
        }
        let cancel = self.request.cancel.clone();
        if cancel.is_cancelled() {
            return Err(error::cancelled());
        }
        let handle = self
            .handle
            .ok_or_else(|| error::usage("no transport handle bound"))?;
        let wait = self.request.timeout().unwrap_or(shared.config.request_timeout);
        let url = self.request.url().clone();

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(error::cancelled()),
            resolved = tokio::time::timeout(wait, shared.transport.response(handle)) => {
                match resolved {
                    Ok(Ok(reply)) => Ok(reply),
                    // a protocol-level error status still carries a usable response
                    Ok(Err(TransportError::Status(reply))) => Ok(*reply),
                    Ok(Err(e)) => Err(error::transport(e)),
                    Err(_elapsed) => Err(error::timeout(url.clone())),
                }
            }
        };
        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                shared.transport.abort(handle);
                return Err(e);
            }
        };
        self.performance.mark_response();

        let final_url = reply.final_url.clone().unwrap_or_else(|| url.clone());
        let mut response = Response::new(reply.status, reply.headers, final_url);

        let cookie_mode = self.request.cookie_mode.unwrap_or(shared.config.cookie_mode);
        if cookie_mode == CookieMode::Auto {
            let set_cookie: Vec<_> = response
                .headers()
                .get_all(http::header::SET_COOKIE)
                .iter()
                .collect();
            if !set_cookie.is_empty() {
                let joined = cookie::rejoin_set_cookie_lines(set_cookie);
                let values: Vec<http::HeaderValue> = joined
                    .iter()
                    .filter_map(|line| http::HeaderValue::from_str(line).ok())
                    .collect();
                shared.cookies.set_cookies(&mut values.iter(), &url);
            }
        }

        let status = response.status();
        let mut redirection = None;
        if status.is_redirection() {
            match response
                .headers()
                .get(http::header::LOCATION)
                .and_then(|value| value.to_str().ok())
            {
                Some(location) => {
                    let target = url
                        .join(location)
                        .map_err(|e| error::protocol(e, url.clone()))?;
                    redirection = Some(Redirection {
                        status,
                        location: target,
                    });
                }
                None => {
                    return Err(error::protocol(
                        "redirect status without a Location header",
                        url.clone(),
                    ));
                }
            }
        } else if *response.url() != url {
            redirection = Some(Redirection {
                status,
                location: response.url().clone(),
            });
        }
        response.redirection = redirection.clone();
        self.response = Some(response);

        if let Some(redirection) = redirection {
            let follow = self
                .request
                .follow_redirects
                .unwrap_or(shared.config.auto_redirect);
            if follow && status.is_redirection() {
                self.follow_redirect(shared, redirection)?;
            }
        }
        Ok(reply.body)
    }

    fn follow_redirect(&mut self, shared: &Shared, redirection: Redirection) -> Result<()> {
        let policy = Policy::limited(shared.config.max_redirects as usize);
        let current = self.request.url().clone();
        match policy.check(redirection.status, &redirection.location, &self.redirect_chain) {
            ActionKind::Follow => {
                self.redirect_chain.push(current);
                remove_sensitive_headers(
                    self.request.headers_mut(),
                    &redirection.location,
                    &self.redirect_chain,
                );
                let demote = redirection.status == StatusCode::SEE_OTHER
                    || ((redirection.status == StatusCode::MOVED_PERMANENTLY
                        || redirection.status == StatusCode::FOUND)
                        && *self.request.method() == Method::POST);
                if demote {
                    self.request.set_method(Method::GET);
                    self.writer = None;
                }
                self.request.set_url(redirection.location);
                self.resubmit = true;
                tracing::debug!(id = self.id, url = %self.request.url(), "following redirect");
            }
            ActionKind::Stop => {}
            ActionKind::Error(e) => {
                return Err(error::protocol(e, self.request.url().clone()));
            }
        }
        Ok(())
    }

    /// Negotiates the reader and consumes the body through the chunked
    /// protocol, decoding gzip/deflate when enabled.
    async fn read_response_content(&mut self, shared: &Shared, body: Body) -> Result<()> {
        let cancel = self.request.cancel.clone();
        if cancel.is_cancelled() {
            return Err(error::cancelled());
        }

        let (status, total, encoding, range) = {
            let response = self
                .response
                .as_ref()
                .ok_or_else(|| error::usage("no response bound"))?;
            let total = response
                .content_length()
                .and_then(|len| i64::try_from(len).ok())
                .unwrap_or(-1);
            let decompress_enabled = self
                .request
                .decompress
                .unwrap_or(shared.config.auto_decompress);
            let encoding = if decompress_enabled {
                headers::response_encoding(response.headers())
            } else {
                None
            };
            (
                response.status(),
                total,
                encoding,
                response.content_range(),
            )
        };

        let mut override_kind = None;
        {
            let response = self
                .response
                .as_ref()
                .ok_or_else(|| error::usage("no response bound"))?;
            match shared.hooks.run_before_negotiate(&mut NegotiateCtx {
                request: &self.request,
                response,
                reader: &mut override_kind,
            }) {
                HookAction::Continue => {}
                HookAction::Cancel => {
                    self.request.cancel.cancel();
                    return Err(error::cancelled());
                }
                HookAction::Fault(e) => return Err(e),
                HookAction::Resubmit => self.resubmit = true,
            }
        }
        let kind = match override_kind {
            Some(kind) => kind,
            None => {
                let response = self
                    .response
                    .as_ref()
                    .ok_or_else(|| error::usage("no response bound"))?;
                shared.negotiator.pick(
                    self.request.result_kind(),
                    status,
                    response.headers(),
                    self.request.json_error_bodies,
                    self.resume_offset,
                )
            }
        };

        let mut reader = ContentReader::new(kind);
        reader.begin(status, range.as_ref()).await?;

        let monitor = Arc::new(SpeedMonitor::new(shared.config.speed_sample_interval));
        let mut meter = Meter::new(Direction::Download, total).with_monitor(Arc::clone(&monitor));
        if let Some(progress) = &self.progress {
            meter = meter.with_callback(Arc::clone(progress));
        }
        if self.inspect && total >= 0 && usize::try_from(total).unwrap_or(usize::MAX) <= shared.config.mirror_buffer_cap {
            let mirror = Mirror::new(shared.config.mirror_buffer_cap);
            self.mirror = Some(mirror.clone());
            meter = meter.with_mirror(mirror);
        }
        self.performance.bind_download(meter.counter(), monitor);
        let mut source = ProgressReader::new(body, meter);

        if !self
            .state
            .try_advance(State::WaitingResponseHeaders, State::ReadingResponse)
        {
            return Err(error::cancelled());
        }

        let rw = shared.config.read_write_timeout;
        let chunk = shared.config.chunk_size.max(1);
        let outcome: Result<()> = if matches!(reader.kind(), ReaderKind::Stream) {
            reader.set_stream(Box::new(source));
            Ok(())
        } else if status == StatusCode::RANGE_NOT_SATISFIABLE && self.resume_offset > 0 {
            // resume already complete; the error body is dropped unread
            Ok(())
        } else {
            let gate = Gate::new();
            let drive = async {
                let mut buf = vec![0u8; chunk];
                match encoding {
                    Some(encoding) => {
                        let mut wire = Vec::new();
                        loop {
                            let n = step(source.read(&mut buf), rw, &cancel).await?;
                            if n == 0 {
                                break;
                            }
                            wire.extend_from_slice(&buf[..n]);
                        }
                        let decoded =
                            decompress::decode(&wire, encoding).map_err(error::content)?;
                        for piece in decoded.chunks(chunk) {
                            reader.push(piece).await?;
                        }
                    }
                    None => loop {
                        let n = step(source.read(&mut buf), rw, &cancel).await?;
                        if n == 0 {
                            break;
                        }
                        reader.push(&buf[..n]).await?;
                    },
                }
                Ok(())
            };
            let result = drive.await;
            if gate.fire() {
                result
            } else {
                Err(error::cancelled())
            }
        };

        let finished = match outcome {
            Ok(()) => reader.finish().await,
            Err(e) => Err(e),
        };
        if let Some(response) = self.response.as_mut() {
            response.reader = Some(reader);
        }
        finished
    }

    /// Runs the validation hooks and walks the tail states.
    fn validate_and_finish(&mut self, shared: &Shared) -> Result<()> {
        if !self
            .state
            .try_advance(State::ReadingResponse, State::ValidatingResponse)
        {
            return Err(error::cancelled());
        }
        let response = self
            .response
            .as_ref()
            .ok_or_else(|| error::usage("no response bound"))?;
        match shared.hooks.run_validate_response(&ValidateCtx {
            request: &self.request,
            response,
        }) {
            HookAction::Continue => {}
            HookAction::Cancel => {
                self.request.cancel.cancel();
                return Err(error::cancelled());
            }
            HookAction::Fault(e) => return Err(e),
            HookAction::Resubmit => self.resubmit = true,
        }
        if !self
            .state
            .try_advance(State::ValidatingResponse, State::EndProcessingResponse)
        {
            return Err(error::cancelled());
        }
        Ok(())
    }

    /// The single completion path. Returns true when the context was reset
    /// for resubmission and another attempt must run.
    fn complete_request(&mut self) -> bool {
        if self.finished {
            return false;
        }
        let shared = Arc::clone(&self.shared);
        let cancelled = self.is_cancelled();
        if cancelled {
            if self.fault.is_none() {
                self.fault = Some(error::cancelled());
            }
            if let Some(handle) = self.handle {
                shared.transport.abort(handle);
            }
        }

        if self.resubmit && !cancelled && self.fault.is_none() {
            self.resubmit = false;
            self.resubmit_count += 1;
            self.response = None;
            if let Some(handle) = self.handle.take() {
                shared.registry.release(handle);
            }
            self.state.reset_for_resubmit();
            tracing::debug!(id = self.id, count = self.resubmit_count, "resubmitting");
            return true;
        }

        self.state.force_complete();
        self.performance.mark_complete();
        if let Some(handle) = self.handle {
            shared.registry.release(handle);
        }
        self.finished = true;

        let ending = if cancelled {
            Ending::Cancelled
        } else if self.is_success() {
            Ending::Finished
        } else {
            Ending::Failed
        };
        shared.hooks.run_terminal(&EndCtx {
            request: &self.request,
            response: self.response.as_ref(),
            ending,
            fault: self.fault.as_ref(),
        });
        tracing::debug!(id = self.id, ending = ?ending, "request end");
        false
    }
}
