//! Request plumbing shared by the three connections of a client.
//!
//! - [`Endpoint`]: hub address, request builder, connect-verification hook
//! - [`ControlChannel`]: one-shot request/response exchanges
//! - [`PollChannel`]: a long-poll connection with at most one request in flight

use crate::client::config::ClientConfig;
use crate::client::parser::{read_response, HttpResponse};
use crate::client::subscription::Requester;
use crate::client::utils::is_error_status;
use crate::error::{ConstellationError, Result};
use crate::protocol::RequestBuilder;
use crate::transport::Transport;
use std::time::Duration;

/// Post-connect verification hook; `false` rejects the connection.
pub type ConnectHook<T> = Box<dyn FnMut(&mut T) -> bool>;

pub(crate) struct Endpoint<T> {
    host: String,
    port: u16,
    timeout: Duration,
    builder: RequestBuilder,
    on_connected: Option<ConnectHook<T>>,
}

impl<T: Transport> Endpoint<T> {
    pub(crate) fn new(config: &ClientConfig) -> Self {
        let builder = RequestBuilder::new(
            config.host.clone(),
            config.base_path(),
            config.sentinel_name.clone(),
            config.package_name.clone(),
            config.access_key.clone(),
        )
        .with_user_agent(config.user_agent.clone())
        .with_authorization(config.authorization.clone());

        Endpoint {
            host: config.host.clone(),
            port: config.port,
            timeout: config.request_timeout(),
            builder,
            on_connected: None,
        }
    }

    pub(crate) fn set_connect_hook(&mut self, hook: ConnectHook<T>) {
        self.on_connected = Some(hook);
    }

    /// Connect `transport` if needed, then run the verification hook.
    fn open(&mut self, transport: &mut T, method: &str) -> Result<()> {
        if !transport.connected() {
            if let Err(e) = transport.connect(&self.host, self.port) {
                tracing::error!(
                    "Unable to establish the TCP connection to {}:{} (request on {}): {}",
                    self.host,
                    self.port,
                    method,
                    e
                );
                return Err(ConstellationError::NotConnected {
                    host: self.host.clone(),
                    port: self.port,
                });
            }
        }
        if let Some(hook) = self.on_connected.as_mut() {
            if !hook(transport) {
                tracing::error!("Unable to verify the network client connection");
                return Err(ConstellationError::ConnectionRejected);
            }
        }
        Ok(())
    }

    /// Write a GET request without waiting for the response.
    pub(crate) fn write_get(
        &mut self,
        transport: &mut T,
        method: &str,
        args: &[(&str, &str)],
        keep_alive: bool,
    ) -> Result<()> {
        self.open(transport, method)?;
        tracing::debug!("GET: {}", self.builder.uri(method, args));
        let request = self.builder.get(method, args, keep_alive);
        transport.write_all(request.as_bytes()).inspect_err(|e| {
            tracing::error!("Unable to send the request: {}", e);
        })?;
        Ok(())
    }

    /// GET `method` and read the full response.
    pub(crate) fn get(
        &mut self,
        transport: &mut T,
        method: &str,
        args: &[(&str, &str)],
    ) -> Result<HttpResponse> {
        discard_stale(transport);
        self.write_get(transport, method, args, true)?;
        self.read_reply(transport)
    }

    /// POST a JSON `body` to `method` and read the full response.
    pub(crate) fn post(
        &mut self,
        transport: &mut T,
        method: &str,
        body: &str,
    ) -> Result<HttpResponse> {
        discard_stale(transport);
        self.open(transport, method)?;
        tracing::debug!("POST: {}", self.builder.uri(method, &[]));
        tracing::trace!("{}", body);
        let request = self.builder.post(method, body);
        transport.write_all(request.as_bytes()).inspect_err(|e| {
            tracing::error!("Unable to send the request: {}", e);
        })?;
        self.read_reply(transport)
    }

    fn read_reply(&self, transport: &mut T) -> Result<HttpResponse> {
        let response = read_response(transport, self.timeout)?;
        if is_error_status(response.status) {
            tracing::error!("Incorrect response: {}", response.status);
            tracing::debug!("{}", response.text());
        } else {
            tracing::debug!("Return code: {}", response.status);
        }
        tracing::trace!("Raw message: {}", response.text());
        Ok(response)
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        self.timeout
    }
}

/// Drop bytes left over from an earlier exchange so the next read starts on a
/// fresh status line.
fn discard_stale<T: Transport>(transport: &mut T) {
    let mut scratch = [0u8; 256];
    loop {
        let available = transport.available();
        if available == 0 {
            break;
        }
        let want = available.min(scratch.len());
        match transport.read(&mut scratch[..want]) {
            Ok(0) | Err(_) => break,
            Ok(n) => tracing::trace!("Discarding {} stale bytes", n),
        }
    }
}

/// The connection used for one-shot requests.
pub(crate) struct ControlChannel<T> {
    pub(crate) endpoint: Endpoint<T>,
    pub(crate) transport: T,
}

impl<T: Transport> ControlChannel<T> {
    pub(crate) fn post(&mut self, method: &str, body: &str) -> Result<HttpResponse> {
        self.endpoint.post(&mut self.transport, method, body)
    }
}

impl<T: Transport> Requester for ControlChannel<T> {
    fn get(&mut self, method: &str, args: &[(&str, &str)]) -> Result<HttpResponse> {
        self.endpoint.get(&mut self.transport, method, args)
    }
}

/// What a long-poll channel has to offer on this tick.
pub(crate) enum PollState {
    /// A request is outstanding and nothing arrived yet.
    Waiting,
    /// No request is outstanding.
    Idle,
    /// The outstanding request was answered.
    Ready(Result<HttpResponse>),
}

/// A long-poll connection.
pub(crate) struct PollChannel<T> {
    pub(crate) transport: T,
    pub(crate) in_flight: bool,
}

impl<T: Transport> PollChannel<T> {
    pub(crate) fn new(transport: T) -> Self {
        PollChannel {
            transport,
            in_flight: false,
        }
    }

    /// Never blocks unless response bytes are already available.
    pub(crate) fn check(&mut self, timeout: Duration) -> PollState {
        if !self.in_flight {
            return PollState::Idle;
        }
        if self.transport.available() > 0 {
            self.in_flight = false;
            return PollState::Ready(read_response(&mut self.transport, timeout));
        }
        if self.transport.connected() {
            return PollState::Waiting;
        }
        tracing::debug!("Long-poll connection dropped, issuing a new request");
        self.in_flight = false;
        PollState::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    #[test]
    fn test_stale_bytes_are_discarded_before_a_request() {
        let transport = MockTransport::connected();
        transport.push_inbound(&[b'x'; 600]);
        transport.reply(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n");

        let mut control = ControlChannel {
            endpoint: Endpoint::new(&ClientConfig::default()),
            transport: transport.clone(),
        };
        let response = control.get("WriteLog", &[("message", "hi")]).unwrap();

        assert_eq!(response.status, 204);
        assert_eq!(transport.written().len(), 1);
        assert!(transport.state.borrow().inbound.is_empty());
    }

    #[test]
    fn test_idle_poll_channel_reports_idle() {
        let mut channel = PollChannel::new(MockTransport::connected());
        assert!(matches!(channel.check(Duration::from_millis(10)), PollState::Idle));

        channel.in_flight = true;
        assert!(matches!(channel.check(Duration::from_millis(10)), PollState::Waiting));
    }
}
