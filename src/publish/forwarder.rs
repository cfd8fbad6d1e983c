use log::{error, info, warn};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use super::client::{HttpClient, PublishRequest};
use super::resolver::AddrResolver;
use super::template::{escape_query, parse_duration, parse_params, render_params};
use crate::config::{PubRoute, RoutingTable};
use crate::constants::MAX_PUB_RETRY;
use crate::core::message::{Command, Message};
use crate::error::{Result, RustyRelayError};
use crate::events::{BusinessEvent, SharedEventSink};

/// What happened to a PUB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// No route or no backend address; the message is untouched and no reply is due
    Skipped,
    /// The body now holds the backend response
    Delivered { attempts: u32 },
    /// Every attempt failed; the message was turned into an ERROR reply
    Failed { attempts: u32 },
}

impl PublishOutcome {
    pub fn should_reply(&self) -> bool {
        !matches!(self, PublishOutcome::Skipped)
    }
}

/// Response body carried by a failed attempt, empty when none arrived
fn response_body(err: &RustyRelayError) -> Cow<'_, str> {
    match err {
        RustyRelayError::Backend { body, .. } => String::from_utf8_lossy(body),
        _ => Cow::Borrowed(""),
    }
}

/// Relays PUB messages to the backend configured for their sub-command
pub struct PublishForwarder {
    routes: RoutingTable,
    resolver: Arc<dyn AddrResolver>,
    client: Arc<dyn HttpClient>,
    events: SharedEventSink,
    default_timeout: Duration,
}

impl PublishForwarder {
    pub fn new(
        routes: RoutingTable,
        resolver: Arc<dyn AddrResolver>,
        client: Arc<dyn HttpClient>,
        events: SharedEventSink,
        default_timeout: Duration,
    ) -> Self {
        Self {
            routes,
            resolver,
            client,
            events,
            default_timeout,
        }
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    /// Build the per-attempt request for `msg` on `route`
    async fn build_request(&self, route: &PubRoute, msg: &Message) -> Result<PublishRequest> {
        let addr = self.resolver.resolve(&route.addr_type, &route.addr).await?;

        let cmd = msg.cmd.code().to_string();
        let subcmd = msg.subcmd.to_string();
        let body = escape_query(&msg.body);
        let rendered = render_params(
            &route.params,
            &[cmd.as_str(), subcmd.as_str(), msg.uid.as_str(), msg.rid.as_str(), body.as_str()],
        );

        let timeout = match parse_duration(&route.timeout) {
            Some(timeout) => timeout,
            None => {
                warn!(
                    "Invalid timeout {:?} for subcmd {}, using {:?}",
                    route.timeout, subcmd, self.default_timeout
                );
                self.default_timeout
            }
        };

        Ok(PublishRequest {
            uri: format!("http://{}/{}", addr, route.path.trim_start_matches('/')),
            host: route.host.clone(),
            params: parse_params(&rendered),
            timeout,
        })
    }

    /// Deliver a PUB and rewrite it into the reply for its sender
    ///
    /// Attempts are sequential and capped at one plus three retries.
    pub async fn forward(&self, msg: &mut Message) -> PublishOutcome {
        let subcmd = msg.subcmd.to_string();
        let Some(route) = self.routes.get(&subcmd) else {
            error!("{}", RustyRelayError::RouteNotFound(subcmd));
            return PublishOutcome::Skipped;
        };

        let request = match self.build_request(route, msg).await {
            Ok(request) => request,
            Err(e) => {
                error!("Cannot reach backend for subcmd {}: {}", subcmd, e);
                return PublishOutcome::Skipped;
            }
        };

        let max_attempts = 1 + route.retry.min(MAX_PUB_RETRY);
        let mut outcome = PublishOutcome::Failed {
            attempts: max_attempts,
        };
        for attempt in 1..=max_attempts {
            match self.client.send(route.method, &request).await {
                Ok(body) => {
                    info!(
                        "Publish delivered to {} on attempt {}: {}",
                        request.uri,
                        attempt,
                        String::from_utf8_lossy(&body)
                    );
                    msg.body = body;
                    outcome = PublishOutcome::Delivered { attempts: attempt };
                    break;
                }
                Err(e) => {
                    error!(
                        "Publish to {} failed: {}, body: {:?}, params: {:?}, attempt: {}/{}",
                        request.uri,
                        e,
                        response_body(&e),
                        request.params,
                        attempt,
                        max_attempts
                    );
                }
            }
        }

        if let PublishOutcome::Failed { .. } = outcome {
            msg.cmd = Command::Error;
            msg.body.clear();
        }

        self.events.record(BusinessEvent::Publish {
            subcmd: msg.subcmd,
            delivered: matches!(outcome, PublishOutcome::Delivered { .. }),
        });
        outcome
    }
}
