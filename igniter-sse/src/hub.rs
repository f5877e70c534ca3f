use crate::event::{SseEvent, comment_frame, response_headers};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use igniter_core::FrameworkError;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Channel reserved for cache revalidation events.
pub const REVALIDATION_CHANNEL: &str = "revalidation";

/// Channel reserved for in-process diagnostics (interactive mode).
pub const SYSTEM_CHANNEL: &str = "system";

/// Per-connection outgoing buffer. A full buffer skips the delivery; a
/// closed one marks the connection dead.
const CONNECTION_BUFFER: usize = 64;

/// A registered fan-out topic.
#[derive(Debug, Clone)]
pub struct SseChannel {
    pub id: String,
    pub description: Option<String>,
}

struct Connection {
    channels: HashSet<String>,
    scopes: Option<Vec<String>>,
    sender: mpsc::Sender<Bytes>,
    connected_at: DateTime<Utc>,
}

/// What the transport adapter needs to serve one SSE client: the response
/// headers and the stream of pre-framed bytes.
#[derive(Debug)]
pub struct SseConnectionHandle {
    pub id: String,
    pub channels: Vec<String>,
    pub headers: Vec<(String, String)>,
    pub frames: mpsc::Receiver<Bytes>,
}

/// Snapshot of hub state, for diagnostics.
#[derive(Debug, Clone)]
pub struct SseHubStats {
    pub channels: usize,
    pub connections: usize,
    pub subscribers_per_channel: HashMap<String, usize>,
}

/// Process-global SSE hub: channel registry, per-connection dispatch,
/// keep-alive, and scope filtering.
pub struct SseHub {
    channels: DashMap<String, SseChannel>,
    connections: DashMap<String, Connection>,
    /// channel id → subscriber connection ids
    members: DashMap<String, HashSet<String>>,
    keep_alive: Duration,
}

impl SseHub {
    pub fn new(keep_alive: Duration) -> Arc<Self> {
        let hub = Arc::new(Self {
            channels: DashMap::new(),
            connections: DashMap::new(),
            members: DashMap::new(),
            keep_alive,
        });
        // Reserved channels exist from the start so revalidation and
        // interactive metrics never race registration.
        hub.register_channel(REVALIDATION_CHANNEL, Some("Client cache revalidation"));
        hub.register_channel(SYSTEM_CHANNEL, Some("Process diagnostics"));
        hub
    }

    /// Register a channel. Idempotent: re-registration is ignored.
    pub fn register_channel(&self, id: &str, description: Option<&str>) {
        if self.channels.contains_key(id) {
            return;
        }
        self.channels.insert(
            id.to_string(),
            SseChannel {
                id: id.to_string(),
                description: description.map(str::to_owned),
            },
        );
        self.members.entry(id.to_string()).or_default();
        debug!(channel = %id, "SSE channel registered");
    }

    pub fn channel_exists(&self, id: &str) -> bool {
        self.channels.contains_key(id)
    }

    pub fn channel_ids(&self) -> Vec<String> {
        self.channels.iter().map(|e| e.key().clone()).collect()
    }

    /// Unregister a channel: each subscriber gets a terminal
    /// `channel.close` event, then loses the subscription. Connections
    /// left without any channel are dropped.
    pub fn unregister_channel(&self, id: &str) {
        if self.channels.remove(id).is_none() {
            return;
        }
        let member_ids = self
            .members
            .remove(id)
            .map(|(_, set)| set)
            .unwrap_or_default();

        let close_frame = SseEvent::new(id, json!({ "channel": id }))
            .with_id(Uuid::new_v4().to_string())
            .with_type("channel.close")
            .to_frame();

        for connection_id in member_ids {
            let drop_connection = match self.connections.get_mut(&connection_id) {
                Some(mut connection) => {
                    let _ = connection.sender.try_send(close_frame.clone());
                    connection.channels.remove(id);
                    connection.channels.is_empty()
                }
                None => false,
            };
            if drop_connection {
                self.connections.remove(&connection_id);
            }
        }
        debug!(channel = %id, "SSE channel unregistered");
    }

    /// Accept a client connection from parsed query parameters
    /// (`channels=a,b&scopes=s1,s2`).
    ///
    /// Unknown channels are rejected with `INVALID_SSE_CHANNEL`; no
    /// requested channels means all registered channels. The connection
    /// receives an initial `connected` event and periodic keep-alive
    /// comments.
    pub fn handle_connection(
        &self,
        query: &HashMap<String, String>,
    ) -> Result<SseConnectionHandle, FrameworkError> {
        let requested: Vec<String> = query
            .get("channels")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let channels = if requested.is_empty() {
            self.channel_ids()
        } else {
            for channel in &requested {
                if !self.channel_exists(channel) {
                    return Err(FrameworkError::invalid_sse_channel(
                        channel,
                        self.channel_ids(),
                    ));
                }
            }
            requested
        };

        let scopes: Option<Vec<String>> = query.get("scopes").map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        });

        let connection_id = Uuid::new_v4().to_string();
        let (sender, frames) = mpsc::channel(CONNECTION_BUFFER);

        let connected = SseEvent::new(
            SYSTEM_CHANNEL,
            json!({
                "connectionId": connection_id,
                "channels": channels,
                "timestamp": Utc::now().to_rfc3339(),
            }),
        )
        .with_id(Uuid::new_v4().to_string())
        .with_type("connected");
        let _ = sender.try_send(connected.to_frame());

        for channel in &channels {
            self.members
                .entry(channel.clone())
                .or_default()
                .insert(connection_id.clone());
        }
        self.connections.insert(
            connection_id.clone(),
            Connection {
                channels: channels.iter().cloned().collect(),
                scopes,
                sender: sender.clone(),
                connected_at: Utc::now(),
            },
        );

        self.spawn_keep_alive(sender);

        debug!(connection_id = %connection_id, channels = ?channels, "SSE connection opened");
        Ok(SseConnectionHandle {
            id: connection_id,
            channels,
            headers: response_headers(),
            frames,
        })
    }

    /// The keep-alive task only holds the sender; once the client side is
    /// gone it exits, and the registry entry is reaped lazily by the next
    /// publish or an explicit sweep.
    fn spawn_keep_alive(&self, sender: mpsc::Sender<Bytes>) {
        let period = self.keep_alive;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                if sender.is_closed() || sender.try_send(comment_frame("keep-alive")).is_err() {
                    break;
                }
            }
        });
    }

    /// Publish an event to its channel's subscribers.
    ///
    /// An id is assigned when absent. When the event carries scopes, only
    /// subscribers with at least one scope in common receive it. Returns
    /// the number of successful deliveries; dead connections found along
    /// the way are removed.
    pub fn publish_event(&self, mut event: SseEvent) -> usize {
        if event.id.is_none() {
            event.id = Some(Uuid::new_v4().to_string());
        }

        // Snapshot the subscriber set; fan-out never holds the lock.
        let member_ids: Vec<String> = self
            .members
            .get(&event.channel)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        if member_ids.is_empty() {
            return 0;
        }

        let frame = event.to_frame();
        let mut delivered = 0usize;
        let mut dead: Vec<String> = Vec::new();

        for connection_id in member_ids {
            let Some(connection) = self.connections.get(&connection_id) else {
                continue;
            };
            if !scopes_match(event.scopes.as_deref(), connection.scopes.as_deref()) {
                continue;
            }
            match connection.sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Closed(_)) => dead.push(connection_id.clone()),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(connection_id = %connection_id, channel = %event.channel, "SSE buffer full, dropping event");
                }
            }
        }

        for connection_id in dead {
            self.remove_connection(&connection_id);
        }
        delivered
    }

    /// Drop connections whose client side has gone away.
    pub fn sweep(&self) {
        let dead: Vec<String> = self
            .connections
            .iter()
            .filter(|e| e.value().sender.is_closed())
            .map(|e| e.key().clone())
            .collect();
        for connection_id in dead {
            self.remove_connection(&connection_id);
        }
    }

    fn remove_connection(&self, connection_id: &str) {
        if let Some((_, connection)) = self.connections.remove(connection_id) {
            for channel in connection.channels {
                if let Some(mut members) = self.members.get_mut(&channel) {
                    members.remove(connection_id);
                }
            }
            debug!(connection_id = %connection_id, "SSE connection removed");
        }
    }

    /// Seconds a connection has been open, if it still exists.
    pub fn connection_age(&self, connection_id: &str) -> Option<i64> {
        self.connections
            .get(connection_id)
            .map(|c| (Utc::now() - c.connected_at).num_seconds())
    }

    pub fn stats(&self) -> SseHubStats {
        SseHubStats {
            channels: self.channels.len(),
            connections: self.connections.len(),
            subscribers_per_channel: self
                .members
                .iter()
                .map(|e| (e.key().clone(), e.value().len()))
                .collect(),
        }
    }

    /// Unregister every channel, closing all subscribers.
    pub fn shutdown(&self) {
        for id in self.channel_ids() {
            self.unregister_channel(&id);
        }
    }
}

/// Delivery rule: no event scopes → everyone; otherwise the subscriber
/// needs at least one scope in common.
fn scopes_match(event_scopes: Option<&[String]>, subscriber_scopes: Option<&[String]>) -> bool {
    match event_scopes {
        None => true,
        Some(scopes) if scopes.is_empty() => true,
        Some(scopes) => subscriber_scopes
            .is_some_and(|subscriber| subscriber.iter().any(|s| scopes.contains(s))),
    }
}
