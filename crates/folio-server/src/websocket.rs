//! Live-reload notifications over WebSocket.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Path of the notification socket.
pub const HMR_PATH: &str = "/__hmr";

/// Messages sent to connected pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HmrMessage {
    /// Connection established
    Connected,

    /// Routes were added or removed; clients refetch the route manifest
    RoutesChanged {
        added: Vec<String>,
        removed: Vec<String>,
    },

    /// Content changed without touching the routes
    Reload,
}

/// Hub broadcasting notifications to every connected client.
#[derive(Debug, Clone)]
pub struct HmrHub {
    sender: broadcast::Sender<HmrMessage>,
}

impl HmrHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: HmrMessage) {
        // No receivers is fine
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HmrMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for HmrHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Client-side script for the dev server.
///
/// Reloads the page on content changes. On route changes it refetches
/// `manifest_path` and dispatches a cancelable `folio:routes` event with the
/// new manifest. A client router cancels it to take over; otherwise the page
/// reloads.
pub fn hmr_client_script(manifest_path: &str) -> String {
    format!(
        r#"
(function() {{
  'use strict';

  const scheme = location.protocol === 'https:' ? 'wss:' : 'ws:';
  const ws = new WebSocket(scheme + '//' + location.host + '{HMR_PATH}');
  let reconnectAttempts = 0;
  const maxReconnectAttempts = 10;

  ws.onopen = function() {{
    reconnectAttempts = 0;
  }};

  ws.onmessage = function(event) {{
    const msg = JSON.parse(event.data);

    switch (msg.type) {{
      case 'reload':
        location.reload();
        break;

      case 'routes_changed':
        fetch('{manifest_path}')
          .then(function(res) {{ return res.json(); }})
          .then(function(manifest) {{
            const handled = !window.dispatchEvent(
              new CustomEvent('folio:routes', {{ detail: manifest, cancelable: true }})
            );
            if (!handled) location.reload();
          }})
          .catch(function() {{ location.reload(); }});
        break;

      case 'connected':
        console.log('[folio] Live reload connected');
        break;
    }}
  }};

  ws.onclose = function() {{
    if (reconnectAttempts < maxReconnectAttempts) {{
      reconnectAttempts++;
      setTimeout(function() {{ location.reload(); }}, 1000 * reconnectAttempts);
    }}
  }};
}})();
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_broadcasts_messages() {
        let hub = HmrHub::new();
        let mut rx = hub.subscribe();

        hub.send(HmrMessage::Reload);

        assert_eq!(rx.try_recv().unwrap(), HmrMessage::Reload);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn serializes_route_changes() {
        let msg = HmrMessage::RoutesChanged {
            added: vec!["/guide/new".to_string()],
            removed: vec![],
        };

        let json = serde_json::to_string(&msg).unwrap();

        assert_eq!(
            json,
            r#"{"type":"routes_changed","added":["/guide/new"],"removed":[]}"#
        );
    }

    #[test]
    fn script_targets_the_manifest() {
        let script = hmr_client_script("/__routes.json");

        assert!(script.contains("fetch('/__routes.json')"));
        assert!(script.contains("/__hmr"));
    }
}
