//! One session: the displays and phones sharing a code.

use std::collections::HashMap;
use std::sync::Arc;

use echo_protocol::PhoneMeta;

use crate::connection::{ClientConnection, ConnectionId, Frame};

/// A phone member and the metadata captured when it joined.
#[derive(Debug, Clone)]
pub struct PhoneEntry {
    /// The phone's socket handle.
    pub connection: Arc<ClientConnection>,
    /// Identity announced on join.
    pub meta: PhoneMeta,
}

/// Members of a session.
///
/// Phones are keyed by connection, not by device id, so two sockets briefly
/// claiming the same device (a reconnect race) are both representable until
/// [`evict_device`](Self::evict_device) resolves it.
#[derive(Debug, Default)]
pub struct Session {
    displays: HashMap<ConnectionId, Arc<ClientConnection>>,
    phones: HashMap<ConnectionId, PhoneEntry>,
}

impl Session {
    /// An empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a display.
    pub fn add_display(&mut self, connection: Arc<ClientConnection>) {
        let _ = self.displays.insert(connection.id.clone(), connection);
    }

    /// Detach a display. Returns whether it was a member.
    pub fn remove_display(&mut self, id: &ConnectionId) -> bool {
        self.displays.remove(id).is_some()
    }

    /// Attach a phone with its join metadata.
    pub fn insert_phone(&mut self, connection: Arc<ClientConnection>, meta: PhoneMeta) {
        let _ = self
            .phones
            .insert(connection.id.clone(), PhoneEntry { connection, meta });
    }

    /// Detach a phone, returning its entry if it was still a member.
    pub fn remove_phone(&mut self, id: &ConnectionId) -> Option<PhoneEntry> {
        self.phones.remove(id)
    }

    /// Remove every phone registered under `device_id` except `keep`, and
    /// return the removed entries so the caller can close their sockets.
    pub fn evict_device(&mut self, device_id: &str, keep: &ConnectionId) -> Vec<PhoneEntry> {
        let stale: Vec<ConnectionId> = self
            .phones
            .iter()
            .filter(|(id, entry)| *id != keep && entry.meta.device_id == device_id)
            .map(|(id, _)| id.clone())
            .collect();
        stale
            .iter()
            .filter_map(|id| self.phones.remove(id))
            .collect()
    }

    /// Number of phones that would remain after evicting `device_id`.
    pub fn phone_count_excluding(&self, device_id: &str) -> usize {
        self.phones
            .values()
            .filter(|entry| entry.meta.device_id != device_id)
            .count()
    }

    /// Metadata of all connected phones, oldest join first.
    pub fn phone_devices(&self) -> Vec<PhoneMeta> {
        let mut devices: Vec<PhoneMeta> =
            self.phones.values().map(|entry| entry.meta.clone()).collect();
        devices.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.device_id.cmp(&b.device_id))
        });
        devices
    }

    /// Whether `id` is a display of this session.
    pub fn has_display(&self, id: &ConnectionId) -> bool {
        self.displays.contains_key(id)
    }

    /// Whether `id` is a phone of this session.
    pub fn has_phone(&self, id: &ConnectionId) -> bool {
        self.phones.contains_key(id)
    }

    /// Number of attached displays.
    pub fn display_count(&self) -> usize {
        self.displays.len()
    }

    /// Number of attached phones.
    pub fn phone_count(&self) -> usize {
        self.phones.len()
    }

    /// True when no display and no phone is attached.
    pub fn is_empty(&self) -> bool {
        self.displays.is_empty() && self.phones.is_empty()
    }

    /// Queue `frame` on every open display. Returns how many accepted it.
    pub fn send_to_displays(&self, frame: &Frame) -> usize {
        deliver(self.displays.values(), frame)
    }

    /// Queue `frame` on every open phone. Returns how many accepted it.
    pub fn send_to_phones(&self, frame: &Frame) -> usize {
        deliver(self.phones.values().map(|entry| &entry.connection), frame)
    }
}

fn deliver<'a>(
    recipients: impl Iterator<Item = &'a Arc<ClientConnection>>,
    frame: &Frame,
) -> usize {
    recipients
        .filter(|conn| conn.is_open())
        .filter(|conn| conn.send(Arc::clone(frame)))
        .count()
}
