use agora_connection::{ConnectionEvent, ConnectionState, TranscriptEntry};
use agora_protocol::SearchStatus;

/// Presentation-side chat state.
///
/// The app feeds [`ConnectionEvent`]s into this struct and the UI reads
/// from it. All methods are synchronous. The transcript itself is
/// append-only; entries stay in the order the connection manager
/// produced them.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    state: ConnectionState,
    search: Option<SearchStatus>,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes one connection event into the presentation state.
    pub fn apply(&mut self, event: &ConnectionEvent) {
        match event {
            ConnectionEvent::StateChanged(state) => {
                self.state = state.clone();
            }
            ConnectionEvent::Transcript(entry) => {
                self.entries.push(entry.clone());
            }
            ConnectionEvent::Search(status) => {
                self.search = Some(status.clone());
            }
            // Delivery acks and retry notices carry no persistent state.
            ConnectionEvent::Delivery { .. } | ConnectionEvent::Reconnecting { .. } => {}
        }
    }

    /// All transcript entries, oldest first.
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Current connection state.
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Whether the channel is currently open.
    pub fn is_connected(&self) -> bool {
        self.state.is_open()
    }

    /// Latest search ticket status, if any was reported.
    pub fn search_status(&self) -> Option<&SearchStatus> {
        self.search.as_ref()
    }

    /// Number of transcript entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the transcript has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resets all presentation state.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.search = None;
    }
}
