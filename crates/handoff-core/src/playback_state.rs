//! Per-viewer playback state machine.
//!
//! Transitions are a pure function of the current state and an input
//! describing what actually happened on a transport; UI affordances are a pure
//! function of the state.

use handoff_types::{Affordances, PlaybackState};

/// Something that happened to playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackInput {
    /// Local player started or resumed.
    LocalPlay,
    LocalPause,
    /// Local player paused and rewound to the start.
    LocalStop,
    /// Local player reached the end of the media.
    LocalEnded,
    /// A remote load was dispatched to a connected session.
    RemoteLoadSucceeded,
    RemotePlay,
    RemotePause,
    /// Receiver reported that the media finished.
    RemoteEnded,
    /// A remote command failed; playback falls back to the local player.
    RemoteCommandFailed,
    /// The session ended, failed or was suspended.
    SessionLost,
    /// Play was requested from a finished state.
    Restart { remote_connected: bool },
}

#[derive(Debug, Clone)]
pub struct PlaybackStateMachine {
    state: PlaybackState,
    preserve_play_state: bool,
}

impl PlaybackStateMachine {
    /// Machine for a newly opened viewer.
    pub fn new(remote_connected: bool, preserve_play_state: bool) -> Self {
        let state = if remote_connected {
            PlaybackState::CreatedRemote
        } else {
            PlaybackState::Created
        };
        Self {
            state,
            preserve_play_state,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn affordances(&self) -> Affordances {
        affordances(self.state)
    }

    /// Apply an input. Returns the new state when it changed.
    pub fn apply(&mut self, input: PlaybackInput) -> Option<PlaybackState> {
        let next = next_state(self.state, input, self.preserve_play_state);
        if next == self.state {
            return None;
        }
        tracing::debug!(from = ?self.state, to = ?next, input = ?input, "playback: transition");
        self.state = next;
        Some(next)
    }
}

/// Transition table.
///
/// Finished states only leave through [`PlaybackInput::Restart`]. Losing the
/// session maps `PlayingRemote` to `PausedLocal` and `PausedRemote` to
/// `PlayingLocal` unless `preserve_play_state` is set.
pub fn next_state(state: PlaybackState, input: PlaybackInput, preserve_play_state: bool) -> PlaybackState {
    use PlaybackInput as I;
    use handoff_types::PlaybackState as S;

    if state.is_finished() {
        return match input {
            I::Restart { remote_connected: true } => S::CreatedRemote,
            I::Restart { remote_connected: false } => S::Created,
            _ => state,
        };
    }

    match (state, input) {
        (S::Created | S::PlayingLocal | S::PausedLocal, I::LocalPlay) => S::PlayingLocal,
        (S::PlayingLocal, I::LocalPause | I::LocalStop) => S::PausedLocal,
        (S::PausedLocal, I::LocalStop) => S::PausedLocal,
        (S::PlayingLocal | S::PausedLocal, I::LocalEnded) => S::FinishedLocal,

        (_, I::RemoteLoadSucceeded) => S::PlayingRemote,
        (S::CreatedRemote | S::PlayingRemote | S::PausedRemote, I::RemotePlay) => S::PlayingRemote,
        (S::PlayingRemote | S::PausedRemote, I::RemotePause) => S::PausedRemote,
        (S::PlayingRemote | S::PausedRemote, I::RemoteEnded) => S::FinishedRemote,
        (_, I::RemoteCommandFailed) => S::PlayingLocal,

        (S::PlayingRemote, I::SessionLost) if preserve_play_state => S::PlayingLocal,
        (S::PausedRemote, I::SessionLost) if preserve_play_state => S::PausedLocal,
        (S::PlayingRemote, I::SessionLost) => S::PausedLocal,
        (S::PausedRemote, I::SessionLost) => S::PlayingLocal,
        (S::CreatedRemote, I::SessionLost) => S::Created,

        _ => state,
    }
}

/// Controls that are actionable in `state`.
pub fn affordances(state: PlaybackState) -> Affordances {
    match state {
        PlaybackState::Created
        | PlaybackState::CreatedRemote
        | PlaybackState::FinishedLocal
        | PlaybackState::FinishedRemote => Affordances {
            play_pause_enabled: true,
            remote_controls_visible: state == PlaybackState::FinishedRemote,
            ..Affordances::default()
        },
        PlaybackState::PlayingLocal | PlaybackState::PausedLocal => Affordances {
            play_pause_enabled: true,
            shows_pause: state == PlaybackState::PlayingLocal,
            stop_enabled: true,
            seek_enabled: true,
            remote_controls_visible: false,
        },
        PlaybackState::PlayingRemote | PlaybackState::PausedRemote => Affordances {
            remote_controls_visible: true,
            ..Affordances::default()
        },
    }
}
