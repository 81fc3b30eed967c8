//! # Outbound Event Bus
//!
//! One-way notifications from the simulation to whoever renders it. These
//! are cosmetic: camera shake, plate clunks, the world-flip animation. They
//! are deliberately NOT the mechanism that keeps world state consistent -
//! that is the shift bus's synchronous observer dispatch. Anything dropped
//! here loses a sound effect, never an invariant.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use dichroma_core::{EntityId, Vec2, WorldState};

/// Why a shift attempt was refused at the launch guard.
///
/// These are the only two public failure signals; a rollback after a
/// committed launch is gameplay-silent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShiftFailReason {
    /// Not enough ground support under the player (or airborne).
    Unsupported,
    /// Standing on an always-solid wall surface.
    StandingOnWall,
}

/// Events that flow from the simulation to the presentation layer.
#[derive(Clone, Copy, Debug)]
pub enum GameEvent {
    /// The solid world changed. Fired after every subscriber has processed
    /// the change.
    WorldShifted {
        /// World that was solid before.
        from: WorldState,
        /// World that is solid now.
        to: WorldState,
    },

    /// A shift attempt failed its launch guard. Drives failure feedback
    /// (camera shake) in the presentation layer.
    ShiftFailed {
        /// Which guard refused the attempt.
        reason: ShiftFailReason,
    },

    /// A completed shift could not resolve its post-transition overlap and
    /// was rolled back. Telemetry only; the player just sees a brief flip.
    ShiftRolledBack,

    /// A pressure plate switched on or off.
    PlateChanged {
        /// The plate entity.
        plate: EntityId,
        /// New output state.
        on: bool,
    },

    /// A movable block was teleported (grid snap or scripted move).
    BlockTeleported {
        /// The block entity.
        block: EntityId,
        /// Destination center.
        to: Vec2,
    },
}

/// Event bus for simulation-to-presentation notifications.
///
/// Bounded so a stalled consumer cannot grow memory; producers drop on
/// full.
pub struct EventBus {
    sender: Sender<GameEvent>,
    receiver: Receiver<GameEvent>,
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Creates a sender handle (clone for multiple producers).
    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /// Creates a receiver handle.
    #[must_use]
    pub fn receiver(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.receiver.clone(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Handle for emitting events.
#[derive(Clone)]
pub struct EventSender {
    sender: Sender<GameEvent>,
}

impl EventSender {
    /// Sends an event (non-blocking). Returns `false` if the channel was
    /// full and the event was dropped.
    #[inline]
    pub fn send(&self, event: GameEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Handle for consuming events.
#[derive(Clone)]
pub struct EventReceiver {
    receiver: Receiver<GameEvent>,
}

impl EventReceiver {
    /// Drains all pending events.
    #[inline]
    #[must_use]
    pub fn drain(&self) -> Vec<GameEvent> {
        let mut events = Vec::with_capacity(16);
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Receives one event, if any is pending.
    #[inline]
    pub fn try_recv(&self) -> Option<GameEvent> {
        self.receiver.try_recv().ok()
    }

    /// Number of pending events.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}
