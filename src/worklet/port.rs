//! Ordered, asynchronous message port between the host and a processing unit.
//!
//! Host -> unit messages go through a lock-free SPSC ring so the audio thread never
//! takes a lock. Unit -> host events go through an unbounded tokio channel, whose
//! `send` never blocks. Both directions are FIFO and share no mutable state.

use parking_lot::Mutex;
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::WorkletError;

/// Default number of host -> unit messages that may be pending at once.
pub const DEFAULT_PORT_CAPACITY: usize = 256;

/// Create a connected host/unit port pair.
///
/// # Arguments
/// * `capacity` - Maximum number of pending host -> unit messages
pub fn message_channel<C: Send, E: Send>(capacity: usize) -> (HostPort<C, E>, NodePort<C, E>) {
    let capacity = capacity.max(1);
    let (producer, consumer) = HeapRb::<C>::new(capacity).split();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let host = HostPort { commands: Mutex::new(producer), events: event_rx, capacity };
    let node = NodePort { commands: consumer, events: Emitter::new(event_tx) };
    (host, node)
}

/// Host side of a message port.
pub struct HostPort<C, E> {
    commands: Mutex<ringbuf::HeapProd<C>>, // Mutex allows posting from any host thread
    events: mpsc::UnboundedReceiver<E>,
    capacity: usize,
}

impl<C, E> HostPort<C, E> {
    /// Post a message to the unit.
    ///
    /// # Errors
    /// Returns [`WorkletError::PortFull`] if the unit has not yet consumed enough
    /// earlier messages. The message is dropped; retrying is up to the caller.
    pub fn post(&self, command: C) -> Result<(), WorkletError> {
        self.commands.lock().try_push(command).map_err(|_| WorkletError::PortFull { capacity: self.capacity })
    }

    /// Number of posted messages the unit has not consumed yet.
    pub fn pending(&self) -> usize {
        self.commands.lock().occupied_len()
    }

    /// Wait for the next event from the unit.
    ///
    /// Returns `None` once the unit has been dropped and every event was received.
    pub async fn recv(&mut self) -> Option<E> {
        self.events.recv().await
    }

    /// Take the next event if one is already available.
    pub fn try_recv(&mut self) -> Option<E> {
        self.events.try_recv().ok()
    }
}

/// Unit side of a message port. Owned by the audio thread.
pub struct NodePort<C, E> {
    commands: ringbuf::HeapCons<C>,
    events: Emitter<E>,
}

impl<C, E> NodePort<C, E> {
    /// Pop the oldest pending message.
    pub fn next_command(&mut self) -> Option<C> {
        self.commands.try_pop()
    }

    pub fn events(&mut self) -> &mut Emitter<E> {
        &mut self.events
    }

    /// Split into the parts a processor needs at the same time.
    pub(crate) fn parts(&mut self) -> (&mut ringbuf::HeapCons<C>, &mut Emitter<E>) {
        (&mut self.commands, &mut self.events)
    }
}

/// Non-blocking unit -> host event sender.
pub struct Emitter<E> {
    tx: mpsc::UnboundedSender<E>,
    sent: u64,
}

impl<E> Emitter<E> {
    pub fn new(tx: mpsc::UnboundedSender<E>) -> Self {
        Self { tx, sent: 0 }
    }

    /// Send an event to the host. Never blocks.
    pub fn emit(&mut self, event: E) {
        if self.tx.send(event).is_err() {
            debug!("Host port closed, event dropped");
            return;
        }
        self.sent += 1;
    }

    /// Number of events delivered to the host so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }
}
