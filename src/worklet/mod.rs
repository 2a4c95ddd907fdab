//! Processing-unit runtime.
//!
//! A processing unit (an [`AudioProcessor`]) lives on the real-time audio thread
//! and only talks to the host through its message port. The [`Scheduler`] owns the
//! per-cycle buffers and drives every registered unit once per render quantum.

mod node;
mod port;
mod quantum;
mod scheduler;

pub use node::{ProcessorNode, RenderNode, create_node};
pub use port::{DEFAULT_PORT_CAPACITY, Emitter, HostPort, NodePort, message_channel};
pub use quantum::{Quantum, RENDER_QUANTUM_FRAMES};
pub use scheduler::Scheduler;

/// A real-time processing unit hosted by the [`Scheduler`].
///
/// Both methods run on the audio thread and must not block. Commands are delivered
/// between quanta, never while `process` is running.
pub trait AudioProcessor: Send {
    /// Name the unit is registered under.
    const NAME: &'static str;

    /// Host -> unit control message.
    type Command: Send + 'static;

    /// Unit -> host notification.
    type Event: Send + 'static;

    /// Handle one inbound control message.
    fn on_command(&mut self, command: Self::Command, events: &mut Emitter<Self::Event>);

    /// Process one render quantum.
    ///
    /// # Returns
    /// `true` to stay registered, `false` to be removed from the scheduler.
    fn process(&mut self, input: &Quantum, output: &mut Quantum, events: &mut Emitter<Self::Event>) -> bool;
}
