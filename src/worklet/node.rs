//! Binding between a processor and its message port.

use ringbuf::traits::Consumer;

use super::port::{HostPort, NodePort, message_channel};
use super::{AudioProcessor, Quantum};

/// Object-safe view of a processing unit, as seen by the [`Scheduler`](super::Scheduler).
pub trait RenderNode: Send {
    /// Deliver pending messages, then process one quantum.
    ///
    /// # Returns
    /// `false` if the node asked to be unregistered.
    fn render(&mut self, input: &Quantum, output: &mut Quantum) -> bool;
}

/// A processor together with the unit side of its message port.
pub struct ProcessorNode<P: AudioProcessor> {
    processor: P,
    port: NodePort<P::Command, P::Event>,
}

/// Wrap `processor` in a node and return the matching host port.
///
/// # Arguments
/// * `processor` - The processing unit
/// * `capacity` - Maximum number of pending host -> unit messages
pub fn create_node<P: AudioProcessor>(processor: P, capacity: usize) -> (ProcessorNode<P>, HostPort<P::Command, P::Event>) {
    let (host, port) = message_channel(capacity);
    (ProcessorNode { processor, port }, host)
}

impl<P: AudioProcessor> ProcessorNode<P> {
    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Deliver every pending message in FIFO order.
    pub fn deliver_commands(&mut self) {
        let (commands, events) = self.port.parts();
        while let Some(command) = commands.try_pop() {
            self.processor.on_command(command, events);
        }
    }
}

impl<P: AudioProcessor> RenderNode for ProcessorNode<P> {
    fn render(&mut self, input: &Quantum, output: &mut Quantum) -> bool {
        // Messages take effect at the quantum boundary, never mid-quantum
        self.deliver_commands();
        self.processor.process(input, output, self.port.events())
    }
}
