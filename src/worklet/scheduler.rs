//! Render-quantum scheduler.
//!
//! Owns the preallocated input/output quanta and calls every registered node once
//! per cycle. Device callbacks deliver and request audio frame by frame through
//! [`Scheduler::push_input`] and [`Scheduler::pull_output`]; the scheduler turns
//! that into fixed-size render quanta.

use tracing::{debug, info};

use super::{Quantum, RenderNode};
use crate::error::WorkletError;

/// A registered processing unit.
struct Registration {
    name: String,
    node: Box<dyn RenderNode>,
}

/// Drives registered processing units with fixed-size render quanta.
pub struct Scheduler {
    nodes: Vec<Registration>,
    input: Quantum,
    output: Quantum,
    scratch: Quantum,      // Per-node output, summed into `output`
    input_cursor: usize,   // Frames of `input` filled so far
    output_cursor: usize,  // Frames of `output` consumed so far
    rendered: u64,         // Number of quanta rendered
}

impl Scheduler {
    /// Create a scheduler.
    ///
    /// # Arguments
    /// * `frames` - Frames per render quantum (constant for the session)
    /// * `input_channels` - Channels in each input quantum
    /// * `output_channels` - Channels in each output quantum
    pub fn new(frames: usize, input_channels: usize, output_channels: usize) -> Self {
        let frames = frames.max(1);
        Self {
            nodes: Vec::new(),
            input: Quantum::new(input_channels, frames),
            output: Quantum::new(output_channels, frames),
            scratch: Quantum::new(output_channels, frames),
            input_cursor: 0,
            // Start exhausted so the first pull renders a fresh quantum
            output_cursor: frames,
            rendered: 0,
        }
    }

    /// Register a node under `name`.
    ///
    /// # Errors
    /// Returns [`WorkletError::DuplicateName`] if the name is already taken.
    pub fn register(&mut self, name: &str, node: Box<dyn RenderNode>) -> Result<(), WorkletError> {
        if self.nodes.iter().any(|r| r.name == name) {
            return Err(WorkletError::DuplicateName(name.to_string()));
        }
        info!("Registered processor '{}'", name);
        self.nodes.push(Registration { name: name.to_string(), node });
        Ok(())
    }

    /// Remove the node registered under `name`.
    ///
    /// # Returns
    /// `true` if a node was removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|r| r.name != name);
        self.nodes.len() != before
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.nodes.iter().any(|r| r.name == name)
    }

    pub fn frames(&self) -> usize {
        self.input.frames()
    }

    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    pub fn output(&self) -> &Quantum {
        &self.output
    }

    /// Render one quantum through every registered node.
    ///
    /// The output starts as silence; each node renders into a zeroed scratch
    /// quantum which is then mixed into the output. Nodes returning `false` are
    /// unregistered.
    pub fn render(&mut self) {
        self.output.silence();

        let input = &self.input;
        let output = &mut self.output;
        let scratch = &mut self.scratch;

        self.nodes.retain_mut(|registration| {
            scratch.silence();
            let keep = registration.node.render(input, scratch);
            output.mix_from(scratch);
            if !keep {
                debug!("Processor '{}' finished, unregistering", registration.name);
            }
            keep
        });

        self.rendered += 1;
    }

    /// Append one input frame, rendering once a full quantum has accumulated.
    ///
    /// # Arguments
    /// * `frame` - One sample per input channel; missing channels read as silence
    pub fn push_input(&mut self, frame: &[f32]) {
        let cursor = self.input_cursor;
        for (index, channel) in self.input.channels_mut().enumerate() {
            channel[cursor] = frame.get(index).copied().unwrap_or(0.0);
        }

        self.input_cursor += 1;
        if self.input_cursor >= self.input.frames() {
            self.render();
            self.input_cursor = 0;
        }
    }

    /// Fill one output frame, rendering a new quantum when the previous one is used up.
    ///
    /// # Arguments
    /// * `frame` - One slot per device channel; channels beyond the quantum get silence
    pub fn pull_output(&mut self, frame: &mut [f32]) {
        if self.output_cursor >= self.output.frames() {
            self.render();
            self.output_cursor = 0;
        }

        let cursor = self.output_cursor;
        for (index, slot) in frame.iter_mut().enumerate() {
            *slot = self.output.channel(index).and_then(|c| c.get(cursor)).copied().unwrap_or(0.0);
        }
        self.output_cursor += 1;
    }
}
