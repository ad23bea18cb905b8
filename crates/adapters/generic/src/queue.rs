//! FIFO of commands waiting for a pull device's next poll.

use std::collections::VecDeque;

use spokes_domain::message::DeviceCommand;

/// Commands are handed out once, in arrival order, and then forgotten.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    pending: VecDeque<DeviceCommand>,
}

impl CommandQueue {
    pub fn push(&mut self, command: DeviceCommand) {
        self.pending.push_back(command);
    }

    pub fn pop(&mut self) -> Option<DeviceCommand> {
        self.pending.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn command(name: &str) -> DeviceCommand {
        DeviceCommand {
            device: "d".into(),
            command: name.to_string(),
            values: json!({}),
        }
    }

    #[test]
    fn should_dequeue_in_arrival_order() {
        let mut queue = CommandQueue::default();
        queue.push(command("C1"));
        queue.push(command("C2"));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop().unwrap().command, "C1");
        assert_eq!(queue.pop().unwrap().command, "C2");
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }
}
