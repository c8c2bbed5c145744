//! Where loaded reads go.
use std::sync::mpsc::{Receiver, Sender};

use crate::read::Read;

/// Downstream consumer of loaded reads.
///
/// Implementations must not block indefinitely in `accept`; any queueing is
/// their own business. `terminate` signals that no more reads will arrive.
pub trait ReadSink {
    fn accept(&mut self, read: Read);

    fn terminate(&mut self);
}

impl<S: ReadSink + ?Sized> ReadSink for &mut S {
    fn accept(&mut self, read: Read) {
        (**self).accept(read)
    }

    fn terminate(&mut self) {
        (**self).terminate()
    }
}

impl<S: ReadSink + ?Sized> ReadSink for Box<S> {
    fn accept(&mut self, read: Read) {
        (**self).accept(read)
    }

    fn terminate(&mut self) {
        (**self).terminate()
    }
}

/// Forwards reads to another thread over an unbounded channel.
///
/// `terminate` drops the sender so the receiving side sees the end of the
/// stream. Reads accepted after that are discarded.
#[derive(Debug)]
pub struct ChannelSink {
    sender: Option<Sender<Read>>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<Read>) {
        let (sender, receiver) = std::sync::mpsc::channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    pub fn is_terminated(&self) -> bool {
        self.sender.is_none()
    }
}

impl ReadSink for ChannelSink {
    fn accept(&mut self, read: Read) {
        match &self.sender {
            Some(sender) => {
                if sender.send(read).is_err() {
                    log::warn!("Read receiver hung up, dropping read");
                }
            }
            None => log::error!("Read {} accepted after terminate, dropping", read.read_id),
        }
    }

    fn terminate(&mut self) {
        self.sender.take();
    }
}

/// Keeps everything it is given, for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub(crate) reads: Vec<Read>,
    pub(crate) terminations: usize,
}

#[cfg(test)]
impl ReadSink for RecordingSink {
    fn accept(&mut self, read: Read) {
        self.reads.push(read);
    }

    fn terminate(&mut self) {
        self.terminations += 1;
    }
}
