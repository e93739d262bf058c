// src/io/serial/mock.rs
//
// Scripted in-memory port for exercising the session pipeline without hardware.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::{Arc, Mutex};

use super::port::{PortOpener, SerialLink};

/// One scripted poll result.
#[derive(Clone, Debug)]
pub enum MockRead {
    /// Bytes that become available on the next poll
    Data(Vec<u8>),
    /// A poll that finds nothing waiting
    Idle,
    /// The next poll fails with this error kind
    Error(ErrorKind),
}

/// State shared between a test and the port handed to the session.
#[derive(Debug, Default)]
pub struct MockState {
    pub script: VecDeque<MockRead>,
    /// Report closed once the script is exhausted (otherwise stay idle forever)
    pub close_when_drained: bool,
    pub written: Vec<u8>,
    pub fail_writes: bool,
    pub polls: usize,
    pub dropped: bool,
    pending: Vec<u8>,
}

#[derive(Clone, Debug, Default)]
pub struct MockHandle(pub Arc<Mutex<MockState>>);

impl MockHandle {
    pub fn new(script: Vec<MockRead>, close_when_drained: bool) -> Self {
        Self(Arc::new(Mutex::new(MockState {
            script: script.into(),
            close_when_drained,
            ..Default::default()
        })))
    }

    pub fn written(&self) -> Vec<u8> {
        self.0.lock().unwrap().written.clone()
    }

    pub fn dropped(&self) -> bool {
        self.0.lock().unwrap().dropped
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.0.lock().unwrap().fail_writes = fail;
    }

    pub fn push(&self, read: MockRead) {
        self.0.lock().unwrap().script.push_back(read);
    }
}

pub struct MockPort {
    state: MockHandle,
}

impl SerialLink for MockPort {
    fn bytes_available(&mut self) -> std::io::Result<usize> {
        let mut st = self.state.0.lock().unwrap();
        st.polls += 1;
        if !st.pending.is_empty() {
            return Ok(st.pending.len());
        }
        match st.script.pop_front() {
            Some(MockRead::Data(bytes)) => {
                st.pending = bytes;
                Ok(st.pending.len())
            }
            Some(MockRead::Idle) | None => Ok(0),
            Some(MockRead::Error(kind)) => Err(std::io::Error::new(kind, "scripted failure")),
        }
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut st = self.state.0.lock().unwrap();
        let n = buf.len().min(st.pending.len());
        buf[..n].copy_from_slice(&st.pending[..n]);
        st.pending.drain(..n);
        Ok(n)
    }

    fn write_bytes(&mut self, data: &[u8]) -> std::io::Result<()> {
        let mut st = self.state.0.lock().unwrap();
        if st.fail_writes {
            return Err(std::io::Error::new(ErrorKind::BrokenPipe, "scripted write failure"));
        }
        st.written.extend_from_slice(data);
        Ok(())
    }

    fn is_open(&self) -> bool {
        let st = self.state.0.lock().unwrap();
        !(st.close_when_drained && st.script.is_empty() && st.pending.is_empty())
    }
}

impl Drop for MockPort {
    fn drop(&mut self) {
        if let Ok(mut st) = self.state.0.lock() {
            st.dropped = true;
        }
    }
}

/// Opener that hands out a port backed by `handle`, or fails with `error`.
#[derive(Clone, Debug, Default)]
pub struct MockOpener {
    pub handle: MockHandle,
    pub error: Option<String>,
    pub opened: Arc<Mutex<Vec<(String, u32)>>>,
}

impl MockOpener {
    pub fn new(handle: MockHandle) -> Self {
        Self {
            handle,
            error: None,
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }
}

impl PortOpener for MockOpener {
    fn open(&self, port: &str, baud_rate: u32) -> Result<Box<dyn SerialLink>, String> {
        if let Some(ref e) = self.error {
            return Err(format!("Failed to open {}: {}", port, e));
        }
        self.opened.lock().unwrap().push((port.to_string(), baud_rate));
        Ok(Box::new(MockPort {
            state: self.handle.clone(),
        }))
    }
}
