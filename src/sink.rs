/*
 *  sink.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  Display sink abstraction - the one resource all producers share
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::sync::{Arc, Mutex};

use log::trace;

use crate::error::ProducerError;
use crate::frame::Frame;

/// The physical output boundary. Concrete hardware drivers live outside
/// this crate; all the core assumes is "accepts a composed frame" and
/// "can be blanked".
pub trait DisplaySink: Send {
    /// Display geometry as (width, height) in pixels
    fn dimensions(&self) -> (u32, u32);

    /// Push a fully-composed frame to the output
    fn push_frame(&mut self, frame: &Frame) -> Result<(), ProducerError>;

    /// Blank the physical display
    fn clear(&mut self) -> Result<(), ProducerError>;
}

/// Shared handle to the single display sink. Only the main loop's current
/// tick renders through it, but producers hold the handle from
/// construction onward.
pub type SharedSink = Arc<Mutex<dyn DisplaySink>>;

/// Sink that swallows frames. Used when running headless.
pub struct NullSink {
    width: u32,
    height: u32,
}

impl NullSink {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl DisplaySink for NullSink {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn push_frame(&mut self, frame: &Frame) -> Result<(), ProducerError> {
        trace!("null sink: frame with {} lit pixels", frame.lit_pixels());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ProducerError> {
        Ok(())
    }
}

/// Mock sink for testing without hardware
///
/// Records every operation and keeps the last pushed frame so tests can
/// assert on what actually reached the display.
#[derive(Clone)]
pub struct MockSink {
    width: u32,
    height: u32,
    state: Arc<Mutex<MockSinkState>>,
}

/// Internal state for the mock sink (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MockSinkState {
    /// Number of frames pushed
    pub push_count: usize,

    /// Number of times clear() was called
    pub clear_count: usize,

    /// The most recent frame, if any
    pub last_frame: Option<Frame>,

    /// When set, push_frame fails with this message (for error-path tests)
    pub fail_next_push: Option<String>,
}

impl MockSink {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            state: Arc::new(Mutex::new(MockSinkState::default())),
        }
    }

    /// Handle to the recorded state, for test assertions
    pub fn state(&self) -> Arc<Mutex<MockSinkState>> {
        self.state.clone()
    }
}

impl DisplaySink for MockSink {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn push_frame(&mut self, frame: &Frame) -> Result<(), ProducerError> {
        let mut state = self.state.lock().unwrap();
        if let Some(msg) = state.fail_next_push.take() {
            return Err(ProducerError::Render(msg));
        }
        state.push_count += 1;
        state.last_frame = Some(frame.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ProducerError> {
        let mut state = self.state.lock().unwrap();
        state.clear_count += 1;
        state.last_frame = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_sink_records_operations() {
        let mut sink = MockSink::new(128, 64);
        let state = sink.state();

        let frame = Frame::new(128, 64);
        sink.push_frame(&frame).unwrap();
        sink.push_frame(&frame).unwrap();
        sink.clear().unwrap();

        let s = state.lock().unwrap();
        assert_eq!(s.push_count, 2);
        assert_eq!(s.clear_count, 1);
        assert!(s.last_frame.is_none());
    }

    #[test]
    fn test_mock_sink_injected_failure() {
        let mut sink = MockSink::new(128, 64);
        sink.state().lock().unwrap().fail_next_push = Some("boom".to_string());

        let frame = Frame::new(128, 64);
        assert!(sink.push_frame(&frame).is_err());
        // failure consumed; next push succeeds
        assert!(sink.push_frame(&frame).is_ok());
    }
}
