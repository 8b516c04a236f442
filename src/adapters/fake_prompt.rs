//! Scripted presence prompt for tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::{PromptError, YkagentResult};
use crate::model::{Pin, PinRequest, TouchOutcome, TouchRequest};
use crate::ports::PresencePrompt;

/// Replays a fixed list of PIN answers and records every request
#[derive(Default)]
pub struct RecordingPrompt {
    /// `None` entries mean "user pressed Cancel"
    pins: Mutex<VecDeque<Option<String>>>,
    pub pin_requests: Mutex<Vec<PinRequest>>,
    pub touch_requests: Mutex<Vec<TouchRequest>>,
    pub notifications: Mutex<Vec<String>>,
    pub touch_fails: AtomicBool,
    touch_started: AtomicUsize,
}

impl RecordingPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pins<'a>(pins: impl IntoIterator<Item = &'a str>) -> Self {
        let prompt = Self::new();
        prompt
            .pins
            .lock()
            .unwrap()
            .extend(pins.into_iter().map(|p| Some(p.to_string())));
        prompt
    }

    pub fn push_cancel(&self) {
        self.pins.lock().unwrap().push_back(None);
    }

    pub fn failing_touch(self) -> Self {
        self.touch_fails.store(true, Ordering::SeqCst);
        self
    }

    pub fn pin_prompts(&self) -> usize {
        self.pin_requests.lock().unwrap().len()
    }

    /// Touch requests that have at least started running
    pub fn touch_prompts_started(&self) -> usize {
        self.touch_started.load(Ordering::SeqCst)
    }
}

impl PresencePrompt for RecordingPrompt {
    fn request_pin(&self, request: &PinRequest) -> YkagentResult<Option<Pin>> {
        self.pin_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        let answer = self
            .pins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| PromptError::Failed {
                reason: "no scripted PIN left".to_string(),
            })?;
        answer.map(|pin| Pin::from_str(&pin)).transpose().map_err(Into::into)
    }

    fn request_touch(&self, request: &TouchRequest) -> YkagentResult<TouchOutcome> {
        self.touch_started.fetch_add(1, Ordering::SeqCst);
        self.touch_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        if self.touch_fails.load(Ordering::SeqCst) {
            return Err(PromptError::Failed {
                reason: "dialog helper crashed".to_string(),
            }
            .into());
        }
        Ok(TouchOutcome::Confirmed)
    }

    fn notify(&self, message: &str) {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}
