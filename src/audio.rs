//! Audio cue queue
//!
//! Patterns only name the cue to play. [`AudioQueue`] applies the volume
//! settings and keeps the audible cues until the host drains them into its
//! own mixer.

use crate::host::AudioPlayer;
use crate::param::ObjectRef;
use crate::settings::AudioSettings;

/// A cue ready for the mixer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioCue {
    pub cue: ObjectRef,
    /// Effective volume (0.0 - 1.0)
    pub volume: f32,
}

/// Volume-aware recording audio player
#[derive(Debug, Clone)]
pub struct AudioQueue {
    pending: Vec<AudioCue>,
    master_volume: f32,
    sfx_volume: f32,
    muted: bool,
}

impl Default for AudioQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioQueue {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,
        }
    }

    pub fn from_settings(settings: &AudioSettings) -> Self {
        let mut queue = Self::new();
        queue.set_master_volume(settings.master_volume);
        queue.set_sfx_volume(settings.sfx_volume);
        queue.set_muted(settings.muted);
        queue
    }

    /// Set master volume (0.0 - 1.0)
    pub fn set_master_volume(&mut self, vol: f32) {
        self.master_volume = vol.clamp(0.0, 1.0);
    }

    /// Set SFX volume (0.0 - 1.0)
    pub fn set_sfx_volume(&mut self, vol: f32) {
        self.sfx_volume = vol.clamp(0.0, 1.0);
    }

    /// Mute/unmute all audio
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Get effective volume
    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master_volume * self.sfx_volume
        }
    }

    pub fn pending(&self) -> &[AudioCue] {
        &self.pending
    }

    /// Take every queued cue
    pub fn drain(&mut self) -> Vec<AudioCue> {
        std::mem::take(&mut self.pending)
    }
}

impl AudioPlayer for AudioQueue {
    fn play(&mut self, cue: ObjectRef) {
        let volume = self.effective_volume();
        if volume <= 0.0 || cue.is_none() {
            return;
        }
        self.pending.push(AudioCue { cue, volume });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_applies_volume() {
        let mut queue = AudioQueue::new();
        queue.set_master_volume(0.5);
        queue.set_sfx_volume(2.0);
        queue.play(ObjectRef(3));
        assert_eq!(queue.pending(), &[AudioCue { cue: ObjectRef(3), volume: 0.5 }]);
        assert_eq!(queue.drain().len(), 1);
        assert!(queue.pending().is_empty());
    }

    #[test]
    fn test_muted_and_empty_cues_are_dropped() {
        let mut queue = AudioQueue::from_settings(&AudioSettings {
            master_volume: 1.0,
            sfx_volume: 1.0,
            muted: true,
        });
        queue.play(ObjectRef(1));
        assert!(queue.pending().is_empty());

        queue.set_muted(false);
        queue.play(ObjectRef::NONE);
        assert!(queue.pending().is_empty());
    }
}
