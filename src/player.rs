//! Fire-and-forget clip playback.
//!
//! Playback runs on a detached thread that only logs progress. The busy flag
//! is the one piece of shared state; a trigger while busy is ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct VideoPlayer {
    playing: Arc<AtomicBool>,
    duration: Duration,
    step: Duration,
}

impl VideoPlayer {
    pub fn new(duration: Duration) -> Self {
        Self {
            playing: Arc::new(AtomicBool::new(false)),
            duration,
            step: Duration::from_secs(1),
        }
    }

    /// Progress granularity (one log line per step).
    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step.max(Duration::from_millis(1));
        self
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Start playing `clip` in the background. Returns false when busy.
    pub fn trigger_play(&self, clip: &str) -> bool {
        if self
            .playing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::info!("player busy, ignoring trigger for {}", clip);
            return false;
        }

        let playing = Arc::clone(&self.playing);
        let clip = clip.to_string();
        let duration = self.duration;
        let step = self.step;
        std::thread::spawn(move || {
            log::info!("[player] starting {}", clip);
            let mut elapsed = Duration::ZERO;
            while elapsed < duration {
                let nap = step.min(duration - elapsed);
                std::thread::sleep(nap);
                elapsed += nap;
                log::info!("[player] playing {} {:.1}s", clip, elapsed.as_secs_f32());
            }
            log::info!("[player] {} finished", clip);
            playing.store(false, Ordering::Release);
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn wait_idle(player: &VideoPlayer, timeout: Duration) -> bool {
        let start = Instant::now();
        while player.is_playing() {
            if start.elapsed() > timeout {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        true
    }

    #[test]
    fn second_trigger_is_ignored_while_busy() {
        let player = VideoPlayer::new(Duration::from_millis(200)).with_step(Duration::from_millis(50));
        assert!(player.trigger_play("hello_cat.mp4"));
        assert!(player.is_playing());
        assert!(!player.trigger_play("hello_dog.mp4"));
        assert!(wait_idle(&player, Duration::from_secs(5)));
        assert!(player.trigger_play("hello_dog.mp4"));
        assert!(wait_idle(&player, Duration::from_secs(5)));
    }
}
