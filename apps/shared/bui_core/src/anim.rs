//! Time-sliced enter/quit animation playback
//!
//! The engine renders the animation; this player only tracks progress so the
//! panel knows when the quit animation is over and the close can continue.

use std::time::Duration;

/// Which side of the panel lifecycle an animation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimPhase {
    Enter,
    Quit,
}

/// Work resumed when an animation completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Continuation {
    /// Apply the close rule
    Close,
}

#[derive(Debug, Clone)]
struct Playback {
    name: String,
    phase: AnimPhase,
    elapsed: Duration,
    duration: Duration,
    then: Option<Continuation>,
}

/// A finished playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Finished {
    pub phase: AnimPhase,
    pub then: Option<Continuation>,
}

#[derive(Debug, Default)]
pub struct AnimPlayer {
    current: Option<Playback>,
}

impl AnimPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an animation, replacing (and cancelling) the current one
    pub(crate) fn play(
        &mut self,
        name: &str,
        phase: AnimPhase,
        duration: Duration,
        then: Option<Continuation>,
    ) {
        self.current = Some(Playback {
            name: name.to_string(),
            phase,
            elapsed: Duration::ZERO,
            duration,
            then,
        });
    }

    /// Advance by one frame; returns the playback if it completed
    pub(crate) fn advance(&mut self, dt: Duration) -> Option<Finished> {
        let playback = self.current.as_mut()?;
        playback.elapsed = playback.elapsed.saturating_add(dt);
        if playback.elapsed < playback.duration {
            return None;
        }
        self.current.take().map(|p| Finished {
            phase: p.phase,
            then: p.then,
        })
    }

    /// Stop without running the continuation
    pub fn cancel(&mut self) -> bool {
        self.current.take().is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.current.is_some()
    }

    pub fn phase(&self) -> Option<AnimPhase> {
        self.current.as_ref().map(|p| p.phase)
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current.as_ref().map(|p| p.name.as_str())
    }

    /// Progress of the current animation, 0.0-1.0
    pub fn progress(&self) -> Option<f32> {
        self.current.as_ref().map(|p| {
            if p.duration.is_zero() {
                1.0
            } else {
                (p.elapsed.as_secs_f32() / p.duration.as_secs_f32()).min(1.0)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completes_after_duration() {
        let mut player = AnimPlayer::new();
        player.play("fade", AnimPhase::Quit, Duration::from_millis(100), Some(Continuation::Close));

        assert!(player.advance(Duration::from_millis(60)).is_none());
        let progress = player.progress().unwrap();
        assert!((progress - 0.6).abs() < 1e-4);
        let finished = player.advance(Duration::from_millis(60)).unwrap();
        assert_eq!(finished.then, Some(Continuation::Close));
        assert!(!player.is_playing());
    }

    #[test]
    fn test_zero_duration_finishes_on_next_advance() {
        let mut player = AnimPlayer::new();
        player.play("pop", AnimPhase::Enter, Duration::ZERO, None);
        assert_eq!(player.current_name(), Some("pop"));
        assert_eq!(
            player.advance(Duration::ZERO),
            Some(Finished {
                phase: AnimPhase::Enter,
                then: None
            })
        );
    }

    #[test]
    fn test_cancel_drops_continuation() {
        let mut player = AnimPlayer::new();
        player.play("fade", AnimPhase::Quit, Duration::from_secs(1), Some(Continuation::Close));
        assert!(player.cancel());
        assert!(player.advance(Duration::from_secs(2)).is_none());
    }
}
