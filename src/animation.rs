//! Visual feedback derived from the level signal.

use crate::engine::{LevelSignal, Speaker};

pub const MIN_WAVE_HEIGHT: f32 = 6.0;
pub const MAX_WAVE_HEIGHT: f32 = 24.0;
pub const MIN_AVATAR_SCALE: f32 = 1.0;
pub const MAX_AVATAR_SCALE: f32 = 1.05;

/// Levels at or below this leave the user wave flat.
const WAVE_GATE: f32 = 0.01;
const WAVE_GAIN: f32 = 100.0;
const AVATAR_GAIN: f32 = 200.0;
const AVATAR_OFFSET: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceAnimation {
    wave_height: f32,
    avatar_scale: f32,
}

impl Default for VoiceAnimation {
    fn default() -> Self {
        Self {
            wave_height: MIN_WAVE_HEIGHT,
            avatar_scale: MIN_AVATAR_SCALE,
        }
    }
}

impl VoiceAnimation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, signal: LevelSignal) {
        match signal.speaker {
            Speaker::User => self.update_user(signal.level),
            Speaker::Ai => self.update_ai(signal.level),
        }
    }

    pub fn update_user(&mut self, level: f32) {
        let height = if level > WAVE_GATE { MIN_WAVE_HEIGHT + level * WAVE_GAIN } else { MIN_WAVE_HEIGHT };
        self.wave_height = clamp(height, MIN_WAVE_HEIGHT, MAX_WAVE_HEIGHT);
    }

    pub fn update_ai(&mut self, level: f32) {
        let scale = 1.0 + level * AVATAR_GAIN - AVATAR_OFFSET;
        self.avatar_scale = clamp(scale, MIN_AVATAR_SCALE, MAX_AVATAR_SCALE);
    }

    pub fn wave_height(&self) -> f32 {
        self.wave_height
    }

    pub fn avatar_scale(&self) -> f32 {
        self.avatar_scale
    }
}

// NaN collapses to the lower bound.
fn clamp(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        return min;
    }
    value.clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(speaker: Speaker, level: f32) -> LevelSignal {
        LevelSignal { speaker, level }
    }

    #[test]
    fn test_user_wave_follows_level_within_bounds() {
        let mut animation = VoiceAnimation::new();

        animation.update(signal(Speaker::User, 0.1));
        assert!((animation.wave_height() - 16.0).abs() < 1e-4);

        animation.update(signal(Speaker::User, 0.9));
        assert_eq!(animation.wave_height(), MAX_WAVE_HEIGHT);

        animation.update(signal(Speaker::User, 0.005));
        assert_eq!(animation.wave_height(), MIN_WAVE_HEIGHT);
        assert_eq!(animation.avatar_scale(), MIN_AVATAR_SCALE);
    }

    #[test]
    fn test_avatar_scale_follows_ai_level_within_bounds() {
        let mut animation = VoiceAnimation::new();

        animation.update(signal(Speaker::Ai, 0.0001));
        assert_eq!(animation.avatar_scale(), MIN_AVATAR_SCALE);

        animation.update(signal(Speaker::Ai, 0.00051));
        assert!((animation.avatar_scale() - 1.002).abs() < 1e-4);

        animation.update(signal(Speaker::Ai, 0.5));
        assert_eq!(animation.avatar_scale(), MAX_AVATAR_SCALE);
        assert_eq!(animation.wave_height(), MIN_WAVE_HEIGHT);
    }

    #[test]
    fn test_nan_level_rests_at_minimum() {
        let mut animation = VoiceAnimation::new();
        animation.update(signal(Speaker::Ai, f32::NAN));
        animation.update(signal(Speaker::User, f32::NAN));
        assert_eq!(animation.avatar_scale(), MIN_AVATAR_SCALE);
        assert_eq!(animation.wave_height(), MIN_WAVE_HEIGHT);
    }
}
