//! Timed visual feedback (invalid-placement flash, preview shake).
//!
//! Effects are plain state objects advanced by `tick`; the renderer reads
//! `intensity()` each frame.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    /// Preview tinted red, fading out.
    InvalidFlash,
    /// Preview jitters sideways.
    Shake,
}

/// One running effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedEffect {
    pub kind: EffectKind,
    pub duration: f32,
    pub elapsed: f32,
}

impl TimedEffect {
    pub fn new(kind: EffectKind, duration: f32) -> Self {
        Self {
            kind,
            duration: duration.max(f32::EPSILON),
            elapsed: 0.0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// 1.0 at start, linearly down to 0.0 at the end.
    pub fn intensity(&self) -> f32 {
        (1.0 - self.elapsed / self.duration).clamp(0.0, 1.0)
    }

    pub fn tick(&mut self, dt: f32) {
        self.elapsed = (self.elapsed + dt).min(self.duration);
    }
}

/// Active effects; at most one per kind, restarting replaces the old one.
#[derive(Debug, Clone, Default)]
pub struct FeedbackEffects {
    active: Vec<TimedEffect>,
}

impl FeedbackEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, kind: EffectKind, duration: f32) {
        self.active.retain(|e| e.kind != kind);
        self.active.push(TimedEffect::new(kind, duration));
    }

    pub fn tick(&mut self, dt: f32) {
        for effect in &mut self.active {
            effect.tick(dt);
        }
        self.active.retain(|e| !e.is_finished());
    }

    pub fn get(&self, kind: EffectKind) -> Option<&TimedEffect> {
        self.active.iter().find(|e| e.kind == kind)
    }

    pub fn is_active(&self, kind: EffectKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_fades_and_expires() {
        let mut fx = FeedbackEffects::new();
        fx.start(EffectKind::InvalidFlash, 0.5);
        fx.tick(0.25);
        let flash = fx.get(EffectKind::InvalidFlash).unwrap();
        assert!((flash.intensity() - 0.5).abs() < 1e-5);
        fx.tick(0.3);
        assert!(!fx.is_active(EffectKind::InvalidFlash));
    }

    #[test]
    fn restart_replaces_running_effect() {
        let mut fx = FeedbackEffects::new();
        fx.start(EffectKind::Shake, 1.0);
        fx.tick(0.9);
        fx.start(EffectKind::Shake, 1.0);
        fx.tick(0.2);
        assert!(fx.is_active(EffectKind::Shake));
        assert_eq!(fx.get(EffectKind::Shake).unwrap().elapsed, 0.2);
    }
}
