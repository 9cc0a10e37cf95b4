// THEORY:
// The control surface (buttons in a panel, a key binding, a network command)
// and the render loop are different actors. The selector is the only thing they
// share: an `Effect` stored in an atomic byte. Any clone of `EffectSelector` can
// switch effects at any time; the render loop reads the current value once per
// frame, so a switch always lands between two frames, never inside one.

use crate::core_modules::effects::{self, EffectRun};
use crate::core_modules::frame::frame::FrameBuffer;
use crate::error::GlitchError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::info;

/// One of the eight glitch effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Effect {
    #[default]
    SplitRgb1 = 0,
    SplitRgb2 = 1,
    ScanLine = 2,
    Sand = 3,
    Block1 = 4,
    Block2 = 5,
    DigitalStripe = 6,
    IntDigitalStripe = 7,
}

impl Effect {
    /// Every effect, in control-panel order.
    pub const ALL: [Effect; 8] = [
        Effect::SplitRgb1,
        Effect::SplitRgb2,
        Effect::ScanLine,
        Effect::Sand,
        Effect::Block1,
        Effect::Block2,
        Effect::DigitalStripe,
        Effect::IntDigitalStripe,
    ];

    /// Stable machine identifier.
    pub fn id(self) -> &'static str {
        match self {
            Effect::SplitRgb1 => "split_rgb1",
            Effect::SplitRgb2 => "split_rgb2",
            Effect::ScanLine => "scan_line",
            Effect::Sand => "sand",
            Effect::Block1 => "block1",
            Effect::Block2 => "block2",
            Effect::DigitalStripe => "digital_stripe",
            Effect::IntDigitalStripe => "int_digital_stripe",
        }
    }

    /// Human-readable label, as shown on a control panel.
    pub fn label(self) -> &'static str {
        match self {
            Effect::SplitRgb1 => "RGB Split V1",
            Effect::SplitRgb2 => "RGB Split V2",
            Effect::ScanLine => "Scan Line",
            Effect::Sand => "Sand",
            Effect::Block1 => "Block V1",
            Effect::Block2 => "Block V2",
            Effect::DigitalStripe => "Digital Stripe",
            Effect::IntDigitalStripe => "Intermediate Stripe",
        }
    }

    /// The effect after this one, wrapping to the first.
    pub fn next(self) -> Effect {
        Effect::ALL[(self as usize + 1) % Effect::ALL.len()]
    }

    fn from_index(index: u8) -> Option<Effect> {
        Effect::ALL.get(index as usize).copied()
    }

    /// Renders `input` into `out` with this effect.
    pub fn apply(self, run: &EffectRun<'_>, out: &mut FrameBuffer, input: &FrameBuffer, intensity: f32) {
        match self {
            Effect::SplitRgb1 => effects::split_rgb1(run, out, input, intensity),
            Effect::SplitRgb2 => effects::split_rgb2(run, out, input, intensity),
            Effect::ScanLine => effects::scan_line(run, out, input, intensity),
            Effect::Sand => effects::sand(run, out, input, intensity),
            Effect::Block1 => effects::block1(run, out, input, intensity),
            Effect::Block2 => effects::block2(run, out, input, intensity),
            Effect::DigitalStripe => effects::digital_stripe(run, out, input, intensity),
            Effect::IntDigitalStripe => effects::int_digital_stripe(run, out, input, intensity),
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Effect {
    type Err = GlitchError;

    /// Accepts an id (`scan_line`), a label (`Scan Line`) or a panel index (`2`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        if let Ok(index) = wanted.parse::<u8>() {
            return Effect::from_index(index).ok_or_else(|| GlitchError::UnknownEffect(s.to_string()));
        }
        Effect::ALL
            .into_iter()
            .find(|effect| effect.id().eq_ignore_ascii_case(wanted) || effect.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| GlitchError::UnknownEffect(s.to_string()))
    }
}

/// A shared handle to the active effect.
#[derive(Debug, Clone, Default)]
pub struct EffectSelector {
    active: Arc<AtomicU8>,
}

impl EffectSelector {
    pub fn new(initial: Effect) -> Self {
        Self {
            active: Arc::new(AtomicU8::new(initial as u8)),
        }
    }

    /// Switches the active effect; takes effect from the next frame.
    pub fn select(&self, effect: Effect) {
        let previous = self.active.swap(effect as u8, Ordering::AcqRel);
        if previous != effect as u8 {
            info!(effect = effect.id(), "effect selected");
        }
    }

    pub fn current(&self) -> Effect {
        Effect::from_index(self.active.load(Ordering::Acquire)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn parses_ids_labels_and_indices() {
        for (index, effect) in Effect::ALL.into_iter().enumerate() {
            assert_eq!(effect.id().parse::<Effect>().unwrap(), effect);
            assert_eq!(effect.label().parse::<Effect>().unwrap(), effect);
            assert_eq!(index.to_string().parse::<Effect>().unwrap(), effect);
        }
        assert_eq!(" SAND ".parse::<Effect>().unwrap(), Effect::Sand);
    }

    #[test]
    fn rejects_unknown_names() {
        assert!(matches!("melt".parse::<Effect>(), Err(GlitchError::UnknownEffect(_))));
        assert!(matches!("8".parse::<Effect>(), Err(GlitchError::UnknownEffect(_))));
    }

    #[test]
    fn next_cycles_through_every_effect() {
        let mut effect = Effect::default();
        for expected in Effect::ALL.iter().cycle().skip(1).take(8) {
            effect = effect.next();
            assert_eq!(effect, *expected);
        }
        assert_eq!(effect, Effect::SplitRgb1);
    }

    #[test]
    fn selection_persists_until_changed() {
        let selector = EffectSelector::new(Effect::Block2);
        assert_eq!(selector.current(), Effect::Block2);
        assert_eq!(selector.current(), Effect::Block2);

        selector.select(Effect::Sand);
        assert_eq!(selector.current(), Effect::Sand);
    }

    #[test]
    fn clones_share_the_selection_across_threads() {
        let selector = EffectSelector::default();
        let remote = selector.clone();

        thread::spawn(move || remote.select(Effect::DigitalStripe))
            .join()
            .unwrap();

        assert_eq!(selector.current(), Effect::DigitalStripe);
    }
}
