//! Track switch policies
//!
//! Each layer decides once per tick whether its current track must be
//! replaced:
//! - Ambient never switches
//! - Melody switches when too little of its track is left to keep a full
//!   lookahead
//! - Harmony switches on sustained excitation or an excessive heart-rate
//!   swing, once the heart-rate window has filled

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Layer, LayerState};
use crate::config::{HarmonyRules, SessionConfig};
use crate::heart::HeartRateWindow;

/// Why a layer replaced its track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SwitchReason {
    /// Less than two transport windows were left after the cursor
    LookaheadExhausted { remaining_ms: u64 },
    /// Enough above-mean heart-rate ticks accumulated
    SustainedExcitation { count: u32 },
    /// The heart-rate spread exceeded the band's tolerance
    HeartRateSwing { amplitude: u32 },
}

impl fmt::Display for SwitchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchReason::LookaheadExhausted { remaining_ms } => {
                write!(f, "lookahead exhausted ({} ms left)", remaining_ms)
            }
            SwitchReason::SustainedExcitation { count } => {
                write!(f, "sustained excitation ({} ticks above mean)", count)
            }
            SwitchReason::HeartRateSwing { amplitude } => {
                write!(f, "heart-rate swing of {} bpm", amplitude)
            }
        }
    }
}

/// Inputs of one policy evaluation
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext<'a> {
    /// Heart rate of the current tick
    pub heart_rate: u32,
    /// Window already holding the current tick's sample
    pub window: &'a HeartRateWindow,
    pub state: &'a LayerState,
    pub track_duration_ms: u64,
}

/// Result of one policy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyOutcome {
    pub reason: Option<SwitchReason>,
    /// Counter value to keep if the layer does not switch
    pub excitation_counter: u32,
}

impl PolicyOutcome {
    fn keep(excitation_counter: u32) -> Self {
        Self {
            reason: None,
            excitation_counter,
        }
    }

    pub fn should_switch(&self) -> bool {
        self.reason.is_some()
    }
}

/// Switch rule of a layer
#[derive(Debug, Clone, PartialEq)]
pub enum SwitchPolicy {
    /// Keep the track for the whole session
    Fixed,
    /// Switch when at most two transport windows remain after the cursor
    LookaheadExhaustion { transport_ms: u64 },
    /// Switch on excitation or swing once the window spans `slide_window`
    Physiological { slide_window: f64, rules: HarmonyRules },
}

impl SwitchPolicy {
    /// Policy used for `layer` in a session
    pub fn for_layer(layer: Layer, config: &SessionConfig) -> Self {
        match layer {
            Layer::Ambient => SwitchPolicy::Fixed,
            Layer::Melody => SwitchPolicy::LookaheadExhaustion {
                transport_ms: config.transport_ms(),
            },
            Layer::Harmony => SwitchPolicy::Physiological {
                slide_window: config.slide_window,
                rules: config.harmony_rules.clone(),
            },
        }
    }

    /// Decide whether the layer's current track must be replaced
    pub fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyOutcome {
        let counter = ctx.state.excitation_counter;
        match self {
            SwitchPolicy::Fixed => PolicyOutcome::keep(counter),
            SwitchPolicy::LookaheadExhaustion { transport_ms } => {
                match ctx.state.remaining_ms(ctx.track_duration_ms) {
                    Some(remaining_ms) if remaining_ms <= 2 * transport_ms => PolicyOutcome {
                        reason: Some(SwitchReason::LookaheadExhausted { remaining_ms }),
                        excitation_counter: counter,
                    },
                    _ => PolicyOutcome::keep(counter),
                }
            }
            SwitchPolicy::Physiological { slide_window, rules } => {
                if ctx.window.span() < *slide_window {
                    return PolicyOutcome::keep(counter);
                }
                evaluate_physiological(ctx, rules, counter)
            }
        }
    }
}

fn evaluate_physiological(
    ctx: &PolicyContext<'_>,
    rules: &HarmonyRules,
    mut counter: u32,
) -> PolicyOutcome {
    let mut reason = None;

    // The counter only ever grows between switches.
    let above_mean = ctx
        .window
        .mean()
        .map_or(false, |mean| f64::from(ctx.heart_rate) > mean);
    if above_mean {
        counter += 1;
        if counter >= rules.excitation_trigger {
            reason = Some(SwitchReason::SustainedExcitation { count: counter });
            counter = 0;
        }
    }

    if reason.is_none() {
        let amplitude = ctx.window.amplitude_with(ctx.heart_rate);
        if rules.swing_exceeded(ctx.heart_rate, amplitude) {
            reason = Some(SwitchReason::HeartRateSwing { amplitude });
        }
    }

    PolicyOutcome {
        reason,
        excitation_counter: counter,
    }
}
