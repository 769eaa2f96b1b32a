// THEORY:
// The `ZoneTriggerEngine` turns a stream of foreground masks into discrete
// button presses. It is the only stateful part of detection: one confidence
// accumulator per zone.
//
// Key architectural principles:
// 1.  **Motion Mass**: Each tick, a zone "sees motion" when the number of
//     foreground pixels inside it is strictly greater than a fixed fraction of its
//     area. Parts of a zone hanging off the frame count as still pixels.
// 2.  **Asymmetric Hysteresis**: Motion adds `accumulation_rate`, stillness removes
//     `decay_rate` (floored at zero). Decay is faster than growth so flicker cannot
//     creep a zone towards its threshold.
// 3.  **Edge-Triggered Dispatch**: A zone fires when its accumulator goes strictly
//     above `trigger_threshold`, and the accumulator is then reset to zero no
//     matter what the command does. A second firing needs fresh sustained motion.
// 4.  **Name-Bound Commands**: The engine reports which zone fired; the zone's
//     name is matched exactly against known commands. Unknown names fire with no
//     bound effect. Zones that share a name keep separate accumulators and fire
//     independently.

use crate::config::TriggerParams;
use crate::core_modules::morphology::count_nonzero_in;
use crate::core_modules::zone::{Zone, ZoneRegistry};
use image::GrayImage;
use tracing::info;

/// A command a zone can be bound to through its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Ends the session.
    Exit,
    /// Hands the current raw frame to the photo writer.
    Capture,
}

impl Command {
    /// Exact, case-sensitive match of a zone name against command names.
    pub fn from_zone_name(name: &str) -> Option<Self> {
        match name {
            "Exit" => Some(Command::Exit),
            "Capture" => Some(Command::Capture),
            _ => None,
        }
    }
}

/// A single firing of a zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub zone_index: usize,
    pub zone_name: String,
    pub command: Option<Command>,
}

pub struct ZoneTriggerEngine {
    params: TriggerParams,
    accumulators: Vec<u32>,
}

impl ZoneTriggerEngine {
    pub fn new(params: TriggerParams, zone_count: usize) -> Self {
        Self {
            params,
            accumulators: vec![0; zone_count],
        }
    }

    pub fn accumulators(&self) -> &[u32] {
        &self.accumulators
    }

    /// Zeroes every accumulator and resizes to `zone_count`.
    pub fn reset(&mut self, zone_count: usize) {
        self.accumulators.clear();
        self.accumulators.resize(zone_count, 0);
    }

    /// Whether `zone` has enough foreground in `mask` to count as motion.
    pub fn zone_has_motion(&self, mask: &GrayImage, zone: &Zone) -> bool {
        let mass = zone
            .clip_to(mask.width(), mask.height())
            .map(|window| count_nonzero_in(mask, window))
            .unwrap_or(0);
        mass as f64 > self.params.motion_area_fraction * zone.area() as f64
    }

    /// Advances one accumulator by one tick. Returns `true` if it fired, in which
    /// case the accumulator is already back at zero.
    pub fn step(&mut self, index: usize, motion: bool) -> bool {
        let Some(acc) = self.accumulators.get_mut(index) else {
            return false;
        };
        *acc = if motion {
            acc.saturating_add(self.params.accumulation_rate)
        } else {
            acc.saturating_sub(self.params.decay_rate)
        };
        if *acc > self.params.trigger_threshold {
            *acc = 0;
            return true;
        }
        false
    }

    /// Runs one detection tick over all zones, in registry order.
    pub fn update(&mut self, mask: &GrayImage, zones: &ZoneRegistry) -> Vec<TriggerEvent> {
        if self.accumulators.len() != zones.len() {
            self.reset(zones.len());
        }
        let mut events = Vec::new();
        for (index, zone) in zones.list().iter().enumerate() {
            let motion = self.zone_has_motion(mask, zone);
            if self.step(index, motion) {
                info!(zone = %zone.name, index, "zone triggered");
                events.push(TriggerEvent {
                    zone_index: index,
                    zone_name: zone.name.clone(),
                    command: Command::from_zone_name(&zone.name),
                });
            }
        }
        events
    }

    /// Per-zone fill fraction `min(acc / threshold, 1.0)`.
    pub fn progress(&self) -> Vec<f64> {
        let threshold = self.params.trigger_threshold.max(1) as f64;
        self.accumulators
            .iter()
            .map(|&acc| (acc as f64 / threshold).min(1.0))
            .collect()
    }
}
