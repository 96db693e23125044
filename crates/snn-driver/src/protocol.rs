//! Bit-serial protocol state machine
//!
//! The driver owns frame construction for one scenario. It never waits on
//! anything itself: an external loop calls [`ProtocolDriver::next_frame`]
//! before each clock edge and [`ProtocolDriver::observe`] after it, or lets
//! [`ProtocolDriver::step`] do both against a [`ClockedDevice`].
//!
//! ```text
//! RESET (hold n_reset low, then release until ready)
//!   → { SETUP_WEIGHTS | SETUP_INPUT | IDLE }*
//!   → EXECUTE (capture one sample per edge)
//!   → (more setup / execute) or DONE
//! ```
//!
//! Every failure aborts the scenario. Nothing resumes mid-sequence; callers
//! rerun from RESET.

use crate::device::ClockedDevice;
use crate::error::{Result, SnnError};
use crate::frame::{OutputSample, ProtocolFrame, DONT_CARE};
use snn_chip::bus::{BusLayout, Mode, OutputLayout};
use snn_chip::timing;
use std::fmt;
use tracing::{debug, info};

/// Protocol phase, as reported in failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Reset held low, then released until the device reports ready
    Reset,
    /// Loading weight words
    SetupWeights,
    /// Loading input words
    SetupInput,
    /// Quiescent hold
    Idle,
    /// Neuron array running, outputs captured
    Execute,
    /// No further bus activity
    Done,
}

impl Phase {
    /// Bus mode driven during this phase, if any.
    pub const fn mode(self) -> Option<Mode> {
        match self {
            Self::SetupWeights => Some(Mode::SetupWeights),
            Self::SetupInput => Some(Mode::SetupInput),
            Self::Idle => Some(Mode::Idle),
            Self::Execute => Some(Mode::Execute),
            Self::Reset | Self::Done => None,
        }
    }

    /// True for the two configuration-loading phases.
    pub const fn is_setup(self) -> bool {
        matches!(self, Self::SetupWeights | Self::SetupInput)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reset => write!(f, "RESET"),
            Self::SetupWeights => write!(f, "SETUP_WEIGHTS"),
            Self::SetupInput => write!(f, "SETUP_INPUT"),
            Self::Idle => write!(f, "IDLE"),
            Self::Execute => write!(f, "EXECUTE"),
            Self::Done => write!(f, "DONE"),
        }
    }
}

/// Edge budgets for the reset and settle rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolTiming {
    /// Edges reset is held before release.
    pub reset_cycles: u32,
    /// Minimum idle edges between the last SETUP edge and the next EXECUTE edge.
    pub settle_cycles: u32,
    /// Release edges allowed before the device must report ready.
    pub ready_timeout_cycles: u32,
}

impl ProtocolTiming {
    /// Check the budgets are usable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if any budget is below its floor.
    pub fn validate(&self) -> Result<()> {
        if self.reset_cycles == 0 {
            return Err(SnnError::invalid_parameter("reset_cycles must be at least 1"));
        }
        if self.settle_cycles < timing::MIN_SETTLE_CYCLES {
            return Err(SnnError::invalid_parameter(format!(
                "settle_cycles must be at least {}",
                timing::MIN_SETTLE_CYCLES
            )));
        }
        if self.ready_timeout_cycles == 0 {
            return Err(SnnError::invalid_parameter("ready_timeout_cycles must be at least 1"));
        }
        Ok(())
    }
}

impl Default for ProtocolTiming {
    fn default() -> Self {
        Self {
            reset_cycles: timing::RESET_CYCLES,
            settle_cycles: timing::MIN_SETTLE_CYCLES,
            ready_timeout_cycles: timing::DEFAULT_READY_TIMEOUT_CYCLES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Load { phase: Phase, words: Vec<u32> },
    Idle(u32),
    Execute(usize),
}

impl Segment {
    const fn phase(&self) -> Phase {
        match self {
            Self::Load { phase, .. } => *phase,
            Self::Idle(_) => Phase::Idle,
            Self::Execute(_) => Phase::Execute,
        }
    }

    fn cycles(&self) -> u64 {
        match self {
            Self::Load { words, .. } => words.len() as u64,
            Self::Idle(n) => u64::from(*n),
            Self::Execute(n) => *n as u64,
        }
    }
}

/// Ordered post-reset segments of a scenario.
///
/// Reset always comes first and is not listed here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sequence {
    segments: Vec<Segment>,
}

impl Sequence {
    /// Empty sequence (reset only).
    pub fn new() -> Self {
        Self::default()
    }

    /// `SETUP_WEIGHTS → IDLE(settle) → SETUP_INPUT → IDLE(settle) → EXECUTE`.
    pub fn standard(weights: Vec<u32>, input: Vec<u32>, settle: u32, execute: usize) -> Self {
        Self::new()
            .weights(weights)
            .idle(settle)
            .input(input)
            .idle(settle)
            .execute(execute)
    }

    /// Shift weight words in, one per edge.
    #[must_use]
    pub fn weights(self, words: impl Into<Vec<u32>>) -> Self {
        self.push(Segment::Load {
            phase: Phase::SetupWeights,
            words: words.into(),
        })
    }

    /// Shift input words in, one per edge.
    #[must_use]
    pub fn input(self, words: impl Into<Vec<u32>>) -> Self {
        self.push(Segment::Load {
            phase: Phase::SetupInput,
            words: words.into(),
        })
    }

    /// Hold for `cycles` edges. Zero is a no-op.
    #[must_use]
    pub fn idle(self, cycles: u32) -> Self {
        if cycles == 0 {
            return self;
        }
        self.push(Segment::Idle(cycles))
    }

    /// Run the neuron array for `cycles` edges, capturing every one.
    #[must_use]
    pub fn execute(self, cycles: usize) -> Self {
        self.push(Segment::Execute(cycles))
    }

    /// Total execute edges, i.e. the number of samples a clean run captures.
    pub fn execute_cycles(&self) -> usize {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Execute(n) => *n,
                _ => 0,
            })
            .sum()
    }

    /// Edges after reset release.
    pub fn cycles(&self) -> u64 {
        self.segments.iter().map(Segment::cycles).sum()
    }

    /// Phases in order, one entry per segment.
    pub fn phases(&self) -> Vec<Phase> {
        self.segments.iter().map(Segment::phase).collect()
    }

    fn push(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    /// Static checks: payload fits the data field, no empty segments, and
    /// every EXECUTE following a SETUP is preceded by enough idle edges.
    fn check(&self, layout: &BusLayout, timing: &ProtocolTiming) -> Result<()> {
        let mut cycle = u64::from(timing.reset_cycles) + 1;
        let mut idle_since_setup: Option<u32> = None;

        for segment in &self.segments {
            let phase = segment.phase();
            match segment {
                Segment::Load { words, .. } => {
                    if words.is_empty() {
                        return Err(SnnError::violation(phase, cycle, "no words to load"));
                    }
                    if let Some(w) = words.iter().find(|&&w| u64::from(w) > layout.data_mask()) {
                        return Err(SnnError::violation(
                            phase,
                            cycle,
                            format!("word {w:#x} exceeds the {}-bit data field", layout.data_width),
                        ));
                    }
                }
                Segment::Idle(n) => {
                    idle_since_setup = idle_since_setup.map(|k| k.saturating_add(*n));
                }
                Segment::Execute(n) => {
                    if *n == 0 {
                        return Err(SnnError::violation(phase, cycle, "zero-length execute"));
                    }
                    if let Some(k) = idle_since_setup {
                        if k < timing.settle_cycles {
                            return Err(SnnError::violation(
                                phase,
                                cycle,
                                format!(
                                    "{k} idle cycles after setup, need at least {}",
                                    timing.settle_cycles
                                ),
                            ));
                        }
                    }
                    idle_since_setup = None;
                }
            }
            if phase.is_setup() {
                idle_since_setup = Some(0);
            }
            cycle += segment.cycles();
        }
        Ok(())
    }
}

/// Output samples of a finished scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// One sample per execute edge, in order.
    pub samples: Vec<OutputSample>,
    /// Bus words driven, one per edge.
    pub bus: Vec<u64>,
    /// Output bit assignment used to decode the samples.
    pub output_layout: OutputLayout,
}

impl Capture {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total edges driven, reset included.
    pub fn cycles(&self) -> usize {
        self.bus.len()
    }

    /// Spike train of neuron `index`.
    pub fn spikes(&self, index: usize) -> Vec<bool> {
        self.samples
            .iter()
            .map(|s| s.spike(&self.output_layout, index))
            .collect()
    }

    /// PWM pin samples, if the layout has the pin.
    pub fn pwm(&self) -> Option<Vec<bool>> {
        self.samples
            .iter()
            .map(|s| s.pwm(&self.output_layout))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Hold(u32),
    Release(u32),
    Running { index: usize, offset: u64 },
    Done,
    Aborted(Phase),
}

/// Drives one device through one scenario.
#[derive(Debug)]
pub struct ProtocolDriver {
    layout: BusLayout,
    output_layout: OutputLayout,
    timing: ProtocolTiming,
    sequence: Sequence,
    state: State,
    cycle: u64,
    in_flight: Option<u64>,
    last_word: u64,
    bus: Vec<u64>,
    samples: Vec<OutputSample>,
    segment_samples: usize,
}

impl ProtocolDriver {
    /// Create a driver for `sequence` on a die with `layout`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for an unusable layout or timing, and
    /// `ProtocolViolation` if the sequence breaks the settle rule or carries
    /// words wider than the data field.
    pub fn new(layout: BusLayout, timing: ProtocolTiming, sequence: Sequence) -> Result<Self> {
        layout.validate().map_err(SnnError::invalid_parameter)?;
        timing.validate()?;
        sequence.check(&layout, &timing)?;

        Ok(Self {
            layout,
            output_layout: OutputLayout::default(),
            timing,
            sequence,
            state: State::Hold(0),
            cycle: 0,
            in_flight: None,
            last_word: 0,
            bus: Vec::new(),
            samples: Vec::new(),
            segment_samples: 0,
        })
    }

    /// Decode samples with `layout` instead of spikes-only.
    #[must_use]
    pub fn with_output_layout(mut self, layout: OutputLayout) -> Self {
        self.output_layout = layout;
        self
    }

    /// Bus layout being driven.
    pub const fn layout(&self) -> &BusLayout {
        &self.layout
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        match self.state {
            State::Hold(_) | State::Release(_) => Phase::Reset,
            State::Running { index, .. } => self.sequence.segments[index].phase(),
            State::Done => Phase::Done,
            State::Aborted(phase) => phase,
        }
    }

    /// Edges completed so far.
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// True once the last segment has finished.
    pub const fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Samples captured so far.
    pub fn samples(&self) -> &[OutputSample] {
        &self.samples
    }

    /// Word to present before the next edge, or `None` once DONE.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if the previous word has not been observed
    /// yet, if the scenario was aborted, or if the word would change the mode
    /// field on the reset-release edge.
    pub fn next_frame(&mut self) -> Result<Option<u64>> {
        if self.in_flight.is_some() {
            return Err(self.abort(SnnError::violation(
                self.phase(),
                self.cycle,
                "frame issued twice without a clock edge",
            )));
        }

        let frame = match self.state {
            State::Hold(_) => ProtocolFrame::reset(),
            State::Release(_) => ProtocolFrame::release(),
            State::Running { index, offset } => self.segment_frame(index, offset),
            State::Done => return Ok(None),
            State::Aborted(phase) => {
                return Err(SnnError::violation(
                    phase,
                    self.cycle,
                    "scenario aborted; restart from RESET",
                ))
            }
        };

        let word = frame.encode(&self.layout);
        self.check_transition(word)?;
        self.in_flight = Some(word);
        Ok(Some(word))
    }

    /// Record the device's response to the edge that consumed the last word.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolTimeout` if the device is still not ready when the
    /// release budget runs out, `ShortCapture` if an execute segment ends
    /// with unresolved samples, and `ProtocolViolation` if no word was driven
    /// or the device dropped out of ready mid-scenario.
    pub fn observe(&mut self, output: Option<u64>, ready: bool) -> Result<()> {
        let Some(word) = self.in_flight.take() else {
            return Err(self.abort(SnnError::violation(
                self.phase(),
                self.cycle,
                "edge observed with no frame driven",
            )));
        };
        self.bus.push(word);
        self.last_word = word;
        let cycle = self.cycle;
        self.cycle += 1;

        match self.state {
            State::Hold(edges) => {
                let edges = edges + 1;
                self.state = if edges >= self.timing.reset_cycles {
                    debug!("reset held for {edges} cycles, releasing");
                    State::Release(0)
                } else {
                    State::Hold(edges)
                };
            }
            State::Release(edges) => {
                let edges = edges + 1;
                if ready {
                    debug!("device ready {edges} cycle(s) after release");
                    self.enter(0);
                } else if edges >= self.timing.ready_timeout_cycles {
                    return Err(self.abort(SnnError::ProtocolTimeout {
                        phase: Phase::Reset,
                        cycle,
                        budget: self.timing.ready_timeout_cycles,
                    }));
                } else {
                    self.state = State::Release(edges);
                }
            }
            State::Running { index, offset } => {
                if !ready {
                    return Err(self.abort(SnnError::violation(
                        self.phase(),
                        cycle,
                        "device left the ready state",
                    )));
                }
                let segment = &self.sequence.segments[index];
                if let (Segment::Execute(_), Some(word)) = (segment, output) {
                    self.samples.push(OutputSample {
                        cycle: self.samples.len(),
                        word,
                    });
                    self.segment_samples += 1;
                }

                let offset = offset + 1;
                if offset < segment.cycles() {
                    self.state = State::Running { index, offset };
                    return Ok(());
                }
                if let Segment::Execute(expected) = *segment {
                    if self.segment_samples < expected {
                        let actual = self.segment_samples;
                        return Err(self.abort(SnnError::ShortCapture {
                            phase: Phase::Execute,
                            cycle,
                            expected,
                            actual,
                        }));
                    }
                }
                self.enter(index + 1);
            }
            State::Done | State::Aborted(_) => {}
        }
        Ok(())
    }

    /// Drive one edge on `device`. A no-op once DONE.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`Self::next_frame`] or [`Self::observe`].
    pub fn step<D: ClockedDevice + ?Sized>(&mut self, device: &mut D) -> Result<Phase> {
        if let Some(word) = self.next_frame()? {
            device.drive(word);
            device.clock_edge();
            self.observe(device.output(), device.is_ready())?;
        }
        Ok(self.phase())
    }

    /// Drive `device` from RESET to DONE and hand back the capture.
    ///
    /// # Errors
    ///
    /// Returns the first protocol error; the device is left as-is.
    pub fn run<D: ClockedDevice + ?Sized>(mut self, device: &mut D) -> Result<Capture> {
        info!(
            "Running scenario on {} device: {} execute cycles",
            device.device_kind(),
            self.sequence.execute_cycles()
        );
        while !self.is_done() {
            self.step(device)?;
        }
        info!(
            "Scenario done after {} cycles, {} samples",
            self.cycle,
            self.samples.len()
        );
        self.into_capture()
    }

    /// Samples and bus log of a finished scenario.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` before DONE; partial data is never handed out.
    pub fn into_capture(self) -> Result<Capture> {
        if !self.is_done() {
            return Err(SnnError::violation(
                self.phase(),
                self.cycle,
                "capture requested before DONE",
            ));
        }
        Ok(Capture {
            samples: self.samples,
            bus: self.bus,
            output_layout: self.output_layout,
        })
    }

    fn segment_frame(&self, index: usize, offset: u64) -> ProtocolFrame {
        let segment = &self.sequence.segments[index];
        let data = match segment {
            Segment::Load { words, .. } => usize::try_from(offset)
                .ok()
                .and_then(|i| words.get(i).copied())
                .unwrap_or(DONT_CARE),
            Segment::Idle(_) | Segment::Execute(_) => DONT_CARE,
        };
        match segment.phase().mode() {
            Some(mode) => ProtocolFrame::mode(&self.layout, mode, data),
            None => ProtocolFrame::release(),
        }
    }

    /// One field per edge: the release edge may not also change the mode.
    fn check_transition(&mut self, word: u64) -> Result<()> {
        let prev = self.last_word;
        let releasing = !self.layout.n_reset(prev) && self.layout.n_reset(word);
        if releasing && self.layout.mode_code(word) != self.layout.mode_code(prev) {
            return Err(self.abort(SnnError::violation(
                self.phase(),
                self.cycle,
                "reset release and mode change on the same edge",
            )));
        }
        Ok(())
    }

    fn enter(&mut self, index: usize) {
        let from = self.phase();
        self.segment_samples = 0;
        self.state = if index < self.sequence.segments.len() {
            State::Running { index, offset: 0 }
        } else {
            State::Done
        };
        debug!("{from} -> {} at cycle {}", self.phase(), self.cycle);
    }

    fn abort(&mut self, err: SnnError) -> SnnError {
        self.state = State::Aborted(self.phase());
        self.in_flight = None;
        err
    }
}
