//! Drives one detector over a program.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::context::ScanContext;
use crate::detectors::{self, Detector, DetectorError, Granularity};
use crate::ir::{FuncId, Program};
use crate::loops::LoopProvider;
use crate::report::{Finding, FindingSink};
use crate::source::LocationResolver;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Detector(#[from] DetectorError),
}

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Dispatching,
}

/// One scan: a selected detector plus the context it reads.
pub struct Engine<'a> {
    detector: Detector,
    state: EngineState,
    ctx: ScanContext<'a>,
}

impl<'a> Engine<'a> {
    pub fn new(
        detector: Detector,
        program: &'a Program,
        loops: &'a dyn LoopProvider,
        resolver: LocationResolver,
    ) -> Self {
        Self {
            detector,
            state: EngineState::Uninitialized,
            ctx: ScanContext::new(program, loops, resolver),
        }
    }

    /// Like [`Engine::new`], resolving the detector from its identifier.
    pub fn for_bug(
        bug: &str,
        program: &'a Program,
        loops: &'a dyn LoopProvider,
        resolver: LocationResolver,
    ) -> EngineResult<Self> {
        let detector: Detector = bug.parse()?;
        Ok(Self::new(detector, program, loops, resolver))
    }

    pub fn detector(&self) -> Detector {
        self.detector
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn context(&self) -> &ScanContext<'a> {
        &self.ctx
    }

    /// Prepare for dispatch. Per-function detectors get their source files
    /// preloaded; the module-level detector runs here. Repeated calls do nothing.
    pub fn initialize(&mut self, sink: &mut dyn FindingSink) -> EngineResult<()> {
        if self.state == EngineState::Dispatching {
            return Ok(());
        }
        self.state = EngineState::Dispatching;

        if self.detector.is_placeholder() {
            warn!(bug = %self.detector, "detector has no pattern; the scan reports nothing");
        }
        match self.detector.granularity() {
            Granularity::Module => {
                info!(bug = %self.detector, "running module-level detector");
                detectors::run_module(self.detector, &mut self.ctx, sink)?;
            }
            Granularity::PerFunction => {
                let files = self.ctx.preload_sources();
                info!(bug = %self.detector, files, "preloaded source files");
            }
        }
        Ok(())
    }

    /// Dispatch the detector on one function.
    pub fn run_function(&mut self, func: FuncId, sink: &mut dyn FindingSink) -> EngineResult<()> {
        self.initialize(sink)?;
        debug!(function = self.ctx.function_name(func), "scanning function");
        detectors::run_function(self.detector, &mut self.ctx, func, sink)?;
        Ok(())
    }

    /// Initialize, then visit every function in program order.
    pub fn run(&mut self, sink: &mut dyn FindingSink) -> EngineResult<()> {
        self.initialize(sink)?;
        let program = self.ctx.program;
        for (func, _) in program.functions() {
            self.run_function(func, sink)?;
        }
        Ok(())
    }
}

/// Run `detector` over the whole program and collect the findings.
pub fn scan(
    detector: Detector,
    program: &Program,
    loops: &dyn LoopProvider,
    resolver: LocationResolver,
) -> EngineResult<Vec<Finding>> {
    let mut findings = Vec::new();
    Engine::new(detector, program, loops, resolver).run(&mut findings)?;
    Ok(findings)
}
