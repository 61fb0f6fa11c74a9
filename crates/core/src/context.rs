use crate::detectors::DetectorError;
use crate::ir::{BlockId, FuncId, InstId, Program, ValueRef};
use crate::loops::{LoopForest, LoopProvider};
use crate::query::{self, TypeNames};
use crate::report::SourceSite;
use crate::source::{LocationResolver, SourceCache, SourceLocation};

/// Everything a detector reads during a run.
///
/// The program and loop facts are borrowed read-only; the source cache and
/// type names are owned here and live as long as the run.
pub struct ScanContext<'a> {
    pub program: &'a Program,
    pub loops: &'a dyn LoopProvider,
    pub resolver: LocationResolver,
    pub sources: SourceCache,
    pub types: TypeNames,
}

impl<'a> ScanContext<'a> {
    pub fn new(
        program: &'a Program,
        loops: &'a dyn LoopProvider,
        resolver: LocationResolver,
    ) -> Self {
        Self {
            program,
            loops,
            resolver,
            sources: SourceCache::new(),
            types: TypeNames::for_program(program),
        }
    }

    /// Load every file named by any instruction's debug location.
    pub fn preload_sources(&mut self) -> usize {
        for inst in self.program.all_instructions() {
            if let Ok(loc) = self.resolver.resolve(self.program, inst) {
                self.sources.load(&loc.path);
            }
        }
        self.sources.len()
    }

    /// Resolved location, or `None` when the instruction has no debug info.
    pub fn location(&self, inst: InstId) -> Option<SourceLocation> {
        self.resolver.resolve(self.program, inst).ok()
    }

    /// Resolved location of an instruction a finding is being built for.
    pub fn require_location(
        &self,
        func: FuncId,
        inst: InstId,
    ) -> Result<SourceLocation, DetectorError> {
        self.resolver.resolve(self.program, inst).map_err(|_| DetectorError::MissingDebugInfo {
            function: self.program.function(func).name.clone(),
            instruction: inst,
        })
    }

    /// Location plus source text of an instruction that must have debug info.
    pub fn site(&mut self, func: FuncId, inst: InstId) -> Result<SourceSite, DetectorError> {
        let location = self.require_location(func, inst)?;
        Ok(self.site_at(location))
    }

    pub fn site_at(&mut self, location: SourceLocation) -> SourceSite {
        let text = self.sources.line_at(&location.path, location.line);
        SourceSite { location, text }
    }

    /// Callee name, or the call's source text for indirect calls.
    pub fn call_name(&mut self, inst: InstId) -> String {
        query::call_name(self.program, &self.resolver, &mut self.sources, inst)
    }

    /// Canonical type text of a value.
    pub fn type_signature(&self, value: ValueRef) -> String {
        self.types.type_signature(self.program, value)
    }

    pub fn forest(&self, func: FuncId) -> &'a LoopForest {
        let loops: &'a dyn LoopProvider = self.loops;
        loops.loops_for(func)
    }

    pub fn block_of(&self, inst: InstId) -> BlockId {
        self.program.parent(inst)
    }

    pub fn function_name(&self, func: FuncId) -> &'a str {
        let program: &'a Program = self.program;
        &program.function(func).name
    }
}
