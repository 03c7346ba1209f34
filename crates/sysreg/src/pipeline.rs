//! The build pipeline
//!
//! A [`Pipeline`] is created per build from validated options and driven
//! through its stages by the host adapter:
//!
//! 1. `before_resolve` / `after_resolve` for every import site
//! 2. `seal` once the module graph is final
//! 3. `compose` once the chunks are emitted
//! 4. `finish` to tear down the stub store
//!
//! Nothing is shared between pipelines; two builds running side by side each
//! own their options, bindings and stubs.

use log::{debug, info};

use crate::{
    compositor::{Assets, Chunk, Compositor},
    config::ValidatedOptions,
    entry::{SealedModule, mark_entry_modules},
    envelope::Envelope,
    error::Result,
    interceptor::{Interceptor, ResolveRequest, ResolvedModule},
    stub::{ExternalModuleBinding, StubStore, StubSynthesizer},
};

/// What a finished build leaves behind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Bindings in declaration order
    pub bindings: Vec<ExternalModuleBinding>,
    /// Entries whose exports are forwarded
    pub forwarded_entries: Vec<String>,
    /// Number of emitted files wrapped in an envelope
    pub wrapped_files: usize,
}

#[derive(Debug)]
pub struct Pipeline {
    options: ValidatedOptions,
    interceptor: Interceptor,
    summary: BuildSummary,
}

impl Pipeline {
    /// Create a pipeline with the store kind named in the options
    pub fn new(options: ValidatedOptions) -> Result<Self> {
        let store = StubStore::create(options.stub_store)?;
        Self::with_store(options, store)
    }

    /// Create a pipeline around a caller-provided stub store
    ///
    /// Literal dependencies are bound up front, in configuration order, so the
    /// envelope declares them even if no module ends up importing them.
    pub fn with_store(options: ValidatedOptions, store: StubStore) -> Result<Self> {
        let mut synthesizer = StubSynthesizer::new(store);
        for request in options.literal_dependencies() {
            synthesizer.synthesize(request)?;
        }
        debug!(
            "Pipeline ready with {} rule(s) and {} pre-bound dependency(ies)",
            options.classifier.rules().len(),
            synthesizer.len()
        );
        let interceptor = Interceptor::new(options.classifier.clone(), synthesizer);
        Ok(Self {
            options,
            interceptor,
            summary: BuildSummary::default(),
        })
    }

    pub fn options(&self) -> &ValidatedOptions {
        &self.options
    }

    /// Stage 1a: is `request` satisfied by the loader?
    pub fn classify(&self, request: &str) -> bool {
        self.interceptor.classifier().is_external(request)
    }

    /// Stage 1b: binding for an external request, created on first use
    pub fn synthesize(&mut self, request: &str) -> Result<&ExternalModuleBinding> {
        self.interceptor.synthesizer_mut().synthesize(request)
    }

    pub fn before_resolve(&mut self, request: ResolveRequest) -> Result<ResolveRequest> {
        self.interceptor.before_resolve(request)
    }

    pub fn before_resolve_with<F>(&mut self, request: ResolveRequest, done: F)
    where
        F: FnOnce(Result<ResolveRequest>),
    {
        self.interceptor.before_resolve_with(request, done);
    }

    pub fn after_resolve(&self, module: ResolvedModule) -> ResolvedModule {
        self.interceptor.after_resolve(module)
    }

    /// Source of a synthesized stub, for hosts that load virtual modules
    pub fn stub_source(&self, path: &std::path::Path) -> Option<String> {
        self.interceptor.synthesizer().store().read(path)
    }

    pub fn bindings(&self) -> impl ExactSizeIterator<Item = &ExternalModuleBinding> {
        self.interceptor.synthesizer().bindings()
    }

    /// Stage 2: append export forwarding to the configured entry modules
    pub fn seal(&mut self, modules: &mut [SealedModule]) -> Result<&[String]> {
        let Some(entries) = &self.options.entry else {
            debug!("No entries configured; nothing to forward");
            return Ok(&[]);
        };
        let matched = mark_entry_modules(entries, modules, self.options.strict_entries)?;
        self.summary.forwarded_entries = matched;
        Ok(&self.summary.forwarded_entries)
    }

    /// The envelope for the bindings created so far
    pub fn envelope(&self) -> Envelope {
        Envelope {
            register_name: self.options.register_name.clone(),
            interop: self.options.interop,
            public_path: self.options.public_path,
            minify: self.options.minify,
            ..Envelope::new(self.bindings())
        }
    }

    pub fn compositor(&self) -> Compositor {
        Compositor::new(
            self.envelope(),
            Some(self.options.bootstrap_pattern.clone()),
        )
    }

    /// Stage 3: wrap every initial chunk
    pub fn compose(&mut self, chunks: &[Chunk], assets: &mut Assets) -> Result<usize> {
        let wrapped = self.compositor().compose(chunks, assets)?;
        self.summary.wrapped_files += wrapped;
        Ok(wrapped)
    }

    /// Stage 4: remove the stubs and report what the build did
    pub fn finish(self) -> Result<BuildSummary> {
        let Self {
            interceptor,
            mut summary,
            ..
        } = self;
        let synthesizer = interceptor.into_synthesizer();
        summary.bindings = synthesizer.bindings().cloned().collect();
        synthesizer.into_store().teardown()?;

        info!(
            "Registered {} external dependency(ies), forwarded {} entry(ies), wrapped {} file(s)",
            summary.bindings.len(),
            summary.forwarded_entries.len(),
            summary.wrapped_files
        );
        Ok(summary)
    }
}
