//! Resolution interception
//!
//! Two hooks around the bundler's request resolution: before resolution an
//! external request is pointed at its stub, after resolution the module's
//! resource is forced back onto the stub in case a cache or alias moved it.

use std::path::{Path, PathBuf};

use log::trace;

use crate::{
    classifier::Classifier,
    error::Result,
    stub::{ExternalModuleBinding, StubSynthesizer},
};

/// A request about to be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    /// What the bundler will resolve; rewritten to the stub path for externals
    pub request: String,
    /// Directory of the importing module
    pub context: PathBuf,
}

impl ResolveRequest {
    pub fn new(request: impl Into<String>, context: impl Into<PathBuf>) -> Self {
        Self {
            request: request.into(),
            context: context.into(),
        }
    }
}

/// A module the bundler has finished resolving
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    /// The request as written at the import site
    pub raw_request: String,
    /// File (or virtual resource) the bundler will load
    pub resource: PathBuf,
}

/// Owns the classifier and the stub bindings of one build
#[derive(Debug)]
pub struct Interceptor {
    classifier: Classifier,
    synthesizer: StubSynthesizer,
}

impl Interceptor {
    pub fn new(classifier: Classifier, synthesizer: StubSynthesizer) -> Self {
        Self {
            classifier,
            synthesizer,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn synthesizer(&self) -> &StubSynthesizer {
        &self.synthesizer
    }

    pub fn synthesizer_mut(&mut self) -> &mut StubSynthesizer {
        &mut self.synthesizer
    }

    pub fn into_synthesizer(self) -> StubSynthesizer {
        self.synthesizer
    }

    /// Point an external request at its stub
    ///
    /// A request that already names a stub is passed through untouched, so
    /// the bundler may run this hook any number of times.
    pub fn before_resolve(&mut self, mut request: ResolveRequest) -> Result<ResolveRequest> {
        if self
            .synthesizer
            .by_stub_path(Path::new(&request.request))
            .is_some()
        {
            trace!("'{}' already points at a stub", request.request);
            return Ok(request);
        }
        if !self.classifier.is_external(&request.request) {
            return Ok(request);
        }

        let binding = self.synthesizer.synthesize(&request.request)?;
        trace!(
            "Redirecting '{}' to {}",
            request.request,
            binding.stub_path.display()
        );
        request.request = binding.stub_path.to_string_lossy().into_owned();
        Ok(request)
    }

    /// Callback form of [`Self::before_resolve`] for hosts that resolve through continuations
    ///
    /// `done` is consumed, so it runs exactly once, with either the rewritten
    /// request or the error that aborts the build.
    pub fn before_resolve_with<F>(&mut self, request: ResolveRequest, done: F)
    where
        F: FnOnce(Result<ResolveRequest>),
    {
        done(self.before_resolve(request));
    }

    /// Force the resource of an external module onto its stub
    pub fn after_resolve(&self, mut module: ResolvedModule) -> ResolvedModule {
        if let Some(binding) = self.binding_for(&module.raw_request) {
            if module.resource != binding.stub_path {
                trace!(
                    "Resetting resource of '{}' from {} to {}",
                    module.raw_request,
                    module.resource.display(),
                    binding.stub_path.display()
                );
                module.resource.clone_from(&binding.stub_path);
            }
        }
        module
    }

    fn binding_for(&self, raw_request: &str) -> Option<&ExternalModuleBinding> {
        self.synthesizer
            .get(raw_request)
            .or_else(|| self.synthesizer.by_stub_path(Path::new(raw_request)))
    }
}
