//! Stub module synthesis
//!
//! Each external request is replaced in the bundler's graph by a tiny stub
//! module whose only content re-exports a placeholder variable. The envelope's
//! setters assign that variable once the loader has resolved the real module.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use log::{debug, trace, warn};
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::{
    error::{Error, Result},
    naming::{NameAllocator, local_binding},
};

type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Prefix of the paths handed out by the in-memory store
pub const VIRTUAL_PREFIX: &str = "sysreg-virtual:/stubs/";

/// An external request and the stub standing in for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalModuleBinding {
    /// The import string exactly as written in source
    pub request: String,
    /// Identifier derived from the request, unique within the build
    pub derived_name: String,
    /// Where the stub module lives
    pub stub_path: PathBuf,
}

impl ExternalModuleBinding {
    /// Local variable the envelope assigns and the stub re-exports
    pub fn local_name(&self) -> String {
        local_binding(&self.derived_name)
    }
}

/// Render the source of a stub module
pub fn stub_source(binding: &ExternalModuleBinding) -> String {
    format!("module.exports = {};\n", binding.local_name())
}

/// Which kind of store a build uses for its stubs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StubStoreKind {
    /// Stubs only exist in memory; the host loads them through [`StubStore::read`]
    #[default]
    Virtual,
    /// Stubs are written to a temporary directory removed at the end of the build
    TempDir,
}

/// Files written into a caller-chosen directory, removed on drop unless kept
#[derive(Debug)]
pub struct WrittenFiles {
    root: PathBuf,
    written: Vec<PathBuf>,
}

impl WrittenFiles {
    fn remove_all(&mut self) -> io::Result<()> {
        for path in self.written.drain(..) {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn keep(mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.written)
    }
}

impl Drop for WrittenFiles {
    fn drop(&mut self) {
        for path in self.written.drain(..) {
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove stub {}: {e}", path.display());
            }
        }
    }
}

fn create_new(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

/// Build-scoped storage for synthesized stub modules
#[derive(Debug)]
pub enum StubStore {
    Virtual(FxIndexMap<PathBuf, String>),
    TempDir(TempDir),
    Directory(WrittenFiles),
}

impl StubStore {
    pub fn create(kind: StubStoreKind) -> Result<Self> {
        match kind {
            StubStoreKind::Virtual => Ok(Self::Virtual(FxIndexMap::default())),
            StubStoreKind::TempDir => {
                let dir = tempfile::Builder::new().prefix("sysreg-stubs-").tempdir()?;
                debug!("Created stub directory {}", dir.path().display());
                Ok(Self::TempDir(dir))
            }
        }
    }

    pub fn in_directory(root: impl Into<PathBuf>) -> Self {
        Self::Directory(WrittenFiles {
            root: root.into(),
            written: Vec::new(),
        })
    }

    fn locate(&self, file_name: &str) -> PathBuf {
        match self {
            Self::Virtual(_) => PathBuf::from(format!("{VIRTUAL_PREFIX}{file_name}")),
            Self::TempDir(dir) => dir.path().join(file_name),
            Self::Directory(files) => files.root.join(file_name),
        }
    }

    /// Store a new stub at `path`
    ///
    /// On disk the file must not exist yet; a file this store did not create is
    /// never overwritten, and only files it created are removed later.
    fn write(&mut self, path: &Path, contents: String) -> io::Result<()> {
        match self {
            Self::Virtual(files) => {
                files.insert(path.to_path_buf(), contents);
                Ok(())
            }
            Self::TempDir(_) => create_new(path)?.write_all(contents.as_bytes()),
            Self::Directory(files) => {
                let mut file = create_new(path)?;
                files.written.push(path.to_path_buf());
                file.write_all(contents.as_bytes())
            }
        }
    }

    /// Source of a stub, for hosts that load modules through a callback
    pub fn read(&self, path: &Path) -> Option<String> {
        match self {
            Self::Virtual(files) => files.get(path).cloned(),
            Self::TempDir(_) | Self::Directory(_) => fs::read_to_string(path).ok(),
        }
    }

    /// Number of artifacts currently held
    pub fn artifact_count(&self) -> usize {
        match self {
            Self::Virtual(files) => files.len(),
            Self::TempDir(dir) => fs::read_dir(dir.path()).map_or(0, Iterator::count),
            Self::Directory(files) => files.written.len(),
        }
    }

    /// Remove every artifact this store created
    pub fn teardown(self) -> io::Result<()> {
        match self {
            Self::Virtual(_) => Ok(()),
            Self::TempDir(dir) => {
                debug!("Removing stub directory {}", dir.path().display());
                dir.close()
            }
            Self::Directory(mut files) => files.remove_all(),
        }
    }

    /// Keep directory stubs on disk and return their paths
    ///
    /// Temporary directories are always removed, so they persist nothing.
    pub fn persist(self) -> Vec<PathBuf> {
        match self {
            Self::Virtual(_) | Self::TempDir(_) => Vec::new(),
            Self::Directory(files) => files.keep(),
        }
    }
}

/// Creates at most one binding and one artifact per distinct request
#[derive(Debug)]
pub struct StubSynthesizer {
    bindings: FxIndexMap<String, ExternalModuleBinding>,
    names: NameAllocator,
    store: StubStore,
}

impl StubSynthesizer {
    pub fn new(store: StubStore) -> Self {
        Self {
            bindings: FxIndexMap::default(),
            names: NameAllocator::new(),
            store,
        }
    }

    /// Get or create the binding for `request`
    ///
    /// The cache is consulted before anything is written, so repeated
    /// resolution of one request never produces a second artifact.
    pub fn synthesize(&mut self, request: &str) -> Result<&ExternalModuleBinding> {
        if let Some(index) = self.bindings.get_index_of(request) {
            trace!("Reusing stub for '{request}'");
            return Ok(&self.bindings[index]);
        }

        let derived_name = self.names.allocate(request);
        let stub_path = self.store.locate(&format!("{derived_name}.js"));
        let binding = ExternalModuleBinding {
            request: request.to_owned(),
            derived_name,
            stub_path,
        };
        self.store
            .write(&binding.stub_path, stub_source(&binding))
            .map_err(|source| Error::Resolution {
                request: request.to_owned(),
                path: binding.stub_path.clone(),
                source,
            })?;

        debug!(
            "Synthesized stub for '{request}' as '{}' at {}",
            binding.derived_name,
            binding.stub_path.display()
        );

        let (index, _) = self.bindings.insert_full(request.to_owned(), binding);
        Ok(&self.bindings[index])
    }

    pub fn get(&self, request: &str) -> Option<&ExternalModuleBinding> {
        self.bindings.get(request)
    }

    /// Find the binding whose stub lives at `path`
    pub fn by_stub_path(&self, path: &Path) -> Option<&ExternalModuleBinding> {
        self.bindings.values().find(|binding| binding.stub_path == path)
    }

    /// Bindings in the order they were first created
    pub fn bindings(&self) -> impl ExactSizeIterator<Item = &ExternalModuleBinding> {
        self.bindings.values()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn store(&self) -> &StubStore {
        &self.store
    }

    pub fn into_store(self) -> StubStore {
        self.store
    }
}
