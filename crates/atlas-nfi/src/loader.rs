//! Dynamic library loading and symbol resolution
//!
//! Provides cross-platform dynamic library loading using `libloading`.
//! Handles platform-specific library naming conventions and search paths.
//!
//! Loaded libraries stay resident until the loader itself is dropped: eager
//! unloading is not offered by this native layer.

use crate::error::{escalate, BridgeError};
use crate::value::RawPointer;
use atlas_config::NfiConfig;
use dashmap::DashMap;
use libloading::Library;
use std::ffi::c_void;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Opaque reference to a loaded library or the process namespace
///
/// Handles are plain identifiers owned by the `LibraryLoader`; copying one
/// does not keep anything alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LibraryHandle(u64);

impl LibraryHandle {
    /// The process's global symbol namespace
    pub const DEFAULT: LibraryHandle = LibraryHandle(0);

    /// Numeric identifier
    pub fn id(&self) -> u64 {
        self.0
    }

    /// Whether this handle denotes the default namespace
    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }
}

impl fmt::LowerHex for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Resolved native entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolHandle {
    library: Option<LibraryHandle>,
    address: RawPointer,
}

impl SymbolHandle {
    /// Wrap an address obtained outside the loader (a callback, a table, a test)
    pub fn from_raw(address: *const c_void) -> Self {
        Self {
            library: None,
            address: RawPointer::from_ptr(address),
        }
    }

    /// Library this symbol was resolved from, if any
    pub fn library(&self) -> Option<LibraryHandle> {
        self.library
    }

    /// Entry point address
    pub fn address(&self) -> RawPointer {
        self.address
    }

    /// Whether the symbol denotes a native null pointer
    pub fn is_null(&self) -> bool {
        self.address.is_null()
    }
}

/// Dynamic library loader with caching and platform-specific path resolution
///
/// Safe for concurrent use: loads and lookups go through sharded maps.
///
/// # Safety
///
/// Loading dynamic libraries is inherently unsafe. The loaded code runs in the
/// same process and can perform arbitrary operations.
pub struct LibraryLoader {
    /// Loaded libraries by handle
    libraries: DashMap<LibraryHandle, Library>,
    /// Handles by resolved path, so loading twice yields the same handle
    by_path: DashMap<PathBuf, LibraryHandle>,
    next_id: AtomicU64,
    /// Library search paths, highest priority first
    search_paths: Vec<PathBuf>,
    isolate: bool,
    lazy_binding: bool,
}

impl LibraryLoader {
    /// Create a loader with default search paths and settings
    pub fn new() -> Self {
        Self::from_config(&NfiConfig::default())
    }

    /// Create a loader from bridge configuration
    ///
    /// Configured search paths are searched before the platform defaults.
    pub fn from_config(config: &NfiConfig) -> Self {
        let mut search_paths = config.search_paths().to_vec();
        search_paths.extend(Self::default_search_paths());

        Self {
            libraries: DashMap::new(),
            by_path: DashMap::new(),
            next_id: AtomicU64::new(1),
            search_paths,
            isolate: config.isolate_libraries(),
            lazy_binding: config.lazy_binding(),
        }
    }

    /// Get platform-specific default library search paths
    ///
    /// Returns standard system library paths for the current platform:
    /// - Linux: /usr/lib, /usr/local/lib, /lib
    /// - macOS: /usr/lib, /usr/local/lib, /opt/homebrew/lib
    /// - Windows: C:\Windows\System32
    /// - All platforms: current working directory
    fn default_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        #[cfg(target_os = "linux")]
        {
            paths.push(PathBuf::from("/usr/lib"));
            paths.push(PathBuf::from("/usr/local/lib"));
            paths.push(PathBuf::from("/lib"));

            if cfg!(target_pointer_width = "64") {
                paths.push(PathBuf::from("/usr/lib64"));
                paths.push(PathBuf::from("/lib64"));
            }
        }

        #[cfg(target_os = "macos")]
        {
            paths.push(PathBuf::from("/usr/lib"));
            paths.push(PathBuf::from("/usr/local/lib"));
            paths.push(PathBuf::from("/opt/homebrew/lib"));
        }

        #[cfg(target_os = "windows")]
        {
            paths.push(PathBuf::from("C:\\Windows\\System32"));
            if let Ok(system_root) = std::env::var("SystemRoot") {
                paths.push(PathBuf::from(format!("{}\\System32", system_root)));
            }
        }

        if let Ok(cwd) = std::env::current_dir() {
            paths.insert(0, cwd);
        }

        paths
    }

    /// Resolve library name to full path with platform-specific naming
    ///
    /// Handles platform-specific library naming conventions:
    /// - Linux: lib{name}.so
    /// - macOS: lib{name}.dylib or lib{name}.so
    /// - Windows: {name}.dll
    fn resolve_library_path(&self, name: &Path) -> Option<PathBuf> {
        if name.exists() {
            return Some(name.to_path_buf());
        }

        // Only bare names are expanded; anything with a directory part is taken as given
        if name.components().count() != 1 {
            return None;
        }
        let name = name.to_str()?;

        let extensions: &[&str] = if cfg!(target_os = "windows") {
            &["dll"]
        } else if cfg!(target_os = "macos") {
            &["dylib", "so"]
        } else {
            &["so"]
        };

        let prefixes: &[&str] = if cfg!(target_os = "windows") {
            &["", "lib"]
        } else {
            &["lib", ""]
        };

        for search_path in &self.search_paths {
            for prefix in prefixes {
                for ext in extensions {
                    let full_path = search_path.join(format!("{}{}.{}", prefix, name, ext));
                    if full_path.exists() {
                        return Some(full_path);
                    }
                }
            }
        }

        None
    }

    /// Load a library by name or path
    ///
    /// Returns the cached handle if the library is already loaded. A name that
    /// does not resolve through the search paths is handed to the platform
    /// loader unchanged, so its own search rules still apply.
    ///
    /// Returns `Ok(None)` for ordinary failures (missing file, bad format,
    /// unresolved dependencies). The only error is a fatal
    /// `IsolationUnsupported`, raised when isolated loading is configured.
    ///
    /// # Safety
    ///
    /// Loading a dynamic library executes its initialization code. The caller
    /// must ensure the library is trusted.
    pub fn load_library(&self, path: &Path) -> Result<Option<LibraryHandle>, BridgeError> {
        if self.isolate {
            // libloading opens every library into the shared process namespace
            return Err(escalate(BridgeError::IsolationUnsupported(
                path.display().to_string(),
            )));
        }

        let resolved = self
            .resolve_library_path(path)
            .unwrap_or_else(|| path.to_path_buf());

        if let Some(handle) = self.by_path.get(&resolved) {
            return Ok(Some(*handle));
        }

        let library = match unsafe { self.open(&resolved) } {
            Ok(library) => library,
            Err(e) => {
                debug!(library = %resolved.display(), error = %e, "failed to load native library");
                return Ok(None);
            }
        };

        let handle = *self.by_path.entry(resolved).or_insert_with(|| {
            let handle = LibraryHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
            self.libraries.insert(handle, library);
            handle
        });
        Ok(Some(handle))
    }

    #[cfg(unix)]
    unsafe fn open(&self, path: &Path) -> Result<Library, libloading::Error> {
        use libloading::os::unix::{Library as UnixLibrary, RTLD_LAZY, RTLD_LOCAL, RTLD_NOW};

        let binding = if self.lazy_binding { RTLD_LAZY } else { RTLD_NOW };
        UnixLibrary::open(Some(path), binding | RTLD_LOCAL).map(Library::from)
    }

    #[cfg(not(unix))]
    unsafe fn open(&self, path: &Path) -> Result<Library, libloading::Error> {
        Library::new(path)
    }

    /// Handle to the process's global symbol namespace
    pub fn load_default_library(&self) -> Result<LibraryHandle, BridgeError> {
        if !self.libraries.contains_key(&LibraryHandle::DEFAULT) {
            let this = this_library().map_err(|e| {
                escalate(BridgeError::DefaultLibraryUnavailable(e.to_string()))
            })?;
            self.libraries.entry(LibraryHandle::DEFAULT).or_insert(this);
        }
        Ok(LibraryHandle::DEFAULT)
    }

    /// Log that `library` stays loaded
    ///
    /// Eager unloading is not supported by this native layer; the library is
    /// released when the loader is dropped.
    pub fn unload_library(&self, library: LibraryHandle) {
        warn!("UnloadLibrary: {:x} was not unloaded!", library);
    }

    /// Lookup a symbol in a loaded library
    ///
    /// Returns `None` when the library handle is unknown, the name does not
    /// resolve, or the symbol's value is a null pointer (weak or unused
    /// symbols can legitimately resolve to null).
    pub fn lookup_symbol(&self, library: LibraryHandle, name: &str) -> Option<SymbolHandle> {
        let lib = self.libraries.get(&library)?;

        let address = match unsafe { lib.get::<*mut c_void>(name.as_bytes()) } {
            Ok(symbol) => *symbol,
            Err(_) => return None,
        };

        if address.is_null() {
            return None;
        }

        Some(SymbolHandle {
            library: Some(library),
            address: RawPointer::from_ptr(address),
        })
    }

    /// Get the number of loaded libraries, the default namespace included
    pub fn loaded_count(&self) -> usize {
        self.libraries.len()
    }

    /// Library search paths, highest priority first
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for LibraryLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn this_library() -> Result<Library, libloading::Error> {
    Ok(libloading::os::unix::Library::this().into())
}

#[cfg(windows)]
fn this_library() -> Result<Library, libloading::Error> {
    libloading::os::windows::Library::this().map(Library::from)
}
