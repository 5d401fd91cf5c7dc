use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use memmap2::Mmap;

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB

pub enum FileContent {
    Mapped(Mmap),
    Buffered(String),
}

impl FileContent {
    /// Owned UTF-8 text; mapped files are validated here.
    pub fn into_string(self, path: &Path) -> Result<String> {
        match self {
            FileContent::Mapped(mmap) => std::str::from_utf8(&mmap)
                .map(str::to_owned)
                .with_context(|| format!("{} is not valid UTF-8", path.display())),
            FileContent::Buffered(s) => Ok(s),
        }
    }
}

pub fn read_file_smart<P: AsRef<Path>>(path: P) -> Result<FileContent> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;

    if metadata.len() > MMAP_THRESHOLD {
        // Use memory mapping for large files
        let file =
            File::open(path).with_context(|| format!("Failed to open file {}", path.display()))?;

        // Safety: the mapping is read-only and dropped before we return to the build loop
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to memory-map {}", path.display()))?;

        Ok(FileContent::Mapped(mmap))
    } else {
        // Read small files into memory
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file {}", path.display()))?;

        Ok(FileContent::Buffered(content))
    }
}

/// Read a whole input file as text.
pub fn read_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    read_file_smart(path)?.into_string(path)
}

/// Write `contents` to `path` through a same-directory temp file and rename.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(contents.as_bytes())
        .context("Failed to write temp file")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to persist {}", path.display()))?;

    Ok(())
}

/// Blocking file access used to resolve external source maps and their
/// sources. Tests substitute [`MemoryAccess`].
pub trait FileAccess: Send + Sync {
    fn read_to_string(&self, path: &Utf8Path) -> io::Result<String>;
}

/// Reads from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsAccess;

impl FileAccess for FsAccess {
    fn read_to_string(&self, path: &Utf8Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// In-memory file table keyed by normalized path.
#[derive(Debug, Default, Clone)]
pub struct MemoryAccess {
    files: HashMap<Utf8PathBuf, String>,
}

impl MemoryAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<Utf8Path>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl AsRef<Utf8Path>, content: impl Into<String>) {
        self.files
            .insert(normalize(path.as_ref()), content.into());
    }
}

impl FileAccess for MemoryAccess {
    fn read_to_string(&self, path: &Utf8Path) -> io::Result<String> {
        self.files
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{path} not found")))
    }
}

/// Lexically collapse `.` and `..` components.
pub fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    use camino::Utf8Component;

    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_str()),
        }
    }
    out
}
