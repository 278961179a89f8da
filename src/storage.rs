use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use chrono::Local;
use log::{debug, info, warn};
use thiserror::Error;

pub const DEFAULT_IMAGE_DIR: &str = "img";

pub const ALLOWED_MIME: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/bmp",
    "image/webp",
    "image/tiff",
];

#[derive(Debug, Error)]
pub enum ImageStoreError {
    #[error("not_found: {0}")]
    NotFound(PathBuf),
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error("camera timed out after {0:?}")]
    Timeout(Duration),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Image files referenced by items. Paths handed out and accepted are the
/// strings stored in `Item::image_path`.
pub trait ImageStore: Send + Sync {
    /// Copy a user-picked file into the image folder.
    fn import(&self, source: &Path) -> Result<String, ImageStoreError>;
    /// Write freshly captured image bytes into the image folder.
    fn save_capture(&self, bytes: &[u8], ext: &str) -> Result<String, ImageStoreError>;
    fn exists(&self, path: &str) -> bool;
    fn remove(&self, path: &str) -> Result<(), ImageStoreError>;
}

/// Local image folder, created on first write.
#[derive(Debug, Clone)]
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn ensure_root(&self) -> Result<(), ImageStoreError> {
        if !self.root.is_dir() {
            std::fs::create_dir_all(&self.root)?;
            info!("created image folder '{}'", self.root.display());
        }
        Ok(())
    }

    // `{prefix}_{YYYYmmdd_HHMMSS}.{ext}`, suffixed `_N` while the name is taken
    fn unique_path(&self, prefix: &str, ext: &str) -> PathBuf {
        let base = format!("{prefix}_{}", Local::now().format("%Y%m%d_%H%M%S"));
        let with_ext = |stem: &str| {
            if ext.is_empty() { stem.to_string() } else { format!("{stem}.{ext}") }
        };
        let mut candidate = self.root.join(with_ext(&base));
        let mut n = 1u32;
        while candidate.exists() {
            candidate = self.root.join(with_ext(&format!("{base}_{n}")));
            n += 1;
        }
        candidate
    }
}

impl Default for FsImageStore {
    fn default() -> Self { Self::new(DEFAULT_IMAGE_DIR) }
}

fn sniff(bytes: &[u8]) -> Result<infer::Type, ImageStoreError> {
    match infer::get(bytes) {
        Some(t) if ALLOWED_MIME.contains(&t.mime_type()) => Ok(t),
        Some(t) => Err(ImageStoreError::Unsupported(t.mime_type().to_string())),
        None => Err(ImageStoreError::Unsupported("unknown".into())),
    }
}

impl ImageStore for FsImageStore {
    fn import(&self, source: &Path) -> Result<String, ImageStoreError> {
        if !source.is_file() {
            return Err(ImageStoreError::NotFound(source.to_path_buf()));
        }
        let kind = match infer::get_from_path(source)? {
            Some(t) if ALLOWED_MIME.contains(&t.mime_type()) => t,
            Some(t) => return Err(ImageStoreError::Unsupported(t.mime_type().to_string())),
            None => return Err(ImageStoreError::Unsupported("unknown".into())),
        };
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| kind.extension().to_string());
        self.ensure_root()?;
        let dest = self.unique_path("uploaded", &ext);
        std::fs::copy(source, &dest)?;
        debug!("imported '{}' as '{}'", source.display(), dest.display());
        Ok(dest.to_string_lossy().into_owned())
    }

    fn save_capture(&self, bytes: &[u8], ext: &str) -> Result<String, ImageStoreError> {
        sniff(bytes)?;
        self.ensure_root()?;
        let dest = self.unique_path("captured", ext);
        std::fs::write(&dest, bytes)?;
        debug!("stored capture as '{}'", dest.display());
        Ok(dest.to_string_lossy().into_owned())
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }

    fn remove(&self, path: &str) -> Result<(), ImageStoreError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ImageStoreError::NotFound(path.into())),
            Err(e) => Err(e.into()),
        }
    }
}

/// Source of photos for new items.
pub trait Camera: Send + Sync {
    /// Returns encoded image bytes and the file extension matching them.
    fn capture(&self) -> Result<(Vec<u8>, String), ImageStoreError>;
}

pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Runs an external capture program (e.g. `fswebcam --no-banner {output}`).
/// `{output}` is replaced by a scratch file path; without the placeholder the
/// path is appended as the last argument.
#[derive(Debug, Clone)]
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandCamera {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self { program: program.into(), args, timeout }
    }

    /// Whitespace-split command line. `None` when blank.
    pub fn parse(command_line: &str, timeout: Duration) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect(), timeout))
    }

    fn build_args(&self, output: &Path) -> Vec<String> {
        let out = output.to_string_lossy();
        let mut args: Vec<String> = self.args.iter().map(|a| a.replace(OUTPUT_PLACEHOLDER, &out)).collect();
        if !self.args.iter().any(|a| a.contains(OUTPUT_PLACEHOLDER)) {
            args.push(out.into_owned());
        }
        args
    }
}

// Kill and wait so the camera process is not left as a zombie.
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl Camera for CommandCamera {
    fn capture(&self) -> Result<(Vec<u8>, String), ImageStoreError> {
        let scratch = tempfile::tempdir()?;
        let output = scratch.path().join("capture.jpg");
        let mut child = Command::new(&self.program)
            .args(self.build_args(&output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ImageStoreError::Unavailable(format!("cannot start '{}': {e}", self.program)))?;

        let start = Instant::now();
        loop {
            let polled = match child.try_wait() {
                Ok(polled) => polled,
                Err(e) => {
                    reap(&mut child);
                    return Err(e.into());
                }
            };
            match polled {
                Some(status) if status.success() => break,
                Some(status) => {
                    return Err(ImageStoreError::Unavailable(format!("'{}' exited with {status}", self.program)));
                }
                None => {
                    if start.elapsed() > self.timeout {
                        reap(&mut child);
                        warn!("capture command '{}' timed out", self.program);
                        return Err(ImageStoreError::Timeout(self.timeout));
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }

        let bytes = match std::fs::read(&output) {
            Ok(b) if !b.is_empty() => b,
            _ => return Err(ImageStoreError::Unavailable("no image was produced".into())),
        };
        let ext = sniff(&bytes)?.extension().to_string();
        Ok((bytes, ext))
    }
}
