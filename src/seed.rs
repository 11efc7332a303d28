//! Seed images that anchor the rhythm and tempo of every generated step.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use kornia_image::{Image, ImageSize, allocator::CpuAllocator};

use crate::error::{Error, Result};

/// Names of the seed images shipped in the asset directory.
pub const BUILTIN_SEED_IMAGES: [&str; 5] = ["og_beat", "agile", "marim", "motorway", "vibes"];

/// Selection name that asks for a caller supplied image.
pub const CUSTOM_SEED_IMAGE: &str = "custom";

/// Default location of the built-in seed image assets.
pub const DEFAULT_SEED_IMAGE_DIR: &str = "seed_images";

/// RGB8 image buffer used by the model's image-to-image pass.
pub type RgbImage = Image<u8, 3, CpuAllocator>;

/// A loaded, read-only seed image.
///
/// Cloning is cheap, the pixels are shared.
#[derive(Clone)]
pub struct SeedImage {
    name: String,
    image: Arc<RgbImage>,
    fingerprint: [u8; 32],
}

impl SeedImage {
    pub fn new(name: impl Into<String>, image: RgbImage) -> Self {
        let fingerprint = fingerprint(&image);
        Self {
            name: name.into(),
            image: Arc::new(image),
            fingerprint,
        }
    }

    /// Reads a PNG or JPEG file as a custom seed image.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = read_rgb_image(path)?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(CUSTOM_SEED_IMAGE)
            .to_string();
        Ok(Self::new(name, image))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn size(&self) -> ImageSize {
        self.image.size()
    }

    /// Content hash of the pixels and dimensions, used in cache keys.
    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }
}

impl fmt::Debug for SeedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.size();
        f.debug_struct("SeedImage")
            .field("name", &self.name)
            .field("width", &size.width)
            .field("height", &size.height)
            .finish()
    }
}

fn fingerprint(image: &RgbImage) -> [u8; 32] {
    let size = image.size();
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(size.width as u64).to_le_bytes());
    hasher.update(&(size.height as u64).to_le_bytes());
    hasher.update(image.as_slice());
    *hasher.finalize().as_bytes()
}

/// Which seed image a run should use.
#[derive(Debug, Clone)]
pub enum SeedSelection {
    /// One of [`BUILTIN_SEED_IMAGES`].
    Builtin(String),
    /// A caller supplied image, `None` when nothing was uploaded.
    Custom(Option<SeedImage>),
}

impl SeedSelection {
    /// Maps a selection name to a selection, `"custom"` takes the supplied image.
    pub fn from_name(name: &str, custom: Option<SeedImage>) -> Self {
        if name == CUSTOM_SEED_IMAGE {
            SeedSelection::Custom(custom)
        } else {
            SeedSelection::Builtin(name.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SeedSelection::Builtin(name) => name,
            SeedSelection::Custom(_) => CUSTOM_SEED_IMAGE,
        }
    }
}

impl Default for SeedSelection {
    fn default() -> Self {
        SeedSelection::Builtin(BUILTIN_SEED_IMAGES[0].to_string())
    }
}

/// Loads built-in seed images from an asset directory.
#[derive(Debug, Clone)]
pub struct SeedImageLoader {
    dir: PathBuf,
}

impl SeedImageLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Loads `<dir>/<name>.png` for a name of the built-in set.
    pub fn load(&self, name: &str) -> Result<SeedImage> {
        if !BUILTIN_SEED_IMAGES.contains(&name) {
            return Err(Error::AssetNotFound(name.to_string()));
        }
        let path = self.dir.join(format!("{name}.png"));
        if !path.is_file() {
            return Err(Error::AssetNotFound(format!(
                "{name} (expected at {})",
                path.display()
            )));
        }
        log::debug!("Loading seed image {name} from {}", path.display());
        let image = kornia_io::png::read_image_png_rgb8(&path)
            .map_err(|e| Error::Image(format!("{}: {e}", path.display())))?;
        Ok(SeedImage::new(name, image))
    }

    /// Resolves a selection to a loaded image.
    pub fn resolve(&self, selection: &SeedSelection) -> Result<SeedImage> {
        match selection {
            SeedSelection::Builtin(name) => self.load(name),
            SeedSelection::Custom(Some(image)) => Ok(image.clone()),
            SeedSelection::Custom(None) => Err(Error::MissingSeedImage),
        }
    }
}

impl Default for SeedImageLoader {
    fn default() -> Self {
        Self::new(DEFAULT_SEED_IMAGE_DIR)
    }
}

fn read_rgb_image(path: &Path) -> Result<RgbImage> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| Error::Image(format!("invalid file extension: {}", path.display())))?;

    let image = match extension.as_str() {
        "jpg" | "jpeg" => kornia_io::jpeg::read_image_jpeg_rgb8(path),
        "png" => kornia_io::png::read_image_png_rgb8(path),
        _ => return Err(Error::Image(format!("unsupported image format: {extension}"))),
    };
    image.map_err(|e| Error::Image(format!("{}: {e}", path.display())))
}
