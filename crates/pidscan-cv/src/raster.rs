//! Rasterizer over pre-rendered page images

use crate::Result;
use crate::traits::Rasterizer;
use crate::utils::ImageUtils;
use opencv::core::Mat;
use pidscan_core::Error;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Serves pages from a directory of images named `page_<n>.png`
///
/// A DPI-specific `page_<n>@<dpi>.png` is preferred when present. The
/// `path` handed to [`Rasterizer::render_page`] is resolved relative to the
/// root directory, so one rasterizer can serve several drawings.
#[derive(Debug, Clone)]
pub struct ImageDirRasterizer {
    root: PathBuf,
    extension: String,
}

impl ImageDirRasterizer {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extension: "png".to_string(),
        }
    }

    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        self.extension = ext.into();
        self
    }

    fn candidates(&self, drawing: &Path, page_index: usize, dpi: u32) -> [PathBuf; 2] {
        let dir = self.root.join(drawing);
        [
            dir.join(format!("page_{}@{}.{}", page_index, dpi, self.extension)),
            dir.join(format!("page_{}.{}", page_index, self.extension)),
        ]
    }
}

impl Rasterizer for ImageDirRasterizer {
    fn render_page(&self, path: &Path, page_index: usize, dpi: u32) -> Result<Mat> {
        let Some(file) = self
            .candidates(path, page_index, dpi)
            .into_iter()
            .find(|candidate| candidate.is_file())
        else {
            return Err(Error::PageUnavailable {
                page: page_index,
                reason: format!("no image for page {} under {:?}", page_index, self.root.join(path)),
            }
            .into());
        };

        debug!("Rendering page {} from {:?}", page_index, file);
        ImageUtils::load_color(&file)
    }
}
