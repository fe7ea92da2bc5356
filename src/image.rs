//! Image building and resolution.
//!
//! Every non-base image of a version is built `FROM {version}-base`, so the
//! resolver materialises the base image first when it is missing.  Builds
//! are sequential; the engine's image store is the only cache.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Result, RunnerError};
use crate::runtime::ContainerEngine;
use crate::template::{self, TemplateParams};
use crate::types::{ImageRef, ImageType};

pub struct ImageResolver<'a> {
    engine: &'a dyn ContainerEngine,
    templates_dir: PathBuf,
}

impl<'a> ImageResolver<'a> {
    pub fn new(engine: &'a dyn ContainerEngine, templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            templates_dir: templates_dir.into(),
        }
    }

    pub fn engine(&self) -> &'a dyn ContainerEngine {
        self.engine
    }

    pub fn template_path(&self, image_type: ImageType) -> PathBuf {
        self.templates_dir.join(format!("Dockerfile-{}", image_type))
    }

    /// Renders `Dockerfile-{type}` with `params` and builds it as
    /// `{version}-{type}`.
    pub async fn build_image(
        &self,
        version: &str,
        image_type: ImageType,
        params: &TemplateParams,
    ) -> Result<ImageRef> {
        let image = ImageRef::new(version, image_type);
        info!("Building image {}", image);

        let path = self.template_path(image_type);
        let source = read_template(&path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let dockerfile = template::render(&name, &source, params)?;

        self.engine.build_image(&image, &dockerfile).await?;
        info!("Image {} built", image);
        Ok(image)
    }

    /// Makes sure `{version}-{type}` exists, building it (and the base image
    /// it depends on) if it does not.
    pub async fn ensure_image(&self, version: &str, image_type: ImageType) -> Result<ImageRef> {
        let image = ImageRef::new(version, image_type);
        if self.engine.image_exists(&image).await? {
            info!("Image {} exists", image);
            return Ok(image);
        }

        let params = TemplateParams::new(version);
        if image_type != ImageType::Base {
            let base = ImageRef::new(version, ImageType::Base);
            if !self.engine.image_exists(&base).await? {
                self.build_image(version, ImageType::Base, &params).await?;
            }
        }
        self.build_image(version, image_type, &params).await
    }
}

async fn read_template(path: &Path) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(source) => Ok(source),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(RunnerError::TemplateNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}
