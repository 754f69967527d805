use crate::Config;
use crate::personalize::GENERATED_DIR;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Images directory does not exist: {0:?}")]
    ImagesDirectoryMissing(PathBuf),

    #[error("Images directory is not readable: {0}")]
    ImagesDirectoryUnreadable(std::io::Error),

    #[error("Generated directory does not exist: {0:?}")]
    GeneratedDirectoryMissing(PathBuf),

    #[error("Failed to create generated directory: {0}")]
    GeneratedDirectoryCreationFailed(#[from] std::io::Error),
}

impl StartupCheckError {
    pub fn is_critical(&self) -> bool {
        !matches!(self, Self::GeneratedDirectoryMissing(_))
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    let images_dir = &config.images.directory;
    if !images_dir.exists() {
        error!("Images directory does not exist: {:?}", images_dir);
        errors.push(StartupCheckError::ImagesDirectoryMissing(images_dir.clone()));
        return Err(errors);
    }

    match tokio::fs::read_dir(images_dir).await {
        Ok(_) => info!("Images directory is accessible: {:?}", images_dir),
        Err(e) => {
            error!("Images directory is not accessible: {}", e);
            errors.push(StartupCheckError::ImagesDirectoryUnreadable(e));
        }
    }

    let generated_dir = images_dir.join(GENERATED_DIR);
    if generated_dir.exists() {
        info!("Generated directory exists: {:?}", generated_dir);
    } else if config.images.create_generated_dirs {
        info!(
            "Generated directory does not exist, creating: {:?}",
            generated_dir
        );
        if let Err(e) = tokio::fs::create_dir_all(&generated_dir).await {
            error!("Failed to create generated directory: {}", e);
            errors.push(StartupCheckError::GeneratedDirectoryCreationFailed(e));
        }
    } else {
        warn!(
            "Generated directory does not exist: {:?}; requests will fail until {}/<name>/ directories are provisioned",
            generated_dir, GENERATED_DIR
        );
        errors.push(StartupCheckError::GeneratedDirectoryMissing(generated_dir));
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}
