// Personalize module - copies a source image and stamps the client address on it
pub mod annotate;
pub mod client;
pub mod copy;
mod error;
pub mod font;
mod handlers;
mod locks;

pub use error::PersonalizeError;
pub use handlers::{health_handler, image_handler};
pub use locks::ArtifactLocks;

use std::{
    io,
    net::IpAddr,
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info};

/// Subdirectory of the images directory holding per-client artifacts.
pub const GENERATED_DIR: &str = "generated";

pub type SharedPersonalizer = Arc<Personalizer>;

pub struct Personalizer {
    pub(crate) config: crate::ImagesConfig,
    pub(crate) locks: ArtifactLocks,
}

impl Personalizer {
    pub fn new(config: crate::ImagesConfig) -> Self {
        Self {
            config,
            locks: ArtifactLocks::new(),
        }
    }

    pub fn source_path(&self, image_name: &str) -> PathBuf {
        self.config.directory.join(format!("{}.jpg", image_name))
    }

    pub fn generated_directory(&self, image_name: &str) -> PathBuf {
        self.config
            .directory
            .join(GENERATED_DIR)
            .join(image_name)
    }

    pub fn artifact_path(&self, image_name: &str, ip: &IpAddr) -> PathBuf {
        self.generated_directory(image_name)
            .join(format!("{}.jpg", client::artifact_stem(ip)))
    }

    /// Produce the artifact for `image_name` stamped with `client_address` and
    /// return its path.
    pub async fn personalize(
        &self,
        image_name: &str,
        client_address: &str,
    ) -> Result<PathBuf, PersonalizeError> {
        validate_image_name(image_name)?;
        let ip = client::parse_client_ip(client_address)?;

        let source = self.source_path(image_name);
        if !tokio::fs::try_exists(&source).await? {
            return Err(PersonalizeError::SourceNotFound(source));
        }

        let artifact = self.artifact_path(image_name, &ip);
        if self.config.create_generated_dirs {
            tokio::fs::create_dir_all(self.generated_directory(image_name)).await?;
        }

        // Released when the blocking work finishes, even if the request is dropped
        let guard = self.locks.lock(&artifact).await;

        let text = ip.to_string();
        let quality = self.config.jpeg_quality;
        let destination = artifact.clone();
        let staging = staging_path(&artifact);

        tokio::task::spawn_blocking(move || -> Result<(), PersonalizeError> {
            let _guard = guard;

            // Build next to the artifact and rename, so readers that already
            // opened the previous artifact keep a complete file
            let result = copy::copy_file(&source, &staging)
                .map_err(|e| {
                    if e.kind() == io::ErrorKind::NotFound && !source.exists() {
                        PersonalizeError::SourceNotFound(source.clone())
                    } else {
                        PersonalizeError::IoError(e)
                    }
                })
                .and_then(|()| {
                    debug!("Copied {:?} -> {:?}", source, staging);
                    annotate::annotate_jpeg(&staging, &text, quality)
                })
                .and_then(|()| {
                    std::fs::rename(&staging, &destination).map_err(PersonalizeError::from)
                });

            if result.is_err() {
                let _ = std::fs::remove_file(&staging);
            }
            result
        })
        .await??;

        info!("Generated {:?}", artifact);
        Ok(artifact)
    }
}

/// Hidden sibling of `artifact` used while it is being built.
pub fn staging_path(artifact: &Path) -> PathBuf {
    let file_name = artifact
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    artifact.with_file_name(format!(".{}.tmp", file_name))
}

/// Image names become file and directory names, so only a single plain path
/// component is accepted.
pub fn validate_image_name(image_name: &str) -> Result<(), PersonalizeError> {
    let invalid = || PersonalizeError::InvalidImageName(image_name.to_string());

    if image_name.is_empty() || image_name.contains(['/', '\\', '\0']) {
        return Err(invalid());
    }

    let mut components = Path::new(image_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == image_name => Ok(()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn create_test_personalizer(create_generated_dirs: bool) -> (Personalizer, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = crate::ImagesConfig {
            directory: temp_dir.path().to_path_buf(),
            jpeg_quality: 75,
            create_generated_dirs,
        };
        (Personalizer::new(config), temp_dir)
    }

    fn create_source(dir: &Path, name: &str) {
        let img = ImageBuffer::from_fn(160, 90, |x, y| {
            Rgb([(x % 256) as u8, (y * 2) as u8, 200])
        });
        img.save(dir.join(format!("{}.jpg", name))).unwrap();
    }

    #[test]
    fn test_validate_image_name() {
        assert!(validate_image_name("sunset").is_ok());
        assert!(validate_image_name("sunset.v2").is_ok());

        for bad in ["", ".", "..", "../secret", "a/b", "a\\b", "/etc"] {
            assert!(
                matches!(
                    validate_image_name(bad),
                    Err(PersonalizeError::InvalidImageName(_))
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_paths_follow_layout() {
        let (personalizer, temp_dir) = create_test_personalizer(false);
        let ip: IpAddr = "1.2.3.4".parse().unwrap();

        assert_eq!(
            personalizer.source_path("cat"),
            temp_dir.path().join("cat.jpg")
        );
        assert_eq!(
            personalizer.artifact_path("cat", &ip),
            temp_dir
                .path()
                .join("generated")
                .join("cat")
                .join("1.2.3.4.jpg")
        );
    }

    #[test]
    fn test_staging_path_is_hidden_sibling() {
        assert_eq!(
            staging_path(Path::new("images/generated/cat/1.2.3.4.jpg")),
            PathBuf::from("images/generated/cat/.1.2.3.4.jpg.tmp")
        );
    }

    #[tokio::test]
    async fn test_failed_annotation_leaves_no_staging_file() {
        let (personalizer, temp_dir) = create_test_personalizer(true);
        std::fs::write(temp_dir.path().join("broken.jpg"), b"not a jpeg").unwrap();

        let err = personalizer.personalize("broken", "10.1.2.3").await.unwrap_err();

        assert!(matches!(err, PersonalizeError::ImageError(_)));
        let generated = temp_dir.path().join("generated").join("broken");
        assert_eq!(std::fs::read_dir(&generated).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_personalize_generates_artifact() {
        let (personalizer, temp_dir) = create_test_personalizer(false);
        create_source(temp_dir.path(), "cat");
        std::fs::create_dir_all(temp_dir.path().join("generated").join("cat")).unwrap();

        let artifact = personalizer.personalize("cat", "10.1.2.3").await.unwrap();

        assert!(artifact.exists());
        let img = image::open(&artifact).unwrap();
        assert_eq!((img.width(), img.height()), (160, 90));
    }

    #[tokio::test]
    async fn test_missing_source_creates_nothing() {
        let (personalizer, temp_dir) = create_test_personalizer(true);

        let err = personalizer.personalize("ghost", "10.1.2.3").await.unwrap_err();

        assert!(matches!(err, PersonalizeError::SourceNotFound(_)));
        assert!(!temp_dir.path().join("generated").exists());
    }

    #[tokio::test]
    async fn test_missing_generated_directory_is_io_error() {
        let (personalizer, temp_dir) = create_test_personalizer(false);
        create_source(temp_dir.path(), "cat");

        let err = personalizer.personalize("cat", "10.1.2.3").await.unwrap_err();

        assert!(matches!(err, PersonalizeError::IoError(_)));
    }

    #[tokio::test]
    async fn test_unreadable_images_directory_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        // A regular file where the images directory should be
        let images = temp_dir.path().join("images");
        std::fs::write(&images, b"").unwrap();
        let personalizer = Personalizer::new(crate::ImagesConfig {
            directory: images,
            jpeg_quality: 75,
            create_generated_dirs: true,
        });

        let err = personalizer.personalize("cat", "10.1.2.3").await.unwrap_err();

        assert!(matches!(err, PersonalizeError::IoError(_)), "{err:?}");
        assert!(err.status_code().is_server_error());
    }

    #[tokio::test]
    async fn test_create_generated_dirs_option() {
        let (personalizer, temp_dir) = create_test_personalizer(true);
        create_source(temp_dir.path(), "cat");

        let artifact = personalizer.personalize("cat", "::1").await.unwrap();

        assert_eq!(
            artifact,
            temp_dir
                .path()
                .join("generated")
                .join("cat")
                .join("--1.jpg")
        );
        assert!(artifact.exists());
    }

    #[tokio::test]
    async fn test_rejects_unsafe_client_address() {
        let (personalizer, temp_dir) = create_test_personalizer(true);
        create_source(temp_dir.path(), "cat");

        let err = personalizer
            .personalize("cat", "../../escape")
            .await
            .unwrap_err();

        assert!(matches!(err, PersonalizeError::InvalidClientAddress(_)));
        assert!(!temp_dir.path().join("generated").exists());
    }

    #[tokio::test]
    async fn test_concurrent_requests_leave_valid_jpeg() {
        let (personalizer, temp_dir) = create_test_personalizer(true);
        create_source(temp_dir.path(), "cat");
        let personalizer = Arc::new(personalizer);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let personalizer = personalizer.clone();
            handles.push(tokio::spawn(async move {
                personalizer.personalize("cat", "192.0.2.1").await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let artifact = temp_dir
            .path()
            .join("generated")
            .join("cat")
            .join("192.0.2.1.jpg");
        let img = image::open(&artifact).unwrap();
        assert_eq!((img.width(), img.height()), (160, 90));
    }
}
