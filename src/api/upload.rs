//! Batch submission of images for classification.

use crate::api::client::{ApiClient, ApiError, Prediction};
use crate::scanner::ScannedImage;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

/// Outcome of one image submission.
#[derive(Debug)]
pub struct UploadOutcome {
    pub image: ScannedImage,
    pub result: Result<Prediction, ApiError>,
}

/// Submit images, at most `concurrency` at a time.
///
/// Outcomes are returned in the same order as `images`.
pub async fn upload_images(
    client: &ApiClient,
    token: &str,
    images: Vec<ScannedImage>,
    concurrency: usize,
    show_progress: bool,
) -> Vec<UploadOutcome> {
    let progress = if show_progress {
        let pb = ProgressBar::new(images.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    info!(
        "Submitting {} images (concurrency {})",
        images.len(),
        concurrency
    );

    let mut outcomes: Vec<(usize, UploadOutcome)> =
        stream::iter(images.into_iter().enumerate())
            .map(|(index, image)| {
                let progress = progress.clone();
                async move {
                    debug!("Uploading {} ({} bytes)", image.relative, image.size);
                    let result = client.predict(token, &image.path).await;
                    if let Err(ref e) = result {
                        warn!("Prediction failed for {}: {}", image.relative, e);
                    }
                    if let Some(pb) = progress {
                        pb.set_message(image.relative.clone());
                        pb.inc(1);
                    }
                    (index, UploadOutcome { image, result })
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

    if let Some(pb) = progress {
        pb.finish_with_message("done");
    }

    outcomes.sort_by_key(|(index, _)| *index);
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}
