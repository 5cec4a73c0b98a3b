//! Downloads listings, site files and yearly archives from NCEI.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Error, Result};
use bytes::Bytes;
use flate2::read::GzDecoder;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use tar::Archive;

pub type HttpClient = ClientWithMiddleware;

/// HTTP client that retries transient failures with exponential backoff.
pub fn http_client(max_retries: u32) -> Result<HttpClient> {
    let client = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);

    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(policy))
        .build())
}

async fn get(client: &HttpClient, url: &str) -> Result<reqwest::Response> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download `{}`", url))?;

    if !response.status().is_success() {
        return Err(Error::msg(format!(
            "Failed to download `{}`: {}",
            url,
            response.status()
        )));
    }

    Ok(response)
}

pub async fn fetch_text(client: &HttpClient, url: &str) -> Result<String> {
    Ok(get(client, url).await?.text().await?)
}

pub async fn fetch_bytes(client: &HttpClient, url: &str) -> Result<Bytes> {
    Ok(get(client, url).await?.bytes().await?)
}

/// Streams a download to disk, turning the spinner into a byte progress bar when the
/// server reports a content length.
pub async fn download_with_progress(
    client: &HttpClient,
    url: &str,
    file_path: &Path,
    progress_bar: &ProgressBar,
) -> Result<()> {
    let response = get(client, url).await?;

    let total_size = response.content_length().unwrap_or(0);
    if total_size > 0 {
        progress_bar.set_length(total_size);
        progress_bar.set_style(
            ProgressStyle::with_template(
                "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {eta}",
            )
            .unwrap()
            .progress_chars("=> "),
        );
    }

    let mut file = File::create(file_path)?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| Error::msg(format!("Error reading chunk: {}", e)))?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        progress_bar.set_position(downloaded);
    }

    Ok(())
}

/// Extracts the tarball at the specified path to the specified working directory.
pub fn extract_tar(tar_gz_path: &Path, working_dir: &Path) -> Result<()> {
    let tar_gz = File::open(tar_gz_path)?;
    let mut archive = Archive::new(GzDecoder::new(tar_gz));

    archive
        .unpack(working_dir)
        .with_context(|| format!("unpacking `{}`", tar_gz_path.display()))?;

    Ok(())
}

/// CSV files anywhere below `dir`, sorted by path.
pub fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_dir() {
            files.extend(csv_files(&path)?);
        } else if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Writes a gzipped tarball holding `files` as `(path, body)` entries.
#[cfg(test)]
pub fn write_archive(path: &Path, files: &[(&str, &str)]) {
    use flate2::{write::GzEncoder, Compression};

    let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (name, body) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, body.as_bytes()).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap();
}

// -- Tests -------------------------------------------------------------------
