//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use clientbin::{ArchiveFetcher, Catalog, Platform, ProgressCallback, ProgressEvent};
use serde_json::{Value, json};

/// Fetcher serving a fixed body, or failing with a fixed message.
pub struct MockFetcher {
    body: std::result::Result<Vec<u8>, String>,
    calls: AtomicUsize,
}

impl MockFetcher {
    pub fn serving(body: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            body: Ok(body),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            body: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveFetcher for MockFetcher {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = match &self.body {
            Ok(body) => body,
            Err(message) => bail!("{message}"),
        };
        if let Some(callback) = &progress {
            callback(ProgressEvent::Started {
                url: url.to_string(),
                total: body.len() as u64,
            });
        }
        tokio::fs::write(dest, body).await?;
        if let Some(callback) = &progress {
            callback(ProgressEvent::Completed);
        }
        Ok(())
    }
}

/// Shell script answering the sanity probe with `good:<first arg>`.
pub const GOOD_SCRIPT: &str = "#!/bin/sh\necho \"good:$1\"\n";

/// Shell script whose output never satisfies the probe.
pub const BAD_SCRIPT: &str = "#!/bin/sh\necho \"bad:$1\"\n";

/// Wraps per-platform configs for the host platform into a catalog.
pub fn catalog(clients: &[(&str, Value)]) -> Catalog {
    let platform = Platform::current();
    let mut map = serde_json::Map::new();
    for (id, config) in clients {
        map.insert(
            (*id).to_string(),
            json!({
                "homepage": "http://badgerbadgerbadger.com",
                "version": "1.0.0",
                "platforms": { platform.os(): { platform.arch(): config } }
            }),
        );
    }
    let document = json!({ "clients": map });
    Catalog::from_json_str(&document.to_string()).expect("Should parse catalog")
}

/// Platform config with the standard `test` → `good:test` probe.
pub fn probed_config(bin: &str, download: Option<Value>) -> Value {
    let mut config = json!({
        "bin": bin,
        "commands": { "sanity": { "args": ["test"], "output": ["good:test"] } }
    });
    if let Some(download) = download {
        config["download"] = download;
    }
    config
}

/// Builds a zip archive in memory; every entry is marked executable.
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
    for (name, content) in entries {
        zip.start_file(*name, options).expect("Should start file");
        zip.write_all(content.as_bytes()).expect("Should write entry");
    }
    zip.finish().expect("Should finish zip").into_inner()
}

/// Builds a gzip-compressed tar archive in memory; every entry is executable.
pub fn tar_gz_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, name, content.as_bytes())
            .expect("Should append entry");
    }
    builder
        .into_inner()
        .expect("Should finish tar")
        .finish()
        .expect("Should finish gzip")
}

/// Writes an executable script at `<dir>/<name>`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(dir).expect("Should create script dir");
    let path = dir.join(name);
    std::fs::write(&path, body).expect("Should write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Should set permissions");
    path
}
