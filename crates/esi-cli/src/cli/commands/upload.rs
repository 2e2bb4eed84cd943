//! Upload command handler.

use std::path::Path;

use anyhow::Result;
use esi_core::backend::upload_file_name;
use esi_core::config::Config;

use crate::session;

pub async fn run(config: &Config, base_url: Option<&str>, path: &Path) -> Result<()> {
    let backend = session::backend_client(config, base_url)?;
    let file = upload_file_name(path);
    match backend.upload_file(path).await {
        Ok(message) => {
            println!("Uploaded {file}: {message}");
            Ok(())
        }
        Err(e) => anyhow::bail!("Upload failed: {e}"),
    }
}
