use crate::output::item::OutputDocument;
use crate::HarvestError;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Writes the output document atomically
///
/// The JSON is written to a temporary file in the destination directory and
/// renamed over the target, so a failure never leaves a half-written file.
pub fn write_document(document: &OutputDocument, path: &Path) -> Result<(), HarvestError> {
    let output_error = |source: std::io::Error| HarvestError::Output {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(output_error)?;

    let mut file = NamedTempFile::new_in(parent).map_err(output_error)?;
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, document)
            .map_err(|e| output_error(e.into()))?;
        writer.write_all(b"\n").map_err(output_error)?;
        writer.flush().map_err(output_error)?;
    }
    file.as_file().sync_all().map_err(output_error)?;

    file.persist(path).map_err(|e| output_error(e.error))?;

    tracing::info!(
        "Wrote {} items to {}",
        document.items.len(),
        path.display()
    );
    Ok(())
}
