use std::io::{Cursor, Write};
use std::path::Path;

use anyhow::Result;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Bytes of a zip archive containing one small file per entry name.
pub fn jar_bytes(entries: &[&str]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for name in entries {
        writer.start_file(*name, options)?;
        writer.write_all(b"x")?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Like [`jar_bytes`], followed by one stored (uncompressed) entry of
/// `padding` bytes.
pub fn padded_jar_bytes(entries: &[&str], padding: usize) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for name in entries {
        writer.start_file(*name, options)?;
        writer.write_all(b"x")?;
    }
    writer.start_file(
        "assets/blob.bin",
        options.compression_method(CompressionMethod::Stored),
    )?;
    writer.write_all(&vec![0u8; padding])?;
    Ok(writer.finish()?.into_inner())
}

/// Write a jar with the given entries to `path`.
pub fn write_jar(path: impl AsRef<Path>, entries: &[&str]) -> Result<()> {
    std::fs::write(path, jar_bytes(entries)?)?;
    Ok(())
}

/// A jar with nothing suspicious in it.
pub fn write_clean_jar(path: impl AsRef<Path>) -> Result<()> {
    write_jar(path, &["META-INF/MANIFEST.MF", "com/example/App.class"])
}
